pub mod orchestrator;
pub mod queries;

pub use orchestrator::{FallbackDecision, QueryOrchestrator, StrategyYield, UrlLedger};
pub use queries::{PlannedQuery, QueryPlan, Strategy, StrategyGroup};
