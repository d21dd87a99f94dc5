pub mod coordinator;
pub mod outcome;
pub mod stats;


pub use coordinator::{RunOptions, Safari, SafariDeps, StopHandle};
pub use outcome::{Assessment, Disposition, SafariReport, ThreadOutcome};
pub use stats::SafariStats;
