pub mod aspects;
pub mod discovery;
pub mod gate;
pub mod judge;
pub mod pipeline;
pub mod report;
pub mod scraper;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
