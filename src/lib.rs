pub mod errors;

pub mod cron_jobs;
pub mod modules;

pub use modules::models::general::{HostDb, MemoryDb};
pub use modules::oplog::OperatorLog;
pub use modules::robis_api::RobisApi;
