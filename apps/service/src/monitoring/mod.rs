/// Scheduled execution of active monitors
pub mod scheduler;

pub use scheduler::MonitoringScheduler;
