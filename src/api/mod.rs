pub mod monitor;

pub use monitor::{AgitationMonitor, MonitorError};
