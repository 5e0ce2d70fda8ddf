//! Standard data providers auto-registered by the client.
//!
//! Each provider hands plain JSON data to the registry; none of them know
//! about components, checksums, or the sync protocol.

mod certificates;
mod connectivity;
mod recent_logs;
mod service_info;

pub use certificates::{CertificateInfo, CertificateMonitor};
pub use connectivity::ConnectivityTracker;
pub use recent_logs::{LogContext, LogEntry, LogLevel, RecentLogs, TriggerHook};
pub use service_info::{RuntimeEnvironment, ServiceInfo};
