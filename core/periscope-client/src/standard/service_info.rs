//! Static service runtime facts.
//!
//! Captured once at construction; the `service-info` component never
//! changes for the lifetime of the process, so it is registered
//! trigger-only.

use chrono::{DateTime, Utc};
use periscope_types::format_utc;
use serde_json::{json, Value};
use std::env;
use std::fmt;
use std::fs;
use std::path::Path;

/// How the service process is supervised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnvironment {
    Systemd,
    Container,
    Standalone,
}

impl RuntimeEnvironment {
    fn as_str(self) -> &'static str {
        match self {
            Self::Systemd => "systemd",
            Self::Container => "container",
            Self::Standalone => "standalone",
        }
    }
}

impl fmt::Display for RuntimeEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime facts about the running service.
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub port: u16,
    pub start_time: DateTime<Utc>,
    pub environment: RuntimeEnvironment,
    pub binary_path: String,
    pub working_directory: String,
    pub user: String,
    pub uid: u32,
    pub gid: u32,
}

impl ServiceInfo {
    /// Captures the service facts at the current moment.
    #[must_use]
    pub fn detect(name: &str, version: &str, port: u16) -> Self {
        let binary_path = env::current_exe()
            .ok()
            .map(|path| {
                // Resolve symlinks so the reported path survives upgrades.
                fs::canonicalize(&path).unwrap_or(path)
            })
            .map(|path| path.display().to_string())
            .unwrap_or_default();

        let working_directory = env::current_dir()
            .map(|path| path.display().to_string())
            .unwrap_or_default();

        let user = env::var("USER").unwrap_or_else(|_| "unknown".to_string());

        // SAFETY: getuid/getgid never fail and take no arguments.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };

        Self {
            name: name.to_string(),
            version: version.to_string(),
            port,
            start_time: Utc::now(),
            environment: detect_environment(),
            binary_path,
            working_directory,
            user,
            uid,
            gid,
        }
    }

    /// Data for the `service-info` component.
    #[must_use]
    pub fn data(&self) -> Value {
        json!({
            "name": self.name,
            "version": self.version,
            "pid": std::process::id(),
            "port": self.port,
            "start_time": format_utc(self.start_time),
            "type": self.environment.as_str(),
            "implementation_language": "rust",
            "binary_path": self.binary_path,
            "working_directory": self.working_directory,
            "user": self.user,
            "uid": self.uid,
            "gid": self.gid,
        })
    }
}

/// Infers the runtime environment from well-known markers.
fn detect_environment() -> RuntimeEnvironment {
    // systemd sets INVOCATION_ID for every unit it starts.
    if env::var_os("INVOCATION_ID").is_some() {
        return RuntimeEnvironment::Systemd;
    }

    if Path::new("/.dockerenv").exists() {
        return RuntimeEnvironment::Container;
    }

    if let Ok(cgroup) = fs::read_to_string("/proc/self/cgroup") {
        if cgroup.contains("docker") || cgroup.contains("containerd") {
            return RuntimeEnvironment::Container;
        }
    }

    if let Ok(comm) = fs::read_to_string("/proc/1/comm") {
        if comm.trim_end() == "systemd" {
            return RuntimeEnvironment::Systemd;
        }
    }

    RuntimeEnvironment::Standalone
}
