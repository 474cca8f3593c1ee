use thiserror::Error;

/// Errors raised while collecting inventory from the host.
#[derive(Debug, Error)]
pub enum CollectError {
    /// An external tool could not be started.
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// An external tool ran but exited unsuccessfully.
    #[error("`{program}` exited with {status}: {stderr}")]
    Exit {
        program: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },

    /// The live connection table could not be read.
    #[error("failed to read connection table: {0}")]
    Connections(String),

    /// A D-Bus call to the firewall service failed.
    #[error("firewalld D-Bus call failed: {0}")]
    Firewall(#[from] zbus::Error),

    /// The periodic loop was asked to run with a zero interval.
    #[error("collection interval must be greater than zero")]
    ZeroInterval,

    /// A pass running on the blocking pool panicked or was cancelled.
    #[error("collection task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A metric could not be created or registered.
    #[error("metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T, E = CollectError> = std::result::Result<T, E>;
