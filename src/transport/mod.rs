// Remote transport - how the tool reaches the machine the server runs on.

mod ssh;

pub use ssh::SshTransport;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to launch {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("command timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("connection test failed: {0}")]
    ConnectFailed(String),

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("local file not found: {}", .0.display())]
    LocalFileMissing(PathBuf),
}

/// What a remote command produced. A non-zero exit is data, not an error;
/// probes like `grep` report through it.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Best error text available: stderr if it says anything, stdout
    /// otherwise.
    pub fn error_text(&self) -> String {
        let err = self.stderr.trim();
        if err.is_empty() {
            self.stdout.trim().to_string()
        } else {
            err.to_string()
        }
    }
}

/// Channel to the server host. The server manager and settings sync are
/// written against this, so tests can swap in a scripted transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Runs a shell command on the server host, bounded by `limit`.
    async fn run_timeout(
        &self,
        command: &str,
        limit: Duration,
    ) -> Result<CommandOutput, TransportError>;

    /// Runs a shell command with the default timeout.
    async fn run(&self, command: &str) -> Result<CommandOutput, TransportError> {
        self.run_timeout(command, DEFAULT_TIMEOUT).await
    }

    /// Copies a local file onto the server host.
    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransportError>;

    /// Copies a file from the server host to this machine.
    async fn download(&self, remote: &str, local: &Path) -> Result<(), TransportError>;

    /// Expands `~` and symlinks into an absolute remote path. Falls back to
    /// the path as given when the host cannot resolve it.
    async fn resolve_path(&self, path: &str) -> Result<String, TransportError> {
        // Deliberately unquoted so the remote shell expands `~`.
        let output = self.run(&format!("readlink -f {}", path)).await?;
        let resolved = output.stdout.trim();
        if output.success() && !resolved.is_empty() {
            Ok(resolved.to_string())
        } else {
            Ok(path.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_text_prefers_stderr() {
        let output = CommandOutput {
            stdout: "partial output\n".to_string(),
            stderr: "Fatal: network error\n".to_string(),
            status: 1,
        };
        assert_eq!(output.error_text(), "Fatal: network error");
    }

    #[test]
    fn error_text_falls_back_to_stdout() {
        let output = CommandOutput {
            stdout: "Access denied\n".to_string(),
            stderr: "".to_string(),
            status: 1,
        };
        assert_eq!(output.error_text(), "Access denied");
    }
}
