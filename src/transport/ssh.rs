// SSH transport - drives plink/pscp, either through a saved PuTTY session
// or a direct user@host connection.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::config::AppConfig;
use crate::transport::{CommandOutput, Transport, TransportError, DEFAULT_TIMEOUT};

#[derive(Debug, Clone)]
enum ConnectionMode {
    /// A session saved in PuTTY, which carries host, credentials and keys.
    Session(String),
    Direct {
        host: String,
        port: u16,
        username: String,
    },
}

pub struct SshTransport {
    plink: PathBuf,
    pscp: PathBuf,
    mode: ConnectionMode,
}

impl SshTransport {
    pub fn new(config: &AppConfig) -> Self {
        let mode = match (&config.ssh_host, &config.ssh_username) {
            (Some(host), Some(username)) if config.use_direct_connection => {
                ConnectionMode::Direct {
                    host: host.clone(),
                    port: config.ssh_port,
                    username: username.clone(),
                }
            }
            _ => ConnectionMode::Session(config.putty_session.clone()),
        };
        SshTransport {
            plink: config.plink_command(),
            pscp: config.pscp_command(),
            mode,
        }
    }

    /// Quick reachability probe over the control channel.
    pub async fn test_connection(&self) -> Result<(), TransportError> {
        let output = self
            .run_timeout("echo connected", Duration::from_secs(15))
            .await?;
        if output.success() {
            Ok(())
        } else {
            Err(TransportError::ConnectFailed(output.error_text()))
        }
    }

    /// plink arguments ahead of the command itself.
    fn base_args(&self) -> Vec<String> {
        match &self.mode {
            ConnectionMode::Session(session) => {
                vec!["-batch".to_string(), session.clone()]
            }
            ConnectionMode::Direct { host, port, username } => vec![
                "-batch".to_string(),
                "-ssh".to_string(),
                format!("{}@{}", username, host),
                "-P".to_string(),
                port.to_string(),
            ],
        }
    }

    /// pscp endpoint spelling for a remote path.
    fn remote_target(&self, path: &str) -> String {
        match &self.mode {
            ConnectionMode::Session(session) => format!("{}:{}", session, path),
            ConnectionMode::Direct { host, username, .. } => {
                format!("{}@{}:{}", username, host, path)
            }
        }
    }

    fn pscp_command(&self) -> Command {
        let mut cmd = Command::new(&self.pscp);
        cmd.arg("-batch");
        if let ConnectionMode::Direct { port, .. } = &self.mode {
            cmd.arg("-ssh").arg("-P").arg(port.to_string());
        }
        cmd
    }

    async fn wait(&self, mut cmd: Command, limit: Duration) -> Result<CommandOutput, TransportError> {
        // A timed-out plink must not linger once we give up on it.
        cmd.kill_on_drop(true);
        let program = cmd.as_std().get_program().to_string_lossy().into_owned();
        debug!("running {:?}", cmd.as_std());

        let output = timeout(limit, cmd.output())
            .await
            .map_err(|_| TransportError::TimedOut(limit))?
            .map_err(|source| TransportError::Spawn { command: program, source })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code().unwrap_or(-1),
        })
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn run_timeout(
        &self,
        command: &str,
        limit: Duration,
    ) -> Result<CommandOutput, TransportError> {
        let mut cmd = Command::new(&self.plink);
        cmd.args(self.base_args()).arg(command);
        self.wait(cmd, limit).await
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransportError> {
        if !local.exists() {
            return Err(TransportError::LocalFileMissing(local.to_path_buf()));
        }
        let remote = self.resolve_path(remote).await?;

        let mut cmd = self.pscp_command();
        cmd.arg(local).arg(self.remote_target(&remote));
        let output = self.wait(cmd, DEFAULT_TIMEOUT).await?;

        if output.success() {
            Ok(())
        } else {
            Err(TransportError::Transfer(output.error_text()))
        }
    }

    async fn download(&self, remote: &str, local: &Path) -> Result<(), TransportError> {
        let remote = self.resolve_path(remote).await?;

        let mut cmd = self.pscp_command();
        cmd.arg(self.remote_target(&remote)).arg(local);
        let output = self.wait(cmd, DEFAULT_TIMEOUT).await?;

        if !output.success() {
            return Err(TransportError::Transfer(output.error_text()));
        }
        // pscp can exit zero without having written anything, e.g. when the
        // remote side printed a banner instead of the file.
        if !local.exists() {
            return Err(TransportError::Transfer(
                "transfer reported success but no file arrived".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_transport() -> SshTransport {
        SshTransport {
            plink: PathBuf::from("plink"),
            pscp: PathBuf::from("pscp"),
            mode: ConnectionMode::Session("palworld-vps".to_string()),
        }
    }

    fn direct_transport() -> SshTransport {
        SshTransport {
            plink: PathBuf::from("plink"),
            pscp: PathBuf::from("pscp"),
            mode: ConnectionMode::Direct {
                host: "203.0.113.9".to_string(),
                port: 2222,
                username: "steam".to_string(),
            },
        }
    }

    #[test]
    fn session_mode_uses_the_saved_session() {
        let args = session_transport().base_args();
        assert_eq!(args, vec!["-batch", "palworld-vps"]);
    }

    #[test]
    fn direct_mode_spells_out_user_host_and_port() {
        let args = direct_transport().base_args();
        assert_eq!(args, vec!["-batch", "-ssh", "steam@203.0.113.9", "-P", "2222"]);
    }

    #[test]
    fn remote_targets_match_the_connection_mode() {
        assert_eq!(
            session_transport().remote_target("/srv/pal/Settings.ini"),
            "palworld-vps:/srv/pal/Settings.ini"
        );
        assert_eq!(
            direct_transport().remote_target("/srv/pal/Settings.ini"),
            "steam@203.0.113.9:/srv/pal/Settings.ini"
        );
    }

    #[test]
    fn direct_connection_needs_host_and_username() {
        let config = AppConfig {
            use_direct_connection: true,
            ssh_host: Some("203.0.113.9".to_string()),
            ssh_username: None,
            ..AppConfig::default()
        };
        let transport = SshTransport::new(&config);
        // Half-configured direct mode falls back to the PuTTY session.
        assert!(matches!(transport.mode, ConnectionMode::Session(_)));
    }

    #[test]
    fn full_direct_config_selects_direct_mode() {
        let config = AppConfig {
            use_direct_connection: true,
            ssh_host: Some("203.0.113.9".to_string()),
            ssh_username: Some("steam".to_string()),
            ssh_port: 2222,
            ..AppConfig::default()
        };
        let transport = SshTransport::new(&config);
        assert!(matches!(
            transport.mode,
            ConnectionMode::Direct { port: 2222, .. }
        ));
    }
}
