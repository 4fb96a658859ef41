// Server Manager - drives the dedicated server on the remote host through a
// GNU screen session: start/stop, logs, SteamCMD updates and save backups.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::transport::{Transport, TransportError};

const PALWORLD_APP_ID: u32 = 2394010;
const UPDATE_SESSION: &str = "steamcmd_update";
const UPDATE_LOG: &str = "~/steamcmd_update.log";
const LOG_SNAPSHOT: &str = "/tmp/palworld_logs.txt";

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("server is already running")]
    AlreadyRunning,

    #[error("server is not running")]
    NotRunning,

    #[error("server failed to start, check server.log on the host")]
    StartFailed,

    #[error("server did not stop, screen session still alive")]
    StopFailed,

    #[error("remote command failed: {0}")]
    Remote(String),

    #[error("failed to prepare {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub running: bool,
    pub screen_session: String,
    pub server_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_info: Option<String>,
}

pub struct ServerManager<T: Transport> {
    transport: T,
    server_path: String,
    screen_session: String,
    steamcmd_path: String,
    start_wait: Duration,
    stop_wait: Duration,
}

impl<T: Transport> ServerManager<T> {
    pub fn new(transport: T, config: &AppConfig) -> Self {
        ServerManager {
            transport,
            server_path: config.server_path.clone(),
            screen_session: config.screen_session.clone(),
            steamcmd_path: config.steamcmd_path.clone(),
            start_wait: Duration::from_secs(5),
            stop_wait: Duration::from_secs(10),
        }
    }

    /// Whether the server's screen session exists on the host.
    pub async fn is_running(&self) -> Result<bool, ServerError> {
        let output = self
            .transport
            .run(&format!("screen -list | grep {}", self.screen_session))
            .await?;
        Ok(output.success() && output.stdout.contains(&self.screen_session))
    }

    pub async fn status(&self) -> Result<ServerStatus, ServerError> {
        let mut status = ServerStatus {
            running: self.is_running().await?,
            screen_session: self.screen_session.clone(),
            server_path: self.server_path.clone(),
            session_info: None,
            process_info: None,
        };
        if !status.running {
            return Ok(status);
        }

        let output = self
            .transport
            .run(&format!("screen -list | grep {}", self.screen_session))
            .await?;
        if !output.stdout.trim().is_empty() {
            status.session_info = Some(output.stdout.trim().to_string());
        }

        let output = self
            .transport
            .run("ps aux | grep PalServer | grep -v grep")
            .await?;
        if !output.stdout.trim().is_empty() {
            status.process_info = Some(output.stdout.trim().to_string());
        }
        Ok(status)
    }

    /// Starts the server in a detached screen session, with its output
    /// redirected to server.log in the install directory.
    pub async fn start(&self, port: u16, players: u32) -> Result<(), ServerError> {
        if self.is_running().await? {
            return Err(ServerError::AlreadyRunning);
        }

        info!("starting server in screen session {}", self.screen_session);
        let command = format!(
            "screen -dmS {} bash -c 'cd {} && ./PalServer.sh -port={} -players={} \
             -useperfthreads -NoAsyncLoadingThread -UseMultithreadForDS \
             -NumberOfWorkerThreadsServer=3 > server.log 2>&1'",
            self.screen_session, self.server_path, port, players
        );
        let output = self
            .transport
            .run_timeout(&command, Duration::from_secs(60))
            .await?;
        if !output.success() {
            return Err(ServerError::Remote(output.error_text()));
        }

        sleep(self.start_wait).await;
        if self.is_running().await? {
            Ok(())
        } else {
            Err(ServerError::StartFailed)
        }
    }

    /// Asks the server to quit gracefully, then kills the screen session if
    /// it ignores us.
    pub async fn stop(&self) -> Result<(), ServerError> {
        if !self.is_running().await? {
            return Err(ServerError::NotRunning);
        }

        info!("sending quit to screen session {}", self.screen_session);
        self.transport
            .run(&format!(
                "screen -S {} -X stuff $'quit\\n'",
                self.screen_session
            ))
            .await?;
        sleep(self.stop_wait).await;

        if self.is_running().await? {
            warn!("server still up after quit, killing the screen session");
            self.transport
                .run(&format!("screen -S {} -X quit", self.screen_session))
                .await?;
            sleep(self.start_wait).await;
            if self.is_running().await? {
                return Err(ServerError::StopFailed);
            }
        }
        Ok(())
    }

    /// Stop followed by start; a server that was not running to begin with
    /// is fine.
    pub async fn restart(&self, port: u16, players: u32) -> Result<(), ServerError> {
        match self.stop().await {
            Ok(()) | Err(ServerError::NotRunning) => {}
            Err(e) => return Err(e),
        }
        sleep(self.start_wait).await;
        self.start(port, players).await
    }

    /// Types `command` into the server console.
    pub async fn send_command(&self, command: &str) -> Result<(), ServerError> {
        if !self.is_running().await? {
            return Err(ServerError::NotRunning);
        }
        let output = self
            .transport
            .run(&format!(
                "screen -S {} -X stuff $'{}\\n'",
                self.screen_session, command
            ))
            .await?;
        if output.success() {
            Ok(())
        } else {
            Err(ServerError::Remote(output.error_text()))
        }
    }

    /// Last `lines` of console output, via a screen hardcopy on the host.
    pub async fn logs(&self, lines: u32) -> Result<String, ServerError> {
        if !self.is_running().await? {
            return Err(ServerError::NotRunning);
        }

        let output = self
            .transport
            .run(&format!(
                "screen -S {} -X hardcopy {}",
                self.screen_session, LOG_SNAPSHOT
            ))
            .await?;
        if !output.success() {
            return Err(ServerError::Remote(output.error_text()));
        }

        let output = self
            .transport
            .run(&format!("tail -n {} {}", lines, LOG_SNAPSHOT))
            .await?;
        if output.success() && !output.stdout.trim().is_empty() {
            Ok(output.stdout)
        } else {
            Err(ServerError::Remote(nonempty_error(&output.error_text(), "no log output captured")))
        }
    }

    /// Updates the server through SteamCMD in its own screen session. The
    /// update runs in the background; watch it with
    /// [`update_running`](Self::update_running) and
    /// [`update_log`](Self::update_log).
    pub async fn update(&self) -> Result<(), ServerError> {
        if self.is_running().await? {
            info!("stopping server before update");
            self.stop().await?;
            sleep(self.stop_wait).await;
        }

        let command = format!(
            "screen -dmS {} bash -c \"{} +login anonymous +app_update {} validate +quit | tee {}\"",
            UPDATE_SESSION, self.steamcmd_path, PALWORLD_APP_ID, UPDATE_LOG
        );
        let output = self.transport.run(&command).await?;
        if output.success() {
            Ok(())
        } else {
            Err(ServerError::Remote(output.error_text()))
        }
    }

    /// Whether the SteamCMD update session is still alive.
    pub async fn update_running(&self) -> Result<bool, ServerError> {
        let output = self
            .transport
            .run(&format!("screen -list | grep {}", UPDATE_SESSION))
            .await?;
        Ok(output.success() && output.stdout.contains(UPDATE_SESSION))
    }

    /// Last `lines` of the SteamCMD update log.
    pub async fn update_log(&self, lines: u32) -> Result<String, ServerError> {
        let output = self
            .transport
            .run(&format!("tail -n {} {}", lines, UPDATE_LOG))
            .await?;
        if output.success() && !output.stdout.trim().is_empty() {
            Ok(output.stdout)
        } else {
            Err(ServerError::Remote(nonempty_error(&output.error_text(), "no update log found")))
        }
    }

    /// Archives Pal/Saved on the host, downloads the archive into
    /// `local_dir` and removes the remote scratch file. Returns the local
    /// archive path.
    pub async fn backup(&self, local_dir: &Path) -> Result<PathBuf, ServerError> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let remote_archive = format!("/tmp/palworld_saved_backup_{}.tar.gz", stamp);
        let local_path = local_dir.join(format!("PalServer_Saved_backup_{}.tar.gz", stamp));

        std::fs::create_dir_all(local_dir)
            .map_err(|e| ServerError::Io(local_dir.to_path_buf(), e))?;

        let server_path = self.transport.resolve_path(&self.server_path).await?;
        info!("archiving {}/Pal/Saved on the host", server_path);
        let tar = format!(
            "tar czf {} -C {} Saved",
            shell_words::quote(&remote_archive),
            shell_words::quote(&format!("{}/Pal", server_path)),
        );
        let output = self
            .transport
            .run_timeout(&tar, Duration::from_secs(120))
            .await?;
        if !output.success() {
            return Err(ServerError::Remote(output.error_text()));
        }

        let result = self.transport.download(&remote_archive, &local_path).await;
        // The archive is scratch data on the host either way.
        let _ = self
            .transport
            .run(&format!("rm -f {}", shell_words::quote(&remote_archive)))
            .await;
        result?;

        Ok(local_path)
    }
}

fn nonempty_error(text: &str, fallback: &str) -> String {
    if text.is_empty() {
        fallback.to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::CommandOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeTransport {
        // Matched by substring and consumed in order; unmatched commands
        // succeed with empty output.
        rules: Mutex<Vec<(String, CommandOutput)>>,
        calls: Mutex<Vec<String>>,
        downloads: Mutex<Vec<(String, PathBuf)>>,
    }

    impl FakeTransport {
        fn respond(self, needle: &str, output: CommandOutput) -> Self {
            self.rules.lock().unwrap().push((needle.to_string(), output));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn ok(stdout: &str) -> CommandOutput {
            CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                status: 0,
            }
        }

        fn not_found() -> CommandOutput {
            CommandOutput {
                status: 1,
                ..CommandOutput::default()
            }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn run_timeout(
            &self,
            command: &str,
            _limit: Duration,
        ) -> Result<CommandOutput, TransportError> {
            self.calls.lock().unwrap().push(command.to_string());
            let mut rules = self.rules.lock().unwrap();
            if let Some(index) = rules.iter().position(|(needle, _)| command.contains(needle)) {
                return Ok(rules.remove(index).1);
            }
            Ok(CommandOutput {
                status: 0,
                ..CommandOutput::default()
            })
        }

        async fn upload(&self, _local: &Path, _remote: &str) -> Result<(), TransportError> {
            Ok(())
        }

        async fn download(&self, remote: &str, local: &Path) -> Result<(), TransportError> {
            self.downloads
                .lock()
                .unwrap()
                .push((remote.to_string(), local.to_path_buf()));
            Ok(())
        }
    }

    const SESSION_LINE: &str = "\t12345.palworld_server\t(Detached)";

    fn manager(transport: FakeTransport) -> ServerManager<FakeTransport> {
        ServerManager {
            transport,
            server_path: "~/Steam/steamapps/common/PalServer".to_string(),
            screen_session: "palworld_server".to_string(),
            steamcmd_path: "~/steamcmd/steamcmd.sh".to_string(),
            start_wait: Duration::ZERO,
            stop_wait: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn running_means_the_screen_session_greps() {
        let manager = manager(FakeTransport::default().respond(
            "screen -list | grep palworld_server",
            FakeTransport::ok(SESSION_LINE),
        ));
        assert!(manager.is_running().await.unwrap());
    }

    #[tokio::test]
    async fn grep_miss_means_not_running() {
        let manager = manager(FakeTransport::default().respond(
            "screen -list | grep palworld_server",
            FakeTransport::not_found(),
        ));
        assert!(!manager.is_running().await.unwrap());
    }

    #[tokio::test]
    async fn start_refuses_when_already_running() {
        let manager = manager(FakeTransport::default().respond(
            "screen -list | grep palworld_server",
            FakeTransport::ok(SESSION_LINE),
        ));
        let err = manager.start(8211, 32).await.unwrap_err();
        assert!(matches!(err, ServerError::AlreadyRunning));
    }

    #[tokio::test]
    async fn start_launches_screen_and_verifies() {
        let manager = manager(
            FakeTransport::default()
                .respond("screen -list | grep palworld_server", FakeTransport::not_found())
                .respond("screen -list | grep palworld_server", FakeTransport::ok(SESSION_LINE)),
        );
        manager.start(8211, 32).await.unwrap();

        let calls = manager.transport.calls();
        let launch = &calls[1];
        assert!(launch.starts_with("screen -dmS palworld_server bash -c"));
        assert!(launch.contains("./PalServer.sh -port=8211 -players=32"));
        assert!(launch.contains("-useperfthreads -NoAsyncLoadingThread -UseMultithreadForDS"));
        assert!(launch.contains("> server.log 2>&1"));
    }

    #[tokio::test]
    async fn start_reports_failure_when_session_never_appears() {
        let manager = manager(
            FakeTransport::default()
                .respond("screen -list | grep palworld_server", FakeTransport::not_found())
                .respond("screen -list | grep palworld_server", FakeTransport::not_found()),
        );
        let err = manager.start(8211, 32).await.unwrap_err();
        assert!(matches!(err, ServerError::StartFailed));
    }

    #[tokio::test]
    async fn stop_sends_quit_and_confirms_shutdown() {
        let manager = manager(
            FakeTransport::default()
                .respond("screen -list | grep palworld_server", FakeTransport::ok(SESSION_LINE))
                .respond("screen -list | grep palworld_server", FakeTransport::not_found()),
        );
        manager.stop().await.unwrap();

        let calls = manager.transport.calls();
        assert!(calls.contains(&"screen -S palworld_server -X stuff $'quit\\n'".to_string()));
        assert!(!calls.iter().any(|c| c.ends_with("-X quit")));
    }

    #[tokio::test]
    async fn stop_escalates_to_killing_the_session() {
        let manager = manager(
            FakeTransport::default()
                .respond("screen -list | grep palworld_server", FakeTransport::ok(SESSION_LINE))
                .respond("screen -list | grep palworld_server", FakeTransport::ok(SESSION_LINE))
                .respond("screen -list | grep palworld_server", FakeTransport::not_found()),
        );
        manager.stop().await.unwrap();

        let calls = manager.transport.calls();
        assert!(calls.contains(&"screen -S palworld_server -X quit".to_string()));
    }

    #[tokio::test]
    async fn stop_fails_when_the_session_survives_the_kill() {
        let manager = manager(
            FakeTransport::default()
                .respond("screen -list | grep palworld_server", FakeTransport::ok(SESSION_LINE))
                .respond("screen -list | grep palworld_server", FakeTransport::ok(SESSION_LINE))
                .respond("screen -list | grep palworld_server", FakeTransport::ok(SESSION_LINE)),
        );
        let err = manager.stop().await.unwrap_err();
        assert!(matches!(err, ServerError::StopFailed));
    }

    #[tokio::test]
    async fn restart_tolerates_a_stopped_server() {
        let manager = manager(
            FakeTransport::default()
                .respond("screen -list | grep palworld_server", FakeTransport::not_found())
                .respond("screen -list | grep palworld_server", FakeTransport::not_found())
                .respond("screen -list | grep palworld_server", FakeTransport::ok(SESSION_LINE)),
        );
        manager.restart(8211, 32).await.unwrap();
    }

    #[tokio::test]
    async fn send_command_types_into_the_console() {
        let manager = manager(FakeTransport::default().respond(
            "screen -list | grep palworld_server",
            FakeTransport::ok(SESSION_LINE),
        ));
        manager.send_command("Save").await.unwrap();

        let calls = manager.transport.calls();
        assert!(calls.contains(&"screen -S palworld_server -X stuff $'Save\\n'".to_string()));
    }

    #[tokio::test]
    async fn send_command_requires_a_running_server() {
        let manager = manager(FakeTransport::default().respond(
            "screen -list | grep palworld_server",
            FakeTransport::not_found(),
        ));
        let err = manager.send_command("Save").await.unwrap_err();
        assert!(matches!(err, ServerError::NotRunning));
    }

    #[tokio::test]
    async fn logs_snapshot_the_screen_and_tail_it() {
        let manager = manager(
            FakeTransport::default()
                .respond("screen -list | grep palworld_server", FakeTransport::ok(SESSION_LINE))
                .respond("tail -n 50 /tmp/palworld_logs.txt", FakeTransport::ok("[log] up\n")),
        );
        let logs = manager.logs(50).await.unwrap();
        assert_eq!(logs, "[log] up\n");

        let calls = manager.transport.calls();
        assert!(calls
            .contains(&"screen -S palworld_server -X hardcopy /tmp/palworld_logs.txt".to_string()));
    }

    #[tokio::test]
    async fn update_stops_the_server_and_launches_steamcmd() {
        let manager = manager(
            FakeTransport::default()
                .respond("screen -list | grep palworld_server", FakeTransport::ok(SESSION_LINE))
                .respond("screen -list | grep palworld_server", FakeTransport::ok(SESSION_LINE))
                .respond("screen -list | grep palworld_server", FakeTransport::not_found()),
        );
        manager.update().await.unwrap();

        let calls = manager.transport.calls();
        let launch = calls.last().unwrap();
        assert!(launch.starts_with("screen -dmS steamcmd_update bash -c"));
        assert!(launch.contains("+login anonymous +app_update 2394010 validate +quit"));
        assert!(launch.contains("tee ~/steamcmd_update.log"));
    }

    #[tokio::test]
    async fn update_running_greps_the_update_session() {
        let manager = manager(FakeTransport::default().respond(
            "screen -list | grep steamcmd_update",
            FakeTransport::ok("\t999.steamcmd_update\t(Detached)"),
        ));
        assert!(manager.update_running().await.unwrap());
    }

    #[tokio::test]
    async fn update_log_tails_the_remote_file() {
        let manager = manager(FakeTransport::default().respond(
            "tail -n 20 ~/steamcmd_update.log",
            FakeTransport::ok("Update state (0x61) downloading\n"),
        ));
        let log = manager.update_log(20).await.unwrap();
        assert!(log.contains("downloading"));
    }

    #[tokio::test]
    async fn backup_archives_downloads_and_cleans_up() {
        let local_dir = std::env::temp_dir().join(format!("palwarden-backup-{}", uuid::Uuid::new_v4()));
        let manager = manager(FakeTransport::default().respond(
            "readlink -f",
            FakeTransport::ok("/home/steam/Steam/steamapps/common/PalServer\n"),
        ));

        let path = manager.backup(&local_dir).await.unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("PalServer_Saved_backup_"));

        let calls = manager.transport.calls();
        let tar = calls
            .iter()
            .find(|c| c.starts_with("tar czf /tmp/palworld_saved_backup_"))
            .unwrap();
        assert!(tar.ends_with("-C /home/steam/Steam/steamapps/common/PalServer/Pal Saved"));
        assert!(calls.iter().any(|c| c.starts_with("rm -f /tmp/palworld_saved_backup_")));

        let downloads = manager.transport.downloads.lock().unwrap();
        assert_eq!(downloads.len(), 1);
        assert!(downloads[0].0.starts_with("/tmp/palworld_saved_backup_"));

        std::fs::remove_dir_all(&local_dir).unwrap();
    }
}
