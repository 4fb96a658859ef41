// App configuration - connection details and paths for the managed server,
// persisted as JSON in the user's home directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to access config at {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Everything the tool needs to know about one remote Palworld server.
/// Missing fields in the file fall back to defaults, so old config files
/// keep loading as new fields appear.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Saved PuTTY session to connect through, used unless
    /// `use_direct_connection` is set.
    pub putty_session: String,
    /// Path of PalWorldSettings.ini on the server, `~` allowed.
    pub remote_config_path: String,
    /// Where pulled settings files land on this machine.
    pub local_config_path: PathBuf,
    /// Base URL of the server's REST API, e.g. `http://host:8212`.
    pub api_base: String,
    pub api_username: String,
    pub api_password: String,
    /// Explicit plink/pscp binaries; otherwise resolved from PATH.
    pub plink_path: Option<PathBuf>,
    pub pscp_path: Option<PathBuf>,
    pub ssh_host: Option<String>,
    pub ssh_port: u16,
    pub ssh_username: Option<String>,
    /// Connect with host/port/user instead of a saved PuTTY session.
    pub use_direct_connection: bool,
    /// Install directory of the dedicated server on the remote host.
    pub server_path: String,
    /// GNU screen session the server process runs inside.
    pub screen_session: String,
    /// steamcmd binary on the remote host, used for updates.
    pub steamcmd_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            putty_session: "Your Putty Session Name".to_string(),
            remote_config_path:
                "~/Steam/steamapps/common/PalServer/Pal/Saved/Config/LinuxServer/PalWorldSettings.ini"
                    .to_string(),
            local_config_path: app_dir().join("downloads").join("PalWorldSettings.ini"),
            api_base: "http://yourIP:yourport".to_string(),
            api_username: "admin".to_string(),
            api_password: "yourpwd".to_string(),
            plink_path: None,
            pscp_path: None,
            ssh_host: None,
            ssh_port: 22,
            ssh_username: None,
            use_direct_connection: false,
            server_path: "~/Steam/steamapps/common/PalServer".to_string(),
            screen_session: "palworld_server".to_string(),
            steamcmd_path: "~/steamcmd/steamcmd.sh".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads the config from its default location; a missing file is not an
    /// error and yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::default_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Io(parent.to_path_buf(), e))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::Io(path.to_path_buf(), e))
    }

    pub fn default_path() -> PathBuf {
        app_dir().join("config.json")
    }

    pub fn backups_dir() -> PathBuf {
        app_dir().join("backups")
    }

    /// plink binary to run: the configured one, or whatever PATH resolves.
    pub fn plink_command(&self) -> PathBuf {
        self.plink_path.clone().unwrap_or_else(|| PathBuf::from("plink"))
    }

    /// pscp binary to run: the configured one, or whatever PATH resolves.
    pub fn pscp_command(&self) -> PathBuf {
        self.pscp_path.clone().unwrap_or_else(|| PathBuf::from("pscp"))
    }

    /// Copy safe to print: the API password is blanked out.
    pub fn redacted(&self) -> AppConfig {
        let mut copy = self.clone();
        if !copy.api_password.is_empty() {
            copy.api_password = "********".to_string();
        }
        copy
    }
}

fn app_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Palwarden")
}
