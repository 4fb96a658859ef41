// Config commands - manage this tool's own configuration file.

use crate::commands::load_config;
use crate::config::AppConfig;
use crate::transport::SshTransport;

pub async fn init(force: bool) -> Result<(), String> {
    let path = AppConfig::default_path();
    if path.exists() && !force {
        return Err(format!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        ));
    }

    AppConfig::default().save().map_err(|e| e.to_string())?;
    println!("wrote {}", path.display());
    println!("fill in the connection details before using the server or api commands");
    Ok(())
}

pub async fn show() -> Result<(), String> {
    let config = load_config()?;
    let rendered = serde_json::to_string_pretty(&config.redacted()).map_err(|e| e.to_string())?;
    println!("{}", rendered);
    Ok(())
}

pub async fn path() -> Result<(), String> {
    println!("{}", AppConfig::default_path().display());
    Ok(())
}

/// Checks that the host answers over SSH with the configured connection
/// details.
pub async fn test() -> Result<(), String> {
    let config = load_config()?;
    println!("connecting...");
    SshTransport::new(&config)
        .test_connection()
        .await
        .map_err(|e| e.to_string())?;
    println!("connected");
    Ok(())
}
