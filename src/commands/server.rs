// Server commands - lifecycle operations against the remote host.

use std::path::PathBuf;

use crate::commands::load_config;
use crate::config::AppConfig;
use crate::server::ServerManager;
use crate::transport::SshTransport;

fn manager() -> Result<ServerManager<SshTransport>, String> {
    let config = load_config()?;
    Ok(ServerManager::new(SshTransport::new(&config), &config))
}

pub async fn status() -> Result<(), String> {
    let status = manager()?.status().await.map_err(|e| e.to_string())?;
    let rendered = serde_json::to_string_pretty(&status).map_err(|e| e.to_string())?;
    println!("{}", rendered);
    Ok(())
}

pub async fn start(port: u16, players: u32) -> Result<(), String> {
    println!("starting server (port {}, {} players max)...", port, players);
    manager()?.start(port, players).await.map_err(|e| e.to_string())?;
    println!("server is up, console output goes to server.log on the host");
    Ok(())
}

pub async fn stop() -> Result<(), String> {
    println!("stopping server...");
    manager()?.stop().await.map_err(|e| e.to_string())?;
    println!("server stopped");
    Ok(())
}

pub async fn restart(port: u16, players: u32) -> Result<(), String> {
    println!("restarting server (port {}, {} players max)...", port, players);
    manager()?.restart(port, players).await.map_err(|e| e.to_string())?;
    println!("server is up again");
    Ok(())
}

pub async fn update() -> Result<(), String> {
    manager()?.update().await.map_err(|e| e.to_string())?;
    println!("update started in the background on the host");
    println!("watch it with `palwarden server update-log`");
    Ok(())
}

pub async fn update_log(lines: u32) -> Result<(), String> {
    let manager = manager()?;
    if manager.update_running().await.map_err(|e| e.to_string())? {
        println!("update is still running");
    }
    let log = manager.update_log(lines).await.map_err(|e| e.to_string())?;
    print!("{}", log);
    Ok(())
}

pub async fn logs(lines: u32) -> Result<(), String> {
    let log = manager()?.logs(lines).await.map_err(|e| e.to_string())?;
    print!("{}", log);
    Ok(())
}

pub async fn send(command: String) -> Result<(), String> {
    manager()?.send_command(&command).await.map_err(|e| e.to_string())?;
    println!("sent '{}' to the server console", command);
    Ok(())
}

pub async fn backup(to: Option<PathBuf>) -> Result<(), String> {
    let dir = to.unwrap_or_else(AppConfig::backups_dir);
    println!("backing up Pal/Saved from the host...");
    let path = manager()?.backup(&dir).await.map_err(|e| e.to_string())?;
    println!("backup saved to {}", path.display());
    Ok(())
}
