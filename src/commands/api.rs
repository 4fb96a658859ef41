// API commands - in-game administration over the server's REST API.

use crate::api::ControlClient;
use crate::commands::load_config;

fn client() -> Result<ControlClient, String> {
    let config = load_config()?;
    ControlClient::new(&config).map_err(|e| e.to_string())
}

pub async fn status() -> Result<(), String> {
    let message = client()?.test_connection().await.map_err(|e| e.to_string())?;
    println!("{}", message);
    Ok(())
}

pub async fn info() -> Result<(), String> {
    let info = client()?.info().await.map_err(|e| e.to_string())?;
    let rendered = serde_json::to_string_pretty(&info).map_err(|e| e.to_string())?;
    println!("{}", rendered);
    Ok(())
}

pub async fn players() -> Result<(), String> {
    let players = client()?.players().await.map_err(|e| e.to_string())?;
    if players.is_empty() {
        println!("no players online");
        return Ok(());
    }

    println!("{} player(s) online:", players.len());
    for player in players {
        // Which id field the server fills depends on its build.
        let uid = if player.player_id.is_empty() {
            &player.user_id
        } else {
            &player.player_id
        };
        let ip = if player.ip.is_empty() {
            String::new()
        } else {
            format!(", ip {}", player.ip)
        };
        println!(
            "  {} (uid {}, level {}, ping {:.0}ms{})",
            player.name, uid, player.level, player.ping, ip
        );
    }
    Ok(())
}

pub async fn kick(player_uid: String) -> Result<(), String> {
    client()?.kick(&player_uid).await.map_err(|e| e.to_string())?;
    println!("kicked {}", player_uid);
    Ok(())
}

pub async fn ban(player_uid: String) -> Result<(), String> {
    client()?.ban(&player_uid).await.map_err(|e| e.to_string())?;
    println!("banned {}", player_uid);
    Ok(())
}

pub async fn teleport(player_uid: String, x: f64, y: f64, z: f64) -> Result<(), String> {
    client()?
        .teleport(&player_uid, x, y, z)
        .await
        .map_err(|e| e.to_string())?;
    println!("teleported {} to ({}, {}, {})", player_uid, x, y, z);
    Ok(())
}

pub async fn save() -> Result<(), String> {
    client()?.save().await.map_err(|e| e.to_string())?;
    println!("world save requested");
    Ok(())
}

pub async fn announce(message: String) -> Result<(), String> {
    client()?.announce(&message).await.map_err(|e| e.to_string())?;
    println!("announcement sent");
    Ok(())
}

pub async fn shutdown() -> Result<(), String> {
    client()?.shutdown().await.map_err(|e| e.to_string())?;
    println!("shutdown requested");
    Ok(())
}
