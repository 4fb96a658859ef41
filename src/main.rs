// Palwarden - manage a remote Palworld dedicated server from the command
// line: settings, process lifecycle, and in-game administration.

mod api;
mod commands;
mod config;
mod server;
mod settings;
mod transport;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "palwarden")]
#[command(about = "Manage a remote Palworld dedicated server", long_about = None)]
struct Cli {
    /// Turn debugging information on
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and edit PalWorldSettings.ini
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Control the server process on the host
    #[command(subcommand)]
    Server(ServerCommand),
    /// In-game administration over the REST API
    #[command(subcommand)]
    Api(ApiCommand),
    /// Manage this tool's own configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// List the fields set in the local settings file
    Show {
        /// Settings file to read instead of the configured local copy
        #[arg(long)]
        file: Option<PathBuf>,
        /// Include every known field, with defaults for the missing ones
        #[arg(long)]
        all: bool,
    },
    /// Print one field's value
    Get {
        field: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Change fields, e.g. `set ExpRate=2 bHardcore=True`
    Set {
        /// Field=Value pairs
        #[arg(required = true)]
        pairs: Vec<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        /// Write even values the schema rejects
        #[arg(long)]
        force: bool,
    },
    /// Check the file against the known field kinds
    Validate {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Download the settings file from the server
    Pull,
    /// Validate and upload the local settings file to the server
    Push {
        /// Upload even if validation fails
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ServerCommand {
    /// Report whether the server is up
    Status,
    /// Start the server in its screen session
    Start {
        #[arg(long, default_value_t = 8211)]
        port: u16,
        #[arg(long, default_value_t = 32)]
        players: u32,
    },
    /// Ask the server to quit, killing the session if it will not
    Stop,
    /// Stop then start the server
    Restart {
        #[arg(long, default_value_t = 8211)]
        port: u16,
        #[arg(long, default_value_t = 32)]
        players: u32,
    },
    /// Update the server through SteamCMD
    Update,
    /// Tail the SteamCMD update log
    UpdateLog {
        #[arg(long, default_value_t = 50)]
        lines: u32,
    },
    /// Tail the server console
    Logs {
        #[arg(long, default_value_t = 50)]
        lines: u32,
    },
    /// Type a command into the server console
    Send { command: String },
    /// Archive Pal/Saved on the host and download it
    Backup {
        /// Directory for the archive, defaults to ~/Palwarden/backups
        #[arg(long)]
        to: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ApiCommand {
    /// Probe whether the REST API is reachable
    Status,
    /// Show the server info document
    Info,
    /// List online players
    Players,
    /// Kick a player by UID
    Kick { player_uid: String },
    /// Ban a player by UID
    Ban { player_uid: String },
    /// Teleport a player to world coordinates
    Teleport {
        player_uid: String,
        x: f64,
        y: f64,
        z: f64,
    },
    /// Save the world
    Save,
    /// Broadcast a message in-game
    Announce { message: String },
    /// Shut the server down gracefully
    Shutdown,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write a config template to fill in
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
    /// Print the current config, password redacted
    Show,
    /// Print where the config lives
    Path,
    /// Check the SSH connection to the host
    Test,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configure logging to keep the HTTP stack quiet unless asked for
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.debug { "debug" } else { "info" })
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap())
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(message) = dispatch(cli.command).await {
        eprintln!("error: {}", message);
        std::process::exit(1);
    }
}

async fn dispatch(command: Commands) -> Result<(), String> {
    match command {
        Commands::Settings(command) => match command {
            SettingsCommand::Show { file, all } => commands::settings::show(file, all).await,
            SettingsCommand::Get { field, file } => commands::settings::get(field, file).await,
            SettingsCommand::Set { pairs, file, force } => {
                commands::settings::set(pairs, file, force).await
            }
            SettingsCommand::Validate { file } => commands::settings::validate(file).await,
            SettingsCommand::Pull => commands::settings::pull().await,
            SettingsCommand::Push { force } => commands::settings::push(force).await,
        },
        Commands::Server(command) => match command {
            ServerCommand::Status => commands::server::status().await,
            ServerCommand::Start { port, players } => commands::server::start(port, players).await,
            ServerCommand::Stop => commands::server::stop().await,
            ServerCommand::Restart { port, players } => {
                commands::server::restart(port, players).await
            }
            ServerCommand::Update => commands::server::update().await,
            ServerCommand::UpdateLog { lines } => commands::server::update_log(lines).await,
            ServerCommand::Logs { lines } => commands::server::logs(lines).await,
            ServerCommand::Send { command } => commands::server::send(command).await,
            ServerCommand::Backup { to } => commands::server::backup(to).await,
        },
        Commands::Api(command) => match command {
            ApiCommand::Status => commands::api::status().await,
            ApiCommand::Info => commands::api::info().await,
            ApiCommand::Players => commands::api::players().await,
            ApiCommand::Kick { player_uid } => commands::api::kick(player_uid).await,
            ApiCommand::Ban { player_uid } => commands::api::ban(player_uid).await,
            ApiCommand::Teleport { player_uid, x, y, z } => {
                commands::api::teleport(player_uid, x, y, z).await
            }
            ApiCommand::Save => commands::api::save().await,
            ApiCommand::Announce { message } => commands::api::announce(message).await,
            ApiCommand::Shutdown => commands::api::shutdown().await,
        },
        Commands::Config(command) => match command {
            ConfigCommand::Init { force } => commands::config::init(force).await,
            ConfigCommand::Show => commands::config::show().await,
            ConfigCommand::Path => commands::config::path().await,
            ConfigCommand::Test => commands::config::test().await,
        },
    }
}
