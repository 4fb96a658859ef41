// REST API access to the running server's in-game administration.

mod client;

pub use client::{ApiError, ControlClient, PlayerEntry};
