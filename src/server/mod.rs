// Server lifecycle management for the remote dedicated server.

mod manager;

pub use manager::{ServerError, ServerManager, ServerStatus};
