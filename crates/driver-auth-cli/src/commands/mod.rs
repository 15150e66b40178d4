//! CLI command implementations.

mod auth;
mod session;

pub use auth::{login_magic, login_sms, magic_link};
pub use session::{logout, status, token, validate};

use anyhow::{Context, Result};
use driver_auth::SessionManager;
use sdk_config_and_utils::{Config, Paths};

/// Resolved configuration shared by every command.
pub struct CommandContext {
    pub paths: Paths,
    pub config: Config,
}

impl CommandContext {
    /// Build the session manager, restoring any persisted session.
    pub fn session_manager(&self) -> Result<SessionManager> {
        SessionManager::from_config(&self.config, &self.paths)
            .context("failed to create session manager")
    }
}
