//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Workspace holding the global templates.
pub const DEFAULT_TEMPLATE_WORKSPACE_ID: &str = "0";

/// Root block of the stock welcome template.
pub const DEFAULT_TEMPLATE_ROOT_ID: &str = "buixxjic3xjfkieees4iafdrznc";

/// Board, views and cards, plus card contents.
pub const DEFAULT_TEMPLATE_DEPTH: u32 = 3;

pub const DEFAULT_WELCOME_BOARD_TITLE: &str = "Welcome to Boards!";

/// Where the welcome template lives and how to recognise its board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingConfig {
    /// Workspace containing the template subtree.
    pub template_workspace_id: String,
    /// Root block of the template subtree.
    pub template_root_id: String,
    /// Number of levels fetched below and including the root.
    pub template_depth: u32,
    /// Title the cloned welcome board must carry. `None` disables the check.
    pub welcome_board_title: Option<String>,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            template_workspace_id: DEFAULT_TEMPLATE_WORKSPACE_ID.to_string(),
            template_root_id: DEFAULT_TEMPLATE_ROOT_ID.to_string(),
            template_depth: DEFAULT_TEMPLATE_DEPTH,
            welcome_board_title: Some(DEFAULT_WELCOME_BOARD_TITLE.to_string()),
        }
    }
}

impl OnboardingConfig {
    /// Build from environment variables, falling back to defaults.
    ///
    /// - `BOARDS_TEMPLATE_WORKSPACE`
    /// - `BOARDS_TEMPLATE_ROOT`
    /// - `BOARDS_TEMPLATE_DEPTH` (positive integer)
    /// - `BOARDS_WELCOME_TITLE` (empty disables the title check)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(workspace) = lookup("BOARDS_TEMPLATE_WORKSPACE") {
            config.template_workspace_id = workspace;
        }
        if let Some(root) = lookup("BOARDS_TEMPLATE_ROOT") {
            config.template_root_id = root;
        }
        if let Some(raw) = lookup("BOARDS_TEMPLATE_DEPTH") {
            config.template_depth = match raw.trim().parse::<u32>() {
                Ok(depth) if depth > 0 => depth,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "BOARDS_TEMPLATE_DEPTH".to_string(),
                        message: format!("expected a positive integer, got {raw:?}"),
                    });
                }
            };
        }
        if let Some(title) = lookup("BOARDS_WELCOME_TITLE") {
            config.welcome_board_title = if title.is_empty() { None } else { Some(title) };
        }

        Ok(config)
    }
}

/// Location of the libSQL database file.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/boards.db"),
        }
    }
}

impl StoreConfig {
    /// Reads `BOARDS_DB_PATH`.
    pub fn from_env() -> Self {
        std::env::var("BOARDS_DB_PATH")
            .map(|path| Self {
                db_path: PathBuf::from(path),
            })
            .unwrap_or_default()
    }
}
