//! `BlockStore` trait — the persistence surface onboarding depends on.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::model::{Block, Container, UserPropPatch, UserProps};

/// Backend-agnostic store for blocks, workspaces and user properties.
///
/// Calls are independent of each other; nothing here spans a transaction
/// across methods.
#[async_trait]
pub trait BlockStore: Send + Sync {
    // ── Blocks ──────────────────────────────────────────────────────

    /// Fetch the live subtree under `root_id`, root included.
    ///
    /// `levels` counts the root as level 1. A missing root yields an empty
    /// vec, not an error.
    async fn get_subtree(
        &self,
        container: &Container,
        root_id: &str,
        levels: u32,
    ) -> Result<Vec<Block>, DatabaseError>;

    /// Insert (or overwrite) a block in `container`, attributed to `user_id`.
    async fn insert_block(
        &self,
        container: &Container,
        block: &Block,
        user_id: &str,
    ) -> Result<(), DatabaseError>;

    // ── Workspaces ──────────────────────────────────────────────────

    /// Return the user's private workspace, creating it on first call.
    async fn create_private_workspace(&self, user_id: &str) -> Result<String, DatabaseError>;

    // ── User properties ─────────────────────────────────────────────

    /// Merge `patch` into the user's stored properties.
    async fn patch_user_props(
        &self,
        user_id: &str,
        patch: &UserPropPatch,
    ) -> Result<(), DatabaseError>;

    /// All stored properties of a user (empty if none).
    async fn get_user_props(&self, user_id: &str) -> Result<UserProps, DatabaseError>;
}
