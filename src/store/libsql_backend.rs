//! libSQL backend — async `BlockStore` implementation.
//!
//! Supports local file and in-memory databases.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::model::{Block, BlockFields, BlockType, Container, UserPropPatch, UserProps};
use crate::store::migrations;
use crate::store::traits::BlockStore;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    /// All live blocks of a workspace, oldest first.
    pub async fn list_blocks(&self, container: &Container) -> Result<Vec<Block>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {BLOCK_COLUMNS} FROM blocks
                     WHERE workspace_id = ?1 AND delete_at = 0
                     ORDER BY create_at, id"
                ),
                params![container.workspace_id.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_blocks: {e}")))?;
        collect_blocks(&mut rows, "list_blocks").await
    }

    async fn get_block(
        &self,
        container: &Container,
        id: &str,
    ) -> Result<Option<Block>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {BLOCK_COLUMNS} FROM blocks
                     WHERE workspace_id = ?1 AND id = ?2 AND delete_at = 0"
                ),
                params![container.workspace_id.as_str(), id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_block: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_block(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_block: {e}"))),
        }
    }

    async fn get_children(
        &self,
        container: &Container,
        parent_id: &str,
    ) -> Result<Vec<Block>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {BLOCK_COLUMNS} FROM blocks
                     WHERE workspace_id = ?1 AND parent_id = ?2 AND delete_at = 0
                     ORDER BY create_at, id"
                ),
                params![container.workspace_id.as_str(), parent_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_children: {e}")))?;
        collect_blocks(&mut rows, "get_children").await
    }

    async fn find_private_workspace(&self, user_id: &str) -> Result<Option<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id FROM workspaces WHERE private_owner = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_private_workspace: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let id: String = row.get(0).map_err(row_err)?;
                Ok(Some(id))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_private_workspace: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

const BLOCK_COLUMNS: &str = "id, workspace_id, parent_id, root_id, created_by, modified_by, schema_version, block_type, title, fields, create_at, update_at, delete_at";

fn row_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(format!("row parse: {e}"))
}

/// Map a libsql Row to a Block.
///
/// Column order matches BLOCK_COLUMNS.
fn row_to_block(row: &libsql::Row) -> Result<Block, DatabaseError> {
    let parent_id: String = row.get(2).map_err(row_err)?;
    let block_type: String = row.get(7).map_err(row_err)?;
    let fields: String = row.get(9).map_err(row_err)?;

    let block_type: BlockType = block_type
        .parse()
        .map_err(DatabaseError::Serialization)?;
    let fields: BlockFields = serde_json::from_str(&fields)
        .map_err(|e| DatabaseError::Serialization(format!("block fields: {e}")))?;

    Ok(Block {
        id: row.get(0).map_err(row_err)?,
        workspace_id: row.get(1).map_err(row_err)?,
        parent_id: if parent_id.is_empty() {
            None
        } else {
            Some(parent_id)
        },
        root_id: row.get(3).map_err(row_err)?,
        created_by: row.get(4).map_err(row_err)?,
        modified_by: row.get(5).map_err(row_err)?,
        schema: row.get(6).map_err(row_err)?,
        block_type,
        title: row.get(8).map_err(row_err)?,
        fields,
        create_at: row.get(10).map_err(row_err)?,
        update_at: row.get(11).map_err(row_err)?,
        delete_at: row.get(12).map_err(row_err)?,
    })
}

async fn collect_blocks(
    rows: &mut libsql::Rows,
    operation: &str,
) -> Result<Vec<Block>, DatabaseError> {
    let mut blocks = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("{operation}: {e}")))?
    {
        blocks.push(row_to_block(&row)?);
    }
    Ok(blocks)
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl BlockStore for LibSqlBackend {
    async fn get_subtree(
        &self,
        container: &Container,
        root_id: &str,
        levels: u32,
    ) -> Result<Vec<Block>, DatabaseError> {
        if levels == 0 {
            return Ok(Vec::new());
        }
        let Some(root) = self.get_block(container, root_id).await? else {
            return Ok(Vec::new());
        };

        let mut seen: HashSet<String> = HashSet::from([root.id.clone()]);
        let mut frontier = vec![root.id.clone()];
        let mut blocks = vec![root];

        for _ in 1..levels {
            let mut next = Vec::new();
            for parent_id in &frontier {
                for child in self.get_children(container, parent_id).await? {
                    if seen.insert(child.id.clone()) {
                        next.push(child.id.clone());
                        blocks.push(child);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        debug!(
            workspace_id = %container.workspace_id,
            root_id,
            levels,
            count = blocks.len(),
            "Fetched subtree"
        );
        Ok(blocks)
    }

    async fn insert_block(
        &self,
        container: &Container,
        block: &Block,
        user_id: &str,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().timestamp_millis();
        let fields_json = serde_json::to_string(&block.fields)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let created_by = if block.created_by.is_empty() {
            user_id
        } else {
            block.created_by.as_str()
        };
        let create_at = if block.create_at == 0 { now } else { block.create_at };
        let update_at = if block.update_at == 0 { now } else { block.update_at };

        self.conn()
            .execute(
                "INSERT INTO blocks (id, workspace_id, parent_id, root_id, created_by, modified_by, schema_version, block_type, title, fields, create_at, update_at, delete_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT (workspace_id, id) DO UPDATE SET
                    parent_id = ?3, root_id = ?4, modified_by = ?6, schema_version = ?7,
                    block_type = ?8, title = ?9, fields = ?10, update_at = ?12, delete_at = ?13",
                params![
                    block.id.as_str(),
                    container.workspace_id.as_str(),
                    block.parent_id.as_deref().unwrap_or(""),
                    block.root_id.as_str(),
                    created_by,
                    user_id,
                    block.schema,
                    block.block_type.as_str(),
                    block.title.as_str(),
                    fields_json,
                    create_at,
                    update_at,
                    block.delete_at,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_block: {e}")))?;

        debug!(
            block_id = %block.id,
            block_type = %block.block_type,
            workspace_id = %container.workspace_id,
            "Block inserted"
        );
        Ok(())
    }

    async fn create_private_workspace(&self, user_id: &str) -> Result<String, DatabaseError> {
        if let Some(existing) = self.find_private_workspace(user_id).await? {
            return Ok(existing);
        }

        let id = format!("w{}", Uuid::new_v4().simple());
        self.conn()
            .execute(
                "INSERT INTO workspaces (id, private_owner, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (private_owner) DO NOTHING",
                params![id.as_str(), user_id, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_private_workspace: {e}")))?;

        // Another caller may have created it between the lookup and the insert.
        let workspace_id = self.find_private_workspace(user_id).await?.ok_or_else(|| {
            DatabaseError::Constraint(format!("private workspace for {user_id} was not created"))
        })?;
        if workspace_id == id {
            info!(user_id, workspace_id = %id, "Private workspace created");
        }
        Ok(workspace_id)
    }

    async fn patch_user_props(
        &self,
        user_id: &str,
        patch: &UserPropPatch,
    ) -> Result<(), DatabaseError> {
        if patch.is_empty() {
            return Ok(());
        }
        let now = Utc::now().to_rfc3339();

        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("patch_user_props begin: {e}")))?;

        for key in &patch.deleted_fields {
            tx.execute(
                "DELETE FROM user_props WHERE user_id = ?1 AND key = ?2",
                params![user_id, key.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("patch_user_props delete: {e}")))?;
        }

        for (key, value) in &patch.updated_fields {
            let value_str = serde_json::to_string(value)
                .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
            tx.execute(
                "INSERT INTO user_props (user_id, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, key) DO UPDATE SET value = ?3, updated_at = ?4",
                params![user_id, key.as_str(), value_str, now.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("patch_user_props upsert: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("patch_user_props commit: {e}")))?;

        debug!(
            user_id,
            updated = patch.updated_fields.len(),
            deleted = patch.deleted_fields.len(),
            "User props patched"
        );
        Ok(())
    }

    async fn get_user_props(&self, user_id: &str) -> Result<UserProps, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT key, value FROM user_props WHERE user_id = ?1",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user_props: {e}")))?;

        let mut props = UserProps::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user_props: {e}")))?
        {
            let key: String = row.get(0).map_err(row_err)?;
            let value_str: String = row.get(1).map_err(row_err)?;
            let value: serde_json::Value = serde_json::from_str(&value_str)
                .map_err(|e| DatabaseError::Serialization(format!("user prop {key}: {e}")))?;
            props.insert(key, value);
        }
        Ok(props)
    }
}
