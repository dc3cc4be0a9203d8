//! Content blocks — the nodes of every board tree.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Addresses the workspace a block lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Container {
    pub workspace_id: String,
}

impl Container {
    pub fn new(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
        }
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.workspace_id)
    }
}

/// Kind of content a block holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Board,
    View,
    Card,
    Text,
    Image,
    Divider,
    Checkbox,
    Comment,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Board => "board",
            Self::View => "view",
            Self::Card => "card",
            Self::Text => "text",
            Self::Image => "image",
            Self::Divider => "divider",
            Self::Checkbox => "checkbox",
            Self::Comment => "comment",
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BlockType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "board" => Ok(Self::Board),
            "view" => Ok(Self::View),
            "card" => Ok(Self::Card),
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            "divider" => Ok(Self::Divider),
            "checkbox" => Ok(Self::Checkbox),
            "comment" => Ok(Self::Comment),
            other => Err(format!("unknown block type: {other}")),
        }
    }
}

/// One entry of a card's `contentOrder`: a single block, or a row of blocks
/// laid out side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentOrderEntry {
    Single(String),
    Row(Vec<String>),
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Typed view over a block's field map.
///
/// The keys that matter to cloning are typed; anything else round-trips
/// untouched through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockFields {
    #[serde(rename = "isTemplate", default, skip_serializing_if = "is_false")]
    pub is_template: bool,

    #[serde(rename = "contentOrder", default, skip_serializing_if = "Vec::is_empty")]
    pub content_order: Vec<ContentOrderEntry>,

    #[serde(rename = "cardOrder", default, skip_serializing_if = "Vec::is_empty")]
    pub card_order: Vec<String>,

    #[serde(
        rename = "defaultTemplateId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub default_template_id: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BlockFields {
    /// Fields carrying only the template marker.
    pub fn template() -> Self {
        Self {
            is_template: true,
            ..Self::default()
        }
    }
}

/// A node in a content tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    /// `None` for the root of a tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Top-level block (usually the board) of the tree this block belongs to.
    #[serde(default)]
    pub root_id: String,
    #[serde(default)]
    pub workspace_id: String,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub modified_by: String,
    #[serde(default = "default_schema")]
    pub schema: i64,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub fields: BlockFields,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub create_at: i64,
    #[serde(default)]
    pub update_at: i64,
    /// Zero while the block is live.
    #[serde(default)]
    pub delete_at: i64,
}

fn default_schema() -> i64 {
    1
}

impl Block {
    /// A fresh live block with no parent and a generated identifier.
    pub fn new(block_type: BlockType, title: impl Into<String>) -> Self {
        let id = new_block_id();
        Self {
            root_id: id.clone(),
            id,
            parent_id: None,
            workspace_id: String::new(),
            created_by: String::new(),
            modified_by: String::new(),
            schema: default_schema(),
            block_type,
            title: title.into(),
            fields: BlockFields::default(),
            create_at: 0,
            update_at: 0,
            delete_at: 0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_root(mut self, root_id: impl Into<String>) -> Self {
        self.root_id = root_id.into();
        self
    }

    pub fn with_fields(mut self, fields: BlockFields) -> Self {
        self.fields = fields;
        self
    }

    pub fn is_board(&self) -> bool {
        self.block_type == BlockType::Board
    }

    pub fn is_deleted(&self) -> bool {
        self.delete_at != 0
    }
}

/// Generate a new block identifier: `b` followed by 32 hex digits.
pub fn new_block_id() -> String {
    format!("b{}", Uuid::new_v4().simple())
}
