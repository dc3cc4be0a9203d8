//! Per-user properties.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// All stored properties of one user, keyed by property name.
pub type UserProps = BTreeMap<String, serde_json::Value>;

/// A merge patch against a user's properties.
///
/// Keys in `updated_fields` are set, keys in `deleted_fields` are removed,
/// every other stored property is left as it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPropPatch {
    #[serde(default)]
    pub updated_fields: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub deleted_fields: Vec<String>,
}

impl UserPropPatch {
    pub fn set(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.updated_fields.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.updated_fields.is_empty() && self.deleted_fields.is_empty()
    }

    /// Apply the patch to an in-memory property map.
    pub fn apply_to(&self, props: &mut UserProps) {
        for key in &self.deleted_fields {
            props.remove(key);
        }
        for (key, value) in &self.updated_fields {
            props.insert(key.clone(), value.clone());
        }
    }
}
