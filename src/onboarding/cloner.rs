//! Template cloner — deep-copies a block subtree under fresh identifiers.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::error::{DatabaseError, OnboardingError};
use crate::model::{Block, Container, ContentOrderEntry, new_block_id};
use crate::store::BlockStore;

/// What to copy, and where to.
#[derive(Debug, Clone, Copy)]
pub struct CloneRequest<'a> {
    pub source: &'a Container,
    pub root_id: &'a str,
    pub depth: u32,
    pub destination: &'a Container,
    /// User the new blocks are attributed to.
    pub owner: &'a str,
}

/// Result of a clone: the new blocks in parent-before-child order, and the
/// old → new identifier table used to build them.
#[derive(Debug, Clone)]
pub struct ClonedTree {
    pub blocks: Vec<Block>,
    pub id_map: HashMap<String, String>,
}

impl ClonedTree {
    /// New identifier of a source block.
    pub fn new_id_of(&self, old_id: &str) -> Option<&str> {
        self.id_map.get(old_id).map(String::as_str)
    }
}

/// Copies template subtrees between workspaces.
pub struct TemplateCloner {
    store: Arc<dyn BlockStore>,
}

impl TemplateCloner {
    pub fn new(store: Arc<dyn BlockStore>) -> Self {
        Self { store }
    }

    /// Fetch the subtree under `request.root_id` and insert a copy of it into
    /// the destination workspace.
    ///
    /// Inserts are issued one by one, parents first. If one fails, blocks
    /// already inserted stay in place.
    pub async fn clone_subtree(
        &self,
        request: &CloneRequest<'_>,
    ) -> Result<ClonedTree, OnboardingError> {
        let not_found = || OnboardingError::TemplateNotFound {
            workspace_id: request.source.workspace_id.clone(),
            root_id: request.root_id.to_string(),
        };

        let source = self
            .store
            .get_subtree(request.source, request.root_id, request.depth)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => not_found(),
                other => OnboardingError::StoreRead(other),
            })?;
        if source.is_empty() {
            return Err(not_found());
        }

        let mut cloned = regenerate_ids(source, new_block_id);
        let now = Utc::now().timestamp_millis();
        for block in &mut cloned.blocks {
            block.workspace_id = request.destination.workspace_id.clone();
            block.created_by = request.owner.to_string();
            block.modified_by = request.owner.to_string();
            block.create_at = now;
            block.update_at = now;
        }

        for block in &cloned.blocks {
            self.store
                .insert_block(request.destination, block, request.owner)
                .await
                .map_err(|e| OnboardingError::store_write("insert_block", e))?;
        }

        debug!(
            source = %request.source,
            destination = %request.destination,
            root_id = request.root_id,
            count = cloned.blocks.len(),
            "Subtree cloned"
        );
        Ok(cloned)
    }
}

/// Give every block a new identifier and rewrite references to match.
///
/// - `parent_id` pointing inside the set is remapped, anything else becomes
///   `None`, so no copy refers back into the source tree.
/// - `root_id` is remapped, or set to the copy's topmost block.
/// - Field references (`contentOrder`, `cardOrder`, `defaultTemplateId`) are
///   remapped when they point inside the set and kept otherwise.
///
/// The output is ordered parent before child.
pub fn regenerate_ids(blocks: Vec<Block>, mut new_id: impl FnMut() -> String) -> ClonedTree {
    let mut id_map: HashMap<String, String> = HashMap::with_capacity(blocks.len());
    for block in &blocks {
        id_map.entry(block.id.clone()).or_insert_with(&mut new_id);
    }

    let order = parent_first_order(&blocks);
    let mut slots: Vec<Option<Block>> = blocks.into_iter().map(Some).collect();
    let ordered: Vec<Block> = order
        .into_iter()
        .filter_map(|i| slots.get_mut(i).and_then(Option::take))
        .collect();

    let top_root = ordered
        .first()
        .and_then(|b| id_map.get(&b.id))
        .cloned()
        .unwrap_or_default();

    let blocks = ordered
        .into_iter()
        .map(|mut block| {
            let old_id = std::mem::take(&mut block.id);
            block.parent_id = block
                .parent_id
                .filter(|parent| *parent != old_id)
                .and_then(|parent| id_map.get(&parent).cloned());
            block.root_id = id_map
                .get(&block.root_id)
                .cloned()
                .unwrap_or_else(|| top_root.clone());
            remap_field_refs(&mut block, &id_map);
            block.id = id_map.get(&old_id).cloned().unwrap_or(old_id);
            block
        })
        .collect();

    ClonedTree { blocks, id_map }
}

fn remap_field_refs(block: &mut Block, id_map: &HashMap<String, String>) {
    let remap = |id: &mut String| {
        if let Some(new) = id_map.get(id.as_str()) {
            id.clone_from(new);
        }
    };

    for entry in &mut block.fields.content_order {
        match entry {
            ContentOrderEntry::Single(id) => remap(id),
            ContentOrderEntry::Row(ids) => ids.iter_mut().for_each(remap),
        }
    }
    block.fields.card_order.iter_mut().for_each(remap);
    if let Some(id) = block.fields.default_template_id.as_mut() {
        remap(id);
    }
}

/// Indices of `blocks` in breadth-first order from the roots.
///
/// Roots are blocks whose parent is absent from the set. Blocks caught in a
/// parent cycle are appended in input order.
fn parent_first_order(blocks: &[Block]) -> Vec<usize> {
    let index: HashMap<&str, usize> = blocks
        .iter()
        .enumerate()
        .map(|(i, b)| (b.id.as_str(), i))
        .collect();

    let mut children: HashMap<usize, Vec<usize>> = HashMap::new();
    let mut queue = VecDeque::new();
    for (i, block) in blocks.iter().enumerate() {
        match block.parent_id.as_deref().and_then(|p| index.get(p)) {
            Some(&parent) if parent != i => children.entry(parent).or_default().push(i),
            _ => queue.push_back(i),
        }
    }

    let mut visited = vec![false; blocks.len()];
    let mut order = Vec::with_capacity(blocks.len());
    while let Some(i) = queue.pop_front() {
        match visited.get_mut(i) {
            Some(seen) if !*seen => *seen = true,
            _ => continue,
        }
        order.push(i);
        if let Some(kids) = children.get(&i) {
            queue.extend(kids);
        }
    }

    order.extend((0..blocks.len()).filter(|&i| !visited[i]));
    order
}
