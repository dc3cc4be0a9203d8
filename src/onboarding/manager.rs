//! OnboardingManager — provisions a new user's workspace, welcome board and
//! tour state.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::OnboardingConfig;
use crate::error::{MalformedTemplate, OnboardingError};
use crate::model::{Block, Container};
use crate::store::BlockStore;

use super::cloner::{CloneRequest, TemplateCloner};
use super::state::{TourState, initial_tour_patch};

/// Identifiers produced by a successful onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedTour {
    pub workspace_id: String,
    pub board_id: String,
}

/// Drives first-run onboarding against a `BlockStore`.
///
/// The three store mutations (workspace, welcome board, tour props) run in
/// sequence and stop at the first failure. Earlier mutations are not undone.
pub struct OnboardingManager {
    store: Arc<dyn BlockStore>,
    cloner: TemplateCloner,
    config: OnboardingConfig,
}

impl OnboardingManager {
    pub fn new(store: Arc<dyn BlockStore>, config: OnboardingConfig) -> Self {
        Self {
            cloner: TemplateCloner::new(Arc::clone(&store)),
            store,
            config,
        }
    }

    pub fn config(&self) -> &OnboardingConfig {
        &self.config
    }

    /// Set up everything a new user needs to start the onboarding tour.
    ///
    /// 1. Get or create the user's private workspace.
    /// 2. Clone the welcome template into it.
    /// 3. Mark the tour as started at its first step.
    pub async fn prepare_onboarding_tour(
        &self,
        user_id: &str,
    ) -> Result<PreparedTour, OnboardingError> {
        let workspace_id = self
            .store
            .create_private_workspace(user_id)
            .await
            .map_err(|e| {
                warn!(user_id, error = %e, "Failed to create private workspace");
                OnboardingError::store_write("create_private_workspace", e)
            })?;

        let board_id = self
            .create_welcome_board(user_id, &workspace_id)
            .await
            .inspect_err(|e| {
                warn!(user_id, workspace_id = %workspace_id, error = %e, "Failed to create welcome board");
            })?;

        self.store
            .patch_user_props(user_id, &initial_tour_patch())
            .await
            .map_err(|e| {
                warn!(user_id, error = %e, "Failed to record onboarding tour state");
                OnboardingError::store_write("patch_user_props", e)
            })?;

        info!(
            user_id,
            workspace_id = %workspace_id,
            board_id = %board_id,
            "Onboarding tour prepared"
        );
        Ok(PreparedTour {
            workspace_id,
            board_id,
        })
    }

    /// Clone the welcome template into `workspace_id` and return the id of
    /// the new welcome board.
    ///
    /// The copy is written before the board is looked up, so a malformed
    /// template still leaves its blocks in the workspace.
    pub async fn create_welcome_board(
        &self,
        user_id: &str,
        workspace_id: &str,
    ) -> Result<String, OnboardingError> {
        let source = Container::new(self.config.template_workspace_id.as_str());
        let destination = Container::new(workspace_id);

        let cloned = self
            .cloner
            .clone_subtree(&CloneRequest {
                source: &source,
                root_id: &self.config.template_root_id,
                depth: self.config.template_depth,
                destination: &destination,
                owner: user_id,
            })
            .await?;

        let board = find_welcome_board(&cloned.blocks, self.config.welcome_board_title.as_deref())?;
        info!(user_id, workspace_id, board_id = %board.id, "Welcome board created");
        Ok(board.id.clone())
    }

    /// Current tour progress of a user.
    pub async fn tour_state(&self, user_id: &str) -> Result<TourState, OnboardingError> {
        let props = self
            .store
            .get_user_props(user_id)
            .await
            .map_err(OnboardingError::StoreRead)?;
        Ok(TourState::from_props(&props))
    }
}

/// Pick the welcome board out of a cloned template.
///
/// Exactly one block must be a board carrying the template marker and, when
/// `expected_title` is set, that title.
pub fn find_welcome_board<'a>(
    blocks: &'a [Block],
    expected_title: Option<&str>,
) -> Result<&'a Block, MalformedTemplate> {
    let boards: Vec<&Block> = blocks.iter().filter(|b| b.is_board()).collect();
    if boards.is_empty() {
        return Err(MalformedTemplate::NoBoard);
    }

    let marked: Vec<&Block> = boards.into_iter().filter(|b| b.fields.is_template).collect();
    if marked.is_empty() {
        return Err(MalformedTemplate::NoTemplateMarker);
    }

    let candidates: Vec<&Block> = match expected_title {
        Some(title) => marked.into_iter().filter(|b| b.title == title).collect(),
        None => marked,
    };

    match candidates.as_slice() {
        [board] => Ok(*board),
        [] => Err(MalformedTemplate::TitleMismatch {
            expected: expected_title.unwrap_or_default().to_string(),
        }),
        many => Err(MalformedTemplate::AmbiguousBoard { count: many.len() }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::config::DEFAULT_TEMPLATE_ROOT_ID;
    use crate::error::DatabaseError;
    use crate::model::{BlockFields, BlockType, UserPropPatch, UserProps};
    use crate::onboarding::state::{TourCategory, TourStep, keys};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        GetSubtree {
            workspace_id: String,
            root_id: String,
            levels: u32,
        },
        Insert {
            workspace_id: String,
            block: Block,
            user_id: String,
        },
        CreateWorkspace(String),
        Patch {
            user_id: String,
            patch: UserPropPatch,
        },
    }

    /// Records every call and answers from canned data. `fail_on` names the
    /// operation that returns an error; `fail_insert_at` fails only the nth
    /// insert (1-based).
    #[derive(Default)]
    struct RecordingStore {
        template: Vec<Block>,
        workspace_id: String,
        fail_on: Option<&'static str>,
        fail_insert_at: Option<usize>,
        calls: Mutex<Vec<Call>>,
        props: Mutex<UserProps>,
    }

    impl RecordingStore {
        fn new(template: Vec<Block>) -> Self {
            Self {
                template,
                workspace_id: "workspace_id_1".into(),
                ..Self::default()
            }
        }

        fn failing_on(mut self, operation: &'static str) -> Self {
            self.fail_on = Some(operation);
            self
        }

        fn failing_on_insert(mut self, nth: usize) -> Self {
            self.fail_insert_at = Some(nth);
            self
        }

        fn check(&self, operation: &'static str) -> Result<(), DatabaseError> {
            if self.fail_on == Some(operation) {
                return Err(DatabaseError::Query(format!("{operation}: injected failure")));
            }
            Ok(())
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn inserted(&self) -> Vec<Block> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Insert { block, .. } => Some(block),
                    _ => None,
                })
                .collect()
        }

        fn patches(&self) -> Vec<(String, UserPropPatch)> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Patch { user_id, patch } => Some((user_id, patch)),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl BlockStore for RecordingStore {
        async fn get_subtree(
            &self,
            container: &Container,
            root_id: &str,
            levels: u32,
        ) -> Result<Vec<Block>, DatabaseError> {
            self.calls.lock().unwrap().push(Call::GetSubtree {
                workspace_id: container.workspace_id.clone(),
                root_id: root_id.into(),
                levels,
            });
            self.check("get_subtree")?;
            Ok(self.template.clone())
        }

        async fn insert_block(
            &self,
            container: &Container,
            block: &Block,
            user_id: &str,
        ) -> Result<(), DatabaseError> {
            let attempt = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(Call::Insert {
                    workspace_id: container.workspace_id.clone(),
                    block: block.clone(),
                    user_id: user_id.into(),
                });
                calls.iter().filter(|c| matches!(c, Call::Insert { .. })).count()
            };
            if self.fail_insert_at == Some(attempt) {
                return Err(DatabaseError::Query("insert_block: injected failure".into()));
            }
            self.check("insert_block")
        }

        async fn create_private_workspace(&self, user_id: &str) -> Result<String, DatabaseError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::CreateWorkspace(user_id.into()));
            self.check("create_private_workspace")?;
            Ok(self.workspace_id.clone())
        }

        async fn patch_user_props(
            &self,
            user_id: &str,
            patch: &UserPropPatch,
        ) -> Result<(), DatabaseError> {
            self.calls.lock().unwrap().push(Call::Patch {
                user_id: user_id.into(),
                patch: patch.clone(),
            });
            self.check("patch_user_props")?;
            patch.apply_to(&mut self.props.lock().unwrap());
            Ok(())
        }

        async fn get_user_props(&self, _user_id: &str) -> Result<UserProps, DatabaseError> {
            self.check("get_user_props")?;
            Ok(self.props.lock().unwrap().clone())
        }
    }

    fn welcome_board() -> Block {
        Block::new(BlockType::Board, "Welcome to Boards!")
            .with_id("block_id_1")
            .with_root("block_id_1")
            .with_fields(BlockFields::template())
    }

    fn manager(store: &Arc<RecordingStore>) -> OnboardingManager {
        OnboardingManager::new(store.clone(), OnboardingConfig::default())
    }

    // ── prepare_onboarding_tour ─────────────────────────────────────

    #[tokio::test]
    async fn prepare_base_case() {
        let store = Arc::new(RecordingStore::new(vec![welcome_board()]));

        let prepared = manager(&store)
            .prepare_onboarding_tour("user_id_1")
            .await
            .unwrap();

        assert_eq!(prepared.workspace_id, "workspace_id_1");
        assert!(!prepared.board_id.is_empty());
        assert_ne!(prepared.board_id, "block_id_1");

        let calls = store.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], Call::CreateWorkspace("user_id_1".into()));
        assert_eq!(
            calls[1],
            Call::GetSubtree {
                workspace_id: "0".into(),
                root_id: DEFAULT_TEMPLATE_ROOT_ID.into(),
                levels: 3,
            }
        );
        match &calls[2] {
            Call::Insert {
                workspace_id,
                block,
                user_id,
            } => {
                assert_eq!(workspace_id, "workspace_id_1");
                assert_eq!(user_id, "user_id_1");
                assert_eq!(block.id, prepared.board_id);
            }
            other => panic!("expected insert, got {other:?}"),
        }

        let patches = store.patches();
        assert_eq!(patches.len(), 1);
        let (user_id, patch) = &patches[0];
        assert_eq!(user_id, "user_id_1");
        assert_eq!(
            *patch,
            UserPropPatch::default()
                .set(keys::TOUR_STARTED, true)
                .set(keys::TOUR_STEP, "0")
                .set(keys::TOUR_CATEGORY, "onboarding")
        );
    }

    #[tokio::test]
    async fn prepare_keeps_unrelated_user_props() {
        let store = Arc::new(RecordingStore::new(vec![welcome_board()]));
        store
            .props
            .lock()
            .unwrap()
            .insert("theme".into(), serde_json::json!("dark"));
        let manager = manager(&store);

        assert_eq!(manager.tour_state("user_id_1").await.unwrap(), TourState::NoTour);
        manager.prepare_onboarding_tour("user_id_1").await.unwrap();

        let props = store.props.lock().unwrap().clone();
        assert_eq!(props["theme"], "dark");
        assert_eq!(props.len(), 4);
        assert_eq!(
            manager.tour_state("user_id_1").await.unwrap(),
            TourState::Started {
                step: TourStep::FIRST,
                category: TourCategory::Onboarding,
            }
        );
    }

    #[tokio::test]
    async fn workspace_failure_stops_everything() {
        let store = Arc::new(
            RecordingStore::new(vec![welcome_board()]).failing_on("create_private_workspace"),
        );

        let err = manager(&store)
            .prepare_onboarding_tour("user_id_1")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OnboardingError::StoreWrite {
                operation: "create_private_workspace",
                ..
            }
        ));
        assert_eq!(store.calls(), vec![Call::CreateWorkspace("user_id_1".into())]);
    }

    #[tokio::test]
    async fn board_failure_leaves_tour_unset() {
        let store = Arc::new(RecordingStore::new(vec![Block::new(BlockType::Comment, "hi")]));

        let err = manager(&store)
            .prepare_onboarding_tour("user_id_1")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OnboardingError::TemplateMalformed(MalformedTemplate::NoBoard)
        ));
        assert!(store.patches().is_empty());
    }

    #[tokio::test]
    async fn insert_failure_is_surfaced_without_patch() {
        let store =
            Arc::new(RecordingStore::new(vec![welcome_board()]).failing_on("insert_block"));

        let err = manager(&store)
            .prepare_onboarding_tour("user_id_1")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OnboardingError::StoreWrite {
                operation: "insert_block",
                ..
            }
        ));
        assert!(store.patches().is_empty());
    }

    #[tokio::test]
    async fn insert_failure_mid_tree_stops_further_inserts() {
        let template = vec![
            welcome_board(),
            Block::new(BlockType::Card, "Create a new card")
                .with_id("card_1")
                .with_parent("block_id_1")
                .with_root("block_id_1"),
            Block::new(BlockType::Text, "Click a card to open it")
                .with_id("text_1")
                .with_parent("card_1")
                .with_root("block_id_1"),
        ];
        let store = Arc::new(RecordingStore::new(template).failing_on_insert(2));

        let err = manager(&store)
            .prepare_onboarding_tour("user_id_1")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OnboardingError::StoreWrite {
                operation: "insert_block",
                ..
            }
        ));
        let inserted = store.inserted();
        assert_eq!(inserted.len(), 2);
        assert_eq!(inserted[0].block_type, BlockType::Board);
        assert_eq!(inserted[1].block_type, BlockType::Card);
        assert_eq!(inserted[1].parent_id.as_deref(), Some(inserted[0].id.as_str()));
        assert!(store.patches().is_empty());
    }

    #[tokio::test]
    async fn patch_failure_is_surfaced() {
        let store =
            Arc::new(RecordingStore::new(vec![welcome_board()]).failing_on("patch_user_props"));

        let err = manager(&store)
            .prepare_onboarding_tour("user_id_1")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OnboardingError::StoreWrite {
                operation: "patch_user_props",
                ..
            }
        ));
        assert_eq!(store.inserted().len(), 1, "board was already written");
    }

    // ── create_welcome_board ────────────────────────────────────────

    #[tokio::test]
    async fn create_welcome_board_base_case() {
        let store = Arc::new(RecordingStore::new(vec![welcome_board()]));

        let board_id = manager(&store)
            .create_welcome_board("user_id_1", "workspace_id_1")
            .await
            .unwrap();

        assert!(!board_id.is_empty());
        assert_ne!(board_id, "block_id_1");
        let inserted = store.inserted();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].workspace_id, "workspace_id_1");
        assert_eq!(inserted[0].created_by, "user_id_1");
    }

    #[tokio::test]
    async fn template_without_board_is_malformed() {
        let comment = Block::new(BlockType::Comment, "Welcome to Boards!").with_id("block_id_1");
        let store = Arc::new(RecordingStore::new(vec![comment]));

        let err = manager(&store)
            .create_welcome_board("user_id_1", "workspace_id_1")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OnboardingError::TemplateMalformed(MalformedTemplate::NoBoard)
        ));
    }

    #[tokio::test]
    async fn template_with_wrong_board_title_is_malformed() {
        let board = Block::new(BlockType::Board, "Jean luc Picard")
            .with_id("block_id_1")
            .with_fields(BlockFields::template());
        let store = Arc::new(RecordingStore::new(vec![board]));

        let err = manager(&store)
            .create_welcome_board("user_id_1", "workspace_id_1")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OnboardingError::TemplateMalformed(MalformedTemplate::TitleMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn board_without_template_marker_is_malformed() {
        let board = Block::new(BlockType::Board, "Welcome to Boards!").with_id("block_id_1");
        let store = Arc::new(RecordingStore::new(vec![board]));

        let err = manager(&store)
            .create_welcome_board("user_id_1", "workspace_id_1")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OnboardingError::TemplateMalformed(MalformedTemplate::NoTemplateMarker)
        ));
    }

    #[tokio::test]
    async fn empty_template_is_not_found() {
        let store = Arc::new(RecordingStore::new(Vec::new()));

        let err = manager(&store)
            .create_welcome_board("user_id_1", "workspace_id_1")
            .await
            .unwrap_err();

        assert!(matches!(err, OnboardingError::TemplateNotFound { .. }));
        assert!(store.inserted().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_is_a_read_error() {
        let store =
            Arc::new(RecordingStore::new(vec![welcome_board()]).failing_on("get_subtree"));

        let err = manager(&store)
            .create_welcome_board("user_id_1", "workspace_id_1")
            .await
            .unwrap_err();

        assert!(matches!(err, OnboardingError::StoreRead(_)));
    }

    #[tokio::test]
    async fn title_check_can_be_disabled() {
        let board = Block::new(BlockType::Board, "Team Roadmap")
            .with_id("block_id_1")
            .with_fields(BlockFields::template());
        let store = Arc::new(RecordingStore::new(vec![board]));
        let config = OnboardingConfig {
            welcome_board_title: None,
            ..OnboardingConfig::default()
        };

        let board_id = OnboardingManager::new(store.clone(), config)
            .create_welcome_board("user_id_1", "workspace_id_1")
            .await
            .unwrap();
        assert!(!board_id.is_empty());
    }

    #[tokio::test]
    async fn multi_level_template_returns_the_board_root() {
        let template = vec![
            welcome_board(),
            Block::new(BlockType::View, "Board view")
                .with_id("view_1")
                .with_parent("block_id_1")
                .with_root("block_id_1"),
            Block::new(BlockType::Card, "Drag cards")
                .with_id("card_1")
                .with_parent("block_id_1")
                .with_root("block_id_1"),
            Block::new(BlockType::Text, "Tip")
                .with_id("text_1")
                .with_parent("card_1")
                .with_root("block_id_1"),
        ];
        let store = Arc::new(RecordingStore::new(template));

        let board_id = manager(&store)
            .create_welcome_board("user_id_1", "workspace_id_1")
            .await
            .unwrap();

        let inserted = store.inserted();
        assert_eq!(inserted.len(), 4);
        let old_ids = ["block_id_1", "view_1", "card_1", "text_1"];
        for block in &inserted {
            assert!(!old_ids.contains(&block.id.as_str()));
            assert_eq!(block.root_id, board_id);
            if let Some(parent) = &block.parent_id {
                assert!(!old_ids.contains(&parent.as_str()));
                assert!(inserted.iter().any(|b| &b.id == parent));
            }
        }
        assert_eq!(inserted[0].id, board_id, "board is inserted first");
    }

    // ── find_welcome_board ──────────────────────────────────────────

    #[test]
    fn two_marked_welcome_boards_are_ambiguous() {
        let blocks = vec![welcome_board(), welcome_board().with_id("block_id_2")];
        let err = find_welcome_board(&blocks, Some("Welcome to Boards!")).unwrap_err();
        assert_eq!(err, MalformedTemplate::AmbiguousBoard { count: 2 });
    }

    #[test]
    fn unmarked_boards_do_not_compete() {
        let blocks = vec![
            Block::new(BlockType::Board, "Welcome to Boards!").with_id("plain"),
            welcome_board(),
        ];
        let board = find_welcome_board(&blocks, Some("Welcome to Boards!")).unwrap();
        assert_eq!(board.id, "block_id_1");
    }
}
