//! Storage boundary for prompt trees.
//!
//! The tree engines only ever talk to a [`NodeStore`]; [`LoroStore`] is the
//! document-backed implementation used by the CLI.

mod loro_store;

pub use loro_store::LoroStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::entity::{Conversation, GlobalSettings, NodeSettings, PromptNode};
use crate::error::Result;
use crate::position::PositionKey;

/// Fields replaced by a move.
#[derive(Debug, Clone)]
pub struct PositionUpdate {
    pub position_key: PositionKey,
    pub parent_id: Option<Uuid>,
}

/// Asynchronous collaborator holding prompt nodes and conversations.
///
/// Execution is single-threaded and cooperative, so futures are not `Send`.
#[async_trait(?Send)]
pub trait NodeStore {
    /// Greatest key among live children of `parent_id` (top-level nodes when `None`).
    async fn find_max_position_key(
        &self,
        parent_id: Option<Uuid>,
        exclude: &[Uuid],
    ) -> Result<Option<PositionKey>>;

    /// Insert a node, returning the stored record.
    async fn insert_node(&self, node: &PromptNode) -> Result<PromptNode>;

    /// Insert the companion conversation of a top-level node.
    async fn insert_conversation(&self, conversation: &Conversation) -> Result<Conversation>;

    /// Replace a node's position key and parent in one update.
    async fn update_node_position(&self, id: Uuid, update: &PositionUpdate) -> Result<()>;

    async fn get_node(&self, id: Uuid) -> Result<Option<PromptNode>>;

    /// Current keys of the given live nodes; unknown ids are skipped.
    async fn position_keys(&self, ids: &[Uuid]) -> Result<Vec<(Uuid, PositionKey)>>;

    /// Live children of `parent_id`, ordered by position key.
    async fn list_children(&self, parent_id: Option<Uuid>) -> Result<Vec<PromptNode>>;

    async fn global_settings(&self) -> Result<GlobalSettings>;

    /// Default generation parameters of a model.
    async fn model_defaults(&self, model_id: &str) -> Result<NodeSettings>;
}
