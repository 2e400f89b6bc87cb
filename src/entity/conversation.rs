// src/entity/conversation.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Companion record of a top-level assistant node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub node_id: Uuid,
    /// Initial assistant instructions
    pub instructions: String,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(node_id: Uuid, instructions: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_id,
            instructions,
            created_at: Utc::now(),
        }
    }
}
