// src/entity/node.rs
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::NodeSettings;
use crate::position::PositionKey;

/// A concrete, persisted prompt tree element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptNode {
    pub id: Uuid,
    /// `None` for top-level nodes
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub admin_prompt: Option<String>,
    pub user_prompt: Option<String>,
    pub note: Option<String>,
    pub assistant_instructions: Option<String>,
    pub position_key: PositionKey,
    #[serde(default)]
    pub settings: NodeSettings,
    /// User-editable variable values; never positional context values
    #[serde(default)]
    pub stored_variables: BTreeMap<String, String>,
    /// Name of the template this node was stamped from
    pub template_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

impl PromptNode {
    pub fn new(name: String, parent_id: Option<Uuid>, position_key: PositionKey) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            parent_id,
            name,
            admin_prompt: None,
            user_prompt: None,
            note: None,
            assistant_instructions: None,
            position_key,
            settings: NodeSettings::default(),
            stored_variables: BTreeMap::new(),
            template_name: None,
            created_at: now,
            updated_at: now,
            created_by: None,
            deleted: false,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn short_id(&self) -> String {
        self.id.to_string()[..7].to_string()
    }
}
