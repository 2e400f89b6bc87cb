mod conversation;
mod node;
mod settings;
mod template;

pub use conversation::Conversation;
pub use node::PromptNode;
pub use settings::{NodeSettings, ThreadMode};
pub use template::{Template, TemplateNode};

use serde::{Deserialize, Serialize};

/// Global defaults applied when instantiating templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Model whose defaults seed every new node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    /// Instructions for conversations whose template gives none
    #[serde(default = "default_instructions")]
    pub default_assistant_instructions: String,
    /// Default generation parameters per model id
    #[serde(default)]
    pub models: std::collections::BTreeMap<String, NodeSettings>,
}

fn default_instructions() -> String {
    "You are a helpful assistant.".to_string()
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            default_model: None,
            default_assistant_instructions: default_instructions(),
            models: Default::default(),
        }
    }
}
