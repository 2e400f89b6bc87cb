// src/entity/settings.rs
use serde::{Deserialize, Serialize};

/// How a node participates in conversation threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadMode {
    /// Each run starts a fresh thread.
    New,
    /// Runs reuse the root's conversation.
    Continue,
}

impl std::fmt::Display for ThreadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreadMode::New => write!(f, "new"),
            ThreadMode::Continue => write!(f, "continue"),
        }
    }
}

/// Model and behaviour settings of a node.
///
/// Every field is optional: an unset field falls back to whatever default
/// applies further down (model defaults, then the store).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_mode: Option<ThreadMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_assistant: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_interpreter: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_search: Option<bool>,
    /// Post-processing action config, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<serde_json::Value>,
}

impl NodeSettings {
    /// Superimpose `over` on `self`: set fields of `over` win.
    pub fn overlay(self, over: &NodeSettings) -> Self {
        Self {
            model: over.model.clone().or(self.model),
            temperature: over.temperature.or(self.temperature),
            max_tokens: over.max_tokens.or(self.max_tokens),
            top_p: over.top_p.or(self.top_p),
            frequency_penalty: over.frequency_penalty.or(self.frequency_penalty),
            presence_penalty: over.presence_penalty.or(self.presence_penalty),
            thread_mode: over.thread_mode.or(self.thread_mode),
            is_assistant: over.is_assistant.or(self.is_assistant),
            web_search: over.web_search.or(self.web_search),
            code_interpreter: over.code_interpreter.or(self.code_interpreter),
            file_search: over.file_search.or(self.file_search),
            action: over.action.clone().or(self.action),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == NodeSettings::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_keeps_unset_fields() {
        let base = NodeSettings {
            model: Some("gpt-base".to_string()),
            temperature: Some(0.7),
            max_tokens: Some(1024),
            ..Default::default()
        };
        let over = NodeSettings {
            temperature: Some(0.1),
            thread_mode: Some(ThreadMode::Continue),
            ..Default::default()
        };

        let merged = base.overlay(&over);
        assert_eq!(merged.model.as_deref(), Some("gpt-base"));
        assert_eq!(merged.temperature, Some(0.1));
        assert_eq!(merged.max_tokens, Some(1024));
        assert_eq!(merged.thread_mode, Some(ThreadMode::Continue));
        assert_eq!(merged.top_p, None);
    }

    #[test]
    fn test_null_fields_are_not_serialized() {
        let settings = NodeSettings {
            web_search: Some(true),
            ..Default::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(json, r#"{"web_search":true}"#);
        assert!(NodeSettings::default().is_empty());
    }
}
