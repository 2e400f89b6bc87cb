// src/entity/template.rs
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::NodeSettings;
use crate::error::{ArborError, Result};
use crate::variables::{
    extract_placeholders, extract_references, validate_name, VariableDefinition, VariableRegistry,
};

/// Blueprint of one node, with `{{variable}}` placeholders in its text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "NodeSettings::is_empty")]
    pub settings: NodeSettings,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TemplateNode>,
}

impl TemplateNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_child(mut self, child: TemplateNode) -> Self {
        self.children.push(child);
        self
    }

    /// Name and every text field that may carry placeholders.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(
            [
                &self.admin_prompt,
                &self.user_prompt,
                &self.note,
                &self.assistant_instructions,
            ]
            .into_iter()
            .filter_map(|t| t.as_deref()),
        )
    }

    /// This node and its descendants, pre-order.
    pub fn walk(&self) -> Vec<&TemplateNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

/// A reusable tree blueprint with its declared variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub variables: Vec<VariableDefinition>,
    pub root: TemplateNode,
}

impl Template {
    pub fn new(name: &str, root: TemplateNode) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            variables: Vec::new(),
            root,
        }
    }

    /// Load a template from a YAML or JSON file and tag its variables.
    pub fn load(path: &Path, registry: &VariableRegistry) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let template: Template = if is_json {
            serde_json::from_str(&text)?
        } else {
            serde_yaml::from_str(&text)?
        };
        template.prepare(registry)
    }

    pub fn from_yaml_str(text: &str, registry: &VariableRegistry) -> Result<Self> {
        let template: Template = serde_yaml::from_str(text)?;
        template.prepare(registry)
    }

    /// Validate definitions and resolve their class tags.
    pub fn prepare(mut self, registry: &VariableRegistry) -> Result<Self> {
        if self.root.name.trim().is_empty() {
            return Err(ArborError::Template(format!(
                "template '{}' has a root node without a name",
                self.name
            )));
        }
        let mut seen = BTreeSet::new();
        for def in &self.variables {
            validate_name(&def.name)?;
            if !seen.insert(def.name.as_str()) {
                return Err(ArborError::Template(format!(
                    "variable '{}' is declared twice",
                    def.name
                )));
            }
        }
        registry.tag_definitions(&mut self.variables)?;
        Ok(self)
    }

    /// Every placeholder name used anywhere in the tree.
    pub fn placeholder_names(&self) -> BTreeSet<String> {
        self.root
            .walk()
            .into_iter()
            .flat_map(|n| n.texts().flat_map(extract_placeholders).collect::<Vec<_>>())
            .collect()
    }

    /// Cross-tree reference placeholders used anywhere in the tree.
    pub fn references(&self) -> BTreeSet<String> {
        self.root
            .walk()
            .into_iter()
            .flat_map(|n| n.texts().flat_map(extract_references).collect::<Vec<_>>())
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.root.walk().len()
    }

    pub fn definition(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.iter().find(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::VariableClass;

    const YAML: &str = r#"
name: Policy review
variables:
  - name: base
    default: Alpha
  - name: q.policy.name
root:
  name: "{{base}} Root"
  admin_prompt: "Review {{q.policy.name}} for {{q.user.name}}"
  settings:
    temperature: 0.2
  children:
    - name: "{{base}} Child"
      user_prompt: "Summarize {{q.ref[abc].output}} under {{q.parent.prompt.name}}"
    - name: Second
"#;

    #[test]
    fn test_load_yaml_template() {
        let registry = VariableRegistry::default();
        let template = Template::from_yaml_str(YAML, &registry).unwrap();

        assert_eq!(template.name, "Policy review");
        assert_eq!(template.node_count(), 3);
        assert_eq!(template.root.settings.temperature, Some(0.2));
        assert_eq!(template.variables[1].class, VariableClass::InputSystem);
        assert_eq!(template.definition("base").unwrap().default.as_deref(), Some("Alpha"));
    }

    #[test]
    fn test_placeholder_names_and_references() {
        let registry = VariableRegistry::default();
        let template = Template::from_yaml_str(YAML, &registry).unwrap();

        let names = template.placeholder_names();
        assert!(names.contains("base"));
        assert!(names.contains("q.policy.name"));
        assert!(names.contains("q.user.name"));
        assert!(names.contains("q.parent.prompt.name"));
        assert!(!names.iter().any(|n| n.starts_with("q.ref")));

        let refs = template.references();
        assert_eq!(refs.into_iter().collect::<Vec<_>>(), vec!["q.ref[abc].output"]);
    }

    #[test]
    fn test_walk_is_pre_order() {
        let root = TemplateNode::new("r")
            .with_child(TemplateNode::new("a").with_child(TemplateNode::new("a1")))
            .with_child(TemplateNode::new("b"));
        let names: Vec<&str> = root.walk().into_iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["r", "a", "a1", "b"]);
    }

    #[test]
    fn test_duplicate_definitions_rejected() {
        let registry = VariableRegistry::default();
        let yaml = "name: t\nvariables:\n  - name: x\n  - name: x\nroot:\n  name: r\n";
        assert!(matches!(
            Template::from_yaml_str(yaml, &registry),
            Err(ArborError::Template(_))
        ));
    }

    #[test]
    fn test_declared_class_survives_loading() {
        let registry = VariableRegistry::default();
        let yaml = "name: t\nvariables:\n  - name: job.id\n    class: runtime\nroot:\n  name: \"Run {{job.id}}\"\n";
        let template = Template::from_yaml_str(yaml, &registry).unwrap();
        assert_eq!(template.definition("job.id").unwrap().class, VariableClass::Runtime);
    }

    #[test]
    fn test_declared_class_conflicting_with_registry_rejected() {
        let registry = VariableRegistry::default();
        let yaml = "name: t\nvariables:\n  - name: q.session.id\n    class: input_system\nroot:\n  name: r\n";
        assert!(matches!(
            Template::from_yaml_str(yaml, &registry),
            Err(ArborError::InvalidVariableName { .. })
        ));
    }

    #[test]
    fn test_unnamed_root_rejected() {
        let registry = VariableRegistry::default();
        let yaml = "name: t\nroot:\n  name: \"  \"\n";
        assert!(Template::from_yaml_str(yaml, &registry).is_err());
    }
}
