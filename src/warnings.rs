//! Pre-instantiation warnings for templates.
//!
//! None of these stop an instantiation; they are reported alongside the
//! created tree so the user can fix inputs and re-run.

use std::collections::BTreeMap;

use crate::entity::Template;
use crate::variables::{VariableClass, VariableRegistry};

/// Something about a template or its inputs the user should know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Placeholder pointing into another tree; left literal at creation time.
    CrossTreeReference { placeholder: String },
    /// A supplied value was ignored because its variable is not settable.
    DroppedVariable { name: String, class: VariableClass },
    /// An input-system variable is used but has no value.
    MissingInput { name: String },
}

/// Check a template and its input values.
///
/// # Arguments
/// * `template` - The template about to be instantiated
/// * `values` - Values supplied for the run (seeded plus user input)
/// * `registry` - Registry used to classify names
/// * `scan_references` - Whether to report cross-tree reference placeholders
///
/// # Returns
/// A vector of warnings (empty if nothing looks off)
pub fn check_template(
    template: &Template,
    values: &BTreeMap<String, String>,
    registry: &VariableRegistry,
    scan_references: bool,
) -> Vec<Warning> {
    let mut warnings = Vec::new();

    if scan_references {
        for placeholder in template.references() {
            warnings.push(Warning::CrossTreeReference { placeholder });
        }
    }

    for name in template.placeholder_names() {
        if registry.class_in(&template.variables, &name) == VariableClass::InputSystem
            && values.get(&name).map_or(true, |v| v.is_empty())
        {
            warnings.push(Warning::MissingInput { name });
        }
    }

    for name in values.keys() {
        let class = registry.class_in(&template.variables, name);
        if matches!(class, VariableClass::Runtime | VariableClass::Context) {
            warnings.push(Warning::DroppedVariable {
                name: name.clone(),
                class,
            });
        }
    }

    warnings
}

/// Format a warning for display.
pub fn format_warning(warning: &Warning) -> String {
    match warning {
        Warning::CrossTreeReference { placeholder } => {
            format!(
                "Warning: {{{{{}}}}} references another tree and will not be resolved until run time",
                placeholder
            )
        }
        Warning::DroppedVariable { name, class } => {
            format!(
                "Warning: value for '{}' ignored - {} variables cannot be set at creation",
                name, class
            )
        }
        Warning::MissingInput { name } => {
            format!("Warning: input '{}' has no value", name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::TemplateNode;

    fn template() -> Template {
        let mut root = TemplateNode::new("{{q.policy.name}} review");
        root.admin_prompt = Some("Compare with {{q.ref[42].output}}".to_string());
        Template::new("t", root)
    }

    #[test]
    fn test_reports_references_when_scanning() {
        let registry = VariableRegistry::default();
        let values = BTreeMap::from([("q.policy.name".to_string(), "Travel".to_string())]);

        let warnings = check_template(&template(), &values, &registry, true);
        assert_eq!(
            warnings,
            vec![Warning::CrossTreeReference {
                placeholder: "q.ref[42].output".to_string()
            }]
        );

        let warnings = check_template(&template(), &values, &registry, false);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_missing_input_warning() {
        let registry = VariableRegistry::default();
        let warnings = check_template(&template(), &BTreeMap::new(), &registry, false);
        assert_eq!(
            warnings,
            vec![Warning::MissingInput {
                name: "q.policy.name".to_string()
            }]
        );
    }

    #[test]
    fn test_dropped_runtime_value() {
        let registry = VariableRegistry::default();
        let values = BTreeMap::from([
            ("q.policy.name".to_string(), "Travel".to_string()),
            ("q.session.id".to_string(), "s-1".to_string()),
        ]);
        let warnings = check_template(&template(), &values, &registry, false);
        assert_eq!(warnings.len(), 1);
        match &warnings[0] {
            Warning::DroppedVariable { name, class } => {
                assert_eq!(name, "q.session.id");
                assert_eq!(*class, VariableClass::Runtime);
            }
            _ => panic!("Expected DroppedVariable warning"),
        }
    }

    #[test]
    fn test_declared_input_class_is_checked() {
        let registry = VariableRegistry::default();
        let mut root = TemplateNode::new("{{region}} review");
        root.note = Some("Started by {{q.session.id}}".to_string());
        let mut template = Template::new("t", root);
        let mut region = crate::variables::VariableDefinition::new("region");
        region.class = VariableClass::InputSystem;
        template.variables.push(region);

        let warnings = check_template(&template, &BTreeMap::new(), &registry, false);
        assert_eq!(
            warnings,
            vec![Warning::MissingInput {
                name: "region".to_string()
            }]
        );
    }

    #[test]
    fn test_format_cross_tree_reference() {
        let msg = format_warning(&Warning::CrossTreeReference {
            placeholder: "q.ref[1].x".to_string(),
        });
        assert!(msg.contains("{{q.ref[1].x}}"));
    }

    #[test]
    fn test_format_dropped_variable() {
        let msg = format_warning(&Warning::DroppedVariable {
            name: "q.session.id".to_string(),
            class: VariableClass::Runtime,
        });
        assert!(msg.contains("q.session.id"));
        assert!(msg.contains("runtime"));
    }
}
