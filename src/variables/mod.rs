//! Variable classification and `{{name}}` placeholder substitution.

mod registry;

pub use registry::{SystemVariable, VariableRegistry};

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ArborError, Result};

/// Context variable holding the resolved name of the top-level node.
pub const TOP_LEVEL_NAME_VAR: &str = "q.toplevel.prompt.name";
/// Context variable holding the resolved name of the immediate parent.
pub const PARENT_NAME_VAR: &str = "q.parent.prompt.name";

/// How a variable gets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VariableClass {
    /// Resolved from the acting user before any form is shown.
    StaticSystem,
    /// System-recognized but supplied by the user.
    InputSystem,
    /// Only known while the tree executes.
    Runtime,
    /// Anything not system-recognized.
    #[default]
    UserDefined,
    /// Derived from the node's position during instantiation.
    Context,
}

impl VariableClass {
    /// Whether values of this class are stored on created nodes.
    pub fn is_user_editable(self) -> bool {
        matches!(self, VariableClass::InputSystem | VariableClass::UserDefined)
    }
}

impl std::fmt::Display for VariableClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableClass::StaticSystem => write!(f, "static_system"),
            VariableClass::InputSystem => write!(f, "input_system"),
            VariableClass::Runtime => write!(f, "runtime"),
            VariableClass::UserDefined => write!(f, "user_defined"),
            VariableClass::Context => write!(f, "context"),
        }
    }
}

/// A variable declared by a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub class: VariableClass,
}

impl VariableDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            default: None,
            description: None,
            class: VariableClass::default(),
        }
    }
}

/// Facts about the acting user known before instantiation.
#[derive(Debug, Clone)]
pub struct StaticContext {
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub today: NaiveDate,
}

impl StaticContext {
    pub fn new(user_name: Option<String>, user_email: Option<String>) -> Self {
        Self {
            user_name,
            user_email,
            today: chrono::Local::now().date_naive(),
        }
    }

    fn resolve(&self, name: &str) -> String {
        match name {
            "q.user.name" => self.user_name.clone().unwrap_or_default(),
            "q.user.email" => self.user_email.clone().unwrap_or_default(),
            "q.today" => self.today.format("%Y-%m-%d").to_string(),
            _ => String::new(),
        }
    }
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern is valid"))
}

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^q\.ref\[[^\]]+\]\.[A-Za-z0-9_.]+$").expect("reference pattern is valid"))
}

/// Whether a placeholder name points into another tree (`q.ref[<id>].<field>`).
pub fn is_cross_tree_reference(name: &str) -> bool {
    reference_regex().is_match(name)
}

/// Every placeholder name in `text`, excluding cross-tree references.
pub fn extract_placeholders(text: &str) -> BTreeSet<String> {
    placeholder_regex()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .filter(|name| !is_cross_tree_reference(name))
        .collect()
}

/// Cross-tree reference placeholders in `text`.
pub fn extract_references(text: &str) -> BTreeSet<String> {
    placeholder_regex()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .filter(|name| is_cross_tree_reference(name))
        .collect()
}

/// Reject names that cannot be matched unambiguously inside `{{...}}`.
pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.contains('{') || name.contains('}') {
        "name contains a brace"
    } else if name.trim() != name {
        "name has surrounding whitespace"
    } else {
        return Ok(());
    };
    Err(ArborError::InvalidVariableName {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

/// Initial value map shown to the user before instantiation.
///
/// Static-system values are resolved from `context`, input-system values
/// start empty, user-defined values take their template default. Runtime and
/// context variables are omitted.
pub fn seed_initial_values(
    registry: &VariableRegistry,
    names: &BTreeSet<String>,
    definitions: &[VariableDefinition],
    context: &StaticContext,
) -> BTreeMap<String, String> {
    let mut all: BTreeSet<&str> = names.iter().map(String::as_str).collect();
    all.extend(definitions.iter().map(|d| d.name.as_str()));

    let mut values = BTreeMap::new();
    for name in all {
        let definition = definitions.iter().find(|d| d.name == name);
        let class = registry.class_in(definitions, name);

        let value = match class {
            VariableClass::StaticSystem => context.resolve(name),
            VariableClass::InputSystem => String::new(),
            VariableClass::UserDefined => definition
                .and_then(|d| d.default.clone())
                .unwrap_or_default(),
            VariableClass::Runtime | VariableClass::Context => continue,
        };
        values.insert(name.to_string(), value);
    }
    values
}

/// Context variables for one node. Recomputed at every node, never stored.
pub fn derive_context_variables(top_level_name: &str, parent_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (TOP_LEVEL_NAME_VAR.to_string(), top_level_name.to_string()),
        (PARENT_NAME_VAR.to_string(), parent_name.to_string()),
    ])
}

/// A compiled substitution for one value map.
///
/// All names are matched in a single pass, so text produced by one
/// replacement is never re-scanned for another name.
pub struct Substituter<'a> {
    pattern: Option<Regex>,
    values: &'a BTreeMap<String, String>,
}

impl<'a> Substituter<'a> {
    pub fn new(values: &'a BTreeMap<String, String>) -> Result<Self> {
        if values.is_empty() {
            return Ok(Self {
                pattern: None,
                values,
            });
        }
        for name in values.keys() {
            validate_name(name)?;
        }
        let alternation = values
            .keys()
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"\{{\{{({})\}}\}}", alternation))
            .map_err(|e| ArborError::Template(format!("cannot compile substitution: {}", e)))?;
        Ok(Self {
            pattern: Some(pattern),
            values,
        })
    }

    pub fn apply(&self, text: &str) -> String {
        match &self.pattern {
            Some(pattern) => pattern
                .replace_all(text, |caps: &regex::Captures| {
                    self.values.get(&caps[1]).cloned().unwrap_or_default()
                })
                .into_owned(),
            None => text.to_string(),
        }
    }

    pub fn apply_opt(&self, text: Option<&str>) -> Option<String> {
        text.map(|t| self.apply(t))
    }
}

/// Replace every `{{name}}` for each key of `values`.
pub fn substitute(text: &str, values: &BTreeMap<String, String>) -> Result<String> {
    Ok(Substituter::new(values)?.apply(text))
}
