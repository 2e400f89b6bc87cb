//! Registry of system-recognized variable names.

use std::collections::BTreeMap;

use crate::error::{ArborError, Result};

use super::{validate_name, VariableClass, VariableDefinition, PARENT_NAME_VAR, TOP_LEVEL_NAME_VAR};

/// A system-recognized variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemVariable {
    pub name: String,
    pub class: VariableClass,
    pub description: String,
}

/// Lookup table from variable name to its class.
///
/// Names absent from the registry are user-defined.
#[derive(Debug, Clone)]
pub struct VariableRegistry {
    entries: BTreeMap<String, SystemVariable>,
}

const BUILTINS: &[(&str, VariableClass, &str)] = &[
    ("q.user.name", VariableClass::StaticSystem, "Display name of the acting user"),
    ("q.user.email", VariableClass::StaticSystem, "Email address of the acting user"),
    ("q.today", VariableClass::StaticSystem, "Current date (YYYY-MM-DD)"),
    ("q.policy.name", VariableClass::InputSystem, "Policy the tree is built for"),
    ("q.policy.category", VariableClass::InputSystem, "Category of the selected policy"),
    ("q.session.id", VariableClass::Runtime, "Identifier of the executing session"),
    ("q.previous.response", VariableClass::Runtime, "Output of the previous node in a run"),
    ("q.run.timestamp", VariableClass::Runtime, "Time the run started"),
    (TOP_LEVEL_NAME_VAR, VariableClass::Context, "Resolved name of the top-level node"),
    (PARENT_NAME_VAR, VariableClass::Context, "Resolved name of the immediate parent node"),
];

impl Default for VariableRegistry {
    fn default() -> Self {
        let entries = BUILTINS
            .iter()
            .map(|(name, class, description)| {
                (
                    name.to_string(),
                    SystemVariable {
                        name: name.to_string(),
                        class: *class,
                        description: description.to_string(),
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

impl VariableRegistry {
    /// A registry with no system variables; every name is user-defined.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register a system variable.
    pub fn register(&mut self, name: &str, class: VariableClass, description: &str) -> Result<()> {
        validate_name(name)?;
        if class == VariableClass::UserDefined {
            return Err(ArborError::InvalidVariableName {
                name: name.to_string(),
                reason: "user-defined variables are not registered".to_string(),
            });
        }
        if let Some(existing) = self.entries.get(name) {
            if existing.class != class {
                return Err(ArborError::InvalidVariableName {
                    name: name.to_string(),
                    reason: format!("already registered as {}", existing.class),
                });
            }
        }
        self.entries.insert(
            name.to_string(),
            SystemVariable {
                name: name.to_string(),
                class,
                description: description.to_string(),
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SystemVariable> {
        self.entries.get(name)
    }

    /// Class of a variable name. Never fails.
    pub fn classify(&self, name: &str) -> VariableClass {
        self.entries
            .get(name)
            .map(|v| v.class)
            .unwrap_or(VariableClass::UserDefined)
    }

    /// Resolve the explicit class tag of each definition once.
    ///
    /// A declared class is kept; an undeclared one is filled from the
    /// registry. Declaring a registered name with a different class fails.
    pub fn tag_definitions(&self, definitions: &mut [VariableDefinition]) -> Result<()> {
        for def in definitions {
            let registered = self.classify(&def.name);
            if def.class == VariableClass::UserDefined {
                def.class = registered;
            } else if registered != VariableClass::UserDefined && registered != def.class {
                return Err(ArborError::InvalidVariableName {
                    name: def.name.clone(),
                    reason: format!("declared {} but registered as {}", def.class, registered),
                });
            }
        }
        Ok(())
    }

    /// Class of `name`, preferring a tagged definition over the registry.
    pub fn class_in(&self, definitions: &[VariableDefinition], name: &str) -> VariableClass {
        definitions
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.class)
            .filter(|c| *c != VariableClass::UserDefined)
            .unwrap_or_else(|| self.classify(name))
    }

    pub fn is_context(&self, name: &str) -> bool {
        self.classify(name) == VariableClass::Context
    }

    pub fn iter(&self) -> impl Iterator<Item = &SystemVariable> {
        self.entries.values()
    }
}
