//! Stamping a template tree into live prompt nodes.
//!
//! The walk is depth-first and pre-order: a node is persisted (and, for a
//! top-level assistant node, its conversation created) before any of its
//! children, because children need the parent's id and resolved name.
//! There is no rollback: if an insert fails partway, nodes created so far
//! stay in the store.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::entity::{Conversation, NodeSettings, PromptNode, Template, TemplateNode};
use crate::error::Result;
use crate::position::{self, PositionKey};
use crate::storage::NodeStore;
use crate::variables::{derive_context_variables, Substituter, VariableClass, VariableRegistry};
use crate::warnings::{check_template, Warning};

/// Behavioural switches of an instantiation.
#[derive(Debug, Clone, Copy)]
pub struct InstantiateOptions {
    /// Report cross-tree reference placeholders before building.
    pub warn_on_references: bool,
    /// Create conversations for top-level assistant nodes.
    pub create_conversations: bool,
}

impl Default for InstantiateOptions {
    fn default() -> Self {
        Self {
            warn_on_references: true,
            create_conversations: true,
        }
    }
}

/// One instantiation call.
#[derive(Debug, Clone)]
pub struct InstantiateRequest<'t> {
    pub template: &'t Template,
    /// Existing node to attach the new tree under; `None` for top level
    pub parent_id: Option<Uuid>,
    /// Used verbatim as the root's name instead of the template name
    pub root_name: Option<String>,
    /// Seeded values merged with user input
    pub values: BTreeMap<String, String>,
    pub created_by: Option<String>,
}

impl<'t> InstantiateRequest<'t> {
    pub fn new(template: &'t Template) -> Self {
        Self {
            template,
            parent_id: None,
            root_name: None,
            values: BTreeMap::new(),
            created_by: None,
        }
    }
}

/// What an instantiation created.
#[derive(Debug, Clone)]
pub struct InstantiationReport {
    pub root: PromptNode,
    /// Every created node, in creation (pre-)order
    pub nodes: Vec<PromptNode>,
    pub conversations: Vec<Conversation>,
    pub warnings: Vec<Warning>,
}

/// Last key handed out per parent scope, for a single run.
///
/// A scope missing from the map has not been looked up yet; a scope mapped
/// to `None` is known to be empty.
#[derive(Debug, Default)]
struct SlotCache {
    last: HashMap<Option<Uuid>, Option<PositionKey>>,
}

impl SlotCache {
    async fn next_slot<S: NodeStore + ?Sized>(
        &mut self,
        store: &S,
        parent_id: Option<Uuid>,
    ) -> Result<PositionKey> {
        let last = match self.last.get(&parent_id) {
            Some(known) => known.clone(),
            None => store.find_max_position_key(parent_id, &[]).await?,
        };
        let key = position::at_end(last.as_ref())?;
        self.last.insert(parent_id, Some(key.clone()));
        Ok(key)
    }

    /// A freshly created node has no children yet.
    fn open_scope(&mut self, parent_id: Uuid) {
        self.last.insert(Some(parent_id), None);
    }
}

struct Pending<'t> {
    node: &'t TemplateNode,
    parent_id: Option<Uuid>,
    parent_name: String,
    is_root: bool,
}

/// Builds live prompt trees from templates.
pub struct TreeInstantiator<'a, S: NodeStore + ?Sized> {
    store: &'a S,
    registry: &'a VariableRegistry,
    options: InstantiateOptions,
}

impl<'a, S: NodeStore + ?Sized> TreeInstantiator<'a, S> {
    pub fn new(store: &'a S, registry: &'a VariableRegistry) -> Self {
        Self {
            store,
            registry,
            options: InstantiateOptions::default(),
        }
    }

    pub fn with_options(mut self, options: InstantiateOptions) -> Self {
        self.options = options;
        self
    }

    fn class_of(&self, template: &Template, name: &str) -> VariableClass {
        self.registry.class_in(&template.variables, name)
    }

    /// Instantiate `request.template`, returning the created tree.
    pub async fn instantiate(&self, request: InstantiateRequest<'_>) -> Result<InstantiationReport> {
        let template = request.template;
        info!(
            template = %template.name,
            parent = ?request.parent_id,
            nodes = template.node_count(),
            "instantiating template"
        );

        let warnings = check_template(
            template,
            &request.values,
            self.registry,
            self.options.warn_on_references,
        );

        // Runtime and context names never enter a value map
        let base: BTreeMap<String, String> = request
            .values
            .iter()
            .filter(|(name, _)| {
                !matches!(
                    self.class_of(template, name),
                    VariableClass::Runtime | VariableClass::Context
                )
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let stored: BTreeMap<String, String> = base
            .iter()
            .filter(|(name, _)| self.class_of(template, name).is_user_editable())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let base_substituter = Substituter::new(&base)?;

        let global = self.store.global_settings().await?;
        let baseline = match &global.default_model {
            Some(model) => self.store.model_defaults(model).await?,
            None => NodeSettings::default(),
        };

        let attach_name = match request.parent_id {
            Some(parent_id) => self
                .store
                .get_node(parent_id)
                .await?
                .map(|p| p.name)
                .unwrap_or_default(),
            None => String::new(),
        };

        let mut slots = SlotCache::default();
        let mut top_level_name = String::new();
        let mut nodes: Vec<PromptNode> = Vec::new();
        let mut conversations = Vec::new();
        let mut stack = vec![Pending {
            node: &template.root,
            parent_id: request.parent_id,
            parent_name: attach_name,
            is_root: true,
        }];

        while let Some(pending) = stack.pop() {
            let position_key = slots.next_slot(self.store, pending.parent_id).await?;

            // The root's name fixes the top-level context for the whole run
            if pending.is_root {
                top_level_name = match &request.root_name {
                    Some(name) => name.clone(),
                    None => base_substituter.apply(&pending.node.name),
                };
            }

            let mut values = base.clone();
            values.extend(derive_context_variables(&top_level_name, &pending.parent_name));
            let substituter = Substituter::new(&values)?;

            let name = if pending.is_root {
                top_level_name.clone()
            } else {
                substituter.apply(&pending.node.name)
            };

            let template_node = pending.node;
            let mut record = PromptNode::new(name, pending.parent_id, position_key);
            record.admin_prompt = substituter.apply_opt(template_node.admin_prompt.as_deref());
            record.user_prompt = substituter.apply_opt(template_node.user_prompt.as_deref());
            record.note = substituter.apply_opt(template_node.note.as_deref());
            record.assistant_instructions =
                substituter.apply_opt(template_node.assistant_instructions.as_deref());
            record.settings = baseline.clone().overlay(&template_node.settings);
            record.stored_variables = stored.clone();
            record.template_name = Some(template.name.clone());
            record.created_by = request.created_by.clone();

            let saved = match self.store.insert_node(&record).await {
                Ok(saved) => saved,
                Err(e) => {
                    error!(
                        template = %template.name,
                        node = %record.name,
                        created = nodes.len(),
                        code = e.code(),
                        "node insert failed, aborting instantiation: {}",
                        e
                    );
                    return Err(e);
                }
            };
            debug!(id = %saved.id, name = %saved.name, key = %saved.position_key, "created node");
            slots.open_scope(saved.id);

            let wants_conversation = self.options.create_conversations
                && pending.is_root
                && saved.is_root()
                && saved.settings.is_assistant.unwrap_or(true);
            if wants_conversation {
                let instructions = saved
                    .assistant_instructions
                    .clone()
                    .filter(|i| !i.trim().is_empty())
                    .unwrap_or_else(|| global.default_assistant_instructions.clone());
                let conversation = Conversation::new(saved.id, instructions);
                match self.store.insert_conversation(&conversation).await {
                    Ok(created) => conversations.push(created),
                    Err(e) => warn!(
                        node = %saved.id,
                        code = e.code(),
                        "conversation insert failed, continuing without it: {}",
                        e
                    ),
                }
            }

            for child in template_node.children.iter().rev() {
                stack.push(Pending {
                    node: child,
                    parent_id: Some(saved.id),
                    parent_name: saved.name.clone(),
                    is_root: false,
                });
            }

            nodes.push(saved);
        }

        let root = nodes[0].clone();
        info!(root = %root.id, created = nodes.len(), "template instantiated");

        Ok(InstantiationReport {
            root,
            nodes,
            conversations,
            warnings,
        })
    }
}
