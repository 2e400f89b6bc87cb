use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use loro::{LoroDoc, LoroMap, LoroValue, ValueOrContainer};
use tracing::debug;
use uuid::Uuid;

use super::{NodeStore, PositionUpdate};
use crate::entity::{Conversation, GlobalSettings, NodeSettings, PromptNode};
use crate::error::{codes, ArborError, Result};
use crate::position::PositionKey;

const ARBOR_DIR: &str = ".arbor";
const LORO_DB: &str = "loro.db";

const NODES: &str = "nodes";
const CONVERSATIONS: &str = "conversations";
const SETTINGS: &str = "_settings";

/// Prompt tree store backed by a single Loro document on disk.
pub struct LoroStore {
    doc: LoroDoc,
    dir: PathBuf,
    path: PathBuf,
}

impl LoroStore {
    /// Initialize a new arbor project
    pub fn init(root: &Path) -> Result<Self> {
        let dir = root.join(ARBOR_DIR);

        if dir.exists() {
            return Err(ArborError::AlreadyInitialized);
        }

        fs::create_dir_all(&dir)?;

        let doc = LoroDoc::new();
        let path = dir.join(LORO_DB);

        let store = Self { doc, dir, path };
        store.put_global_settings(&GlobalSettings::default())?;
        store.save()?;

        Ok(store)
    }

    /// Open an existing arbor project
    pub fn open(root: &Path) -> Result<Self> {
        let dir = root.join(ARBOR_DIR);
        let path = dir.join(LORO_DB);

        if !path.exists() {
            return Err(ArborError::NotInitialized);
        }

        let bytes = fs::read(&path)?;
        let doc = LoroDoc::new();
        doc.import(&bytes)?;

        Ok(Self { doc, dir, path })
    }

    /// Save the document to disk
    pub fn save(&self) -> Result<()> {
        let bytes = self.doc.export(loro::ExportMode::Snapshot)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    /// The `.arbor` directory of this project
    pub fn arbor_dir(&self) -> &Path {
        &self.dir
    }

    // ========== Node Methods ==========

    /// Add a node, enforcing parent and sibling-key constraints
    pub fn add_node(&self, node: &PromptNode) -> Result<()> {
        let nodes = self.doc.get_map(NODES);
        let id_str = node.id.to_string();

        if nodes.get(&id_str).is_some() {
            return Err(ArborError::store(
                codes::UNIQUE_VIOLATION,
                format!("node {} already exists", id_str),
            ));
        }
        if let Some(parent_id) = node.parent_id {
            if self.get_live_node(&parent_id)?.is_none() {
                return Err(ArborError::store(
                    codes::FOREIGN_KEY_VIOLATION,
                    format!("parent node {} does not exist", parent_id),
                ));
            }
        }
        self.check_sibling_key(node.parent_id, &node.position_key, None)?;

        let entity_map = nodes.get_or_create_container(&id_str, LoroMap::new())?;

        entity_map.insert("id", id_str.clone())?;
        entity_map.insert("type", "prompt_node")?;
        entity_map.insert("name", node.name.clone())?;
        entity_map.insert("position_key", node.position_key.to_string())?;
        entity_map.insert("settings", serde_json::to_string(&node.settings)?)?;
        entity_map.insert("created_at", node.created_at.to_rfc3339())?;
        entity_map.insert("updated_at", node.updated_at.to_rfc3339())?;
        entity_map.insert("deleted", node.deleted)?;

        if let Some(parent_id) = node.parent_id {
            entity_map.insert("parent_id", parent_id.to_string())?;
        }
        if let Some(ref admin_prompt) = node.admin_prompt {
            entity_map.insert("admin_prompt", admin_prompt.clone())?;
        }
        if let Some(ref user_prompt) = node.user_prompt {
            entity_map.insert("user_prompt", user_prompt.clone())?;
        }
        if let Some(ref note) = node.note {
            entity_map.insert("note", note.clone())?;
        }
        if let Some(ref instructions) = node.assistant_instructions {
            entity_map.insert("assistant_instructions", instructions.clone())?;
        }
        if let Some(ref template_name) = node.template_name {
            entity_map.insert("template_name", template_name.clone())?;
        }
        if let Some(ref created_by) = node.created_by {
            entity_map.insert("created_by", created_by.clone())?;
        }

        let vars_map = entity_map.get_or_create_container("stored_variables", LoroMap::new())?;
        for (k, v) in &node.stored_variables {
            vars_map.insert(k, v.clone())?;
        }

        self.doc.commit();
        Ok(())
    }

    /// Get a node by UUID, including soft-deleted nodes
    pub fn get_node_record(&self, id: &Uuid) -> Result<Option<PromptNode>> {
        let nodes_map = self.doc.get_map(NODES);
        let id_str = id.to_string();

        let json = nodes_map.get_deep_value();
        if let LoroValue::Map(map) = json {
            if let Some(LoroValue::Map(entity_map)) = map.get(&id_str) {
                return Ok(self.parse_node_from_map(entity_map));
            }
        }
        Ok(None)
    }

    fn get_live_node(&self, id: &Uuid) -> Result<Option<PromptNode>> {
        Ok(self.get_node_record(id)?.filter(|n| !n.deleted))
    }

    /// List all live nodes
    pub fn list_nodes(&self) -> Result<Vec<PromptNode>> {
        let nodes_map = self.doc.get_map(NODES);
        let mut nodes = Vec::new();

        let json = nodes_map.get_deep_value();
        if let LoroValue::Map(map) = json {
            for (_, entity_value) in map.iter() {
                if let LoroValue::Map(entity_map) = entity_value {
                    if let Some(node) = self.parse_node_from_map(entity_map) {
                        if !node.deleted {
                            nodes.push(node);
                        }
                    }
                }
            }
        }

        nodes.sort_by(|a, b| a.position_key.cmp(&b.position_key));
        Ok(nodes)
    }

    /// Live children of a parent, ordered by position key
    pub fn children_of(&self, parent_id: Option<Uuid>) -> Result<Vec<PromptNode>> {
        Ok(self
            .list_nodes()?
            .into_iter()
            .filter(|n| n.parent_id == parent_id)
            .collect())
    }

    fn check_sibling_key(
        &self,
        parent_id: Option<Uuid>,
        key: &PositionKey,
        moving: Option<Uuid>,
    ) -> Result<()> {
        let clash = self
            .children_of(parent_id)?
            .into_iter()
            .any(|n| n.position_key == *key && Some(n.id) != moving);
        if clash {
            return Err(ArborError::store(
                codes::UNIQUE_VIOLATION,
                format!("position key {} is already used by a sibling", key),
            ));
        }
        Ok(())
    }

    /// Move a node: new position key and parent in one commit
    pub fn update_position(&self, id: &Uuid, update: &PositionUpdate) -> Result<()> {
        let nodes_map = self.doc.get_map(NODES);
        let id_str = id.to_string();

        if self.get_live_node(id)?.is_none() {
            return Err(ArborError::store(
                codes::NOT_FOUND,
                format!("node {} does not exist", id_str),
            ));
        }
        if let Some(parent_id) = update.parent_id {
            if self.get_live_node(&parent_id)?.is_none() {
                return Err(ArborError::store(
                    codes::FOREIGN_KEY_VIOLATION,
                    format!("parent node {} does not exist", parent_id),
                ));
            }
        }
        self.check_sibling_key(update.parent_id, &update.position_key, Some(*id))?;

        let entity_map = match nodes_map.get(&id_str) {
            Some(ValueOrContainer::Container(loro::Container::Map(map))) => map,
            _ => return Err(ArborError::NodeNotFound(id_str)),
        };

        entity_map.insert("position_key", update.position_key.to_string())?;
        match update.parent_id {
            Some(parent_id) => entity_map.insert("parent_id", parent_id.to_string())?,
            None => entity_map.delete("parent_id")?,
        };
        entity_map.insert("updated_at", chrono::Utc::now().to_rfc3339())?;

        self.doc.commit();
        Ok(())
    }

    /// Soft-delete a node and its whole subtree. Returns the number of nodes removed.
    pub fn delete_node(&self, id: &Uuid) -> Result<usize> {
        let nodes_map = self.doc.get_map(NODES);
        if self.get_live_node(id)?.is_none() {
            return Err(ArborError::NodeNotFound(id.to_string()));
        }

        let all = self.list_nodes()?;
        let mut doomed = vec![*id];
        let mut i = 0;
        while i < doomed.len() {
            let current = doomed[i];
            doomed.extend(all.iter().filter(|n| n.parent_id == Some(current)).map(|n| n.id));
            i += 1;
        }

        let now = chrono::Utc::now().to_rfc3339();
        for node_id in &doomed {
            if let Some(ValueOrContainer::Container(loro::Container::Map(map))) =
                nodes_map.get(&node_id.to_string())
            {
                map.insert("deleted", true)?;
                map.insert("updated_at", now.clone())?;
            }
        }

        self.doc.commit();
        Ok(doomed.len())
    }

    /// Resolve a full UUID or a unique UUID prefix to a live node id
    pub fn resolve_node_id(&self, id: &str) -> Result<Uuid> {
        if let Ok(uuid) = id.parse::<Uuid>() {
            return match self.get_live_node(&uuid)? {
                Some(_) => Ok(uuid),
                None => Err(ArborError::NodeNotFound(id.to_string())),
            };
        }

        let prefix = id.to_lowercase();
        let matches: Vec<Uuid> = self
            .list_nodes()?
            .into_iter()
            .filter(|n| n.id.to_string().starts_with(&prefix))
            .map(|n| n.id)
            .collect();

        match matches.as_slice() {
            [] => Err(ArborError::NodeNotFound(id.to_string())),
            [only] => Ok(*only),
            _ => Err(ArborError::AmbiguousNodeId(id.to_string())),
        }
    }

    fn parse_node_from_map(&self, map: &loro::LoroMapValue) -> Option<PromptNode> {
        let id = match map.get("id")? {
            LoroValue::String(s) => s.parse().ok()?,
            _ => return None,
        };
        let name = string_field(map, "name")?;
        let position_key = PositionKey::parse(&string_field(map, "position_key")?).ok()?;
        let created_at = time_field(map, "created_at")?;
        let updated_at = time_field(map, "updated_at")?;

        let parent_id = string_field(map, "parent_id").and_then(|s| s.parse().ok());
        let settings: NodeSettings = string_field(map, "settings")
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        let deleted = matches!(map.get("deleted"), Some(LoroValue::Bool(true)));

        let stored_variables = map
            .get("stored_variables")
            .and_then(|v| match v {
                LoroValue::Map(vars) => Some(
                    vars.iter()
                        .filter_map(|(k, v)| match v {
                            LoroValue::String(s) => Some((k.to_string(), s.to_string())),
                            _ => None,
                        })
                        .collect(),
                ),
                _ => None,
            })
            .unwrap_or_default();

        Some(PromptNode {
            id,
            parent_id,
            name,
            admin_prompt: string_field(map, "admin_prompt"),
            user_prompt: string_field(map, "user_prompt"),
            note: string_field(map, "note"),
            assistant_instructions: string_field(map, "assistant_instructions"),
            position_key,
            settings,
            stored_variables,
            template_name: string_field(map, "template_name"),
            created_at,
            updated_at,
            created_by: string_field(map, "created_by"),
            deleted,
        })
    }

    // ========== Conversation Methods ==========

    /// Add the companion conversation of a top-level node
    pub fn add_conversation(&self, conversation: &Conversation) -> Result<()> {
        let node = self.get_live_node(&conversation.node_id)?.ok_or_else(|| {
            ArborError::store(
                codes::FOREIGN_KEY_VIOLATION,
                format!("node {} does not exist", conversation.node_id),
            )
        })?;
        if !node.is_root() {
            return Err(ArborError::store(
                codes::FOREIGN_KEY_VIOLATION,
                format!("node {} is not a top-level node", node.id),
            ));
        }
        if self.conversation_for(&node.id)?.is_some() {
            return Err(ArborError::store(
                codes::UNIQUE_VIOLATION,
                format!("node {} already has a conversation", node.id),
            ));
        }

        let conversations = self.doc.get_map(CONVERSATIONS);
        let id_str = conversation.id.to_string();
        let entity_map = conversations.get_or_create_container(&id_str, LoroMap::new())?;

        entity_map.insert("id", id_str.clone())?;
        entity_map.insert("node_id", conversation.node_id.to_string())?;
        entity_map.insert("instructions", conversation.instructions.clone())?;
        entity_map.insert("created_at", conversation.created_at.to_rfc3339())?;

        self.doc.commit();
        Ok(())
    }

    /// List all conversations
    pub fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conversations_map = self.doc.get_map(CONVERSATIONS);
        let mut conversations = Vec::new();

        let json = conversations_map.get_deep_value();
        if let LoroValue::Map(map) = json {
            for (_, value) in map.iter() {
                if let LoroValue::Map(entity_map) = value {
                    if let Some(conversation) = parse_conversation_from_map(entity_map) {
                        conversations.push(conversation);
                    }
                }
            }
        }

        conversations.sort_by_key(|c| c.created_at);
        Ok(conversations)
    }

    /// The conversation owned by a node, if any
    pub fn conversation_for(&self, node_id: &Uuid) -> Result<Option<Conversation>> {
        Ok(self
            .list_conversations()?
            .into_iter()
            .find(|c| c.node_id == *node_id))
    }

    // ========== Settings Methods ==========

    /// Replace the global settings row
    pub fn put_global_settings(&self, settings: &GlobalSettings) -> Result<()> {
        let settings_map = self.doc.get_map(SETTINGS);
        settings_map.insert("global", serde_json::to_string(settings)?)?;
        self.doc.commit();
        Ok(())
    }

    /// Read the global settings row, falling back to defaults
    pub fn get_global_settings(&self) -> Result<GlobalSettings> {
        let settings_map = self.doc.get_map(SETTINGS);
        match settings_map.get("global") {
            Some(ValueOrContainer::Value(LoroValue::String(s))) => Ok(serde_json::from_str(&s)?),
            _ => Ok(GlobalSettings::default()),
        }
    }
}

fn string_field(map: &loro::LoroMapValue, key: &str) -> Option<String> {
    match map.get(key)? {
        LoroValue::String(s) => Some(s.to_string()),
        _ => None,
    }
}

fn time_field(map: &loro::LoroMapValue, key: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    match map.get(key)? {
        LoroValue::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&chrono::Utc)),
        _ => None,
    }
}

fn parse_conversation_from_map(map: &loro::LoroMapValue) -> Option<Conversation> {
    Some(Conversation {
        id: string_field(map, "id")?.parse().ok()?,
        node_id: string_field(map, "node_id")?.parse().ok()?,
        instructions: string_field(map, "instructions")?,
        created_at: time_field(map, "created_at")?,
    })
}

#[async_trait(?Send)]
impl NodeStore for LoroStore {
    async fn find_max_position_key(
        &self,
        parent_id: Option<Uuid>,
        exclude: &[Uuid],
    ) -> Result<Option<PositionKey>> {
        let max = self
            .children_of(parent_id)?
            .into_iter()
            .filter(|n| !exclude.contains(&n.id))
            .map(|n| n.position_key)
            .max();
        debug!(?parent_id, max = ?max, "looked up last position key");
        Ok(max)
    }

    async fn insert_node(&self, node: &PromptNode) -> Result<PromptNode> {
        self.add_node(node)?;
        self.get_node_record(&node.id)?.ok_or_else(|| {
            ArborError::store(
                codes::CORRUPT_RECORD,
                format!("node {} could not be read back", node.id),
            )
        })
    }

    async fn insert_conversation(&self, conversation: &Conversation) -> Result<Conversation> {
        self.add_conversation(conversation)?;
        Ok(conversation.clone())
    }

    async fn update_node_position(&self, id: Uuid, update: &PositionUpdate) -> Result<()> {
        self.update_position(&id, update)
    }

    async fn get_node(&self, id: Uuid) -> Result<Option<PromptNode>> {
        self.get_live_node(&id)
    }

    async fn position_keys(&self, ids: &[Uuid]) -> Result<Vec<(Uuid, PositionKey)>> {
        Ok(self
            .list_nodes()?
            .into_iter()
            .filter(|n| ids.contains(&n.id))
            .map(|n| (n.id, n.position_key))
            .collect())
    }

    async fn list_children(&self, parent_id: Option<Uuid>) -> Result<Vec<PromptNode>> {
        self.children_of(parent_id)
    }

    async fn global_settings(&self) -> Result<GlobalSettings> {
        self.get_global_settings()
    }

    async fn model_defaults(&self, model_id: &str) -> Result<NodeSettings> {
        let settings = self.get_global_settings()?;
        let mut defaults = settings.models.get(model_id).cloned().unwrap_or_default();
        if defaults.model.is_none() {
            defaults.model = Some(model_id.to_string());
        }
        Ok(defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(s: &str) -> PositionKey {
        PositionKey::parse(s).unwrap()
    }

    #[test]
    fn test_init_creates_arbor_directory() {
        let tmp = TempDir::new().unwrap();
        let _store = LoroStore::init(tmp.path()).unwrap();

        assert!(tmp.path().join(".arbor").exists());
        assert!(tmp.path().join(".arbor/loro.db").exists());
    }

    #[test]
    fn test_init_fails_if_already_initialized() {
        let tmp = TempDir::new().unwrap();
        LoroStore::init(tmp.path()).unwrap();

        let result = LoroStore::init(tmp.path());
        assert!(matches!(result, Err(ArborError::AlreadyInitialized)));
    }

    #[test]
    fn test_open_fails_if_not_initialized() {
        let tmp = TempDir::new().unwrap();

        let result = LoroStore::open(tmp.path());
        assert!(matches!(result, Err(ArborError::NotInitialized)));
    }

    #[test]
    fn test_add_and_list_node() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();

        let mut node = PromptNode::new("Travel".to_string(), None, key("a0"));
        node.admin_prompt = Some("Review the policy".to_string());
        node.settings.temperature = Some(0.3);
        node.stored_variables.insert("base".to_string(), "Alpha".to_string());

        store.add_node(&node).unwrap();
        store.save().unwrap();

        // Reopen and verify
        let store2 = LoroStore::open(tmp.path()).unwrap();
        let nodes = store2.list_nodes().unwrap();

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "Travel");
        assert_eq!(nodes[0].position_key.as_str(), "a0");
        assert_eq!(nodes[0].admin_prompt.as_deref(), Some("Review the policy"));
        assert_eq!(nodes[0].settings.temperature, Some(0.3));
        assert_eq!(nodes[0].stored_variables["base"], "Alpha");
        assert!(nodes[0].is_root());
    }

    #[test]
    fn test_missing_parent_is_foreign_key_violation() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();

        let node = PromptNode::new("Orphan".to_string(), Some(Uuid::new_v4()), key("a0"));
        let err = store.add_node(&node).unwrap_err();
        assert_eq!(err.code(), codes::FOREIGN_KEY_VIOLATION);
    }

    #[test]
    fn test_duplicate_sibling_key_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();

        store
            .add_node(&PromptNode::new("A".to_string(), None, key("a0")))
            .unwrap();
        let err = store
            .add_node(&PromptNode::new("B".to_string(), None, key("a0")))
            .unwrap_err();
        assert_eq!(err.code(), codes::UNIQUE_VIOLATION);
    }

    #[test]
    fn test_same_key_allowed_in_different_scopes() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();

        let root = PromptNode::new("Root".to_string(), None, key("a0"));
        store.add_node(&root).unwrap();
        let child = PromptNode::new("Child".to_string(), Some(root.id), key("a0"));
        store.add_node(&child).unwrap();

        assert_eq!(store.children_of(Some(root.id)).unwrap().len(), 1);
        assert_eq!(store.children_of(None).unwrap().len(), 1);
    }

    #[test]
    fn test_children_sorted_by_position_key() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();

        for (name, k) in [("C", "a4"), ("A", "a0"), ("B", "a2")] {
            store
                .add_node(&PromptNode::new(name.to_string(), None, key(k)))
                .unwrap();
        }

        let names: Vec<String> = store
            .children_of(None)
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_conversation_only_for_top_level_nodes() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();

        let root = PromptNode::new("Root".to_string(), None, key("a0"));
        store.add_node(&root).unwrap();
        let child = PromptNode::new("Child".to_string(), Some(root.id), key("a0"));
        store.add_node(&child).unwrap();

        store
            .add_conversation(&Conversation::new(root.id, "Be brief".to_string()))
            .unwrap();

        let again = store.add_conversation(&Conversation::new(root.id, "x".to_string()));
        assert_eq!(again.unwrap_err().code(), codes::UNIQUE_VIOLATION);

        let on_child = store.add_conversation(&Conversation::new(child.id, "x".to_string()));
        assert_eq!(on_child.unwrap_err().code(), codes::FOREIGN_KEY_VIOLATION);

        let conv = store.conversation_for(&root.id).unwrap().unwrap();
        assert_eq!(conv.instructions, "Be brief");
    }

    #[test]
    fn test_update_position_moves_node() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();

        let a = PromptNode::new("A".to_string(), None, key("a0"));
        let b = PromptNode::new("B".to_string(), None, key("a1"));
        store.add_node(&a).unwrap();
        store.add_node(&b).unwrap();

        store
            .update_position(
                &b.id,
                &PositionUpdate {
                    position_key: key("a0"),
                    parent_id: Some(a.id),
                },
            )
            .unwrap();

        let moved = store.get_node_record(&b.id).unwrap().unwrap();
        assert_eq!(moved.parent_id, Some(a.id));
        assert_eq!(moved.position_key.as_str(), "a0");
    }

    #[test]
    fn test_delete_node_removes_subtree() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();

        let root = PromptNode::new("Root".to_string(), None, key("a0"));
        let child = PromptNode::new("Child".to_string(), Some(root.id), key("a0"));
        let grandchild = PromptNode::new("Grandchild".to_string(), Some(child.id), key("a0"));
        store.add_node(&root).unwrap();
        store.add_node(&child).unwrap();
        store.add_node(&grandchild).unwrap();

        assert_eq!(store.delete_node(&child.id).unwrap(), 2);
        assert_eq!(store.list_nodes().unwrap().len(), 1);
        assert!(store.get_node_record(&grandchild.id).unwrap().unwrap().deleted);
    }

    #[test]
    fn test_resolve_node_id_by_prefix() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();

        let node = PromptNode::new("Root".to_string(), None, key("a0"));
        store.add_node(&node).unwrap();

        let full = node.id.to_string();
        assert_eq!(store.resolve_node_id(&full[..8]).unwrap(), node.id);
        assert_eq!(store.resolve_node_id(&full).unwrap(), node.id);
        assert!(matches!(
            store.resolve_node_id("zzzz"),
            Err(ArborError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_global_settings_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();

        let mut settings = GlobalSettings::default();
        settings.default_model = Some("gpt-4o".to_string());
        settings.models.insert(
            "gpt-4o".to_string(),
            NodeSettings {
                temperature: Some(0.5),
                ..Default::default()
            },
        );
        store.put_global_settings(&settings).unwrap();
        store.save().unwrap();

        let store2 = LoroStore::open(tmp.path()).unwrap();
        let loaded = store2.get_global_settings().unwrap();
        assert_eq!(loaded.default_model.as_deref(), Some("gpt-4o"));
        assert_eq!(loaded.models["gpt-4o"].temperature, Some(0.5));
    }

    #[tokio::test]
    async fn test_find_max_position_key_respects_exclusions() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();

        let a = PromptNode::new("A".to_string(), None, key("a0"));
        let b = PromptNode::new("B".to_string(), None, key("a5"));
        store.add_node(&a).unwrap();
        store.add_node(&b).unwrap();

        assert_eq!(
            store.find_max_position_key(None, &[]).await.unwrap(),
            Some(key("a5"))
        );
        assert_eq!(
            store.find_max_position_key(None, &[b.id]).await.unwrap(),
            Some(key("a0"))
        );
        assert_eq!(store.find_max_position_key(Some(a.id), &[]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_model_defaults_names_the_model() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();

        let defaults = store.model_defaults("small-model").await.unwrap();
        assert_eq!(defaults.model.as_deref(), Some("small-model"));
    }
}
