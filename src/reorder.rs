//! Moving a node to a new slot, possibly under a new parent.
//!
//! Only the moved node's key is recomputed; siblings keep theirs.

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ArborError, Result};
use crate::position::{self, PositionKey};
use crate::storage::{NodeStore, PositionUpdate};

/// Place `node_id` at `target_index` among `sibling_ids` under `new_parent_id`.
///
/// `sibling_ids` are the nodes already at the target, in any order; the
/// moved node is ignored if present. Same-parent reordering and
/// reparenting share this path. Returns the node's new key.
pub async fn reorder<S: NodeStore + ?Sized>(
    store: &S,
    node_id: Uuid,
    new_parent_id: Option<Uuid>,
    target_index: usize,
    sibling_ids: &[Uuid],
) -> Result<PositionKey> {
    let node = store
        .get_node(node_id)
        .await?
        .ok_or_else(|| ArborError::NodeNotFound(node_id.to_string()))?;

    if let Some(parent_id) = new_parent_id {
        check_not_descendant(store, node_id, parent_id).await?;
    }

    let others: Vec<Uuid> = sibling_ids
        .iter()
        .copied()
        .filter(|id| *id != node_id)
        .collect();
    let mut keys: Vec<PositionKey> = store
        .position_keys(&others)
        .await?
        .into_iter()
        .map(|(_, key)| key)
        .collect();
    keys.sort();

    let position_key = if target_index == 0 {
        position::at_start(keys.first())?
    } else if target_index >= keys.len() {
        position::at_end(keys.last())?
    } else {
        position::between(Some(&keys[target_index - 1]), Some(&keys[target_index]))?
    };
    debug!(
        node = %node_id,
        from = %node.position_key,
        to = %position_key,
        index = target_index,
        "computed new position"
    );

    store
        .update_node_position(
            node_id,
            &PositionUpdate {
                position_key: position_key.clone(),
                parent_id: new_parent_id,
            },
        )
        .await?;

    info!(
        node = %node_id,
        reparented = node.parent_id != new_parent_id,
        key = %position_key,
        "moved node"
    );
    Ok(position_key)
}

/// Fails when `target_parent` is `node_id` itself or lies under it.
async fn check_not_descendant<S: NodeStore + ?Sized>(
    store: &S,
    node_id: Uuid,
    target_parent: Uuid,
) -> Result<()> {
    let mut current = Some(target_parent);
    while let Some(id) = current {
        if id == node_id {
            return Err(ArborError::InvalidMove(format!(
                "cannot move {} under itself or one of its descendants",
                node_id
            )));
        }
        let ancestor = store.get_node(id).await?.ok_or_else(|| {
            ArborError::InvalidMove(format!("target parent {} does not exist", id))
        })?;
        current = ancestor.parent_id;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::PromptNode;
    use crate::storage::LoroStore;
    use tempfile::TempDir;

    fn key(s: &str) -> PositionKey {
        PositionKey::parse(s).unwrap()
    }

    fn add(store: &LoroStore, name: &str, parent: Option<Uuid>, k: &str) -> PromptNode {
        let node = PromptNode::new(name.to_string(), parent, key(k));
        store.add_node(&node).unwrap();
        node
    }

    fn key_of(store: &LoroStore, id: Uuid) -> PositionKey {
        store.get_node_record(&id).unwrap().unwrap().position_key
    }

    #[tokio::test]
    async fn test_reorder_between_first_two_siblings() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();
        let parent = add(&store, "Parent", None, "a0");
        let a = add(&store, "A", Some(parent.id), "a0");
        let b = add(&store, "B", Some(parent.id), "a2");
        let c = add(&store, "C", Some(parent.id), "a4");

        let new_key = reorder(&store, c.id, Some(parent.id), 1, &[a.id, b.id])
            .await
            .unwrap();

        assert!(new_key > key("a0"));
        assert!(new_key < key("a2"));
        assert_eq!(key_of(&store, c.id), new_key);
        assert_eq!(key_of(&store, a.id).as_str(), "a0");
        assert_eq!(key_of(&store, b.id).as_str(), "a2");

        let order: Vec<String> = store
            .children_of(Some(parent.id))
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(order, vec!["A", "C", "B"]);
    }

    #[tokio::test]
    async fn test_reorder_to_edges() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();
        let a = add(&store, "A", None, "a0");
        let b = add(&store, "B", None, "a1");
        let c = add(&store, "C", None, "a2");

        // Moved node in the sibling list is ignored
        let first = reorder(&store, c.id, None, 0, &[a.id, b.id, c.id])
            .await
            .unwrap();
        assert!(first < key("a0"));

        let last = reorder(&store, c.id, None, 99, &[a.id, b.id, c.id])
            .await
            .unwrap();
        assert!(last > key("a1"));
        assert_eq!(key_of(&store, a.id).as_str(), "a0");
        assert_eq!(key_of(&store, b.id).as_str(), "a1");
    }

    #[tokio::test]
    async fn test_reparent_into_empty_and_back_to_top() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();
        let a = add(&store, "A", None, "a0");
        let b = add(&store, "B", None, "a1");

        let k = reorder(&store, b.id, Some(a.id), 0, &[]).await.unwrap();
        assert_eq!(k, PositionKey::baseline());
        let moved = store.get_node_record(&b.id).unwrap().unwrap();
        assert_eq!(moved.parent_id, Some(a.id));

        let k = reorder(&store, b.id, None, 1, &[a.id]).await.unwrap();
        assert!(k > key("a0"));
        let moved = store.get_node_record(&b.id).unwrap().unwrap();
        assert!(moved.is_root());
    }

    #[tokio::test]
    async fn test_reorder_rejects_cycles() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();
        let a = add(&store, "A", None, "a0");
        let b = add(&store, "B", Some(a.id), "a0");
        let c = add(&store, "C", Some(b.id), "a0");

        let err = reorder(&store, a.id, Some(c.id), 0, &[]).await.unwrap_err();
        assert!(matches!(err, ArborError::InvalidMove(_)));

        let err = reorder(&store, a.id, Some(a.id), 0, &[]).await.unwrap_err();
        assert!(matches!(err, ArborError::InvalidMove(_)));
        assert!(store.get_node_record(&a.id).unwrap().unwrap().is_root());
    }

    #[tokio::test]
    async fn test_reorder_unknown_nodes() {
        let tmp = TempDir::new().unwrap();
        let store = LoroStore::init(tmp.path()).unwrap();
        let a = add(&store, "A", None, "a0");

        let err = reorder(&store, Uuid::new_v4(), None, 0, &[]).await.unwrap_err();
        assert!(matches!(err, ArborError::NodeNotFound(_)));

        let err = reorder(&store, a.id, Some(Uuid::new_v4()), 0, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ArborError::InvalidMove(_)));
    }
}
