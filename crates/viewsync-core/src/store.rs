use crate::config::DeletePolicy;
use crate::error::{BridgeError, Result};
use crate::node::{Geometry, NodeArena, NodeHandle, NodeKey, ViewNode};
use crate::props::PropertySet;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

/// Authoritative renderer-side view tree.
///
/// Every mutation comes in two halves: a `check_*` method that validates
/// against the current state without touching it, and the mutation itself,
/// which re-validates and then applies. Callers that must consult a native
/// handler between the two use the pair; everyone else just calls the
/// mutation.
#[derive(Clone, Default)]
pub struct ViewTreeStore {
    arena: NodeArena,
    index: HashMap<NodeKey, NodeHandle>,
}

impl ViewTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&ViewNode> {
        let handle = self.index.get(id)?;
        self.arena.get(*handle)
    }

    pub fn parent_of(&self, id: &str) -> Result<Option<&str>> {
        let (_, node) = self.resolve(id)?;
        Ok(node.parent.and_then(|p| self.arena.get(p)).map(ViewNode::id))
    }

    pub fn children_of(&self, id: &str) -> Result<Vec<&str>> {
        let (_, node) = self.resolve(id)?;
        Ok(self.keys_of(&node.children))
    }

    /// Parentless nodes in arena order.
    pub fn roots(&self) -> Vec<&str> {
        self.arena
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(_, node)| node.id())
            .collect()
    }

    pub fn check_create(&self, id: &str, view_type: &str) -> Result<()> {
        if id.is_empty() {
            return Err(BridgeError::InvalidPayload("view id must not be empty".into()));
        }
        if view_type.is_empty() {
            return Err(BridgeError::InvalidPayload(format!(
                "view '{id}' needs a view type"
            )));
        }
        if self.contains(id) {
            return Err(BridgeError::DuplicateId(id.to_string()));
        }
        Ok(())
    }

    pub fn create(&mut self, id: &str, view_type: &str, props: PropertySet) -> Result<()> {
        self.check_create(id, view_type)?;
        let handle = self.arena.insert(ViewNode::new(id, view_type, props));
        self.index.insert(NodeKey::from(id), handle);
        Ok(())
    }

    pub fn check_update(&self, id: &str) -> Result<()> {
        self.resolve(id).map(|_| ())
    }

    pub fn update(&mut self, id: &str, patch: &PropertySet) -> Result<()> {
        let node = self.resolve_mut(id)?;
        node.props.merge(patch);
        Ok(())
    }

    pub(crate) fn replace_props(&mut self, id: &str, props: PropertySet) -> Result<()> {
        let node = self.resolve_mut(id)?;
        node.props = props;
        Ok(())
    }

    /// Ids that `delete` would remove, target first.
    pub fn removal_set(&self, id: &str, policy: DeletePolicy) -> Result<Vec<String>> {
        let (handle, node) = self.resolve(id)?;
        Ok(match policy {
            DeletePolicy::Cascade => self
                .subtree(handle)
                .into_iter()
                .filter_map(|h| self.arena.get(h))
                .map(|n| n.id().to_string())
                .collect(),
            DeletePolicy::Orphan => vec![node.id().to_string()],
        })
    }

    pub fn delete(&mut self, id: &str, policy: DeletePolicy) -> Result<Vec<String>> {
        let (handle, _) = self.resolve(id)?;
        self.unlink(handle);

        let doomed = match policy {
            DeletePolicy::Cascade => self.subtree(handle),
            DeletePolicy::Orphan => {
                let children = self
                    .arena
                    .get(handle)
                    .map(|n| n.children.clone())
                    .unwrap_or_default();
                for child in children {
                    if let Some(node) = self.arena.get_mut(child) {
                        node.parent = None;
                    }
                }
                vec![handle]
            }
        };

        let mut removed = Vec::with_capacity(doomed.len());
        for h in doomed {
            if let Some(node) = self.arena.remove(h) {
                self.index.remove(&node.key);
                removed.push(node.key.to_string());
            }
        }
        Ok(removed)
    }

    /// Validates an insert of `child` into `parent` and returns the slot it
    /// would land in.
    pub fn check_attach(&self, child: &str, parent: &str, index: i64) -> Result<usize> {
        let (child_h, _) = self.resolve(child)?;
        let (parent_h, parent_node) = self.resolve(parent)?;

        let len = parent_node.children.len();
        if index < 0 || index as u64 > len as u64 {
            return Err(BridgeError::InvalidIndex {
                parent: parent.to_string(),
                index,
                len,
            });
        }
        if child_h == parent_h {
            return Err(BridgeError::InvalidHierarchy(format!(
                "cannot attach '{child}' to itself"
            )));
        }
        if self.is_ancestor(child_h, parent_h) {
            return Err(BridgeError::InvalidHierarchy(format!(
                "attaching '{child}' under its descendant '{parent}' would form a cycle"
            )));
        }

        // Moving within the same parent shrinks the list by one first.
        let slot = index as usize;
        if parent_node.children.contains(&child_h) {
            Ok(slot.min(len - 1))
        } else {
            Ok(slot)
        }
    }

    pub fn attach(&mut self, child: &str, parent: &str, index: i64) -> Result<()> {
        let slot = self.check_attach(child, parent, index)?;
        let (child_h, _) = self.resolve(child)?;
        let (parent_h, _) = self.resolve(parent)?;

        self.unlink(child_h);
        if let Some(parent_node) = self.arena.get_mut(parent_h) {
            let slot = slot.min(parent_node.children.len());
            parent_node.children.insert(slot, child_h);
        }
        if let Some(child_node) = self.arena.get_mut(child_h) {
            child_node.parent = Some(parent_h);
        }
        Ok(())
    }

    pub fn check_set_children<S: AsRef<str>>(&self, id: &str, children: &[S]) -> Result<()> {
        let (target, _) = self.resolve(id)?;
        let mut seen = HashSet::with_capacity(children.len());
        for child in children {
            let child = child.as_ref();
            let (handle, _) = self.resolve(child)?;
            if !seen.insert(handle) {
                return Err(BridgeError::InvalidHierarchy(format!(
                    "'{child}' appears twice in the children of '{id}'"
                )));
            }
            if handle == target {
                return Err(BridgeError::InvalidHierarchy(format!(
                    "'{id}' cannot be its own child"
                )));
            }
            if self.is_ancestor(handle, target) {
                return Err(BridgeError::InvalidHierarchy(format!(
                    "'{child}' is an ancestor of '{id}'"
                )));
            }
        }
        Ok(())
    }

    /// Replaces the whole child list. Returns the ids that were detached
    /// from `id` because they are not in the new list.
    pub fn set_children<S: AsRef<str>>(&mut self, id: &str, children: &[S]) -> Result<Vec<String>> {
        self.check_set_children(id, children)?;
        let (target, _) = self.resolve(id)?;

        let mut next: SmallVec<[NodeHandle; 4]> = SmallVec::with_capacity(children.len());
        for child in children {
            next.push(self.resolve(child.as_ref())?.0);
        }
        let keep: HashSet<NodeHandle> = next.iter().copied().collect();

        let previous = self
            .arena
            .get_mut(target)
            .map(|n| std::mem::take(&mut n.children))
            .unwrap_or_default();

        let mut detached = Vec::new();
        for old in previous {
            if keep.contains(&old) {
                continue;
            }
            if let Some(node) = self.arena.get_mut(old) {
                node.parent = None;
                detached.push(node.key.to_string());
            }
        }

        for &child in &next {
            let current = self.arena.get(child).and_then(|n| n.parent);
            if current.is_some_and(|p| p != target) {
                self.unlink(child);
            }
            if let Some(node) = self.arena.get_mut(child) {
                node.parent = Some(target);
            }
        }

        if let Some(node) = self.arena.get_mut(target) {
            node.children = next;
        }
        Ok(detached)
    }

    pub fn set_geometry(&mut self, id: &str, geometry: Geometry) -> Result<()> {
        if !geometry.is_finite() {
            return Err(BridgeError::InvalidPayload(format!(
                "geometry for '{id}' must be finite"
            )));
        }
        let node = self.resolve_mut(id)?;
        node.geometry = Some(geometry);
        Ok(())
    }

    pub fn add_listeners<I>(&mut self, id: &str, names: I) -> Result<()>
    where
        I: IntoIterator<Item = String>,
    {
        let node = self.resolve_mut(id)?;
        node.listeners.extend(names);
        Ok(())
    }

    pub fn remove_listeners<I>(&mut self, id: &str, names: I) -> Result<()>
    where
        I: IntoIterator<Item = String>,
    {
        let node = self.resolve_mut(id)?;
        for name in names {
            node.listeners.remove(&name);
        }
        Ok(())
    }

    /// Checks the parent/child links describe a rooted forest.
    pub fn verify_forest(&self) -> Result<()> {
        for (handle, node) in self.arena.iter() {
            if let Some(parent) = node.parent {
                let Some(parent_node) = self.arena.get(parent) else {
                    return Err(BridgeError::LayoutError(format!(
                        "'{}' points at a missing parent",
                        node.id()
                    )));
                };
                let hits = parent_node.children.iter().filter(|&&c| c == handle).count();
                if hits != 1 {
                    return Err(BridgeError::LayoutError(format!(
                        "'{}' listed {hits} times under '{}'",
                        node.id(),
                        parent_node.id()
                    )));
                }
            }
            for &child in &node.children {
                match self.arena.get(child) {
                    Some(c) if c.parent == Some(handle) => {}
                    _ => {
                        return Err(BridgeError::LayoutError(format!(
                            "child link of '{}' is inconsistent",
                            node.id()
                        )));
                    }
                }
            }
        }

        let mut visited = HashSet::with_capacity(self.len());
        for (root, node) in self.arena.iter() {
            if node.parent.is_some() {
                continue;
            }
            let mut stack = vec![root];
            while let Some(h) = stack.pop() {
                if !visited.insert(h) {
                    return Err(BridgeError::LayoutError("node reached twice".into()));
                }
                if let Some(n) = self.arena.get(h) {
                    stack.extend(n.children.iter().rev().copied());
                }
            }
        }
        if visited.len() != self.len() {
            return Err(BridgeError::LayoutError(format!(
                "{} nodes are unreachable from any root",
                self.len() - visited.len()
            )));
        }
        Ok(())
    }

    pub(crate) fn handle_of(&self, id: &str) -> Option<NodeHandle> {
        self.index.get(id).copied()
    }

    pub(crate) fn node_at(&self, handle: NodeHandle) -> Option<&ViewNode> {
        self.arena.get(handle)
    }

    pub(crate) fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub(crate) fn keys_of(&self, handles: &[NodeHandle]) -> Vec<&str> {
        handles
            .iter()
            .filter_map(|h| self.arena.get(*h))
            .map(ViewNode::id)
            .collect()
    }

    /// Pre-order handles of the subtree rooted at `root`.
    pub(crate) fn subtree(&self, root: NodeHandle) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(h) = stack.pop() {
            if out.len() > self.len() {
                break;
            }
            out.push(h);
            if let Some(node) = self.arena.get(h) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// True when `ancestor` is `node` or lies on its parent chain.
    pub(crate) fn is_ancestor(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut current = Some(node);
        let mut steps = 0;
        while let Some(h) = current {
            if h == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.len() {
                return false;
            }
            current = self.arena.get(h).and_then(|n| n.parent);
        }
        false
    }

    fn resolve(&self, id: &str) -> Result<(NodeHandle, &ViewNode)> {
        let handle = *self
            .index
            .get(id)
            .ok_or_else(|| BridgeError::not_found(id))?;
        let node = self.arena.get(handle).ok_or_else(|| BridgeError::not_found(id))?;
        Ok((handle, node))
    }

    fn resolve_mut(&mut self, id: &str) -> Result<&mut ViewNode> {
        let handle = *self
            .index
            .get(id)
            .ok_or_else(|| BridgeError::not_found(id))?;
        self.arena
            .get_mut(handle)
            .ok_or_else(|| BridgeError::not_found(id))
    }

    fn unlink(&mut self, child: NodeHandle) {
        let Some(parent) = self.arena.get(child).and_then(|n| n.parent) else {
            return;
        };
        if let Some(parent_node) = self.arena.get_mut(parent) {
            if let Some(pos) = parent_node.children.iter().position(|&c| c == child) {
                parent_node.children.remove(pos);
            }
        }
        if let Some(node) = self.arena.get_mut(child) {
            node.parent = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with(ids: &[&str]) -> ViewTreeStore {
        let mut store = ViewTreeStore::new();
        for id in ids {
            store.create(id, "View", PropertySet::new()).unwrap();
        }
        store
    }

    #[test]
    fn test_create_rejects_duplicate_and_keeps_first() {
        let mut store = ViewTreeStore::new();
        let props = PropertySet::from_value(json!({"text": "first"})).unwrap();
        store.create("a", "Text", props).unwrap();

        let err = store
            .create("a", "View", PropertySet::from_value(json!({"text": "second"})).unwrap())
            .unwrap_err();
        assert_eq!(err, BridgeError::DuplicateId("a".into()));

        let node = store.node("a").unwrap();
        assert_eq!(node.view_type(), "Text");
        assert_eq!(node.props().get_str("text"), Some("first"));
    }

    #[test]
    fn test_attach_inserts_and_shifts() {
        let mut store = store_with(&["root", "a", "b", "c"]);
        store.attach("a", "root", 0).unwrap();
        store.attach("b", "root", 1).unwrap();
        store.attach("c", "root", 1).unwrap();

        assert_eq!(store.children_of("root").unwrap(), vec!["a", "c", "b"]);
        assert_eq!(store.parent_of("c").unwrap(), Some("root"));
    }

    #[test]
    fn test_attach_out_of_range_leaves_tree_unchanged() {
        let mut store = store_with(&["root", "a", "b"]);
        store.attach("a", "root", 0).unwrap();

        let err = store.attach("b", "root", 2).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidIndex { index: 2, len: 1, .. }));
        let err = store.attach("b", "root", -1).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidIndex { .. }));

        assert_eq!(store.children_of("root").unwrap(), vec!["a"]);
        assert_eq!(store.parent_of("b").unwrap(), None);
    }

    #[test]
    fn test_attach_reparents() {
        let mut store = store_with(&["p1", "p2", "x"]);
        store.attach("x", "p1", 0).unwrap();
        store.attach("x", "p2", 0).unwrap();

        assert!(store.children_of("p1").unwrap().is_empty());
        assert_eq!(store.children_of("p2").unwrap(), vec!["x"]);
        store.verify_forest().unwrap();
    }

    #[test]
    fn test_attach_within_same_parent_moves() {
        let mut store = store_with(&["p", "a", "b", "c"]);
        store.set_children("p", &["a", "b", "c"]).unwrap();

        store.attach("a", "p", 3).unwrap();
        assert_eq!(store.children_of("p").unwrap(), vec!["b", "c", "a"]);

        store.attach("c", "p", 0).unwrap();
        assert_eq!(store.children_of("p").unwrap(), vec!["c", "b", "a"]);
        store.verify_forest().unwrap();
    }

    #[test]
    fn test_attach_rejects_cycles() {
        let mut store = store_with(&["a", "b", "c"]);
        store.attach("b", "a", 0).unwrap();
        store.attach("c", "b", 0).unwrap();

        let err = store.attach("a", "c", 0).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidHierarchy(_)));
        let err = store.attach("a", "a", 0).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidHierarchy(_)));
        store.verify_forest().unwrap();
    }

    #[test]
    fn test_attach_unknown_ids() {
        let mut store = store_with(&["p"]);
        assert_eq!(
            store.attach("ghost", "p", 0).unwrap_err(),
            BridgeError::NotFound("ghost".into())
        );
        assert_eq!(
            store.attach("p", "ghost", 0).unwrap_err(),
            BridgeError::NotFound("ghost".into())
        );
    }

    #[test]
    fn test_set_children_replaces_and_detaches() {
        let mut store = store_with(&["p", "a", "b", "c", "old"]);
        store.attach("old", "p", 0).unwrap();

        let detached = store.set_children("p", &["a", "b", "c"]).unwrap();
        assert_eq!(detached, vec!["old".to_string()]);
        assert_eq!(store.children_of("p").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.parent_of("old").unwrap(), None);
        store.verify_forest().unwrap();
    }

    #[test]
    fn test_set_children_steals_from_other_parent() {
        let mut store = store_with(&["p", "q", "a"]);
        store.attach("a", "q", 0).unwrap();
        store.set_children("p", &["a"]).unwrap();

        assert!(store.children_of("q").unwrap().is_empty());
        assert_eq!(store.parent_of("a").unwrap(), Some("p"));
        store.verify_forest().unwrap();
    }

    #[test]
    fn test_set_children_is_all_or_nothing() {
        let mut store = store_with(&["p", "a", "b"]);
        store.set_children("p", &["a"]).unwrap();

        let err = store.set_children("p", &["b", "ghost"]).unwrap_err();
        assert_eq!(err, BridgeError::NotFound("ghost".into()));
        assert_eq!(store.children_of("p").unwrap(), vec!["a"]);

        let err = store.set_children("p", &["b", "b"]).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidHierarchy(_)));
        assert_eq!(store.children_of("p").unwrap(), vec!["a"]);
    }

    #[test]
    fn test_delete_cascades() {
        let mut store = store_with(&["root", "a", "b", "c"]);
        store.set_children("root", &["a"]).unwrap();
        store.set_children("a", &["b", "c"]).unwrap();

        let removed = store.delete("a", DeletePolicy::Cascade).unwrap();
        assert_eq!(removed, vec!["a", "b", "c"]);
        assert!(store.children_of("root").unwrap().is_empty());
        assert!(!store.contains("b"));
        assert_eq!(store.len(), 1);
        assert!(matches!(
            store.update("b", &PropertySet::new()),
            Err(BridgeError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_orphans_children() {
        let mut store = store_with(&["root", "a", "b"]);
        store.set_children("root", &["a"]).unwrap();
        store.set_children("a", &["b"]).unwrap();

        let removed = store.delete("a", DeletePolicy::Orphan).unwrap();
        assert_eq!(removed, vec!["a"]);
        assert_eq!(store.parent_of("b").unwrap(), None);
        assert_eq!(store.roots(), vec!["root", "b"]);
        store.verify_forest().unwrap();
    }

    #[test]
    fn test_removal_set_matches_delete() {
        let mut store = store_with(&["a", "b", "c"]);
        store.set_children("a", &["b", "c"]).unwrap();
        let planned = store.removal_set("a", DeletePolicy::Cascade).unwrap();
        let removed = store.delete("a", DeletePolicy::Cascade).unwrap();
        assert_eq!(planned, removed);
        assert!(store.is_empty());
    }

    #[test]
    fn test_deleted_slot_reuse_does_not_confuse_ids() {
        let mut store = store_with(&["a"]);
        store.delete("a", DeletePolicy::Cascade).unwrap();
        store.create("b", "View", PropertySet::new()).unwrap();
        assert!(!store.contains("a"));
        assert_eq!(store.node("b").map(ViewNode::id), Some("b"));
    }

    #[test]
    fn test_geometry_must_be_finite() {
        let mut store = store_with(&["a"]);
        store.set_geometry("a", Geometry::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert_eq!(
            store.node("a").unwrap().geometry(),
            Some(Geometry::new(1.0, 2.0, 3.0, 4.0))
        );
        assert!(store
            .set_geometry("a", Geometry::new(f32::NAN, 0.0, 0.0, 0.0))
            .is_err());
    }
}
