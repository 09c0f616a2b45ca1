//! Bulk hierarchy exchange.
//!
//! `snapshot` serializes a subtree for the controller. `parse_payload` and
//! `reconcile` take a subtree description pushed by the controller and bring
//! the store in line with it, producing the native calls needed to mirror the
//! change.

use crate::config::DeletePolicy;
use crate::error::{BridgeError, Result};
use crate::node::Geometry;
use crate::props::PropertySet;
use crate::registry::{Operation, ViewHandlers};
use crate::store::ViewTreeStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// One node of a nested hierarchy, as produced by `getNodeHierarchy` and
/// accepted by `syncNodeHierarchy`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: String,
    #[serde(rename = "type", alias = "viewType")]
    pub view_type: String,
    #[serde(default)]
    pub props: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Vec<HierarchyNode>,
}

#[derive(Debug, Deserialize)]
struct FlatTree {
    root: String,
    nodes: Vec<FlatNode>,
}

#[derive(Debug, Deserialize)]
struct FlatNode {
    id: String,
    #[serde(rename = "type", alias = "viewType")]
    view_type: String,
    #[serde(default)]
    props: Value,
    #[serde(default)]
    layout: Option<Geometry>,
    #[serde(default)]
    children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayloadNode {
    pub id: String,
    pub view_type: String,
    pub props: PropertySet,
    pub layout: Option<Geometry>,
    pub children: Vec<String>,
}

/// A validated payload: unique ids, every child resolved, every node
/// reachable from `root`. Nodes are in pre-order.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPayload {
    pub root: String,
    pub nodes: Vec<PayloadNode>,
}

impl SyncPayload {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub checked: usize,
    pub mismatched: usize,
    pub created: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAck {
    pub success: bool,
    pub nodes_checked: usize,
    pub nodes_mismatched: usize,
    pub nodes_created: usize,
    pub nodes_removed: usize,
    pub tree: HierarchyNode,
}

impl SyncAck {
    pub fn new(report: SyncReport, tree: HierarchyNode) -> Self {
        Self {
            success: true,
            nodes_checked: report.checked,
            nodes_mismatched: report.mismatched,
            nodes_created: report.created,
            nodes_removed: report.removed,
            tree,
        }
    }
}

fn malformed(msg: impl Into<String>) -> BridgeError {
    BridgeError::MalformedTree(msg.into())
}

fn payload_node(
    id: String,
    view_type: String,
    props: Value,
    layout: Option<Geometry>,
    children: Vec<String>,
) -> Result<PayloadNode> {
    if id.is_empty() {
        return Err(malformed("node without an id"));
    }
    if view_type.is_empty() {
        return Err(malformed(format!("node '{id}' has no type")));
    }
    if layout.is_some_and(|g| !g.is_finite()) {
        return Err(malformed(format!("node '{id}' has a non-finite layout")));
    }
    Ok(PayloadNode {
        props: PropertySet::from_value(props)?,
        id,
        view_type,
        layout,
        children,
    })
}

/// Accepts either the nested shape or `{"root": id, "nodes": [...]}`.
pub fn parse_payload(root_id: &str, raw: Value) -> Result<SyncPayload> {
    let payload = if raw.get("nodes").is_some() {
        let flat: FlatTree =
            serde_json::from_value(raw).map_err(|e| malformed(e.to_string()))?;
        from_flat(flat)?
    } else {
        let nested: HierarchyNode =
            serde_json::from_value(raw).map_err(|e| malformed(e.to_string()))?;
        from_nested(nested)?
    };

    if payload.root != root_id {
        return Err(malformed(format!(
            "payload root '{}' does not match '{root_id}'",
            payload.root
        )));
    }
    Ok(payload)
}

fn from_nested(root: HierarchyNode) -> Result<SyncPayload> {
    let root_id = root.id.clone();
    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if !seen.insert(node.id.clone()) {
            return Err(malformed(format!("duplicate id '{}'", node.id)));
        }
        let child_ids = node.children.iter().map(|c| c.id.clone()).collect();
        stack.extend(node.children.into_iter().rev());
        nodes.push(payload_node(
            node.id,
            node.view_type,
            node.props,
            node.layout,
            child_ids,
        )?);
    }

    Ok(SyncPayload {
        root: root_id,
        nodes,
    })
}

fn from_flat(flat: FlatTree) -> Result<SyncPayload> {
    let mut by_id: HashMap<String, FlatNode> = HashMap::with_capacity(flat.nodes.len());
    for node in flat.nodes {
        if by_id.contains_key(&node.id) {
            return Err(malformed(format!("duplicate id '{}'", node.id)));
        }
        by_id.insert(node.id.clone(), node);
    }
    if !by_id.contains_key(&flat.root) {
        return Err(malformed(format!("root '{}' is not among the nodes", flat.root)));
    }

    let mut parent_of: HashMap<&str, &str> = HashMap::new();
    for node in by_id.values() {
        for child in &node.children {
            if !by_id.contains_key(child) {
                return Err(malformed(format!(
                    "'{}' references missing child '{child}'",
                    node.id
                )));
            }
            if child == &flat.root {
                return Err(malformed(format!("root '{child}' listed as a child")));
            }
            if let Some(previous) = parent_of.insert(child, &node.id) {
                return Err(malformed(format!(
                    "'{child}' has two parents, '{previous}' and '{}'",
                    node.id
                )));
            }
        }
    }

    let mut order = Vec::with_capacity(by_id.len());
    let mut stack = vec![flat.root.clone()];
    while let Some(id) = stack.pop() {
        if let Some(node) = by_id.get(&id) {
            stack.extend(node.children.iter().rev().cloned());
        }
        order.push(id);
    }
    if order.len() != by_id.len() {
        return Err(malformed(format!(
            "{} nodes are unreachable from '{}'",
            by_id.len() - order.len(),
            flat.root
        )));
    }

    let mut nodes = Vec::with_capacity(order.len());
    for id in order {
        if let Some(node) = by_id.remove(&id) {
            nodes.push(payload_node(
                node.id,
                node.view_type,
                node.props,
                node.layout,
                node.children,
            )?);
        }
    }
    Ok(SyncPayload {
        root: flat.root,
        nodes,
    })
}

pub fn snapshot(store: &ViewTreeStore, id: &str) -> Result<HierarchyNode> {
    let node = store.node(id).ok_or_else(|| BridgeError::not_found(id))?;
    let children = store
        .children_of(id)?
        .into_iter()
        .map(|child| snapshot(store, child))
        .collect::<Result<Vec<_>>>()?;
    Ok(HierarchyNode {
        id: node.id().to_string(),
        view_type: node.view_type().to_string(),
        props: node.props().to_value(),
        layout: node.geometry(),
        parent: store.parent_of(id)?.map(str::to_string),
        children,
    })
}

/// Native call produced by a reconciliation, replayed on the view handlers
/// before the reconciled store is committed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SyncOp {
    Create {
        id: String,
        view_type: String,
        props: PropertySet,
    },
    Update {
        id: String,
        patch: PropertySet,
    },
    Delete {
        id: String,
    },
    SetChildren {
        id: String,
        children: Vec<String>,
    },
    Attach {
        child: String,
        parent: String,
        index: usize,
    },
    ApplyLayout {
        id: String,
        geometry: Geometry,
    },
}

impl SyncOp {
    pub(crate) fn apply(&self, views: &mut dyn ViewHandlers) -> Result<()> {
        let (op, outcome) = match self {
            SyncOp::Create {
                id,
                view_type,
                props,
            } => (Operation::CreateView, views.create_view(id, view_type, props)),
            SyncOp::Update { id, patch } => (Operation::UpdateView, views.update_view(id, patch)),
            SyncOp::Delete { id } => (
                Operation::DeleteView,
                views.delete_view(id, std::slice::from_ref(id)),
            ),
            SyncOp::SetChildren { id, children } => {
                (Operation::SetChildren, views.set_children(id, children))
            }
            SyncOp::Attach {
                child,
                parent,
                index,
            } => (Operation::AttachView, views.attach_view(child, parent, *index)),
            SyncOp::ApplyLayout { id, geometry } => {
                (Operation::UpdateViewLayout, views.apply_layout(id, *geometry))
            }
        };
        outcome.map_err(|message| BridgeError::HandlerFailed { op, message })
    }
}

/// Keys to set plus `null` for keys that disappear.
fn props_patch(old: &PropertySet, new: &PropertySet) -> PropertySet {
    let mut patch = PropertySet::new();
    for (key, value) in new.iter() {
        if old.get(key) != Some(value) {
            patch.insert(key.clone(), value.clone());
        }
    }
    for (key, _) in old.iter() {
        if new.get(key).is_none() {
            patch.insert(key.clone(), Value::Null);
        }
    }
    patch
}

/// Brings the subtree at `payload.root` in line with the payload.
///
/// Runs against a working copy; on error the copy is discarded by the caller.
pub(crate) fn reconcile(
    store: &mut ViewTreeStore,
    payload: &SyncPayload,
) -> Result<(SyncReport, Vec<SyncOp>)> {
    let root = payload.root.as_str();

    let existing: Vec<String> = match store.handle_of(root) {
        Some(handle) => store
            .subtree(handle)
            .into_iter()
            .filter_map(|h| store.node_at(h))
            .map(|n| n.id().to_string())
            .collect(),
        None => Vec::new(),
    };
    let existing_set: HashSet<&str> = existing.iter().map(String::as_str).collect();

    for node in &payload.nodes {
        if store.contains(&node.id) && !existing_set.contains(node.id.as_str()) {
            return Err(malformed(format!(
                "'{}' already exists outside the subtree of '{root}'",
                node.id
            )));
        }
    }

    let incoming: HashMap<&str, &PayloadNode> =
        payload.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    let anchor = match store.parent_of(root) {
        Ok(Some(parent)) => {
            let index = store
                .children_of(parent)?
                .iter()
                .position(|c| *c == root)
                .unwrap_or(0);
            Some((parent.to_string(), index))
        }
        _ => None,
    };

    let mut old_children: HashMap<&str, Vec<String>> = HashMap::with_capacity(existing.len());
    for id in &existing {
        let children = store.children_of(id)?.into_iter().map(str::to_string).collect();
        old_children.insert(id.as_str(), children);
    }

    let recreated: HashSet<&str> = payload
        .nodes
        .iter()
        .filter(|n| store.node(&n.id).is_some_and(|cur| cur.view_type() != n.view_type))
        .map(|n| n.id.as_str())
        .collect();

    let mut report = SyncReport {
        checked: payload.nodes.len(),
        ..SyncReport::default()
    };
    let mut ops = Vec::new();

    // Detach everything below the root so nodes can be removed and moved
    // one at a time.
    for id in &existing {
        store.set_children::<&str>(id, &[])?;
    }

    for id in &existing {
        if incoming.contains_key(id.as_str()) && !recreated.contains(id.as_str()) {
            continue;
        }
        store.delete(id, DeletePolicy::Orphan)?;
        ops.push(SyncOp::Delete { id: id.clone() });
        report.removed += 1;
    }

    let mut fresh: HashSet<&str> = HashSet::new();
    for node in &payload.nodes {
        let Some(current) = store.node(&node.id) else {
            store.create(&node.id, &node.view_type, node.props.clone())?;
            ops.push(SyncOp::Create {
                id: node.id.clone(),
                view_type: node.view_type.clone(),
                props: node.props.clone(),
            });
            fresh.insert(node.id.as_str());
            report.created += 1;
            if recreated.contains(node.id.as_str()) {
                report.mismatched += 1;
            }
            continue;
        };

        let patch = (current.props() != &node.props).then(|| props_patch(current.props(), &node.props));
        let geometry_differs = node.layout.is_some_and(|g| current.geometry() != Some(g));
        let children_differ = old_children.get(node.id.as_str()) != Some(&node.children);

        if patch.is_some() || geometry_differs || children_differ {
            report.mismatched += 1;
        }
        if let Some(patch) = patch {
            store.replace_props(&node.id, node.props.clone())?;
            ops.push(SyncOp::Update {
                id: node.id.clone(),
                patch,
            });
        }
    }

    for node in &payload.nodes {
        store.set_children(&node.id, &node.children)?;
        let changed = if fresh.contains(node.id.as_str()) {
            !node.children.is_empty()
        } else {
            old_children.get(node.id.as_str()) != Some(&node.children)
        };
        if changed {
            ops.push(SyncOp::SetChildren {
                id: node.id.clone(),
                children: node.children.clone(),
            });
        }
    }

    if let Some((parent, index)) = anchor {
        if fresh.contains(root) && store.contains(&parent) {
            let index = index.min(store.children_of(&parent)?.len());
            store.attach(root, &parent, index as i64)?;
            ops.push(SyncOp::Attach {
                child: root.to_string(),
                parent,
                index,
            });
        }
    }

    for node in &payload.nodes {
        let Some(geometry) = node.layout else {
            continue;
        };
        if store.node(&node.id).and_then(|n| n.geometry()) != Some(geometry) {
            store.set_geometry(&node.id, geometry)?;
            ops.push(SyncOp::ApplyLayout {
                id: node.id.clone(),
                geometry,
            });
        }
    }

    Ok((report, ops))
}
