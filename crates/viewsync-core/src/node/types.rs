use crate::props::PropertySet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use smartstring::{LazyCompact, SmartString};
use std::collections::BTreeSet;

/// Dense arena slot. Never leaves the renderer side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub(crate) u32);

impl NodeHandle {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Controller-assigned identifier, stored inline when short.
pub type NodeKey = SmartString<LazyCompact>;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Geometry {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.left.is_finite()
            && self.top.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

#[derive(Debug, Clone)]
pub struct ViewNode {
    pub(crate) key: NodeKey,
    pub(crate) view_type: NodeKey,
    pub(crate) props: PropertySet,
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: SmallVec<[NodeHandle; 4]>,
    pub(crate) geometry: Option<Geometry>,
    pub(crate) listeners: BTreeSet<String>,
}

impl ViewNode {
    pub fn new(key: &str, view_type: &str, props: PropertySet) -> Self {
        Self {
            key: NodeKey::from(key),
            view_type: NodeKey::from(view_type),
            props,
            parent: None,
            children: SmallVec::new(),
            geometry: None,
            listeners: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.key
    }

    pub fn view_type(&self) -> &str {
        &self.view_type
    }

    pub fn props(&self) -> &PropertySet {
        &self.props
    }

    pub fn geometry(&self) -> Option<Geometry> {
        self.geometry
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn listens_to(&self, event: &str) -> bool {
        self.listeners.contains(event)
    }
}
