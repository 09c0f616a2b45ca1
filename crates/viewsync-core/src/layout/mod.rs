mod flex;
mod style;

pub use flex::FlexLayout;

use crate::error::{BridgeError, Result};
use crate::measure::TextMeasurer;
use crate::node::{Geometry, NodeHandle};
use crate::props::PropertySet;
use crate::store::ViewTreeStore;
use std::collections::HashMap;

/// Available space for root nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Result<Self> {
        if !width.is_finite() || !height.is_finite() || width < 0.0 || height < 0.0 {
            return Err(BridgeError::InvalidPayload(format!(
                "viewport {width}x{height} is not a finite, non-negative size"
            )));
        }
        Ok(Self { width, height })
    }
}

#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub id: String,
    pub view_type: String,
    pub props: PropertySet,
    /// Indices into `LayoutTree::nodes`, in child order.
    pub children: Vec<usize>,
}

/// Owned copy of the store's structure, taken under the lock so the
/// computation itself can run without holding it.
#[derive(Debug, Clone, Default)]
pub struct LayoutTree {
    pub nodes: Vec<LayoutNode>,
    pub roots: Vec<usize>,
}

impl LayoutTree {
    pub fn snapshot(store: &ViewTreeStore) -> Result<Self> {
        store.verify_forest()?;

        let mut slots: HashMap<NodeHandle, usize> = HashMap::with_capacity(store.len());
        for (position, (handle, _)) in store.arena().iter().enumerate() {
            slots.insert(handle, position);
        }

        let mut tree = LayoutTree {
            nodes: Vec::with_capacity(store.len()),
            roots: Vec::new(),
        };
        for (position, (_, node)) in store.arena().iter().enumerate() {
            let children = node
                .children
                .iter()
                .map(|h| {
                    slots
                        .get(h)
                        .copied()
                        .ok_or_else(|| BridgeError::LayoutError(format!("dangling child under '{}'", node.id())))
                })
                .collect::<Result<Vec<_>>>()?;
            if node.parent.is_none() {
                tree.roots.push(position);
            }
            tree.nodes.push(LayoutNode {
                id: node.id().to_string(),
                view_type: node.view_type().to_string(),
                props: node.props().clone(),
                children,
            });
        }
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Computes geometry for every node of a tree, relative to its parent.
///
/// The returned vector is indexed like `tree.nodes`.
pub trait LayoutEngine: Send + Sync {
    fn compute(
        &self,
        tree: &LayoutTree,
        viewport: Viewport,
        measurer: Option<&dyn TextMeasurer>,
    ) -> Result<Vec<Geometry>>;
}
