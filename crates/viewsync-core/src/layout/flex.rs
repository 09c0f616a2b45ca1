use super::style::to_style;
use super::{LayoutEngine, LayoutNode, LayoutTree, Viewport};
use crate::error::{BridgeError, Result};
use crate::measure::{TextMeasurer, TextStyle};
use crate::node::Geometry;
use taffy::{AvailableSpace, Dimension, NodeId, Style, TaffyError, TaffyTree};
use tracing::warn;

/// Context attached to text leaves so the measure callback can size them.
struct TextLeaf {
    text: String,
    style: TextStyle,
}

/// Flexbox layout on top of taffy.
#[derive(Debug, Clone, Copy)]
pub struct FlexLayout {
    default_font_size: f32,
}

impl FlexLayout {
    pub fn new(default_font_size: f32) -> Self {
        Self { default_font_size }
    }

    fn text_leaf(&self, node: &LayoutNode) -> Option<TextLeaf> {
        if !node.children.is_empty() {
            return None;
        }
        let text = node
            .props
            .get_str("text")
            .or_else(|| node.props.get_str("content"))?;
        Some(TextLeaf {
            text: text.to_string(),
            style: TextStyle::from_props(&node.props, self.default_font_size),
        })
    }
}

impl Default for FlexLayout {
    fn default() -> Self {
        Self::new(14.0)
    }
}

fn layout_error(err: TaffyError) -> BridgeError {
    BridgeError::LayoutError(err.to_string())
}

fn measure_leaf(
    known: taffy::Size<Option<f32>>,
    available: taffy::Size<AvailableSpace>,
    leaf: Option<&mut TextLeaf>,
    measurer: Option<&dyn TextMeasurer>,
) -> taffy::Size<f32> {
    let (Some(leaf), Some(measurer)) = (leaf, measurer) else {
        return taffy::Size::ZERO;
    };

    let wrap_at = known.width.or(match available.width {
        AvailableSpace::Definite(w) => Some(w),
        AvailableSpace::MinContent | AvailableSpace::MaxContent => None,
    });
    let mut style = leaf.style.clone();
    if let Some(w) = wrap_at.filter(|w| *w > 0.0) {
        style.max_width = Some(style.max_width.map_or(w, |m| m.min(w)));
    }

    match measurer.measure(&leaf.text, &style) {
        Ok(size) => taffy::Size {
            width: known.width.unwrap_or(size.width),
            height: known.height.unwrap_or(size.height),
        },
        Err(err) => {
            warn!(error = %err, "text measurement failed during layout");
            taffy::Size::ZERO
        }
    }
}

impl LayoutEngine for FlexLayout {
    fn compute(
        &self,
        tree: &LayoutTree,
        viewport: Viewport,
        measurer: Option<&dyn TextMeasurer>,
    ) -> Result<Vec<Geometry>> {
        let mut taffy: TaffyTree<TextLeaf> = TaffyTree::with_capacity(tree.len());
        let mut ids: Vec<NodeId> = Vec::with_capacity(tree.len());

        for node in &tree.nodes {
            let style = to_style(&node.props);
            let id = match self.text_leaf(node) {
                Some(leaf) => taffy.new_leaf_with_context(style, leaf),
                None => taffy.new_leaf(style),
            }
            .map_err(layout_error)?;
            ids.push(id);
        }

        let lookup = |idx: usize| {
            ids.get(idx)
                .copied()
                .ok_or_else(|| BridgeError::LayoutError(format!("node index {idx} out of range")))
        };

        for (idx, node) in tree.nodes.iter().enumerate() {
            if node.children.is_empty() {
                continue;
            }
            let children = node
                .children
                .iter()
                .map(|&c| lookup(c))
                .collect::<Result<Vec<_>>>()?;
            taffy.set_children(lookup(idx)?, &children).map_err(layout_error)?;
        }

        let available = taffy::Size {
            width: AvailableSpace::Definite(viewport.width),
            height: AvailableSpace::Definite(viewport.height),
        };
        for &root in &tree.roots {
            let root_id = lookup(root)?;

            // Roots fill the viewport unless they size themselves.
            let mut style: Style = taffy.style(root_id).map_err(layout_error)?.clone();
            if style.size.width == Dimension::Auto {
                style.size.width = Dimension::Length(viewport.width);
            }
            if style.size.height == Dimension::Auto {
                style.size.height = Dimension::Length(viewport.height);
            }
            taffy.set_style(root_id, style).map_err(layout_error)?;

            taffy
                .compute_layout_with_measure(
                    root_id,
                    available,
                    |known, avail, _node: NodeId, leaf: Option<&mut TextLeaf>, _style: &Style| {
                        measure_leaf(known, avail, leaf, measurer)
                    },
                )
                .map_err(layout_error)?;
        }

        ids.iter()
            .map(|&id| {
                let layout = taffy.layout(id).map_err(layout_error)?;
                Ok(Geometry::new(
                    layout.location.x,
                    layout.location.y,
                    layout.size.width,
                    layout.size.height,
                ))
            })
            .collect()
    }
}
