use crate::error::{BridgeError, Result};
use crate::layout::{FlexLayout, LayoutEngine};
use crate::measure::{MonospaceMeasurer, TextMeasurer};
use crate::node::Geometry;
use crate::props::PropertySet;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Every call the controller can make across the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Initialize,
    CreateView,
    UpdateView,
    DeleteView,
    AttachView,
    SetChildren,
    UpdateViewLayout,
    CalculateLayout,
    MeasureText,
    SyncNodeHierarchy,
    GetNodeHierarchy,
    AddEventListeners,
    RemoveEventListeners,
    EmitEvent,
    GetScreenDimensions,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Initialize => "initialize",
            Operation::CreateView => "createView",
            Operation::UpdateView => "updateView",
            Operation::DeleteView => "deleteView",
            Operation::AttachView => "attachView",
            Operation::SetChildren => "setChildren",
            Operation::UpdateViewLayout => "updateViewLayout",
            Operation::CalculateLayout => "calculateLayout",
            Operation::MeasureText => "measureText",
            Operation::SyncNodeHierarchy => "syncNodeHierarchy",
            Operation::GetNodeHierarchy => "getNodeHierarchy",
            Operation::AddEventListeners => "addEventListeners",
            Operation::RemoveEventListeners => "removeEventListeners",
            Operation::EmitEvent => "emitEvent",
            Operation::GetScreenDimensions => "getScreenDimensions",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error text reported by a native handler.
pub type HandlerResult = std::result::Result<(), String>;

/// Native side of the synchronous mutation path.
///
/// Each method is called after the store has validated the mutation and
/// before it commits; returning `Err` aborts the mutation.
pub trait ViewHandlers: Send {
    fn create_view(&mut self, id: &str, view_type: &str, props: &PropertySet) -> HandlerResult;

    fn update_view(&mut self, id: &str, patch: &PropertySet) -> HandlerResult;

    /// `removed` lists every id leaving the store, `id` first.
    fn delete_view(&mut self, id: &str, removed: &[String]) -> HandlerResult;

    fn attach_view(&mut self, child: &str, parent: &str, index: usize) -> HandlerResult;

    fn set_children(&mut self, id: &str, children: &[String]) -> HandlerResult;

    fn apply_layout(&mut self, id: &str, geometry: Geometry) -> HandlerResult;
}

/// Capabilities supplied by the renderer at startup.
#[derive(Default)]
pub struct HandlerSet {
    pub views: Option<Box<dyn ViewHandlers>>,
    pub layout: Option<Arc<dyn LayoutEngine>>,
    pub measurer: Option<Arc<dyn TextMeasurer>>,
}

impl HandlerSet {
    pub fn new(views: impl ViewHandlers + 'static) -> Self {
        Self {
            views: Some(Box::new(views)),
            layout: None,
            measurer: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_layout(mut self, engine: impl LayoutEngine + 'static) -> Self {
        self.layout = Some(Arc::new(engine));
        self
    }

    pub fn with_measurer(mut self, measurer: impl TextMeasurer + 'static) -> Self {
        self.measurer = Some(Arc::new(measurer));
        self
    }

    /// Fills the queued capabilities with the built-in flexbox engine and
    /// monospace measurer where none were given.
    pub fn with_defaults(mut self, default_font_size: f32) -> Self {
        if self.layout.is_none() {
            self.layout = Some(Arc::new(FlexLayout::new(default_font_size)));
        }
        if self.measurer.is_none() {
            self.measurer = Some(Arc::new(MonospaceMeasurer));
        }
        self
    }
}

/// Queued-path capabilities. Each slot can be filled once.
#[derive(Default)]
pub(crate) struct Registry {
    layout: RwLock<Option<Arc<dyn LayoutEngine>>>,
    measurer: RwLock<Option<Arc<dyn TextMeasurer>>>,
}

impl Registry {
    pub(crate) fn new(
        layout: Option<Arc<dyn LayoutEngine>>,
        measurer: Option<Arc<dyn TextMeasurer>>,
    ) -> Self {
        Self {
            layout: RwLock::new(layout),
            measurer: RwLock::new(measurer),
        }
    }

    pub(crate) fn layout(&self) -> Result<Arc<dyn LayoutEngine>> {
        self.layout
            .read()
            .clone()
            .ok_or(BridgeError::Unimplemented(Operation::CalculateLayout))
    }

    pub(crate) fn measurer(&self) -> Result<Arc<dyn TextMeasurer>> {
        self.measurer
            .read()
            .clone()
            .ok_or(BridgeError::Unimplemented(Operation::MeasureText))
    }

    /// The measurer if one is installed; layout falls back to zero-size
    /// text leaves without it.
    pub(crate) fn measurer_opt(&self) -> Option<Arc<dyn TextMeasurer>> {
        self.measurer.read().clone()
    }

    pub(crate) fn install_layout(&self, engine: Arc<dyn LayoutEngine>) -> Result<()> {
        let mut slot = self.layout.write();
        if slot.is_some() {
            return Err(BridgeError::AlreadyRegistered("layout engine"));
        }
        *slot = Some(engine);
        Ok(())
    }

    pub(crate) fn install_measurer(&self, measurer: Arc<dyn TextMeasurer>) -> Result<()> {
        let mut slot = self.measurer.write();
        if slot.is_some() {
            return Err(BridgeError::AlreadyRegistered("text measurer"));
        }
        *slot = Some(measurer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operations_display_wire_names() {
        assert_eq!(Operation::CreateView.to_string(), "createView");
        assert_eq!(Operation::GetNodeHierarchy.to_string(), "getNodeHierarchy");
    }

    #[test]
    fn test_missing_capabilities_report_unimplemented() {
        let registry = Registry::default();
        assert_eq!(
            registry.layout().err(),
            Some(BridgeError::Unimplemented(Operation::CalculateLayout))
        );
        assert_eq!(
            registry.measurer().err(),
            Some(BridgeError::Unimplemented(Operation::MeasureText))
        );
    }

    #[test]
    fn test_capabilities_install_once() {
        let registry = Registry::default();
        registry.install_measurer(Arc::new(MonospaceMeasurer)).unwrap();
        assert_eq!(
            registry.install_measurer(Arc::new(MonospaceMeasurer)),
            Err(BridgeError::AlreadyRegistered("text measurer"))
        );
        assert!(registry.measurer().is_ok());
    }
}
