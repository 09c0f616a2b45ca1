//! Renderer side of a view tree bridge.
//!
//! A controller drives a tree of native views through string ids. Tree
//! mutations are applied synchronously against a [`ViewTreeStore`]; layout,
//! text measurement, bulk hierarchy exchange and events run through a queued
//! lane so they never block the mutation path.

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod hierarchy;
pub mod lane;
pub mod layout;
pub mod logging;
pub mod measure;
pub mod node;
pub mod props;
pub mod protocol;
pub mod registry;
pub mod store;
pub mod stub;

pub use bridge::{Bridge, ScreenDimensions};
pub use config::{BridgeConfig, DeletePolicy};
pub use dispatch::Dispatcher;
pub use error::{BridgeError, Result, Status};
pub use events::{normalize_event_name, EventStream, ViewEvent};
pub use hierarchy::{HierarchyNode, SyncAck};
pub use lane::LaneHandle;
pub use layout::{FlexLayout, LayoutEngine, LayoutTree, Viewport};
pub use measure::{MonospaceMeasurer, Size, TextMeasurer, TextStyle};
pub use node::Geometry;
pub use props::PropertySet;
pub use protocol::{Call, Reply, PROTOCOL_VERSION};
pub use registry::{HandlerResult, HandlerSet, Operation, ViewHandlers};
pub use store::ViewTreeStore;
pub use stub::{LogBuffer, StubViews};
