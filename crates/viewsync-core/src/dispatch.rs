use crate::bridge::Bridge;
use crate::error::{BridgeError, Result};
use crate::lane::LaneHandle;
use crate::node::Geometry;
use crate::props::PropertySet;
use crate::protocol::{Call, Reply};
use serde_json::Value;
use tracing::debug;

/// Routes decoded calls to the fast path or the lane and turns every
/// outcome into a [`Reply`].
#[derive(Clone)]
pub struct Dispatcher {
    bridge: Bridge,
    lane: LaneHandle,
}

impl Dispatcher {
    pub fn new(bridge: Bridge, lane: LaneHandle) -> Self {
        Self { bridge, lane }
    }

    /// Starts a lane for `bridge` on the current runtime.
    pub fn spawn(bridge: Bridge) -> Self {
        let lane = bridge.spawn_lane();
        Self::new(bridge, lane)
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    pub fn lane(&self) -> &LaneHandle {
        &self.lane
    }

    pub async fn dispatch_json(&self, raw: &str) -> Reply {
        match Call::from_json(raw) {
            Ok(call) => self.dispatch(call).await,
            Err(err) => Reply::from_error(&err),
        }
    }

    pub async fn dispatch(&self, call: Call) -> Reply {
        let op = call.operation();
        let reply = match call {
            Call::Initialize => Reply::from_result(self.bridge.initialize()),
            Call::CreateView {
                id,
                view_type,
                props,
            } => Reply::from_result(
                PropertySet::from_value(props)
                    .and_then(|props| self.bridge.create_view(&id, &view_type, props)),
            ),
            Call::UpdateView { id, props } => Reply::from_result(
                PropertySet::from_value(props).and_then(|patch| self.bridge.update_view(&id, patch)),
            ),
            Call::DeleteView { id } => Reply::from_result(self.bridge.delete_view(&id)),
            Call::AttachView {
                child_id,
                parent_id,
                index,
            } => Reply::from_result(self.bridge.attach_view(&child_id, &parent_id, index)),
            Call::SetChildren { id, child_ids } => {
                Reply::from_result(self.bridge.set_children(&id, &child_ids))
            }
            Call::UpdateViewLayout {
                id,
                left,
                top,
                width,
                height,
            } => Reply::from_result(
                self.bridge
                    .update_view_layout(&id, Geometry::new(left, top, width, height)),
            ),
            Call::GetScreenDimensions => Reply::from_result(Ok(self.bridge.screen_dimensions())),

            Call::CalculateLayout {
                screen_width,
                screen_height,
            } => Reply::from_result(
                self.lane
                    .calculate_layout(screen_width, screen_height)
                    .await
                    .map(|_| ()),
            ),
            Call::MeasureText {
                id,
                text,
                attributes,
            } => match PropertySet::from_value(attributes) {
                Ok(attrs) => Reply::from_result(self.lane.measure_text(&id, &text, attrs).await),
                Err(err) => Reply::from_error(&err),
            },
            Call::SyncNodeHierarchy { root_id, tree } => match tree_payload(tree) {
                Ok(tree) => {
                    Reply::from_result(self.lane.sync_node_hierarchy(&root_id, tree).await)
                }
                Err(err) => Reply::from_error(&err),
            },
            Call::GetNodeHierarchy { id } => {
                Reply::from_result(self.lane.get_node_hierarchy(&id).await)
            }
            Call::AddEventListeners { id, event_types } => {
                Reply::from_result(self.lane.add_event_listeners(&id, &event_types).await)
            }
            Call::RemoveEventListeners { id, event_types } => {
                Reply::from_result(self.lane.remove_event_listeners(&id, &event_types).await)
            }
            Call::EmitEvent {
                id,
                event_type,
                data,
            } => Reply::from_result(self.lane.emit_event(&id, &event_type, data).await),
        };
        debug!(%op, status = reply.status, "dispatched");
        reply
    }
}

/// Controllers may send the tree already encoded as a string.
fn tree_payload(tree: Value) -> Result<Value> {
    match tree {
        Value::String(raw) => Ok(serde_json::from_str(&raw)?),
        Value::Object(_) => Ok(tree),
        _ => Err(BridgeError::MalformedTree("tree must be an object".into())),
    }
}
