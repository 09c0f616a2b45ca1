//! Queued path.
//!
//! One worker task drains a bounded channel in FIFO order. Each request
//! carries a oneshot sender for its reply; a caller that stops waiting just
//! drops the receiver and the result is discarded.

use crate::bridge::Bridge;
use crate::error::{BridgeError, Result};
use crate::hierarchy::{HierarchyNode, SyncAck};
use crate::layout::Viewport;
use crate::measure::Size;
use crate::props::PropertySet;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

pub(crate) enum LaneRequest {
    CalculateLayout {
        width: f32,
        height: f32,
        respond_to: oneshot::Sender<Result<usize>>,
    },
    MeasureText {
        id: String,
        text: String,
        attributes: PropertySet,
        respond_to: oneshot::Sender<Result<Size>>,
    },
    SyncHierarchy {
        root_id: String,
        payload: Value,
        respond_to: oneshot::Sender<Result<SyncAck>>,
    },
    GetHierarchy {
        id: String,
        respond_to: oneshot::Sender<Result<HierarchyNode>>,
    },
    Listeners {
        id: String,
        names: Vec<String>,
        add: bool,
        respond_to: oneshot::Sender<Result<()>>,
    },
    EmitEvent {
        id: String,
        name: String,
        data: Value,
        respond_to: oneshot::Sender<Result<bool>>,
    },
}

/// Cloneable sender side of the queued path.
#[derive(Clone)]
pub struct LaneHandle {
    tx: mpsc::Sender<LaneRequest>,
}

impl Bridge {
    /// Starts the lane worker on the current tokio runtime.
    ///
    /// The worker stops once every `LaneHandle` is dropped.
    pub fn spawn_lane(&self) -> LaneHandle {
        let (tx, rx) = mpsc::channel(self.config().queue_capacity);
        let bridge = self.clone();
        tokio::spawn(async move {
            run(bridge, rx).await;
        });
        LaneHandle { tx }
    }
}

async fn run(bridge: Bridge, mut rx: mpsc::Receiver<LaneRequest>) {
    while let Some(request) = rx.recv().await {
        handle(&bridge, request).await;
    }
    debug!("lane closed");
}

async fn handle(bridge: &Bridge, request: LaneRequest) {
    match request {
        LaneRequest::CalculateLayout {
            width,
            height,
            respond_to,
        } => {
            let result = match Viewport::new(width, height) {
                Ok(viewport) => bridge.run_layout(viewport).await,
                Err(err) => Err(err),
            };
            let _ = respond_to.send(result);
        }
        LaneRequest::MeasureText {
            id,
            text,
            attributes,
            respond_to,
        } => {
            let _ = respond_to.send(bridge.run_measure(&id, &text, &attributes));
        }
        LaneRequest::SyncHierarchy {
            root_id,
            payload,
            respond_to,
        } => {
            let _ = respond_to.send(bridge.run_sync(&root_id, payload));
        }
        LaneRequest::GetHierarchy { id, respond_to } => {
            let _ = respond_to.send(bridge.run_get(&id));
        }
        LaneRequest::Listeners {
            id,
            names,
            add,
            respond_to,
        } => {
            let _ = respond_to.send(bridge.run_listeners(&id, &names, add));
        }
        LaneRequest::EmitEvent {
            id,
            name,
            data,
            respond_to,
        } => {
            let _ = respond_to.send(bridge.run_emit(&id, &name, data));
        }
    }
}

impl LaneHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> LaneRequest,
    ) -> Result<T> {
        let (respond_to, reply) = oneshot::channel();
        self.tx
            .send(build(respond_to))
            .await
            .map_err(|_| BridgeError::LaneClosed)?;
        reply.await.map_err(|_| BridgeError::LaneClosed)?
    }

    /// Lays out every root against the given viewport. Returns how many
    /// nodes received geometry.
    pub async fn calculate_layout(&self, width: f32, height: f32) -> Result<usize> {
        self.request(|respond_to| LaneRequest::CalculateLayout {
            width,
            height,
            respond_to,
        })
        .await
    }

    pub async fn measure_text(
        &self,
        id: &str,
        text: &str,
        attributes: PropertySet,
    ) -> Result<Size> {
        self.request(|respond_to| LaneRequest::MeasureText {
            id: id.to_string(),
            text: text.to_string(),
            attributes,
            respond_to,
        })
        .await
    }

    pub async fn sync_node_hierarchy(&self, root_id: &str, payload: Value) -> Result<SyncAck> {
        self.request(|respond_to| LaneRequest::SyncHierarchy {
            root_id: root_id.to_string(),
            payload,
            respond_to,
        })
        .await
    }

    pub async fn get_node_hierarchy(&self, id: &str) -> Result<HierarchyNode> {
        self.request(|respond_to| LaneRequest::GetHierarchy {
            id: id.to_string(),
            respond_to,
        })
        .await
    }

    pub async fn add_event_listeners<S: AsRef<str>>(&self, id: &str, names: &[S]) -> Result<()> {
        self.listeners(id, names, true).await
    }

    pub async fn remove_event_listeners<S: AsRef<str>>(
        &self,
        id: &str,
        names: &[S],
    ) -> Result<()> {
        self.listeners(id, names, false).await
    }

    async fn listeners<S: AsRef<str>>(&self, id: &str, names: &[S], add: bool) -> Result<()> {
        let names = names.iter().map(|n| n.as_ref().to_string()).collect();
        self.request(|respond_to| LaneRequest::Listeners {
            id: id.to_string(),
            names,
            add,
            respond_to,
        })
        .await
    }

    /// Raises a native event. Resolves to whether it reached a subscriber.
    pub async fn emit_event(&self, id: &str, name: &str, data: Value) -> Result<bool> {
        self.request(|respond_to| LaneRequest::EmitEvent {
            id: id.to_string(),
            name: name.to_string(),
            data,
            respond_to,
        })
        .await
    }
}
