use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::events::{normalize_event_name, EventSink, EventStream, ViewEvent};
use crate::hierarchy::{self, HierarchyNode, SyncAck};
use crate::layout::{LayoutEngine, LayoutTree, Viewport};
use crate::measure::{Size, TextMeasurer, TextStyle};
use crate::node::Geometry;
use crate::props::PropertySet;
use crate::registry::{HandlerResult, HandlerSet, Operation, Registry, ViewHandlers};
use crate::store::ViewTreeStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenDimensions {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

struct Session {
    store: Option<ViewTreeStore>,
    views: Option<Box<dyn ViewHandlers>>,
}

struct Shared {
    config: BridgeConfig,
    session: Mutex<Session>,
    registry: Registry,
    events: EventSink,
}

/// Renderer-side context for one controller session.
///
/// Mutations run synchronously on the calling thread, one at a time under
/// the session lock. Layout, measurement, hierarchy exchange and events go
/// through the lane started by [`Bridge::spawn_lane`].
#[derive(Clone)]
pub struct Bridge {
    shared: Arc<Shared>,
}

fn handler(op: Operation, outcome: HandlerResult) -> Result<()> {
    outcome.map_err(|message| BridgeError::HandlerFailed { op, message })
}

impl Bridge {
    pub fn new(config: BridgeConfig, handlers: HandlerSet) -> Self {
        let HandlerSet {
            views,
            layout,
            measurer,
        } = handlers;
        Self {
            shared: Arc::new(Shared {
                config,
                session: Mutex::new(Session { store: None, views }),
                registry: Registry::new(layout, measurer),
                events: EventSink::default(),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    /// Installs the mutation handlers when none were given at construction.
    pub fn register_views(&self, views: Box<dyn ViewHandlers>) -> Result<()> {
        let mut session = self.shared.session.lock();
        if session.views.is_some() {
            return Err(BridgeError::AlreadyRegistered("view handlers"));
        }
        session.views = Some(views);
        info!("view handlers registered");
        Ok(())
    }

    pub fn register_layout(&self, engine: impl LayoutEngine + 'static) -> Result<()> {
        self.shared.registry.install_layout(Arc::new(engine))
    }

    pub fn register_measurer(&self, measurer: impl TextMeasurer + 'static) -> Result<()> {
        self.shared.registry.install_measurer(Arc::new(measurer))
    }

    /// Starts a fresh session, dropping any existing tree.
    pub fn initialize(&self) -> Result<()> {
        let mut session = self.shared.session.lock();
        let previous = session.store.replace(ViewTreeStore::new());
        info!(
            reset = previous.is_some(),
            dropped = previous.map_or(0, |s| s.len()),
            "session initialized"
        );
        Ok(())
    }

    /// Read-only access to the current tree.
    pub fn inspect<R>(&self, f: impl FnOnce(&ViewTreeStore) -> R) -> Result<R> {
        let session = self.shared.session.lock();
        let store = session.store.as_ref().ok_or(BridgeError::NotReady)?;
        Ok(f(store))
    }

    pub fn screen_dimensions(&self) -> ScreenDimensions {
        let config = &self.shared.config;
        ScreenDimensions {
            width: config.viewport_width,
            height: config.viewport_height,
            scale: config.scale,
        }
    }

    pub fn subscribe_events(&self) -> EventStream {
        self.shared.events.subscribe()
    }

    fn mutate<R>(
        &self,
        op: Operation,
        id: &str,
        apply: impl FnOnce(&mut ViewTreeStore, &mut dyn ViewHandlers) -> Result<R>,
    ) -> Result<R> {
        let mut session = self.shared.session.lock();
        let Session { store, views } = &mut *session;
        let result = match (store.as_mut(), views.as_deref_mut()) {
            (None, _) => Err(BridgeError::NotReady),
            (Some(_), None) => Err(BridgeError::Unimplemented(op)),
            (Some(store), Some(views)) => apply(store, views),
        };
        match &result {
            Ok(_) => debug!(%op, id, "applied"),
            Err(err) => warn!(%op, id, status = err.status().code(), error = %err, "rejected"),
        }
        result
    }

    pub fn create_view(&self, id: &str, view_type: &str, props: PropertySet) -> Result<()> {
        self.mutate(Operation::CreateView, id, |store, views| {
            store.check_create(id, view_type)?;
            handler(Operation::CreateView, views.create_view(id, view_type, &props))?;
            store.create(id, view_type, props)
        })
    }

    pub fn update_view(&self, id: &str, patch: PropertySet) -> Result<()> {
        self.mutate(Operation::UpdateView, id, |store, views| {
            store.check_update(id)?;
            handler(Operation::UpdateView, views.update_view(id, &patch))?;
            store.update(id, &patch)
        })
    }

    pub fn delete_view(&self, id: &str) -> Result<()> {
        let policy = self.shared.config.delete_policy;
        self.mutate(Operation::DeleteView, id, |store, views| {
            let removed = store.removal_set(id, policy)?;
            handler(Operation::DeleteView, views.delete_view(id, &removed))?;
            store.delete(id, policy).map(|_| ())
        })
    }

    pub fn attach_view(&self, child: &str, parent: &str, index: i64) -> Result<()> {
        self.mutate(Operation::AttachView, child, |store, views| {
            let slot = store.check_attach(child, parent, index)?;
            handler(Operation::AttachView, views.attach_view(child, parent, slot))?;
            store.attach(child, parent, index)
        })
    }

    pub fn set_children<S: AsRef<str>>(&self, id: &str, children: &[S]) -> Result<()> {
        self.mutate(Operation::SetChildren, id, |store, views| {
            store.check_set_children(id, children)?;
            let owned: Vec<String> = children.iter().map(|c| c.as_ref().to_string()).collect();
            handler(Operation::SetChildren, views.set_children(id, &owned))?;
            store.set_children(id, children).map(|_| ())
        })
    }

    /// Sets geometry computed elsewhere, bypassing the layout engine.
    pub fn update_view_layout(&self, id: &str, geometry: Geometry) -> Result<()> {
        self.mutate(Operation::UpdateViewLayout, id, |store, views| {
            if !geometry.is_finite() {
                return Err(BridgeError::InvalidPayload(format!(
                    "geometry for '{id}' must be finite"
                )));
            }
            store.check_update(id)?;
            handler(Operation::UpdateViewLayout, views.apply_layout(id, geometry))?;
            store.set_geometry(id, geometry)
        })
    }

    /// Snapshot under the lock, compute off it, write back what still exists.
    /// The store takes the new geometry only if every native view accepted it.
    pub(crate) async fn run_layout(&self, viewport: Viewport) -> Result<usize> {
        let tree = self.inspect(LayoutTree::snapshot)??;
        let engine = self.shared.registry.layout()?;
        let measurer = self.shared.registry.measurer_opt();

        let (tree, computed) = tokio::task::spawn_blocking(move || {
            let computed = engine.compute(&tree, viewport, measurer.as_deref());
            (tree, computed)
        })
        .await
        .map_err(|err| BridgeError::LayoutError(err.to_string()))?;
        let geometries = computed?;
        if geometries.len() != tree.len() {
            return Err(BridgeError::LayoutError(format!(
                "engine returned {} geometries for {} nodes",
                geometries.len(),
                tree.len()
            )));
        }

        let mut session = self.shared.session.lock();
        let Session { store, views } = &mut *session;
        let store = store.as_mut().ok_or(BridgeError::NotReady)?;

        // Nodes deleted while the engine ran are skipped.
        let updates: Vec<(&str, Geometry)> = tree
            .nodes
            .iter()
            .zip(geometries)
            .filter(|(node, _)| store.contains(&node.id))
            .map(|(node, geometry)| (node.id.as_str(), geometry))
            .collect();
        if let Some((id, _)) = updates.iter().find(|(_, g)| !g.is_finite()) {
            return Err(BridgeError::LayoutError(format!(
                "engine produced non-finite geometry for '{id}'"
            )));
        }

        if let Some(views) = views.as_deref_mut() {
            let mut first_failure = None;
            for &(id, geometry) in &updates {
                if let Err(err) = handler(Operation::CalculateLayout, views.apply_layout(id, geometry)) {
                    warn!(id, error = %err, "layout not applied");
                    if first_failure.is_none() {
                        first_failure = Some(err);
                    }
                }
            }
            if let Some(err) = first_failure {
                return Err(err);
            }
        }

        for &(id, geometry) in &updates {
            store.set_geometry(id, geometry)?;
        }
        debug!(nodes = tree.len(), applied = updates.len(), "layout computed");
        Ok(updates.len())
    }

    pub(crate) fn run_measure(&self, id: &str, text: &str, attrs: &PropertySet) -> Result<Size> {
        let mut style = self.inspect(|store| {
            store
                .node(id)
                .map(|node| TextStyle::from_props(node.props(), self.shared.config.default_font_size))
                .ok_or_else(|| BridgeError::not_found(id))
        })??;
        style.overlay(attrs);
        let measurer = self.shared.registry.measurer()?;
        measurer.measure(text, &style)
    }

    /// Reconciles on a copy of the store and swaps it in only once every
    /// native call succeeded.
    pub(crate) fn run_sync(&self, root_id: &str, payload: Value) -> Result<SyncAck> {
        let mut session = self.shared.session.lock();
        let Session { store, views } = &mut *session;
        let current = store.as_ref().ok_or(BridgeError::NotReady)?;

        let payload = hierarchy::parse_payload(root_id, payload)?;
        let mut working = current.clone();
        let (report, ops) = hierarchy::reconcile(&mut working, &payload)?;

        if !ops.is_empty() {
            let views = views
                .as_deref_mut()
                .ok_or(BridgeError::Unimplemented(Operation::SyncNodeHierarchy))?;
            for op in &ops {
                op.apply(views)?;
            }
        }

        let tree = hierarchy::snapshot(&working, root_id)?;
        *store = Some(working);
        info!(
            root = root_id,
            checked = report.checked,
            mismatched = report.mismatched,
            created = report.created,
            removed = report.removed,
            "hierarchy synced"
        );
        Ok(SyncAck::new(report, tree))
    }

    pub(crate) fn run_get(&self, id: &str) -> Result<HierarchyNode> {
        self.inspect(|store| hierarchy::snapshot(store, id))?
    }

    pub(crate) fn run_listeners(&self, id: &str, names: &[String], add: bool) -> Result<()> {
        let normalized = names.iter().map(|n| normalize_event_name(n));
        let mut session = self.shared.session.lock();
        let store = session.store.as_mut().ok_or(BridgeError::NotReady)?;
        if add {
            store.add_listeners(id, normalized)
        } else {
            store.remove_listeners(id, normalized)
        }
    }

    /// Forwards a native event if the view listens for it.
    pub(crate) fn run_emit(&self, id: &str, name: &str, data: Value) -> Result<bool> {
        let event_type = normalize_event_name(name);
        let listening = self.inspect(|store| {
            store
                .node(id)
                .map(|node| node.listens_to(&event_type))
                .ok_or_else(|| BridgeError::not_found(id))
        })??;
        if !listening {
            debug!(id, event = %event_type, "no listener");
            return Ok(false);
        }
        Ok(self.shared.events.send(ViewEvent {
            view_id: id.to_string(),
            event_type,
            data,
        }))
    }
}
