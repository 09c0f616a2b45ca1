//! C ABI over a [`Bridge`].
//!
//! Mutations return an `int8_t` status (`1` success, `0` handler failure,
//! negative for a specific error). Queries return an owned JSON string that
//! must be released with [`viewsync_string_free`]; failures are encoded as
//! `{"error": "...", "status": n}`.
//!
//! Queued calls block the calling thread until the lane answers, so they
//! must not be made from a thread owned by the bridge's runtime.

use serde::Serialize;
use serde_json::json;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use tokio::runtime::{Builder, Runtime};
use tracing::{error, info};
use viewsync_core::{
    logging, Bridge, BridgeConfig, BridgeError, Geometry, HandlerResult, HandlerSet, LaneHandle,
    Operation, PropertySet, Result, Status, ViewHandlers, PROTOCOL_VERSION,
};

/// Opaque handle given to the host.
pub struct ViewsyncBridge {
    runtime: Runtime,
    bridge: Bridge,
    lane: LaneHandle,
}

pub type ViewsyncCreateViewFn = extern "C" fn(
    user_data: *mut c_void,
    id: *const c_char,
    view_type: *const c_char,
    props_json: *const c_char,
) -> i8;
pub type ViewsyncUpdateViewFn =
    extern "C" fn(user_data: *mut c_void, id: *const c_char, patch_json: *const c_char) -> i8;
pub type ViewsyncDeleteViewFn =
    extern "C" fn(user_data: *mut c_void, id: *const c_char, removed_json: *const c_char) -> i8;
pub type ViewsyncAttachViewFn = extern "C" fn(
    user_data: *mut c_void,
    child: *const c_char,
    parent: *const c_char,
    index: i32,
) -> i8;
pub type ViewsyncSetChildrenFn =
    extern "C" fn(user_data: *mut c_void, id: *const c_char, children_json: *const c_char) -> i8;
pub type ViewsyncApplyLayoutFn = extern "C" fn(
    user_data: *mut c_void,
    id: *const c_char,
    left: f32,
    top: f32,
    width: f32,
    height: f32,
) -> i8;

/// Native view handlers. Every function must be set; `user_data` is passed
/// back untouched and must be usable from any thread.
///
/// Callbacks run while the bridge holds its session lock, sometimes on a
/// lane thread. They must not call back into any `viewsync_*` function:
/// a mutation would deadlock on the lock and a queued call from a lane
/// thread would panic inside the runtime. Record the work and issue the
/// call after the callback returns.
#[repr(C)]
pub struct ViewsyncViewCallbacks {
    pub user_data: *mut c_void,
    pub create_view: Option<ViewsyncCreateViewFn>,
    pub update_view: Option<ViewsyncUpdateViewFn>,
    pub delete_view: Option<ViewsyncDeleteViewFn>,
    pub attach_view: Option<ViewsyncAttachViewFn>,
    pub set_children: Option<ViewsyncSetChildrenFn>,
    pub apply_layout: Option<ViewsyncApplyLayoutFn>,
}

struct CViews {
    user_data: *mut c_void,
    create_view: ViewsyncCreateViewFn,
    update_view: ViewsyncUpdateViewFn,
    delete_view: ViewsyncDeleteViewFn,
    attach_view: ViewsyncAttachViewFn,
    set_children: ViewsyncSetChildrenFn,
    apply_layout: ViewsyncApplyLayoutFn,
}

// SAFETY: the registration contract requires the callbacks and `user_data`
// to be callable from any thread. Calls are serialized by the session lock.
unsafe impl Send for CViews {}

impl CViews {
    fn from_callbacks(callbacks: &ViewsyncViewCallbacks) -> Result<Self> {
        let missing = |op| BridgeError::Unimplemented(op);
        Ok(Self {
            user_data: callbacks.user_data,
            create_view: callbacks.create_view.ok_or(missing(Operation::CreateView))?,
            update_view: callbacks.update_view.ok_or(missing(Operation::UpdateView))?,
            delete_view: callbacks.delete_view.ok_or(missing(Operation::DeleteView))?,
            attach_view: callbacks.attach_view.ok_or(missing(Operation::AttachView))?,
            set_children: callbacks.set_children.ok_or(missing(Operation::SetChildren))?,
            apply_layout: callbacks
                .apply_layout
                .ok_or(missing(Operation::UpdateViewLayout))?,
        })
    }
}

fn c_text(text: &str) -> std::result::Result<CString, String> {
    CString::new(text).map_err(|_| format!("'{}' contains a NUL byte", text.escape_debug()))
}

fn native_status(code: i8) -> HandlerResult {
    if code == Status::Success.code() {
        Ok(())
    } else {
        Err(format!("native handler returned {code}"))
    }
}

impl ViewHandlers for CViews {
    fn create_view(&mut self, id: &str, view_type: &str, props: &PropertySet) -> HandlerResult {
        let id = c_text(id)?;
        let view_type = c_text(view_type)?;
        let props = c_text(&props.to_value().to_string())?;
        native_status((self.create_view)(
            self.user_data,
            id.as_ptr(),
            view_type.as_ptr(),
            props.as_ptr(),
        ))
    }

    fn update_view(&mut self, id: &str, patch: &PropertySet) -> HandlerResult {
        let id = c_text(id)?;
        let patch = c_text(&patch.to_value().to_string())?;
        native_status((self.update_view)(self.user_data, id.as_ptr(), patch.as_ptr()))
    }

    fn delete_view(&mut self, id: &str, removed: &[String]) -> HandlerResult {
        let id = c_text(id)?;
        let removed = c_text(&json!(removed).to_string())?;
        native_status((self.delete_view)(self.user_data, id.as_ptr(), removed.as_ptr()))
    }

    fn attach_view(&mut self, child: &str, parent: &str, index: usize) -> HandlerResult {
        let child = c_text(child)?;
        let parent = c_text(parent)?;
        let index = i32::try_from(index).map_err(|_| format!("index {index} exceeds i32"))?;
        native_status((self.attach_view)(
            self.user_data,
            child.as_ptr(),
            parent.as_ptr(),
            index,
        ))
    }

    fn set_children(&mut self, id: &str, children: &[String]) -> HandlerResult {
        let id = c_text(id)?;
        let children = c_text(&json!(children).to_string())?;
        native_status((self.set_children)(self.user_data, id.as_ptr(), children.as_ptr()))
    }

    fn apply_layout(&mut self, id: &str, geometry: Geometry) -> HandlerResult {
        let id = c_text(id)?;
        native_status((self.apply_layout)(
            self.user_data,
            id.as_ptr(),
            geometry.left,
            geometry.top,
            geometry.width,
            geometry.height,
        ))
    }
}

unsafe fn handle<'a>(ptr: *const ViewsyncBridge) -> Result<&'a ViewsyncBridge> {
    ptr.as_ref()
        .ok_or_else(|| BridgeError::InvalidPayload("null bridge handle".into()))
}

unsafe fn text<'a>(ptr: *const c_char, name: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(BridgeError::InvalidPayload(format!("{name} is null")));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| BridgeError::InvalidPayload(format!("{name} is not valid UTF-8")))
}

/// Null means "not given".
unsafe fn optional_text<'a>(ptr: *const c_char, name: &str) -> Result<Option<&'a str>> {
    if ptr.is_null() {
        Ok(None)
    } else {
        text(ptr, name).map(Some)
    }
}

unsafe fn props(ptr: *const c_char, name: &str) -> Result<PropertySet> {
    match optional_text(ptr, name)? {
        Some(raw) => PropertySet::from_json(raw),
        None => Ok(PropertySet::new()),
    }
}

unsafe fn string_list(ptr: *const c_char, name: &str) -> Result<Vec<String>> {
    Ok(serde_json::from_str(text(ptr, name)?)?)
}

fn status<T>(result: Result<T>) -> i8 {
    Status::from_result(&result).code()
}

fn json_out<T: Serialize>(result: Result<T>) -> *mut c_char {
    let value = match result.and_then(|v| Ok(serde_json::to_value(v)?)) {
        Ok(value) => value,
        Err(err) => json!({"error": err.to_string(), "status": err.status().code()}),
    };
    CString::new(value.to_string())
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut())
}

/// Creates a bridge from a JSON config (null or empty for defaults).
/// Returns null when the config is invalid or the runtime cannot start.
///
/// # Safety
/// `config_json` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn viewsync_bridge_new(config_json: *const c_char) -> *mut ViewsyncBridge {
    let config = match optional_text(config_json, "config")
        .and_then(|raw| BridgeConfig::from_json(raw.unwrap_or("")))
    {
        Ok(config) => config,
        Err(err) => {
            eprintln!("viewsync: rejected config: {err}");
            return ptr::null_mut();
        }
    };
    logging::init(&config.log_level);

    let runtime = match Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("viewsync-lane")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to start lane runtime");
            return ptr::null_mut();
        }
    };

    let handlers = HandlerSet::empty().with_defaults(config.default_font_size);
    let bridge = Bridge::new(config, handlers);
    let lane = {
        let _guard = runtime.enter();
        bridge.spawn_lane()
    };
    info!(protocol = PROTOCOL_VERSION, "bridge created");

    Box::into_raw(Box::new(ViewsyncBridge {
        runtime,
        bridge,
        lane,
    }))
}

/// # Safety
/// `bridge` must come from `viewsync_bridge_new` and not be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn viewsync_bridge_free(bridge: *mut ViewsyncBridge) {
    if bridge.is_null() {
        return;
    }
    drop(Box::from_raw(bridge));
}

/// # Safety
/// `s` must come from one of this library's string-returning functions.
#[no_mangle]
pub unsafe extern "C" fn viewsync_string_free(s: *mut c_char) {
    if s.is_null() {
        return;
    }
    drop(CString::from_raw(s));
}

#[no_mangle]
pub extern "C" fn viewsync_protocol_version() -> u32 {
    PROTOCOL_VERSION
}

/// Installs the native view handlers. All six functions are required.
///
/// # Safety
/// `bridge` must be a live handle; `callbacks` must be null or point to a
/// valid struct.
#[no_mangle]
pub unsafe extern "C" fn viewsync_register_views(
    bridge: *const ViewsyncBridge,
    callbacks: *const ViewsyncViewCallbacks,
) -> i8 {
    status((|| {
        let handle = handle(bridge)?;
        let callbacks = callbacks
            .as_ref()
            .ok_or_else(|| BridgeError::InvalidPayload("null callbacks".into()))?;
        let views = CViews::from_callbacks(callbacks)?;
        handle.bridge.register_views(Box::new(views))
    })())
}

/// # Safety
/// `bridge` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn viewsync_initialize(bridge: *const ViewsyncBridge) -> i8 {
    status(handle(bridge).and_then(|h| h.bridge.initialize()))
}

/// # Safety
/// `bridge` must be a live handle and every string valid or (for
/// `props_json`) null.
#[no_mangle]
pub unsafe extern "C" fn viewsync_create_view(
    bridge: *const ViewsyncBridge,
    id: *const c_char,
    view_type: *const c_char,
    props_json: *const c_char,
) -> i8 {
    status((|| {
        let h = handle(bridge)?;
        h.bridge.create_view(
            text(id, "id")?,
            text(view_type, "view type")?,
            props(props_json, "props")?,
        )
    })())
}

/// # Safety
/// `bridge` must be a live handle and every string valid or (for
/// `props_json`) null.
#[no_mangle]
pub unsafe extern "C" fn viewsync_update_view(
    bridge: *const ViewsyncBridge,
    id: *const c_char,
    props_json: *const c_char,
) -> i8 {
    status((|| {
        let h = handle(bridge)?;
        h.bridge.update_view(text(id, "id")?, props(props_json, "props")?)
    })())
}

/// # Safety
/// `bridge` must be a live handle and `id` a valid string.
#[no_mangle]
pub unsafe extern "C" fn viewsync_delete_view(
    bridge: *const ViewsyncBridge,
    id: *const c_char,
) -> i8 {
    status((|| handle(bridge)?.bridge.delete_view(text(id, "id")?))())
}

/// # Safety
/// `bridge` must be a live handle and both ids valid strings.
#[no_mangle]
pub unsafe extern "C" fn viewsync_attach_view(
    bridge: *const ViewsyncBridge,
    child_id: *const c_char,
    parent_id: *const c_char,
    index: i32,
) -> i8 {
    status((|| {
        let h = handle(bridge)?;
        h.bridge.attach_view(
            text(child_id, "child id")?,
            text(parent_id, "parent id")?,
            i64::from(index),
        )
    })())
}

/// `children_json` is a JSON array of ids.
///
/// # Safety
/// `bridge` must be a live handle and both strings valid.
#[no_mangle]
pub unsafe extern "C" fn viewsync_set_children(
    bridge: *const ViewsyncBridge,
    id: *const c_char,
    children_json: *const c_char,
) -> i8 {
    status((|| {
        let h = handle(bridge)?;
        let children = string_list(children_json, "children")?;
        h.bridge.set_children(text(id, "id")?, &children)
    })())
}

/// # Safety
/// `bridge` must be a live handle and `id` a valid string.
#[no_mangle]
pub unsafe extern "C" fn viewsync_update_view_layout(
    bridge: *const ViewsyncBridge,
    id: *const c_char,
    left: f32,
    top: f32,
    width: f32,
    height: f32,
) -> i8 {
    status((|| {
        let h = handle(bridge)?;
        h.bridge
            .update_view_layout(text(id, "id")?, Geometry::new(left, top, width, height))
    })())
}

/// # Safety
/// `bridge` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn viewsync_calculate_layout(
    bridge: *const ViewsyncBridge,
    screen_width: f32,
    screen_height: f32,
) -> i8 {
    status(handle(bridge).and_then(|h| {
        h.runtime
            .block_on(h.lane.calculate_layout(screen_width, screen_height))
    }))
}

/// # Safety
/// `bridge` must be a live handle and both strings valid.
#[no_mangle]
pub unsafe extern "C" fn viewsync_add_event_listeners(
    bridge: *const ViewsyncBridge,
    id: *const c_char,
    event_types_json: *const c_char,
) -> i8 {
    status((|| {
        let h = handle(bridge)?;
        let names = string_list(event_types_json, "event types")?;
        let id = text(id, "id")?;
        h.runtime.block_on(h.lane.add_event_listeners(id, &names))
    })())
}

/// # Safety
/// `bridge` must be a live handle and both strings valid.
#[no_mangle]
pub unsafe extern "C" fn viewsync_remove_event_listeners(
    bridge: *const ViewsyncBridge,
    id: *const c_char,
    event_types_json: *const c_char,
) -> i8 {
    status((|| {
        let h = handle(bridge)?;
        let names = string_list(event_types_json, "event types")?;
        let id = text(id, "id")?;
        h.runtime.block_on(h.lane.remove_event_listeners(id, &names))
    })())
}

/// Returns `{"width", "height"}`.
///
/// # Safety
/// `bridge` must be a live handle, `id` and `text_ptr` valid strings and
/// `attributes_json` valid or null.
#[no_mangle]
pub unsafe extern "C" fn viewsync_measure_text(
    bridge: *const ViewsyncBridge,
    id: *const c_char,
    text_ptr: *const c_char,
    attributes_json: *const c_char,
) -> *mut c_char {
    json_out((|| {
        let h = handle(bridge)?;
        let attributes = props(attributes_json, "attributes")?;
        let id = text(id, "id")?;
        let content = text(text_ptr, "text")?;
        h.runtime.block_on(h.lane.measure_text(id, content, attributes))
    })())
}

/// Returns the sync acknowledgment.
///
/// # Safety
/// `bridge` must be a live handle and both strings valid.
#[no_mangle]
pub unsafe extern "C" fn viewsync_sync_node_hierarchy(
    bridge: *const ViewsyncBridge,
    root_id: *const c_char,
    tree_json: *const c_char,
) -> *mut c_char {
    json_out((|| {
        let h = handle(bridge)?;
        let root_id = text(root_id, "root id")?;
        let tree = serde_json::from_str(text(tree_json, "tree")?)
            .map_err(|e| BridgeError::MalformedTree(e.to_string()))?;
        h.runtime.block_on(h.lane.sync_node_hierarchy(root_id, tree))
    })())
}

/// # Safety
/// `bridge` must be a live handle and `id` a valid string.
#[no_mangle]
pub unsafe extern "C" fn viewsync_get_node_hierarchy(
    bridge: *const ViewsyncBridge,
    id: *const c_char,
) -> *mut c_char {
    json_out((|| {
        let h = handle(bridge)?;
        let id = text(id, "id")?;
        h.runtime.block_on(h.lane.get_node_hierarchy(id))
    })())
}

/// Returns `{"width", "height", "scale"}`. Works before initialization.
///
/// # Safety
/// `bridge` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn viewsync_screen_dimensions(bridge: *const ViewsyncBridge) -> *mut c_char {
    json_out(handle(bridge).map(|h| h.bridge.screen_dimensions()))
}
