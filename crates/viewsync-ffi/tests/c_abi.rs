//! Drives the C surface the way a native host would, with the callbacks
//! written as `extern "C"` functions recording into `user_data`.
use serde_json::Value;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Mutex;
use viewsync_ffi::*;

type Calls = Mutex<Vec<String>>;

unsafe fn calls<'a>(user_data: *mut c_void) -> &'a Calls {
    &*(user_data as *const Calls)
}

unsafe fn s(ptr: *const c_char) -> String {
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

extern "C" fn on_create(ud: *mut c_void, id: *const c_char, ty: *const c_char, _p: *const c_char) -> i8 {
    unsafe { calls(ud).lock().unwrap().push(format!("create {} {}", s(id), s(ty))) };
    1
}

extern "C" fn on_update(ud: *mut c_void, id: *const c_char, patch: *const c_char) -> i8 {
    unsafe { calls(ud).lock().unwrap().push(format!("update {} {}", s(id), s(patch))) };
    1
}

extern "C" fn on_delete(ud: *mut c_void, id: *const c_char, removed: *const c_char) -> i8 {
    unsafe { calls(ud).lock().unwrap().push(format!("delete {} {}", s(id), s(removed))) };
    1
}

extern "C" fn on_attach(ud: *mut c_void, child: *const c_char, parent: *const c_char, index: i32) -> i8 {
    unsafe {
        calls(ud)
            .lock()
            .unwrap()
            .push(format!("attach {} {} {index}", s(child), s(parent)))
    };
    1
}

extern "C" fn on_set_children(ud: *mut c_void, id: *const c_char, children: *const c_char) -> i8 {
    unsafe { calls(ud).lock().unwrap().push(format!("children {} {}", s(id), s(children))) };
    1
}

extern "C" fn refuse_children(_ud: *mut c_void, _id: *const c_char, _children: *const c_char) -> i8 {
    0
}

extern "C" fn on_layout(ud: *mut c_void, id: *const c_char, _l: f32, _t: f32, w: f32, h: f32) -> i8 {
    unsafe { calls(ud).lock().unwrap().push(format!("layout {} {w}x{h}", s(id))) };
    1
}

fn callbacks(user_data: *mut c_void) -> ViewsyncViewCallbacks {
    ViewsyncViewCallbacks {
        user_data,
        create_view: Some(on_create),
        update_view: Some(on_update),
        delete_view: Some(on_delete),
        attach_view: Some(on_attach),
        set_children: Some(on_set_children),
        apply_layout: Some(on_layout),
    }
}

fn c(text: &str) -> CString {
    CString::new(text).unwrap()
}

unsafe fn take_json(raw: *mut c_char) -> Value {
    assert!(!raw.is_null());
    let value = serde_json::from_str(&s(raw)).unwrap();
    viewsync_string_free(raw);
    value
}

#[test]
fn test_session_through_c_surface() {
    let recorded: Box<Calls> = Box::default();
    let user_data = &*recorded as *const Calls as *mut c_void;

    unsafe {
        let bridge = viewsync_bridge_new(c(r#"{"log_level":"off"}"#).as_ptr());
        assert!(!bridge.is_null());

        let root = c("root");
        let label = c("label");
        assert_eq!(viewsync_initialize(bridge), 1);
        assert_eq!(
            viewsync_create_view(bridge, root.as_ptr(), c("container").as_ptr(), ptr::null()),
            -7,
            "no handlers registered yet"
        );

        let cbs = callbacks(user_data);
        assert_eq!(viewsync_register_views(bridge, &cbs), 1);
        assert_eq!(viewsync_register_views(bridge, &cbs), -10);

        assert_eq!(
            viewsync_create_view(bridge, root.as_ptr(), c("container").as_ptr(), ptr::null()),
            1
        );
        assert_eq!(
            viewsync_create_view(
                bridge,
                label.as_ptr(),
                c("text").as_ptr(),
                c(r#"{"text":"hi","height":20}"#).as_ptr()
            ),
            1
        );
        assert_eq!(
            viewsync_create_view(bridge, label.as_ptr(), c("text").as_ptr(), ptr::null()),
            -2
        );
        assert_eq!(viewsync_attach_view(bridge, label.as_ptr(), root.as_ptr(), 5), -4);
        assert_eq!(viewsync_attach_view(bridge, label.as_ptr(), root.as_ptr(), 0), 1);
        assert_eq!(
            viewsync_set_children(bridge, root.as_ptr(), c(r#"["label"]"#).as_ptr()),
            1
        );
        assert_eq!(viewsync_calculate_layout(bridge, 200.0, 400.0), 1);

        let tree = take_json(viewsync_get_node_hierarchy(bridge, root.as_ptr()));
        assert_eq!(tree["children"][0]["id"], "label");
        assert_eq!(tree["children"][0]["layout"]["width"], 200.0);

        let size = take_json(viewsync_measure_text(
            bridge,
            label.as_ptr(),
            c("hello").as_ptr(),
            c(r#"{"fontSize":10}"#).as_ptr(),
        ));
        assert!((size["width"].as_f64().unwrap() - 30.0).abs() < 1e-3);

        let missing = take_json(viewsync_get_node_hierarchy(bridge, c("ghost").as_ptr()));
        assert_eq!(missing["status"], -3);

        assert_eq!(viewsync_delete_view(bridge, root.as_ptr()), 1);
        assert_eq!(viewsync_update_view(bridge, label.as_ptr(), ptr::null()), -3);

        viewsync_bridge_free(bridge);
    }

    let log = recorded.lock().unwrap();
    assert_eq!(log[0], "create root container");
    assert!(log.contains(&"attach label root 0".to_string()));
    assert!(log.contains(&r#"children root ["label"]"#.to_string()));
    assert!(log.contains(&"layout label 200x20".to_string()));
    assert_eq!(log.last().unwrap(), r#"delete root ["root","label"]"#);
}

#[test]
fn test_partial_registration_is_rejected() {
    unsafe {
        let bridge = viewsync_bridge_new(ptr::null());
        assert!(!bridge.is_null());

        let mut cbs = callbacks(ptr::null_mut());
        cbs.apply_layout = None;
        assert_eq!(viewsync_register_views(bridge, &cbs), -7);
        assert_eq!(viewsync_register_views(bridge, ptr::null()), -8);

        // A complete set is still accepted afterwards.
        let cbs = callbacks(ptr::null_mut());
        assert_eq!(viewsync_register_views(bridge, &cbs), 1);

        viewsync_bridge_free(bridge);
    }
}

#[test]
fn test_native_refusal_reports_plain_failure() {
    let recorded: Box<Calls> = Box::default();
    let user_data = &*recorded as *const Calls as *mut c_void;

    unsafe {
        let bridge = viewsync_bridge_new(ptr::null());
        let mut cbs = callbacks(user_data);
        cbs.set_children = Some(refuse_children);
        assert_eq!(viewsync_register_views(bridge, &cbs), 1);
        assert_eq!(viewsync_initialize(bridge), 1);

        let p = c("p");
        assert_eq!(viewsync_create_view(bridge, p.as_ptr(), c("container").as_ptr(), ptr::null()), 1);
        assert_eq!(viewsync_create_view(bridge, c("a").as_ptr(), c("text").as_ptr(), ptr::null()), 1);
        assert_eq!(viewsync_set_children(bridge, p.as_ptr(), c(r#"["a"]"#).as_ptr()), 0);

        let tree = take_json(viewsync_get_node_hierarchy(bridge, p.as_ptr()));
        assert_eq!(tree["children"].as_array().unwrap().len(), 0);

        viewsync_bridge_free(bridge);
    }
}

#[test]
fn test_bad_inputs() {
    unsafe {
        assert!(viewsync_bridge_new(c(r#"{"queue_capacity":0}"#).as_ptr()).is_null());
        assert!(viewsync_bridge_new(c("not json").as_ptr()).is_null());

        let bridge = viewsync_bridge_new(ptr::null());
        assert_eq!(viewsync_create_view(bridge, ptr::null(), ptr::null(), ptr::null()), -8);
        assert_eq!(
            viewsync_create_view(bridge, c("a").as_ptr(), c("text").as_ptr(), ptr::null()),
            -1
        );
        assert_eq!(viewsync_initialize(ptr::null()), -8);

        let dims = take_json(viewsync_screen_dimensions(bridge));
        assert_eq!(dims["width"], 390.0);
        assert_eq!(viewsync_protocol_version(), 1);

        viewsync_bridge_free(bridge);
    }
}
