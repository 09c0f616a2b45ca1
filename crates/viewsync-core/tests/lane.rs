//! Queued path: layout, measurement, hierarchy exchange and events, driven
//! through the dispatcher the way a controller would.
use serde_json::{json, Value};
use viewsync_core::{
    Bridge, BridgeConfig, BridgeError, Call, Dispatcher, Geometry, HandlerResult, HandlerSet,
    LogBuffer, Operation, PropertySet, Reply, StubViews, ViewHandlers,
};

fn dispatcher() -> (Dispatcher, LogBuffer) {
    let log = LogBuffer::default();
    let handlers = HandlerSet::new(StubViews::with_buffer(log.clone())).with_defaults(14.0);
    let bridge = Bridge::new(BridgeConfig::default(), handlers);
    (Dispatcher::spawn(bridge), log)
}

async fn call(d: &Dispatcher, raw: Value) -> Reply {
    d.dispatch(serde_json::from_value::<Call>(raw).unwrap()).await
}

#[tokio::test]
async fn test_concrete_session_scenario() {
    let (d, _) = dispatcher();

    for raw in [
        json!({"method": "initialize"}),
        json!({"method": "createView", "id": "root", "viewType": "container", "props": {}}),
        json!({"method": "createView", "id": "a", "viewType": "text", "props": {"text": "hi"}}),
        json!({"method": "attachView", "childId": "a", "parentId": "root", "index": 0}),
        json!({"method": "setChildren", "id": "root", "childIds": ["a"]}),
    ] {
        let reply = call(&d, raw.clone()).await;
        assert!(reply.is_success(), "{raw} -> {reply:?}");
    }

    let tree = call(&d, json!({"method": "getNodeHierarchy", "id": "root"}))
        .await
        .result
        .unwrap();
    let kids = tree["children"].as_array().unwrap();
    assert_eq!(kids.len(), 1);
    assert_eq!(kids[0]["id"], "a");
    assert_eq!(kids[0]["type"], "text");

    assert!(call(&d, json!({"method": "deleteView", "id": "root"})).await.is_success());
    let reply = call(&d, json!({"method": "updateView", "id": "a", "props": {"text": "x"}})).await;
    assert_eq!(reply.status, -3);
}

#[tokio::test]
async fn test_queued_calls_before_initialize_are_not_ready() {
    let (d, _) = dispatcher();
    let reply = call(&d, json!({"method": "calculateLayout", "screenWidth": 100, "screenHeight": 100})).await;
    assert_eq!(reply.status, BridgeError::NotReady.status().code());

    let dims = call(&d, json!({"method": "getScreenDimensions"})).await;
    assert_eq!(dims.result, Some(json!({"width": 390.0, "height": 844.0, "scale": 3.0})));
}

#[tokio::test]
async fn test_calculate_layout_writes_geometry_and_notifies() {
    let (d, log) = dispatcher();
    let bridge = d.bridge();
    bridge.initialize().unwrap();
    bridge.create_view("root", "container", PropertySet::new()).unwrap();
    bridge
        .create_view("bar", "container", PropertySet::from_value(json!({"height": 44})).unwrap())
        .unwrap();
    bridge.attach_view("bar", "root", 0).unwrap();

    let laid_out = d.lane().calculate_layout(320.0, 480.0).await.unwrap();
    assert_eq!(laid_out, 2);

    let geometry = bridge
        .inspect(|s| s.node("bar").and_then(|n| n.geometry()))
        .unwrap();
    assert_eq!(geometry, Some(Geometry::new(0.0, 0.0, 320.0, 44.0)));
    assert!(log.lock().iter().any(|line| line == "layout bar 0 0 320 44"));
}

/// Accepts everything except layout for one view.
struct RejectLayoutFor(&'static str);

impl ViewHandlers for RejectLayoutFor {
    fn create_view(&mut self, _: &str, _: &str, _: &PropertySet) -> HandlerResult {
        Ok(())
    }

    fn update_view(&mut self, _: &str, _: &PropertySet) -> HandlerResult {
        Ok(())
    }

    fn delete_view(&mut self, _: &str, _: &[String]) -> HandlerResult {
        Ok(())
    }

    fn attach_view(&mut self, _: &str, _: &str, _: usize) -> HandlerResult {
        Ok(())
    }

    fn set_children(&mut self, _: &str, _: &[String]) -> HandlerResult {
        Ok(())
    }

    fn apply_layout(&mut self, id: &str, _: Geometry) -> HandlerResult {
        if id == self.0 {
            Err(format!("{id} refused its frame"))
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn test_rejected_layout_commits_no_geometry() {
    let bridge = Bridge::new(
        BridgeConfig::default(),
        HandlerSet::new(RejectLayoutFor("b")).with_defaults(14.0),
    );
    bridge.initialize().unwrap();
    for id in ["root", "a", "b"] {
        bridge.create_view(id, "container", PropertySet::new()).unwrap();
    }
    bridge.set_children("root", &["a", "b"]).unwrap();
    let lane = bridge.spawn_lane();

    let err = lane.calculate_layout(390.0, 844.0).await.unwrap_err();
    assert!(matches!(err, BridgeError::HandlerFailed { op: Operation::CalculateLayout, .. }));
    assert_eq!(err.status().code(), 0);

    let laid_out = bridge
        .inspect(|s| {
            ["root", "a", "b"]
                .iter()
                .map(|id| s.node(id).unwrap().geometry().is_some())
                .collect::<Vec<_>>()
        })
        .unwrap();
    assert_eq!(laid_out, [false, false, false]);
}

#[tokio::test]
async fn test_measure_text_errors() {
    let (d, _) = dispatcher();
    d.bridge().initialize().unwrap();

    let reply = call(&d, json!({"method": "measureText", "id": "ghost", "text": "hi"})).await;
    assert_eq!(reply.status, BridgeError::NotFound("ghost".into()).status().code());
    assert_eq!(reply.code, "not_found");

    let bare = Bridge::new(BridgeConfig::default(), HandlerSet::new(StubViews::new()));
    bare.initialize().unwrap();
    bare.create_view("t", "text", PropertySet::new()).unwrap();
    let reply = Dispatcher::spawn(bare)
        .dispatch_json(r#"{"method":"measureText","id":"t","text":"hi"}"#)
        .await;
    assert_eq!(reply.code, "unimplemented");
}

#[tokio::test]
async fn test_layout_without_engine_is_unimplemented() {
    let bridge = Bridge::new(BridgeConfig::default(), HandlerSet::new(StubViews::new()));
    bridge.initialize().unwrap();
    let lane = bridge.spawn_lane();

    assert_eq!(
        lane.calculate_layout(100.0, 100.0).await,
        Err(BridgeError::Unimplemented(Operation::CalculateLayout))
    );
    assert_eq!(
        lane.measure_text("missing", "hi", PropertySet::new()).await,
        Err(BridgeError::NotFound("missing".into()))
    );

    bridge.create_view("t", "text", PropertySet::new()).unwrap();
    assert_eq!(
        lane.measure_text("t", "hi", PropertySet::new()).await,
        Err(BridgeError::Unimplemented(Operation::MeasureText))
    );

    bridge.register_layout(viewsync_core::FlexLayout::default()).unwrap();
    assert_eq!(lane.calculate_layout(100.0, 100.0).await, Ok(1));
}

#[tokio::test]
async fn test_measure_text_reads_node_style_and_leaves_geometry() {
    let (d, _) = dispatcher();
    let bridge = d.bridge();
    bridge.initialize().unwrap();
    bridge
        .create_view("t", "text", PropertySet::from_value(json!({"fontSize": 10})).unwrap())
        .unwrap();

    let reply = call(
        &d,
        json!({"method": "measureText", "id": "t", "text": "hello", "attributes": {"lineHeight": 20}}),
    )
    .await;
    let size = reply.result.unwrap();
    assert!((size["width"].as_f64().unwrap() - 30.0).abs() < 1e-3);
    assert!((size["height"].as_f64().unwrap() - 20.0).abs() < 1e-3);

    let geometry = bridge.inspect(|s| s.node("t").unwrap().geometry()).unwrap();
    assert_eq!(geometry, None);
}

#[tokio::test]
async fn test_sync_is_idempotent_and_acknowledged() {
    let (d, log) = dispatcher();
    d.bridge().initialize().unwrap();

    let tree = json!({
        "id": "root", "type": "container",
        "children": [
            {"id": "title", "type": "text", "props": {"text": "Hello"}},
            {"id": "body", "type": "container", "layout": {"left": 0, "top": 10, "width": 100, "height": 50}}
        ]
    });

    let first = d.lane().sync_node_hierarchy("root", tree.clone()).await.unwrap();
    assert!(first.success);
    assert_eq!(first.nodes_checked, 3);
    assert_eq!(first.nodes_created, 3);
    let calls_after_first = log.lock().len();

    let second = d.lane().sync_node_hierarchy("root", tree).await.unwrap();
    assert_eq!(second.nodes_created, 0);
    assert_eq!(second.nodes_removed, 0);
    assert_eq!(second.nodes_mismatched, 0);
    assert_eq!(second.tree, first.tree);
    assert_eq!(log.lock().len(), calls_after_first);

    let snapshot = d.lane().get_node_hierarchy("root").await.unwrap();
    assert_eq!(snapshot, second.tree);
    assert_eq!(snapshot.children[1].layout, Some(Geometry::new(0.0, 10.0, 100.0, 50.0)));
}

#[tokio::test]
async fn test_sync_accepts_string_encoded_tree() {
    let (d, _) = dispatcher();
    d.bridge().initialize().unwrap();
    let encoded = json!({"root": "r", "nodes": [{"id": "r", "type": "container"}]}).to_string();

    let reply = call(&d, json!({"method": "syncNodeHierarchy", "rootId": "r", "tree": encoded})).await;
    assert!(reply.is_success(), "{reply:?}");
    assert_eq!(reply.result.unwrap()["nodesCreated"], 1);
}

#[tokio::test]
async fn test_malformed_sync_leaves_store_alone() {
    let (d, log) = dispatcher();
    let bridge = d.bridge();
    bridge.initialize().unwrap();
    bridge.create_view("root", "container", PropertySet::new()).unwrap();
    let calls_before = log.lock().len();

    let dup = json!({"id": "root", "type": "container", "children": [
        {"id": "x", "type": "text"}, {"id": "x", "type": "text"}
    ]});
    assert!(matches!(
        d.lane().sync_node_hierarchy("root", dup).await,
        Err(BridgeError::MalformedTree(_))
    ));
    assert_eq!(bridge.inspect(|s| s.len()).unwrap(), 1);
    assert_eq!(log.lock().len(), calls_before);
}

#[tokio::test]
async fn test_sync_handler_failure_rolls_back() {
    let bridge = Bridge::new(
        BridgeConfig::default(),
        HandlerSet::new(StubViews::new().failing_on(Operation::SetChildren)),
    );
    bridge.initialize().unwrap();
    let lane = bridge.spawn_lane();

    let tree = json!({"id": "r", "type": "container", "children": [{"id": "c", "type": "text"}]});
    let err = lane.sync_node_hierarchy("r", tree).await.unwrap_err();
    assert_eq!(err.status().code(), 0);
    assert_eq!(bridge.inspect(|s| s.len()).unwrap(), 0);
}

#[tokio::test]
async fn test_events_reach_listeners_only() {
    let (d, _) = dispatcher();
    let bridge = d.bridge();
    bridge.initialize().unwrap();
    bridge.create_view("button", "button", PropertySet::new()).unwrap();
    let mut events = bridge.subscribe_events();

    let lane = d.lane();
    assert!(!lane.emit_event("button", "press", Value::Null).await.unwrap());

    lane.add_event_listeners("button", &["press", "onLongPress"]).await.unwrap();
    assert!(lane.emit_event("button", "onpress", json!({"x": 1})).await.unwrap());

    let event = events.recv().await.unwrap();
    assert_eq!(event.view_id, "button");
    assert_eq!(event.event_type, "onPress");
    assert_eq!(event.data, json!({"x": 1}));

    lane.remove_event_listeners("button", &["press"]).await.unwrap();
    assert!(!lane.emit_event("button", "press", Value::Null).await.unwrap());
    assert!(lane.emit_event("button", "longPress", Value::Null).await.unwrap());

    assert_eq!(
        lane.add_event_listeners("ghost", &["press"]).await,
        Err(BridgeError::NotFound("ghost".into()))
    );
}
