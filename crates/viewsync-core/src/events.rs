use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

/// Event raised by a native view and forwarded to the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewEvent {
    pub view_id: String,
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

pub type EventStream = mpsc::UnboundedReceiver<ViewEvent>;

/// Brings an event name into `onXxx` form.
///
/// `press` and `onpress` both become `onPress`; an empty name becomes
/// `onEvent`.
pub fn normalize_event_name(name: &str) -> String {
    let name = name.trim();
    let mut chars = name.chars();
    if name.starts_with("on") && chars.nth(2).is_some_and(char::is_uppercase) {
        return name.to_string();
    }

    let rest = name.strip_prefix("on").unwrap_or(name);
    let mut chars = rest.chars();
    match chars.next() {
        None => "onEvent".to_string(),
        Some(first) => {
            let mut out = String::with_capacity(rest.len() + 2);
            out.push_str("on");
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
            out
        }
    }
}

/// Single-subscriber event outlet. Subscribing again replaces the previous
/// receiver.
#[derive(Default)]
pub(crate) struct EventSink {
    tx: Mutex<Option<mpsc::UnboundedSender<ViewEvent>>>,
}

impl EventSink {
    pub(crate) fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.tx.lock() = Some(tx);
        rx
    }

    /// False when nobody is listening.
    pub(crate) fn send(&self, event: ViewEvent) -> bool {
        let mut slot = self.tx.lock();
        let Some(tx) = slot.as_ref() else {
            return false;
        };
        if tx.send(event).is_err() {
            *slot = None;
            return false;
        }
        true
    }
}
