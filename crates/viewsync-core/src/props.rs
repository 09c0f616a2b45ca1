use crate::error::{BridgeError, Result};
use serde_json::{Map, Value};

/// Keys consumed by the layout subsystem rather than by the native view.
pub const LAYOUT_PROPS: &[&str] = &[
    "width",
    "height",
    "minWidth",
    "maxWidth",
    "minHeight",
    "maxHeight",
    "margin",
    "marginTop",
    "marginRight",
    "marginBottom",
    "marginLeft",
    "marginHorizontal",
    "marginVertical",
    "padding",
    "paddingTop",
    "paddingRight",
    "paddingBottom",
    "paddingLeft",
    "paddingHorizontal",
    "paddingVertical",
    "left",
    "top",
    "right",
    "bottom",
    "position",
    "flexDirection",
    "justifyContent",
    "alignItems",
    "alignSelf",
    "alignContent",
    "flexWrap",
    "flex",
    "flexGrow",
    "flexShrink",
    "flexBasis",
    "display",
    "overflow",
    "direction",
    "borderWidth",
    "gap",
];

pub fn is_layout_prop(key: &str) -> bool {
    LAYOUT_PROPS.contains(&key)
}

/// Partial, mergeable map of a view's attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertySet(Map<String, Value>);

impl PropertySet {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Accepts only JSON objects; `null` is treated as an empty set.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(BridgeError::InvalidPayload(format!(
                "props must be an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }
        Self::from_value(serde_json::from_str(raw)?)
    }

    /// Key-wise overwrite. A `null` value unsets the key.
    pub fn merge(&mut self, patch: &PropertySet) {
        for (key, value) in &patch.0 {
            if value.is_null() {
                self.0.remove(key);
            } else {
                self.0.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.0.get(key).and_then(Value::as_f64).map(|n| n as f32)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Splits into (layout, visual) halves.
    pub fn split_layout(&self) -> (PropertySet, PropertySet) {
        let mut layout = Map::new();
        let mut visual = Map::new();
        for (key, value) in &self.0 {
            if is_layout_prop(key) {
                layout.insert(key.clone(), value.clone());
            } else {
                visual.insert(key.clone(), value.clone());
            }
        }
        (Self(layout), Self(visual))
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl From<Map<String, Value>> for PropertySet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
