use crate::error::{BridgeError, Result, Status};
use crate::registry::Operation;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;

/// One boundary call, tagged by its method name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Call {
    Initialize,
    #[serde(rename_all = "camelCase")]
    CreateView {
        id: String,
        view_type: String,
        #[serde(default)]
        props: Value,
    },
    UpdateView {
        id: String,
        #[serde(default)]
        props: Value,
    },
    DeleteView {
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    AttachView {
        child_id: String,
        parent_id: String,
        index: i64,
    },
    #[serde(rename_all = "camelCase")]
    SetChildren {
        id: String,
        child_ids: Vec<String>,
    },
    UpdateViewLayout {
        id: String,
        left: f32,
        top: f32,
        width: f32,
        height: f32,
    },
    #[serde(rename_all = "camelCase")]
    CalculateLayout {
        screen_width: f32,
        screen_height: f32,
    },
    MeasureText {
        id: String,
        text: String,
        #[serde(default)]
        attributes: Value,
    },
    /// `tree` may be the payload itself or a JSON string holding it.
    #[serde(rename_all = "camelCase")]
    SyncNodeHierarchy {
        root_id: String,
        tree: Value,
    },
    GetNodeHierarchy {
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    AddEventListeners {
        id: String,
        event_types: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    RemoveEventListeners {
        id: String,
        event_types: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    EmitEvent {
        id: String,
        event_type: String,
        #[serde(default)]
        data: Value,
    },
    GetScreenDimensions,
}

impl Call {
    pub fn operation(&self) -> Operation {
        match self {
            Call::Initialize => Operation::Initialize,
            Call::CreateView { .. } => Operation::CreateView,
            Call::UpdateView { .. } => Operation::UpdateView,
            Call::DeleteView { .. } => Operation::DeleteView,
            Call::AttachView { .. } => Operation::AttachView,
            Call::SetChildren { .. } => Operation::SetChildren,
            Call::UpdateViewLayout { .. } => Operation::UpdateViewLayout,
            Call::CalculateLayout { .. } => Operation::CalculateLayout,
            Call::MeasureText { .. } => Operation::MeasureText,
            Call::SyncNodeHierarchy { .. } => Operation::SyncNodeHierarchy,
            Call::GetNodeHierarchy { .. } => Operation::GetNodeHierarchy,
            Call::AddEventListeners { .. } => Operation::AddEventListeners,
            Call::RemoveEventListeners { .. } => Operation::RemoveEventListeners,
            Call::EmitEvent { .. } => Operation::EmitEvent,
            Call::GetScreenDimensions => Operation::GetScreenDimensions,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Normalized outcome of a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub status: i8,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    pub fn ok(result: Option<Value>) -> Self {
        Self {
            status: Status::Success.code(),
            code: Status::Success.as_str().to_string(),
            result,
            error: None,
        }
    }

    pub fn from_error(err: &BridgeError) -> Self {
        let status = err.status();
        Self {
            status: status.code(),
            code: status.as_str().to_string(),
            result: None,
            error: Some(err.to_string()),
        }
    }

    /// Unit and `null` results are left out of the reply.
    pub fn from_result<T: Serialize>(result: Result<T>) -> Self {
        match result.and_then(|value| Ok(serde_json::to_value(value)?)) {
            Ok(Value::Null) => Self::ok(None),
            Ok(value) => Self::ok(Some(value)),
            Err(err) => Self::from_error(&err),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success.code()
    }
}
