use crate::registry::Operation;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("bridge is not initialized")]
    NotReady,

    #[error("view '{0}' already exists")]
    DuplicateId(String),

    #[error("view '{0}' not found")]
    NotFound(String),

    #[error("index {index} out of range for parent '{parent}' with {len} children")]
    InvalidIndex {
        parent: String,
        index: i64,
        len: usize,
    },

    #[error("malformed tree: {0}")]
    MalformedTree(String),

    #[error("layout failed: {0}")]
    LayoutError(String),

    #[error("no handler registered for {0}")]
    Unimplemented(Operation),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("{op} handler failed: {message}")]
    HandlerFailed { op: Operation, message: String },

    #[error("{0} is already registered")]
    AlreadyRegistered(&'static str),

    #[error("async lane is closed")]
    LaneClosed,
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Status code returned across the boundary.
///
/// `1` is success and `0` a plain failure, as older controllers expect.
/// Everything else narrows down why the call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum Status {
    Success = 1,
    Failure = 0,
    NotReady = -1,
    DuplicateId = -2,
    NotFound = -3,
    InvalidIndex = -4,
    MalformedTree = -5,
    LayoutError = -6,
    Unimplemented = -7,
    InvalidPayload = -8,
    InvalidHierarchy = -9,
    AlreadyRegistered = -10,
    LaneClosed = -11,
}

impl Status {
    pub fn code(self) -> i8 {
        self as i8
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "ok",
            Status::Failure => "failure",
            Status::NotReady => "not_ready",
            Status::DuplicateId => "duplicate_id",
            Status::NotFound => "not_found",
            Status::InvalidIndex => "invalid_index",
            Status::MalformedTree => "malformed_tree",
            Status::LayoutError => "layout_error",
            Status::Unimplemented => "unimplemented",
            Status::InvalidPayload => "invalid_payload",
            Status::InvalidHierarchy => "invalid_hierarchy",
            Status::AlreadyRegistered => "already_registered",
            Status::LaneClosed => "lane_closed",
        }
    }

    pub fn from_result<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(err) => err.status(),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BridgeError {
    pub fn status(&self) -> Status {
        match self {
            BridgeError::NotReady => Status::NotReady,
            BridgeError::DuplicateId(_) => Status::DuplicateId,
            BridgeError::NotFound(_) => Status::NotFound,
            BridgeError::InvalidIndex { .. } => Status::InvalidIndex,
            BridgeError::MalformedTree(_) => Status::MalformedTree,
            BridgeError::LayoutError(_) => Status::LayoutError,
            BridgeError::Unimplemented(_) => Status::Unimplemented,
            BridgeError::InvalidPayload(_) => Status::InvalidPayload,
            BridgeError::InvalidHierarchy(_) => Status::InvalidHierarchy,
            BridgeError::HandlerFailed { .. } => Status::Failure,
            BridgeError::AlreadyRegistered(_) => Status::AlreadyRegistered,
            BridgeError::LaneClosed => Status::LaneClosed,
        }
    }

    pub(crate) fn not_found(id: impl Into<String>) -> Self {
        BridgeError::NotFound(id.into())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::InvalidPayload(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_and_plain_failure_keep_legacy_codes() {
        assert_eq!(Status::Success.code(), 1);
        assert_eq!(Status::Failure.code(), 0);
        let err = BridgeError::HandlerFailed {
            op: Operation::CreateView,
            message: "boom".into(),
        };
        assert_eq!(err.status().code(), 0);
    }

    #[test]
    fn test_every_specific_kind_is_negative() {
        let errors = [
            BridgeError::NotReady,
            BridgeError::DuplicateId("a".into()),
            BridgeError::NotFound("a".into()),
            BridgeError::InvalidIndex {
                parent: "p".into(),
                index: 3,
                len: 1,
            },
            BridgeError::MalformedTree("x".into()),
            BridgeError::LayoutError("x".into()),
            BridgeError::Unimplemented(Operation::CalculateLayout),
            BridgeError::InvalidPayload("x".into()),
            BridgeError::InvalidHierarchy("x".into()),
            BridgeError::AlreadyRegistered("layout engine"),
            BridgeError::LaneClosed,
        ];
        for err in errors {
            assert!(err.status().code() < 0, "{err} should map to a negative code");
        }
    }

    #[test]
    fn test_from_result_maps_ok_to_success() {
        let ok: Result<()> = Ok(());
        assert_eq!(Status::from_result(&ok), Status::Success);
        let err: Result<()> = Err(BridgeError::NotReady);
        assert_eq!(Status::from_result(&err), Status::NotReady);
    }
}
