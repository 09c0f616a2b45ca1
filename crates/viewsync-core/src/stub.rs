use crate::node::Geometry;
use crate::props::PropertySet;
use crate::registry::{HandlerResult, Operation, ViewHandlers};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

pub type LogBuffer = Arc<Mutex<Vec<String>>>;

/// Recording renderer for tests and the replay tool.
///
/// Accepts every call and logs it as a one-line description. Can be told
/// to fail a given operation to exercise the handler-failure path.
#[derive(Default)]
pub struct StubViews {
    log_buffer: Option<LogBuffer>,
    fail_on: Option<Operation>,
}

impl StubViews {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a StubViews that also appends every call to `buffer`
    pub fn with_buffer(buffer: LogBuffer) -> Self {
        Self {
            log_buffer: Some(buffer),
            fail_on: None,
        }
    }

    pub fn failing_on(mut self, op: Operation) -> Self {
        self.fail_on = Some(op);
        self
    }

    fn record(&self, op: Operation, msg: String) -> HandlerResult {
        if self.fail_on == Some(op) {
            debug!(%op, "stub handler refusing call");
            return Err(format!("stub refused {op}"));
        }
        debug!(%op, "{msg}");
        if let Some(buffer) = &self.log_buffer {
            buffer.lock().push(msg);
        }
        Ok(())
    }
}

impl ViewHandlers for StubViews {
    fn create_view(&mut self, id: &str, view_type: &str, props: &PropertySet) -> HandlerResult {
        self.record(
            Operation::CreateView,
            format!("create {id} {view_type} {}", props.to_value()),
        )
    }

    fn update_view(&mut self, id: &str, patch: &PropertySet) -> HandlerResult {
        self.record(
            Operation::UpdateView,
            format!("update {id} {}", patch.to_value()),
        )
    }

    fn delete_view(&mut self, id: &str, removed: &[String]) -> HandlerResult {
        self.record(
            Operation::DeleteView,
            format!("delete {id} [{}]", removed.join(",")),
        )
    }

    fn attach_view(&mut self, child: &str, parent: &str, index: usize) -> HandlerResult {
        self.record(
            Operation::AttachView,
            format!("attach {child} -> {parent} @{index}"),
        )
    }

    fn set_children(&mut self, id: &str, children: &[String]) -> HandlerResult {
        self.record(
            Operation::SetChildren,
            format!("children {id} [{}]", children.join(",")),
        )
    }

    fn apply_layout(&mut self, id: &str, geometry: Geometry) -> HandlerResult {
        self.record(
            Operation::UpdateViewLayout,
            format!(
                "layout {id} {} {} {} {}",
                geometry.left, geometry.top, geometry.width, geometry.height
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_calls_in_order() {
        let buffer = LogBuffer::default();
        let mut stub = StubViews::with_buffer(buffer.clone());
        stub.create_view("a", "text", &PropertySet::new()).unwrap();
        stub.attach_view("a", "root", 0).unwrap();

        let log = buffer.lock();
        assert_eq!(log.as_slice(), ["create a text {}", "attach a -> root @0"]);
    }

    #[test]
    fn test_failing_on_refuses_only_that_operation() {
        let buffer = LogBuffer::default();
        let mut stub = StubViews::with_buffer(buffer.clone()).failing_on(Operation::DeleteView);
        assert!(stub.delete_view("a", &["a".to_string()]).is_err());
        assert!(stub.update_view("a", &PropertySet::new()).is_ok());
        assert_eq!(buffer.lock().len(), 1);
    }
}
