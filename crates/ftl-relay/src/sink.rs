use ftl_core::{Event, TestDescription};

/// Downstream receiver of test notifications.
pub trait EventSink: Send + Sync {
    fn send_test_notification(&self, event: Event) -> anyhow::Result<()>;

    /// Registers a discovered test with the downstream side.
    fn add_test(&self, description: &TestDescription) -> anyhow::Result<()>;
}

impl<S: EventSink + ?Sized> EventSink for std::sync::Arc<S> {
    fn send_test_notification(&self, event: Event) -> anyhow::Result<()> {
        (**self).send_test_notification(event)
    }

    fn add_test(&self, description: &TestDescription) -> anyhow::Result<()> {
        (**self).add_test(description)
    }
}
