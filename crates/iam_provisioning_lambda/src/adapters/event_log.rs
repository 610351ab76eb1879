use serde_json::Value;

/// Structured log sink handed to handlers explicitly.
pub trait EventLog {
    fn info(&self, event: &str, details: Value);
    fn error(&self, event: &str, details: Value);
}

/// Emits one `tracing` event per log call, tagged with the owning component.
#[derive(Debug, Clone, Copy)]
pub struct TracingEventLog {
    component: &'static str,
}

impl TracingEventLog {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }
}

impl EventLog for TracingEventLog {
    fn info(&self, event: &str, details: Value) {
        tracing::info!(component = self.component, event, details = %details);
    }

    fn error(&self, event: &str, details: Value) {
        tracing::error!(component = self.component, event, details = %details);
    }
}
