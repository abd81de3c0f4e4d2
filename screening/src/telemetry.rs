use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_event_bus::{EventPublisher, EventRecord};
use shared_logging::{JsonLogger, LogLevel, LogRecord};
use tokio::runtime::{Handle, Runtime};

/// Builder configuring telemetry sinks for the screening service.
pub struct ScreeningTelemetryBuilder {
    component: String,
    log_path: Option<PathBuf>,
    event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl ScreeningTelemetryBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            log_path: None,
            event_publisher: None,
        }
    }

    /// Sets the JSON log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Assigns the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Finalizes the builder.
    pub fn build(self) -> Result<ScreeningTelemetry> {
        ScreeningTelemetry::new(self.component, self.log_path, self.event_publisher)
    }
}

/// Telemetry handle shared across the service's operations.
///
/// Both sinks are optional; with neither configured every call is a
/// no-op.
#[derive(Clone)]
pub struct ScreeningTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for ScreeningTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreeningTelemetry")
            .field("component", &self.inner.component)
            .finish()
    }
}

struct TelemetryInner {
    component: String,
    logger: Option<JsonLogger>,
    event: Option<EventHandle>,
}

struct EventHandle {
    runtime: Runtime,
    publisher: Arc<dyn EventPublisher>,
}

impl EventHandle {
    fn new(publisher: Arc<dyn EventPublisher>) -> Result<Self> {
        Ok(Self {
            runtime: Runtime::new()?,
            publisher,
        })
    }

    fn publish(&self, record: EventRecord) -> Result<()> {
        if let Ok(handle) = Handle::try_current() {
            let publisher = Arc::clone(&self.publisher);
            handle.spawn(async move {
                if let Err(err) = publisher.publish(record).await {
                    eprintln!("telemetry event publish failed: {err:?}");
                }
            });
            Ok(())
        } else {
            self.runtime.block_on(self.publisher.publish(record))
        }
    }
}

impl ScreeningTelemetry {
    fn new(
        component: impl Into<String>,
        log_path: Option<PathBuf>,
        event_publisher: Option<Arc<dyn EventPublisher>>,
    ) -> Result<Self> {
        let logger = match log_path {
            Some(path) => Some(JsonLogger::new(path)?),
            None => None,
        };
        let event = match event_publisher {
            Some(publisher) => Some(EventHandle::new(publisher)?),
            None => None,
        };
        Ok(Self {
            inner: Arc::new(TelemetryInner {
                component: component.into(),
                logger,
                event,
            }),
        })
    }

    /// Returns a builder for this telemetry helper.
    #[must_use]
    pub fn builder(component: impl Into<String>) -> ScreeningTelemetryBuilder {
        ScreeningTelemetryBuilder::new(component)
    }

    /// Logs a structured record.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if let Some(logger) = &self.inner.logger {
            let record = LogRecord::new(&self.inner.component, level, message)
                .with_metadata(metadata);
            logger.log(&record)?;
        }
        Ok(())
    }

    /// Emits an operational event.
    pub fn event(&self, event_type: &str, payload: Value) -> Result<()> {
        if let Some(event) = &self.inner.event {
            event.publish(EventRecord::new(&self.inner.component, event_type, payload))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_event_bus::MemoryEventBus;
    use tempfile::tempdir;

    #[test]
    fn logs_and_publishes_through_configured_sinks() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("telemetry.log");
        let bus = Arc::new(MemoryEventBus::new(8));
        let telemetry = ScreeningTelemetry::builder("screening.service")
            .log_path(&log_path)
            .event_publisher(bus.clone())
            .build()
            .unwrap();

        telemetry
            .log(LogLevel::Info, "sample accepted", json!({ "samples": 11 }))
            .unwrap();
        telemetry
            .event("screening.model.retrained", json!({ "samples": 11 }))
            .unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("sample accepted"));
        let events = bus.snapshot();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "screening.model.retrained");
    }

    #[test]
    fn without_sinks_everything_is_a_noop() {
        let telemetry = ScreeningTelemetry::builder("screening.service")
            .build()
            .unwrap();
        telemetry.log(LogLevel::Debug, "ignored", json!({})).unwrap();
        telemetry.event("ignored", json!({})).unwrap();
    }
}
