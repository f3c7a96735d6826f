//! Fans each event out to every resolved connector, in configured order.
//!
//! A connector that errors or panics is logged and skipped; the remaining
//! connectors still receive the event and the caller never sees the failure.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use footprint_protocol::EventEnvelope;

use super::builtin::{BuiltInConnector, ConnectorSinks};
use super::{Connector, ConnectorSpec};
use crate::error::FootprintError;

/// What happened to a single dispatch. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

pub struct Dispatcher {
    connectors: Vec<Arc<dyn Connector>>,
}

impl Dispatcher {
    /// Resolves specs into connectors once. Unknown built-in names are skipped.
    pub fn resolve(specs: &[ConnectorSpec], sinks: &ConnectorSinks) -> Self {
        let connectors = specs
            .iter()
            .filter_map(|spec| match spec {
                ConnectorSpec::BuiltIn(name) => match BuiltInConnector::from_name(name) {
                    Some(builtin) => Some(builtin.create(sinks)),
                    None => {
                        tracing::warn!(connector = %name, "Unknown built-in connector; skipping");
                        None
                    }
                },
                ConnectorSpec::Custom(connector) => Some(Arc::clone(connector)),
            })
            .collect();

        Self { connectors }
    }

    pub fn with_connectors(connectors: Vec<Arc<dyn Connector>>) -> Self {
        Self { connectors }
    }

    pub fn connector_ids(&self) -> Vec<&str> {
        self.connectors.iter().map(|c| c.id()).collect()
    }

    pub fn dispatch(&self, event: &EventEnvelope) -> DispatchReport {
        let mut report = DispatchReport::default();

        for connector in &self.connectors {
            let outcome = catch_unwind(AssertUnwindSafe(|| connector.send(event)));
            let id = connector.id().to_string();
            let details = match outcome {
                Ok(Ok(())) => {
                    report.delivered.push(id);
                    continue;
                }
                Ok(Err(e)) => e,
                Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
            };

            let err = FootprintError::ConnectorFailed {
                connector: id.clone(),
                details,
            };
            tracing::warn!(event = %event.event, error = %err, "Event not delivered");
            report.failed.push(id);
        }

        tracing::debug!(
            event = %event.event,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "Event dispatched"
        );
        report
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
