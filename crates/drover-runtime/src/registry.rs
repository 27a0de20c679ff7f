use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use drover_core::{DroverError, Step, ToolHandler, ToolResult, ToolSpec};

use crate::schema;

struct RegisteredTool {
    spec: ToolSpec,
    handler: Arc<dyn ToolHandler>,
}

/// The capability registry: tool name → {spec, handler}.
///
/// Registration validates the declared schema and rejects duplicates, so a
/// registered tool is always invokable. Invocation is a single bounded
/// attempt — argument validation, handler dispatch under a timeout, and the
/// outcome wrapped as a `ToolResult`. Retry loops live with the caller,
/// which records every attempt.
///
/// Safe for concurrent use across tasks; invocations of different tools are
/// fully independent.
#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Fails on an empty name, a malformed schema, or a
    /// name collision.
    pub fn register(
        &self,
        spec: ToolSpec,
        handler: Arc<dyn ToolHandler>,
    ) -> drover_core::Result<()> {
        if spec.name.trim().is_empty() {
            return Err(DroverError::ToolRegistration {
                tool: spec.name.clone(),
                reason: "tool name must not be empty".into(),
            });
        }
        if let Err(reason) = schema::check_schema(&spec.parameters) {
            return Err(DroverError::ToolRegistration {
                tool: spec.name.clone(),
                reason,
            });
        }

        match self.tools.entry(spec.name.clone()) {
            Entry::Occupied(_) => Err(DroverError::ToolRegistration {
                tool: spec.name.clone(),
                reason: "a tool with this name is already registered".into(),
            }),
            Entry::Vacant(slot) => {
                info!(tool = %spec.name, idempotent = spec.idempotent, "registered tool");
                slot.insert(RegisteredTool { spec, handler });
                Ok(())
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// The spec for a registered tool.
    pub fn spec(&self, name: &str) -> Option<ToolSpec> {
        self.tools.get(name).map(|entry| entry.spec.clone())
    }

    /// All registered specs, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self
            .tools
            .iter()
            .map(|entry| entry.spec.clone())
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Check arguments against the tool's schema without invoking it.
    pub fn validate_arguments(&self, name: &str, arguments: &Value) -> drover_core::Result<()> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| DroverError::UnknownTool(name.to_string()))?;
        schema::validate_arguments(arguments, &entry.spec.parameters).map_err(|reason| {
            DroverError::InvalidArguments {
                tool: name.to_string(),
                reason,
            }
        })
    }

    /// Run one invocation attempt for a step.
    ///
    /// Returns `Ok` with a `ToolResult` for every resolvable outcome —
    /// success, validation failure, handler error, timeout — and `Err` only
    /// when the tool does not exist.
    pub async fn invoke(
        &self,
        step: &Step,
        attempt: u32,
        timeout: Duration,
    ) -> drover_core::Result<ToolResult> {
        let handler = match self.tools.get(&step.tool) {
            Some(entry) => {
                // Fail fast on bad arguments; the handler never sees them.
                if let Err(reason) =
                    schema::validate_arguments(&step.arguments, &entry.spec.parameters)
                {
                    debug!(tool = %step.tool, %reason, "argument validation failed");
                    return Ok(ToolResult::failure(
                        step.id,
                        &step.tool,
                        format!("invalid arguments: {reason}"),
                        0,
                        attempt,
                    ));
                }
                Arc::clone(&entry.handler)
            }
            None => return Err(DroverError::UnknownTool(step.tool.clone())),
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout, handler.run(&step.arguments)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(Ok(output)) => ToolResult::success(step.id, &step.tool, output, duration_ms, attempt),
            Ok(Err(e)) => ToolResult::failure(step.id, &step.tool, e.to_string(), duration_ms, attempt),
            Err(_) => ToolResult::timed_out(
                step.id,
                &step.tool,
                timeout.as_secs(),
                duration_ms,
                attempt,
            ),
        };

        debug!(
            tool = %step.tool,
            status = ?result.status,
            attempt,
            duration_ms,
            "tool invocation finished"
        );
        Ok(result)
    }
}
