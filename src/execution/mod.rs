//! Execution engine for planned tool calls
//!
//! A batch of calls runs concurrently and is joined before the next
//! planning step. Failures never escape: every call yields an Observation.

use crate::error::ResearchError;
use crate::models::{ExecutionStatus, Observation, ToolCallRequest, ToolInput};
use crate::tools::ToolRegistry;
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 60;

/// Which tools must be approved by the user before they run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ApprovalPolicy {
    /// Whatever each tool declares.
    #[default]
    ToolDefault,
    Always,
    Never,
    Tools(HashSet<String>),
}

impl ApprovalPolicy {
    /// Parse `all`, `none`, or a comma separated list of tool names.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.to_ascii_lowercase().as_str() {
            "" => ApprovalPolicy::ToolDefault,
            "all" | "*" => ApprovalPolicy::Always,
            "none" => ApprovalPolicy::Never,
            _ => ApprovalPolicy::Tools(
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
        }
    }

    pub fn requires(&self, tool_name: &str, tool_default: bool) -> bool {
        match self {
            ApprovalPolicy::ToolDefault => tool_default,
            ApprovalPolicy::Always => true,
            ApprovalPolicy::Never => false,
            ApprovalPolicy::Tools(names) => names.contains(tool_name),
        }
    }
}

/// Executes tool calls against the registry
pub struct ExecutionEngine {
    tool_registry: ToolRegistry,
    approval_policy: ApprovalPolicy,
    tool_timeout: Duration,
}

impl ExecutionEngine {
    pub fn new(tool_registry: ToolRegistry) -> Self {
        Self {
            tool_registry,
            approval_policy: ApprovalPolicy::default(),
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
        }
    }

    pub fn with_approval_policy(mut self, policy: ApprovalPolicy) -> Self {
        self.approval_policy = policy;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.tool_registry
    }

    /// Unknown tools never need approval; they are skipped at execution.
    pub fn requires_approval(&self, call: &ToolCallRequest) -> bool {
        self.tool_registry
            .get(&call.name)
            .map(|tool| {
                self.approval_policy
                    .requires(&call.name, tool.requires_approval())
            })
            .unwrap_or(false)
    }

    /// Run one batch concurrently. Observations come back in call order.
    pub async fn execute_calls(&self, calls: &[ToolCallRequest]) -> Vec<Observation> {
        debug!(calls = calls.len(), "Executing tool batch");

        let observations = join_all(calls.iter().map(|call| self.execute_call(call))).await;

        debug!(
            observation_count = observations.len(),
            "Tool batch completed"
        );

        observations
    }

    pub async fn execute_call(&self, call: &ToolCallRequest) -> Observation {
        let start = Instant::now();

        let tool = match self.tool_registry.get(&call.name) {
            Some(tool) => tool,
            None => {
                warn!(tool_name = %call.name, "Tool not registered");
                return Observation {
                    call: call.clone(),
                    tool_output: serde_json::json!({
                        "error": ResearchError::ToolNotFound(call.name.clone()).to_string()
                    }),
                    status: ExecutionStatus::Skipped,
                    execution_time_ms: 0,
                    created_at: Utc::now(),
                    events: Vec::new(),
                };
            }
        };

        let tool_input = ToolInput {
            tool_name: call.name.clone(),
            parameters: call.arguments.clone(),
        };

        let result = match tokio::time::timeout(self.tool_timeout, tool.execute(&tool_input)).await
        {
            Ok(result) => result,
            Err(_) => Err(ResearchError::ToolTimeout(self.tool_timeout.as_secs())),
        };

        let (status, tool_output, events) = match result {
            Ok(output) if output.success => (ExecutionStatus::Success, output.data, output.events),
            Ok(output) => {
                let error = output
                    .error
                    .unwrap_or_else(|| "tool reported failure".to_string());
                warn!(tool_name = %call.name, error = %error, "Tool reported failure");
                (
                    ExecutionStatus::Failed,
                    serde_json::json!({ "error": error }),
                    Vec::new(),
                )
            }
            Err(e) => {
                warn!(tool_name = %call.name, error = %e, "Tool execution failed");
                (
                    ExecutionStatus::Failed,
                    serde_json::json!({ "error": e.to_string() }),
                    Vec::new(),
                )
            }
        };

        Observation {
            call: call.clone(),
            tool_output,
            status,
            execution_time_ms: start.elapsed().as_millis() as u64,
            created_at: Utc::now(),
            events,
        }
    }

    /// Observation recorded for a call the user rejected. Nothing runs.
    pub fn denied(call: &ToolCallRequest) -> Observation {
        Observation {
            call: call.clone(),
            tool_output: serde_json::Value::Null,
            status: ExecutionStatus::Denied,
            execution_time_ms: 0,
            created_at: Utc::now(),
            events: Vec::new(),
        }
    }
}
