//! Core data models for the company research agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ResearchError;
use crate::state::{SharedState, StateUpdate};

//
// ================= Company =================
//

/// One row of the `companies` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompanyRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub ticker_symbol: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub market_cap: Option<i64>,
    #[serde(default)]
    pub employees: Option<i32>,
    #[serde(default)]
    pub founded_year: Option<i32>,
    #[serde(default)]
    pub headquarters: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CompanyRecord {
    /// Market cap in billions, e.g. `$3000.0B`.
    pub fn market_cap_display(&self) -> Option<String> {
        self.market_cap
            .map(|cap| format!("${:.1}B", cap as f64 / 1_000_000_000.0))
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.name.trim().is_empty() {
            return Err(ResearchError::InvalidRecord(format!(
                "company {} has an empty name",
                self.id
            )));
        }

        let negative = [
            ("market_cap", self.market_cap.filter(|v| *v < 0)),
            ("employees", self.employees.filter(|v| *v < 0).map(i64::from)),
            ("founded_year", self.founded_year.filter(|v| *v < 0).map(i64::from)),
        ];

        if let Some((field, value)) = negative
            .iter()
            .find_map(|(field, value)| value.map(|v| (field, v)))
        {
            return Err(ResearchError::InvalidRecord(format!(
                "{} must be non-negative for {} (got {})",
                field, self.name, value
            )));
        }

        Ok(())
    }

    pub fn has_ticker(&self, ticker: &str) -> bool {
        self.ticker_symbol
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(ticker.trim()))
    }
}

/// Filter criteria for `CompanyStore::filter`. All set fields must match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyFilter {
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub min_market_cap: Option<i64>,
    #[serde(default)]
    pub max_market_cap: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub fn default_limit() -> usize {
    10
}

impl Default for CompanyFilter {
    fn default() -> Self {
        Self {
            sector: None,
            industry: None,
            min_market_cap: None,
            max_market_cap: None,
            limit: default_limit(),
        }
    }
}

impl CompanyFilter {
    pub fn matches(&self, company: &CompanyRecord) -> bool {
        let text_eq = |wanted: &Option<String>, actual: &Option<String>| match wanted {
            Some(w) => actual
                .as_deref()
                .is_some_and(|a| a.eq_ignore_ascii_case(w.trim())),
            None => true,
        };

        let within = match (self.min_market_cap, self.max_market_cap, company.market_cap) {
            (None, None, _) => true,
            (_, _, None) => false,
            (min, max, Some(cap)) => {
                min.map_or(true, |m| cap >= m) && max.map_or(true, |m| cap <= m)
            }
        };

        text_eq(&self.sector, &company.sector)
            && text_eq(&self.industry, &company.industry)
            && within
    }
}

//
// ================= Tool I/O =================
//

/// A tool invocation chosen by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Raw arguments as produced by the planner. Decoded by the tool itself.
    pub arguments: serde_json::Value,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInput {
    pub tool_name: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: serde_json::Value,
    pub error: Option<String>,
    /// State updates produced by this call, in emission order.
    #[serde(default)]
    pub events: Vec<StateUpdate>,
}

impl ToolOutput {
    pub fn ok(data: serde_json::Value, events: Vec<StateUpdate>) -> Self {
        Self {
            success: true,
            data,
            error: None,
            events,
        }
    }
}

//
// ================= Execution =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Skipped,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub call: ToolCallRequest,
    pub tool_output: serde_json::Value,
    pub status: ExecutionStatus,
    pub execution_time_ms: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub events: Vec<StateUpdate>,
}

impl Observation {
    /// Content handed back to the planner as the tool result message.
    pub fn result_content(&self) -> String {
        let payload = match self.status {
            ExecutionStatus::Success => serde_json::json!({
                "status": "success",
                "data": self.tool_output,
            }),
            ExecutionStatus::Denied => serde_json::json!({
                "status": "denied",
                "error": "The user denied this tool call",
            }),
            _ => serde_json::json!({
                "status": self.status,
                "error": self
                    .tool_output
                    .get("error")
                    .cloned()
                    .unwrap_or(serde_json::Value::Null),
            }),
        };
        payload.to_string()
    }
}

//
// ================= Turn =================
//

/// Where a thread currently sits in the per-turn state machine.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    #[default]
    Idle,
    Planning,
    ToolPending,
    Executing,
    Done,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Completed,
    AwaitingApproval,
    Fallback,
}

/// What a single call into the orchestrator hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResult {
    pub thread_id: String,
    pub status: TurnStatus,
    pub reply: String,
    pub events: Vec<StateUpdate>,
    pub state: SharedState,
    pub iterations: u32,
    pub reasoning_trace: Vec<String>,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TurnPhase::Idle => "idle",
            TurnPhase::Planning => "planning",
            TurnPhase::ToolPending => "tool_pending",
            TurnPhase::Executing => "executing",
            TurnPhase::Done => "done",
        };
        write!(f, "{}", s)
    }
}
