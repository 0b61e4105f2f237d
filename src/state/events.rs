//! Typed events crossing the orchestrator/UI boundary.
//!
//! `StateUpdate` flows orchestrator → UI; `UiIntent` flows UI → orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ResearchError;
use crate::models::{CompanyRecord, ToolCallRequest};
use crate::tools::args::{decode_args, lenient};
use crate::Result;

/// A tool call awaiting a user decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    pub description: String,
    pub arguments: Value,
}

impl PendingToolCall {
    pub fn to_request(&self) -> ToolCallRequest {
        ToolCallRequest {
            id: self.id.clone(),
            name: self.name.clone(),
            arguments: self.arguments.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub calls: Vec<PendingToolCall>,
    pub requested_at: DateTime<Utc>,
}

/// Orchestrator → UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateUpdate {
    CompaniesFound {
        companies: Vec<CompanyRecord>,
    },
    CompanySelected {
        company: CompanyRecord,
    },
    CompanyCardHidden,
    ResearchStarted {
        company_name: String,
    },
    AnalysisReady {
        company_name: String,
        content: String,
    },
    NewsReady {
        company_name: String,
        content: String,
    },
    /// Ends the current lookup.
    FinancialsReady {
        company_name: String,
        content: String,
    },
    ResearchFailed {
        company_name: String,
        error: String,
    },
    ResearchFinished {
        company_name: String,
    },
    ComparisonReady {
        companies: Vec<String>,
        content: String,
    },
    ApprovalRequested {
        calls: Vec<PendingToolCall>,
    },
    ApprovalCleared {
        approved: bool,
    },
}

impl StateUpdate {
    /// Company a research update belongs to.
    pub fn research_company(&self) -> Option<&str> {
        match self {
            StateUpdate::ResearchStarted { company_name }
            | StateUpdate::AnalysisReady { company_name, .. }
            | StateUpdate::NewsReady { company_name, .. }
            | StateUpdate::FinancialsReady { company_name, .. }
            | StateUpdate::ResearchFailed { company_name, .. }
            | StateUpdate::ResearchFinished { company_name } => Some(company_name.as_str()),
            _ => None,
        }
    }

    /// Name of the UI action handler this update is delivered to.
    pub fn action_name(&self) -> &'static str {
        match self {
            StateUpdate::CompaniesFound { .. } => "updateCompanyList",
            StateUpdate::CompanySelected { .. } => "displayCompanyInfo",
            StateUpdate::CompanyCardHidden => "hideCompanyInfo",
            StateUpdate::ResearchStarted { .. } => "startResearch",
            StateUpdate::AnalysisReady { .. } => "updateResearchAnalysis",
            StateUpdate::NewsReady { .. } => "updateResearchNews",
            StateUpdate::FinancialsReady { .. } => "updateResearchFinancials",
            StateUpdate::ResearchFailed { .. } => "failResearch",
            StateUpdate::ResearchFinished { .. } => "endResearch",
            StateUpdate::ComparisonReady { .. } => "showComparison",
            StateUpdate::ApprovalRequested { .. } => "requestApproval",
            StateUpdate::ApprovalCleared { .. } => "clearApproval",
        }
    }

    /// Arguments object handed to the UI action handler.
    pub fn action_args(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.remove("type");
        }
        value
    }

    /// Decode a UI action invocation. `args` may be an object or JSON text,
    /// and nested records may themselves be JSON text.
    pub fn from_action(name: &str, args: &Value) -> Result<StateUpdate> {
        let update = match name {
            "updateCompanyList" => {
                let a: CompaniesArgs = decode_args(args)?;
                StateUpdate::CompaniesFound { companies: a.companies }
            }
            "displayCompanyInfo" => {
                let a: CompanyArgs = decode_args(args)?;
                StateUpdate::CompanySelected { company: a.company }
            }
            "hideCompanyInfo" => StateUpdate::CompanyCardHidden,
            "startResearch" => {
                let a: CompanyNameArgs = decode_args(args)?;
                StateUpdate::ResearchStarted { company_name: a.company_name }
            }
            "updateResearchAnalysis" => {
                let a: ContentArgs = decode_args(args)?;
                StateUpdate::AnalysisReady {
                    company_name: a.company_name,
                    content: a.content,
                }
            }
            "updateResearchNews" => {
                let a: ContentArgs = decode_args(args)?;
                StateUpdate::NewsReady {
                    company_name: a.company_name,
                    content: a.content,
                }
            }
            "updateResearchFinancials" => {
                let a: ContentArgs = decode_args(args)?;
                StateUpdate::FinancialsReady {
                    company_name: a.company_name,
                    content: a.content,
                }
            }
            "failResearch" => {
                let a: FailureArgs = decode_args(args)?;
                StateUpdate::ResearchFailed {
                    company_name: a.company_name,
                    error: a.error,
                }
            }
            "endResearch" => {
                let a: CompanyNameArgs = decode_args(args)?;
                StateUpdate::ResearchFinished { company_name: a.company_name }
            }
            "showComparison" => {
                let a: ComparisonArgs = decode_args(args)?;
                StateUpdate::ComparisonReady {
                    companies: a.companies,
                    content: a.content,
                }
            }
            "requestApproval" => {
                let a: ApprovalArgs = decode_args(args)?;
                StateUpdate::ApprovalRequested { calls: a.calls }
            }
            "clearApproval" => {
                let a: ClearArgs = decode_args(args)?;
                StateUpdate::ApprovalCleared { approved: a.approved }
            }
            other => {
                return Err(ResearchError::InvalidToolInput(format!(
                    "unknown UI action '{}'",
                    other
                )))
            }
        };
        Ok(update)
    }
}

#[derive(Deserialize)]
struct CompaniesArgs {
    #[serde(deserialize_with = "lenient")]
    companies: Vec<CompanyRecord>,
}

#[derive(Deserialize)]
struct CompanyArgs {
    #[serde(deserialize_with = "lenient")]
    company: CompanyRecord,
}

#[derive(Deserialize)]
struct CompanyNameArgs {
    company_name: String,
}

#[derive(Deserialize)]
struct ContentArgs {
    company_name: String,
    content: String,
}

#[derive(Deserialize)]
struct FailureArgs {
    company_name: String,
    error: String,
}

#[derive(Deserialize)]
struct ComparisonArgs {
    companies: Vec<String>,
    content: String,
}

#[derive(Deserialize)]
struct ApprovalArgs {
    #[serde(deserialize_with = "lenient")]
    calls: Vec<PendingToolCall>,
}

#[derive(Deserialize)]
struct ClearArgs {
    approved: bool,
}

/// UI → orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiIntent {
    SelectCompany {
        #[serde(deserialize_with = "lenient")]
        company: CompanyRecord,
    },
    HideCompanyCard,
    ApprovalDecision {
        approved: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::seed::demo_companies;
    use serde_json::json;

    fn apple() -> CompanyRecord {
        demo_companies()
            .into_iter()
            .find(|c| c.has_ticker("AAPL"))
            .unwrap()
    }

    #[test]
    fn test_record_round_trip_object_and_text() {
        let record = apple();
        let update = StateUpdate::CompanySelected { company: record.clone() };
        let args = update.action_args();

        // Already-parsed object
        let from_object = StateUpdate::from_action(update.action_name(), &args).unwrap();
        // Whole payload as JSON text
        let from_text =
            StateUpdate::from_action(update.action_name(), &Value::String(args.to_string()))
                .unwrap();
        // Nested record as JSON text
        let nested = json!({ "company": args["company"].to_string() });
        let from_nested = StateUpdate::from_action(update.action_name(), &nested).unwrap();

        for parsed in [from_object, from_text, from_nested] {
            assert_eq!(parsed, StateUpdate::CompanySelected { company: record.clone() });
        }
    }

    #[test]
    fn test_update_serializes_with_type_tag() {
        let update = StateUpdate::ResearchStarted {
            company_name: "Apple Inc.".to_string(),
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["type"], "research_started");
        assert_eq!(update.action_args(), json!({"company_name": "Apple Inc."}));
    }

    #[test]
    fn test_research_text_carries_company() {
        let update = StateUpdate::from_action(
            "updateResearchNews",
            &Value::String(r#"{"company_name":"Tesla Inc.","content":"recall"}"#.to_string()),
        )
        .unwrap();

        assert_eq!(update.research_company(), Some("Tesla Inc."));
        assert!(StateUpdate::from_action("updateResearchNews", &json!({"content": "recall"})).is_err());
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        assert!(StateUpdate::from_action("launchRockets", &json!({})).is_err());
    }

    #[test]
    fn test_intent_accepts_company_as_text() {
        let record = apple();
        let raw = json!({
            "type": "select_company",
            "company": serde_json::to_string(&record).unwrap(),
        });
        let intent: UiIntent = serde_json::from_value(raw).unwrap();
        assert_eq!(intent, UiIntent::SelectCompany { company: record });
    }
}
