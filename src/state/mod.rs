//! Shared state between the orchestrator and the UI
//!
//! The UI never receives the whole object as a write; it receives typed
//! `StateUpdate`s and folds them into its own `SharedState` with `apply`.
//! The orchestrator keeps the authoritative projection per thread.

pub mod channel;
pub mod events;
pub mod store;

pub use channel::{StateChannel, StateEnvelope};
pub use events::{PendingApproval, PendingToolCall, StateUpdate, UiIntent};
pub use store::{InMemorySessionStore, Session, SessionStore};

use crate::models::CompanyRecord;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-company research text, filled in as external calls complete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchBundle {
    pub company_name: Option<String>,
    pub analysis: Option<String>,
    pub news: Option<String>,
    pub financials: Option<String>,
    pub is_researching: bool,
    pub error: Option<String>,
}

impl ResearchBundle {
    pub fn is_for(&self, company_name: &str) -> bool {
        self.company_name
            .as_deref()
            .is_some_and(|n| n.eq_ignore_ascii_case(company_name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub companies: Vec<String>,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedState {
    pub companies: Vec<CompanyRecord>,
    pub selected_company: Option<CompanyRecord>,
    pub card_visible: bool,
    pub research: ResearchBundle,
    pub comparison: Option<ComparisonResult>,
    pub pending_approval: Option<PendingApproval>,
    pub awaiting_approval: bool,
}

impl SharedState {
    /// Fold one update into the projection.
    pub fn apply(&mut self, update: &StateUpdate) {
        // Research results only land in the bundle of their own company.
        if let Some(company) = update.research_company() {
            let starts = matches!(update, StateUpdate::ResearchStarted { .. });
            if !starts && !self.research.is_for(company) {
                debug!(company, action = update.action_name(), "Dropping research update for another company");
                return;
            }
        }

        match update {
            StateUpdate::CompaniesFound { companies } => {
                self.companies = companies.clone();
            }
            StateUpdate::CompanySelected { company } => {
                self.selected_company = Some(company.clone());
                self.card_visible = true;
            }
            StateUpdate::CompanyCardHidden => {
                self.card_visible = false;
            }
            StateUpdate::ResearchStarted { company_name } => {
                // Only an open lookup of the same company continues; anything
                // else starts from an empty bundle.
                if !(self.research.is_researching && self.research.is_for(company_name)) {
                    self.research = ResearchBundle {
                        company_name: Some(company_name.clone()),
                        ..Default::default()
                    };
                }
                self.research.is_researching = true;
                self.research.error = None;
            }
            StateUpdate::AnalysisReady { content, .. } => {
                self.research.analysis = Some(content.clone());
            }
            StateUpdate::NewsReady { content, .. } => {
                self.research.news = Some(content.clone());
            }
            StateUpdate::FinancialsReady { content, .. } => {
                self.research.financials = Some(content.clone());
                self.research.is_researching = false;
            }
            StateUpdate::ResearchFailed { error, .. } => {
                self.research.is_researching = false;
                self.research.error = Some(error.clone());
            }
            StateUpdate::ResearchFinished { .. } => {
                self.research.is_researching = false;
            }
            StateUpdate::ComparisonReady { companies, content } => {
                self.comparison = Some(ComparisonResult {
                    companies: companies.clone(),
                    content: content.clone(),
                });
            }
            StateUpdate::ApprovalRequested { calls } => {
                self.pending_approval = Some(PendingApproval {
                    calls: calls.clone(),
                    requested_at: Utc::now(),
                });
                self.awaiting_approval = true;
            }
            StateUpdate::ApprovalCleared { .. } => {
                self.pending_approval = None;
                self.awaiting_approval = false;
            }
        }
    }

    /// Copy of the state with the approval gate cleared, i.e. only the data.
    pub fn data_only(&self) -> SharedState {
        SharedState {
            pending_approval: None,
            awaiting_approval: false,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::seed::demo_companies;

    fn started(company: &str) -> StateUpdate {
        StateUpdate::ResearchStarted {
            company_name: company.into(),
        }
    }

    fn analysis(company: &str, content: &str) -> StateUpdate {
        StateUpdate::AnalysisReady {
            company_name: company.into(),
            content: content.into(),
        }
    }

    #[test]
    fn test_research_lifecycle() {
        let mut state = SharedState::default();

        state.apply(&started("Apple Inc."));
        assert!(state.research.is_researching);

        state.apply(&analysis("Apple Inc.", "analysis"));
        state.apply(&StateUpdate::NewsReady {
            company_name: "Apple Inc.".into(),
            content: "news".into(),
        });
        assert!(state.research.is_researching);

        state.apply(&StateUpdate::FinancialsReady {
            company_name: "Apple Inc.".into(),
            content: "financials".into(),
        });
        assert!(!state.research.is_researching);
        assert_eq!(state.research.analysis.as_deref(), Some("analysis"));
    }

    #[test]
    fn test_new_company_resets_bundle() {
        let mut state = SharedState::default();
        state.apply(&started("Apple Inc."));
        state.apply(&analysis("Apple Inc.", "apple"));

        state.apply(&started("Tesla Inc."));
        assert!(state.research.analysis.is_none());
        assert!(state.research.is_for("tesla inc."));
    }

    #[test]
    fn test_finished_lookup_of_same_company_starts_empty() {
        let mut state = SharedState::default();
        state.apply(&started("Apple Inc."));
        state.apply(&analysis("Apple Inc.", "old analysis"));
        state.apply(&StateUpdate::ResearchFinished {
            company_name: "Apple Inc.".into(),
        });

        state.apply(&started("Apple Inc."));
        assert!(state.research.is_researching);
        assert!(state.research.analysis.is_none());
    }

    #[test]
    fn test_open_lookup_of_same_company_continues() {
        let mut state = SharedState::default();
        state.apply(&started("Apple Inc."));
        state.apply(&analysis("Apple Inc.", "analysis"));

        state.apply(&started("Apple Inc."));
        assert_eq!(state.research.analysis.as_deref(), Some("analysis"));
    }

    #[test]
    fn test_updates_for_another_company_are_dropped() {
        let mut state = SharedState::default();
        state.apply(&started("Tesla Inc."));

        state.apply(&analysis("Apple Inc.", "apple analysis"));
        state.apply(&StateUpdate::FinancialsReady {
            company_name: "Apple Inc.".into(),
            content: "apple financials".into(),
        });
        state.apply(&StateUpdate::ResearchFailed {
            company_name: "Apple Inc.".into(),
            error: "down".into(),
        });

        assert!(state.research.is_for("Tesla Inc."));
        assert!(state.research.is_researching);
        assert!(state.research.analysis.is_none());
        assert!(state.research.financials.is_none());
        assert!(state.research.error.is_none());
    }

    #[test]
    fn test_failure_ends_lookup() {
        let mut state = SharedState::default();
        state.apply(&started("Apple Inc."));
        state.apply(&StateUpdate::ResearchFailed {
            company_name: "Apple Inc.".into(),
            error: "provider down".into(),
        });
        assert!(!state.research.is_researching);
        assert_eq!(state.research.error.as_deref(), Some("provider down"));
    }

    #[test]
    fn test_selection_and_card_visibility() {
        let mut state = SharedState::default();
        let company = demo_companies().remove(0);

        state.apply(&StateUpdate::CompanySelected { company: company.clone() });
        assert!(state.card_visible);

        state.apply(&StateUpdate::CompanyCardHidden);
        assert!(!state.card_visible);
        assert_eq!(state.selected_company, Some(company));
    }

    #[test]
    fn test_approval_gate_fields() {
        let mut state = SharedState::default();
        state.apply(&StateUpdate::ApprovalRequested { calls: vec![] });
        assert!(state.awaiting_approval);

        state.apply(&StateUpdate::ApprovalCleared { approved: false });
        assert!(!state.awaiting_approval);
        assert!(state.pending_approval.is_none());
    }
}
