//! Test doubles shared by unit tests.

use crate::error::ResearchError;
use crate::research::{ResearchClient, ResearchKind, ResearchReport, ResearchRequest};
use crate::Result;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Mutex;

/// Research client answering from canned text and recording every call.
pub struct StubResearch {
    failing: HashSet<ResearchKind>,
    calls: Mutex<Vec<String>>,
}

impl StubResearch {
    pub fn new() -> Self {
        Self {
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(kind: ResearchKind) -> Self {
        Self {
            failing: HashSet::from([kind]),
            ..Self::new()
        }
    }

    /// `"<kind>:<company>"` for research, `"compare:<a> vs <b>"` for comparisons.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.calls.lock().unwrap().push(entry);
    }
}

#[async_trait::async_trait]
impl ResearchClient for StubResearch {
    async fn research(&self, request: &ResearchRequest) -> Result<ResearchReport> {
        self.record(format!("{}:{}", request.kind, request.company_name));

        if self.failing.contains(&request.kind) {
            return Err(ResearchError::ProviderError(format!(
                "{} provider unavailable",
                request.kind
            )));
        }

        Ok(ResearchReport {
            subject: request.company_name.clone(),
            content: format!("{} report for {}", request.kind, request.company_name),
            source: "stub".to_string(),
            retrieved_at: Utc::now(),
        })
    }

    async fn compare(&self, companies: &[String]) -> Result<ResearchReport> {
        let subject = companies.join(" vs ");
        self.record(format!("compare:{}", subject));

        Ok(ResearchReport {
            content: format!("comparison of {}", subject),
            subject,
            source: "stub".to_string(),
            retrieved_at: Utc::now(),
        })
    }
}
