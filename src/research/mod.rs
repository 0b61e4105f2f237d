//! External research client
//!
//! One outbound chat-completion per request. Returns freeform text; the
//! caller decides which state update the text feeds.

use crate::error::ResearchError;
use crate::llm::{LlmClient, LlmConfig};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

pub const DEFAULT_NEWS_DAYS: u32 = 7;

const RESEARCH_TEMPERATURE: f32 = 0.2;
const RESEARCH_MAX_TOKENS: u32 = 1500;

const COMPANY_SYSTEM_PROMPT: &str = "You are a helpful assistant that provides accurate information about companies. \
Focus on factual data including business overview, recent developments, financial information, and market analysis. \
Be comprehensive but concise.";

const COMPARE_SYSTEM_PROMPT: &str = "You are a helpful assistant that provides detailed comparisons between companies. \
Focus on factual data and objective analysis.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResearchKind {
    Analysis,
    News,
    Financials,
}

impl fmt::Display for ResearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResearchKind::Analysis => "analysis",
            ResearchKind::News => "news",
            ResearchKind::Financials => "financials",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub company_name: String,
    pub kind: ResearchKind,
    /// Extra focus for analysis requests.
    pub focus: Option<String>,
    /// Look-back window for news requests.
    pub days: Option<u32>,
}

impl ResearchRequest {
    pub fn new(company_name: impl Into<String>, kind: ResearchKind) -> Self {
        Self {
            company_name: company_name.into(),
            kind,
            focus: None,
            days: None,
        }
    }

    /// The "focusing on" clause of the prompt.
    pub fn focus_clause(&self) -> String {
        match self.kind {
            ResearchKind::Analysis => self
                .focus
                .clone()
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| {
                    "business strategy, competitive position, market analysis, and industry trends"
                        .to_string()
                }),
            ResearchKind::News => format!(
                "recent news and developments in the last {} days",
                self.days.unwrap_or(DEFAULT_NEWS_DAYS)
            ),
            ResearchKind::Financials => {
                "financial performance, revenue, profits, stock price, and market cap".to_string()
            }
        }
    }

    pub fn prompt(&self) -> String {
        format!(
            "Provide comprehensive information about {} company, focusing on: {}.\n\n\
             Please include:\n\
             - Business overview and key products/services\n\
             - Recent news and developments\n\
             - Financial performance indicators\n\
             - Market position and competitive landscape\n\
             - Key leadership and management\n\
             - Recent strategic initiatives\n\n\
             Format the response as detailed, factual information that would be useful for business research.",
            self.company_name,
            self.focus_clause()
        )
    }
}

pub(crate) fn comparison_prompt(companies: &[String]) -> String {
    let subject = match companies {
        [a, b] => format!("{} and {}", a, b),
        _ => companies.join(", "),
    };

    format!(
        "Compare {} companies in detail.\n\n\
         Please provide a comprehensive comparison including:\n\
         - Business models and core products/services\n\
         - Financial performance and market capitalization\n\
         - Market position and competitive advantages\n\
         - Revenue streams and profitability\n\
         - Growth strategies and future outlook\n\
         - Strengths and weaknesses of each company\n\
         - Market share and competitive landscape\n\n\
         Format the response as a detailed comparative analysis.",
        subject
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchReport {
    /// Company name, or "A vs B" for comparisons.
    pub subject: String,
    pub content: String,
    pub source: String,
    pub retrieved_at: DateTime<Utc>,
}

/// Trait for the external research provider
#[async_trait::async_trait]
pub trait ResearchClient: Send + Sync {
    async fn research(&self, request: &ResearchRequest) -> Result<ResearchReport>;
    async fn compare(&self, companies: &[String]) -> Result<ResearchReport>;
}

/// Research provider backed by an OpenAI-compatible chat-completions API.
pub struct LlmResearchClient {
    llm: LlmClient,
}

impl LlmResearchClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        Ok(Self {
            llm: LlmClient::new(config)?,
        })
    }

    fn source(&self) -> String {
        format!("openai_{}", self.llm.model())
    }

    async fn run(&self, system: &str, prompt: &str, subject: String) -> Result<ResearchReport> {
        let content = self
            .llm
            .generate(system, prompt, RESEARCH_MAX_TOKENS, RESEARCH_TEMPERATURE)
            .await
            .map_err(|e| {
                warn!(subject = %subject, error = %e, "Research request failed");
                ResearchError::ProviderError(e.to_string())
            })?;

        Ok(ResearchReport {
            subject,
            content,
            source: self.source(),
            retrieved_at: Utc::now(),
        })
    }
}

#[async_trait::async_trait]
impl ResearchClient for LlmResearchClient {
    async fn research(&self, request: &ResearchRequest) -> Result<ResearchReport> {
        if request.company_name.trim().is_empty() {
            return Err(ResearchError::InvalidToolInput(
                "company_name must not be empty".to_string(),
            ));
        }

        info!(company = %request.company_name, kind = %request.kind, "Requesting company research");

        self.run(
            COMPANY_SYSTEM_PROMPT,
            &request.prompt(),
            request.company_name.clone(),
        )
        .await
    }

    async fn compare(&self, companies: &[String]) -> Result<ResearchReport> {
        if companies.len() < 2 {
            return Err(ResearchError::InvalidToolInput(
                "comparison needs at least two companies".to_string(),
            ));
        }

        info!(companies = ?companies, "Requesting company comparison");

        self.run(
            COMPARE_SYSTEM_PROMPT,
            &comparison_prompt(companies),
            companies.join(" vs "),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_news_prompt_uses_default_window() {
        let request = ResearchRequest::new("Tesla Inc.", ResearchKind::News);
        assert!(request
            .prompt()
            .contains("recent news and developments in the last 7 days"));

        let mut month = request.clone();
        month.days = Some(30);
        assert!(month.prompt().contains("last 30 days"));
    }

    #[test]
    fn test_analysis_focus_override() {
        let mut request = ResearchRequest::new("Apple Inc.", ResearchKind::Analysis);
        assert!(request.prompt().contains("competitive position"));

        request.focus = Some("supply chain".to_string());
        assert!(request.prompt().contains("focusing on: supply chain."));
    }

    #[test]
    fn test_comparison_prompt() {
        let pair = comparison_prompt(&["Microsoft".to_string(), "Google".to_string()]);
        assert!(pair.starts_with("Compare Microsoft and Google companies"));

        let three = comparison_prompt(&["A".to_string(), "B".to_string(), "C".to_string()]);
        assert!(three.starts_with("Compare A, B, C companies"));
    }

    #[tokio::test]
    async fn test_missing_key_is_provider_error() {
        let client = LlmResearchClient::new(LlmConfig::new("")).unwrap();
        let request = ResearchRequest::new("Apple Inc.", ResearchKind::Financials);

        let err = client.research(&request).await.unwrap_err();
        assert!(matches!(err, ResearchError::ProviderError(_)));

        let err = client.compare(&["Apple".to_string()]).await.unwrap_err();
        assert!(matches!(err, ResearchError::InvalidToolInput(_)));
    }
}
