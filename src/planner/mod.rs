//! Planner trait and implementations
//!
//! A planner looks at the transcript of the current turn and decides the
//! next step: call some tools, or answer the user.

use crate::llm::{ChatMessage, Role};
use crate::models::{CompanyRecord, ToolCallRequest};
use crate::state::SharedState;
use crate::tools::{
    COMPANY_ANALYSIS, COMPANY_FINANCIALS, COMPANY_NEWS, COMPARE_COMPANIES, FILTER_COMPANIES,
    SEARCH_COMPANIES,
};
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;

pub mod openai;
pub use openai::LlmPlanner;

pub const CANCEL_MESSAGE: &str =
    "Tool execution cancelled as per your request. How else can I help you?";

/// Everything a planner may look at for one planning step.
pub struct PlanningContext<'a> {
    pub thread_id: &'a str,
    pub messages: &'a [ChatMessage],
    pub state: &'a SharedState,
    /// 1-based planning step within the current turn.
    pub iteration: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlannerDecision {
    CallTools(Vec<ToolCallRequest>),
    Respond(String),
}

/// Trait for next-step planning
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, context: &PlanningContext<'_>) -> Result<PlannerDecision>;
}

/// Tool results recorded after the most recent user message, in order.
pub(crate) fn results_since_last_user(messages: &[ChatMessage]) -> Vec<(String, Value)> {
    let start = messages
        .iter()
        .rposition(|m| m.role == Role::User)
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut names: HashMap<&str, &str> = HashMap::new();
    let mut results = Vec::new();

    for message in &messages[start..] {
        match message.role {
            Role::Assistant => {
                for call in &message.tool_calls {
                    names.insert(call.id.as_str(), call.name.as_str());
                }
            }
            Role::Tool => {
                let name = message
                    .tool_call_id
                    .as_deref()
                    .and_then(|id| names.get(id))
                    .copied()
                    .unwrap_or_default();
                let content = message
                    .content
                    .as_deref()
                    .and_then(|c| serde_json::from_str(c).ok())
                    .unwrap_or(Value::Null);
                results.push((name.to_string(), content));
            }
            _ => {}
        }
    }

    results
}

fn result_error(result: &Value) -> String {
    result
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string()
}

fn is_success(result: &Value) -> bool {
    result.get("status").and_then(Value::as_str) == Some("success")
}

//
// ================= Intent planner =================
//

const STOPWORDS: &[&str] = &[
    "a", "about", "an", "analysis", "analyze", "and", "are", "between", "can", "companies",
    "company", "compare", "data", "detail", "details", "do", "does", "doing", "financial",
    "financials", "find", "for", "get", "give", "how", "i", "info", "information", "is", "know",
    "latest", "let", "lets", "look", "lookup", "me", "more", "news", "of", "on", "overview",
    "performance", "please", "recent", "research", "search", "see", "show", "some", "stock",
    "tell", "the", "to", "up", "want", "what", "who", "you",
];

const SEPARATORS: &[&str] = &["and", "vs", "versus", "with", "to", "&", "or"];

#[derive(Debug, Clone, PartialEq)]
enum Intent {
    Lookup(String),
    Compare(Vec<String>),
    Filter(String),
}

fn clean_word(word: &str) -> String {
    let trimmed = word.trim_matches(|c: char| c.is_ascii_punctuation() && c != '&');
    trimmed
        .strip_suffix("'s")
        .or_else(|| trimmed.strip_suffix("’s"))
        .unwrap_or(trimmed)
        .to_string()
}

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word.to_lowercase().as_str())
}

/// Deterministic planner driven by keyword routing. Used when no model is
/// configured and in tests.
pub struct IntentPlanner;

impl IntentPlanner {
    fn words(text: &str) -> Vec<String> {
        text.split_whitespace()
            .map(clean_word)
            .filter(|w| !w.is_empty())
            .collect()
    }

    fn compare_targets(words: &[String]) -> Vec<String> {
        let mut groups: Vec<Vec<&str>> = vec![Vec::new()];

        for word in words {
            let lowered = word.to_lowercase();
            if SEPARATORS.contains(&lowered.as_str()) {
                groups.push(Vec::new());
            } else if !is_stopword(word) {
                if let Some(group) = groups.last_mut() {
                    group.push(word.as_str());
                }
            }
        }

        groups
            .into_iter()
            .filter(|g| !g.is_empty())
            .map(|g| g.join(" "))
            .collect()
    }

    fn sector_target(words: &[String]) -> Option<String> {
        let idx = words
            .iter()
            .position(|w| w.eq_ignore_ascii_case("sector"))?;

        let mut sector: Vec<&str> = words[..idx]
            .iter()
            .rev()
            .take_while(|w| !matches!(w.to_lowercase().as_str(), "in" | "the" | "from"))
            .map(String::as_str)
            .collect();
        sector.reverse();

        (!sector.is_empty()).then(|| sector.join(" "))
    }

    fn classify(text: &str) -> Option<Intent> {
        let lowered = text.to_lowercase();
        let words = Self::words(text);

        let has_any = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

        if has_any(&["compare", " vs", "versus"]) {
            let targets = Self::compare_targets(&words);
            if targets.len() >= 2 {
                return Some(Intent::Compare(targets));
            }
        }

        if let Some(sector) = Self::sector_target(&words) {
            return Some(Intent::Filter(sector));
        }

        let subject: Vec<&str> = words
            .iter()
            .filter(|w| !is_stopword(w))
            .map(String::as_str)
            .collect();

        (!subject.is_empty()).then(|| Intent::Lookup(subject.join(" ")))
    }

    fn plan_lookup(subject: &str, results: &[(String, Value)]) -> PlannerDecision {
        let search = match results.iter().find(|(name, _)| name == SEARCH_COMPANIES) {
            Some((_, result)) => result,
            None => {
                return PlannerDecision::CallTools(vec![ToolCallRequest::new(
                    SEARCH_COMPANIES,
                    json!({ "query": subject, "limit": 5 }),
                )])
            }
        };

        if !is_success(search) {
            return PlannerDecision::Respond(format!(
                "I couldn't search the company database right now: {}",
                result_error(search)
            ));
        }

        let companies: Vec<CompanyRecord> = search["data"]["companies"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|c| serde_json::from_value(c.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        let first = match companies.first() {
            Some(first) => first,
            None => {
                return PlannerDecision::Respond(format!(
                    "I couldn't find any companies matching '{}' in the database.",
                    subject
                ))
            }
        };

        let research: Vec<&(String, Value)> = results
            .iter()
            .filter(|(name, _)| {
                matches!(
                    name.as_str(),
                    COMPANY_ANALYSIS | COMPANY_NEWS | COMPANY_FINANCIALS
                )
            })
            .collect();

        if research.is_empty() {
            let args = json!({ "company_name": first.name });
            return PlannerDecision::CallTools(vec![
                ToolCallRequest::new(COMPANY_ANALYSIS, args.clone()),
                ToolCallRequest::new(COMPANY_NEWS, args.clone()),
                ToolCallRequest::new(COMPANY_FINANCIALS, args),
            ]);
        }

        PlannerDecision::Respond(Self::lookup_summary(first, companies.len(), &research))
    }

    fn lookup_summary(
        company: &CompanyRecord,
        matches: usize,
        research: &[&(String, Value)],
    ) -> String {
        let mut out = match company.ticker_symbol.as_deref() {
            Some(ticker) => format!("Here's what I found about {} ({}).\n\n", company.name, ticker),
            None => format!("Here's what I found about {}.\n\n", company.name),
        };

        let facts = [
            ("Sector", company.sector.clone()),
            ("Industry", company.industry.clone()),
            ("Market cap", company.market_cap_display()),
            ("Employees", company.employees.map(|e| e.to_string())),
            ("Founded", company.founded_year.map(|y| y.to_string())),
            ("Headquarters", company.headquarters.clone()),
        ];
        for (label, value) in facts {
            if let Some(value) = value {
                out.push_str(&format!("- {}: {}\n", label, value));
            }
        }

        if matches > 1 {
            out.push_str(&format!(
                "\n{} companies matched; showing the largest by market cap.\n",
                matches
            ));
        }

        for (name, result) in research {
            let title = match name.as_str() {
                COMPANY_ANALYSIS => "Analysis",
                COMPANY_NEWS => "Recent news",
                _ => "Financials",
            };

            if is_success(result) {
                let content = result["data"]["content"].as_str().unwrap_or_default();
                out.push_str(&format!("\n**{}**\n{}\n", title, content));
            } else {
                out.push_str(&format!(
                    "\n**{}** is unavailable: {}\n",
                    title,
                    result_error(result)
                ));
            }
        }

        out
    }

    fn plan_compare(targets: &[String], results: &[(String, Value)]) -> PlannerDecision {
        match results.iter().find(|(name, _)| name == COMPARE_COMPANIES) {
            None => PlannerDecision::CallTools(vec![ToolCallRequest::new(
                COMPARE_COMPANIES,
                json!({ "companies": targets }),
            )]),
            Some((_, result)) if is_success(result) => PlannerDecision::Respond(format!(
                "Here's how {} compare:\n\n{}",
                targets.join(" and "),
                result["data"]["content"].as_str().unwrap_or_default()
            )),
            Some((_, result)) => PlannerDecision::Respond(format!(
                "I couldn't compare those companies: {}",
                result_error(result)
            )),
        }
    }

    fn plan_filter(sector: &str, results: &[(String, Value)]) -> PlannerDecision {
        match results.iter().find(|(name, _)| name == FILTER_COMPANIES) {
            None => PlannerDecision::CallTools(vec![ToolCallRequest::new(
                FILTER_COMPANIES,
                json!({ "sector": sector, "limit": 10 }),
            )]),
            Some((_, result)) if is_success(result) => {
                let names: Vec<&str> = result["data"]["companies"]
                    .as_array()
                    .map(|items| items.iter().filter_map(|c| c["name"].as_str()).collect())
                    .unwrap_or_default();

                if names.is_empty() {
                    PlannerDecision::Respond(format!(
                        "I couldn't find any companies in the {} sector.",
                        sector
                    ))
                } else {
                    PlannerDecision::Respond(format!(
                        "Companies in the {} sector: {}.",
                        sector,
                        names.join(", ")
                    ))
                }
            }
            Some((_, result)) => PlannerDecision::Respond(format!(
                "I couldn't filter the company database: {}",
                result_error(result)
            )),
        }
    }
}

#[async_trait]
impl Planner for IntentPlanner {
    async fn plan(&self, context: &PlanningContext<'_>) -> Result<PlannerDecision> {
        let text = match context
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .and_then(|m| m.content.as_deref())
        {
            Some(text) => text,
            None => {
                return Ok(PlannerDecision::Respond(
                    "How can I help you research a company today?".to_string(),
                ))
            }
        };

        let results = results_since_last_user(context.messages);

        if results
            .iter()
            .any(|(_, r)| r.get("status").and_then(Value::as_str) == Some("denied"))
        {
            return Ok(PlannerDecision::Respond(CANCEL_MESSAGE.to_string()));
        }

        let decision = match Self::classify(text) {
            Some(Intent::Compare(targets)) => Self::plan_compare(&targets, &results),
            Some(Intent::Filter(sector)) => Self::plan_filter(&sector, &results),
            Some(Intent::Lookup(subject)) => Self::plan_lookup(&subject, &results),
            None => PlannerDecision::Respond(
                "Which company would you like me to look up?".to_string(),
            ),
        };

        Ok(decision)
    }
}
