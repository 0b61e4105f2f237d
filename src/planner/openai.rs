//! Chat-completions planner
//!
//! Hands the transcript and the tool definitions to the model and turns its
//! answer into a `PlannerDecision`.

use super::{PlannerDecision, PlanningContext};
use crate::error::ResearchError;
use crate::llm::{ChatMessage, CompletionRequest, LlmClient, LlmConfig, ToolSpec};
use crate::state::SharedState;
use crate::Result;
use async_trait::async_trait;
use tracing::debug;

const PLANNER_MAX_TOKENS: u32 = 1024;
const PLANNER_TEMPERATURE: f32 = 0.3;

pub struct LlmPlanner {
    client: LlmClient,
    tools: Vec<ToolSpec>,
    language: String,
}

impl LlmPlanner {
    pub fn new(config: LlmConfig, tools: Vec<ToolSpec>) -> Result<Self> {
        Ok(Self {
            client: LlmClient::new(config)?,
            tools,
            language: "english".to_string(),
        })
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Build the system prompt, including what the UI currently shows.
    fn system_prompt(&self, state: &SharedState) -> String {
        let mut prompt = format!(
            r#"You are a helpful company research assistant. You have access to:

1. A company database (search_companies, filter_companies, get_company_details)
2. Research tools for company analysis, news and financials
3. A comparison tool for two or more companies

Tool results are shown to the user automatically; you never need to repeat raw data.

WORKFLOW - when the user asks about a company:
1. ALWAYS call search_companies first to get the database record.
2. If companies are found, research the FIRST result using its exact name:
   call search_company_analysis, get_company_news and get_company_financials.
   You may request all three in one step.
3. Finish with a concise answer combining the database record and the research.

When the user asks to compare companies, call compare_companies with every
company named, then summarize the comparison. Do not search or research each
company separately.

RULES:
- If a tool returns an error, say so briefly and continue with what you have.
- If a tool result has status "denied", the user rejected that call: do not retry
  it, acknowledge the cancellation and ask how else you can help.
- Never invent figures that no tool returned.

Talk in {}."#,
            self.language
        );

        if let Some(company) = &state.selected_company {
            prompt.push_str(&format!(
                "\n\nThe user is currently looking at {}{}.",
                company.name,
                company
                    .ticker_symbol
                    .as_deref()
                    .map(|t| format!(" ({})", t))
                    .unwrap_or_default()
            ));
        }

        prompt
    }
}

#[async_trait]
impl super::Planner for LlmPlanner {
    async fn plan(&self, context: &PlanningContext<'_>) -> Result<PlannerDecision> {
        let mut messages = Vec::with_capacity(context.messages.len() + 1);
        messages.push(ChatMessage::system(self.system_prompt(context.state)));
        messages.extend_from_slice(context.messages);

        let completion = self
            .client
            .complete(CompletionRequest {
                messages: &messages,
                tools: &self.tools,
                max_tokens: PLANNER_MAX_TOKENS,
                temperature: PLANNER_TEMPERATURE,
            })
            .await?;

        debug!(
            thread_id = context.thread_id,
            iteration = context.iteration,
            tool_calls = completion.tool_calls.len(),
            "Planner step complete"
        );

        if !completion.tool_calls.is_empty() {
            return Ok(PlannerDecision::CallTools(completion.tool_calls));
        }

        completion
            .content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .map(PlannerDecision::Respond)
            .ok_or_else(|| ResearchError::PlanningError("Empty planner output".to_string()))
    }
}
