//! Runtime configuration from the environment
//!
//! Binaries call `dotenv` first, then `AppConfig::from_env`.

use crate::agent::{Orchestrator, DEFAULT_MAX_ITERATIONS};
use crate::error::ResearchError;
use crate::execution::{ApprovalPolicy, ExecutionEngine, DEFAULT_TOOL_TIMEOUT_SECS};
use crate::llm::{LlmConfig, DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::planner::{IntentPlanner, LlmPlanner, Planner};
use crate::research::{LlmResearchClient, ResearchClient};
use crate::state::{InMemorySessionStore, StateChannel};
use crate::store::{CompanyStore, InMemoryCompanyStore, PgCompanyStore};
use crate::tools::create_default_registry;
use crate::Result;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub planner_llm: LlmConfig,
    pub research_llm: LlmConfig,
    pub database_url: Option<String>,
    pub port: u16,
    pub max_iterations: u32,
    pub tool_timeout_secs: u64,
    pub approval_policy: ApprovalPolicy,
    pub language: String,
}

fn parse_var<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(value) => value.parse().map_err(|_| {
            ResearchError::ConfigError(format!("{} has an invalid value: {}", key, value))
        }),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let planner_llm = LlmConfig {
            api_key: var("OPENAI_API_KEY").unwrap_or_default(),
            api_base: var("OPENAI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            ..LlmConfig::new("")
        };

        let research_llm = LlmConfig {
            api_key: var("RESEARCH_API_KEY").unwrap_or_else(|| planner_llm.api_key.clone()),
            api_base: var("RESEARCH_API_BASE").unwrap_or_else(|| planner_llm.api_base.clone()),
            model: var("RESEARCH_MODEL").unwrap_or_else(|| planner_llm.model.clone()),
            ..LlmConfig::new("")
        };

        Ok(Self {
            planner_llm,
            research_llm,
            database_url: var("DATABASE_URL").or_else(|| var("POSTGRES_URL")),
            port: parse_var(
                "PORT",
                var("PORT").or_else(|| var("API_PORT")),
                DEFAULT_PORT,
            )?,
            max_iterations: parse_var(
                "MAX_AGENT_ITERATIONS",
                var("MAX_AGENT_ITERATIONS"),
                DEFAULT_MAX_ITERATIONS,
            )?,
            tool_timeout_secs: parse_var(
                "TOOL_TIMEOUT_SECS",
                var("TOOL_TIMEOUT_SECS"),
                DEFAULT_TOOL_TIMEOUT_SECS,
            )?,
            approval_policy: var("APPROVAL_REQUIRED_TOOLS")
                .map(|v| ApprovalPolicy::parse(&v))
                .unwrap_or_default(),
            language: var("AGENT_LANGUAGE").unwrap_or_else(|| "english".to_string()),
        })
    }

    /// Wire store, research client, tools and planner into an orchestrator.
    pub fn build_orchestrator(&self) -> Result<Orchestrator> {
        let store: Arc<dyn CompanyStore> = match &self.database_url {
            Some(url) => {
                info!("Using Postgres company store");
                Arc::new(PgCompanyStore::connect_lazy(url)?)
            }
            None => {
                warn!("DATABASE_URL not set, using the in-memory demo company store");
                Arc::new(InMemoryCompanyStore::seeded())
            }
        };

        if !self.research_llm.is_configured() {
            warn!("No research API key configured; research calls will fail");
        }
        let research: Arc<dyn ResearchClient> =
            Arc::new(LlmResearchClient::new(self.research_llm.clone())?);

        let registry = create_default_registry(store, research);

        let planner: Box<dyn Planner> = if self.planner_llm.is_configured() {
            info!(model = %self.planner_llm.model, "Using chat-completions planner");
            Box::new(
                LlmPlanner::new(self.planner_llm.clone(), registry.specs())?
                    .with_language(self.language.clone()),
            )
        } else {
            warn!("OPENAI_API_KEY not set, using the keyword intent planner");
            Box::new(IntentPlanner)
        };

        let engine = ExecutionEngine::new(registry)
            .with_approval_policy(self.approval_policy.clone())
            .with_tool_timeout(Duration::from_secs(self.tool_timeout_secs));

        Ok(Orchestrator::new(
            planner,
            engine,
            Box::new(InMemorySessionStore::new()),
            StateChannel::default(),
        )
        .with_max_iterations(self.max_iterations))
    }
}
