//! Tool trait and registry
//!
//! Each tool performs one store lookup or one research call, returns a
//! normalized payload and the state updates that payload implies.

pub mod args;

use crate::error::ResearchError;
use crate::llm::ToolSpec;
use crate::models::{default_limit, CompanyFilter, ToolCallRequest, ToolInput, ToolOutput};
use crate::research::{ResearchClient, ResearchKind, ResearchRequest};
use crate::state::StateUpdate;
use crate::store::CompanyStore;
use crate::Result;
use args::decode_args;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub const SEARCH_COMPANIES: &str = "search_companies";
pub const COMPANY_ANALYSIS: &str = "search_company_analysis";
pub const COMPANY_NEWS: &str = "get_company_news";
pub const COMPANY_FINANCIALS: &str = "get_company_financials";
pub const COMPARE_COMPANIES: &str = "compare_companies";
pub const FILTER_COMPANIES: &str = "filter_companies";
pub const COMPANY_DETAILS: &str = "get_company_details";

const MAX_RESULTS: usize = 50;

/// Trait for a single tool
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;
    fn requires_approval(&self) -> bool {
        false
    }
    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool names in registration order.
    pub fn list(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Definitions advertised to the planner model.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Human readable line shown to the user when a call needs approval.
pub fn describe_call(call: &ToolCallRequest) -> String {
    let field = |key: &str| -> Option<String> {
        decode_args::<Value>(&call.arguments)
            .ok()?
            .get(key)?
            .as_str()
            .map(str::to_string)
    };

    match call.name.as_str() {
        SEARCH_COMPANIES => format!(
            "Search database for companies matching: '{}'",
            field("query").unwrap_or_default()
        ),
        COMPANY_ANALYSIS => format!(
            "Get AI analysis for company: '{}'",
            field("company_name").unwrap_or_default()
        ),
        COMPANY_NEWS => format!(
            "Get recent news for company: '{}'",
            field("company_name").unwrap_or_default()
        ),
        COMPANY_FINANCIALS => format!(
            "Get financial data for company: '{}'",
            field("company_name").unwrap_or_default()
        ),
        COMPARE_COMPANIES => match decode_args::<CompareArgs>(&call.arguments)
            .ok()
            .and_then(|a| a.resolve().ok())
        {
            Some(names) => format!(
                "Compare companies: {}",
                names
                    .iter()
                    .map(|n| format!("'{}'", n))
                    .collect::<Vec<_>>()
                    .join(" vs ")
            ),
            None => format!("Execute {} with args: {}", call.name, call.arguments),
        },
        _ => format!("Execute {} with args: {}", call.name, call.arguments),
    }
}

/// Which research lookup a call feeds, if any.
pub fn research_target(call: &ToolCallRequest) -> Option<(ResearchKind, String)> {
    let kind = match call.name.as_str() {
        COMPANY_ANALYSIS => ResearchKind::Analysis,
        COMPANY_NEWS => ResearchKind::News,
        COMPANY_FINANCIALS => ResearchKind::Financials,
        _ => return None,
    };

    let args: CompanyNameArgs = decode_args(&call.arguments).ok()?;
    let name = args.company_name.trim();
    (!name.is_empty()).then(|| (kind, name.to_string()))
}

fn require_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ResearchError::InvalidToolInput(
            "company_name must not be empty".to_string(),
        ));
    }
    Ok(name.to_string())
}

//
// ================= Database tools =================
//

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

pub struct SearchCompaniesTool {
    store: Arc<dyn CompanyStore>,
}

impl SearchCompaniesTool {
    pub fn new(store: Arc<dyn CompanyStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for SearchCompaniesTool {
    fn name(&self) -> &'static str {
        SEARCH_COMPANIES
    }

    fn description(&self) -> &'static str {
        "Search the company database by company name or ticker symbol. Always call this first for any company query."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Company name or ticker symbol"},
                "limit": {"type": "integer", "description": "Maximum number of results", "default": 10}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let args: SearchArgs = decode_args(&input.parameters)?;
        let limit = args.limit.unwrap_or_else(default_limit).clamp(1, MAX_RESULTS);

        let companies = self.store.search(&args.query, limit).await?;
        debug!(query = %args.query, hits = companies.len(), "Company search finished");

        let mut events = vec![StateUpdate::CompaniesFound {
            companies: companies.clone(),
        }];
        if let Some(first) = companies.first() {
            events.push(StateUpdate::CompanySelected {
                company: first.clone(),
            });
        }

        Ok(ToolOutput::ok(
            json!({ "count": companies.len(), "companies": companies }),
            events,
        ))
    }
}

pub struct FilterCompaniesTool {
    store: Arc<dyn CompanyStore>,
}

impl FilterCompaniesTool {
    pub fn new(store: Arc<dyn CompanyStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for FilterCompaniesTool {
    fn name(&self) -> &'static str {
        FILTER_COMPANIES
    }

    fn description(&self) -> &'static str {
        "Filter companies by sector, industry and market cap range (whole currency units)."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sector": {"type": "string"},
                "industry": {"type": "string"},
                "min_market_cap": {"type": "integer"},
                "max_market_cap": {"type": "integer"},
                "limit": {"type": "integer", "default": 10}
            }
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let mut filter: CompanyFilter = decode_args(&input.parameters)?;
        filter.limit = filter.limit.clamp(1, MAX_RESULTS);

        let companies = self.store.filter(&filter).await?;

        Ok(ToolOutput::ok(
            json!({ "count": companies.len(), "companies": companies }),
            vec![StateUpdate::CompaniesFound { companies }],
        ))
    }
}

#[derive(Deserialize)]
struct DetailsArgs {
    #[serde(default)]
    company_id: Option<i64>,
    #[serde(default)]
    ticker: Option<String>,
}

pub struct CompanyDetailsTool {
    store: Arc<dyn CompanyStore>,
}

impl CompanyDetailsTool {
    pub fn new(store: Arc<dyn CompanyStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for CompanyDetailsTool {
    fn name(&self) -> &'static str {
        COMPANY_DETAILS
    }

    fn description(&self) -> &'static str {
        "Get the full database record of one company by id or ticker symbol."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "company_id": {"type": "integer"},
                "ticker": {"type": "string"}
            }
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let args: DetailsArgs = decode_args(&input.parameters)?;

        let found = match (args.company_id, args.ticker.as_deref()) {
            (Some(id), _) => self.store.get_by_id(id).await?,
            (None, Some(ticker)) if !ticker.trim().is_empty() => {
                self.store.get_by_ticker(ticker).await?
            }
            _ => {
                return Err(ResearchError::InvalidToolInput(
                    "either company_id or ticker is required".to_string(),
                ))
            }
        };

        let company = found.ok_or_else(|| ResearchError::ToolError("Company not found".to_string()))?;

        Ok(ToolOutput::ok(
            json!({
                "company": company,
                "market_cap_display": company.market_cap_display(),
            }),
            vec![StateUpdate::CompanySelected { company }],
        ))
    }
}

//
// ================= Research tools =================
//

#[derive(Deserialize)]
struct CompanyNameArgs {
    company_name: String,
}

#[derive(Deserialize)]
struct AnalysisArgs {
    company_name: String,
    #[serde(default)]
    specific_info: Option<String>,
}

#[derive(Deserialize)]
struct NewsArgs {
    company_name: String,
    #[serde(default)]
    days: Option<u32>,
}

/// One research tool per `ResearchKind`; they differ only in arguments and
/// in the update their text feeds.
pub struct ResearchTool {
    kind: ResearchKind,
    research: Arc<dyn ResearchClient>,
}

impl ResearchTool {
    pub fn new(kind: ResearchKind, research: Arc<dyn ResearchClient>) -> Self {
        Self { kind, research }
    }

    fn request(&self, parameters: &Value) -> Result<ResearchRequest> {
        let request = match self.kind {
            ResearchKind::Analysis => {
                let a: AnalysisArgs = decode_args(parameters)?;
                ResearchRequest {
                    focus: a.specific_info,
                    ..ResearchRequest::new(require_name(&a.company_name)?, self.kind)
                }
            }
            ResearchKind::News => {
                let a: NewsArgs = decode_args(parameters)?;
                ResearchRequest {
                    days: a.days.filter(|d| *d > 0),
                    ..ResearchRequest::new(require_name(&a.company_name)?, self.kind)
                }
            }
            ResearchKind::Financials => {
                let a: CompanyNameArgs = decode_args(parameters)?;
                ResearchRequest::new(require_name(&a.company_name)?, self.kind)
            }
        };
        Ok(request)
    }
}

#[async_trait::async_trait]
impl Tool for ResearchTool {
    fn name(&self) -> &'static str {
        match self.kind {
            ResearchKind::Analysis => COMPANY_ANALYSIS,
            ResearchKind::News => COMPANY_NEWS,
            ResearchKind::Financials => COMPANY_FINANCIALS,
        }
    }

    fn description(&self) -> &'static str {
        match self.kind {
            ResearchKind::Analysis => {
                "Get a detailed business analysis of a company: strategy, competitive position and market trends."
            }
            ResearchKind::News => "Get recent news and developments about a company.",
            ResearchKind::Financials => {
                "Get financial performance of a company: revenue, profits, stock price and market cap."
            }
        }
    }

    fn parameters(&self) -> Value {
        let mut properties = json!({
            "company_name": {"type": "string", "description": "Full company name"}
        });
        match self.kind {
            ResearchKind::Analysis => {
                properties["specific_info"] =
                    json!({"type": "string", "description": "Optional aspect to focus on"});
            }
            ResearchKind::News => {
                properties["days"] =
                    json!({"type": "integer", "description": "Look-back window in days", "default": 7});
            }
            ResearchKind::Financials => {}
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": ["company_name"]
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let request = self.request(&input.parameters)?;
        let report = self.research.research(&request).await?;

        let company_name = request.company_name;
        let content = report.content.clone();
        let event = match self.kind {
            ResearchKind::Analysis => StateUpdate::AnalysisReady { company_name, content },
            ResearchKind::News => StateUpdate::NewsReady { company_name, content },
            ResearchKind::Financials => StateUpdate::FinancialsReady { company_name, content },
        };

        Ok(ToolOutput::ok(serde_json::to_value(&report)?, vec![event]))
    }
}

#[derive(Deserialize)]
struct CompareArgs {
    #[serde(default)]
    companies: Option<Vec<String>>,
    #[serde(default)]
    company1: Option<String>,
    #[serde(default)]
    company2: Option<String>,
}

impl CompareArgs {
    fn resolve(self) -> Result<Vec<String>> {
        let raw = match self.companies {
            Some(list) if !list.is_empty() => list,
            _ => self.company1.into_iter().chain(self.company2).collect(),
        };

        let mut names: Vec<String> = Vec::with_capacity(raw.len());
        for name in raw {
            let name = name.trim().to_string();
            if !name.is_empty() && !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                names.push(name);
            }
        }

        if names.len() < 2 {
            return Err(ResearchError::InvalidToolInput(
                "compare_companies needs at least two distinct companies".to_string(),
            ));
        }
        Ok(names)
    }
}

pub struct CompareCompaniesTool {
    research: Arc<dyn ResearchClient>,
}

impl CompareCompaniesTool {
    pub fn new(research: Arc<dyn ResearchClient>) -> Self {
        Self { research }
    }
}

#[async_trait::async_trait]
impl Tool for CompareCompaniesTool {
    fn name(&self) -> &'static str {
        COMPARE_COMPANIES
    }

    fn description(&self) -> &'static str {
        "Compare two or more companies side by side."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "companies": {"type": "array", "items": {"type": "string"}, "minItems": 2},
                "company1": {"type": "string"},
                "company2": {"type": "string"}
            }
        })
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let companies = decode_args::<CompareArgs>(&input.parameters)?.resolve()?;
        let report = self.research.compare(&companies).await?;

        let event = StateUpdate::ComparisonReady {
            companies,
            content: report.content.clone(),
        };

        Ok(ToolOutput::ok(serde_json::to_value(&report)?, vec![event]))
    }
}

/// Registry with every company research tool.
pub fn create_default_registry(
    store: Arc<dyn CompanyStore>,
    research: Arc<dyn ResearchClient>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(SearchCompaniesTool::new(store.clone())));
    registry.register(Arc::new(ResearchTool::new(
        ResearchKind::Analysis,
        research.clone(),
    )));
    registry.register(Arc::new(ResearchTool::new(ResearchKind::News, research.clone())));
    registry.register(Arc::new(ResearchTool::new(
        ResearchKind::Financials,
        research.clone(),
    )));
    registry.register(Arc::new(CompareCompaniesTool::new(research)));
    registry.register(Arc::new(FilterCompaniesTool::new(store.clone())));
    registry.register(Arc::new(CompanyDetailsTool::new(store)));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCompanyStore;
    use crate::testing::StubResearch;

    fn registry() -> (ToolRegistry, Arc<StubResearch>) {
        let research = Arc::new(StubResearch::new());
        let registry =
            create_default_registry(Arc::new(InMemoryCompanyStore::seeded()), research.clone());
        (registry, research)
    }

    fn input(name: &str, parameters: Value) -> ToolInput {
        ToolInput {
            tool_name: name.to_string(),
            parameters,
        }
    }

    #[tokio::test]
    async fn test_search_selects_first_hit() {
        let (registry, _) = registry();
        let tool = registry.get(SEARCH_COMPANIES).unwrap();

        let output = tool
            .execute(&input(SEARCH_COMPANIES, json!({"query": "Apple"})))
            .await
            .unwrap();

        assert_eq!(output.data["count"], 1);
        assert_eq!(output.events.len(), 2);
        match &output.events[1] {
            StateUpdate::CompanySelected { company } => {
                assert_eq!(company.ticker_symbol.as_deref(), Some("AAPL"));
                assert_eq!(company.market_cap_display().as_deref(), Some("$3000.0B"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_search_without_hits_only_lists() {
        let (registry, _) = registry();
        let tool = registry.get(SEARCH_COMPANIES).unwrap();

        let output = tool
            .execute(&input(SEARCH_COMPANIES, json!("{\"query\": \"Globex\"}")))
            .await
            .unwrap();

        assert_eq!(
            output.events,
            vec![StateUpdate::CompaniesFound { companies: vec![] }]
        );
    }

    #[tokio::test]
    async fn test_malformed_arguments_are_rejected() {
        let (registry, research) = registry();
        let tool = registry.get(COMPANY_NEWS).unwrap();

        let err = tool
            .execute(&input(COMPANY_NEWS, json!("company_name=Apple")))
            .await
            .unwrap_err();

        assert!(matches!(err, ResearchError::InvalidToolInput(_)));
        assert!(research.calls().is_empty());
    }

    #[tokio::test]
    async fn test_research_tools_emit_matching_updates() {
        let (registry, research) = registry();

        let news = registry
            .get(COMPANY_NEWS)
            .unwrap()
            .execute(&input(COMPANY_NEWS, json!({"company_name": "Tesla Inc.", "days": 30})))
            .await
            .unwrap();
        assert_eq!(
            news.events[0],
            StateUpdate::NewsReady {
                company_name: "Tesla Inc.".to_string(),
                content: "news report for Tesla Inc.".to_string(),
            }
        );

        let financials = registry
            .get(COMPANY_FINANCIALS)
            .unwrap()
            .execute(&input(COMPANY_FINANCIALS, json!({"company_name": "Tesla Inc."})))
            .await
            .unwrap();
        assert!(matches!(financials.events[0], StateUpdate::FinancialsReady { .. }));
        assert_eq!(financials.data["subject"], "Tesla Inc.");

        assert_eq!(
            research.calls(),
            vec!["news:Tesla Inc.".to_string(), "financials:Tesla Inc.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_compare_accepts_both_argument_forms() {
        let (registry, research) = registry();
        let tool = registry.get(COMPARE_COMPANIES).unwrap();

        let pair = tool
            .execute(&input(
                COMPARE_COMPANIES,
                json!({"company1": "Microsoft", "company2": "Google"}),
            ))
            .await
            .unwrap();
        match &pair.events[0] {
            StateUpdate::ComparisonReady { companies, .. } => {
                assert_eq!(companies, &vec!["Microsoft".to_string(), "Google".to_string()]);
            }
            other => panic!("unexpected event {:?}", other),
        }

        let list = tool
            .execute(&input(
                COMPARE_COMPANIES,
                json!({"companies": ["Apple", "Tesla", "NVIDIA"]}),
            ))
            .await
            .unwrap();
        assert_eq!(list.events.len(), 1);

        let err = tool
            .execute(&input(COMPARE_COMPANIES, json!({"companies": ["Apple", "apple"]})))
            .await
            .unwrap_err();
        assert!(matches!(err, ResearchError::InvalidToolInput(_)));
        assert_eq!(research.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_details_and_filter() {
        let (registry, _) = registry();

        let details = registry
            .get(COMPANY_DETAILS)
            .unwrap()
            .execute(&input(COMPANY_DETAILS, json!({"ticker": "nvda"})))
            .await
            .unwrap();
        assert_eq!(details.data["company"]["name"], "NVIDIA Corporation");

        let missing = registry
            .get(COMPANY_DETAILS)
            .unwrap()
            .execute(&input(COMPANY_DETAILS, json!({"company_id": 4040})))
            .await;
        assert!(matches!(missing, Err(ResearchError::ToolError(_))));

        let filtered = registry
            .get(FILTER_COMPANIES)
            .unwrap()
            .execute(&input(FILTER_COMPANIES, json!({"sector": "energy"})))
            .await
            .unwrap();
        assert_eq!(filtered.data["count"], 1);
    }

    #[test]
    fn test_describe_call() {
        let search = ToolCallRequest::new(SEARCH_COMPANIES, json!({"query": "Apple"}));
        assert_eq!(
            describe_call(&search),
            "Search database for companies matching: 'Apple'"
        );

        let compare = ToolCallRequest::new(
            COMPARE_COMPANIES,
            json!({"company1": "Microsoft", "company2": "Google"}),
        );
        assert_eq!(
            describe_call(&compare),
            "Compare companies: 'Microsoft' vs 'Google'"
        );

        let other = ToolCallRequest::new(FILTER_COMPANIES, json!({"sector": "Energy"}));
        assert!(describe_call(&other).starts_with("Execute filter_companies with args:"));
    }

    #[test]
    fn test_registry_specs_keep_registration_order() {
        let (registry, _) = registry();
        let names: Vec<String> = registry.specs().into_iter().map(|s| s.name).collect();

        assert_eq!(names.first().map(String::as_str), Some(SEARCH_COMPANIES));
        assert_eq!(names.len(), 7);
        assert_eq!(registry.list().len(), 7);
    }

    #[test]
    fn test_research_target() {
        let call = ToolCallRequest::new(COMPANY_NEWS, json!({"company_name": " Apple Inc. "}));
        assert_eq!(
            research_target(&call),
            Some((ResearchKind::News, "Apple Inc.".to_string()))
        );
        assert!(research_target(&ToolCallRequest::new(SEARCH_COMPANIES, json!({}))).is_none());
    }
}
