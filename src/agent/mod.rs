//! Main orchestrator - drives one conversational turn
//!
//! INPUT → PLAN → (APPROVAL?) → EXECUTE → OBSERVE → PLAN … → COMPLETE

use crate::error::ResearchError;
use crate::execution::ExecutionEngine;
use crate::llm::ChatMessage;
use crate::models::{ExecutionStatus, Observation, ToolCallRequest, TurnPhase, TurnResult, TurnStatus};
use crate::planner::{Planner, PlannerDecision, PlanningContext};
use crate::state::{PendingApproval, PendingToolCall, Session, SessionStore, StateChannel, StateUpdate, UiIntent};
use crate::tools::{describe_call, research_target, COMPANY_ANALYSIS, COMPANY_FINANCIALS, COMPANY_NEWS};
use crate::Result;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_ITERATIONS: u32 = 8;

pub const FALLBACK_MESSAGE: &str =
    "I'm sorry, I wasn't able to complete that request. Please try again.";

const APPROVAL_CLARIFICATION: &str =
    "There are tool calls waiting for your approval. Reply 'approve' to run them or 'deny' to cancel.";

const APPROVE_WORDS: &[&str] = &["approve", "approved", "yes", "y", "proceed", "ok", "okay", "continue"];
const DENY_WORDS: &[&str] = &["deny", "denied", "no", "n", "cancel", "stop", "reject"];

/// Read a chat reply as an approval decision. Mixed or unrelated replies
/// are not a decision.
pub fn parse_approval_reply(text: &str) -> Option<bool> {
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| c.is_ascii_punctuation())
                .to_lowercase()
        })
        .collect();

    let approve = words.iter().any(|w| APPROVE_WORDS.contains(&w.as_str()));
    let deny = words.iter().any(|w| DENY_WORDS.contains(&w.as_str()));

    match (approve, deny) {
        (true, false) => Some(true),
        (false, true) => Some(false),
        _ => None,
    }
}

/// Order in which one batch's results are folded into state.
fn apply_rank(call: &ToolCallRequest) -> u8 {
    match call.name.as_str() {
        COMPANY_ANALYSIS => 1,
        COMPANY_NEWS => 2,
        COMPANY_FINANCIALS => 3,
        _ => 0,
    }
}

/// Mutable working copy of a session for the duration of one call.
struct Turn {
    session: Session,
    events: Vec<StateUpdate>,
    trace: Vec<String>,
    iterations: u32,
}

impl Turn {
    fn new(session: Session) -> Self {
        Self {
            session,
            events: Vec::new(),
            trace: Vec::new(),
            iterations: 0,
        }
    }
}

/// Main orchestrator that coordinates planner, tools and shared state
pub struct Orchestrator {
    planner: Box<dyn Planner>,
    execution_engine: ExecutionEngine,
    sessions: Box<dyn SessionStore>,
    channel: StateChannel,
    max_iterations: u32,
}

impl Orchestrator {
    pub fn new(
        planner: Box<dyn Planner>,
        execution_engine: ExecutionEngine,
        sessions: Box<dyn SessionStore>,
        channel: StateChannel,
    ) -> Self {
        Self {
            planner,
            execution_engine,
            sessions,
            channel,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn channel(&self) -> &StateChannel {
        &self.channel
    }

    /// Handle one user chat message.
    pub async fn run_turn(&self, thread_id: &str, message: &str) -> Result<TurnResult> {
        let session = self.sessions.load(thread_id).await?;
        let mut turn = Turn::new(session);

        info!(thread_id, message = %message, "Orchestrator: turn received");
        turn.trace.push("INPUT: User message received".to_string());

        if let Some(pending) = turn.session.state.pending_approval.clone() {
            return match parse_approval_reply(message) {
                Some(approved) => {
                    turn.trace
                        .push(format!("APPROVAL: chat reply read as approved={}", approved));
                    self.resolve_pending(turn, pending, approved).await
                }
                None => {
                    turn.trace
                        .push("APPROVAL: reply was not a decision, still pending".to_string());
                    Ok(Self::into_result(
                        turn,
                        TurnStatus::AwaitingApproval,
                        APPROVAL_CLARIFICATION.to_string(),
                    ))
                }
            };
        }

        turn.session.messages.push(ChatMessage::user(message));
        self.drive(turn).await
    }

    /// Apply one UI intent.
    pub async fn handle_intent(&self, thread_id: &str, intent: UiIntent) -> Result<TurnResult> {
        debug!(thread_id, ?intent, "Applying UI intent");

        match intent {
            UiIntent::ApprovalDecision { approved } => {
                self.resolve_approval(thread_id, approved).await
            }
            UiIntent::SelectCompany { company } => {
                self.apply_ui_update(thread_id, StateUpdate::CompanySelected { company })
                    .await
            }
            UiIntent::HideCompanyCard => {
                self.apply_ui_update(thread_id, StateUpdate::CompanyCardHidden)
                    .await
            }
        }
    }

    /// Approve or deny the calls waiting on this thread.
    pub async fn resolve_approval(&self, thread_id: &str, approved: bool) -> Result<TurnResult> {
        let session = self.sessions.load(thread_id).await?;
        let pending = session
            .state
            .pending_approval
            .clone()
            .ok_or_else(|| ResearchError::NoPendingApproval(thread_id.to_string()))?;

        let mut turn = Turn::new(session);
        turn.trace
            .push(format!("APPROVAL: decision received, approved={}", approved));
        self.resolve_pending(turn, pending, approved).await
    }

    async fn apply_ui_update(&self, thread_id: &str, update: StateUpdate) -> Result<TurnResult> {
        let session = self.sessions.load(thread_id).await?;
        let mut turn = Turn::new(session);

        turn.trace.push(format!("INTENT: {}", update.action_name()));
        self.emit(&mut turn, update);
        self.sessions.save(&turn.session).await?;

        Ok(Self::into_result(turn, TurnStatus::Completed, String::new()))
    }

    async fn resolve_pending(
        &self,
        mut turn: Turn,
        pending: PendingApproval,
        approved: bool,
    ) -> Result<TurnResult> {
        let calls: Vec<ToolCallRequest> =
            pending.calls.iter().map(PendingToolCall::to_request).collect();

        self.emit(&mut turn, StateUpdate::ApprovalCleared { approved });

        if approved {
            info!(thread_id = %turn.session.thread_id, calls = calls.len(), "Pending tool calls approved");
            self.execute(&mut turn, &calls).await;
        } else {
            info!(thread_id = %turn.session.thread_id, calls = calls.len(), "Pending tool calls denied");
            for call in &calls {
                let observation = ExecutionEngine::denied(call);
                turn.session.messages.push(ChatMessage::tool_result(
                    call.id.clone(),
                    observation.result_content(),
                ));
                turn.trace.push(format!("OBSERVE: {} denied", call.name));
            }
        }

        self.drive(turn).await
    }

    /// Planning loop. Always ends with a saved session and a TurnResult.
    async fn drive(&self, mut turn: Turn) -> Result<TurnResult> {
        loop {
            if turn.iterations >= self.max_iterations {
                warn!(
                    thread_id = %turn.session.thread_id,
                    max_iterations = self.max_iterations,
                    "Iteration limit reached"
                );
                turn.trace.push(format!(
                    "COMPLETE: iteration limit of {} reached",
                    self.max_iterations
                ));
                return self.finish(turn, TurnStatus::Fallback, FALLBACK_MESSAGE.to_string()).await;
            }

            turn.iterations += 1;
            turn.session.phase = TurnPhase::Planning;

            let decision = {
                let context = PlanningContext {
                    thread_id: &turn.session.thread_id,
                    messages: &turn.session.messages,
                    state: &turn.session.state,
                    iteration: turn.iterations,
                };
                self.planner.plan(&context).await
            };

            let calls = match decision {
                Ok(PlannerDecision::Respond(reply)) if !reply.trim().is_empty() => {
                    turn.trace.push("COMPLETE: planner responded".to_string());
                    return self.finish(turn, TurnStatus::Completed, reply).await;
                }
                Ok(PlannerDecision::CallTools(calls)) if !calls.is_empty() => calls,
                Ok(_) => {
                    warn!(thread_id = %turn.session.thread_id, "Planner returned empty output");
                    turn.trace.push("PLAN: empty planner output".to_string());
                    return self.finish(turn, TurnStatus::Fallback, FALLBACK_MESSAGE.to_string()).await;
                }
                Err(e) => {
                    warn!(thread_id = %turn.session.thread_id, error = %e, "Planner failed");
                    turn.trace.push(format!("PLAN: planner error: {}", e));
                    return self.finish(turn, TurnStatus::Fallback, FALLBACK_MESSAGE.to_string()).await;
                }
            };

            turn.trace.push(format!(
                "PLAN: {} tool call(s): {}",
                calls.len(),
                calls
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
            turn.session
                .messages
                .push(ChatMessage::assistant_tool_calls(calls.clone()));

            if calls
                .iter()
                .any(|call| self.execution_engine.requires_approval(call))
            {
                return self.suspend(turn, calls).await;
            }

            self.execute(&mut turn, &calls).await;
        }
    }

    /// Park the whole batch until the user decides.
    async fn suspend(&self, mut turn: Turn, calls: Vec<ToolCallRequest>) -> Result<TurnResult> {
        let pending: Vec<PendingToolCall> = calls
            .iter()
            .map(|call| PendingToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                description: describe_call(call),
                arguments: call.arguments.clone(),
            })
            .collect();

        let reply = format!(
            "The following actions need your approval:\n{}\n\nReply 'approve' to continue or 'deny' to cancel.",
            pending
                .iter()
                .map(|p| format!("- {}", p.description))
                .collect::<Vec<_>>()
                .join("\n")
        );

        info!(thread_id = %turn.session.thread_id, calls = pending.len(), "Awaiting tool approval");
        turn.trace
            .push(format!("APPROVAL: {} call(s) awaiting decision", pending.len()));

        self.emit(&mut turn, StateUpdate::ApprovalRequested { calls: pending });
        turn.session.phase = TurnPhase::ToolPending;
        self.sessions.save(&turn.session).await?;

        Ok(Self::into_result(turn, TurnStatus::AwaitingApproval, reply))
    }

    /// Run a batch, record results in the transcript and fold their updates
    /// into state.
    async fn execute(&self, turn: &mut Turn, calls: &[ToolCallRequest]) {
        turn.session.phase = TurnPhase::Executing;

        for call in calls {
            if let Some((_, company_name)) = research_target(call) {
                let research = &turn.session.state.research;
                if !(research.is_researching && research.is_for(&company_name)) {
                    self.emit(turn, StateUpdate::ResearchStarted { company_name });
                }
            }
        }

        let observations = self.execution_engine.execute_calls(calls).await;

        for obs in &observations {
            turn.trace.push(format!(
                "OBSERVE: {} ({:?}) - {} ms",
                obs.call.name, obs.status, obs.execution_time_ms
            ));
            turn.session
                .messages
                .push(ChatMessage::tool_result(obs.call.id.clone(), obs.result_content()));
        }

        let mut ordered: Vec<&Observation> = observations.iter().collect();
        ordered.sort_by_key(|obs| apply_rank(&obs.call));

        for obs in ordered
            .iter()
            .filter(|obs| obs.status == ExecutionStatus::Success)
        {
            for update in &obs.events {
                self.emit(turn, update.clone());
            }
        }

        for obs in ordered
            .iter()
            .filter(|obs| obs.status != ExecutionStatus::Success)
        {
            if let Some((_, company_name)) = research_target(&obs.call) {
                let error = obs.tool_output["error"]
                    .as_str()
                    .unwrap_or("research failed")
                    .to_string();
                self.emit(turn, StateUpdate::ResearchFailed { company_name, error });
            }
        }
    }

    async fn finish(&self, mut turn: Turn, status: TurnStatus, reply: String) -> Result<TurnResult> {
        if turn.session.state.research.is_researching {
            if let Some(company_name) = turn.session.state.research.company_name.clone() {
                self.emit(&mut turn, StateUpdate::ResearchFinished { company_name });
            }
        }

        turn.session.messages.push(ChatMessage::assistant(reply.clone()));
        turn.session.phase = TurnPhase::Done;
        self.sessions.save(&turn.session).await?;

        info!(
            thread_id = %turn.session.thread_id,
            status = ?status,
            iterations = turn.iterations,
            events = turn.events.len(),
            "Orchestrator: turn complete"
        );

        Ok(Self::into_result(turn, status, reply))
    }

    /// Fold into the projection, then publish with the next sequence number.
    fn emit(&self, turn: &mut Turn, update: StateUpdate) {
        turn.session.state.apply(&update);
        turn.session.last_seq += 1;
        self.channel
            .publish(&turn.session.thread_id, turn.session.last_seq, update.clone());
        turn.events.push(update);
    }

    fn into_result(turn: Turn, status: TurnStatus, reply: String) -> TurnResult {
        TurnResult {
            thread_id: turn.session.thread_id,
            status,
            reply,
            events: turn.events,
            state: turn.session.state,
            iterations: turn.iterations,
            reasoning_trace: turn.trace,
        }
    }
}
