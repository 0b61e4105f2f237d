//! Company Research Agent
//!
//! A conversational assistant that:
//! - Looks companies up in a Postgres-backed company store
//! - Fetches analysis, news and financials from an external research provider
//! - Chains tool calls through a planner with an optional human approval gate
//! - Streams every state change to the UI over a shared state channel
//!
//! UNIFIED LOOP:
//! INPUT → PLAN → APPROVAL? → EXECUTE → OBSERVE → REPLAN? → COMPLETE

pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod llm;
pub mod models;
pub mod planner;
pub mod research;
pub mod state;
pub mod store;
pub mod tools;

#[cfg(test)]
mod testing;

pub use error::Result;

// Re-export common types
pub use models::*;
