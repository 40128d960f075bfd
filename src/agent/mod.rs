//! Agent module for agentd
//!
//! This module contains the turn orchestrator and the message filters it
//! applies before history or backend requests are assembled.

pub mod orchestrator;
pub mod sanitize;

pub use orchestrator::{PreparedTurn, TurnEvent, TurnOrchestrator, TurnRecord, TurnReply};
