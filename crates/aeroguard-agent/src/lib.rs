//! `aeroguard-agent` – the reasoning engine.
//!
//! [`Agent`][agent_loop::Agent] drives the Think → Act → Observe → Decide
//! state machine: the configured [`Decider`][llm::Decider] proposes the next
//! step, tools run through the typed registry, and every observation updates
//! the tracked METAR and runway heading. The terminal draft then passes
//! through the guardrail pipeline before anything reaches the caller.
//!
//! # Modules
//!
//! - [`agent_loop`] – [`Agent`][agent_loop::Agent], [`AgentState`][agent_loop::AgentState],
//!   [`CancelToken`][agent_loop::CancelToken]; `run` and the line-delimited
//!   `run_stream` variant.
//! - [`llm`] – the [`Decider`][llm::Decider] seam with the deterministic
//!   [`PatternDecider`][llm::PatternDecider] and the Ollama/OpenAI-compatible
//!   [`ExternalDecider`][llm::ExternalDecider].
//! - [`telemetry`] – `tracing` subscriber setup with optional OTLP export.

pub mod agent_loop;
pub mod llm;
pub mod telemetry;

pub use agent_loop::{Agent, AgentState, CancelToken};
pub use llm::{Decider, ExternalDecider, PatternDecider};
