//! [`Agent`] – the Think → Act → Observe → Decide orchestrator.
//!
//! Each iteration asks the [`Decider`] for the next step, dispatches the
//! requested tool through the typed registry, records the observation in the
//! transcript, and updates the tracked METAR / runway heading (latest wins).
//! The terminal draft runs through the guardrail pipeline before the
//! [`FinalResponse`] is assembled; the verifier only ever reads the tracked
//! state, which the strictly sequential loop guarantees reflects everything
//! the draft could have seen.
//!
//! Termination: a `Final` decision, the `max_loops` ceiling, the overall
//! request deadline (both force a "summarize now" draft), or cancellation
//! (checked at every state transition; emits a single canceled `final` event
//! and writes no guardrail record).
//!
//! # Example
//!
//! ```no_run
//! use aeroguard_agent::Agent;
//! use aeroguard_types::AssistantConfig;
//!
//! let mut agent = Agent::new(AssistantConfig::default());
//! let response = agent.run("crosswind at KDEN runway 26");
//! println!("{:?}", response.guardrail_status);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::time::{Duration, Instant};

use aeroguard_audit::AuditSink;
use aeroguard_guardrail::{run_pipeline, CrosswindGuardrail, GuardrailPolicy, PipelineEvent};
use aeroguard_tools::ToolRegistry;
use aeroguard_types::{
    AgentEvent, AgentEventKind, AssistantConfig, Decision, FinalResponse, LandingAnalysis,
    LlmBackend, MetarRecord, ResponseDetails, ResponseType, ToolCallRecord, TranscriptStep,
    VerificationStatus,
};
use aeroguard_weather::WeatherFetcher;
use aeroguard_wind::{true_to_magnetic, variation_for, WindGeometry};

use crate::llm::{classify, Decider, ExternalDecider, PatternDecider, QueryClass};

// ─────────────────────────────────────────────────────────────────────────────
// Cancellation
// ─────────────────────────────────────────────────────────────────────────────

/// Cooperative cancellation token, observed at every state transition.
/// Clone freely; all clones share the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-request state
// ─────────────────────────────────────────────────────────────────────────────

/// Everything one request accumulates. Created at the top of
/// [`Agent::run`] and destroyed at return; never shared across requests.
#[derive(Debug, Clone)]
pub struct AgentState {
    pub query: String,
    pub transcript: Vec<TranscriptStep>,
    /// Latest METAR observed through tool execution.
    pub tracked_metar: Option<MetarRecord>,
    /// Latest runway heading observed through tool execution, degrees.
    pub tracked_runway_heading: Option<u16>,
    pub loop_index: u32,
}

impl AgentState {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            transcript: Vec::new(),
            tracked_metar: None,
            tracked_runway_heading: None,
            loop_index: 0,
        }
    }

    /// Append one (thought, action, observation) step.
    pub fn record_step(
        &mut self,
        thought: impl Into<String>,
        action: Decision,
        observation: Option<serde_json::Value>,
    ) {
        self.transcript.push(TranscriptStep {
            thought: thought.into(),
            action,
            observation,
        });
    }

    /// Latest observation recorded for a given tool, if any.
    pub fn last_observation(&self, tool: &str) -> Option<&serde_json::Value> {
        self.transcript.iter().rev().find_map(|step| match &step.action {
            Decision::CallTool { name, .. } if name == tool => step.observation.as_ref(),
            _ => None,
        })
    }

    /// Update tracked state from a tool observation: a result that matches
    /// the METAR record shape replaces the tracked METAR, and any result
    /// carrying a runway heading replaces the tracked heading.
    pub fn track(&mut self, observation: &serde_json::Value) {
        if let Ok(metar) = serde_json::from_value::<MetarRecord>(observation.clone()) {
            if !metar.station.is_empty() {
                self.tracked_metar = Some(metar);
            }
        }
        if let Some(heading) = observation.get("heading_deg").and_then(|v| v.as_u64()) {
            self.tracked_runway_heading = Some((heading % 360) as u16);
        }
    }

    fn tool_call_records(&self) -> Vec<ToolCallRecord> {
        self.transcript
            .iter()
            .filter_map(|step| match &step.action {
                Decision::CallTool { name, args } => Some(ToolCallRecord {
                    tool: name.clone(),
                    args: args.clone(),
                    result: step
                        .observation
                        .clone()
                        .unwrap_or(serde_json::Value::Null),
                }),
                _ => None,
            })
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the subsystem handles for answering queries: tool registry, guardrail,
/// audit sink, and the decision backend.
pub struct Agent {
    config: AssistantConfig,
    registry: ToolRegistry,
    guardrail: CrosswindGuardrail,
    sink: AuditSink,
    decider: Box<dyn Decider>,
}

impl Agent {
    /// Build from configuration: audit sink at the configured path, the
    /// standard tool set, and the configured decision backend.
    pub fn new(config: AssistantConfig) -> Self {
        let sink = AuditSink::open(&config.audit_log_path);
        Self::with_sink(config, sink)
    }

    /// [`Agent::new`] with an explicit audit sink (tests use a temp file or
    /// a disabled sink).
    pub fn with_sink(config: AssistantConfig, sink: AuditSink) -> Self {
        let registry = Self::build_registry(&config, &sink);
        let decider: Box<dyn Decider> = match config.llm_backend {
            LlmBackend::Pattern => Box::new(PatternDecider::new()),
            LlmBackend::External => Box::new(ExternalDecider::new(
                &config.llm_base_url,
                &config.llm_model,
                Duration::from_millis(config.upstream_timeout_ms),
                catalog_text(&registry),
            )),
        };
        Self::assemble(config, sink, registry, decider)
    }

    /// Full control over the decision backend; used by tests to script
    /// decisions and corrupt reflections.
    pub fn with_decider(config: AssistantConfig, sink: AuditSink, decider: Box<dyn Decider>) -> Self {
        let registry = Self::build_registry(&config, &sink);
        Self::assemble(config, sink, registry, decider)
    }

    fn build_registry(config: &AssistantConfig, sink: &AuditSink) -> ToolRegistry {
        let fetcher = Arc::new(WeatherFetcher::new(
            &config.weather_api_url,
            &config.weather_api_key,
            Duration::from_millis(config.upstream_timeout_ms),
            sink.clone(),
        ));
        ToolRegistry::standard(fetcher, config.magnetic_correction_enabled)
    }

    fn assemble(
        config: AssistantConfig,
        sink: AuditSink,
        registry: ToolRegistry,
        decider: Box<dyn Decider>,
    ) -> Self {
        let guardrail = CrosswindGuardrail::new(GuardrailPolicy {
            threshold_kt: config.guardrail_threshold_kt,
            use_gust: config.use_gust_for_verification,
            magnetic_correction: config.magnetic_correction_enabled,
        });
        Self {
            config,
            registry,
            guardrail,
            sink,
            decider,
        }
    }

    /// Name and description of every registered tool, for display surfaces.
    pub fn tool_descriptions(&self) -> Vec<(&'static str, &'static str)> {
        self.registry
            .descriptors()
            .map(|d| (d.name, d.description))
            .collect()
    }

    /// Answer a query. Never fails; every failure mode folds into the
    /// response envelope.
    pub fn run(&mut self, query: &str) -> FinalResponse {
        self.drive(query, &CancelToken::new(), &mut |_| {})
    }

    /// Streaming variant: emits [`AgentEvent`]s through the bounded channel
    /// in strict causal order (`final` last, exactly one per request) while
    /// computing the same [`FinalResponse`] as [`Agent::run`].
    pub fn run_stream(
        &mut self,
        query: &str,
        cancel: &CancelToken,
        events: SyncSender<AgentEvent>,
    ) -> FinalResponse {
        let mut emit = move |event: AgentEvent| {
            // A dropped receiver just means nobody is watching anymore.
            let _ = events.send(event);
        };
        self.drive(query, cancel, &mut emit)
    }

    // ── State machine ────────────────────────────────────────────────────────

    fn drive(
        &mut self,
        query: &str,
        cancel: &CancelToken,
        emit: &mut dyn FnMut(AgentEvent),
    ) -> FinalResponse {
        let deadline = Instant::now() + Duration::from_millis(self.config.request_deadline_ms);
        let mut state = AgentState::new(query);
        tracing::info!(query, backend = %self.config.llm_backend, "agent request started");

        let draft = loop {
            if cancel.is_canceled() {
                return self.canceled_response(&state, emit);
            }
            if state.loop_index >= self.config.max_loops || Instant::now() >= deadline {
                tracing::warn!(
                    loops = state.loop_index,
                    "loop budget or deadline exhausted; forcing summary"
                );
                break self.decider.summarize(&state);
            }

            // THINK
            let decision = self.decider.decide(&state);
            if cancel.is_canceled() {
                return self.canceled_response(&state, emit);
            }

            match decision {
                Decision::Final { text } => {
                    let thought = "enough information gathered; answering".to_string();
                    emit(AgentEvent::now(AgentEventKind::Thought {
                        text: thought.clone(),
                    }));
                    state.record_step(thought, Decision::Final { text: text.clone() }, None);
                    state.loop_index += 1;
                    break text;
                }
                Decision::Abort { reason } => {
                    let thought = format!("aborting: {reason}");
                    emit(AgentEvent::now(AgentEventKind::Thought {
                        text: thought.clone(),
                    }));
                    state.record_step(
                        thought,
                        Decision::Abort {
                            reason: reason.clone(),
                        },
                        None,
                    );
                    state.loop_index += 1;
                    break format!("I can't complete this request: {reason}");
                }
                Decision::CallTool { name, args } => {
                    let thought = format!("need more data; calling {name}");
                    emit(AgentEvent::now(AgentEventKind::Thought {
                        text: thought.clone(),
                    }));
                    emit(AgentEvent::now(AgentEventKind::ToolCall {
                        tool: name.clone(),
                        args: args.clone(),
                    }));

                    // ACT: a dispatch failure becomes an observation, never a
                    // loop panic.
                    let observation = match self.registry.dispatch(&name, args.clone()) {
                        Ok(result) => result,
                        Err(err) => {
                            tracing::warn!(tool = %name, error = %err, "tool dispatch failed");
                            err.to_observation()
                        }
                    };
                    emit(AgentEvent::now(AgentEventKind::ToolResult {
                        tool: name.clone(),
                        result: observation.clone(),
                    }));

                    // OBSERVE
                    state.track(&observation);
                    state.record_step(thought, Decision::CallTool { name, args }, Some(observation));

                    // DECIDE
                    state.loop_index += 1;
                }
            }
        };

        if cancel.is_canceled() {
            return self.canceled_response(&state, emit);
        }
        emit(AgentEvent::now(AgentEventKind::Draft {
            text: draft.clone(),
        }));

        // RESPOND: the guardrail pipeline gates the draft.
        let decider = &mut self.decider;
        let outcome = run_pipeline(
            &self.guardrail,
            &draft,
            state.tracked_metar.as_ref(),
            state.tracked_runway_heading,
            &self.sink,
            |verification| decider.reflect(verification, &state),
            |event| emit(AgentEvent::now(map_pipeline_event(event))),
        );

        let response = self.assemble_response(&state, outcome);
        emit(AgentEvent::now(AgentEventKind::Final {
            response: Box::new(response.clone()),
            canceled: false,
        }));
        response
    }

    fn canceled_response(
        &self,
        state: &AgentState,
        emit: &mut dyn FnMut(AgentEvent),
    ) -> FinalResponse {
        tracing::info!(loops = state.loop_index, "request canceled");
        let mut response =
            FinalResponse::text("Request canceled before completion.", VerificationStatus::Skipped);
        response.details.loops = state.loop_index;
        response.details.tool_calls = state.tool_call_records();
        emit(AgentEvent::now(AgentEventKind::Final {
            response: Box::new(response.clone()),
            canceled: true,
        }));
        response
    }

    fn assemble_response(
        &self,
        state: &AgentState,
        outcome: aeroguard_guardrail::GuardrailOutcome,
    ) -> FinalResponse {
        let landing = if classify(&state.query) == QueryClass::Landing {
            self.landing_analysis(state)
        } else {
            None
        };
        let (response_type, metar) = match &state.tracked_metar {
            Some(m) if !m.raw.is_empty() => (ResponseType::Metar, Some(m.clone())),
            _ => (ResponseType::Text, None),
        };
        FinalResponse {
            response_type,
            metar,
            landing,
            text_response: Some(outcome.answer_text),
            guardrail_status: outcome.status,
            is_fallback: outcome.is_fallback,
            details: ResponseDetails {
                verification: Some(outcome.verification),
                loops: state.loop_index,
                tool_calls: state.tool_call_records(),
            },
        }
    }

    /// Landing block recomputed from the tracked primary data, using the same
    /// magnetic policy as the verifier.
    fn landing_analysis(&self, state: &AgentState) -> Option<LandingAnalysis> {
        let metar = state.tracked_metar.as_ref()?;
        let heading = state.tracked_runway_heading?;
        let direction = metar.wind_direction?;
        let speed = metar.wind_speed?;

        let variation = if self.config.magnetic_correction_enabled {
            variation_for(&metar.station)
        } else {
            None
        };
        let geometry = WindGeometry::compute(
            true_to_magnetic(f64::from(direction), variation),
            f64::from(speed),
            f64::from(heading),
        );
        let mut number = heading / 10;
        if number == 0 {
            number = 36;
        }
        Some(LandingAnalysis {
            runway_number: format!("{number:02}"),
            runway_heading: heading,
            crosswind_kt: round1(geometry.crosswind_kt),
            headwind_kt: round1(geometry.headwind_kt),
        })
    }
}

fn map_pipeline_event(event: PipelineEvent) -> AgentEventKind {
    match event {
        PipelineEvent::Guardrail {
            status,
            discrepancy,
        } => AgentEventKind::Guardrail {
            status,
            discrepancy,
        },
        PipelineEvent::Reflection { reason } => AgentEventKind::Reflection { reason },
        PipelineEvent::SafeFail { trace_id } => AgentEventKind::SafeFail { trace_id },
    }
}

fn catalog_text(registry: &ToolRegistry) -> String {
    registry
        .descriptors()
        .map(|d| {
            format!(
                "- {}: {}\n  args schema: {}",
                d.name,
                d.description,
                serde_json::to_string(&d.arg_schema).unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    /// Offline config: no weather key (fallback catalog only), pattern
    /// decider, default policies.
    fn offline_config() -> AssistantConfig {
        AssistantConfig::default()
    }

    fn agent() -> Agent {
        Agent::with_sink(offline_config(), AuditSink::disabled())
    }

    #[test]
    fn metar_lookup_returns_structured_metar() {
        let response = agent().run("metar KMCO");
        assert_eq!(response.response_type, ResponseType::Metar);
        let metar = response.metar.expect("tracked METAR");
        assert_eq!(metar.station, "KMCO");
        assert!(response.landing.is_none());
        assert_eq!(response.guardrail_status, VerificationStatus::Skipped);
        assert!(!response.is_fallback);
        assert_eq!(response.details.tool_calls.len(), 1);
    }

    #[test]
    fn landing_query_tracks_runway_and_passes_guardrail() {
        let response = agent().run("crosswind landing at KDEN runway 260");
        assert_eq!(response.guardrail_status, VerificationStatus::Passed);
        assert!(!response.is_fallback);
        let landing = response.landing.expect("landing block");
        assert_eq!(landing.runway_heading, 260);
        assert_eq!(landing.runway_number, "26");
        // KDEN 220 @ 10, +7.5°E correction, runway 260: ≈ 7.4 kt.
        assert!((landing.crosswind_kt - 7.4).abs() < 0.05);
        let text = response.text_response.expect("answer text");
        assert!(text.contains("7.4"));
    }

    #[test]
    fn greeting_is_plain_text_and_skipped() {
        let response = agent().run("hello");
        assert_eq!(response.response_type, ResponseType::Text);
        assert!(response.metar.is_none());
        assert_eq!(response.guardrail_status, VerificationStatus::Skipped);
        assert!(!response.is_fallback);
        assert!(response.details.tool_calls.is_empty());
    }

    #[test]
    fn run_is_idempotent_for_pattern_backend() {
        let mut agent = agent();
        let a = serde_json::to_value(agent.run("crosswind at RPLL runway 06")).unwrap();
        let b = serde_json::to_value(agent.run("crosswind at RPLL runway 06")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn canceled_before_start_emits_single_canceled_final() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let (tx, rx) = mpsc::sync_channel(64);
        let response = agent().run_stream("metar KDEN", &cancel, tx);

        assert_eq!(response.guardrail_status, VerificationStatus::Skipped);
        let events: Vec<AgentEvent> = rx.into_iter().collect();
        assert_eq!(events.len(), 1, "only the final event");
        match &events[0].kind {
            AgentEventKind::Final { canceled, .. } => assert!(*canceled),
            other => panic!("expected Final, got {other:?}"),
        }
    }

    #[test]
    fn stream_events_are_causally_ordered() {
        let (tx, rx) = mpsc::sync_channel(256);
        let cancel = CancelToken::new();
        agent().run_stream("crosswind landing at KDEN runway 260", &cancel, tx);
        let kinds: Vec<String> = rx
            .into_iter()
            .map(|e| {
                serde_json::to_value(&e).unwrap()["type"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect();

        // final is strictly last, exactly once.
        assert_eq!(kinds.iter().filter(|k| *k == "final").count(), 1);
        assert_eq!(kinds.last().unwrap(), "final");
        // Per tool: thought < tool_call < tool_result.
        let call = kinds.iter().position(|k| k == "tool_call").unwrap();
        let result = kinds.iter().position(|k| k == "tool_result").unwrap();
        let thought = kinds.iter().position(|k| k == "thought").unwrap();
        assert!(thought < call && call < result);
        // Exactly one guardrail event on the straight-pass path, before final.
        assert_eq!(kinds.iter().filter(|k| *k == "guardrail").count(), 1);
        let guardrail = kinds.iter().position(|k| k == "guardrail").unwrap();
        let draft = kinds.iter().position(|k| k == "draft").unwrap();
        assert!(draft < guardrail);
    }

    #[test]
    fn loop_ceiling_forces_summary() {
        /// A decider that never answers.
        struct ToolSpammer;
        impl Decider for ToolSpammer {
            fn decide(&mut self, _: &AgentState) -> Decision {
                Decision::CallTool {
                    name: "fetch_metar".to_string(),
                    args: serde_json::json!({"icao_code": "KDEN"}),
                }
            }
            fn reflect(&mut self, _: &aeroguard_types::VerificationResult, _: &AgentState) -> String {
                String::new()
            }
            fn summarize(&mut self, _: &AgentState) -> String {
                "Out of time; partial data only.".to_string()
            }
        }

        let mut config = offline_config();
        config.max_loops = 3;
        let mut agent =
            Agent::with_decider(config, AuditSink::disabled(), Box::new(ToolSpammer));
        let response = agent.run("metar KDEN");
        assert_eq!(response.details.loops, 3);
        assert_eq!(response.details.tool_calls.len(), 3);
        assert_eq!(
            response.text_response.as_deref(),
            Some("Out of time; partial data only.")
        );
    }

    #[test]
    fn zero_deadline_summarizes_immediately() {
        let mut config = offline_config();
        config.request_deadline_ms = 0;
        let mut agent = Agent::with_sink(config, AuditSink::disabled());
        let response = agent.run("metar KDEN");
        assert_eq!(response.details.loops, 0);
        assert!(response
            .text_response
            .unwrap()
            .contains("ran out of time"));
    }

    #[test]
    fn abort_decision_becomes_text_answer() {
        struct Aborter;
        impl Decider for Aborter {
            fn decide(&mut self, _: &AgentState) -> Decision {
                Decision::Abort {
                    reason: "not my field".to_string(),
                }
            }
            fn reflect(&mut self, _: &aeroguard_types::VerificationResult, _: &AgentState) -> String {
                String::new()
            }
            fn summarize(&mut self, _: &AgentState) -> String {
                String::new()
            }
        }
        let mut agent = Agent::with_decider(
            offline_config(),
            AuditSink::disabled(),
            Box::new(Aborter),
        );
        let response = agent.run("metar KDEN");
        assert_eq!(response.response_type, ResponseType::Text);
        assert!(response.text_response.unwrap().contains("not my field"));
        assert_eq!(response.guardrail_status, VerificationStatus::Skipped);
    }

    #[test]
    fn unknown_tool_failure_is_an_observation() {
        struct BadToolOnce {
            called: bool,
        }
        impl Decider for BadToolOnce {
            fn decide(&mut self, _: &AgentState) -> Decision {
                if self.called {
                    Decision::Final {
                        text: "Tool was unavailable; no analysis possible.".to_string(),
                    }
                } else {
                    self.called = true;
                    Decision::CallTool {
                        name: "warp_drive".to_string(),
                        args: serde_json::json!({}),
                    }
                }
            }
            fn reflect(&mut self, _: &aeroguard_types::VerificationResult, _: &AgentState) -> String {
                String::new()
            }
            fn summarize(&mut self, _: &AgentState) -> String {
                String::new()
            }
        }
        let mut agent = Agent::with_decider(
            offline_config(),
            AuditSink::disabled(),
            Box::new(BadToolOnce { called: false }),
        );
        let response = agent.run("metar KDEN");
        assert_eq!(response.details.tool_calls.len(), 1);
        assert!(response.details.tool_calls[0].result["error"]
            .as_str()
            .unwrap()
            .contains("warp_drive"));
        assert!(response.text_response.unwrap().contains("unavailable"));
    }

    #[test]
    fn tracking_keeps_latest_metar() {
        let mut state = AgentState::new("test");
        let kden = aeroguard_weather::fallback_metar("KDEN");
        let kmco = aeroguard_weather::fallback_metar("KMCO");
        state.track(&serde_json::to_value(&kden).unwrap());
        state.track(&serde_json::to_value(&kmco).unwrap());
        assert_eq!(state.tracked_metar.unwrap().station, "KMCO");
    }

    #[test]
    fn tracking_reads_runway_heading() {
        let mut state = AgentState::new("test");
        state.track(&serde_json::json!({
            "airport": "KDEN",
            "runway": "26",
            "heading_deg": 260,
            "crosswind_kt": 5.0,
            "headwind_kt": 8.0,
            "rationale": "test",
        }));
        assert_eq!(state.tracked_runway_heading, Some(260));
        assert!(state.tracked_metar.is_none());
    }

    #[test]
    fn tracking_ignores_unrelated_results() {
        let mut state = AgentState::new("test");
        state.track(&serde_json::json!({"success": true, "message": "logged"}));
        assert!(state.tracked_metar.is_none());
        assert!(state.tracked_runway_heading.is_none());
    }
}
