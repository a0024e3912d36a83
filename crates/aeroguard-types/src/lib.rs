//! `aeroguard-types` – shared domain types for the Aeroguard flight assistant.
//!
//! Everything that crosses a crate boundary lives here: the METAR record and
//! runway selection produced by tools, the [`Decision`] sum type returned by
//! the LLM adapter, the guardrail [`VerificationResult`], the terminal
//! [`FinalResponse`], the streaming [`AgentEvent`] set, the
//! [`AssistantConfig`] bundle, and the workspace-wide [`FlightError`] enum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Weather domain
// ─────────────────────────────────────────────────────────────────────────────

/// Discrete flight-condition bucket derived from visibility and ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlightCategory {
    #[serde(rename = "VFR")]
    Vfr,
    #[serde(rename = "MVFR")]
    Mvfr,
    #[serde(rename = "IFR")]
    Ifr,
    #[serde(rename = "LIFR")]
    Lifr,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl std::fmt::Display for FlightCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FlightCategory::Vfr => "VFR",
            FlightCategory::Mvfr => "MVFR",
            FlightCategory::Ifr => "IFR",
            FlightCategory::Lifr => "LIFR",
            FlightCategory::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// Where a [`MetarRecord`] came from.
///
/// A `Fallback` record is deterministic for its station; a `Live` record's
/// numerics reflect a single upstream observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetarSource {
    Live,
    Fallback,
}

/// A normalized current-weather observation for one airport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetarRecord {
    /// 4-letter uppercase ICAO station identifier.
    pub station: String,
    /// Observation time as reported upstream (opaque, e.g. "181853Z").
    pub time: String,
    /// Raw METAR report text.
    pub raw: String,
    /// Wind direction in degrees (0–360). `None` for variable or calm wind.
    pub wind_direction: Option<u16>,
    /// Sustained wind speed in knots.
    pub wind_speed: Option<u16>,
    /// Gust speed in knots, when reported.
    pub wind_gust: Option<u16>,
    pub temperature_c: Option<f64>,
    pub dewpoint_c: Option<f64>,
    /// Visibility in statute miles.
    pub visibility_sm: Option<f64>,
    /// Altimeter setting as reported (e.g. "30.05 inHg" or "Q1010").
    pub altimeter: Option<String>,
    pub flight_category: FlightCategory,
    pub source: MetarSource,
}

impl MetarRecord {
    /// True when both wind direction and speed are known.
    pub fn has_wind(&self) -> bool {
        self.wind_direction.is_some() && self.wind_speed.is_some()
    }

    /// Human-readable wind summary, e.g. `"220° @ 10 kt"` or `"calm/variable"`.
    pub fn wind_summary(&self) -> String {
        match (self.wind_direction, self.wind_speed) {
            (Some(dir), Some(spd)) => match self.wind_gust {
                Some(g) if g > spd => format!("{dir:03}° @ {spd} kt gusting {g} kt"),
                _ => format!("{dir:03}° @ {spd} kt"),
            },
            _ => "calm/variable".to_string(),
        }
    }
}

/// The runway chosen for the current wind, with its wind components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunwaySelection {
    /// Airport the selection applies to.
    pub airport: String,
    /// Runway designator, e.g. "26" or "17L".
    pub runway: String,
    /// Runway heading in degrees (designator number × 10, mod 360).
    pub heading_deg: u16,
    /// Crosswind component magnitude in knots.
    pub crosswind_kt: f64,
    /// Headwind component in knots. Negative means tailwind.
    pub headwind_kt: f64,
    /// Human-readable explanation. Never parsed.
    pub rationale: String,
}

/// Landing-geometry block attached to METAR responses for landing queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandingAnalysis {
    pub runway_number: String,
    pub runway_heading: u16,
    pub crosswind_kt: f64,
    pub headwind_kt: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent decisions
// ─────────────────────────────────────────────────────────────────────────────

/// What the LLM adapter wants the loop to do next.
///
/// Parsing of raw model replies lives behind the adapter boundary; the loop
/// only ever sees this sum type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    /// Dispatch a named tool with JSON arguments.
    CallTool {
        name: String,
        args: serde_json::Value,
    },
    /// Produce the final answer text.
    Final { text: String },
    /// Give up with a reason (surfaced as a text response).
    Abort { reason: String },
}

/// One transcript step: what the agent thought, did, and observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptStep {
    pub thought: String,
    pub action: Decision,
    /// Structured observation from the dispatched tool, if any.
    pub observation: Option<serde_json::Value>,
}

/// A completed tool call, kept for response details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub args: serde_json::Value,
    pub result: serde_json::Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// Guardrail verification
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of one guardrail verification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of checking an answer's crosswind claim against recomputed truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    /// Crosswind value the answer claimed, in knots.
    pub agent_claim: Option<f64>,
    /// Crosswind recomputed from the tracked METAR and runway, in knots.
    pub mathematical_truth: Option<f64>,
    /// `|agent_claim − mathematical_truth|`.
    pub discrepancy: Option<f64>,
    pub reason: String,
    /// Corrective prompt for the reflection pass. Present iff `status` is
    /// `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reflection_prompt: Option<String>,
}

impl VerificationResult {
    /// A skipped verification with the given reason.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: VerificationStatus::Skipped,
            agent_claim: None,
            mathematical_truth: None,
            discrepancy: None,
            reason: reason.into(),
            reflection_prompt: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Terminal response
// ─────────────────────────────────────────────────────────────────────────────

/// Whether the response carries structured METAR data or plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Metar,
    Text,
}

/// Diagnostic block attached to every [`FinalResponse`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResponseDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationResult>,
    pub loops: u32,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// The terminal answer for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalResponse {
    pub response_type: ResponseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metar: Option<MetarRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landing: Option<LandingAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_response: Option<String>,
    pub guardrail_status: VerificationStatus,
    /// True only when the safe-fail path replaced the answer.
    pub is_fallback: bool,
    pub details: ResponseDetails,
}

impl FinalResponse {
    /// A plain text response with the given guardrail status.
    pub fn text(text: impl Into<String>, status: VerificationStatus) -> Self {
        Self {
            response_type: ResponseType::Text,
            metar: None,
            landing: None,
            text_response: Some(text.into()),
            guardrail_status: status,
            is_fallback: false,
            details: ResponseDetails::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Streaming events
// ─────────────────────────────────────────────────────────────────────────────

/// One line-delimited progress event emitted by the streaming loop variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: AgentEventKind,
}

impl AgentEvent {
    pub fn now(kind: AgentEventKind) -> Self {
        Self {
            ts: Utc::now(),
            kind,
        }
    }
}

/// Event payloads, tagged by `type` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum AgentEventKind {
    Thought {
        text: String,
    },
    ToolCall {
        tool: String,
        args: serde_json::Value,
    },
    ToolResult {
        tool: String,
        result: serde_json::Value,
    },
    Draft {
        text: String,
    },
    Guardrail {
        status: VerificationStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        discrepancy: Option<f64>,
    },
    Reflection {
        reason: String,
    },
    SafeFail {
        trace_id: String,
    },
    Final {
        response: Box<FinalResponse>,
        canceled: bool,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Which backend drives [`Decision`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Deterministic pattern decider. Used for tests and when no LLM is
    /// configured.
    #[default]
    Pattern,
    /// External chat-completions endpoint (Ollama / OpenAI-compatible).
    External,
}

impl std::fmt::Display for LlmBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmBackend::Pattern => write!(f, "pattern"),
            LlmBackend::External => write!(f, "external"),
        }
    }
}

/// Explicit configuration bundle, read-only after construction.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Maximum allowed |claim − truth| in knots before verification fails.
    pub guardrail_threshold_kt: f64,
    /// Hard ceiling on reasoning-loop iterations.
    pub max_loops: u32,
    /// When true, verification uses gust speed whenever gust > sustained.
    pub use_gust_for_verification: bool,
    /// When true, wind direction is converted true → magnetic before the
    /// runway angle is taken, for stations with a known variation.
    pub magnetic_correction_enabled: bool,
    pub llm_backend: LlmBackend,
    /// Base URL of the chat-completions endpoint (external backend only).
    pub llm_base_url: String,
    /// Model name for the external backend.
    pub llm_model: String,
    /// Per-call timeout for upstream weather and LLM requests.
    pub upstream_timeout_ms: u64,
    /// Overall per-request deadline. Expiry forces the loop to summarize.
    pub request_deadline_ms: u64,
    /// NDJSON audit-sink path.
    pub audit_log_path: String,
    /// Base URL of the upstream METAR provider.
    pub weather_api_url: String,
    /// Upstream API token. Empty means no live weather; fallbacks are used.
    pub weather_api_key: String,
}

impl std::fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("guardrail_threshold_kt", &self.guardrail_threshold_kt)
            .field("max_loops", &self.max_loops)
            .field("use_gust_for_verification", &self.use_gust_for_verification)
            .field("magnetic_correction_enabled", &self.magnetic_correction_enabled)
            .field("llm_backend", &self.llm_backend)
            .field("llm_base_url", &self.llm_base_url)
            .field("llm_model", &self.llm_model)
            .field("upstream_timeout_ms", &self.upstream_timeout_ms)
            .field("request_deadline_ms", &self.request_deadline_ms)
            .field("audit_log_path", &self.audit_log_path)
            .field("weather_api_url", &self.weather_api_url)
            .field(
                "weather_api_key",
                if self.weather_api_key.is_empty() {
                    &"<not set>"
                } else {
                    &"<redacted>"
                },
            )
            .finish()
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            guardrail_threshold_kt: 3.0,
            max_loops: 8,
            use_gust_for_verification: false,
            magnetic_correction_enabled: true,
            llm_backend: LlmBackend::Pattern,
            llm_base_url: "http://localhost:11434".to_string(),
            llm_model: "llama3".to_string(),
            upstream_timeout_ms: 10_000,
            request_deadline_ms: 30_000,
            audit_log_path: "logs/audit.jsonl".to_string(),
            weather_api_url: "https://avwx.rest/api/metar".to_string(),
            weather_api_key: String::new(),
        }
    }
}

impl AssistantConfig {
    /// Apply environment-variable overrides to `self`.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `GUARDRAIL_THRESHOLD_KT` | `guardrail_threshold_kt` |
    /// | `MAX_LOOPS` | `max_loops` |
    /// | `USE_GUST_FOR_VERIFICATION` | `use_gust_for_verification` |
    /// | `MAGNETIC_CORRECTION_ENABLED` | `magnetic_correction_enabled` |
    /// | `LLM_BACKEND` | `llm_backend` (`pattern` / `external`) |
    /// | `AEROGUARD_LLM_URL` / `AEROGUARD_LLM_MODEL` | external endpoint |
    /// | `REQUEST_DEADLINE_MS` | `request_deadline_ms` |
    /// | `AUDIT_LOG_PATH` | `audit_log_path` |
    /// | `AEROGUARD_WEATHER_URL` / `AEROGUARD_WEATHER_KEY` | upstream weather |
    ///
    /// Unparseable values leave the current value untouched.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("GUARDRAIL_THRESHOLD_KT") {
            if let Ok(t) = v.parse::<f64>() {
                self.guardrail_threshold_kt = t;
            }
        }
        if let Ok(v) = std::env::var("MAX_LOOPS") {
            if let Ok(n) = v.parse::<u32>() {
                self.max_loops = n;
            }
        }
        if let Ok(v) = std::env::var("USE_GUST_FOR_VERIFICATION") {
            self.use_gust_for_verification = v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("MAGNETIC_CORRECTION_ENABLED") {
            self.magnetic_correction_enabled = !v.eq_ignore_ascii_case("false");
        }
        if let Ok(v) = std::env::var("LLM_BACKEND") {
            self.llm_backend = if v.eq_ignore_ascii_case("pattern") {
                LlmBackend::Pattern
            } else {
                LlmBackend::External
            };
        }
        if let Ok(v) = std::env::var("AEROGUARD_LLM_URL") {
            self.llm_base_url = v;
        }
        if let Ok(v) = std::env::var("AEROGUARD_LLM_MODEL") {
            self.llm_model = v;
        }
        if let Ok(v) = std::env::var("REQUEST_DEADLINE_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                self.request_deadline_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("AUDIT_LOG_PATH") {
            self.audit_log_path = v;
        }
        if let Ok(v) = std::env::var("AEROGUARD_WEATHER_URL") {
            self.weather_api_url = v;
        }
        if let Ok(v) = std::env::var("AEROGUARD_WEATHER_KEY") {
            self.weather_api_key = v;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Workspace-wide error enum spanning station validation, upstream weather,
/// LLM adapter failures, tool dispatch, and loop termination.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlightError {
    /// Malformed ICAO code. The only error that surfaces to the caller as a
    /// client error; it never reaches the guardrail.
    #[error("Invalid station identifier: {0:?} (expected 4 uppercase letters)")]
    InvalidStation(String),

    /// Upstream weather failure. Absorbed into fallback records by the
    /// fetcher; carried here only for internal reporting.
    #[error("Upstream weather unavailable: {0}")]
    UpstreamWeather(String),

    #[error("LLM unavailable: {0}")]
    LlmUnavailable(String),

    #[error("LLM reply malformed: {0}")]
    LlmMalformed(String),

    #[error("Tool dispatch failed: {0}")]
    ToolDispatch(String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// Audit write failures are logged locally and never fail the request.
    #[error("Audit write failed: {0}")]
    AuditWrite(String),

    #[error("Request canceled")]
    Canceled,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metar() -> MetarRecord {
        MetarRecord {
            station: "KDEN".to_string(),
            time: "181853Z".to_string(),
            raw: "METAR KDEN 181853Z 22010KT 10SM FEW040 05/M02 A3005".to_string(),
            wind_direction: Some(220),
            wind_speed: Some(10),
            wind_gust: None,
            temperature_c: Some(5.0),
            dewpoint_c: Some(-2.0),
            visibility_sm: Some(10.0),
            altimeter: Some("30.05 inHg".to_string()),
            flight_category: FlightCategory::Vfr,
            source: MetarSource::Live,
        }
    }

    #[test]
    fn metar_record_roundtrip() {
        let rec = sample_metar();
        let json = serde_json::to_string(&rec).unwrap();
        let back: MetarRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rec, back);
    }

    #[test]
    fn flight_category_serializes_uppercase() {
        let json = serde_json::to_string(&FlightCategory::Mvfr).unwrap();
        assert_eq!(json, "\"MVFR\"");
    }

    #[test]
    fn metar_source_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&MetarSource::Fallback).unwrap(),
            "\"fallback\""
        );
    }

    #[test]
    fn wind_summary_includes_gust_only_when_stronger() {
        let mut rec = sample_metar();
        rec.wind_gust = Some(18);
        assert_eq!(rec.wind_summary(), "220° @ 10 kt gusting 18 kt");
        rec.wind_gust = Some(10);
        assert_eq!(rec.wind_summary(), "220° @ 10 kt");
    }

    #[test]
    fn wind_summary_handles_calm() {
        let mut rec = sample_metar();
        rec.wind_direction = None;
        assert_eq!(rec.wind_summary(), "calm/variable");
        assert!(!rec.has_wind());
    }

    #[test]
    fn decision_call_tool_roundtrip() {
        let d = Decision::CallTool {
            name: "fetch_metar".to_string(),
            args: serde_json::json!({"icao_code": "KDEN"}),
        };
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"action\":\"call_tool\""));
        let back: Decision = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }

    #[test]
    fn decision_final_roundtrip() {
        let d = Decision::Final {
            text: "The crosswind is 6.4 kt.".to_string(),
        };
        let back: Decision =
            serde_json::from_str(&serde_json::to_string(&d).unwrap()).unwrap();
        assert_eq!(d, back);
    }

    #[test]
    fn verification_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&VerificationStatus::Skipped).unwrap(),
            "\"skipped\""
        );
        assert_eq!(
            serde_json::to_string(&VerificationStatus::Passed).unwrap(),
            "\"passed\""
        );
    }

    #[test]
    fn skipped_result_has_no_numbers() {
        let v = VerificationResult::skipped("no tracked METAR");
        assert_eq!(v.status, VerificationStatus::Skipped);
        assert!(v.agent_claim.is_none());
        assert!(v.mathematical_truth.is_none());
        assert!(v.reflection_prompt.is_none());
    }

    #[test]
    fn agent_event_wire_shape() {
        let ev = AgentEvent::now(AgentEventKind::Guardrail {
            status: VerificationStatus::Passed,
            discrepancy: Some(0.5),
        });
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"type\":\"guardrail\""));
        assert!(json.contains("\"payload\""));
        assert!(json.contains("\"ts\""));
    }

    #[test]
    fn final_event_carries_canceled_marker() {
        let ev = AgentEvent::now(AgentEventKind::Final {
            response: Box::new(FinalResponse::text(
                "canceled",
                VerificationStatus::Skipped,
            )),
            canceled: true,
        });
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"canceled\":true"));
    }

    #[test]
    fn config_defaults_match_policy() {
        let cfg = AssistantConfig::default();
        assert_eq!(cfg.guardrail_threshold_kt, 3.0);
        assert_eq!(cfg.max_loops, 8);
        assert!(!cfg.use_gust_for_verification);
        assert!(cfg.magnetic_correction_enabled);
        assert_eq!(cfg.llm_backend, LlmBackend::Pattern);
        assert_eq!(cfg.request_deadline_ms, 30_000);
    }

    #[test]
    fn config_env_override_threshold() {
        // SAFETY: single-threaded test; no other thread reads this env-var.
        unsafe { std::env::set_var("GUARDRAIL_THRESHOLD_KT", "5.5") };
        let mut cfg = AssistantConfig::default();
        cfg.apply_env_overrides();
        assert_eq!(cfg.guardrail_threshold_kt, 5.5);
        unsafe { std::env::remove_var("GUARDRAIL_THRESHOLD_KT") };
    }

    #[test]
    fn config_env_override_ignores_garbage() {
        // SAFETY: single-threaded test; no other thread reads this env-var.
        unsafe { std::env::set_var("MAX_LOOPS", "not-a-number") };
        let mut cfg = AssistantConfig::default();
        cfg.apply_env_overrides();
        assert_eq!(cfg.max_loops, 8);
        unsafe { std::env::remove_var("MAX_LOOPS") };
    }

    #[test]
    fn config_debug_redacts_weather_key() {
        let mut cfg = AssistantConfig::default();
        cfg.weather_api_key = "super-secret-token".to_string();
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("<redacted>"));
        let empty = format!("{:?}", AssistantConfig::default());
        assert!(empty.contains("<not set>"));
    }

    #[test]
    fn flight_error_display() {
        let err = FlightError::InvalidStation("den".to_string());
        assert!(err.to_string().contains("Invalid station"));
        let err = FlightError::DeadlineExceeded;
        assert!(err.to_string().contains("deadline"));
    }

    #[test]
    fn text_response_constructor() {
        let r = FinalResponse::text("hello", VerificationStatus::Skipped);
        assert_eq!(r.response_type, ResponseType::Text);
        assert!(!r.is_fallback);
        assert!(r.metar.is_none());
    }
}
