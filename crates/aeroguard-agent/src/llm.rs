//! The [`Decider`] seam and its two backends.
//!
//! The reasoning loop never parses model output itself; it only consumes the
//! [`Decision`] sum type. [`PatternDecider`] is the deterministic backend
//! used for tests and when no LLM is configured: it classifies the query,
//! extracts an ICAO and an optional runway, dispatches the minimal tool
//! chain, and templates a final answer from observed tool results.
//! [`ExternalDecider`] speaks an OpenAI-compatible `/v1/chat/completions`
//! endpoint; a malformed reply is retried once and then downgraded to the
//! pattern backend for that call, so the loop always gets a decision.

use aeroguard_types::{
    Decision, FlightCategory, FlightError, MetarRecord, RunwaySelection, VerificationResult,
};
use serde::{Deserialize, Serialize};

use crate::agent_loop::AgentState;

// ─────────────────────────────────────────────────────────────────────────────
// Decider trait
// ─────────────────────────────────────────────────────────────────────────────

/// Produces the next [`Decision`] for the loop, the corrected answer for a
/// reflection pass, and the forced summary when loops or deadline run out.
pub trait Decider: Send {
    fn decide(&mut self, state: &AgentState) -> Decision;

    /// Build a replacement answer for a failed verification. The corrective
    /// context (wind, heading, formula, correct value) is in
    /// `verification.reflection_prompt`.
    fn reflect(&mut self, verification: &VerificationResult, state: &AgentState) -> String;

    /// "Summarize now": the loop hit its iteration ceiling or deadline.
    fn summarize(&mut self, state: &AgentState) -> String;
}

// ─────────────────────────────────────────────────────────────────────────────
// Query analysis (shared by both backends)
// ─────────────────────────────────────────────────────────────────────────────

/// What kind of request the query is, decided by keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryClass {
    /// Wants a weather report only.
    Metar,
    /// Wants landing geometry: runway and crosswind.
    Landing,
    /// Anything else: greeting, help, off-topic.
    Generic,
}

pub fn classify(query: &str) -> QueryClass {
    let q = query.to_lowercase();
    // "landing" rather than bare "land": city names like Orlando would
    // otherwise classify as landing queries.
    const LANDING: &[&str] = &[
        "crosswind",
        "cross wind",
        "cross-wind",
        "x-wind",
        "landing",
        "runway",
        "headwind",
        "tailwind",
    ];
    if LANDING.iter().any(|k| q.contains(k)) {
        return QueryClass::Landing;
    }
    const WEATHER: &[&str] = &["metar", "weather", "wind", "taf", "gust", "visibility"];
    if WEATHER.iter().any(|k| q.contains(k)) {
        return QueryClass::Metar;
    }
    QueryClass::Generic
}

const CITY_MAP: &[(&str, &str)] = &[
    ("denver", "KDEN"),
    ("boulder", "KBDU"),
    ("new york", "KJFK"),
    ("jfk", "KJFK"),
    ("orlando", "KMCO"),
    ("manila", "RPLL"),
];

/// 4-letter words that look like US ICAO codes but are not.
const ICAO_STOPWORDS: &[&str] = &["keep", "kind", "knew", "know"];

/// Find an ICAO code in the query: a 4-letter token that is either all
/// uppercase or K-prefixed, falling back to a small city-name map.
pub fn extract_icao(query: &str) -> Option<String> {
    for word in query.split(|c: char| !c.is_ascii_alphanumeric()) {
        if word.len() != 4 || !word.chars().all(|c| c.is_ascii_alphabetic()) {
            continue;
        }
        let all_upper = word.chars().all(|c| c.is_ascii_uppercase());
        let k_prefixed = word.starts_with(['K', 'k']);
        if (all_upper || k_prefixed) && !ICAO_STOPWORDS.contains(&word.to_lowercase().as_str()) {
            return Some(word.to_ascii_uppercase());
        }
    }
    let q = query.to_lowercase();
    CITY_MAP
        .iter()
        .find(|(city, _)| q.contains(city))
        .map(|(_, icao)| (*icao).to_string())
}

/// The token following "runway"/"rwy" when it starts with a digit, cleaned
/// of punctuation: `"runway 260"` → `"260"`, `"rwy 17L,"` → `"17L"`.
pub fn extract_runway(query: &str) -> Option<String> {
    let words: Vec<&str> = query.split_whitespace().collect();
    for (i, word) in words.iter().enumerate() {
        let lower = word.to_lowercase();
        if lower == "runway" || lower == "rwy" {
            if let Some(next) = words.get(i + 1) {
                let cleaned: String = next
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect();
                if cleaned.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                    return Some(cleaned);
                }
            }
        }
    }
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Pattern backend
// ─────────────────────────────────────────────────────────────────────────────

/// Deterministic decider: same query and tool results, same decisions, same
/// answer text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternDecider;

impl PatternDecider {
    pub fn new() -> Self {
        Self
    }
}

impl Decider for PatternDecider {
    fn decide(&mut self, state: &AgentState) -> Decision {
        let query = state.query.as_str();
        let class = classify(query);
        if class == QueryClass::Generic {
            return Decision::Final {
                text: generic_response(query),
            };
        }

        let Some(icao) = extract_icao(query) else {
            return Decision::Final {
                text: "I can help with weather and runway information. Please name an \
                       airport, e.g. \"metar KDEN\" or \"crosswind at RPLL runway 06\"."
                    .to_string(),
            };
        };

        let Some(metar_obs) = state.last_observation("fetch_metar") else {
            return Decision::CallTool {
                name: "fetch_metar".to_string(),
                args: serde_json::json!({ "icao_code": icao }),
            };
        };
        let Ok(metar) = serde_json::from_value::<MetarRecord>(metar_obs.clone()) else {
            return Decision::Final {
                text: format!(
                    "I couldn't retrieve weather for {icao}. Please verify the airport \
                     code and try again."
                ),
            };
        };

        if class == QueryClass::Landing {
            match state.last_observation("select_best_runway") {
                None => {
                    let mut args = serde_json::json!({ "icao_code": icao });
                    if let Some(runway) = extract_runway(query) {
                        args["runway"] = serde_json::json!(runway);
                    }
                    Decision::CallTool {
                        name: "select_best_runway".to_string(),
                        args,
                    }
                }
                Some(sel_obs) => {
                    match serde_json::from_value::<RunwaySelection>(sel_obs.clone()) {
                        Ok(selection) => Decision::Final {
                            text: metar_text(&metar, Some(&selection)),
                        },
                        Err(_) => Decision::Final {
                            text: format!(
                                "{}\n\nI couldn't determine a runway, so no landing \
                                 analysis is included.",
                                metar_text(&metar, None)
                            ),
                        },
                    }
                }
            }
        } else {
            Decision::Final {
                text: metar_text(&metar, None),
            }
        }
    }

    fn reflect(&mut self, verification: &VerificationResult, _state: &AgentState) -> String {
        // Deterministic correction straight from the recomputed truth.
        let truth = verification.mathematical_truth.unwrap_or_default();
        format!(
            "I apologize for the calculation error. Recalculating from the tracked wind \
             and runway:\n\n\
             Crosswind = wind speed × sin(angle between wind and runway) = {truth:.2} kt\n\n\
             The correct crosswind component is {truth:.2} knots."
        )
    }

    fn summarize(&mut self, state: &AgentState) -> String {
        match &state.tracked_metar {
            Some(metar) => format!(
                "I ran out of time before completing the full analysis. The latest \
                 weather I retrieved for {}:\n\n{}",
                metar.station, metar.raw
            ),
            None => "I ran out of time before completing the analysis. Please try \
                     again with a specific airport."
                .to_string(),
        }
    }
}

fn generic_response(query: &str) -> String {
    let q = query.to_lowercase();
    if ["hello", "hi", "hey", "greetings"]
        .iter()
        .any(|w| q.split_whitespace().any(|t| t.trim_matches(|c: char| !c.is_alphanumeric()) == *w))
    {
        return "Hello! I'm a flight assistant. I can help you with:\n\n\
                - METAR and weather reports: try \"metar KDEN\"\n\
                - Runway and crosswind analysis: try \"crosswind at KJFK\"\n\
                - Aircraft specs, fuel planning, and manual lookups\n\n\
                What can I help you with?"
            .to_string();
    }
    if q.trim() == "help" || q.trim() == "?" {
        return "Try asking:\n\
                - \"metar KMCO\" for current weather\n\
                - \"crosswind at KDEN runway 26\" for landing analysis\n\
                - \"is RPLL good for landing\" for conditions\n\n\
                I specialize in aviation weather and runway operations."
            .to_string();
    }
    "I'm a flight assistant focused on aviation weather and runway operations. Ask \
     about METAR reports, wind, or runways at a specific airport, e.g. \"metar KDEN\"."
        .to_string()
}

fn category_label(category: FlightCategory) -> &'static str {
    match category {
        FlightCategory::Vfr => "VFR (Visual Flight Rules)",
        FlightCategory::Mvfr => "MVFR (Marginal VFR)",
        FlightCategory::Ifr => "IFR (Instrument Flight Rules)",
        FlightCategory::Lifr => "LIFR (Low IFR)",
        FlightCategory::Unknown => "UNKNOWN",
    }
}

/// Professional report text; the landing block carries the crosswind claim
/// the guardrail later re-derives.
fn metar_text(metar: &MetarRecord, selection: Option<&RunwaySelection>) -> String {
    let mut parts = vec![
        format!("Station: {}", metar.station),
        format!("Report: {}", metar.time),
        format!("METAR: {}", metar.raw),
    ];
    if metar.has_wind() {
        parts.push(format!("Wind: {}", metar.wind_summary()));
    }
    if let Some(selection) = selection {
        parts.push("Landing analysis:".to_string());
        parts.push(format!(
            "  Runway in use: {} ({}°)",
            selection.runway, selection.heading_deg
        ));
        parts.push(format!("  Crosswind: {:.1} knots", selection.crosswind_kt));
        parts.push(format!("  Headwind: {:.1} knots", selection.headwind_kt));
    }
    if let Some(temp) = metar.temperature_c {
        parts.push(match metar.dewpoint_c {
            Some(dew) => format!("Temperature: {temp}°C | Dewpoint: {dew}°C"),
            None => format!("Temperature: {temp}°C"),
        });
    }
    parts.push(format!(
        "Conditions: {}",
        category_label(metar.flight_category)
    ));
    parts.join("\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// External backend (OpenAI-compatible chat completions)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: Role,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Chat-completions decider for a local model server such as Ollama.
///
/// Every failure mode (transport, timeout, empty choices, persistently
/// malformed replies) downgrades to [`PatternDecider`] for that call, so the
/// loop proceeds regardless of LLM health.
pub struct ExternalDecider {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    /// Serialized tool catalog injected into the system prompt.
    catalog: String,
    fallback: PatternDecider,
}

impl ExternalDecider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: std::time::Duration,
        catalog: String,
    ) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client,
            catalog,
            fallback: PatternDecider::new(),
        }
    }

    fn complete(&self, messages: &[ChatMessage]) -> Result<String, FlightError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };
        let response: ChatResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| FlightError::LlmUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| FlightError::LlmUnavailable(e.to_string()))?
            .json()
            .map_err(|e| FlightError::LlmMalformed(e.to_string()))?;
        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| FlightError::LlmMalformed("empty choices array".to_string()))
    }

    fn conversation(&self, state: &AgentState) -> Vec<ChatMessage> {
        let system = format!(
            "You are a flight assistant with access to tools.\n\n\
             AVAILABLE TOOLS:\n{}\n\n\
             Reply with exactly one JSON object and nothing else:\n\
             - to call a tool: {{\"action\": \"call_tool\", \"name\": \"<tool>\", \"args\": {{…}}}}\n\
             - to answer:      {{\"action\": \"final\", \"text\": \"<answer>\"}}\n\
             - to give up:     {{\"action\": \"abort\", \"reason\": \"<why>\"}}\n\n\
             Your answer is verified against recomputed wind math. Keep any crosswind \
             figure within 3 knots of the true value or you will be asked to recalculate.",
            self.catalog
        );
        let mut messages = vec![
            ChatMessage {
                role: Role::System,
                content: system,
            },
            ChatMessage {
                role: Role::User,
                content: state.query.clone(),
            },
        ];
        for step in &state.transcript {
            if let Decision::CallTool { name, args } = &step.action {
                messages.push(ChatMessage {
                    role: Role::Assistant,
                    content: serde_json::json!({
                        "action": "call_tool",
                        "name": name,
                        "args": args,
                    })
                    .to_string(),
                });
                let observation = step
                    .observation
                    .as_ref()
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "(no result)".to_string());
                messages.push(ChatMessage {
                    role: Role::User,
                    content: format!("TOOL RESULT for {name}: {observation}"),
                });
            }
        }
        messages
    }

    fn try_decide(&self, state: &AgentState) -> Result<Decision, FlightError> {
        let mut messages = self.conversation(state);
        let reply = self.complete(&messages)?;
        match parse_decision(&reply) {
            Ok(decision) => Ok(decision),
            Err(first_err) => {
                // One corrective retry before downgrading.
                tracing::warn!(error = %first_err, "malformed LLM reply; retrying once");
                messages.push(ChatMessage {
                    role: Role::Assistant,
                    content: reply,
                });
                messages.push(ChatMessage {
                    role: Role::User,
                    content: "That was not a valid decision object. Reply with exactly \
                              one JSON object matching the decision schema."
                        .to_string(),
                });
                let retry = self.complete(&messages)?;
                parse_decision(&retry)
            }
        }
    }

    fn ask_text(&self, prompt: &str, state: &AgentState) -> Result<String, FlightError> {
        let mut messages = self.conversation(state);
        messages.push(ChatMessage {
            role: Role::User,
            content: prompt.to_string(),
        });
        let reply = self.complete(&messages)?;
        let trimmed = reply.trim();
        if trimmed.is_empty() {
            return Err(FlightError::LlmMalformed("empty reply".to_string()));
        }
        // A decision-shaped reply to a prose prompt still carries the text.
        if let Ok(Decision::Final { text }) = parse_decision(trimmed) {
            return Ok(text);
        }
        Ok(trimmed.to_string())
    }
}

impl Decider for ExternalDecider {
    fn decide(&mut self, state: &AgentState) -> Decision {
        match self.try_decide(state) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::warn!(error = %e, "LLM decide failed; downgrading to pattern backend");
                self.fallback.decide(state)
            }
        }
    }

    fn reflect(&mut self, verification: &VerificationResult, state: &AgentState) -> String {
        let prompt = verification
            .reflection_prompt
            .clone()
            .unwrap_or_else(|| "Recalculate the crosswind and restate your answer.".to_string());
        match self.ask_text(&prompt, state) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "LLM reflection failed; downgrading to pattern backend");
                self.fallback.reflect(verification, state)
            }
        }
    }

    fn summarize(&mut self, state: &AgentState) -> String {
        match self.ask_text(
            "Time is up. Summarize what you know so far into a final answer.",
            state,
        ) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "LLM summarize failed; downgrading to pattern backend");
                self.fallback.summarize(state)
            }
        }
    }
}

/// Parse a raw model reply into a [`Decision`].
///
/// Accepts a bare JSON object (optionally inside code fences or surrounding
/// prose). A reply with an `action`-bearing object that does not deserialize
/// is malformed; a plain prose reply is taken as a final answer.
fn parse_decision(reply: &str) -> Result<Decision, FlightError> {
    let cleaned = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            let candidate = &cleaned[start..=end];
            match serde_json::from_str::<Decision>(candidate) {
                Ok(decision) => return Ok(decision),
                Err(e) => {
                    // Only treat it as malformed when it was clearly meant to
                    // be a decision object.
                    let looks_like_decision = serde_json::from_str::<serde_json::Value>(candidate)
                        .map(|v| v.get("action").is_some())
                        .unwrap_or(true);
                    if looks_like_decision {
                        return Err(FlightError::LlmMalformed(e.to_string()));
                    }
                }
            }
        }
    }

    if cleaned.is_empty() {
        Err(FlightError::LlmMalformed("empty reply".to_string()))
    } else {
        Ok(Decision::Final {
            text: cleaned.to_string(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
