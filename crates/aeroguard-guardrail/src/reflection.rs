//! Reflection and safe-fail: the second and third guardrail layers.
//!
//! [`run_pipeline`] drives the full terminal sequence for one draft answer:
//! verify, and on failure ask the decider (via the `reflect` callback) for a
//! corrected answer and verify that too; if the correction still does not
//! pass, the answer is replaced by a conservative safe-fail text that quotes
//! the mathematically verified value and an audit trace id.
//!
//! Exactly one `guardrail_pass`/`guardrail_fail` audit record is written per
//! terminal outcome; a reflection attempt additionally writes a `reflection`
//! record and a tripped safe-fail a `safe_fail` record.

use aeroguard_audit::{AuditCategory, AuditSink, AuditTrace};
use aeroguard_types::{MetarRecord, VerificationResult, VerificationStatus};

use crate::verifier::CrosswindGuardrail;

/// Progress notifications for the streaming loop variant, in causal order:
/// `Reflection` when the draft failed, `SafeFail` when the reflection failed
/// too, and exactly one `Guardrail` per terminal path carrying the terminal
/// status.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Guardrail {
        status: VerificationStatus,
        discrepancy: Option<f64>,
    },
    Reflection {
        reason: String,
    },
    SafeFail {
        trace_id: String,
    },
}

/// Terminal result of the guardrail pipeline.
#[derive(Debug, Clone)]
pub struct GuardrailOutcome {
    /// The answer to return: the draft, the corrected answer, or the
    /// safe-fail text.
    pub answer_text: String,
    /// Terminal guardrail status for the response envelope.
    pub status: VerificationStatus,
    /// True only on the safe-fail path.
    pub is_fallback: bool,
    /// The verification backing `status` (the reflected one when a
    /// reflection ran).
    pub verification: VerificationResult,
    /// True when a reflection pass was attempted.
    pub reflected: bool,
}

/// Run verify → reflect → safe-fail over `draft`.
///
/// `reflect` is called at most once, with the failed verification, and must
/// return a replacement answer (the pattern backend templates it from the
/// mathematical truth; an LLM backend re-prompts). `events` receives
/// [`PipelineEvent`]s in causal order for streaming; whatever the path
/// (pass, reflect+pass, or safe-fail), exactly one `Guardrail` event is
/// emitted, carrying the terminal status.
pub fn run_pipeline(
    guardrail: &CrosswindGuardrail,
    draft: &str,
    metar: Option<&MetarRecord>,
    runway_heading_deg: Option<u16>,
    sink: &AuditSink,
    reflect: impl FnOnce(&VerificationResult) -> String,
    mut events: impl FnMut(PipelineEvent),
) -> GuardrailOutcome {
    let initial = guardrail.verify(draft, metar, runway_heading_deg);

    match initial.status {
        VerificationStatus::Passed | VerificationStatus::Skipped => {
            events(PipelineEvent::Guardrail {
                status: initial.status,
                discrepancy: initial.discrepancy,
            });
            write_guardrail_record(sink, metar, runway_heading_deg, &initial, false);
            GuardrailOutcome {
                answer_text: draft.to_string(),
                status: initial.status,
                is_fallback: false,
                verification: initial,
                reflected: false,
            }
        }
        VerificationStatus::Failed => {
            tracing::warn!(
                claim = ?initial.agent_claim,
                truth = ?initial.mathematical_truth,
                "guardrail failed; triggering reflection"
            );
            events(PipelineEvent::Reflection {
                reason: initial.reason.clone(),
            });
            write_reflection_record(sink, metar, &initial);

            let corrected = reflect(&initial);
            let second = guardrail.verify(&corrected, metar, runway_heading_deg);

            if second.status == VerificationStatus::Passed {
                events(PipelineEvent::Guardrail {
                    status: second.status,
                    discrepancy: second.discrepancy,
                });
                write_guardrail_record(sink, metar, runway_heading_deg, &second, true);
                GuardrailOutcome {
                    answer_text: corrected,
                    status: VerificationStatus::Passed,
                    is_fallback: false,
                    verification: second,
                    reflected: true,
                }
            } else {
                // Reflection failed or skipped: last line of defense. The
                // single guardrail event reports the terminal verdict.
                let trace_id = write_safe_fail_record(sink, metar, runway_heading_deg, &initial, &second);
                events(PipelineEvent::SafeFail {
                    trace_id: trace_id.clone(),
                });
                events(PipelineEvent::Guardrail {
                    status: VerificationStatus::Failed,
                    discrepancy: second.discrepancy.or(initial.discrepancy),
                });
                write_guardrail_record(sink, metar, runway_heading_deg, &second, true);
                let text = safe_fail_text(metar, &initial, &trace_id);
                GuardrailOutcome {
                    answer_text: text,
                    status: VerificationStatus::Failed,
                    is_fallback: true,
                    verification: second,
                    reflected: true,
                }
            }
        }
    }
}

/// The conservative safe-fail answer. Always returns a string; never fails.
///
/// Names the airport and tracked wind, states the mathematically verified
/// crosswind, and tells the reader to verify independently, with the audit
/// trace id embedded for traceability.
pub fn safe_fail_text(
    metar: Option<&MetarRecord>,
    initial_failure: &VerificationResult,
    trace_id: &str,
) -> String {
    let (station, wind) = match metar {
        Some(m) => (m.station.clone(), m.wind_summary()),
        None => ("the requested airport".to_string(), "unavailable".to_string()),
    };
    let truth = initial_failure
        .mathematical_truth
        .map(|t| format!("{t:.2} kt"))
        .unwrap_or_else(|| "unavailable".to_string());

    format!(
        "VERIFICATION FAILURE - CONSERVATIVE GUIDANCE\n\n\
         I could not produce a verified crosswind figure for {station}. \
         For safety, use the primary data directly:\n\n\
         Current wind: {wind}\n\
         Mathematically verified crosswind component: {truth}\n\n\
         RECOMMENDATION: verify wind conditions independently before flight. \
         Consult the METAR/TAF directly and perform your own crosswind calculation.\n\n\
         [audit trace {trace_id}: response generated via safe-fail path]"
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Audit records
// ─────────────────────────────────────────────────────────────────────────────

fn base_context(trace: &mut AuditTrace, metar: Option<&MetarRecord>, runway: Option<u16>) {
    if let Some(m) = metar {
        trace.set_context("airport", &m.station);
        trace.set_context("wind", m.wind_summary());
    }
    if let Some(hdg) = runway {
        trace.set_context("runway_heading", hdg);
    }
}

fn write_guardrail_record(
    sink: &AuditSink,
    metar: Option<&MetarRecord>,
    runway: Option<u16>,
    verification: &VerificationResult,
    reflected: bool,
) {
    let category = match verification.status {
        VerificationStatus::Failed => AuditCategory::GuardrailFail,
        _ => AuditCategory::GuardrailPass,
    };
    let mut trace = AuditTrace::new(category);
    base_context(&mut trace, metar, runway);
    trace.set_context("status", verification.status);
    trace.set_context("reflected", reflected);
    trace.log_event(
        "verification",
        serde_json::json!({
            "agent_claim": verification.agent_claim,
            "mathematical_truth": verification.mathematical_truth,
            "discrepancy": verification.discrepancy,
            "reason": verification.reason,
        }),
    );
    trace.emit(sink);
}

fn write_reflection_record(
    sink: &AuditSink,
    metar: Option<&MetarRecord>,
    initial: &VerificationResult,
) {
    let mut trace = AuditTrace::new(AuditCategory::Reflection);
    base_context(&mut trace, metar, None);
    trace.log_event(
        "reflection",
        serde_json::json!({
            "failed_claim": initial.agent_claim,
            "mathematical_truth": initial.mathematical_truth,
            "discrepancy": initial.discrepancy,
        }),
    );
    trace.emit(sink);
}

fn write_safe_fail_record(
    sink: &AuditSink,
    metar: Option<&MetarRecord>,
    runway: Option<u16>,
    initial: &VerificationResult,
    reflected: &VerificationResult,
) -> String {
    let mut trace = AuditTrace::new(AuditCategory::SafeFail);
    base_context(&mut trace, metar, runway);
    trace.set_context("original_claim", initial.agent_claim);
    trace.set_context("original_discrepancy", initial.discrepancy);
    trace.set_context("reflection_claim", reflected.agent_claim);
    trace.set_context("reflection_discrepancy", reflected.discrepancy);
    trace.log_input(
        metar.map(|m| m.raw.as_str()),
        metar.map(|m| m.wind_summary()).as_deref(),
    );
    trace.log_event(
        "safe_fail",
        serde_json::json!({
            "reason": "guardrail failed after reflection",
            "mathematical_truth": initial.mathematical_truth,
        }),
    );
    let trace_id = trace.trace_id().to_string();
    trace.emit(sink);
    trace_id
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
