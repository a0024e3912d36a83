//! `aeroguard-guardrail` – the semantic safety net around the agent.
//!
//! Before any answer reaches a user, [`CrosswindGuardrail::verify`] re-derives
//! the safety-critical crosswind figure from the same primary data the answer
//! was built on (the tracked METAR and runway) and compares it against the
//! claim extracted from the answer text. Disagreement beyond the configured
//! tolerance forces a reflection pass; a reflection that still fails is
//! replaced by a conservative, audit-tagged safe-fail answer.
//!
//! The three layers compose in [`run_pipeline`]:
//!
//! | Initial verify | After reflect | Outcome |
//! |---|---|---|
//! | passed  | –              | draft, `passed`, not fallback |
//! | skipped | –              | draft, `skipped`, not fallback |
//! | failed  | passed         | corrected answer, `passed`, not fallback |
//! | failed  | failed/skipped | safe-fail text, `failed`, fallback |

pub mod reflection;
pub mod verifier;

pub use reflection::{run_pipeline, GuardrailOutcome, PipelineEvent};
pub use verifier::{CrosswindGuardrail, GuardrailPolicy};
