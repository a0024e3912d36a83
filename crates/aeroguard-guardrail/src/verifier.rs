//! [`CrosswindGuardrail`] – the 3-knot verification rule.
//!
//! Verification is deliberately skip-friendly: with no tracked METAR, no
//! tracked runway, null wind numerics, or no extractable claim there is
//! nothing to check, and `skipped` is a first-class outcome rather than an
//! error. When everything is present, the crosswind is recomputed from the
//! tracked primary data and the answer fails only when it disagrees beyond
//! the tolerance (strictly `<=`: the boundary value passes).

use aeroguard_types::{MetarRecord, VerificationResult, VerificationStatus};
use aeroguard_wind::{angle_between, crosswind, extract_claim, true_to_magnetic, variation_for};

/// Policy knobs the verifier reads. Immutable after construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardrailPolicy {
    /// Maximum tolerated |claim − truth| in knots.
    pub threshold_kt: f64,
    /// Verify against gust speed when a gust above sustained is reported.
    pub use_gust: bool,
    /// Convert wind direction true → magnetic for stations with a known
    /// declination before taking the runway angle.
    pub magnetic_correction: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self {
            threshold_kt: 3.0,
            use_gust: false,
            magnetic_correction: true,
        }
    }
}

/// Verifies crosswind claims in answer text against recomputed truth.
#[derive(Debug, Clone, Default)]
pub struct CrosswindGuardrail {
    policy: GuardrailPolicy,
}

/// Wind numbers the verifier settled on, reported alongside the result for
/// audit context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifiedWind {
    pub direction_true_deg: f64,
    pub direction_used_deg: f64,
    pub speed_used_kt: f64,
    pub gust_used: bool,
    pub angle_deg: f64,
}

impl CrosswindGuardrail {
    pub fn new(policy: GuardrailPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &GuardrailPolicy {
        &self.policy
    }

    /// Verify `answer_text` against the tracked METAR and runway heading.
    ///
    /// Returns a `Skipped` result when any required input is missing, a
    /// `Passed` result when the claim is within tolerance, and a `Failed`
    /// result carrying a reflection prompt otherwise.
    pub fn verify(
        &self,
        answer_text: &str,
        metar: Option<&MetarRecord>,
        runway_heading_deg: Option<u16>,
    ) -> VerificationResult {
        self.verify_with_wind(answer_text, metar, runway_heading_deg).0
    }

    /// [`CrosswindGuardrail::verify`], also returning the wind numbers used
    /// (when the math ran) for audit records.
    pub fn verify_with_wind(
        &self,
        answer_text: &str,
        metar: Option<&MetarRecord>,
        runway_heading_deg: Option<u16>,
    ) -> (VerificationResult, Option<VerifiedWind>) {
        let Some(metar) = metar else {
            return (
                VerificationResult::skipped("no METAR observed during tool execution"),
                None,
            );
        };
        let Some(runway_heading) = runway_heading_deg else {
            return (
                VerificationResult::skipped("no runway heading observed during tool execution"),
                None,
            );
        };
        let Some(wind_dir) = metar.wind_direction else {
            return (
                VerificationResult::skipped("wind direction is variable or unreported"),
                None,
            );
        };
        let Some(wind_speed) = metar.wind_speed else {
            return (
                VerificationResult::skipped("wind speed unreported"),
                None,
            );
        };
        let Some(claim) = extract_claim(answer_text) else {
            return (
                VerificationResult::skipped("no crosswind claim detected in answer"),
                None,
            );
        };

        // Gust policy: only a gust above the sustained speed replaces it.
        let (speed_used, gust_used) = match metar.wind_gust {
            Some(gust) if self.policy.use_gust && gust > wind_speed => (f64::from(gust), true),
            _ => (f64::from(wind_speed), false),
        };

        let variation = if self.policy.magnetic_correction {
            variation_for(&metar.station)
        } else {
            None
        };
        let direction_used = true_to_magnetic(f64::from(wind_dir), variation);

        let angle = angle_between(direction_used, f64::from(runway_heading));
        let truth = round2(crosswind(speed_used, angle));
        let discrepancy = (claim - truth).abs();
        let wind = VerifiedWind {
            direction_true_deg: f64::from(wind_dir),
            direction_used_deg: direction_used,
            speed_used_kt: speed_used,
            gust_used,
            angle_deg: angle,
        };

        if discrepancy <= self.policy.threshold_kt {
            let result = VerificationResult {
                status: VerificationStatus::Passed,
                agent_claim: Some(claim),
                mathematical_truth: Some(truth),
                discrepancy: Some(discrepancy),
                reason: format!(
                    "claim {claim} kt within {} kt of computed {truth} kt ({} speed)",
                    self.policy.threshold_kt,
                    if gust_used { "gust" } else { "sustained" },
                ),
                reflection_prompt: None,
            };
            (result, Some(wind))
        } else {
            let prompt = format!(
                "VERIFICATION FAILED - please recalculate.\n\
                 The answer claimed a {claim} kt crosswind, but the tracked data disagrees.\n\
                 Wind: {speed_used:.0} kt from {direction_used:.1}°\n\
                 Runway heading: {runway_heading}°\n\
                 Angle between wind and runway: {angle:.1}°\n\
                 Crosswind = {speed_used:.0} × sin({angle:.1}°) = {truth:.2} kt\n\
                 Re-read the wind data and runway heading, then restate the answer with \
                 the correct crosswind component of {truth:.2} kt.",
            );
            let result = VerificationResult {
                status: VerificationStatus::Failed,
                agent_claim: Some(claim),
                mathematical_truth: Some(truth),
                discrepancy: Some(discrepancy),
                reason: format!(
                    "claim {claim} kt differs from computed {truth} kt by {discrepancy:.2} kt \
                     (threshold {} kt)",
                    self.policy.threshold_kt,
                ),
                reflection_prompt: Some(prompt),
            };
            (result, Some(wind))
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use aeroguard_types::{FlightCategory, MetarSource};

    fn metar(station: &str, dir: Option<u16>, speed: Option<u16>, gust: Option<u16>) -> MetarRecord {
        MetarRecord {
            station: station.to_string(),
            time: "180953Z".to_string(),
            raw: format!("METAR {station} 180953Z ..."),
            wind_direction: dir,
            wind_speed: speed,
            wind_gust: gust,
            temperature_c: Some(1.0),
            dewpoint_c: Some(-13.0),
            visibility_sm: Some(10.0),
            altimeter: Some("30.06 inHg".to_string()),
            flight_category: FlightCategory::Vfr,
            source: MetarSource::Live,
        }
    }

    fn uncorrected() -> CrosswindGuardrail {
        CrosswindGuardrail::new(GuardrailPolicy {
            magnetic_correction: false,
            ..GuardrailPolicy::default()
        })
    }

    #[test]
    fn accurate_claim_passes() {
        // 220 @ 10 vs runway 260, uncorrected: truth = 10·sin(40°) ≈ 6.43.
        let g = uncorrected();
        let result = g.verify(
            "The crosswind component is approximately 7.5 knots.",
            Some(&metar("KDEN", Some(220), Some(10), None)),
            Some(260),
        );
        assert_eq!(result.status, VerificationStatus::Passed);
        assert_eq!(result.agent_claim, Some(7.5));
        assert!((result.mathematical_truth.unwrap() - 6.43).abs() < 0.01);
        assert!(result.discrepancy.unwrap() < 3.0);
    }

    #[test]
    fn inaccurate_claim_fails_with_reflection_prompt() {
        let g = uncorrected();
        let result = g.verify(
            "The crosswind component is approximately 15.5 knots.",
            Some(&metar("KDEN", Some(220), Some(10), None)),
            Some(260),
        );
        assert_eq!(result.status, VerificationStatus::Failed);
        assert!(result.discrepancy.unwrap() > 3.0);
        let prompt = result.reflection_prompt.expect("failure carries a prompt");
        assert!(prompt.contains("sin(40.0°)"));
        assert!(prompt.contains("6.43 kt"));
        assert!(prompt.contains("260°"));
    }

    #[test]
    fn magnetic_correction_shifts_truth() {
        // KDEN declination +7.5°E: wind 220 true → 212.5 magnetic, Δ = 47.5°,
        // truth = 10·sin(47.5°) ≈ 7.37.
        let g = CrosswindGuardrail::default();
        let (result, wind) = g.verify_with_wind(
            "The crosswind is 7.4 kt.",
            Some(&metar("KDEN", Some(220), Some(10), None)),
            Some(260),
        );
        assert_eq!(result.status, VerificationStatus::Passed);
        assert!((result.mathematical_truth.unwrap() - 7.37).abs() < 0.01);
        let wind = wind.unwrap();
        assert!((wind.direction_used_deg - 212.5).abs() < 1e-9);
        assert!((wind.angle_deg - 47.5).abs() < 1e-9);
    }

    #[test]
    fn unknown_station_verifies_uncorrected() {
        // RPLL is not in the variation catalog: 270 @ 11 vs 060 → Δ = 150°,
        // truth = 11·sin(150°) = 5.5.
        let g = CrosswindGuardrail::default();
        let result = g.verify(
            "Expect a 5.5 kt crosswind on runway 06.",
            Some(&metar("RPLL", Some(270), Some(11), None)),
            Some(60),
        );
        assert_eq!(result.status, VerificationStatus::Passed);
        assert_eq!(result.mathematical_truth, Some(5.5));
        assert_eq!(result.discrepancy, Some(0.0));
    }

    #[test]
    fn boundary_discrepancy_passes() {
        // Truth 6.43; claim exactly threshold away must pass (<=, not <).
        let g = uncorrected();
        let result = g.verify(
            "The crosswind is 9.43 knots.",
            Some(&metar("KDEN", Some(220), Some(10), None)),
            Some(260),
        );
        assert_eq!(result.status, VerificationStatus::Passed);
        assert!(result.discrepancy.unwrap() <= 3.0);
    }

    #[test]
    fn verification_is_monotone_in_discrepancy() {
        let g = uncorrected();
        let m = metar("KDEN", Some(220), Some(10), None);
        // Truth ≈ 6.43. Claims walk away from it; status flips exactly once.
        let mut seen_failure = false;
        for claim in [6.4, 7.0, 8.0, 9.0, 9.4, 10.0, 12.0, 20.0] {
            let text = format!("crosswind is {claim} kt");
            let result = g.verify(&text, Some(&m), Some(260));
            match result.status {
                VerificationStatus::Passed => {
                    assert!(!seen_failure, "pass after fail at claim {claim}");
                }
                VerificationStatus::Failed => seen_failure = true,
                VerificationStatus::Skipped => panic!("unexpected skip at claim {claim}"),
            }
        }
        assert!(seen_failure, "largest claims must fail");
    }

    #[test]
    fn skip_when_no_metar() {
        let result = uncorrected().verify("crosswind is 5 kt", None, Some(260));
        assert_eq!(result.status, VerificationStatus::Skipped);
        assert!(result.reason.contains("METAR"));
    }

    #[test]
    fn skip_when_no_runway() {
        let m = metar("KDEN", Some(220), Some(10), None);
        let result = uncorrected().verify("crosswind is 5 kt", Some(&m), None);
        assert_eq!(result.status, VerificationStatus::Skipped);
        assert!(result.reason.contains("runway"));
    }

    #[test]
    fn skip_when_wind_direction_variable() {
        let m = metar("KDEN", None, Some(10), None);
        let result = uncorrected().verify("crosswind is 5 kt", Some(&m), Some(260));
        assert_eq!(result.status, VerificationStatus::Skipped);
        assert!(result.reason.contains("direction"));
    }

    #[test]
    fn skip_when_wind_speed_missing() {
        let m = metar("KDEN", Some(220), None, None);
        let result = uncorrected().verify("crosswind is 5 kt", Some(&m), Some(260));
        assert_eq!(result.status, VerificationStatus::Skipped);
        assert!(result.reason.contains("speed"));
    }

    #[test]
    fn skip_when_no_claim_in_answer() {
        let m = metar("KDEN", Some(220), Some(10), None);
        let result = uncorrected().verify("Weather looks good today.", Some(&m), Some(260));
        assert_eq!(result.status, VerificationStatus::Skipped);
        assert!(result.reason.contains("claim"));
    }

    #[test]
    fn gust_policy_selects_stronger_gust() {
        let g = CrosswindGuardrail::new(GuardrailPolicy {
            use_gust: true,
            magnetic_correction: false,
            ..GuardrailPolicy::default()
        });
        let m = metar("KDEN", Some(220), Some(10), Some(15));
        // Truth with gust: 15·sin(40°) ≈ 9.64.
        let (result, wind) = g.verify_with_wind("crosswind is 9.5 kt", Some(&m), Some(260));
        assert_eq!(result.status, VerificationStatus::Passed);
        let wind = wind.unwrap();
        assert!(wind.gust_used);
        assert_eq!(wind.speed_used_kt, 15.0);
        assert!((result.mathematical_truth.unwrap() - 9.64).abs() < 0.01);
    }

    #[test]
    fn gust_policy_ignores_weaker_gust() {
        let g = CrosswindGuardrail::new(GuardrailPolicy {
            use_gust: true,
            magnetic_correction: false,
            ..GuardrailPolicy::default()
        });
        let m = metar("KDEN", Some(220), Some(10), Some(9));
        let (_, wind) = g.verify_with_wind("crosswind is 6.4 kt", Some(&m), Some(260));
        assert!(!wind.unwrap().gust_used);
    }

    #[test]
    fn gust_ignored_when_policy_off() {
        let g = uncorrected();
        let m = metar("KDEN", Some(220), Some(10), Some(25));
        let (_, wind) = g.verify_with_wind("crosswind is 6.4 kt", Some(&m), Some(260));
        assert_eq!(wind.unwrap().speed_used_kt, 10.0);
    }

    #[test]
    fn verification_is_deterministic() {
        let g = CrosswindGuardrail::default();
        let m = metar("KDEN", Some(220), Some(10), Some(15));
        let a = g.verify("crosswind is 8 kt", Some(&m), Some(260));
        let b = g.verify("crosswind is 8 kt", Some(&m), Some(260));
        assert_eq!(a, b);
    }
}
