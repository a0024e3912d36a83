//! [`WeatherFetcher`] – contract-bound wrapper over the upstream METAR API.
//!
//! Talks to an AVWX-style REST endpoint (`GET {base}/{icao}?token=…`) with a
//! blocking client and a hard timeout. The contract is deliberately narrow:
//!
//! - a malformed ICAO is the **only** error ([`FlightError::InvalidStation`]);
//! - every upstream problem (no key, transport error, bad status, undecodable
//!   body) degrades to the deterministic [`fallback_metar`] record with
//!   `source = fallback`;
//! - every fetch, live or degraded, writes a `fetch` audit record with its
//!   latency.

use std::time::{Duration, Instant};

use aeroguard_audit::{AuditCategory, AuditSink, AuditTrace};
use aeroguard_types::{FlightCategory, FlightError, MetarRecord, MetarSource};
use serde::Deserialize;

// ─────────────────────────────────────────────────────────────────────────────
// Upstream reply shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct AvwxNumber {
    value: Option<f64>,
}

#[derive(Deserialize)]
struct AvwxText {
    repr: Option<String>,
}

/// Subset of the AVWX METAR reply the fetcher consumes.
#[derive(Deserialize)]
struct AvwxReply {
    station: Option<String>,
    raw: Option<String>,
    time: Option<AvwxText>,
    wind_direction: Option<AvwxNumber>,
    wind_speed: Option<AvwxNumber>,
    wind_gust: Option<AvwxNumber>,
    temperature: Option<AvwxNumber>,
    dewpoint: Option<AvwxNumber>,
    visibility: Option<AvwxNumber>,
    altimeter: Option<AvwxText>,
    flight_rules: Option<String>,
}

fn category_from_rules(rules: Option<&str>) -> FlightCategory {
    match rules {
        Some("VFR") => FlightCategory::Vfr,
        Some("MVFR") => FlightCategory::Mvfr,
        Some("IFR") => FlightCategory::Ifr,
        Some("LIFR") => FlightCategory::Lifr,
        _ => FlightCategory::Unknown,
    }
}

fn opt_u16(field: &Option<AvwxNumber>) -> Option<u16> {
    field
        .as_ref()
        .and_then(|f| f.value)
        .filter(|v| *v >= 0.0 && *v <= 360.0)
        .map(|v| v.round() as u16)
}

// ─────────────────────────────────────────────────────────────────────────────
// Fetcher
// ─────────────────────────────────────────────────────────────────────────────

/// Blocking client for the upstream METAR provider. Construct once and reuse
/// across requests.
pub struct WeatherFetcher {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    sink: AuditSink,
}

impl WeatherFetcher {
    /// Create a fetcher for `base_url` (e.g. `"https://avwx.rest/api/metar"`).
    /// An empty `api_key` disables live fetches entirely; every lookup then
    /// serves the fallback catalog.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        sink: AuditSink,
    ) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client,
            sink,
        }
    }

    /// Fetch the current METAR for `icao`.
    ///
    /// # Errors
    ///
    /// [`FlightError::InvalidStation`] when `icao` is not 4 ASCII letters.
    /// Upstream failures never error; they surface as `source = fallback` on
    /// the returned record.
    pub fn fetch_metar(&self, icao: &str) -> Result<MetarRecord, FlightError> {
        let station = validate_icao(icao)?;
        let started = Instant::now();

        let live = if self.api_key.is_empty() {
            None
        } else {
            match self.fetch_live(&station) {
                Ok(rec) => Some(rec),
                Err(reason) => {
                    tracing::warn!(station = %station, %reason, "live METAR fetch failed; using fallback");
                    None
                }
            }
        };

        let ok = live.is_some();
        let record = live.unwrap_or_else(|| super::fallback_metar(&station));

        let mut trace = AuditTrace::new(AuditCategory::Fetch);
        trace.set_context("station", &station);
        trace.log_event(
            "fetch",
            serde_json::json!({
                "ok": ok,
                "source": record.source,
                "latency_ms": started.elapsed().as_millis() as u64,
            }),
        );
        trace.emit(&self.sink);

        Ok(record)
    }

    fn fetch_live(&self, station: &str) -> Result<MetarRecord, String> {
        let url = format!("{}/{station}", self.base_url);
        let reply: AvwxReply = self
            .client
            .get(&url)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?
            .json()
            .map_err(|e| format!("undecodable reply: {e}"))?;

        Ok(MetarRecord {
            station: reply.station.unwrap_or_else(|| station.to_string()),
            time: reply
                .time
                .and_then(|t| t.repr)
                .unwrap_or_else(|| "unknown".to_string()),
            raw: reply.raw.unwrap_or_default(),
            wind_direction: opt_u16(&reply.wind_direction),
            wind_speed: reply
                .wind_speed
                .as_ref()
                .and_then(|f| f.value)
                .filter(|v| *v >= 0.0)
                .map(|v| v.round() as u16),
            wind_gust: reply
                .wind_gust
                .as_ref()
                .and_then(|f| f.value)
                .filter(|v| *v >= 0.0)
                .map(|v| v.round() as u16),
            temperature_c: reply.temperature.and_then(|f| f.value),
            dewpoint_c: reply.dewpoint.and_then(|f| f.value),
            visibility_sm: reply.visibility.and_then(|f| f.value),
            altimeter: reply.altimeter.and_then(|t| t.repr),
            flight_category: category_from_rules(reply.flight_rules.as_deref()),
            source: MetarSource::Live,
        })
    }
}

/// Validate and normalize an ICAO identifier: exactly 4 ASCII letters.
pub fn validate_icao(icao: &str) -> Result<String, FlightError> {
    let trimmed = icao.trim();
    if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(trimmed.to_ascii_uppercase())
    } else {
        Err(FlightError::InvalidStation(icao.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_fetcher(sink: AuditSink) -> WeatherFetcher {
        // Empty key: never touches the network.
        WeatherFetcher::new(
            "https://avwx.rest/api/metar",
            "",
            Duration::from_millis(10),
            sink,
        )
    }

    #[test]
    fn validate_icao_accepts_and_uppercases() {
        assert_eq!(validate_icao("kden").unwrap(), "KDEN");
        assert_eq!(validate_icao(" RPLL ").unwrap(), "RPLL");
    }

    #[test]
    fn validate_icao_rejects_bad_shapes() {
        for bad in ["KDE", "KDENX", "K1EN", "", "K DE"] {
            assert!(
                matches!(validate_icao(bad), Err(FlightError::InvalidStation(_))),
                "{bad:?} must be rejected"
            );
        }
    }

    #[test]
    fn invalid_station_is_the_only_error() {
        let fetcher = offline_fetcher(AuditSink::disabled());
        assert!(matches!(
            fetcher.fetch_metar("not-an-icao"),
            Err(FlightError::InvalidStation(_))
        ));
    }

    #[test]
    fn no_key_serves_deterministic_fallback() {
        let fetcher = offline_fetcher(AuditSink::disabled());
        let a = fetcher.fetch_metar("KDEN").unwrap();
        let b = fetcher.fetch_metar("KDEN").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.source, MetarSource::Fallback);
        assert_eq!(a.wind_direction, Some(220));
    }

    #[test]
    fn unknown_station_never_errors() {
        let fetcher = offline_fetcher(AuditSink::disabled());
        let rec = fetcher.fetch_metar("EGLL").unwrap();
        assert_eq!(rec.source, MetarSource::Fallback);
        assert_eq!(rec.flight_category, FlightCategory::Unknown);
        assert!(!rec.has_wind());
    }

    #[test]
    fn fetch_writes_a_fetch_trace() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("audit.jsonl");
        let fetcher = offline_fetcher(AuditSink::open(&path));

        fetcher.fetch_metar("KMCO").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let rec: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(rec["category"], "fetch");
        assert_eq!(rec["context"]["station"], "KMCO");
        assert_eq!(rec["events"][0]["type"], "fetch");
        assert_eq!(rec["events"][0]["payload"]["ok"], false);
        assert!(rec["events"][0]["payload"]["latency_ms"].is_u64());
    }

    #[test]
    fn category_mapping_covers_all_rules() {
        assert_eq!(category_from_rules(Some("VFR")), FlightCategory::Vfr);
        assert_eq!(category_from_rules(Some("MVFR")), FlightCategory::Mvfr);
        assert_eq!(category_from_rules(Some("IFR")), FlightCategory::Ifr);
        assert_eq!(category_from_rules(Some("LIFR")), FlightCategory::Lifr);
        assert_eq!(category_from_rules(Some("???")), FlightCategory::Unknown);
        assert_eq!(category_from_rules(None), FlightCategory::Unknown);
    }
}
