//! Deterministic fallback METAR catalog.
//!
//! When live weather is unconfigured or unavailable the fetcher serves these
//! records instead. Every record is fixed per station so that tests and
//! repeated requests see identical data; unknown stations get a minimal
//! record with null numerics and `UNKNOWN` flight category.

use aeroguard_types::{FlightCategory, MetarRecord, MetarSource};

/// A deterministic fallback record for `icao`.
///
/// The station identifier is assumed to be validated (4 uppercase letters)
/// by the caller.
pub fn fallback_metar(icao: &str) -> MetarRecord {
    match icao {
        "KDEN" => MetarRecord {
            station: "KDEN".to_string(),
            time: "180953Z".to_string(),
            raw: "METAR KDEN 180953Z 22010G15KT 10SM FEW200 01/M13 A3006".to_string(),
            wind_direction: Some(220),
            wind_speed: Some(10),
            wind_gust: Some(15),
            temperature_c: Some(1.0),
            dewpoint_c: Some(-13.0),
            visibility_sm: Some(10.0),
            altimeter: Some("30.06 inHg".to_string()),
            flight_category: FlightCategory::Vfr,
            source: MetarSource::Fallback,
        },
        "KBDU" => MetarRecord {
            station: "KBDU".to_string(),
            time: "181856Z".to_string(),
            raw: "METAR KBDU 181856Z 20012G18KT 15SM FEW050 SCT120 BKN250 03/M05 A3006"
                .to_string(),
            wind_direction: Some(200),
            wind_speed: Some(12),
            wind_gust: Some(18),
            temperature_c: Some(3.0),
            dewpoint_c: Some(-5.0),
            visibility_sm: Some(15.0),
            altimeter: Some("30.06 inHg".to_string()),
            flight_category: FlightCategory::Vfr,
            source: MetarSource::Fallback,
        },
        "KJFK" => MetarRecord {
            station: "KJFK".to_string(),
            time: "181852Z".to_string(),
            raw: "METAR KJFK 181852Z 23025G32KT 8SM OVC050 02/M03 A2992".to_string(),
            wind_direction: Some(230),
            wind_speed: Some(25),
            wind_gust: Some(32),
            temperature_c: Some(2.0),
            dewpoint_c: Some(-3.0),
            visibility_sm: Some(8.0),
            altimeter: Some("29.92 inHg".to_string()),
            flight_category: FlightCategory::Mvfr,
            source: MetarSource::Fallback,
        },
        "KMCO" => MetarRecord {
            station: "KMCO".to_string(),
            time: "181853Z".to_string(),
            raw: "METAR KMCO 181853Z 09008KT 10SM FEW030 SCT250 26/22 A3008".to_string(),
            wind_direction: Some(90),
            wind_speed: Some(8),
            wind_gust: None,
            temperature_c: Some(26.0),
            dewpoint_c: Some(22.0),
            visibility_sm: Some(10.0),
            altimeter: Some("30.08 inHg".to_string()),
            flight_category: FlightCategory::Vfr,
            source: MetarSource::Fallback,
        },
        "RPLL" => MetarRecord {
            station: "RPLL".to_string(),
            time: "181830Z".to_string(),
            raw: "METAR RPLL 181830Z 27011KT 9999 FEW020 SCT100 BKN200 28/24 Q1010".to_string(),
            wind_direction: Some(270),
            wind_speed: Some(11),
            wind_gust: None,
            temperature_c: Some(28.0),
            dewpoint_c: Some(24.0),
            visibility_sm: Some(6.0),
            altimeter: Some("Q1010".to_string()),
            flight_category: FlightCategory::Vfr,
            source: MetarSource::Fallback,
        },
        // No registered fallback: minimal record, numerics unknown.
        other => MetarRecord {
            station: other.to_string(),
            time: "unknown".to_string(),
            raw: format!("METAR {other} (no data available)"),
            wind_direction: None,
            wind_speed: None,
            wind_gust: None,
            temperature_c: None,
            dewpoint_c: None,
            visibility_sm: None,
            altimeter: None,
            flight_category: FlightCategory::Unknown,
            source: MetarSource::Fallback,
        },
    }
}
