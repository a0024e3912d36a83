//! FAA/ICAO radio phraseology from METAR data.
//!
//! Converts numbers to digit-by-digit spoken words ("260" → "two six zero")
//! and assembles clearances and advisories the way a tower would read them.

use aeroguard_types::{FlightCategory, MetarRecord};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which transmission to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhraseType {
    #[default]
    LandingClearance,
    Approach,
    WindAdvisory,
    RunwayAdvisory,
}

/// A generated transmission with its building blocks.
#[derive(Debug, Clone, Serialize)]
pub struct AtcPhrase {
    pub phrase: String,
    pub full_transmission: String,
    pub wind: String,
    pub runway: String,
    pub conditions: String,
    pub callsign: String,
}

/// Read a digit string one digit at a time, leading zeros included.
fn spoken_digits(digits: &str) -> String {
    const ONES: [&str; 10] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
    ];
    digits
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| ONES[d as usize])
        .collect::<Vec<_>>()
        .join(" ")
}

/// ATC-style spoken digits: each digit read individually.
pub fn number_to_words(num: u32) -> String {
    spoken_digits(&num.to_string())
}

/// "wind two six zero at one three gusts two zero"
///
/// The direction is always read as three digits ("090" → "zero nine zero").
pub fn wind_to_phrase(direction: u16, speed: u16, gust: Option<u16>) -> String {
    let mut phrase = format!(
        "wind {} at {}",
        spoken_digits(&format!("{direction:03}")),
        number_to_words(u32::from(speed)),
    );
    if let Some(g) = gust {
        if g > speed {
            phrase.push_str(&format!(" gusts {}", number_to_words(u32::from(g))));
        }
    }
    phrase
}

/// "runway two six", "runway one seven left", "runway zero eight right"
pub fn runway_to_phrase(designator: &str) -> String {
    let digits: String = designator.chars().filter(|c| c.is_ascii_digit()).collect();
    let suffix: String = designator
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    if digits.is_empty() {
        return String::new();
    }
    let mut phrase = format!("runway {}", spoken_digits(&digits));
    let side = match suffix.as_str() {
        "L" => Some("left"),
        "R" => Some("right"),
        "C" => Some("center"),
        _ => None,
    };
    if let Some(side) = side {
        phrase.push(' ');
        phrase.push_str(side);
    }
    phrase
}

fn conditions_phrase(category: FlightCategory) -> String {
    match category {
        FlightCategory::Vfr => "visual flight rules".to_string(),
        FlightCategory::Mvfr => "marginal visual flight rules".to_string(),
        FlightCategory::Ifr => "instrument flight rules".to_string(),
        FlightCategory::Lifr => "low instrument flight rules".to_string(),
        FlightCategory::Unknown => "conditions unknown".to_string(),
    }
}

/// Build the requested transmission from a METAR and runway designator.
///
/// Returns `None` when the METAR has no usable wind (a wind phrase anchors
/// every transmission form).
pub fn generate_atc_phrase(
    metar: &MetarRecord,
    runway_designator: &str,
    phrase_type: PhraseType,
    station_callsign: Option<&str>,
) -> Option<AtcPhrase> {
    let (dir, speed) = (metar.wind_direction?, metar.wind_speed?);
    let wind = wind_to_phrase(dir, speed, metar.wind_gust);
    let runway = runway_to_phrase(runway_designator);
    let conditions = conditions_phrase(metar.flight_category);
    let callsign = station_callsign
        .map(str::to_string)
        .unwrap_or_else(|| metar.station.clone());

    let phrase = match phrase_type {
        PhraseType::LandingClearance => format!("{wind}, {runway}, cleared to land"),
        PhraseType::Approach => format!("expect {runway}, conditions {conditions}"),
        PhraseType::WindAdvisory => wind.clone(),
        PhraseType::RunwayAdvisory => runway.clone(),
    };

    Some(AtcPhrase {
        full_transmission: format!("{callsign} {phrase}"),
        phrase,
        wind,
        runway,
        conditions,
        callsign,
    })
}
