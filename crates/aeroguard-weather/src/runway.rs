//! Runway selection against the current wind.
//!
//! Given an airport and wind, picks the runway whose heading minimizes the
//! crosswind component; ties prefer the larger (most positive) headwind so a
//! tailwind is never chosen when an into-wind runway exists. Airports
//! without a compiled-in catalog get a synthetic headwind-aligned designator
//! derived from the wind direction itself.

use aeroguard_types::RunwaySelection;
use aeroguard_wind::{true_to_magnetic, variation_for, WindGeometry};

/// Compiled-in runway designators for the fallback-catalog airports.
const RUNWAY_CATALOG: &[(&str, &[&str])] = &[
    (
        "KDEN",
        &[
            "07", "08", "16L", "16R", "17L", "17R", "25", "26", "34L", "34R", "35L", "35R",
        ],
    ),
    ("KBDU", &["08", "26"]),
    (
        "KJFK",
        &["04L", "04R", "13L", "13R", "22L", "22R", "31L", "31R"],
    ),
    (
        "KMCO",
        &["17L", "17R", "18L", "18R", "35L", "35R", "36L", "36R"],
    ),
    ("RPLL", &["06", "24", "13", "31"]),
];

fn catalog_for(icao: &str) -> Option<&'static [&'static str]> {
    RUNWAY_CATALOG
        .iter()
        .find(|(airport, _)| *airport == icao)
        .map(|(_, runways)| *runways)
}

/// Magnetic runway heading implied by a designator: number × 10, mod 360.
/// `"26"` → 260, `"17L"` → 170, `"36"` → 0. Returns `None` when the
/// designator carries no digits.
pub fn heading_from_designator(designator: &str) -> Option<u16> {
    let digits: String = designator.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let number: u32 = digits.parse().ok()?;
    Some(((number * 10) % 360) as u16)
}

/// Pick the best runway at `icao` for wind from `wind_dir_deg` (true) at
/// `speed_kt`.
///
/// When `magnetic_correction` is set and the station's declination is known,
/// the wind direction is converted to magnetic before comparison against the
/// (magnetic) runway headings. A `None` wind direction (calm or variable)
/// selects the first catalog runway with zero assumed components.
pub fn select_runway(
    icao: &str,
    wind_dir_deg: Option<f64>,
    speed_kt: f64,
    magnetic_correction: bool,
) -> RunwaySelection {
    let variation = if magnetic_correction {
        variation_for(icao)
    } else {
        None
    };

    match (catalog_for(icao), wind_dir_deg) {
        (Some(runways), Some(dir)) => {
            let wind_mag = true_to_magnetic(dir, variation);
            let mut best: Option<(&str, u16, WindGeometry)> = None;
            for designator in runways {
                let Some(heading) = heading_from_designator(designator) else {
                    continue;
                };
                let geometry = WindGeometry::compute(wind_mag, speed_kt, f64::from(heading));
                let better = match &best {
                    None => true,
                    Some((_, _, current)) => {
                        geometry.crosswind_kt < current.crosswind_kt
                            || (geometry.crosswind_kt == current.crosswind_kt
                                && geometry.headwind_kt > current.headwind_kt)
                    }
                };
                if better {
                    best = Some((designator, heading, geometry));
                }
            }
            // The catalog always yields at least one numbered designator.
            let (designator, heading, geometry) = best.expect("non-empty runway catalog");
            RunwaySelection {
                airport: icao.to_string(),
                runway: designator.to_string(),
                heading_deg: heading,
                crosswind_kt: round2(geometry.crosswind_kt),
                headwind_kt: round2(geometry.headwind_kt),
                rationale: rationale(designator, &geometry),
            }
        }
        (Some(runways), None) => {
            let designator = runways[0];
            let heading = heading_from_designator(designator).unwrap_or(0);
            RunwaySelection {
                airport: icao.to_string(),
                runway: designator.to_string(),
                heading_deg: heading,
                crosswind_kt: 0.0,
                headwind_kt: 0.0,
                rationale: format!("Wind calm or variable; runway {designator} by default"),
            }
        }
        (None, dir) => synthetic_selection(icao, dir, speed_kt, variation),
    }
}

/// No catalog: align a synthetic runway with the wind so the headwind is
/// maximal, and report the implied designator.
fn synthetic_selection(
    icao: &str,
    wind_dir_deg: Option<f64>,
    speed_kt: f64,
    variation: Option<f64>,
) -> RunwaySelection {
    let dir = wind_dir_deg.map(|d| true_to_magnetic(d, variation)).unwrap_or(360.0);
    let mut number = ((dir / 10.0).round() as u32) % 36;
    if number == 0 {
        number = 36;
    }
    let heading = ((number * 10) % 360) as u16;
    let geometry = WindGeometry::compute(dir, speed_kt, f64::from(heading));
    RunwaySelection {
        airport: icao.to_string(),
        runway: format!("{number:02}"),
        heading_deg: heading,
        crosswind_kt: round2(geometry.crosswind_kt),
        headwind_kt: round2(geometry.headwind_kt),
        rationale: format!(
            "No runway catalog for {icao}; assuming an into-wind runway {number:02}"
        ),
    }
}

fn rationale(designator: &str, geometry: &WindGeometry) -> String {
    let headwind = geometry.headwind_kt;
    format!(
        "Runway {designator} favored, {:.1} kt {}, {:.1} kt crosswind",
        headwind.abs(),
        if headwind >= 0.0 { "headwind" } else { "tailwind" },
        geometry.crosswind_kt,
    )
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
