//! Aircraft specifications and the fuel-burn model.

use serde::Serialize;

/// Performance data for one airframe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AircraftSpecs {
    pub tail_number: &'static str,
    pub aircraft_type: &'static str,
    /// Usable fuel in gallons.
    pub max_fuel_gal: u32,
    /// Useful load in pounds.
    pub useful_load_lb: u32,
    /// Cruise speed in knots.
    pub cruise_speed_kt: u32,
    /// Still-air range in nautical miles.
    pub max_range_nm: u32,
}

const FLEET: &[AircraftSpecs] = &[
    AircraftSpecs {
        tail_number: "N12345",
        aircraft_type: "Cessna 172",
        max_fuel_gal: 53,
        useful_load_lb: 1100,
        cruise_speed_kt: 120,
        max_range_nm: 450,
    },
    AircraftSpecs {
        tail_number: "N67890",
        aircraft_type: "Piper Cherokee",
        max_fuel_gal: 48,
        useful_load_lb: 1050,
        cruise_speed_kt: 110,
        max_range_nm: 400,
    },
];

/// Look up specs by tail number.
pub fn specs_for(tail_number: &str) -> Option<&'static AircraftSpecs> {
    let wanted = tail_number.trim().to_ascii_uppercase();
    FLEET.iter().find(|s| s.tail_number == wanted)
}

/// Gallons-per-hour burn rate for an aircraft type. Unlisted types use the
/// conservative default.
fn burn_rate_gph(aircraft_type: &str) -> f64 {
    match aircraft_type {
        "Cessna 172" => 5.0,
        "Piper Cherokee" => 5.5,
        _ => 5.0,
    }
}

/// Fuel estimate for a leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuelBurn {
    pub distance_nm: f64,
    pub flight_hours: f64,
    pub burn_rate_gph: f64,
    pub total_fuel_gallons: f64,
}

/// Estimate fuel for `distance_nm` at an assumed 100 kt groundspeed basis,
/// with a 10% burn penalty per 10 kt of headwind.
pub fn calculate_fuel_burn(distance_nm: f64, aircraft_type: &str, headwind_kt: f64) -> FuelBurn {
    let base_rate = burn_rate_gph(aircraft_type);
    let penalty = (headwind_kt / 10.0) * 0.1;
    let adjusted = base_rate * (1.0 + penalty.max(0.0));
    let hours = distance_nm / 100.0;
    FuelBurn {
        distance_nm,
        flight_hours: round2(hours),
        burn_rate_gph: round2(adjusted),
        total_fuel_gallons: round2(hours * adjusted),
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
