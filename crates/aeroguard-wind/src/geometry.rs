//! Crosswind/headwind trigonometry.
//!
//! Aviation convention: wind direction is where the wind blows *from*. The
//! crosswind component is the magnitude of the wind vector perpendicular to
//! the runway; the headwind component is the signed parallel part (negative
//! means tailwind).
//!
//! # Example
//!
//! ```
//! use aeroguard_wind::geometry::{angle_between, crosswind, headwind};
//!
//! // KDEN 220° @ 10 kt against runway 26 (260°): 40° off the nose.
//! let angle = angle_between(220.0, 260.0);
//! assert_eq!(angle, 40.0);
//! assert!((crosswind(10.0, angle) - 6.43).abs() < 0.01);
//! assert!((headwind(10.0, angle) - 7.66).abs() < 0.01);
//! ```

use serde::{Deserialize, Serialize};

/// Minimal angular difference between a wind direction and a runway heading,
/// in degrees, always in `[0, 180]`.
pub fn angle_between(wind_dir_deg: f64, runway_hdg_deg: f64) -> f64 {
    let delta = (wind_dir_deg - runway_hdg_deg).rem_euclid(360.0);
    delta.min(360.0 - delta)
}

/// Crosswind component magnitude: `|V · sin(Δ)|`.
pub fn crosswind(speed_kt: f64, angle_deg: f64) -> f64 {
    (speed_kt * angle_deg.to_radians().sin()).abs()
}

/// Signed headwind component: `V · cos(Δ)`. Negative means tailwind.
pub fn headwind(speed_kt: f64, angle_deg: f64) -> f64 {
    speed_kt * angle_deg.to_radians().cos()
}

/// Full wind-vs-runway decomposition for one runway heading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindGeometry {
    pub wind_direction_deg: f64,
    /// Speed actually used (gust when the gust policy selected it).
    pub speed_kt: f64,
    pub runway_heading_deg: f64,
    /// Minimal angle between wind and runway, `[0, 180]`.
    pub angle_deg: f64,
    pub crosswind_kt: f64,
    pub headwind_kt: f64,
}

impl WindGeometry {
    /// Decompose `speed_kt` of wind from `wind_direction_deg` against
    /// `runway_heading_deg`.
    pub fn compute(wind_direction_deg: f64, speed_kt: f64, runway_heading_deg: f64) -> Self {
        let angle_deg = angle_between(wind_direction_deg, runway_heading_deg);
        Self {
            wind_direction_deg,
            speed_kt,
            runway_heading_deg,
            angle_deg,
            crosswind_kt: crosswind(speed_kt, angle_deg),
            headwind_kt: headwind(speed_kt, angle_deg),
        }
    }
}
