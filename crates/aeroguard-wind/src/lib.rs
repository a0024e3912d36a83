//! `aeroguard-wind` – pure wind/geometry kernel.
//!
//! Everything here is CPU-only and side-effect free: wind-string parsing,
//! minimal-angle math, crosswind/headwind components, true↔magnetic heading
//! conversion, and extraction of numeric crosswind claims from free text.
//!
//! # Modules
//!
//! - [`parse`] – `"DDD @ SS G GG"` wind strings and the canonical formatter.
//! - [`geometry`] – [`angle_between`], [`crosswind`], [`headwind`], and the
//!   combined [`WindGeometry`] record.
//! - [`magnetic`] – declination helpers and the compiled-in per-station
//!   variation catalog.
//! - [`claim`] – [`extract_claim`], a hand-rolled token scanner for phrases
//!   like `"crosswind is 7.4 kt"`.

pub mod claim;
pub mod geometry;
pub mod magnetic;
pub mod parse;

pub use claim::extract_claim;
pub use geometry::{angle_between, crosswind, headwind, WindGeometry};
pub use magnetic::{magnetic_to_true, true_to_magnetic, variation_for};
pub use parse::{format_wind, parse_wind, ParsedWind, WindParseError};
