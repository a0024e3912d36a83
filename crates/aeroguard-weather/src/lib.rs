//! `aeroguard-weather` – upstream weather contract and runway selection.
//!
//! [`WeatherFetcher`] wraps an AVWX-style station-keyed METAR REST endpoint
//! behind a contract that never fails for upstream reasons: transport
//! errors, bad statuses, and decode failures all degrade to the
//! deterministic per-station fallback catalog ([`fallback`]). The only error
//! it surfaces is a malformed ICAO identifier.
//!
//! [`runway`] picks the runway that minimizes crosswind for the current
//! wind, from a compiled-in per-airport catalog or, failing that, a
//! synthetic headwind-aligned designator.

pub mod fallback;
pub mod metar;
pub mod runway;

pub use fallback::fallback_metar;
pub use metar::WeatherFetcher;
pub use runway::{heading_from_designator, select_runway};
