//! `aeroguard-tools` – the agent's hands.
//!
//! A [`ToolRegistry`] maps tool names to typed descriptors; the dispatcher
//! validates JSON arguments against each tool's declared schema-backed
//! argument struct and returns a structured result or a typed
//! [`ToolError`]. A failed dispatch is an observation for the reasoning
//! loop, never a panic.
//!
//! # Tools
//!
//! | Name | Purpose |
//! |---|---|
//! | `fetch_metar` | Current weather for an ICAO station |
//! | `select_best_runway` | Minimal-crosswind runway for the current wind |
//! | `fetch_aircraft_specs` | Aircraft performance data by tail number |
//! | `calculate_fuel_burn` | Simple burn model over distance and headwind |
//! | `query_manual` | Flight-manual snippets by topic |
//! | `log_flight_event` | Flight-event acknowledgment stub |
//! | `generate_atc_phrase` | FAA/ICAO spoken-word phraseology |

pub mod aircraft;
pub mod manual;
pub mod phraseology;
pub mod registry;

pub use registry::{ToolDescriptor, ToolError, ToolRegistry};
