//! [`ToolRegistry`] – typed tool table and dispatcher.
//!
//! Each tool is a [`ToolDescriptor`]: a name, a human description for the
//! LLM catalog, a JSON schema for its argument struct, and a typed closure.
//! [`ToolRegistry::dispatch`] deserializes the caller's JSON arguments into
//! the tool's argument type (rejecting unknown shapes and bad numerics as a
//! typed [`ToolError`]) and returns the tool's structured JSON result. A
//! dispatch failure is just an observation for the loop; nothing here
//! panics.

use std::collections::BTreeMap;
use std::sync::Arc;

use aeroguard_types::{FlightError, RunwaySelection};
use aeroguard_weather::{heading_from_designator, select_runway, WeatherFetcher};
use aeroguard_wind::{true_to_magnetic, variation_for, WindGeometry};
use schemars::{schema::RootSchema, schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aircraft;
use crate::manual;
use crate::phraseology::{self, PhraseType};

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Typed dispatch failures. The loop records these in the transcript and
/// decides what to do next.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("unknown tool {0:?}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArgs { tool: String, reason: String },

    #[error("{tool} failed: {reason}")]
    Execution { tool: String, reason: String },
}

impl ToolError {
    /// Structured form, suitable for storing as a transcript observation.
    pub fn to_observation(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Descriptor and registry
// ─────────────────────────────────────────────────────────────────────────────

type ToolFn = Box<dyn Fn(serde_json::Value) -> Result<serde_json::Value, ToolError> + Send + Sync>;

/// One named tool: metadata the LLM sees plus the typed implementation.
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub arg_schema: RootSchema,
    invoke: ToolFn,
}

/// Name-keyed tool table. Iteration order is stable (sorted by name) so the
/// serialized tool catalog is deterministic.
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, ToolDescriptor>,
}

impl ToolRegistry {
    /// An empty registry. Most callers want [`ToolRegistry::standard`].
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register (or replace) a descriptor.
    pub fn register(&mut self, descriptor: ToolDescriptor) {
        self.tools.insert(descriptor.name, descriptor);
    }

    /// All descriptors, sorted by name.
    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Validate `args` against the named tool and run it.
    ///
    /// # Errors
    ///
    /// [`ToolError::UnknownTool`] for unregistered names,
    /// [`ToolError::InvalidArgs`] when the arguments do not deserialize or
    /// fail a range check, [`ToolError::Execution`] when the tool itself
    /// reports a failure.
    pub fn dispatch(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let descriptor = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        (descriptor.invoke)(args)
    }

    /// The full tool set wired against a shared weather fetcher.
    pub fn standard(fetcher: Arc<WeatherFetcher>, magnetic_correction: bool) -> Self {
        let mut registry = Self::new();

        let f = Arc::clone(&fetcher);
        registry.register(ToolDescriptor {
            name: "fetch_metar",
            description:
                "Fetch current weather (METAR) for an airport ICAO code. Returns wind, \
                 visibility, temperature, and flight category.",
            arg_schema: schema_for!(FetchMetarArgs),
            invoke: Box::new(move |args| {
                let args: FetchMetarArgs = parse_args("fetch_metar", args)?;
                let record = f
                    .fetch_metar(&args.icao_code)
                    .map_err(|e| invalid("fetch_metar", e))?;
                to_json("fetch_metar", &record)
            }),
        });

        let f = Arc::clone(&fetcher);
        registry.register(ToolDescriptor {
            name: "select_best_runway",
            description:
                "Select the runway with the lowest crosswind for the current wind at an \
                 airport, preferring headwind on ties.",
            arg_schema: schema_for!(SelectRunwayArgs),
            invoke: Box::new(move |args| {
                let args: SelectRunwayArgs = parse_args("select_best_runway", args)?;
                if let Some(max) = args.max_crosswind_kt {
                    if !(0.0..=200.0).contains(&max) {
                        return Err(ToolError::InvalidArgs {
                            tool: "select_best_runway".to_string(),
                            reason: format!("max_crosswind_kt {max} out of range 0–200"),
                        });
                    }
                }
                let metar = f
                    .fetch_metar(&args.icao_code)
                    .map_err(|e| invalid("select_best_runway", e))?;
                let selection = match &args.runway {
                    Some(requested) => requested_runway_selection(
                        &metar.station,
                        requested,
                        metar.wind_direction.map(f64::from),
                        metar.wind_speed.map(f64::from).unwrap_or(0.0),
                        magnetic_correction,
                    )?,
                    None => select_runway(
                        &metar.station,
                        metar.wind_direction.map(f64::from),
                        metar.wind_speed.map(f64::from).unwrap_or(0.0),
                        magnetic_correction,
                    ),
                };
                let exceeds = args
                    .max_crosswind_kt
                    .is_some_and(|max| selection.crosswind_kt > max);
                let mut value = to_json("select_best_runway", &selection)?;
                if let Some(map) = value.as_object_mut() {
                    map.insert("exceeds_limit".to_string(), serde_json::json!(exceeds));
                }
                Ok(value)
            }),
        });

        registry.register(ToolDescriptor {
            name: "fetch_aircraft_specs",
            description: "Get aircraft specifications by tail number (e.g. N12345).",
            arg_schema: schema_for!(AircraftSpecsArgs),
            invoke: Box::new(|args| {
                let args: AircraftSpecsArgs = parse_args("fetch_aircraft_specs", args)?;
                match aircraft::specs_for(&args.aircraft_id) {
                    Some(specs) => to_json("fetch_aircraft_specs", specs),
                    None => Err(ToolError::Execution {
                        tool: "fetch_aircraft_specs".to_string(),
                        reason: format!("aircraft {} not found", args.aircraft_id),
                    }),
                }
            }),
        });

        registry.register(ToolDescriptor {
            name: "calculate_fuel_burn",
            description:
                "Estimate fuel consumption for a leg given distance, aircraft type, and \
                 headwind.",
            arg_schema: schema_for!(FuelBurnArgs),
            invoke: Box::new(|args| {
                let args: FuelBurnArgs = parse_args("calculate_fuel_burn", args)?;
                if !args.distance_nm.is_finite() || args.distance_nm <= 0.0 {
                    return Err(ToolError::InvalidArgs {
                        tool: "calculate_fuel_burn".to_string(),
                        reason: format!("distance_nm must be positive, got {}", args.distance_nm),
                    });
                }
                let burn = aircraft::calculate_fuel_burn(
                    args.distance_nm,
                    &args.aircraft_type,
                    args.headwind_kt.unwrap_or(0.0),
                );
                to_json("calculate_fuel_burn", &burn)
            }),
        });

        registry.register(ToolDescriptor {
            name: "query_manual",
            description:
                "Search the flight manual for a topic (crosswind_limits, \
                 runway_requirements, weight_balance).",
            arg_schema: schema_for!(ManualArgs),
            invoke: Box::new(|args| {
                let args: ManualArgs = parse_args("query_manual", args)?;
                match manual::query_manual(&args.topic) {
                    Some(text) => Ok(serde_json::json!({
                        "topic": args.topic,
                        "result": text,
                    })),
                    None => Err(ToolError::Execution {
                        tool: "query_manual".to_string(),
                        reason: format!(
                            "topic {:?} not in manual (known: {})",
                            args.topic,
                            manual::known_topics().join(", ")
                        ),
                    }),
                }
            }),
        });

        registry.register(ToolDescriptor {
            name: "log_flight_event",
            description: "Record a flight event for a pilot.",
            arg_schema: schema_for!(LogFlightEventArgs),
            invoke: Box::new(|args| {
                let args: LogFlightEventArgs = parse_args("log_flight_event", args)?;
                let ack = manual::log_flight_event(&args.pilot_id, &args.event_type);
                to_json("log_flight_event", &ack)
            }),
        });

        let f = Arc::clone(&fetcher);
        registry.register(ToolDescriptor {
            name: "generate_atc_phrase",
            description:
                "Generate FAA/ICAO-standard ATC phraseology (landing clearance, approach, \
                 wind or runway advisory) from the current METAR.",
            arg_schema: schema_for!(AtcPhraseArgs),
            invoke: Box::new(move |args| {
                let args: AtcPhraseArgs = parse_args("generate_atc_phrase", args)?;
                let metar = f
                    .fetch_metar(&args.icao_code)
                    .map_err(|e| invalid("generate_atc_phrase", e))?;
                let phrase_type = args.phrase_type.unwrap_or_default();
                match phraseology::generate_atc_phrase(
                    &metar,
                    &args.runway,
                    phrase_type,
                    args.station_callsign.as_deref(),
                ) {
                    Some(phrase) => to_json("generate_atc_phrase", &phrase),
                    None => Err(ToolError::Execution {
                        tool: "generate_atc_phrase".to_string(),
                        reason: format!("no usable wind in the {} METAR", metar.station),
                    }),
                }
            }),
        });

        registry
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct FetchMetarArgs {
    /// Airport ICAO code, e.g. "KDEN".
    pub icao_code: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct SelectRunwayArgs {
    /// Airport ICAO code.
    pub icao_code: String,
    /// Evaluate this specific runway instead of choosing one: a designator
    /// ("26", "17L") or a literal heading in degrees ("260").
    #[serde(default)]
    pub runway: Option<String>,
    /// Flag the selection when its crosswind exceeds this limit (knots).
    #[serde(default)]
    pub max_crosswind_kt: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct AircraftSpecsArgs {
    /// Aircraft tail number, e.g. "N12345".
    pub aircraft_id: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct FuelBurnArgs {
    /// Leg distance in nautical miles. Must be positive.
    pub distance_nm: f64,
    /// Aircraft type, e.g. "Cessna 172".
    pub aircraft_type: String,
    /// Headwind component in knots.
    #[serde(default)]
    pub headwind_kt: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ManualArgs {
    /// Manual topic, e.g. "crosswind_limits".
    pub topic: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct LogFlightEventArgs {
    pub pilot_id: String,
    pub event_type: String,
    /// Free-form event payload. Stored nowhere; acknowledged only.
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct AtcPhraseArgs {
    pub icao_code: String,
    /// Runway designator, e.g. "26" or "17L".
    pub runway: String,
    #[serde(default)]
    pub phrase_type: Option<PhraseType>,
    #[serde(default)]
    pub station_callsign: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn parse_args<T: DeserializeOwned>(
    tool: &'static str,
    args: serde_json::Value,
) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArgs {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

fn to_json<T: Serialize>(tool: &'static str, value: &T) -> Result<serde_json::Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::Execution {
        tool: tool.to_string(),
        reason: format!("result serialization failed: {e}"),
    })
}

/// Components for a caller-requested runway rather than a chosen one.
/// Numbers ≤ 36 are designators (× 10 heading rule); larger numbers are
/// literal headings in degrees.
fn requested_runway_selection(
    airport: &str,
    requested: &str,
    wind_dir_deg: Option<f64>,
    speed_kt: f64,
    magnetic_correction: bool,
) -> Result<RunwaySelection, ToolError> {
    let digits: String = requested.chars().filter(|c| c.is_ascii_digit()).collect();
    let number: u32 = digits.parse().map_err(|_| ToolError::InvalidArgs {
        tool: "select_best_runway".to_string(),
        reason: format!("runway {requested:?} carries no usable number"),
    })?;
    let (designator, heading) = if number <= 36 {
        (
            requested.to_ascii_uppercase(),
            heading_from_designator(requested).unwrap_or(0),
        )
    } else {
        (format!("{:02}", (number % 360) / 10), (number % 360) as u16)
    };

    let variation = if magnetic_correction {
        variation_for(airport)
    } else {
        None
    };
    let (crosswind_kt, headwind_kt) = match wind_dir_deg {
        Some(dir) => {
            let wind_mag = true_to_magnetic(dir, variation);
            let g = WindGeometry::compute(wind_mag, speed_kt, f64::from(heading));
            (round2(g.crosswind_kt), round2(g.headwind_kt))
        }
        None => (0.0, 0.0),
    };
    Ok(RunwaySelection {
        airport: airport.to_string(),
        runway: designator.clone(),
        heading_deg: heading,
        crosswind_kt,
        headwind_kt,
        rationale: format!(
            "Requested runway {designator} ({heading}°): {crosswind_kt:.1} kt crosswind, \
             {:.1} kt {}",
            headwind_kt.abs(),
            if headwind_kt >= 0.0 { "headwind" } else { "tailwind" },
        ),
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn invalid(tool: &'static str, err: FlightError) -> ToolError {
    match err {
        FlightError::InvalidStation(_) => ToolError::InvalidArgs {
            tool: tool.to_string(),
            reason: err.to_string(),
        },
        other => ToolError::Execution {
            tool: tool.to_string(),
            reason: other.to_string(),
        },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
