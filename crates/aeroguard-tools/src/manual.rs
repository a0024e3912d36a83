//! Flight-manual lookup and the flight-event acknowledgment stub.

use serde::Serialize;

const MANUAL_TOPICS: &[(&str, &str)] = &[
    (
        "crosswind_limits",
        "Maximum crosswind: 12 knots for Cessna 172. Demonstrated crosswind: 15 knots.",
    ),
    (
        "runway_requirements",
        "Minimum runway: 1500 ft. Recommended: 2000 ft for soft field operations.",
    ),
    (
        "weight_balance",
        "Check weight and balance before every flight. Max gross weight: 2450 lbs.",
    ),
];

/// Manual excerpt for a topic, or `None` when the topic is unknown.
pub fn query_manual(topic: &str) -> Option<&'static str> {
    MANUAL_TOPICS
        .iter()
        .find(|(name, _)| *name == topic)
        .map(|(_, text)| *text)
}

/// List of topics the manual knows about, for error messages.
pub fn known_topics() -> Vec<&'static str> {
    MANUAL_TOPICS.iter().map(|(name, _)| *name).collect()
}

/// Acknowledgment returned by the `log_flight_event` stub. Durable storage
/// is an external concern; the agent only needs a success observation.
#[derive(Debug, Clone, Serialize)]
pub struct FlightEventAck {
    pub success: bool,
    pub pilot_id: String,
    pub event_type: String,
    pub message: String,
}

pub fn log_flight_event(pilot_id: &str, event_type: &str) -> FlightEventAck {
    FlightEventAck {
        success: true,
        pilot_id: pilot_id.to_string(),
        event_type: event_type.to_string(),
        message: format!("Flight event recorded for pilot {pilot_id}"),
    }
}
