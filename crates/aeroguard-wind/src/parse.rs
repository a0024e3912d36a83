//! Wind-string parsing and the canonical formatter.
//!
//! The accepted grammar is the one the weather layer emits:
//!
//! ```text
//! ""                 calm / unknown      → (None, None, None)
//! "VRB @ 5"          variable direction  → (None, Some(5), None)
//! "220 @ 10"         steady              → (Some(220), Some(10), None)
//! "220 @ 10 G 18"    gusting             → (Some(220), Some(10), Some(18))
//! ```
//!
//! Malformed numerics are a typed [`WindParseError`], never a panic.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from [`parse_wind`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindParseError {
    #[error("malformed wind string: {0:?}")]
    Malformed(String),
    #[error("wind direction {0} out of range (0–360)")]
    DirectionOutOfRange(u32),
    #[error("numeric field {0:?} is not a valid integer")]
    BadNumber(String),
}

/// Parsed wind triple. `direction` is `None` for variable or calm wind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ParsedWind {
    pub direction: Option<u16>,
    pub speed: Option<u16>,
    pub gust: Option<u16>,
}

fn parse_int(tok: &str) -> Result<u32, WindParseError> {
    tok.parse::<u32>()
        .map_err(|_| WindParseError::BadNumber(tok.to_string()))
}

/// Parse a wind string into `(direction, speed, gust)`.
///
/// An empty or whitespace-only string is calm/unknown wind: all fields
/// `None`. `"VRB"` direction yields `direction = None` with the speed kept.
///
/// # Errors
///
/// [`WindParseError`] when the shape is unrecognized or a numeric field does
/// not parse.
pub fn parse_wind(s: &str) -> Result<ParsedWind, WindParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(ParsedWind::default());
    }

    let (dir_part, speed_part) = s
        .split_once('@')
        .ok_or_else(|| WindParseError::Malformed(s.to_string()))?;

    let dir_tok = dir_part.trim();
    let direction = if dir_tok.eq_ignore_ascii_case("VRB") {
        None
    } else {
        let d = parse_int(dir_tok)?;
        if d > 360 {
            return Err(WindParseError::DirectionOutOfRange(d));
        }
        Some(d as u16)
    };

    // Speed part is "SS" or "SS G GG" (gust marker case-insensitive).
    let mut toks = speed_part.split_whitespace();
    let speed_tok = toks
        .next()
        .ok_or_else(|| WindParseError::Malformed(s.to_string()))?;
    let speed = Some(parse_int(speed_tok)? as u16);

    let gust = match toks.next() {
        None => None,
        Some(marker) if marker.eq_ignore_ascii_case("G") => {
            let gust_tok = toks
                .next()
                .ok_or_else(|| WindParseError::Malformed(s.to_string()))?;
            Some(parse_int(gust_tok)? as u16)
        }
        Some(_) => return Err(WindParseError::Malformed(s.to_string())),
    };

    if toks.next().is_some() {
        return Err(WindParseError::Malformed(s.to_string()));
    }

    Ok(ParsedWind {
        direction,
        speed,
        gust,
    })
}

/// Canonical inverse of [`parse_wind`].
///
/// `format_wind(parse_wind(s)?) == s` for canonical inputs, and
/// `parse_wind(format_wind(w))` returns `w` for any representable triple.
pub fn format_wind(wind: ParsedWind) -> String {
    let dir = match wind.direction {
        Some(d) => format!("{d}"),
        None => "VRB".to_string(),
    };
    match (wind.speed, wind.gust) {
        (Some(s), Some(g)) => format!("{dir} @ {s} G {g}"),
        (Some(s), None) => format!("{dir} @ {s}"),
        (None, _) => String::new(),
    }
}
