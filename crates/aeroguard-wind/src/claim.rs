//! Crosswind claim extraction from free answer text.
//!
//! [`extract_claim`] finds the numeric crosswind value an answer asserts, so
//! the guardrail can compare it against recomputed truth. The accepted
//! phrasings are scanned with a small hand-rolled tokenizer instead of a
//! regex engine, so the grammar is explicit and portable:
//!
//! - a number immediately (or one word) ahead of a knots unit
//!   (`kt`, `kts`, `knot`, `knots`), and
//! - a crosswind cue (`crosswind`, `cross wind`, `cross-wind`, `x-wind`) in
//!   the same sentence, before or after the number.
//!
//! When the cue precedes a number (`"crosswind is 7.4 kt"`) that match wins
//! over the reversed order (`"7.4 kt crosswind"`). Within each form, the
//! first match in scan order wins.

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Word(String),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    sentence: usize,
}

/// Tokenize into lowercase words and decimal numbers, tracking sentence
/// boundaries. A `.` between digits is a decimal point; any other `.`, `!`,
/// `?`, or newline ends the sentence. Hyphens separate tokens, which makes
/// `cross-wind` and `7.4-knot` scan as their parts.
fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut sentence = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let lexeme: String = chars[start..i].iter().collect();
            if let Ok(value) = lexeme.parse::<f64>() {
                tokens.push(Token {
                    kind: TokenKind::Number(value),
                    sentence,
                });
            }
        } else if c.is_alphabetic() {
            let start = i;
            while i < chars.len() && chars[i].is_alphabetic() {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect::<String>().to_lowercase();
            tokens.push(Token {
                kind: TokenKind::Word(word),
                sentence,
            });
        } else {
            if matches!(c, '.' | '!' | '?' | '\n') {
                sentence += 1;
            }
            i += 1;
        }
    }
    tokens
}

fn is_unit(word: &str) -> bool {
    matches!(word, "kt" | "kts" | "knot" | "knots")
}

/// Index positions of crosswind cues, per token. A cue is the single token
/// `crosswind` / `xwind`, or the adjacent pairs `cross wind` / `x wind`.
fn cue_positions(tokens: &[Token]) -> Vec<usize> {
    let mut cues = Vec::new();
    for (i, tok) in tokens.iter().enumerate() {
        let TokenKind::Word(w) = &tok.kind else {
            continue;
        };
        match w.as_str() {
            "crosswind" | "xwind" => cues.push(i),
            "cross" | "x" => {
                if let Some(Token {
                    kind: TokenKind::Word(next),
                    sentence,
                }) = tokens.get(i + 1)
                {
                    if next == "wind" && *sentence == tok.sentence {
                        cues.push(i);
                    }
                }
            }
            _ => {}
        }
    }
    cues
}

/// A knots-valued number: token `i` is a number whose unit token follows at
/// `i + 1`, or at `i + 2` across a single intervening word.
fn knots_value_at(tokens: &[Token], i: usize) -> Option<f64> {
    let TokenKind::Number(value) = &tokens[i].kind else {
        return None;
    };
    let value = *value;
    let sentence = tokens[i].sentence;
    for offset in 1..=2 {
        match tokens.get(i + offset) {
            Some(Token {
                kind: TokenKind::Word(w),
                sentence: s,
            }) if *s == sentence => {
                if is_unit(w) {
                    return Some(value);
                }
                // One non-unit word may sit between number and unit.
            }
            _ => return None,
        }
    }
    None
}

/// Extract the first crosswind claim from `text`, in knots.
///
/// Returns `None` when the text makes no recognizable crosswind claim, which
/// the guardrail treats as a skip, not a failure.
pub fn extract_claim(text: &str) -> Option<f64> {
    let tokens = tokenize(text);
    let cues = cue_positions(&tokens);
    if cues.is_empty() {
        return None;
    }

    // Preferred form: cue before the number in the same sentence.
    for i in 0..tokens.len() {
        if let Some(value) = knots_value_at(&tokens, i) {
            let sentence = tokens[i].sentence;
            if cues
                .iter()
                .any(|&c| c < i && tokens[c].sentence == sentence)
            {
                return Some(value);
            }
        }
    }

    // Reversed form: number then cue later in the same sentence.
    for i in 0..tokens.len() {
        if let Some(value) = knots_value_at(&tokens, i) {
            let sentence = tokens[i].sentence;
            if cues
                .iter()
                .any(|&c| c > i && tokens[c].sentence == sentence)
            {
                return Some(value);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_simple_claim() {
        assert_eq!(extract_claim("The crosswind is 5.2 knots."), Some(5.2));
    }

    #[test]
    fn extracts_kt_abbreviation() {
        assert_eq!(
            extract_claim("The crosswind component is 7.66 kt"),
            Some(7.66)
        );
    }

    #[test]
    fn extracts_from_complex_sentence() {
        assert_eq!(
            extract_claim("At KDEN Runway 26, the crosswind component is approximately 12.5 kt."),
            Some(12.5)
        );
    }

    #[test]
    fn extracts_reversed_order() {
        assert_eq!(extract_claim("We have 8.3 kt crosswind today."), Some(8.3));
        assert_eq!(extract_claim("Expect a 6 knot cross wind."), Some(6.0));
    }

    #[test]
    fn accepts_hyphenated_forms() {
        assert_eq!(extract_claim("x-wind is 4.5 kt"), Some(4.5));
        assert_eq!(extract_claim("a 9.1-knot cross-wind"), Some(9.1));
    }

    #[test]
    fn no_cue_means_no_claim() {
        assert_eq!(extract_claim("Weather looks good for flying today."), None);
        assert_eq!(extract_claim("Wind is 220 at 10 kt."), None);
    }

    #[test]
    fn number_without_unit_is_not_a_claim() {
        assert_eq!(extract_claim("Crosswind runway is 26."), None);
    }

    #[test]
    fn cue_must_share_the_sentence() {
        assert_eq!(
            extract_claim("The crosswind is manageable. Visibility is 10 kt worse."),
            None
        );
    }

    #[test]
    fn prefers_number_after_cue() {
        // "10 kt" precedes the cue, "6.4 kt" follows it; the cue-first form wins.
        assert_eq!(
            extract_claim("Wind 220 at 10 kt, crosswind 6.4 kt on runway 26"),
            Some(6.4)
        );
    }

    #[test]
    fn first_match_wins_within_a_form() {
        assert_eq!(
            extract_claim("Crosswind is 7.4 kt, though it was crosswind 9.9 kt earlier."),
            Some(7.4)
        );
    }

    #[test]
    fn runway_designator_letters_do_not_confuse_scanner() {
        assert_eq!(
            extract_claim("crosswind at KDEN Runway 17L is 7.7 kt"),
            Some(7.7)
        );
    }

    #[test]
    fn generated_statement_grid_roundtrips() {
        // "crosswind is X kt" for X in 0.0, 0.1, …, 99.9.
        for tenths in 0..1000u32 {
            let x = f64::from(tenths) / 10.0;
            let statement = format!("crosswind is {x:.1} kt");
            let got = extract_claim(&statement)
                .unwrap_or_else(|| panic!("no claim extracted from {statement:?}"));
            assert!((got - x).abs() < 1e-6, "{statement:?} → {got}");
        }
    }

    #[test]
    fn ignores_decimal_point_as_sentence_boundary() {
        // The 7.4 decimal must not split the sentence away from its cue.
        assert_eq!(extract_claim("crosswind of 7.4 knots expected"), Some(7.4));
    }
}
