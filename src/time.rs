//! Human-readable duration codec.
//!
//! Converts between duration strings like `"1d 3h 20min"` and millisecond
//! counts, and decomposes millisecond counts back into a structured
//! breakdown. Pure and stateless; the storage layer's consumers use it for
//! cooldown and countdown arithmetic.
//!
//! # Example
//!
//! ```
//! use varstore::time::Time;
//!
//! let parsed = Time::parse_str("2d 3h");
//! assert_eq!(parsed.ms, 2 * 86_400_000 + 3 * 3_600_000);
//! assert_eq!(parsed.text, "2 days, 3 hours");
//!
//! let breakdown = Time::format(90_000);
//! assert_eq!(breakdown.minutes, 1);
//! assert_eq!(breakdown.seconds, 30);
//! assert_eq!(breakdown.humanize(), "1min 30s");
//! ```

use serde_json::Value;
use thiserror::Error;

/// Errors from the duration codec.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeError {
    /// Input was neither a string nor a number.
    #[error("time must be a string or a number")]
    InvalidInput,
}

// Millisecond ratios, largest unit first. The month ratio is the Gregorian
// average month (30.436875 days); a single constant is used for both parse
// and format directions.
const UNIT_MS: [u64; 8] = [
    31_536_000_000, // year
    2_629_746_000,  // month
    604_800_000,    // week
    86_400_000,     // day
    3_600_000,      // hour
    60_000,         // minute
    1_000,          // second
    1,              // millisecond
];

/// Singular unit names, used for the canonical ", "-joined text.
const UNIT_NAME: [&str; 8] = [
    "year",
    "month",
    "week",
    "day",
    "hour",
    "minute",
    "second",
    "millisecond",
];

/// Compact abbreviations used by [`TimeBreakdown::humanize`].
const UNIT_ABBR: [&str; 8] = ["y", "mon", "w", "d", "h", "min", "s", "ms"];

/// Result of parsing a duration: the millisecond total and the canonical
/// unit-ordered human phrase (e.g. `"2 days, 3 hours"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTime {
    /// Total duration in milliseconds.
    pub ms: i64,
    /// Canonical text form, zero-valued units omitted.
    pub text: String,
}

/// Structured breakdown of a millisecond count, largest unit first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeBreakdown {
    pub years: u64,
    pub months: u64,
    pub weeks: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub millis: u64,
}

impl TimeBreakdown {
    fn units(&self) -> [u64; 8] {
        [
            self.years,
            self.months,
            self.weeks,
            self.days,
            self.hours,
            self.minutes,
            self.seconds,
            self.millis,
        ]
    }

    /// Compact space-joined form using unit abbreviations, e.g. `"2d 3h"`.
    ///
    /// Milliseconds are excluded: sub-second precision is dropped from the
    /// human-readable form but retained in the breakdown itself.
    pub fn humanize(&self) -> String {
        let units = self.units();
        let mut parts = Vec::new();
        for idx in 0..7 {
            if units[idx] != 0 {
                parts.push(format!("{}{}", units[idx], UNIT_ABBR[idx]));
            }
        }
        parts.join(" ")
    }

    /// Canonical text form, obtained by re-parsing [`Self::humanize`].
    ///
    /// When every unit above the millisecond is zero, the millisecond count
    /// itself is rendered so that a non-zero duration never canonicalizes to
    /// an empty string.
    pub fn canonical(&self) -> String {
        let compact = self.humanize();
        if compact.is_empty() {
            if self.millis != 0 {
                return pluralize(self.millis, "millisecond");
            }
            return String::new();
        }
        Time::parse_str(&compact).text
    }
}

/// Duration codec entry points.
pub struct Time;

impl Time {
    /// Parse a duration from a JSON value.
    ///
    /// Numbers are taken as a millisecond count; strings are parsed as a
    /// space-separated token sequence (see [`Self::parse_str`]). Any other
    /// type is rejected.
    pub fn parse(input: &Value) -> Result<ParsedTime, TimeError> {
        match input {
            Value::Number(n) => {
                let ms = n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                    .ok_or(TimeError::InvalidInput)?;
                Ok(Self::from_millis(ms))
            }
            Value::String(s) => Ok(Self::parse_str(s)),
            _ => Err(TimeError::InvalidInput),
        }
    }

    /// Parse a duration string.
    ///
    /// Tokens are `<magnitude><suffix>` with suffixes `y`, `mon`/`M`, `w`,
    /// `d`, `h`/`hr`, `min`/`m`, `s`, `ms`, in any order. Spelled-out forms
    /// like `"2 days, 3 hours"` are accepted too, so canonical text
    /// re-parses to its own millisecond total. When two tokens target the
    /// same unit the last one wins. Magnitudes are whole numbers; a
    /// fractional token like `"1.5h"` is skipped, as is anything else
    /// malformed or unrecognized, so garbage input yields a zero duration
    /// rather than an error. Totals that exceed `i64::MAX` milliseconds
    /// saturate there.
    pub fn parse_str(input: &str) -> ParsedTime {
        let mut slots: [Option<u64>; 8] = [None; 8];
        let tokens: Vec<&str> = input
            .split_whitespace()
            .map(|t| t.trim_matches(','))
            .collect();

        let mut i = 0;
        while i < tokens.len() {
            let token = tokens[i];
            // A bare magnitude followed by a unit word ("3 hours").
            if let Ok(magnitude) = token.parse::<u64>() {
                if let Some(idx) = tokens.get(i + 1).copied().and_then(unit_word) {
                    slots[idx] = Some(magnitude);
                    i += 2;
                    continue;
                }
            }
            if let Some((idx, magnitude)) = parse_token(token) {
                slots[idx] = Some(magnitude);
            }
            i += 1;
        }

        let mut ms: i64 = 0;
        let mut phrases = Vec::new();
        for (idx, slot) in slots.iter().enumerate() {
            let Some(magnitude) = slot else { continue };
            // Extreme magnitudes saturate instead of wrapping negative.
            let contribution = magnitude
                .checked_mul(UNIT_MS[idx])
                .and_then(|v| i64::try_from(v).ok())
                .unwrap_or(i64::MAX);
            ms = ms.saturating_add(contribution);
            if *magnitude != 0 {
                phrases.push(pluralize(*magnitude, UNIT_NAME[idx]));
            }
        }

        ParsedTime {
            ms,
            text: phrases.join(", "),
        }
    }

    /// Build a [`ParsedTime`] from a raw millisecond count.
    pub fn from_millis(ms: i64) -> ParsedTime {
        ParsedTime {
            ms,
            text: Self::format(ms).canonical(),
        }
    }

    /// Decompose a millisecond count (its absolute value) into the eight
    /// units, largest first, carrying the remainder down at each step.
    pub fn format(ms: i64) -> TimeBreakdown {
        let mut rest = ms.unsigned_abs();
        let mut units = [0u64; 8];
        for (idx, ratio) in UNIT_MS.iter().enumerate() {
            units[idx] = rest / ratio;
            rest %= ratio;
        }
        TimeBreakdown {
            years: units[0],
            months: units[1],
            weeks: units[2],
            days: units[3],
            hours: units[4],
            minutes: units[5],
            seconds: units[6],
            millis: units[7],
        }
    }
}

/// Match a token against the unit suffixes, longest suffix first so that
/// `ms` is not read as seconds and `mon`/`min` are not read as minutes.
fn parse_token(token: &str) -> Option<(usize, u64)> {
    const SUFFIXES: [(&str, usize); 11] = [
        ("mon", 1),
        ("min", 5),
        ("ms", 7),
        ("hr", 4),
        ("y", 0),
        ("M", 1),
        ("w", 2),
        ("d", 3),
        ("h", 4),
        ("m", 5),
        ("s", 6),
    ];
    for (suffix, idx) in SUFFIXES {
        if let Some(magnitude) = token.strip_suffix(suffix) {
            return magnitude.parse::<u64>().ok().map(|m| (idx, m));
        }
    }
    None
}

/// Match a spelled-out unit name, singular or plural.
fn unit_word(token: &str) -> Option<usize> {
    UNIT_NAME
        .iter()
        .position(|&name| token == name || token.strip_suffix('s') == Some(name))
}

fn pluralize(n: u64, word: &str) -> String {
    let suffix = if n == 1 { "" } else { "s" };
    format!("{n} {word}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_str_basic() {
        let parsed = Time::parse_str("2d 3h");
        assert_eq!(parsed.ms, 2 * 86_400_000 + 3 * 3_600_000);
        assert_eq!(parsed.text, "2 days, 3 hours");
    }

    #[test]
    fn test_parse_str_order_independent() {
        let a = Time::parse_str("3h 2d");
        let b = Time::parse_str("2d 3h");
        assert_eq!(a.ms, b.ms);
        // Canonical text always lists the larger unit first.
        assert_eq!(a.text, "2 days, 3 hours");
    }

    #[test]
    fn test_parse_str_all_suffix_aliases() {
        assert_eq!(Time::parse_str("1y").ms, 31_536_000_000);
        assert_eq!(Time::parse_str("1mon").ms, Time::parse_str("1M").ms);
        assert_eq!(Time::parse_str("1w").ms, 604_800_000);
        assert_eq!(Time::parse_str("2h").ms, Time::parse_str("2hr").ms);
        assert_eq!(Time::parse_str("5min").ms, Time::parse_str("5m").ms);
        assert_eq!(Time::parse_str("30s").ms, 30_000);
        assert_eq!(Time::parse_str("90000ms").ms, 90_000);
    }

    #[test]
    fn test_parse_str_last_token_wins_per_unit() {
        assert_eq!(Time::parse_str("2h 5h").ms, 5 * 3_600_000);
        assert_eq!(Time::parse_str("1m 10min").ms, 10 * 60_000);
    }

    #[test]
    fn test_parse_str_skips_garbage_tokens() {
        assert_eq!(Time::parse_str("abc 1h xyz").ms, 3_600_000);
        assert_eq!(Time::parse_str("").ms, 0);
        assert_eq!(Time::parse_str("h").ms, 0);
    }

    #[test]
    fn test_parse_str_extreme_magnitude_saturates() {
        // Product exceeds u64 entirely.
        assert_eq!(Time::parse_str("600000000y").ms, i64::MAX);
        // Product fits u64 but not i64; must not wrap negative.
        assert_eq!(Time::parse_str("500000000y").ms, i64::MAX);
        // Per-unit contributions fit i64 but their sum does not.
        let parsed = Time::parse_str("290000000y 290000000mon");
        assert_eq!(parsed.ms, i64::MAX);
        assert!(parsed.ms > 0);
    }

    #[test]
    fn test_parse_str_fractional_magnitude_skipped() {
        assert_eq!(Time::parse_str("1.5h").ms, 0);
        assert_eq!(Time::parse_str("1.5h 30min").ms, 30 * 60_000);
    }

    #[test]
    fn test_parse_str_spelled_out_units() {
        assert_eq!(
            Time::parse_str("2 days, 3 hours").ms,
            Time::parse_str("2d 3h").ms
        );
        assert_eq!(Time::parse_str("1 minute, 30 seconds").ms, 90_000);
        assert_eq!(Time::parse_str("123 milliseconds").ms, 123);
    }

    #[test]
    fn test_parse_str_singular_phrase() {
        assert_eq!(Time::parse_str("1h 2min").text, "1 hour, 2 minutes");
    }

    #[test]
    fn test_parse_numeric() {
        let parsed = Time::parse(&json!(123)).unwrap();
        assert_eq!(parsed.ms, 123);
        assert!(!parsed.text.is_empty());
        assert_eq!(parsed.text, "123 milliseconds");
    }

    #[test]
    fn test_parse_numeric_canonicalizes() {
        let parsed = Time::parse(&json!(90_000)).unwrap();
        assert_eq!(parsed.ms, 90_000);
        assert!(parsed.text.contains("1 minute"));
        assert!(parsed.text.contains("30 second"));
    }

    #[test]
    fn test_parse_rejects_other_types() {
        assert_eq!(Time::parse(&json!(true)), Err(TimeError::InvalidInput));
        assert_eq!(Time::parse(&json!(null)), Err(TimeError::InvalidInput));
        assert_eq!(Time::parse(&json!({"h": 1})), Err(TimeError::InvalidInput));
    }

    #[test]
    fn test_format_greedy_decomposition() {
        let b = Time::format(90_000);
        assert_eq!(b.minutes, 1);
        assert_eq!(b.seconds, 30);
        assert_eq!(b.millis, 0);

        let b = Time::format(86_400_000 + 3_600_000 + 1);
        assert_eq!(b.days, 1);
        assert_eq!(b.hours, 1);
        assert_eq!(b.millis, 1);
    }

    #[test]
    fn test_format_negative_uses_absolute_value() {
        let b = Time::format(-90_000);
        assert_eq!(b.minutes, 1);
        assert_eq!(b.seconds, 30);
    }

    #[test]
    fn test_humanize_excludes_millis() {
        let b = Time::format(61_234);
        assert_eq!(b.humanize(), "1min 1s");
        assert_eq!(b.millis, 234);
    }

    #[test]
    fn test_canonical_roundtrip() {
        let parsed = Time::parse_str("2d 3h");
        let canonical = Time::format(parsed.ms).canonical();
        assert_eq!(Time::parse_str(&canonical).ms, parsed.ms);
    }

    #[test]
    fn test_canonical_submillisecond_only() {
        assert_eq!(Time::format(0).canonical(), "");
        assert_eq!(Time::format(5).canonical(), "5 milliseconds");
    }
}
