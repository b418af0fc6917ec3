//! Best-effort extraction of vital signs and scores from assistant text.
//!
//! Replies carry no schema, so each signal is scanned independently
//! against a table of labeled patterns. The first match whose value is
//! clinically plausible wins per signal; a reading is returned only if
//! at least one signal matched. Values outside the plausible range are
//! skipped, not clamped — a reply that only mentions "temp 98.6°F" has
//! no recognized temperature, it is not a 98.6°C fever.

use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::VitalReading;

// Plausible value ranges per signal. Matches outside these are ignored
// so numbers in surrounding prose don't get misread as measurements.
const HEART_RATE_RANGE: RangeInclusive<f64> = 20.0..=300.0;
const SYSTOLIC_RANGE: RangeInclusive<f64> = 40.0..=300.0;
const DIASTOLIC_RANGE: RangeInclusive<f64> = 20.0..=200.0;
const RESPIRATORY_RANGE: RangeInclusive<f64> = 4.0..=80.0;
const SPO2_RANGE: RangeInclusive<f64> = 50.0..=100.0;
const TEMPERATURE_RANGE: RangeInclusive<f64> = 30.0..=45.0;

// Each table lists label synonyms in priority order. `[^\d\n]{0,12}`
// between label and value tolerates ": ", " is ", " — ", "(…)" and
// similar connectors without crossing into the next line.
static HEART_RATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(?:heart\s*rate|hr|pulse)\b[^\d\n]{0,12}(\d{2,3}(?:\.\d+)?)").unwrap(),
    ]
});

static BLOOD_PRESSURE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(?:blood\s*pressure|bp)\b[^\d\n]{0,12}(\d{2,3})\s*/\s*(\d{2,3})")
            .unwrap(),
        // Bare reading with an explicit unit ("110/70 mmHg")
        Regex::new(r"(?i)(\d{2,3})\s*/\s*(\d{2,3})\s*mm\s*hg").unwrap(),
    ]
});

static RESPIRATORY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![Regex::new(
        r"(?i)\b(?:respiratory\s*rate|respiration\s*rate|resp\s*rate|rr)\b[^\d\n]{0,12}(\d{1,2}(?:\.\d+)?)",
    )
    .unwrap()]
});

static SPO2_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![Regex::new(
        r"(?i)\b(?:spo2|sp\s*o2|o2\s*sat(?:uration)?|oxygen\s*saturation)\b[^\d\n]{0,12}(\d{2,3}(?:\.\d+)?)",
    )
    .unwrap()]
});

static TEMPERATURE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![Regex::new(r"(?i)\b(?:temp(?:erature)?)\b[^\d\n]{0,12}(\d{2}(?:\.\d+)?)").unwrap()]
});

static SCORE_FRACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bscore\b[^\d\n]{0,12}(\d+(?:\.\d+)?)\s*(?:/|out\s+of)\s*(\d+(?:\.\d+)?)")
        .unwrap()
});

static SCORE_PERCENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bscore\b[^\d\n]{0,12}(\d+(?:\.\d+)?)\s*%").unwrap()
});

/// Scan assistant text for vital signs.
///
/// Returns `None` only when zero signals matched — a reading with a
/// single recognized field is still a reading.
pub fn extract_vitals(text: &str) -> Option<VitalReading> {
    let (systolic, diastolic) = extract_pair(text, &BLOOD_PRESSURE_PATTERNS)
        .map_or((None, None), |(s, d)| (Some(s), Some(d)));

    let reading = VitalReading {
        heart_rate: extract_value(text, &HEART_RATE_PATTERNS, &HEART_RATE_RANGE),
        systolic,
        diastolic,
        respiratory_rate: extract_value(text, &RESPIRATORY_PATTERNS, &RESPIRATORY_RANGE),
        spo2: extract_value(text, &SPO2_PATTERNS, &SPO2_RANGE),
        temperature: extract_value(text, &TEMPERATURE_PATTERNS, &TEMPERATURE_RANGE),
    };

    if reading.is_empty() {
        None
    } else {
        Some(reading)
    }
}

/// Scan assistant text for a performance score, normalized to 0–100.
///
/// Recognizes "Score: X/Y" and "Score: X out of Y" (as `X/Y*100`) and
/// "Score: X%" (taken verbatim).
pub fn extract_score(text: &str) -> Option<f64> {
    if let Some(caps) = SCORE_FRACTION.captures(text) {
        let x: f64 = caps[1].parse().ok()?;
        let y: f64 = caps[2].parse().ok()?;
        if y > 0.0 {
            return Some(x / y * 100.0);
        }
    }

    if let Some(caps) = SCORE_PERCENT.captures(text) {
        return caps[1].parse().ok();
    }

    None
}

/// First plausible single-value match across the pattern table.
fn extract_value(
    text: &str,
    patterns: &[Regex],
    range: &RangeInclusive<f64>,
) -> Option<f64> {
    for pattern in patterns {
        for caps in pattern.captures_iter(text) {
            if let Ok(value) = caps[1].parse::<f64>() {
                if range.contains(&value) {
                    return Some(value);
                }
            }
        }
    }
    None
}

/// First plausible systolic/diastolic pair across the pattern table.
fn extract_pair(text: &str, patterns: &[Regex]) -> Option<(f64, f64)> {
    for pattern in patterns {
        for caps in pattern.captures_iter(text) {
            let systolic = caps[1].parse::<f64>().ok();
            let diastolic = caps[2].parse::<f64>().ok();
            if let (Some(s), Some(d)) = (systolic, diastolic) {
                if SYSTOLIC_RANGE.contains(&s) && DIASTOLIC_RANGE.contains(&d) {
                    return Some((s, d));
                }
            }
        }
    }
    None
}
