use std::fmt::Write;
use std::time::Duration;

use anyhow::Result;

/// Accepts `true`/`false` in any letter case, and `1`/`0`.
pub fn parse_bool(s: &str) -> Result<bool> {
    if s == "1" || s.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if s == "0" || s.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(anyhow::anyhow!("Invalid boolean value: {s}"))
    }
}

/// Parses a decimal unsigned integer with an optional plus sign.
pub fn parse_u64(s: &str) -> Result<u64> {
    let digits = s.strip_prefix('+').unwrap_or(s);
    anyhow::ensure!(
        !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        "Invalid unsigned integer: {s}"
    );
    digits
        .parse()
        .map_err(|_| anyhow::anyhow!("Integer out of range: {s}"))
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

static UNITS: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("\u{00B5}s", 1_000),
    ("\u{03BC}s", 1_000),
    ("ms", 1_000_000),
    ("s", NANOS_PER_SEC),
    ("m", 60 * NANOS_PER_SEC),
    ("h", 3600 * NANOS_PER_SEC),
];

/// Parses a duration written as a sequence of decimal numbers, each with
/// an optional fraction and a mandatory unit, e.g. `1000s`, `1h30m`,
/// `1.5s`. A unitless `0` is also accepted.
///
/// Fractions more precise than a nanosecond are truncated.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let original = s;
    let mut s = s.strip_prefix('+').unwrap_or(s);

    anyhow::ensure!(!s.starts_with('-'), "Negative durations are not supported");
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    anyhow::ensure!(!s.is_empty(), "Invalid duration: {original:?}");

    let out_of_range = || anyhow::anyhow!("Duration out of range: {original}");
    let mut nanos: u128 = 0;

    while !s.is_empty() {
        let number_end = s
            .find(|c: char| c != '.' && !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (number, rest) = s.split_at(number_end);
        let unit_end = rest
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (unit, rest) = rest.split_at(unit_end);
        s = rest;

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        anyhow::ensure!(
            !(whole.is_empty() && fraction.is_empty()) && !fraction.contains('.'),
            "Invalid duration: {original:?}"
        );
        let multiplier = UNITS
            .iter()
            .find_map(|(name, mult)| (*name == unit).then_some(*mult))
            .ok_or_else(|| anyhow::anyhow!("Invalid duration unit {unit:?} in {original:?}"))?;

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| out_of_range())?
        };
        nanos = whole
            .checked_mul(multiplier)
            .and_then(|n| nanos.checked_add(n))
            .ok_or_else(out_of_range)?;

        // Digits beyond nanosecond precision do not contribute
        let mut scale = multiplier;
        for digit in fraction.bytes() {
            scale /= 10;
            if scale == 0 {
                break;
            }
            nanos += u128::from(digit - b'0') * scale;
        }
    }

    let secs = u64::try_from(nanos / NANOS_PER_SEC).map_err(|_| out_of_range())?;
    Ok(Duration::new(secs, (nanos % NANOS_PER_SEC) as u32))
}

/// Formats a duration in a form accepted by `parse_duration`.
pub fn format_duration(d: Duration) -> String {
    if d.is_zero() {
        return "0".to_string();
    }

    let mut s = String::new();
    let hours = d.as_secs() / 3600;
    let minutes = (d.as_secs() / 60) % 60;
    let secs = d.as_secs() % 60;
    if hours > 0 {
        let _ = write!(s, "{hours}h");
    }
    if minutes > 0 {
        let _ = write!(s, "{minutes}m");
    }
    if secs > 0 {
        let _ = write!(s, "{secs}s");
    }

    let subsec = d.subsec_nanos();
    if subsec % 1_000_000 == 0 && subsec > 0 {
        let _ = write!(s, "{}ms", subsec / 1_000_000);
    } else if subsec % 1_000 == 0 && subsec > 0 {
        let _ = write!(s, "{}us", subsec / 1_000);
    } else if subsec > 0 {
        let _ = write!(s, "{subsec}ns");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool() {
        for s in ["1", "true", "TRUE", "True"] {
            assert!(parse_bool(s).unwrap(), "{s}");
        }
        for s in ["0", "false", "FALSE", "False"] {
            assert!(!parse_bool(s).unwrap(), "{s}");
        }
        for s in ["", "yes", "t", "2", "truee"] {
            assert!(parse_bool(s).is_err(), "{s}");
        }
    }

    #[test]
    fn test_parse_u64() {
        assert_eq!(parse_u64("0").unwrap(), 0);
        assert_eq!(parse_u64("+1000").unwrap(), 1000);
        assert_eq!(parse_u64("18446744073709551615").unwrap(), u64::MAX);

        #[rustfmt::skip]
        let bad: &[&str] = &[
            "",
            "-1",
            "0x10",
            "1_000",
            " 10",
            "18446744073709551616",
        ];
        for s in bad {
            assert!(parse_u64(s).is_err(), "{s}");
        }
    }

    #[test]
    fn test_parse_duration_good() {
        let h = Duration::from_secs(3600);
        let m = Duration::from_secs(60);
        let s = Duration::from_secs(1);
        let ms = Duration::from_millis(1);
        let us = Duration::from_micros(1);

        let tests: &[(&str, Duration)] = &[
            ("0", Duration::ZERO),
            ("+0", Duration::ZERO),
            ("1000s", 1000 * s),
            ("24h", 24 * h),
            ("30m", 30 * m),
            ("100ms", 100 * ms),
            ("20us", 20 * us),
            ("10\u{00B5}s", 10 * us),
            ("123ns", Duration::from_nanos(123)),
            ("1.5h", h + 30 * m),
            (".5s", 500 * ms),
            ("1h20m", h + 20 * m),
            ("5s200ms50us", 5 * s + 200 * ms + 50 * us),
            ("1.0000000001s", s),
        ];
        for (raw, expected) in tests {
            assert_eq!(parse_duration(raw).unwrap(), *expected, "{raw}");
        }
    }

    #[test]
    fn test_parse_duration_bad() {
        #[rustfmt::skip]
        let tests: &[&str] = &[
            "",
            "-100ms",
            "100",
            "100days",
            "1min",
            ".s",
            "1.2.3s",
            " 10ms",
            "1h 10m",
            "99999999999999999999999h",
        ];
        for raw in tests {
            assert!(parse_duration(raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "0");
        assert_eq!(format_duration(Duration::from_secs(1000)), "16m40s");
        assert_eq!(format_duration(Duration::from_secs(7200)), "2h");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1s500ms");
        assert_eq!(format_duration(Duration::from_nanos(42)), "42ns");

        let d = Duration::from_secs(3723) + Duration::from_micros(7);
        assert_eq!(parse_duration(&format_duration(d)).unwrap(), d);
    }
}
