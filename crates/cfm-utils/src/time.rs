use std::time::Duration;

use crate::error::{DurationError, DurationResult};

/// Parses a compact duration such as `1d2h30m15s`.
///
/// Each component is a run of digits followed by one of `s`, `m`, `h` or `d`. Components add up,
/// so `90m` and `1h30m` are the same. An empty string is a zero duration.
///
/// # Examples
///
/// ```
/// use cfm_utils::time::parse_duration;
///
/// let ttl = parse_duration("1h30m").unwrap();
/// assert_eq!(ttl.as_secs(), 5400);
/// ```
pub fn parse_duration(input: &str) -> DurationResult<Duration> {
    let mut total: u64 = 0;
    let mut chars = input.trim().chars().peekable();

    while chars.peek().is_some() {
        let mut digits = String::new();
        while let Some(c) = chars.peek().copied() {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(c);
            chars.next();
        }

        if digits.is_empty() {
            return Err(DurationError::MissingNumber {
                input: input.into(),
            });
        }

        let overflow = || DurationError::Overflow {
            input: input.into(),
        };
        let number: u64 = digits.parse().map_err(|_| overflow())?;
        let unit = chars.next().ok_or_else(|| DurationError::MissingUnit {
            input: input.into(),
        })?;
        let seconds = match unit {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            other => {
                return Err(DurationError::UnknownUnit {
                    input: input.into(),
                    unit: other,
                })
            }
        };

        total = number
            .checked_mul(seconds)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(overflow)?;
    }

    Ok(Duration::from_secs(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86400));
        assert_eq!(
            parse_duration("1d1h1m1s").unwrap(),
            Duration::from_secs(86400 + 3600 + 60 + 1)
        );
        assert_eq!(parse_duration("90m"), parse_duration("1h30m"));
        assert_eq!(parse_duration("").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(matches!(
            parse_duration("1d1h1m1s1"),
            Err(DurationError::MissingUnit { .. })
        ));
        assert!(matches!(
            parse_duration("2w"),
            Err(DurationError::UnknownUnit { unit: 'w', .. })
        ));
        assert!(matches!(
            parse_duration("fail"),
            Err(DurationError::MissingNumber { .. })
        ));
    }

    #[test]
    fn test_parse_duration_overflow() {
        assert!(matches!(
            parse_duration("340282366920938463463374607431768211456s"),
            Err(DurationError::Overflow { .. })
        ));
        assert!(matches!(
            parse_duration("18446744073709551615d"),
            Err(DurationError::Overflow { .. })
        ));
    }
}
