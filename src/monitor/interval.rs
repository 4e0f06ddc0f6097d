//! Check intervals: `<integer><unit>` with unit one of `s`, `m`, `h`, `d`.

use std::fmt;
use std::str::FromStr;

use super::MonitorError;

/// Units from largest to smallest, each with the factor to the next unit.
/// A value is converted by walking down the ladder to seconds.
const LADDER: [(char, u64); 4] = [('d', 24), ('h', 60), ('m', 60), ('s', 1)];

/// A positive number of seconds between checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval(u64);

impl Interval {
    pub fn from_secs(secs: u64) -> Option<Self> {
        (secs > 0).then_some(Self(secs))
    }

    pub fn as_secs(self) -> u64 {
        self.0
    }
}

impl FromStr for Interval {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| MonitorError::InvalidInterval {
            text: s.to_string(),
            reason: reason.to_string(),
        };

        let text = s.trim();
        let digits_end = text
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(text.len());
        let (digits, unit) = text.split_at(digits_end);
        if digits.is_empty() {
            return Err(invalid("expected a number followed by s, m, h or d"));
        }

        let value: u64 = digits.parse().map_err(|_| invalid("number out of range"))?;

        let mut unit_chars = unit.trim().chars();
        let unit = match (unit_chars.next(), unit_chars.next()) {
            (Some(c), None) => c.to_ascii_lowercase(),
            (None, _) => return Err(invalid("missing unit (s, m, h or d)")),
            _ => return Err(invalid("unknown unit")),
        };
        let start = LADDER
            .iter()
            .position(|(u, _)| *u == unit)
            .ok_or_else(|| invalid("unknown unit"))?;

        let secs = LADDER[start..]
            .iter()
            .try_fold(value, |acc, (_, factor)| acc.checked_mul(*factor))
            .ok_or_else(|| invalid("interval too long"))?;

        Interval::from_secs(secs).ok_or_else(|| invalid("interval must be positive"))
    }
}

impl fmt::Display for Interval {
    /// Largest unit that divides the interval evenly
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: [(u64, char); 3] = [(86_400, 'd'), (3_600, 'h'), (60, 'm')];
        for (size, unit) in UNITS {
            if self.0 % size == 0 {
                return write!(f, "{}{}", self.0 / size, unit);
            }
        }
        write!(f, "{}s", self.0)
    }
}
