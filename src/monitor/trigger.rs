//! Trigger rules.
//!
//! A trigger is written `"<percent>% <kind>"`, `"<amount> <kind>"` or `"<kind>"`,
//! where kind is `changed`, `more` or `less` (any case).

use std::fmt;
use std::str::FromStr;

use super::{EvalError, MonitorError};
use crate::query::TypedResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Changed,
    More,
    Less,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Changed => write!(f, "changed"),
            TriggerKind::More => write!(f, "more"),
            TriggerKind::Less => write!(f, "less"),
        }
    }
}

impl FromStr for TriggerKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "changed" => Ok(TriggerKind::Changed),
            "more" => Ok(TriggerKind::More),
            "less" => Ok(TriggerKind::Less),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    pub kind: TriggerKind,
    /// Relative tolerance in percent of the old magnitude
    pub percent: f64,
    pub absolute: f64,
}

impl Trigger {
    pub fn new(kind: TriggerKind) -> Self {
        Self {
            kind,
            percent: 0.0,
            absolute: 0.0,
        }
    }

    /// Plain `changed` with no tolerance compares results structurally.
    pub fn is_exact(&self) -> bool {
        self.kind == TriggerKind::Changed && self.percent == 0.0 && self.absolute == 0.0
    }

    /// Decide whether the change from `old` to `current` fires this trigger.
    pub fn fires(&self, old: &TypedResult, current: &TypedResult) -> Result<bool, EvalError> {
        if old.kind() != current.kind() {
            return Err(EvalError::ShapeMismatch {
                old: old.kind(),
                current: current.kind(),
            });
        }

        if self.is_exact() {
            return Ok(!old.structurally_equal(current));
        }

        let old = old.magnitude();
        let cur = current.magnitude();
        let above = cur > old * (1.0 + self.percent / 100.0) + self.absolute;
        let below = cur < old * (1.0 - self.percent / 100.0) - self.absolute;

        Ok(match self.kind {
            TriggerKind::Changed => above || below,
            TriggerKind::More => above,
            TriggerKind::Less => below,
        })
    }
}

impl FromStr for Trigger {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| MonitorError::InvalidTrigger {
            text: s.to_string(),
            reason: reason.to_string(),
        };

        let text = s.trim();
        let tolerance = text.trim_end_matches(|c: char| c.is_ascii_alphabetic());
        let kind = &text[tolerance.len()..];
        if kind.is_empty() {
            return Err(invalid("expected changed, more or less"));
        }
        let kind: TriggerKind = kind
            .parse()
            .map_err(|_| invalid("unknown kind, expected changed, more or less"))?;

        let mut trigger = Trigger::new(kind);
        let tolerance = tolerance.trim();
        if tolerance.is_empty() {
            return Ok(trigger);
        }

        let (number, is_percent) = match tolerance.strip_suffix('%') {
            Some(number) => (number.trim_end(), true),
            None => (tolerance, false),
        };
        let value: f64 = number
            .parse()
            .map_err(|_| invalid("tolerance is not a number"))?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid("tolerance must be a non-negative number"));
        }

        if is_percent {
            trigger.percent = value;
        } else {
            trigger.absolute = value;
        }
        Ok(trigger)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.percent != 0.0 {
            write!(f, "{}% {}", self.percent, self.kind)
        } else if self.absolute != 0.0 {
            write!(f, "{} {}", self.absolute, self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}
