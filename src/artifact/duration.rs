//! Cleanup age expressions (`12h`, `7d`, `2w`, `1m`, `1y`).
//!
//! Hours, days and weeks are fixed lengths. Months and years are calendar
//! units: `1m` before March 31st is the last day of February.

use std::fmt;

use chrono::{DateTime, Local, Months, TimeDelta};
use regex::Regex;

use crate::core::errors::BuildError;

/// Unit of an age expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeUnit {
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl AgeUnit {
    fn suffix(&self) -> char {
        match self {
            AgeUnit::Hours => 'h',
            AgeUnit::Days => 'd',
            AgeUnit::Weeks => 'w',
            AgeUnit::Months => 'm',
            AgeUnit::Years => 'y',
        }
    }

    fn from_suffix(c: char) -> Option<Self> {
        match c {
            'h' => Some(AgeUnit::Hours),
            'd' => Some(AgeUnit::Days),
            'w' => Some(AgeUnit::Weeks),
            'm' => Some(AgeUnit::Months),
            'y' => Some(AgeUnit::Years),
            _ => None,
        }
    }
}

/// A parsed age such as "two weeks".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxAge {
    pub amount: u32,
    pub unit: AgeUnit,
}

impl MaxAge {
    /// The instant `self` before `now`; `None` if it is out of range.
    pub fn cutoff(&self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        let amount = i64::from(self.amount);
        match self.unit {
            AgeUnit::Hours => now.checked_sub_signed(TimeDelta::try_hours(amount)?),
            AgeUnit::Days => now.checked_sub_signed(TimeDelta::try_days(amount)?),
            AgeUnit::Weeks => now.checked_sub_signed(TimeDelta::try_weeks(amount)?),
            AgeUnit::Months => now.checked_sub_months(Months::new(self.amount)),
            AgeUnit::Years => now.checked_sub_months(Months::new(self.amount.checked_mul(12)?)),
        }
    }
}

impl fmt::Display for MaxAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}

/// Parse `<n><unit>` where unit is one of `h d w m y`.
pub fn parse_duration(expr: &str) -> Result<MaxAge, BuildError> {
    let invalid = |message: &str| BuildError::InvalidDuration {
        expr: expr.to_string(),
        message: message.to_string(),
    };

    let re = Regex::new(r"^(\d+)\s*([a-zA-Z])$").map_err(|e| invalid(&e.to_string()))?;
    let caps = re
        .captures(expr.trim())
        .ok_or_else(|| invalid("expected a number followed by h, d, w, m or y"))?;

    let amount: u32 = caps[1]
        .parse()
        .map_err(|_| invalid("amount is too large"))?;
    if amount == 0 {
        return Err(invalid("amount must be greater than zero"));
    }

    let unit = caps[2]
        .chars()
        .next()
        .and_then(|c| AgeUnit::from_suffix(c.to_ascii_lowercase()))
        .ok_or_else(|| invalid("unit must be one of h, d, w, m, y"))?;

    Ok(MaxAge { amount, unit })
}
