//! Calendar-aware membership durations.
//!
//! Month and year steps use calendar arithmetic: when the target month is
//! shorter, the day clamps to the month's last day (Jan 31 + 1 month = Feb 28).

use chrono::{DateTime, Days, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Symbolic duration a member can choose when joining a gym.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipDuration {
    #[serde(alias = "1 week")]
    OneWeek,
    #[serde(alias = "1 month")]
    OneMonth,
    #[serde(alias = "3 months")]
    ThreeMonths,
    #[serde(alias = "6 months")]
    SixMonths,
    #[serde(alias = "1 year")]
    OneYear,
}

impl MembershipDuration {
    pub const ALL: [MembershipDuration; 5] = [
        MembershipDuration::OneWeek,
        MembershipDuration::OneMonth,
        MembershipDuration::ThreeMonths,
        MembershipDuration::SixMonths,
        MembershipDuration::OneYear,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MembershipDuration::OneWeek => "one_week",
            MembershipDuration::OneMonth => "one_month",
            MembershipDuration::ThreeMonths => "three_months",
            MembershipDuration::SixMonths => "six_months",
            MembershipDuration::OneYear => "one_year",
        }
    }

    /// Compute the end of a validity window starting at `start`.
    ///
    /// Pure; fails only when the result is outside chrono's representable range.
    pub fn end_from(self, start: DateTime<Utc>) -> DomainResult<DateTime<Utc>> {
        let end = match self {
            MembershipDuration::OneWeek => start.checked_add_days(Days::new(7)),
            MembershipDuration::OneMonth => start.checked_add_months(Months::new(1)),
            MembershipDuration::ThreeMonths => start.checked_add_months(Months::new(3)),
            MembershipDuration::SixMonths => start.checked_add_months(Months::new(6)),
            MembershipDuration::OneYear => start.checked_add_months(Months::new(12)),
        };
        end.ok_or_else(|| DomainError::validation("membership end date out of range"))
    }
}

impl core::fmt::Display for MembershipDuration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MembershipDuration {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "one_week" | "1 week" => Ok(MembershipDuration::OneWeek),
            "one_month" | "1 month" => Ok(MembershipDuration::OneMonth),
            "three_months" | "3 months" => Ok(MembershipDuration::ThreeMonths),
            "six_months" | "6 months" => Ok(MembershipDuration::SixMonths),
            "one_year" | "1 year" => Ok(MembershipDuration::OneYear),
            other => Err(DomainError::validation(format!("unknown membership duration '{other}'"))),
        }
    }
}
