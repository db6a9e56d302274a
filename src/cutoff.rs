use chrono::{DateTime, Local, NaiveTime, TimeZone};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

pub const DEFAULT_CUTOFF_TIME: &str = "23:59";

/// How often the gate is re-evaluated while the assessment screen is open
pub const CUTOFF_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Daily wall-clock cutoff, local time, minute precision
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CutoffTime {
    hour: u32,
    minute: u32,
}

impl CutoffTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    fn as_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }

    /// Blocked iff `now` is strictly after today's HH:MM:00
    pub fn is_passed_at(&self, now: NaiveTime) -> bool {
        now > self.as_naive_time()
    }
}

impl Default for CutoffTime {
    fn default() -> Self {
        Self {
            hour: 23,
            minute: 59,
        }
    }
}

/// Accepts `H:MM` or `HH:MM` in 24-hour form
impl FromStr for CutoffTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidCutoff(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;

        let all_digits = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());
        if !all_digits(h) || !all_digits(m) || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }

        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).ok_or_else(invalid)
    }
}

impl fmt::Display for CutoffTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateStatus {
    Open,
    Blocked,
}

/// Gate that keeps the assessment from starting after the daily cutoff.
/// It tracks only wall-clock time and is independent of any run.
#[derive(Clone, Debug)]
pub struct CutoffGate {
    cutoff: CutoffTime,
    status: GateStatus,
}

impl CutoffGate {
    pub fn new(cutoff: CutoffTime) -> Self {
        Self {
            cutoff,
            status: GateStatus::Open,
        }
    }

    pub fn cutoff(&self) -> CutoffTime {
        self.cutoff
    }

    pub fn status(&self) -> GateStatus {
        self.status
    }

    pub fn is_blocked(&self) -> bool {
        self.status == GateStatus::Blocked
    }

    /// Re-evaluate against `now` and return the new status
    pub fn evaluate<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> GateStatus {
        self.status = if self.cutoff.is_passed_at(now.time()) {
            GateStatus::Blocked
        } else {
            GateStatus::Open
        };
        self.status
    }

    pub fn evaluate_now(&mut self) -> GateStatus {
        self.evaluate(&Local::now())
    }
}
