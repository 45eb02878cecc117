//! Per-routing-number cutoff times.
//!
//! Every ODFI publishes a daily deadline by which files must be received for same-day processing. Files that are
//! still open for merging are force-uploaded when their routing number's cutoff is less than the configured delta
//! away.
use std::{collections::HashMap, fmt::Display};

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::*;
use thiserror::Error;

pub const DEFAULT_FORCED_UPLOAD_DELTA: Duration = Duration::minutes(5);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CutoffError {
    #[error("Cutoff {0} is not a valid HHMM clock time")]
    InvalidClock(u16),
    #[error("Unknown timezone '{0}'")]
    InvalidTimezone(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutoffTime {
    routing_number: String,
    /// HHMM, e.g. 1700
    cutoff: u16,
    timezone: Tz,
}

impl CutoffTime {
    pub fn new(routing_number: &str, cutoff: u16, timezone: &str) -> Result<Self, CutoffError> {
        let (hours, minutes) = (cutoff / 100, cutoff % 100);
        if hours > 23 || minutes > 59 {
            return Err(CutoffError::InvalidClock(cutoff));
        }
        let timezone = timezone.parse::<Tz>().map_err(|_| CutoffError::InvalidTimezone(timezone.to_string()))?;
        Ok(Self { routing_number: routing_number.to_string(), cutoff, timezone })
    }

    pub fn routing_number(&self) -> &str {
        &self.routing_number
    }

    pub fn cutoff(&self) -> u16 {
        self.cutoff
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// The time remaining from `now` until today's cutoff, where "today" is the current date in the cutoff's own
    /// timezone. The result is negative once the cutoff has passed.
    pub fn diff(&self, now: DateTime<Utc>) -> Duration {
        let local_now = now.with_timezone(&self.timezone);
        let clock = NaiveTime::from_hms_opt(u32::from(self.cutoff / 100), u32::from(self.cutoff % 100), 0)
            .unwrap_or(NaiveTime::MIN);
        let local_cutoff = local_now.date_naive().and_time(clock);
        // A cutoff inside a DST gap doesn't exist on that day, so it falls to the first instant after the gap.
        let cutoff = self
            .timezone
            .from_local_datetime(&local_cutoff)
            .earliest()
            .or_else(|| self.timezone.from_local_datetime(&(local_cutoff + Duration::hours(1))).earliest());
        match cutoff {
            Some(cutoff) => cutoff.signed_duration_since(local_now),
            None => {
                warn!("🕰️ Could not resolve cutoff {self} on {}", local_now.date_naive());
                Duration::zero()
            },
        }
    }
}

impl Display for CutoffTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:04} {}", self.routing_number, self.cutoff, self.timezone)
    }
}

/// The table of cutoff times, keyed on routing number. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct CutoffSchedule {
    cutoffs: HashMap<String, CutoffTime>,
    forced_upload_delta: Duration,
}

impl Default for CutoffSchedule {
    fn default() -> Self {
        Self { cutoffs: HashMap::new(), forced_upload_delta: DEFAULT_FORCED_UPLOAD_DELTA }
    }
}

impl CutoffSchedule {
    pub fn new(cutoffs: Vec<CutoffTime>, forced_upload_delta: Duration) -> Self {
        let cutoffs = cutoffs.into_iter().map(|c| (c.routing_number.clone(), c)).collect();
        Self { cutoffs, forced_upload_delta }
    }

    pub fn get(&self, routing_number: &str) -> Option<&CutoffTime> {
        self.cutoffs.get(routing_number)
    }

    pub fn len(&self) -> usize {
        self.cutoffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cutoffs.is_empty()
    }

    pub fn forced_upload_delta(&self) -> Duration {
        self.forced_upload_delta
    }

    /// True when `0 < diff(now) <= forced_upload_delta` for the routing number's cutoff. Routing numbers without a
    /// cutoff are never near it.
    pub fn is_near_cutoff(&self, routing_number: &str, now: DateTime<Utc>) -> bool {
        self.get(routing_number)
            .map(|c| {
                let diff = c.diff(now);
                diff > Duration::zero() && diff <= self.forced_upload_delta
            })
            .unwrap_or(false)
    }
}
