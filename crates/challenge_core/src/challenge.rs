use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHALLENGE_DAYS: u32 = 75;

/// Temporal state of the running challenge. Day indices are 1-based: day 1 is the start date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChallengeState {
    start_date: Option<NaiveDate>,
    #[serde(rename = "challengeDays")]
    total_days: u32,
    #[serde(rename = "isActive")]
    active: bool,
    completed_days: BTreeSet<u32>,
}

impl Default for ChallengeState {
    fn default() -> Self {
        Self {
            start_date: None,
            total_days: DEFAULT_CHALLENGE_DAYS,
            active: false,
            completed_days: BTreeSet::new(),
        }
    }
}

impl ChallengeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    pub fn total_days(&self) -> u32 {
        self.total_days
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn completed_days(&self) -> &BTreeSet<u32> {
        &self.completed_days
    }

    pub fn completed_count(&self) -> usize {
        self.completed_days.len()
    }

    /// Begins a new challenge, discarding whatever was tracked before.
    pub fn start(&mut self, start_date: NaiveDate, total_days: u32) {
        if total_days == 0 {
            tracing::warn!("challenge length of zero days requested, using one day");
        }
        *self = Self {
            start_date: Some(start_date),
            total_days: total_days.max(1),
            active: true,
            completed_days: BTreeSet::new(),
        };
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Challenge day that `today` falls on, clamped to `[0, total_days]`.
    pub fn current_day(&self, today: NaiveDate) -> u32 {
        let Some(start) = self.active_start() else {
            return 0;
        };
        let diff = (today - start).num_days() + 1;
        diff.clamp(0, i64::from(self.total_days)) as u32
    }

    pub fn days_remaining(&self, today: NaiveDate) -> u32 {
        if !self.active {
            return 0;
        }
        self.total_days.saturating_sub(self.current_day(today))
    }

    pub fn progress_percentage(&self, today: NaiveDate) -> f64 {
        if !self.active || self.total_days == 0 {
            return 0.0;
        }
        let ratio = f64::from(self.current_day(today)) / f64::from(self.total_days);
        (ratio * 100.0).min(100.0)
    }

    pub fn is_challenge_complete(&self, today: NaiveDate) -> bool {
        self.active && self.current_day(today) >= self.total_days
    }

    /// Index of `date` inside the active challenge window, if it has one.
    pub fn challenge_day_for(&self, date: NaiveDate) -> Option<u32> {
        let start = self.active_start()?;
        let diff = (date - start).num_days();
        if (0..i64::from(self.total_days)).contains(&diff) {
            Some(diff as u32 + 1)
        } else {
            None
        }
    }

    pub fn is_day_completed(&self, day: u32) -> bool {
        self.completed_days.contains(&day)
    }

    /// Returns `true` when the day was newly recorded.
    pub fn mark_day_completed(&mut self, day: u32) -> bool {
        if !self.active || !self.in_range(day) {
            return false;
        }
        self.completed_days.insert(day)
    }

    /// Returns `true` when the day was previously recorded.
    pub fn mark_day_incomplete(&mut self, day: u32) -> bool {
        if !self.active {
            return false;
        }
        self.completed_days.remove(&day)
    }

    /// Run of consecutive completed days ending today, or yesterday while today is still open.
    pub fn current_streak(&self, today: NaiveDate) -> u32 {
        let current = self.current_day(today);
        if current == 0 {
            return 0;
        }
        let end = if self.is_day_completed(current) {
            current
        } else {
            current - 1
        };
        (1..=end)
            .rev()
            .take_while(|day| self.is_day_completed(*day))
            .count() as u32
    }

    pub fn longest_streak(&self) -> u32 {
        let mut best = 0;
        let mut run = 0;
        let mut previous: Option<u32> = None;
        for &day in &self.completed_days {
            run = match previous {
                Some(prev) if prev + 1 == day => run + 1,
                _ => 1,
            };
            best = best.max(run);
            previous = Some(day);
        }
        best
    }

    /// Drops recorded days that fall outside `[1, total_days]` or that exist without an active
    /// challenge. Returns how many entries were removed.
    pub fn sanitize(&mut self) -> usize {
        if self.total_days == 0 {
            self.total_days = DEFAULT_CHALLENGE_DAYS;
        }
        if self.active && self.start_date.is_none() {
            self.active = false;
        }
        let before = self.completed_days.len();
        if self.active {
            let total = self.total_days;
            self.completed_days.retain(|day| (1..=total).contains(day));
        } else {
            self.completed_days.clear();
        }
        before - self.completed_days.len()
    }

    fn active_start(&self) -> Option<NaiveDate> {
        if self.active {
            self.start_date
        } else {
            None
        }
    }

    fn in_range(&self, day: u32) -> bool {
        (1..=self.total_days).contains(&day)
    }
}
