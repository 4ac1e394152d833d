use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;
use challenge_core::{
    calendar::DayView,
    challenge::DEFAULT_CHALLENGE_DAYS,
    clock::{Clock, FixedClock, SystemClock},
    store::FileStore,
    ChallengeService, DashboardSnapshot,
};
use chrono::NaiveDate;
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub(crate) data_dir: PathBuf,
    pub(crate) challenge_days: u32,
    pub(crate) today: Option<NaiveDate>,
    pub(crate) autostart: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(dir) = lookup("CHALLENGE_DATA_DIR") {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir.trim());
            }
        }
        if let Some(days) = lookup("CHALLENGE_DAYS") {
            match days.trim().parse::<u32>() {
                Ok(value) if value > 0 => config.challenge_days = value,
                _ => warn!(value = %days, "ignoring invalid CHALLENGE_DAYS"),
            }
        }
        if let Some(today) = lookup("CHALLENGE_TODAY") {
            match NaiveDate::parse_from_str(today.trim(), "%Y-%m-%d") {
                Ok(date) => config.today = Some(date),
                Err(err) => warn!(value = %today, %err, "ignoring invalid CHALLENGE_TODAY"),
            }
        }
        if let Some(flag) = lookup("CHALLENGE_AUTOSTART") {
            let flag = flag.trim().to_ascii_lowercase();
            config.autostart = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        config
    }

    fn clock(&self) -> Box<dyn Clock> {
        match self.today {
            Some(date) => Box::new(FixedClock(date)),
            None => Box::new(SystemClock),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".challenge"),
            challenge_days: DEFAULT_CHALLENGE_DAYS,
            today: None,
            autostart: false,
        }
    }
}

pub fn build_service(config: &AppConfig) -> ChallengeService {
    info!(data_dir = %config.data_dir.display(), "opening challenge store");
    ChallengeService::builder()
        .with_store(Box::new(FileStore::new(&config.data_dir)))
        .with_clock(config.clock())
        .with_default_days(config.challenge_days)
        .build()
}

pub fn run(config: AppConfig) -> Result<()> {
    let service = build_service(&config);
    if service.is_first_time() {
        info!("first run, welcome completed");
        service.complete_welcome();
    }
    if config.autostart && !service.challenge().is_active() {
        service.start_challenge_today();
    }

    let snapshot = service.dashboard();
    let month = service.calendar(snapshot.today);
    println!("{}", format_dashboard(&snapshot));
    println!("{}", format_month_strip(&month));
    Ok(())
}

pub(crate) fn format_dashboard(snapshot: &DashboardSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", snapshot.today.format("%A, %B %d, %Y"));
    if snapshot.active {
        let _ = write!(
            out,
            "Day {} of {}",
            snapshot.current_day, snapshot.total_days
        );
        if snapshot.completed_days > 0 {
            let _ = write!(out, " • {} completed", snapshot.completed_days);
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{} days remaining ({:.1}%) · streak {} (best {})",
            snapshot.days_remaining,
            snapshot.progress_percentage,
            snapshot.current_streak,
            snapshot.longest_streak
        );
        if snapshot.challenge_complete {
            let _ = writeln!(out, "Challenge complete!");
        }
    } else {
        let _ = writeln!(out, "No challenge in progress");
    }

    let _ = writeln!(out, "Today's habits ({}):", snapshot.habits.len());
    for entry in &snapshot.habits {
        let mark = if entry.completed { "x" } else { " " };
        let _ = writeln!(out, "  [{mark}] {} ({})", entry.habit.name, entry.habit.icon);
    }
    out.trim_end().to_string()
}

/// One line per day: weekday, date and the challenge marker.
pub(crate) fn format_month_strip(days: &[DayView]) -> String {
    days.iter()
        .map(|day| {
            let marker = if day.is_disabled {
                "-".to_string()
            } else if day.in_challenge {
                let state = if day.completed { "done" } else { "open" };
                format!("day {} {state}", day.challenge_day_index)
            } else {
                String::new()
            };
            let today = if day.is_today { " <" } else { "" };
            format!("{} {:>2} {}{}", day.day_of_week, day.day_number, marker, today)
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
