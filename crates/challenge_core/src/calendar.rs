use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

use crate::challenge::ChallengeState;

/// One cell of the month strip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayView {
    pub day_number: u32,
    pub day_of_week: Weekday,
    pub date: NaiveDate,
    pub is_today: bool,
    pub is_future: bool,
    /// Date precedes the start of the active challenge.
    pub is_disabled: bool,
    /// 1-based challenge day, or 0 outside the challenge window.
    pub challenge_day_index: u32,
    pub in_challenge: bool,
    pub completed: bool,
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(31, |last| last.day())
}

/// Builds the view of every day in the month containing `month_ref`.
pub fn project(
    month_ref: NaiveDate,
    state: &ChallengeState,
    today: NaiveDate,
    is_day_completed: impl Fn(u32) -> bool,
) -> Vec<DayView> {
    let year = month_ref.year();
    let month = month_ref.month();
    let window = match (state.is_active(), state.start_date()) {
        (true, Some(start)) => Some((start, i64::from(state.total_days()))),
        _ => None,
    };

    (1..=days_in_month(year, month))
        .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
        .map(|date| {
            let mut view = DayView {
                day_number: date.day(),
                day_of_week: date.weekday(),
                date,
                is_today: date == today,
                is_future: date > today,
                is_disabled: false,
                challenge_day_index: 0,
                in_challenge: false,
                completed: false,
            };
            if let Some((start, total)) = window {
                let diff = (date - start).num_days();
                if (0..total).contains(&diff) {
                    view.challenge_day_index = diff as u32 + 1;
                    view.in_challenge = true;
                    view.completed = is_day_completed(view.challenge_day_index);
                } else if diff < 0 {
                    view.is_disabled = true;
                }
            }
            view
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 4), 30);
        assert_eq!(days_in_month(2024, 12), 31);
    }

    #[test]
    fn january_with_challenge_from_the_fifth() {
        let mut state = ChallengeState::new();
        state.start(date(2024, 1, 5), 75);
        state.mark_day_completed(2);
        let today = date(2024, 1, 10);

        let days = project(date(2024, 1, 20), &state, today, |day| {
            state.is_day_completed(day)
        });
        assert_eq!(days.len(), 31);
        assert_eq!(days[0].day_of_week, Weekday::Mon);

        for view in &days[..4] {
            assert!(view.is_disabled, "day {} should be disabled", view.day_number);
            assert!(!view.in_challenge);
            assert_eq!(view.challenge_day_index, 0);
        }
        let fifth = &days[4];
        assert_eq!(fifth.challenge_day_index, 1);
        assert!(fifth.in_challenge);
        assert!(!fifth.is_disabled);
        assert!(days[5].completed);
        assert!(!days[6].completed);

        let tenth = &days[9];
        assert!(tenth.is_today);
        assert!(!tenth.is_future);
        assert!(days[10].is_future);
        assert!(!days[8].is_future);
        assert_eq!(days[30].challenge_day_index, 27);
    }

    #[test]
    fn days_after_the_window_are_neither_disabled_nor_completed() {
        let mut state = ChallengeState::new();
        state.start(date(2024, 3, 1), 10);
        let days = project(date(2024, 3, 1), &state, date(2024, 3, 2), |_| true);
        assert!(days[9].in_challenge);
        assert!(days[9].completed);
        let after = &days[10];
        assert!(!after.in_challenge);
        assert!(!after.is_disabled);
        assert!(!after.completed);
        assert_eq!(after.challenge_day_index, 0);
    }

    #[test]
    fn no_active_challenge_means_plain_calendar() {
        let state = ChallengeState::new();
        let days = project(date(2024, 2, 1), &state, date(2024, 2, 14), |_| true);
        assert_eq!(days.len(), 29);
        assert!(days
            .iter()
            .all(|view| !view.is_disabled && !view.in_challenge && !view.completed));
        assert_eq!(days.iter().filter(|view| view.is_today).count(), 1);
    }
}
