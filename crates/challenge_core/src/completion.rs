use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::habit::Habit;

/// Which habits were completed on which calendar date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayCompletions {
    days: BTreeMap<NaiveDate, BTreeSet<u64>>,
}

/// A habit as seen on one particular date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayHabit {
    pub habit: Habit,
    pub completed: bool,
}

impl DayCompletions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_completed(&self, date: NaiveDate, habit_id: u64) -> bool {
        self.days
            .get(&date)
            .is_some_and(|ids| ids.contains(&habit_id))
    }

    /// Returns `true` if the stored value changed.
    pub fn set(&mut self, date: NaiveDate, habit_id: u64, completed: bool) -> bool {
        if completed {
            return self.days.entry(date).or_default().insert(habit_id);
        }
        let Some(ids) = self.days.get_mut(&date) else {
            return false;
        };
        let removed = ids.remove(&habit_id);
        if ids.is_empty() {
            self.days.remove(&date);
        }
        removed
    }

    /// Flips the flag and returns the new value.
    pub fn toggle(&mut self, date: NaiveDate, habit_id: u64) -> bool {
        let completed = !self.is_completed(date, habit_id);
        self.set(date, habit_id, completed);
        completed
    }

    pub fn habits_for_day(&self, date: NaiveDate, habits: &[Habit]) -> Vec<DayHabit> {
        habits
            .iter()
            .map(|habit| DayHabit {
                habit: habit.clone(),
                completed: self.is_completed(date, habit.id),
            })
            .collect()
    }

    /// A day with no configured habits is never complete.
    pub fn all_complete(&self, date: NaiveDate, habits: &[Habit]) -> bool {
        !habits.is_empty()
            && habits
                .iter()
                .all(|habit| self.is_completed(date, habit.id))
    }

    /// Forgets a habit on every date. Returns how many entries went away.
    pub fn remove_habit(&mut self, habit_id: u64) -> usize {
        let mut removed = 0;
        self.days.retain(|_, ids| {
            if ids.remove(&habit_id) {
                removed += 1;
            }
            !ids.is_empty()
        });
        removed
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}
