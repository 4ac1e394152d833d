use serde::{Deserialize, Serialize};

use crate::error::HabitError;

pub const MAX_HABIT_NAME_LEN: usize = 50;

/// Icon keys a habit may use, paired with a human label.
pub const HABIT_ICONS: &[(&str, &str)] = &[
    ("water-outline", "Water"),
    ("barbell-outline", "Exercise"),
    ("book-outline", "Reading"),
    ("moon-outline", "Sleep"),
    ("restaurant-outline", "Food"),
    ("walk-outline", "Walking"),
    ("bicycle-outline", "Cycling"),
    ("musical-notes-outline", "Music"),
    ("leaf-outline", "Meditation"),
    ("sunny-outline", "Sun"),
    ("heart-outline", "Health"),
    ("time-outline", "Time"),
];

pub fn icon_label(icon: &str) -> Option<&'static str> {
    HABIT_ICONS
        .iter()
        .find(|(key, _)| *key == icon)
        .map(|(_, label)| *label)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: u64,
    pub icon: String,
    pub name: String,
    #[serde(rename = "isCompleted", default)]
    pub completed: bool,
}

/// Validated input for a new habit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitDraft {
    icon: String,
    name: String,
}

impl HabitDraft {
    pub fn new(icon: impl Into<String>, name: &str) -> Result<Self, HabitError> {
        let icon = icon.into();
        if icon_label(&icon).is_none() {
            return Err(HabitError::UnknownIcon(icon));
        }
        let name = validate_name(name)?;
        Ok(Self { icon, name })
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Trims `name` and checks it against the length limits.
pub fn validate_name(name: &str) -> Result<String, HabitError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(HabitError::EmptyName);
    }
    let len = trimmed.chars().count();
    if len > MAX_HABIT_NAME_LEN {
        return Err(HabitError::NameTooLong {
            len,
            max: MAX_HABIT_NAME_LEN,
        });
    }
    Ok(trimmed.to_string())
}

/// Partial update merged into an existing habit. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HabitUpdate {
    pub icon: Option<String>,
    pub name: Option<String>,
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitSet {
    habits: Vec<Habit>,
}

impl Default for HabitSet {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl HabitSet {
    pub fn empty() -> Self {
        Self { habits: Vec::new() }
    }

    /// The starter habits shown before the user configures anything.
    pub fn with_defaults() -> Self {
        let defaults = [
            (1, "water-outline", "Drink 2L of water"),
            (2, "barbell-outline", "Exercise"),
            (3, "book-outline", "Read for 30 min"),
            (4, "moon-outline", "Sleep 8 hours"),
            (5, "restaurant-outline", "Eat healthy"),
        ];
        Self {
            habits: defaults
                .into_iter()
                .map(|(id, icon, name)| Habit {
                    id,
                    icon: icon.to_string(),
                    name: name.to_string(),
                    completed: false,
                })
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Habit> {
        self.habits.iter()
    }

    pub fn as_slice(&self) -> &[Habit] {
        &self.habits
    }

    pub fn len(&self) -> usize {
        self.habits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.habits.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Habit> {
        self.habits.iter().find(|habit| habit.id == id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.get(id).is_some()
    }

    /// Appends a habit and returns its id. Ids come from `now_millis` but never repeat or go
    /// backwards, even if the clock does.
    pub fn add(&mut self, draft: HabitDraft, now_millis: u64) -> u64 {
        let next_free = self
            .habits
            .iter()
            .map(|habit| habit.id)
            .max()
            .map_or(0, |max| max + 1);
        let id = now_millis.max(next_free);
        self.habits.push(Habit {
            id,
            icon: draft.icon,
            name: draft.name,
            completed: false,
        });
        id
    }

    pub fn update(&mut self, id: u64, update: HabitUpdate) -> bool {
        let Some(habit) = self.get_mut(id) else {
            return false;
        };
        if let Some(icon) = update.icon {
            habit.icon = icon;
        }
        if let Some(name) = update.name {
            habit.name = name;
        }
        if let Some(completed) = update.completed {
            habit.completed = completed;
        }
        true
    }

    pub fn delete(&mut self, id: u64) -> bool {
        let before = self.habits.len();
        self.habits.retain(|habit| habit.id != id);
        before != self.habits.len()
    }

    /// Flips the collection-wide completion flag. Returns the new value.
    pub fn toggle(&mut self, id: u64) -> Option<bool> {
        let habit = self.get_mut(id)?;
        habit.completed = !habit.completed;
        Some(habit.completed)
    }

    pub fn reset_all(&mut self) {
        for habit in &mut self.habits {
            habit.completed = false;
        }
    }

    fn get_mut(&mut self, id: u64) -> Option<&mut Habit> {
        self.habits.iter_mut().find(|habit| habit.id == id)
    }
}
