use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::instrument;

use crate::{
    calendar::{self, DayView},
    challenge::{ChallengeState, DEFAULT_CHALLENGE_DAYS},
    clock::{Clock, SystemClock},
    completion::{DayCompletions, DayHabit},
    error::StoreError,
    habit::{Habit, HabitDraft, HabitSet, HabitUpdate},
    profile::{ProfileUpdate, UserProfile, WELCOME_COMPLETED},
    schema::{self, Persisted},
    store::{self, KeyValueStore, MemoryStore, FIRST_TIME_KEY},
};

/// Everything the home screen shows for one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub today: NaiveDate,
    pub active: bool,
    pub current_day: u32,
    pub total_days: u32,
    pub days_remaining: u32,
    pub progress_percentage: f64,
    pub completed_days: usize,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub challenge_complete: bool,
    pub habits: Vec<DayHabit>,
}

/// Owns the challenge, habits, per-day completions and profile, backed by a key-value store.
///
/// Every mutation lands in memory first and is then written through. Write failures are logged
/// and otherwise ignored; the in-memory state stays authoritative for the session.
pub struct ChallengeService {
    store: Box<dyn KeyValueStore>,
    clock: Box<dyn Clock>,
    default_days: u32,
    challenge: RwLock<ChallengeState>,
    habits: RwLock<HabitSet>,
    completions: RwLock<DayCompletions>,
    profile: RwLock<UserProfile>,
    first_time: RwLock<bool>,
}

pub struct ChallengeServiceBuilder {
    store: Option<Box<dyn KeyValueStore>>,
    clock: Option<Box<dyn Clock>>,
    default_days: u32,
}

impl Default for ChallengeServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChallengeServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            clock: None,
            default_days: DEFAULT_CHALLENGE_DAYS,
        }
    }

    pub fn with_store(mut self, store: Box<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_default_days(mut self, days: u32) -> Self {
        self.default_days = days.max(1);
        self
    }

    /// Loads persisted state. Unreadable entries fall back to defaults.
    pub fn build(self) -> ChallengeService {
        let service = ChallengeService {
            store: self.store.unwrap_or_else(|| Box::new(MemoryStore::new())),
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock)),
            default_days: self.default_days,
            challenge: RwLock::new(ChallengeState::default()),
            habits: RwLock::new(HabitSet::default()),
            completions: RwLock::new(DayCompletions::default()),
            profile: RwLock::new(UserProfile::default()),
            first_time: RwLock::new(true),
        };
        service.reload();
        service
    }
}

impl ChallengeService {
    pub fn builder() -> ChallengeServiceBuilder {
        ChallengeServiceBuilder::new()
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Re-reads every entity from the store.
    pub fn reload(&self) {
        let mut challenge = self.load_or_default::<ChallengeState>();
        let dropped = challenge.sanitize();
        if dropped > 0 {
            tracing::warn!(dropped, "discarded completed days outside the challenge window");
        }
        *self.challenge.write() = challenge;
        *self.habits.write() = self.load_or_default::<HabitSet>();
        *self.completions.write() = self.load_or_default::<DayCompletions>();
        *self.profile.write() = self.load_or_default::<UserProfile>();
        *self.first_time.write() = match self.store.get(FIRST_TIME_KEY) {
            Ok(value) => value.is_none(),
            Err(err) => {
                tracing::error!(%err, "unable to read first-run flag");
                true
            }
        };
    }

    pub fn challenge(&self) -> ChallengeState {
        self.challenge.read().clone()
    }

    #[instrument(skip(self))]
    pub fn start_challenge(&self, start_date: NaiveDate, days: Option<u32>) {
        let days = days.unwrap_or(self.default_days);
        let mut challenge = self.challenge.write();
        challenge.start(start_date, days);
        tracing::info!(%start_date, days = challenge.total_days(), "challenge started");
        self.persist(&*challenge);
    }

    pub fn start_challenge_today(&self) {
        self.start_challenge(self.today(), None);
    }

    #[instrument(skip(self))]
    pub fn reset_challenge(&self) {
        let mut challenge = self.challenge.write();
        challenge.reset();
        tracing::info!("challenge reset");
        self.persist(&*challenge);
    }

    pub fn current_day(&self) -> u32 {
        self.challenge.read().current_day(self.today())
    }

    pub fn days_remaining(&self) -> u32 {
        self.challenge.read().days_remaining(self.today())
    }

    pub fn progress_percentage(&self) -> f64 {
        self.challenge.read().progress_percentage(self.today())
    }

    pub fn is_challenge_complete(&self) -> bool {
        self.challenge.read().is_challenge_complete(self.today())
    }

    pub fn is_day_completed(&self, day: u32) -> bool {
        self.challenge.read().is_day_completed(day)
    }

    pub fn current_streak(&self) -> u32 {
        self.challenge.read().current_streak(self.today())
    }

    pub fn longest_streak(&self) -> u32 {
        self.challenge.read().longest_streak()
    }

    #[instrument(skip(self))]
    pub fn mark_day_completed(&self, day: u32) {
        let mut challenge = self.challenge.write();
        if challenge.mark_day_completed(day) {
            tracing::debug!(day, "day marked completed");
            self.persist(&*challenge);
        }
    }

    #[instrument(skip(self))]
    pub fn mark_day_incomplete(&self, day: u32) {
        let mut challenge = self.challenge.write();
        if challenge.mark_day_incomplete(day) {
            tracing::debug!(day, "day marked incomplete");
            self.persist(&*challenge);
        }
    }

    pub fn habits(&self) -> Vec<Habit> {
        self.habits.read().as_slice().to_vec()
    }

    /// Appends a habit, then re-derives today's challenge day against the longer list.
    #[instrument(skip(self, draft), fields(name = draft.name()))]
    pub fn add_habit(&self, draft: HabitDraft) -> u64 {
        let id = {
            let mut habits = self.habits.write();
            let id = habits.add(draft, self.clock.now_millis());
            tracing::debug!(id, "habit added");
            self.persist(&*habits);
            id
        };
        self.sync_day_status(self.today());
        id
    }

    #[instrument(skip(self, update))]
    pub fn update_habit(&self, id: u64, update: HabitUpdate) {
        let mut habits = self.habits.write();
        if habits.update(id, update) {
            self.persist(&*habits);
        }
    }

    /// Removes the habit, forgets its per-day completions and re-derives today's challenge day.
    #[instrument(skip(self))]
    pub fn delete_habit(&self, id: u64) {
        {
            let mut habits = self.habits.write();
            if !habits.delete(id) {
                return;
            }
            self.persist(&*habits);
        }
        {
            let mut completions = self.completions.write();
            if completions.remove_habit(id) > 0 {
                self.persist(&*completions);
            }
        }
        self.sync_day_status(self.today());
    }

    #[instrument(skip(self))]
    pub fn toggle_habit(&self, id: u64) {
        let mut habits = self.habits.write();
        if habits.toggle(id).is_some() {
            self.persist(&*habits);
        }
    }

    pub fn reset_habits_for_day(&self) {
        let mut habits = self.habits.write();
        habits.reset_all();
        self.persist(&*habits);
    }

    pub fn habits_for_day(&self, date: NaiveDate) -> Vec<DayHabit> {
        let habits = self.habits.read();
        self.completions
            .read()
            .habits_for_day(date, habits.as_slice())
    }

    /// Flips one habit on one date, then re-derives whether that challenge day is complete.
    /// Returns the new flag, or `None` for an unknown habit.
    #[instrument(skip(self))]
    pub fn toggle_habit_for_day(&self, date: NaiveDate, habit_id: u64) -> Option<bool> {
        if !self.habits.read().contains(habit_id) {
            return None;
        }
        let completed = {
            let mut completions = self.completions.write();
            let completed = completions.toggle(date, habit_id);
            self.persist(&*completions);
            completed
        };
        self.sync_day_status(date);
        Some(completed)
    }

    /// Marks the challenge day for `date` completed exactly when every habit is done on it.
    pub fn sync_day_status(&self, date: NaiveDate) {
        let Some(day) = self.challenge.read().challenge_day_for(date) else {
            return;
        };
        let all_done = {
            let habits = self.habits.read();
            self.completions.read().all_complete(date, habits.as_slice())
        };
        if all_done {
            self.mark_day_completed(day);
        } else {
            self.mark_day_incomplete(day);
        }
    }

    pub fn calendar(&self, month_ref: NaiveDate) -> Vec<DayView> {
        let challenge = self.challenge.read();
        calendar::project(month_ref, &challenge, self.today(), |day| {
            challenge.is_day_completed(day)
        })
    }

    pub fn dashboard(&self) -> DashboardSnapshot {
        let today = self.today();
        let habits = self.habits_for_day(today);
        let challenge = self.challenge.read();
        DashboardSnapshot {
            today,
            active: challenge.is_active(),
            current_day: challenge.current_day(today),
            total_days: challenge.total_days(),
            days_remaining: challenge.days_remaining(today),
            progress_percentage: challenge.progress_percentage(today),
            completed_days: challenge.completed_count(),
            current_streak: challenge.current_streak(today),
            longest_streak: challenge.longest_streak(),
            challenge_complete: challenge.is_challenge_complete(today),
            habits,
        }
    }

    pub fn profile(&self) -> UserProfile {
        self.profile.read().clone()
    }

    pub fn update_profile(&self, update: ProfileUpdate) {
        let mut profile = self.profile.write();
        profile.apply(update);
        self.persist(&*profile);
    }

    pub fn update_name(&self, name: impl Into<String>) {
        self.update_profile(ProfileUpdate {
            name: Some(name.into()),
            ..ProfileUpdate::default()
        });
    }

    pub fn update_email(&self, email: impl Into<String>) {
        self.update_profile(ProfileUpdate {
            email: Some(email.into()),
            ..ProfileUpdate::default()
        });
    }

    pub fn update_phone(&self, phone: impl Into<String>) {
        self.update_profile(ProfileUpdate {
            phone: Some(phone.into()),
            ..ProfileUpdate::default()
        });
    }

    pub fn update_profile_image(&self, uri: impl Into<String>) {
        self.update_profile(ProfileUpdate {
            profile_image: Some(uri.into()),
            ..ProfileUpdate::default()
        });
    }

    pub fn is_first_time(&self) -> bool {
        *self.first_time.read()
    }

    pub fn complete_welcome(&self) {
        match self.store.set(FIRST_TIME_KEY, WELCOME_COMPLETED) {
            Ok(()) => *self.first_time.write() = false,
            Err(err) => tracing::error!(%err, "unable to record completed welcome"),
        }
    }

    /// Wipes every stored key the app owns and returns the service to a fresh-install state.
    #[instrument(skip(self))]
    pub fn logout(&self) -> Result<Vec<String>, StoreError> {
        let removed = store::clear_all_app_data(self.store.as_ref())?;
        if !store::verify_data_cleared(self.store.as_ref()) {
            tracing::warn!("logout left app data behind");
        }
        *self.challenge.write() = ChallengeState::default();
        *self.habits.write() = HabitSet::default();
        *self.completions.write() = DayCompletions::default();
        *self.profile.write() = UserProfile::default();
        *self.first_time.write() = true;
        Ok(removed)
    }
}

impl ChallengeService {
    fn load_or_default<T: Persisted + Default>(&self) -> T {
        match schema::load::<T>(self.store.as_ref()) {
            Ok(value) => value.unwrap_or_default(),
            Err(err) => {
                tracing::error!(key = T::KEY, %err, "unable to load stored state, using defaults");
                T::default()
            }
        }
    }

    fn persist<T: Persisted>(&self, value: &T) {
        if let Err(err) = schema::save(self.store.as_ref(), value) {
            tracing::error!(key = T::KEY, %err, "unable to persist state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Shares one store between several service instances, like an app restart would.
    struct SharedStore(Arc<MemoryStore>);

    impl KeyValueStore for SharedStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.0.set(key, value)
        }
        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.0.remove(key)
        }
        fn keys(&self) -> Result<Vec<String>, StoreError> {
            self.0.keys()
        }
    }

    /// Fails every write.
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Ok(None)
        }
        fn set(&self, key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::InvalidKey(key.to_string()))
        }
        fn remove(&self, key: &str) -> Result<(), StoreError> {
            Err(StoreError::InvalidKey(key.to_string()))
        }
        fn keys(&self) -> Result<Vec<String>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn service_on(store: &Arc<MemoryStore>, today: NaiveDate) -> ChallengeService {
        ChallengeService::builder()
            .with_store(Box::new(SharedStore(store.clone())))
            .with_clock(Box::new(FixedClock(today)))
            .build()
    }

    #[test]
    fn metrics_follow_the_clock() {
        let store = Arc::new(MemoryStore::new());
        let service = service_on(&store, date(2024, 1, 10));
        service.start_challenge(date(2024, 1, 1), Some(75));
        assert_eq!(service.current_day(), 10);
        assert_eq!(service.days_remaining(), 65);
        assert!((service.progress_percentage() - 13.333_333).abs() < 1e-4);
        assert!(!service.is_challenge_complete());

        let later = service_on(&store, date(2024, 3, 20));
        assert_eq!(later.current_day(), 75);
        assert!(later.is_challenge_complete());
    }

    #[test]
    fn state_survives_restart() {
        let store = Arc::new(MemoryStore::new());
        let today = date(2024, 1, 3);
        let first = service_on(&store, today);
        first.start_challenge_today();
        first.mark_day_completed(1);
        let id = first.add_habit(HabitDraft::new("walk-outline", "Walk 10k steps").unwrap());
        first.toggle_habit_for_day(today, id);
        first.update_name("Ana");
        first.update_profile_image("file:///photos/ana.jpg");
        first.complete_welcome();

        let second = service_on(&store, today);
        assert_eq!(second.challenge(), first.challenge());
        assert_eq!(second.habits(), first.habits());
        assert!(second
            .habits_for_day(today)
            .iter()
            .any(|entry| entry.habit.id == id && entry.completed));
        assert_eq!(second.profile().name, "Ana");
        assert_eq!(
            second.profile().profile_image.as_deref(),
            Some("file:///photos/ana.jpg")
        );
        assert!(!second.is_first_time());
    }

    #[test]
    fn completing_every_habit_completes_the_day() {
        let store = Arc::new(MemoryStore::new());
        let today = date(2024, 1, 2);
        let service = service_on(&store, today);
        service.start_challenge(date(2024, 1, 1), None);

        let ids: Vec<u64> = service.habits().iter().map(|habit| habit.id).collect();
        for id in &ids {
            assert!(!service.is_day_completed(2));
            assert_eq!(service.toggle_habit_for_day(today, *id), Some(true));
        }
        assert!(service.is_day_completed(2));
        assert_eq!(service.dashboard().completed_days, 1);

        assert_eq!(service.toggle_habit_for_day(today, ids[0]), Some(false));
        assert!(!service.is_day_completed(2));
    }

    #[test]
    fn toggling_outside_the_window_only_records_the_habit() {
        let store = Arc::new(MemoryStore::new());
        let service = service_on(&store, date(2024, 1, 10));
        service.start_challenge(date(2024, 1, 5), None);
        let before = date(2024, 1, 1);
        for habit in service.habits() {
            service.toggle_habit_for_day(before, habit.id);
        }
        assert!(service.challenge().completed_days().is_empty());
        assert_eq!(service.toggle_habit_for_day(before, 4242), None);
    }

    #[test]
    fn deleting_a_habit_prunes_its_history() {
        let store = Arc::new(MemoryStore::new());
        let today = date(2024, 1, 2);
        let service = service_on(&store, today);
        service.toggle_habit_for_day(today, 1);
        service.delete_habit(1);
        assert!(service.habits().iter().all(|habit| habit.id != 1));
        assert!(service.habits_for_day(today).iter().all(|e| !e.completed));
        service.delete_habit(1);
    }

    #[test]
    fn deleting_the_last_open_habit_completes_today() {
        let store = Arc::new(MemoryStore::new());
        let today = date(2024, 1, 1);
        let service = service_on(&store, today);
        service.start_challenge_today();
        let ids: Vec<u64> = service.habits().iter().map(|habit| habit.id).collect();
        for id in &ids[..ids.len() - 1] {
            service.toggle_habit_for_day(today, *id);
        }
        assert!(!service.is_day_completed(1));

        service.delete_habit(ids[ids.len() - 1]);
        assert!(service.is_day_completed(1));
        assert!(service_on(&store, today).is_day_completed(1));
    }

    #[test]
    fn adding_a_habit_reopens_a_completed_day() {
        let store = Arc::new(MemoryStore::new());
        let today = date(2024, 1, 1);
        let service = service_on(&store, today);
        service.start_challenge_today();
        for habit in service.habits() {
            service.toggle_habit_for_day(today, habit.id);
        }
        assert!(service.is_day_completed(1));

        service.add_habit(HabitDraft::new("walk-outline", "Walk").unwrap());
        assert!(!service.is_day_completed(1));
        assert!(!service_on(&store, today).is_day_completed(1));
    }

    #[test]
    fn habit_ids_come_from_the_clock() {
        let store = Arc::new(MemoryStore::new());
        let service = service_on(&store, date(2024, 1, 1));
        let id = service.add_habit(HabitDraft::new("book-outline", "Read 10 pages").unwrap());
        assert_eq!(id, 1_704_067_200_000);
        let next = service.add_habit(HabitDraft::new("book-outline", "Read more").unwrap());
        assert_eq!(next, id + 1);
    }

    #[test]
    fn write_failures_keep_memory_authoritative() {
        let service = ChallengeService::builder()
            .with_store(Box::new(ReadOnlyStore))
            .with_clock(Box::new(FixedClock(date(2024, 1, 1))))
            .build();
        service.start_challenge_today();
        service.mark_day_completed(1);
        assert_eq!(service.current_day(), 1);
        assert!(service.is_day_completed(1));
        service.complete_welcome();
        assert!(service.is_first_time());
    }

    #[test]
    fn corrupt_entries_fall_back_to_defaults() {
        let store = Arc::new(MemoryStore::new());
        store.set(crate::store::HABITS_KEY, "{oops").unwrap();
        store
            .set(
                crate::store::CHALLENGE_KEY,
                r#"{"schemaVersion":1,"data":{"startDate":"2024-01-01","challengeDays":10,"isActive":true,"completedDays":[3,11,40]}}"#,
            )
            .unwrap();
        let service = service_on(&store, date(2024, 1, 5));
        assert_eq!(service.habits(), HabitSet::with_defaults().as_slice());
        assert_eq!(
            service.challenge().completed_days().iter().copied().collect::<Vec<_>>(),
            vec![3]
        );
    }

    #[test]
    fn calendar_uses_tracked_completion() {
        let store = Arc::new(MemoryStore::new());
        let service = service_on(&store, date(2024, 1, 10));
        service.start_challenge(date(2024, 1, 5), Some(75));
        service.mark_day_completed(1);
        let days = service.calendar(date(2024, 1, 1));
        assert!(days[..4].iter().all(|view| view.is_disabled));
        assert_eq!(days[4].challenge_day_index, 1);
        assert!(days[4].completed);
        assert!(days[9].is_today);
    }

    #[test]
    fn reset_is_persisted() {
        let store = Arc::new(MemoryStore::new());
        let service = service_on(&store, date(2024, 1, 10));
        service.start_challenge(date(2024, 1, 5), None);
        service.reset_challenge();
        let reopened = service_on(&store, date(2024, 1, 10));
        assert!(!reopened.challenge().is_active());
        assert_eq!(reopened.current_day(), 0);
    }

    #[test]
    fn logout_returns_to_fresh_install() {
        let store = Arc::new(MemoryStore::new());
        let service = service_on(&store, date(2024, 1, 10));
        service.start_challenge_today();
        service.update_email("a@b.c");
        service.complete_welcome();
        store.set("unrelated", "keep").unwrap();

        let removed = service.logout().unwrap();
        assert!(removed.contains(&FIRST_TIME_KEY.to_string()));
        assert!(service.is_first_time());
        assert!(!service.challenge().is_active());
        assert_eq!(service.profile(), UserProfile::default());
        assert_eq!(store.keys().unwrap(), vec!["unrelated".to_string()]);
    }
}
