//! Versioned on-disk layout of every persisted entity.
//!
//! Writes wrap the payload as `{"schemaVersion": N, "data": ...}`. Anything read back without
//! that envelope predates versioning and is treated as version 0, then migrated forward.

use chrono::{DateTime, Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    challenge::ChallengeState,
    completion::DayCompletions,
    error::StoreError,
    habit::HabitSet,
    profile::UserProfile,
    store::{KeyValueStore, CHALLENGE_KEY, DAY_COMPLETIONS_KEY, HABITS_KEY, USER_KEY},
};

pub const SCHEMA_VERSION: u32 = 1;

const VERSION_FIELD: &str = "schemaVersion";
const DATA_FIELD: &str = "data";

/// An entity stored as JSON under a fixed key.
pub trait Persisted: Serialize + DeserializeOwned {
    const KEY: &'static str;

    /// Rewrites a payload stored at `version` into the current layout.
    fn migrate(_version: u32, payload: Value) -> Value {
        payload
    }
}

impl Persisted for ChallengeState {
    const KEY: &'static str = CHALLENGE_KEY;

    fn migrate(version: u32, mut payload: Value) -> Value {
        if version == 0 {
            // unversioned writes stored the start as a full UTC timestamp
            if let Some(raw) = payload.get("startDate").and_then(Value::as_str) {
                if let Some(date) = parse_legacy_date(raw) {
                    payload["startDate"] = json!(date.format("%Y-%m-%d").to_string());
                }
            }
        }
        payload
    }
}

impl Persisted for HabitSet {
    const KEY: &'static str = HABITS_KEY;
}

impl Persisted for DayCompletions {
    const KEY: &'static str = DAY_COMPLETIONS_KEY;
}

impl Persisted for UserProfile {
    const KEY: &'static str = USER_KEY;
}

fn parse_legacy_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|instant| instant.with_timezone(&Local).date_naive())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a, T> {
    schema_version: u32,
    data: &'a T,
}

pub fn encode<T: Persisted>(value: &T) -> Result<String, StoreError> {
    let envelope = Envelope {
        schema_version: SCHEMA_VERSION,
        data: value,
    };
    serde_json::to_string(&envelope).map_err(|source| StoreError::Json {
        key: T::KEY.to_string(),
        source,
    })
}

pub fn decode<T: Persisted>(raw: &str) -> Result<T, StoreError> {
    let json_error = |source| StoreError::Json {
        key: T::KEY.to_string(),
        source,
    };
    let value: Value = serde_json::from_str(raw).map_err(json_error)?;
    let (version, payload) = split_envelope(value);
    if version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedVersion {
            key: T::KEY.to_string(),
            found: version,
            supported: SCHEMA_VERSION,
        });
    }
    if version < SCHEMA_VERSION {
        tracing::debug!(key = T::KEY, from = version, to = SCHEMA_VERSION, "migrating payload");
    }
    serde_json::from_value(T::migrate(version, payload)).map_err(json_error)
}

fn split_envelope(value: Value) -> (u32, Value) {
    if let Value::Object(mut map) = value {
        let version = map
            .get(VERSION_FIELD)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok());
        if let (Some(version), true) = (version, map.contains_key(DATA_FIELD)) {
            let data = map.remove(DATA_FIELD).unwrap_or(Value::Null);
            return (version, data);
        }
        return (0, Value::Object(map));
    }
    (0, value)
}

/// `Ok(None)` when nothing has been stored yet.
pub fn load<T: Persisted>(store: &dyn KeyValueStore) -> Result<Option<T>, StoreError> {
    store
        .get(T::KEY)?
        .map(|raw| decode::<T>(&raw))
        .transpose()
}

pub fn save<T: Persisted>(store: &dyn KeyValueStore, value: &T) -> Result<(), StoreError> {
    store.set(T::KEY, &encode(value)?)
}
