use crate::calendar::default_planning;
use crate::errors::StorageError;
use crate::models::{PlanningDay, RankChangeRecord, TrainingEvent};
use crate::rules::RuleTable;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::{error, warn};

pub const SCHEMA_VERSION: u64 = 1;

pub const RULES_KEY: &str = "karate_rules";
pub const PLANNING_KEY: &str = "karate_planning";

pub fn events_key(profile: &str) -> String {
    format!("karate_events_{profile}")
}

pub fn rank_log_key(profile: &str) -> String {
    format!("karate_belts_{profile}")
}

/// Key-value persistence boundary. The engine never touches it directly;
/// callers read through it, compute, then write back.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// Whole-document store kept in memory and flushed to disk by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryStore {
    entries: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Outcome of reading one key.
#[derive(Debug, PartialEq)]
pub enum Stored<T> {
    Missing,
    Corrupt,
    Present(T),
}

impl<T> Stored<T> {
    pub fn unwrap_or_else(self, missing: impl FnOnce() -> T, corrupt: impl FnOnce() -> T) -> T {
        match self {
            Self::Missing => missing(),
            Self::Corrupt => corrupt(),
            Self::Present(value) => value,
        }
    }
}

/// Reads a value written by [`write_versioned`], or a bare legacy payload.
/// Only a failing store is an error; bad payloads come back as `Corrupt`.
pub fn read_versioned<T, S>(store: &S, key: &str) -> Result<Stored<T>, StorageError>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let Some(value) = store.get(key)? else {
        return Ok(Stored::Missing);
    };

    let payload = match unwrap_envelope(value) {
        Ok(payload) => payload,
        Err(version) => {
            warn!(key, version, "ignoring value written by a newer schema");
            return Ok(Stored::Corrupt);
        }
    };

    match serde_json::from_value(payload) {
        Ok(parsed) => Ok(Stored::Present(parsed)),
        Err(err) => {
            error!(key, "failed to parse stored value: {err}");
            Ok(Stored::Corrupt)
        }
    }
}

fn unwrap_envelope(value: Value) -> Result<Value, u64> {
    let Value::Object(mut map) = value else {
        return Ok(value);
    };
    let is_envelope = map.len() == 2 && map.contains_key("version") && map.contains_key("items");
    if !is_envelope {
        return Ok(Value::Object(map));
    }
    let version = map.get("version").and_then(Value::as_u64).unwrap_or(u64::MAX);
    if version > SCHEMA_VERSION {
        return Err(version);
    }
    Ok(map.remove("items").unwrap_or(Value::Null))
}

pub fn write_versioned<T, S>(store: &mut S, key: &str, items: &T) -> Result<(), StorageError>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let items = serde_json::to_value(items)?;
    store.set(key, json!({ "version": SCHEMA_VERSION, "items": items }))
}

pub fn load_events<S: KeyValueStore + ?Sized>(
    store: &S,
    profile: &str,
) -> Result<Vec<TrainingEvent>, StorageError> {
    Ok(read_versioned(store, &events_key(profile))?.unwrap_or_else(Vec::new, Vec::new))
}

pub fn save_events<S: KeyValueStore + ?Sized>(
    store: &mut S,
    profile: &str,
    events: &[TrainingEvent],
) -> Result<(), StorageError> {
    write_versioned(store, &events_key(profile), events)
}

pub fn load_rank_log<S: KeyValueStore + ?Sized>(
    store: &S,
    profile: &str,
) -> Result<Vec<RankChangeRecord>, StorageError> {
    Ok(read_versioned(store, &rank_log_key(profile))?.unwrap_or_else(Vec::new, Vec::new))
}

pub fn save_rank_log<S: KeyValueStore + ?Sized>(
    store: &mut S,
    profile: &str,
    log: &[RankChangeRecord],
) -> Result<(), StorageError> {
    write_versioned(store, &rank_log_key(profile), log)
}

/// A missing table falls back to the default thresholds, a corrupt one to none.
pub fn load_rules<S: KeyValueStore + ?Sized>(store: &S) -> Result<RuleTable, StorageError> {
    Ok(read_versioned(store, RULES_KEY)?.unwrap_or_else(RuleTable::defaults, RuleTable::new))
}

pub fn save_rules<S: KeyValueStore + ?Sized>(
    store: &mut S,
    rules: &RuleTable,
) -> Result<(), StorageError> {
    write_versioned(store, RULES_KEY, rules)
}

pub fn load_planning<S: KeyValueStore + ?Sized>(
    store: &S,
) -> Result<Vec<PlanningDay>, StorageError> {
    Ok(read_versioned(store, PLANNING_KEY)?.unwrap_or_else(default_planning, Vec::new))
}

pub fn save_planning<S: KeyValueStore + ?Sized>(
    store: &mut S,
    planning: &[PlanningDay],
) -> Result<(), StorageError> {
    write_versioned(store, PLANNING_KEY, planning)
}

pub async fn load_document(path: &Path) -> MemoryStore {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(store) => store,
            Err(err) => {
                error!("failed to parse data file: {err}");
                MemoryStore::default()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => MemoryStore::default(),
        Err(err) => {
            error!("failed to read data file: {err}");
            MemoryStore::default()
        }
    }
}

pub async fn persist_document(path: &Path, store: &MemoryStore) -> Result<(), StorageError> {
    let payload = serde_json::to_vec_pretty(store)?;
    fs::write(path, payload)
        .await
        .map_err(|err| StorageError::Unavailable(format!("{}: {err}", path.display())))?;
    Ok(())
}
