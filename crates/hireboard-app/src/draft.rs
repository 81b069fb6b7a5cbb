// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

use crate::ids::{ProcessId, ScoreTypeId};
use crate::store::KeyValueStore;

const SCORE_DETAILS_PREFIX: &str = "scoreDetailsDraft";
const REASON_DETAILS_PREFIX: &str = "reasonDetails";

/// Storage key for one entity's draft. Keys are scoped per entity so edit
/// sessions for different entities never overwrite each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DraftKey(String);

impl DraftKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn scoped(prefix: &str, parts: &[&dyn fmt::Display]) -> Self {
        let mut key = prefix.to_owned();
        for part in parts {
            key.push(':');
            key.push_str(&part.to_string());
        }
        Self(key)
    }

    pub fn score_details(score_type: ScoreTypeId) -> Self {
        Self::scoped(SCORE_DETAILS_PREFIX, &[&"type", &score_type])
    }

    pub fn reason_details(process: ProcessId) -> Self {
        Self::scoped(REASON_DETAILS_PREFIX, &[&process])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct UnorderedArray {
    pointer: String,
    key_fields: Vec<String>,
}

/// Which arrays of a snapshot carry no meaningful order. Every array not
/// listed is compared position by position.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SnapshotRules {
    unordered: Vec<UnorderedArray>,
}

impl SnapshotRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort the array at JSON pointer `pointer` by the composite key built
    /// from `key_fields` before comparing.
    pub fn unordered(mut self, pointer: &str, key_fields: &[&str]) -> Self {
        self.unordered.push(UnorderedArray {
            pointer: pointer.to_owned(),
            key_fields: key_fields.iter().map(|field| (*field).to_owned()).collect(),
        });
        self
    }

    pub fn normalize(&self, state: &Value) -> Value {
        let mut normalized = state.clone();
        for rule in &self.unordered {
            if let Some(Value::Array(items)) = normalized.pointer_mut(&rule.pointer) {
                items.sort_by(|left, right| compare_by_fields(left, right, &rule.key_fields));
            }
        }
        normalized
    }
}

fn compare_by_fields(left: &Value, right: &Value, fields: &[String]) -> Ordering {
    for field in fields {
        let ordering = compare_values(
            left.get(field).unwrap_or(&Value::Null),
            right.get(field).unwrap_or(&Value::Null),
        );
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(left), Value::Number(right)) => match (left.as_f64(), right.as_f64()) {
            (Some(left), Some(right)) => left.total_cmp(&right),
            _ => left.to_string().cmp(&right.to_string()),
        },
        (Value::String(left), Value::String(right)) => left
            .to_lowercase()
            .cmp(&right.to_lowercase())
            .then_with(|| left.cmp(right)),
        (Value::Bool(left), Value::Bool(right)) => left.cmp(right),
        _ => left.to_string().cmp(&right.to_string()),
    }
}

/// Dirty tracking for one editable entity: a normalized baseline snapshot,
/// structural comparison against live state, and a persisted draft that
/// mirrors whether the two differ.
#[derive(Debug, Clone)]
pub struct DraftTracker {
    key: DraftKey,
    rules: SnapshotRules,
    snapshot: Option<Value>,
    editing: bool,
    save_enabled: bool,
}

impl DraftTracker {
    pub fn new(key: DraftKey, rules: SnapshotRules) -> Self {
        Self {
            key,
            rules,
            snapshot: None,
            editing: false,
            save_enabled: false,
        }
    }

    pub fn key(&self) -> &DraftKey {
        &self.key
    }

    pub fn snapshot(&self) -> Option<&Value> {
        self.snapshot.as_ref()
    }

    pub const fn is_editing(&self) -> bool {
        self.editing
    }

    pub const fn save_enabled(&self) -> bool {
        self.save_enabled
    }

    pub fn begin_edit(&mut self, state: &Value) {
        self.snapshot = Some(self.rules.normalize(state));
        self.editing = true;
        self.save_enabled = false;
    }

    pub fn end_edit(&mut self) {
        self.editing = false;
        self.save_enabled = false;
    }

    pub fn has_form_changed(&self, state: &Value) -> bool {
        match &self.snapshot {
            Some(snapshot) => *snapshot != self.rules.normalize(state),
            None => false,
        }
    }

    pub fn has_pending_draft(&self, store: &dyn KeyValueStore) -> Result<bool> {
        Ok(store.get(self.key.as_str())?.is_some())
    }

    /// Recomputes the changed flag after a state-changing event and syncs
    /// the persisted draft with it. Returns whether Save is enabled.
    pub fn observe(&mut self, state: &Value, store: &dyn KeyValueStore) -> Result<bool> {
        if self.snapshot.is_none() {
            return Ok(false);
        }
        self.save_enabled = self.has_form_changed(state);
        if self.save_enabled {
            let raw = serde_json::to_string(state)
                .with_context(|| format!("encode draft {}", self.key))?;
            store.put(self.key.as_str(), &raw)?;
        } else {
            store.remove(self.key.as_str())?;
        }
        Ok(self.save_enabled)
    }

    /// Called after a successful save: the committed state becomes the new
    /// baseline and the draft is dropped.
    pub fn commit(&mut self, state: &Value, store: &dyn KeyValueStore) -> Result<()> {
        self.snapshot = Some(self.rules.normalize(state));
        self.save_enabled = false;
        store.remove(self.key.as_str())
    }

    /// Takes `server_state` as the baseline and returns the persisted draft
    /// when it differs. A draft identical to the server state is discarded.
    pub fn restore_on_entry(
        &mut self,
        server_state: &Value,
        store: &dyn KeyValueStore,
    ) -> Result<Option<Value>> {
        self.snapshot = Some(self.rules.normalize(server_state));
        self.editing = false;
        self.save_enabled = false;

        let Some(raw) = store.get(self.key.as_str())? else {
            return Ok(None);
        };
        let draft: Value = match serde_json::from_str(&raw) {
            Ok(draft) => draft,
            Err(error) => {
                log::warn!("dropping unreadable draft {}: {error}", self.key);
                store.remove(self.key.as_str())?;
                return Ok(None);
            }
        };

        if !self.has_form_changed(&draft) {
            log::debug!("draft {} matches server state; discarding", self.key);
            store.remove(self.key.as_str())?;
            return Ok(None);
        }

        log::info!("restoring unsaved draft {}", self.key);
        self.editing = true;
        self.save_enabled = true;
        Ok(Some(draft))
    }

    /// Removes the persisted draft and re-baselines on `state`. Safe to call
    /// repeatedly.
    pub fn clear(&mut self, state: &Value, store: &dyn KeyValueStore) -> Result<()> {
        store.remove(self.key.as_str())?;
        self.snapshot = Some(self.rules.normalize(state));
        self.save_enabled = false;
        Ok(())
    }
}
