// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::draft::{DraftKey, DraftTracker, SnapshotRules};
use crate::forms::{ReasonDetailsForm, ScoreDetailsForm, ValidationFailure};
use crate::guard::PendingChanges;
use crate::store::KeyValueStore;

/// A form whose unsaved state can be parked in a draft store.
pub trait EditableForm: Serialize + DeserializeOwned + Clone {
    fn draft_key(&self) -> DraftKey;
    fn snapshot_rules() -> SnapshotRules;
    fn validate(&self) -> Result<(), ValidationFailure>;
}

impl EditableForm for ScoreDetailsForm {
    fn draft_key(&self) -> DraftKey {
        Self::draft_key(self)
    }

    fn snapshot_rules() -> SnapshotRules {
        Self::snapshot_rules()
    }

    fn validate(&self) -> Result<(), ValidationFailure> {
        Self::validate(self)
    }
}

impl EditableForm for ReasonDetailsForm {
    fn draft_key(&self) -> DraftKey {
        Self::draft_key(self)
    }

    fn snapshot_rules() -> SnapshotRules {
        Self::snapshot_rules()
    }

    fn validate(&self) -> Result<(), ValidationFailure> {
        Self::validate(self)
    }
}

fn form_value<F: Serialize>(form: &F, key: &DraftKey) -> Result<Value> {
    serde_json::to_value(form).with_context(|| format!("encode form for {key}"))
}

/// Live copy of one form plus the server copy it was loaded from. Every
/// mutation goes through [`DraftEditor::edit`] so the draft store stays in
/// sync with the dirty flag.
pub struct DraftEditor<'a, F> {
    store: &'a dyn KeyValueStore,
    tracker: DraftTracker,
    server: F,
    form: F,
}

impl<'a, F: EditableForm> DraftEditor<'a, F> {
    /// Loads `server_form` and resumes a stored draft for it, if any.
    pub fn open(store: &'a dyn KeyValueStore, server_form: F) -> Result<Self> {
        let key = server_form.draft_key();
        let mut tracker = DraftTracker::new(key.clone(), F::snapshot_rules());
        let server_value = form_value(&server_form, &key)?;

        let form = match tracker.restore_on_entry(&server_value, store)? {
            None => server_form.clone(),
            Some(draft) => match serde_json::from_value::<F>(draft) {
                Ok(form) => form,
                Err(error) => {
                    log::warn!("draft {key} no longer fits the form, dropping it: {error}");
                    tracker.clear(&server_value, store)?;
                    tracker.end_edit();
                    server_form.clone()
                }
            },
        };

        Ok(Self {
            store,
            tracker,
            server: server_form,
            form,
        })
    }

    pub fn form(&self) -> &F {
        &self.form
    }

    pub fn server_form(&self) -> &F {
        &self.server
    }

    pub fn key(&self) -> &DraftKey {
        self.tracker.key()
    }

    pub const fn is_editing(&self) -> bool {
        self.tracker.is_editing()
    }

    pub const fn save_enabled(&self) -> bool {
        self.tracker.save_enabled()
    }

    /// Enters edit mode with the current form as baseline. A resumed draft
    /// is already in edit mode and keeps the server baseline.
    pub fn begin_edit(&mut self) -> Result<()> {
        if self.tracker.is_editing() {
            return Ok(());
        }
        let value = form_value(&self.form, self.tracker.key())?;
        self.tracker.begin_edit(&value);
        Ok(())
    }

    /// Applies `mutate` and returns whether Save is now enabled.
    pub fn edit(&mut self, mutate: impl FnOnce(&mut F)) -> Result<bool> {
        self.begin_edit()?;
        mutate(&mut self.form);
        let value = form_value(&self.form, self.tracker.key())?;
        self.tracker.observe(&value, self.store)
    }

    pub fn validate(&self) -> Result<(), ValidationFailure> {
        self.form.validate()
    }

    /// Records a successful save of `committed`.
    pub fn saved(&mut self, committed: F) -> Result<()> {
        let value = form_value(&committed, self.tracker.key())?;
        self.tracker.commit(&value, self.store)?;
        self.tracker.end_edit();
        self.server = committed.clone();
        self.form = committed;
        Ok(())
    }

    /// Drops local changes and the stored draft, back to the server copy.
    pub fn discard(&mut self) -> Result<()> {
        let value = form_value(&self.server, self.tracker.key())?;
        self.tracker.clear(&value, self.store)?;
        self.tracker.end_edit();
        self.form = self.server.clone();
        Ok(())
    }
}

impl<F: EditableForm> PendingChanges for DraftEditor<'_, F> {
    fn has_form_changed(&self) -> bool {
        match serde_json::to_value(&self.form) {
            Ok(value) => self.tracker.has_form_changed(&value),
            Err(error) => {
                log::warn!("cannot compare {}: {error}", self.tracker.key());
                true
            }
        }
    }

    fn has_pending_drafts(&self) -> bool {
        self.tracker
            .has_pending_draft(self.store)
            .unwrap_or_else(|error| {
                log::warn!("cannot read draft {}: {error:#}", self.tracker.key());
                false
            })
    }

    fn clear_drafts_for_current_type(&mut self) -> Result<()> {
        self.discard()
    }
}
