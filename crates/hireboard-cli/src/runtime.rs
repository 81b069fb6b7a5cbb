// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use hireboard_api::{Client, SCORE_TYPES_PATH};
use hireboard_app::{PageQuery, PagedEnvelope, Row, RowId, ScoreDetailsForm, ScoreTypeId};
use hireboard_testkit::DemoBackend;
use hireboard_tui::AppRuntime;

pub struct HttpRuntime<'a> {
    client: &'a Client,
}

impl<'a> HttpRuntime<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }
}

impl AppRuntime for HttpRuntime<'_> {
    fn load_score_types(&mut self, query: &PageQuery) -> Result<PagedEnvelope<Row>> {
        let page = self
            .client
            .fetch_page(SCORE_TYPES_PATH, query)
            .with_context(|| format!("load score types page {}", query.page))?;
        log::debug!(
            "loaded score types page {} ({} of {})",
            page.page,
            page.items.len(),
            page.total_items
        );
        Ok(page)
    }

    fn set_score_type_active(&mut self, id: RowId, active: bool) -> Result<()> {
        self.client
            .set_score_type_active(ScoreTypeId::new(id.get()), active)
            .with_context(|| format!("set score type {id} active={active}"))?;
        log::info!("score type {id} active={active}");
        Ok(())
    }

    fn create_score_type(&mut self, draft: &Row) -> Result<Row> {
        let created = self
            .client
            .create_score_type(draft)
            .with_context(|| format!("create score type {:?}", draft.display("name")))?;
        log::info!("created score type {:?}", created.id());
        Ok(created)
    }

    fn update_score_type(&mut self, id: RowId, patch: &Row) -> Result<Row> {
        let updated = self
            .client
            .update_score_type(id, patch)
            .with_context(|| format!("update score type {id}"))?;
        log::info!("updated score type {id}");
        Ok(updated)
    }

    fn delete_score_type(&mut self, id: RowId) -> Result<()> {
        self.client
            .delete_score_type(id)
            .with_context(|| format!("delete score type {id}"))?;
        log::info!("deleted score type {id}");
        Ok(())
    }

    fn load_score_details(&mut self, id: ScoreTypeId) -> Result<ScoreDetailsForm> {
        self.client
            .score_details(id)
            .with_context(|| format!("load score details {id}"))
    }

    fn save_score_details(&mut self, form: &ScoreDetailsForm) -> Result<ScoreDetailsForm> {
        let saved = self
            .client
            .save_score_details(form)
            .with_context(|| format!("save score details {}", form.score_type_id))?;
        log::info!(
            "saved score details {} ({} rules)",
            saved.score_type_id,
            saved.rules.len()
        );
        Ok(saved)
    }
}

/// Runs the pages against an in-memory backend seeded with fake data.
pub struct DemoRuntime {
    backend: DemoBackend,
}

impl DemoRuntime {
    pub fn new(count: usize) -> Self {
        Self {
            backend: DemoBackend::new(count),
        }
    }
}

impl AppRuntime for DemoRuntime {
    fn load_score_types(&mut self, query: &PageQuery) -> Result<PagedEnvelope<Row>> {
        hireboard_app::RowSource::fetch_rows(&self.backend, query)
    }

    fn set_score_type_active(&mut self, id: RowId, active: bool) -> Result<()> {
        self.backend.set_active(id, active)
    }

    fn create_score_type(&mut self, draft: &Row) -> Result<Row> {
        self.backend.create(draft)
    }

    fn update_score_type(&mut self, id: RowId, patch: &Row) -> Result<Row> {
        self.backend.update(id, patch)
    }

    fn delete_score_type(&mut self, id: RowId) -> Result<()> {
        self.backend.delete(id)
    }

    fn load_score_details(&mut self, id: ScoreTypeId) -> Result<ScoreDetailsForm> {
        self.backend.score_details(id)
    }

    fn save_score_details(&mut self, form: &ScoreDetailsForm) -> Result<ScoreDetailsForm> {
        self.backend.save_score_details(form)
    }
}
