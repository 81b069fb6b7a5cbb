// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use hireboard_app::{
    PageQuery, PagedEnvelope, Row, RowId, RowSource, ScoreDetailsForm, ScoreRule, ScoreRuleId,
    ScoreTypeId,
};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;
use time::macros::format_description;
use time::{Date, Duration, Month};

const SCORE_TYPE_NAMES: [&str; 10] = [
    "Technical",
    "Communication",
    "Problem solving",
    "Leadership",
    "Culture add",
    "Ownership",
    "Domain knowledge",
    "Collaboration",
    "Written test",
    "Presentation",
];

const CATEGORIES: [&str; 3] = ["technical", "behavioral", "cultural"];

const RULE_LABELS: [&str; 5] = ["Poor", "Fair", "Good", "Strong", "Outstanding"];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator for recruitment fixtures. Equal seeds give equal data.
#[derive(Debug, Clone)]
pub struct RecruitFaker {
    rng: DeterministicRng,
}

impl RecruitFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn score_type(&mut self, id: i64) -> Row {
        let index = usize::try_from(id.max(1) - 1).unwrap_or(0);
        let base = SCORE_TYPE_NAMES[index % SCORE_TYPE_NAMES.len()];
        let name = if index < SCORE_TYPE_NAMES.len() {
            base.to_owned()
        } else {
            format!("{base} {}", index / SCORE_TYPE_NAMES.len() + 1)
        };
        let category = CATEGORIES[self.rng.int_n(CATEGORIES.len())];
        let offset = i64::try_from(self.rng.int_n(365)).unwrap_or(0);
        Row::new()
            .with("id", id)
            .with("name", name)
            .with("category", category)
            .with("weight", 1 + self.rng.int_n(5) as i64)
            .with("createdOn", format_date(reference_date() + Duration::days(offset)))
            .with("active", !self.rng.bool() || id % 3 != 0)
    }

    /// Contiguous, non-overlapping rules covering 0..=100.
    pub fn score_details(&mut self, id: ScoreTypeId, name: &str) -> ScoreDetailsForm {
        let count = 2 + self.rng.int_n(RULE_LABELS.len() - 1);
        let step = 100 / i64::try_from(count).unwrap_or(1);
        let rules = (0..count)
            .map(|index| {
                let position = i64::try_from(index).unwrap_or(0);
                let min_score = position * step + i64::from(index > 0);
                let max_score = if index + 1 == count {
                    100
                } else {
                    (position + 1) * step
                };
                ScoreRule {
                    id: Some(ScoreRuleId::new(id.get() * 100 + position + 1)),
                    label: RULE_LABELS[index].to_owned(),
                    min_score,
                    max_score,
                    points: position,
                    active: true,
                }
            })
            .collect();
        ScoreDetailsForm {
            score_type_id: id,
            name: name.to_owned(),
            rules,
        }
    }
}

pub fn sample_score_types(count: usize) -> Vec<Row> {
    let mut faker = RecruitFaker::new(7);
    (1..=count)
        .map(|id| faker.score_type(i64::try_from(id).unwrap_or(i64::MAX)))
        .collect()
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("hireboard.db");
    Ok((dir, db_path))
}

pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56Z"
}

fn reference_date() -> Date {
    Date::from_calendar_date(2025, Month::January, 1).unwrap_or(Date::MIN)
}

fn format_date(value: Date) -> String {
    value
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "1970-01-01".to_owned())
}

/// In-memory stand-in for the recruitment backend: score types with their
/// rule sets, server-side filtering, sorting and paging, and a switch that
/// makes every write fail.
#[derive(Debug)]
pub struct DemoBackend {
    score_types: RefCell<Vec<Row>>,
    details: RefCell<BTreeMap<i64, ScoreDetailsForm>>,
    next_id: Cell<i64>,
    fail_writes: Cell<bool>,
    fetches: Cell<usize>,
}

impl DemoBackend {
    pub fn new(count: usize) -> Self {
        let rows = sample_score_types(count);
        let mut faker = RecruitFaker::new(11);
        let details = rows
            .iter()
            .filter_map(|row| {
                let id = row.id()?.get();
                Some((id, faker.score_details(ScoreTypeId::new(id), &row.display("name"))))
            })
            .collect();
        let next_id = i64::try_from(count).unwrap_or(0) + 1;
        Self {
            score_types: RefCell::new(rows),
            details: RefCell::new(details),
            next_id: Cell::new(next_id),
            fail_writes: Cell::new(false),
            fetches: Cell::new(0),
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }

    pub fn score_type(&self, id: RowId) -> Option<Row> {
        self.score_types
            .borrow()
            .iter()
            .find(|row| row.id() == Some(id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.score_types.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.score_types.borrow().is_empty()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.get() {
            bail!("server rejected the request (503): backend is read-only");
        }
        Ok(())
    }

    fn ensure_unique_name(&self, name: &str, except: Option<RowId>) -> Result<()> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            bail!("server rejected the request (400): name is required");
        }
        let taken = self.score_types.borrow().iter().any(|row| {
            row.id() != except && row.display("name").trim().to_lowercase() == wanted
        });
        if taken {
            bail!("conflict: a score type named {name:?} already exists");
        }
        Ok(())
    }

    pub fn set_active(&self, id: RowId, active: bool) -> Result<()> {
        self.check_writable()?;
        let mut rows = self.score_types.borrow_mut();
        let row = rows
            .iter_mut()
            .find(|row| row.id() == Some(id))
            .ok_or_else(|| anyhow!("score type {id} not found"))?;
        row.set("active", Value::Bool(active));
        Ok(())
    }

    pub fn create(&self, draft: &Row) -> Result<Row> {
        self.check_writable()?;
        self.ensure_unique_name(&draft.display("name"), None)?;
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let mut row = draft.clone().with("id", id);
        if row.get("active").is_none() {
            row.set("active", Value::Bool(true));
        }
        if row.get("createdOn").is_none() {
            row.set("createdOn", Value::String(format_date(reference_date())));
        }
        self.details.borrow_mut().insert(
            id,
            ScoreDetailsForm {
                score_type_id: ScoreTypeId::new(id),
                name: row.display("name"),
                rules: Vec::new(),
            },
        );
        self.score_types.borrow_mut().push(row.clone());
        Ok(row)
    }

    pub fn update(&self, id: RowId, patch: &Row) -> Result<Row> {
        self.check_writable()?;
        if patch.get("name").is_some() {
            self.ensure_unique_name(&patch.display("name"), Some(id))?;
        }
        let mut rows = self.score_types.borrow_mut();
        let row = rows
            .iter_mut()
            .find(|row| row.id() == Some(id))
            .ok_or_else(|| anyhow!("score type {id} not found"))?;
        row.merge(patch);
        row.set("id", Value::from(id.get()));
        Ok(row.clone())
    }

    pub fn delete(&self, id: RowId) -> Result<()> {
        self.check_writable()?;
        let mut rows = self.score_types.borrow_mut();
        let before = rows.len();
        rows.retain(|row| row.id() != Some(id));
        if rows.len() == before {
            bail!("score type {id} not found");
        }
        self.details.borrow_mut().remove(&id.get());
        Ok(())
    }

    pub fn score_details(&self, id: ScoreTypeId) -> Result<ScoreDetailsForm> {
        self.details
            .borrow()
            .get(&id.get())
            .cloned()
            .ok_or_else(|| anyhow!("score type {id} not found"))
    }

    pub fn save_score_details(&self, form: &ScoreDetailsForm) -> Result<ScoreDetailsForm> {
        self.check_writable()?;
        form.validate()
            .map_err(|failure| anyhow!("server rejected the request (400): {failure}"))?;
        let mut saved = form.clone();
        let mut next_rule = saved.score_type_id.get() * 100 + 50;
        for rule in &mut saved.rules {
            if rule.id.is_none() {
                next_rule += 1;
                rule.id = Some(ScoreRuleId::new(next_rule));
            }
        }
        self.details
            .borrow_mut()
            .insert(saved.score_type_id.get(), saved.clone());
        Ok(saved)
    }
}

impl RowSource for DemoBackend {
    fn fetch_rows(&self, query: &PageQuery) -> Result<PagedEnvelope<Row>> {
        self.fetches.set(self.fetches.get() + 1);
        let needle = query.search.as_deref().map(str::to_lowercase);
        let mut rows: Vec<Row> = self
            .score_types
            .borrow()
            .iter()
            .filter(|row| {
                needle
                    .as_deref()
                    .is_none_or(|needle| row.display("name").to_lowercase().contains(needle))
            })
            .cloned()
            .collect();
        if let Some(sort_fields) = &query.sort_fields {
            let keys = parse_sort_fields(sort_fields)?;
            rows.sort_by(|left, right| compare_rows(left, right, &keys));
        }

        let mut counts = BTreeMap::new();
        for row in &rows {
            let key = if row.bool_field("active").unwrap_or(false) {
                "active"
            } else {
                "inactive"
            };
            *counts.entry(key.to_owned()).or_insert(0) += 1;
        }

        let page_size = usize::try_from(query.page_size.max(1)).unwrap_or(usize::MAX);
        let page = usize::try_from(query.page.max(1)).unwrap_or(1);
        let total = rows.len();
        let total_pages = total.div_ceil(page_size).max(1);
        let items = rows
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();
        Ok(PagedEnvelope {
            items,
            page: query.page.max(1),
            page_size: query.page_size,
            total_items: total as u64,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
            has_next_page: page < total_pages,
            has_previous_page: page > 1,
            status_group_count: Some(counts),
            group_counts: None,
        })
    }
}

fn parse_sort_fields(raw: &str) -> Result<Vec<(String, bool)>> {
    raw.split(',')
        .map(|part| {
            let mut pieces = part.split_whitespace();
            let field = pieces
                .next()
                .ok_or_else(|| anyhow!("empty sort field in {raw:?}"))?;
            let descending = match pieces.next() {
                None | Some("asc") => false,
                Some("desc") => true,
                Some(other) => bail!("unknown sort direction {other:?} in {raw:?}"),
            };
            Ok((field.to_owned(), descending))
        })
        .collect()
}

fn compare_rows(left: &Row, right: &Row, keys: &[(String, bool)]) -> Ordering {
    for (field, descending) in keys {
        let ordering = match (left.get(field), right.get(field)) {
            (Some(Value::Number(a)), Some(Value::Number(b))) => a
                .as_f64()
                .unwrap_or_default()
                .total_cmp(&b.as_f64().unwrap_or_default()),
            _ => left
                .display(field)
                .to_lowercase()
                .cmp(&right.display(field).to_lowercase()),
        };
        let ordering = if *descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
