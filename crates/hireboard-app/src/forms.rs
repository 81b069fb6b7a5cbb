// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::draft::{DraftKey, SnapshotRules};
use crate::ids::{ProcessId, ReasonCategoryId, ReasonId, ScoreRuleId, ScoreTypeId};
use crate::model::Row;

pub const SCORE_MIN: i64 = 0;
pub const SCORE_MAX: i64 = 100;

/// Client-side validation error. `rows` lists the offending row indices so
/// the page can highlight them; nothing is sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationFailure {
    pub message: String,
    pub rows: BTreeSet<usize>,
}

impl ValidationFailure {
    fn new(message: impl Into<String>, rows: impl IntoIterator<Item = usize>) -> Self {
        Self {
            message: message.into(),
            rows: rows.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRule {
    #[serde(default)]
    pub id: Option<ScoreRuleId>,
    pub label: String,
    pub min_score: i64,
    pub max_score: i64,
    #[serde(default)]
    pub points: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl ScoreRule {
    pub fn blank() -> Self {
        Self {
            id: None,
            label: String::new(),
            min_score: SCORE_MIN,
            max_score: SCORE_MIN,
            points: 0,
            active: true,
        }
    }

    pub fn to_row(&self) -> Result<Row> {
        let value = serde_json::to_value(self).context("encode score rule")?;
        Row::from_value(value).context("score rule did not encode as an object")
    }

    pub fn from_row(row: &Row) -> Result<Self> {
        serde_json::from_value(row.clone().into_value()).with_context(|| {
            format!(
                "row `{}` is not a valid score rule -- check the numeric fields",
                row.display("label")
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreDetailsForm {
    pub score_type_id: ScoreTypeId,
    pub name: String,
    pub rules: Vec<ScoreRule>,
}

impl ScoreDetailsForm {
    pub fn draft_key(&self) -> DraftKey {
        DraftKey::score_details(self.score_type_id)
    }

    /// Rule order carries no meaning; ranges are compared sorted.
    pub fn snapshot_rules() -> SnapshotRules {
        SnapshotRules::new().unordered("/rules", &["minScore", "maxScore", "label"])
    }

    pub fn validate(&self) -> Result<(), ValidationFailure> {
        if self.name.trim().is_empty() {
            return Err(ValidationFailure::new(
                "score type name is required -- enter a name and retry",
                [],
            ));
        }

        let missing: Vec<_> = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.label.trim().is_empty())
            .map(|(index, _)| index)
            .collect();
        if !missing.is_empty() {
            return Err(ValidationFailure::new(
                "every score rule needs a label",
                missing,
            ));
        }

        let duplicates = duplicate_indices(self.rules.iter().map(|rule| rule.label.as_str()));
        if !duplicates.is_empty() {
            return Err(ValidationFailure::new(
                "score rule labels must be unique",
                duplicates,
            ));
        }

        let out_of_range: Vec<_> = self
            .rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| {
                rule.min_score < SCORE_MIN
                    || rule.max_score > SCORE_MAX
                    || rule.min_score > rule.max_score
                    || rule.points < 0
            })
            .map(|(index, _)| index)
            .collect();
        if !out_of_range.is_empty() {
            return Err(ValidationFailure::new(
                format!(
                    "score ranges must satisfy {SCORE_MIN} <= min <= max <= {SCORE_MAX} with non-negative points"
                ),
                out_of_range,
            ));
        }

        let mut by_min: Vec<_> = self.rules.iter().enumerate().collect();
        by_min.sort_by_key(|(_, rule)| (rule.min_score, rule.max_score));
        let overlapping: BTreeSet<usize> = by_min
            .windows(2)
            .filter(|pair| pair[1].1.min_score <= pair[0].1.max_score)
            .flat_map(|pair| [pair[0].0, pair[1].0])
            .collect();
        if !overlapping.is_empty() {
            return Err(ValidationFailure::new(
                "score ranges must not overlap",
                overlapping,
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reason {
    #[serde(default)]
    pub id: Option<ReasonId>,
    pub text: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonCategory {
    #[serde(default)]
    pub id: Option<ReasonCategoryId>,
    pub name: String,
    #[serde(default)]
    pub reasons: Vec<Reason>,
}

/// Categories with their reasons for one recruitment process. Display order
/// is significant, so snapshots compare positionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonDetailsForm {
    pub process_id: ProcessId,
    pub categories: Vec<ReasonCategory>,
}

impl ReasonDetailsForm {
    pub fn draft_key(&self) -> DraftKey {
        DraftKey::reason_details(self.process_id)
    }

    pub fn snapshot_rules() -> SnapshotRules {
        SnapshotRules::new()
    }

    /// Row indices in failures are category indices.
    pub fn validate(&self) -> Result<(), ValidationFailure> {
        let unnamed: Vec<_> = self
            .categories
            .iter()
            .enumerate()
            .filter(|(_, category)| category.name.trim().is_empty())
            .map(|(index, _)| index)
            .collect();
        if !unnamed.is_empty() {
            return Err(ValidationFailure::new("category name is required", unnamed));
        }

        let duplicates =
            duplicate_indices(self.categories.iter().map(|category| category.name.as_str()));
        if !duplicates.is_empty() {
            return Err(ValidationFailure::new(
                "category names must be unique",
                duplicates,
            ));
        }

        for (index, category) in self.categories.iter().enumerate() {
            if category
                .reasons
                .iter()
                .any(|reason| reason.text.trim().is_empty())
            {
                return Err(ValidationFailure::new(
                    format!("category `{}` has a reason without text", category.name),
                    [index],
                ));
            }
            if !duplicate_indices(category.reasons.iter().map(|reason| reason.text.as_str()))
                .is_empty()
            {
                return Err(ValidationFailure::new(
                    format!("category `{}` lists the same reason twice", category.name),
                    [index],
                ));
            }
        }
        Ok(())
    }
}

/// Indices of every entry whose trimmed, case-folded name appears more than
/// once.
pub fn duplicate_indices<'a>(names: impl Iterator<Item = &'a str>) -> BTreeSet<usize> {
    let mut seen: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (index, name) in names.enumerate() {
        seen.entry(name.trim().to_lowercase())
            .or_default()
            .push(index);
    }
    seen.into_values()
        .filter(|indices| indices.len() > 1)
        .flatten()
        .collect()
}
