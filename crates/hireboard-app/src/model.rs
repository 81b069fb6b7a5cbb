// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::ids::RowId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Number,
    Date,
    Toggle,
    Select,
    Icon,
    Link,
    Custom,
}

impl ColumnKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Toggle => "toggle",
            Self::Select => "select",
            Self::Icon => "icon",
            Self::Link => "link",
            Self::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "number" => Some(Self::Number),
            "date" => Some(Self::Date),
            "toggle" => Some(Self::Toggle),
            "select" => Some(Self::Select),
            "icon" => Some(Self::Icon),
            "link" => Some(Self::Link),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowAction {
    View,
    Edit,
    Delete,
    Duplicate,
}

impl RowAction {
    pub const fn label(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Duplicate => "duplicate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// Declarative description of one table column. Pages build these once and
/// never mutate them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub header: String,
    pub field: String,
    pub kind: ColumnKind,
    #[serde(default)]
    pub align: Option<Align>,
    #[serde(default)]
    pub width: Option<u16>,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub row_actions: Vec<RowAction>,
    #[serde(default)]
    pub options: Vec<SelectOption>,
}

impl ColumnDescriptor {
    pub fn new(header: &str, field: &str, kind: ColumnKind) -> Self {
        Self {
            header: header.to_owned(),
            field: field.to_owned(),
            kind,
            align: None,
            width: None,
            sortable: false,
            row_actions: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = Some(align);
        self
    }

    pub fn width(mut self, width: u16) -> Self {
        self.width = Some(width);
        self
    }

    pub fn actions(mut self, actions: &[RowAction]) -> Self {
        self.row_actions = actions.to_vec();
        self
    }

    pub fn options(mut self, options: &[(&str, &str)]) -> Self {
        self.options = options
            .iter()
            .map(|(value, label)| SelectOption {
                value: (*value).to_owned(),
                label: (*label).to_owned(),
            })
            .collect();
        self
    }

    pub fn effective_align(&self) -> Align {
        self.align.unwrap_or(match self.kind {
            ColumnKind::Number => Align::Right,
            ColumnKind::Toggle | ColumnKind::Icon => Align::Center,
            _ => Align::Left,
        })
    }
}

/// Untyped record; the table only looks at fields its columns name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Map<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_owned(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.0.insert(field.to_owned(), value);
    }

    pub fn id(&self) -> Option<RowId> {
        self.0.get("id").and_then(Value::as_i64).map(RowId::new)
    }

    pub fn bool_field(&self, field: &str) -> Option<bool> {
        self.0.get(field).and_then(Value::as_bool)
    }

    /// Copies every field of `patch` over this row.
    pub fn merge(&mut self, patch: &Row) {
        for (key, value) in &patch.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn display(&self, field: &str) -> String {
        match self.0.get(field) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(Value::Bool(true)) => "yes".to_owned(),
            Some(Value::Bool(false)) => "no".to_owned(),
            Some(other) => other.to_string(),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Per-field sort directions plus the order in which fields were clicked.
/// A field is in `order` exactly when it has a direction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortState {
    pub directions: BTreeMap<String, SortDirection>,
    pub order: Vec<String>,
}

impl SortState {
    pub fn direction_for(&self, field: &str) -> Option<SortDirection> {
        self.directions.get(field).copied()
    }

    /// Advances `field` through unset, asc, desc and back to unset.
    pub fn cycle(&mut self, field: &str) -> Option<SortDirection> {
        match self.directions.get(field).copied() {
            None => {
                self.directions.insert(field.to_owned(), SortDirection::Asc);
                self.order.push(field.to_owned());
                Some(SortDirection::Asc)
            }
            Some(SortDirection::Asc) => {
                self.directions.insert(field.to_owned(), SortDirection::Desc);
                Some(SortDirection::Desc)
            }
            Some(SortDirection::Desc) => {
                self.directions.remove(field);
                self.order.retain(|entry| entry != field);
                None
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.directions.clear();
        self.order.clear();
    }

    /// Drops entries where `directions` and `order` disagree, keeping click
    /// order for the survivors.
    pub fn normalized(mut self) -> Self {
        let directions = &self.directions;
        let mut seen = Vec::with_capacity(self.order.len());
        for field in self.order {
            if directions.contains_key(&field) && !seen.contains(&field) {
                seen.push(field);
            }
        }
        self.directions.retain(|field, _| seen.contains(field));
        self.order = seen;
        self
    }

    /// `SortFields` query value, e.g. `score asc,name desc`.
    pub fn sort_fields(&self) -> Option<String> {
        if self.order.is_empty() {
            return None;
        }
        let parts = self
            .order
            .iter()
            .filter_map(|field| {
                self.directions
                    .get(field)
                    .map(|direction| format!("{field} {}", direction.as_str()))
            })
            .collect::<Vec<_>>();
        Some(parts.join(","))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn bottom(self) -> i32 {
        self.y + self.height
    }

    pub const fn right(self) -> i32 {
        self.x + self.width
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollContainer {
    pub bounds: Bounds,
    pub scroll_left: i32,
    pub scroll_top: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedEnvelope<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_group_count: Option<BTreeMap<String, u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_counts: Option<BTreeMap<String, u64>>,
}

impl<T> PagedEnvelope<T> {
    /// Wraps a bare array response as one complete page.
    pub fn single_page(items: Vec<T>) -> Self {
        let total = items.len();
        Self {
            page: 1,
            page_size: u32::try_from(total).unwrap_or(u32::MAX),
            total_items: total as u64,
            total_pages: 1,
            has_next_page: false,
            has_previous_page: false,
            status_group_count: None,
            group_counts: None,
            items,
        }
    }
}
