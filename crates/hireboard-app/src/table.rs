// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::Value;
use std::collections::BTreeSet;

use crate::ids::RowId;
use crate::model::{
    Bounds, ColumnDescriptor, ColumnKind, Row, ScrollContainer, SortDirection, SortState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCheckbox {
    Unchecked,
    Indeterminate,
    Checked,
}

/// Identifies the checkbox a toggle came from so the page can correct it
/// once the backend answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckboxRef {
    pub row: usize,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropdownOverlay {
    pub row: usize,
    pub field: String,
    pub top: i32,
    pub left: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineTarget {
    Create,
    Edit(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineEdit {
    pub target: InlineTarget,
    pub draft: Row,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToggle {
    pub checkbox: CheckboxRef,
    pub desired: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableCommand {
    SetRows { rows: Vec<Row>, reset_key: u64 },
    AppendRows(Vec<Row>),
    SetClickedIds(Vec<RowId>),
    SetSort(SortState),
    ToggleRow(usize),
    SelectAll(bool),
    ClickRow(usize),
    ClickColumn(String),
    ClickEdit(usize),
    ToggleDropdown {
        row: usize,
        field: String,
        trigger: Bounds,
        container: ScrollContainer,
    },
    OutsideClick,
    ChooseOption(String),
    BeginCreate(Row),
    BeginEdit { row: usize, draft: Row },
    UpdateDraft { field: String, value: Value },
    CancelInline,
    SaveInline,
    RequestToggle { row: usize, field: String, desired: bool },
    ConfirmToggle,
    CancelToggle,
    SetCell { row: usize, field: String, value: Value },
    MergeRow { row: usize, patch: Row },
    InsertRow { index: usize, row: Row },
    RemoveRow(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    RowsReset,
    SelectionChanged(Vec<Row>),
    RowClicked(Row),
    ColumnClicked(SortState),
    EditClicked { index: usize, row: Row },
    DropdownOpened { row: usize, field: String },
    DropdownClosed,
    OptionChosen { row: usize, field: String, value: String },
    InlineStarted(InlineTarget),
    InlineRejected,
    InlineCancelled,
    InlineSaved { target: InlineTarget, payload: Row },
    ToggleConfirmationRequested {
        row: Row,
        checkbox: CheckboxRef,
        desired: bool,
    },
    ToggleChanged {
        row: Row,
        checkbox: CheckboxRef,
        desired: bool,
    },
    RowRemoved { index: usize, row: Row },
}

/// View state for one generic table. Rows and columns come from the owning
/// page; selection, overlay, inline edit and toggle confirmation are local.
#[derive(Debug, Clone, PartialEq)]
pub struct TableState {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
    reset_key: u64,
    selected: BTreeSet<usize>,
    sort: SortState,
    clicked_ids: BTreeSet<RowId>,
    overlay: Option<DropdownOverlay>,
    inline: Option<InlineEdit>,
    pending_toggle: Option<PendingToggle>,
}

impl TableState {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            reset_key: 0,
            selected: BTreeSet::new(),
            sort: SortState::default(),
            clicked_ids: BTreeSet::new(),
            overlay: None,
            inline: None,
            pending_toggle: None,
        }
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column(&self, field: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|column| column.field == field)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub const fn reset_key(&self) -> u64 {
        self.reset_key
    }

    pub fn selected_indices(&self) -> Vec<usize> {
        self.selected.iter().copied().collect()
    }

    pub fn selected_rows(&self) -> Vec<Row> {
        self.selected
            .iter()
            .filter_map(|index| self.rows.get(*index).cloned())
            .collect()
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    pub fn is_all_selected(&self) -> bool {
        self.selected.len() == self.rows.len()
    }

    pub fn header_checkbox(&self) -> HeaderCheckbox {
        let selected = self.selected.len();
        if selected == 0 {
            HeaderCheckbox::Unchecked
        } else if selected < self.rows.len() {
            HeaderCheckbox::Indeterminate
        } else {
            HeaderCheckbox::Checked
        }
    }

    pub fn sort(&self) -> &SortState {
        &self.sort
    }

    pub fn direction_for(&self, field: &str) -> Option<SortDirection> {
        self.sort.direction_for(field)
    }

    pub fn clicked_ids(&self) -> Vec<RowId> {
        self.clicked_ids.iter().copied().collect()
    }

    pub fn is_clicked(&self, index: usize) -> bool {
        self.rows
            .get(index)
            .and_then(Row::id)
            .is_some_and(|id| self.clicked_ids.contains(&id))
    }

    pub fn overlay(&self) -> Option<&DropdownOverlay> {
        self.overlay.as_ref()
    }

    pub fn inline(&self) -> Option<&InlineEdit> {
        self.inline.as_ref()
    }

    pub fn pending_toggle(&self) -> Option<&PendingToggle> {
        self.pending_toggle.as_ref()
    }

    pub fn dispatch(&mut self, command: TableCommand) -> Vec<TableEvent> {
        match command {
            TableCommand::SetRows { rows, reset_key } => self.set_rows(rows, reset_key),
            TableCommand::AppendRows(rows) => {
                self.rows.extend(rows);
                Vec::new()
            }
            TableCommand::SetClickedIds(ids) => {
                self.clicked_ids = ids.into_iter().collect();
                Vec::new()
            }
            TableCommand::SetSort(sort) => {
                self.sort = sort.normalized();
                Vec::new()
            }
            TableCommand::ToggleRow(index) => {
                if index >= self.rows.len() {
                    return Vec::new();
                }
                if !self.selected.remove(&index) {
                    self.selected.insert(index);
                }
                vec![self.selection_changed()]
            }
            TableCommand::SelectAll(checked) => {
                if checked {
                    self.selected = (0..self.rows.len()).collect();
                } else {
                    self.selected.clear();
                }
                vec![self.selection_changed()]
            }
            TableCommand::ClickRow(index) => {
                let Some(row) = self.rows.get(index).cloned() else {
                    return Vec::new();
                };
                if let Some(id) = row.id() {
                    self.clicked_ids.insert(id);
                }
                vec![TableEvent::RowClicked(row)]
            }
            TableCommand::ClickColumn(field) => self.click_column(&field),
            TableCommand::ClickEdit(index) => match self.rows.get(index) {
                Some(row) => vec![TableEvent::EditClicked {
                    index,
                    row: row.clone(),
                }],
                None => Vec::new(),
            },
            TableCommand::ToggleDropdown {
                row,
                field,
                trigger,
                container,
            } => self.toggle_dropdown(row, field, trigger, container),
            TableCommand::OutsideClick => self.close_overlay(),
            TableCommand::ChooseOption(value) => {
                let Some(field) = self.overlay.as_ref().map(|overlay| overlay.field.clone()) else {
                    return Vec::new();
                };
                let known = self.column(&field).is_some_and(|column| {
                    column.options.iter().any(|option| option.value == value)
                });
                if !known {
                    log::debug!("ignoring option {value:?} not offered by column {field}");
                    return Vec::new();
                }
                let Some(overlay) = self.overlay.take() else {
                    return Vec::new();
                };
                let Some(row) = self.rows.get_mut(overlay.row) else {
                    return vec![TableEvent::DropdownClosed];
                };
                row.set(&overlay.field, Value::String(value.clone()));
                vec![TableEvent::OptionChosen {
                    row: overlay.row,
                    field: overlay.field,
                    value,
                }]
            }
            TableCommand::BeginCreate(draft) => self.begin_inline(InlineTarget::Create, draft),
            TableCommand::BeginEdit { row, draft } => {
                if row >= self.rows.len() {
                    return Vec::new();
                }
                self.begin_inline(InlineTarget::Edit(row), draft)
            }
            TableCommand::UpdateDraft { field, value } => {
                if let Some(inline) = self.inline.as_mut() {
                    inline.draft.set(&field, value);
                }
                Vec::new()
            }
            TableCommand::CancelInline => match self.inline.take() {
                Some(_) => vec![TableEvent::InlineCancelled],
                None => Vec::new(),
            },
            TableCommand::SaveInline => match self.inline.take() {
                Some(inline) => vec![TableEvent::InlineSaved {
                    target: inline.target,
                    payload: inline.draft,
                }],
                None => Vec::new(),
            },
            TableCommand::RequestToggle {
                row,
                field,
                desired,
            } => self.request_toggle(row, field, desired),
            TableCommand::ConfirmToggle => {
                let Some(pending) = self.pending_toggle.take() else {
                    return Vec::new();
                };
                match self.rows.get(pending.checkbox.row) {
                    Some(row) => vec![TableEvent::ToggleChanged {
                        row: row.clone(),
                        checkbox: pending.checkbox,
                        desired: pending.desired,
                    }],
                    None => Vec::new(),
                }
            }
            TableCommand::CancelToggle => {
                self.pending_toggle = None;
                Vec::new()
            }
            TableCommand::SetCell { row, field, value } => {
                if let Some(target) = self.rows.get_mut(row) {
                    target.set(&field, value);
                }
                Vec::new()
            }
            TableCommand::MergeRow { row, patch } => {
                if let Some(target) = self.rows.get_mut(row) {
                    target.merge(&patch);
                }
                Vec::new()
            }
            TableCommand::InsertRow { index, row } => self.insert_row(index, row),
            TableCommand::RemoveRow(index) => self.remove_row(index),
        }
    }

    fn selection_changed(&self) -> TableEvent {
        TableEvent::SelectionChanged(self.selected_rows())
    }

    fn set_rows(&mut self, rows: Vec<Row>, reset_key: u64) -> Vec<TableEvent> {
        self.rows = rows;
        if reset_key != self.reset_key {
            self.reset_key = reset_key;
            let had_selection = !self.selected.is_empty();
            self.selected.clear();
            self.sort.clear();
            self.overlay = None;
            self.inline = None;
            self.pending_toggle = None;
            let mut events = vec![TableEvent::RowsReset];
            if had_selection {
                events.push(self.selection_changed());
            }
            return events;
        }

        let row_count = self.rows.len();
        let before = self.selected.len();
        self.selected.retain(|index| *index < row_count);
        if self
            .overlay
            .as_ref()
            .is_some_and(|overlay| overlay.row >= row_count)
        {
            self.overlay = None;
        }
        if let Some(InlineEdit {
            target: InlineTarget::Edit(index),
            ..
        }) = &self.inline
            && *index >= row_count
        {
            self.inline = None;
        }
        if self.selected.len() != before {
            vec![self.selection_changed()]
        } else {
            Vec::new()
        }
    }

    fn click_column(&mut self, field: &str) -> Vec<TableEvent> {
        let sortable = self
            .column(field)
            .is_some_and(|column| column.sortable);
        if !sortable {
            return Vec::new();
        }
        self.sort.cycle(field);
        vec![TableEvent::ColumnClicked(self.sort.clone())]
    }

    fn toggle_dropdown(
        &mut self,
        row: usize,
        field: String,
        trigger: Bounds,
        container: ScrollContainer,
    ) -> Vec<TableEvent> {
        if self
            .overlay
            .as_ref()
            .is_some_and(|overlay| overlay.row == row && overlay.field == field)
        {
            return self.close_overlay();
        }
        if row >= self.rows.len() || self.column(&field).is_none() {
            return Vec::new();
        }

        let top = trigger.bottom() - container.bounds.y + container.scroll_top;
        let left = trigger.x - container.bounds.x + container.scroll_left;
        self.overlay = Some(DropdownOverlay {
            row,
            field: field.clone(),
            top,
            left,
        });
        vec![TableEvent::DropdownOpened { row, field }]
    }

    fn close_overlay(&mut self) -> Vec<TableEvent> {
        match self.overlay.take() {
            Some(_) => vec![TableEvent::DropdownClosed],
            None => Vec::new(),
        }
    }

    fn begin_inline(&mut self, target: InlineTarget, draft: Row) -> Vec<TableEvent> {
        if self.inline.is_some() {
            log::debug!("inline edit already open; ignoring {target:?}");
            return vec![TableEvent::InlineRejected];
        }
        self.inline = Some(InlineEdit { target, draft });
        vec![TableEvent::InlineStarted(target)]
    }

    fn request_toggle(&mut self, row: usize, field: String, desired: bool) -> Vec<TableEvent> {
        let is_toggle = self
            .column(&field)
            .is_some_and(|column| column.kind == ColumnKind::Toggle);
        let Some(target) = self.rows.get(row) else {
            return Vec::new();
        };
        if !is_toggle {
            return Vec::new();
        }

        let checkbox = CheckboxRef { row, field };
        self.pending_toggle = Some(PendingToggle {
            checkbox: checkbox.clone(),
            desired,
        });
        vec![TableEvent::ToggleConfirmationRequested {
            row: target.clone(),
            checkbox,
            desired,
        }]
    }

    fn insert_row(&mut self, index: usize, row: Row) -> Vec<TableEvent> {
        let index = index.min(self.rows.len());
        self.rows.insert(index, row);
        self.selected = self
            .selected
            .iter()
            .map(|selected| if *selected >= index { selected + 1 } else { *selected })
            .collect();
        if let Some(InlineEdit {
            target: InlineTarget::Edit(editing),
            ..
        }) = self.inline.as_mut()
            && *editing >= index
        {
            *editing += 1;
        }
        self.overlay = None;
        self.pending_toggle = None;
        Vec::new()
    }

    fn remove_row(&mut self, index: usize) -> Vec<TableEvent> {
        if index >= self.rows.len() {
            return Vec::new();
        }
        let row = self.rows.remove(index);
        let was_selected = self.selected.remove(&index);
        self.selected = self
            .selected
            .iter()
            .map(|selected| if *selected > index { selected - 1 } else { *selected })
            .collect();

        let mut editing_removed = false;
        if let Some(InlineEdit {
            target: InlineTarget::Edit(editing),
            ..
        }) = self.inline.as_mut()
        {
            if *editing == index {
                editing_removed = true;
            } else if *editing > index {
                *editing -= 1;
            }
        }
        if editing_removed {
            self.inline = None;
        }
        self.overlay = None;
        self.pending_toggle = None;

        let mut events = vec![TableEvent::RowRemoved { index, row }];
        if was_selected {
            events.push(self.selection_changed());
        }
        events
    }
}
