// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod input;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use hireboard_app::{
    Align, Bounds, ChangeNotifier, CheckboxRef, ColumnDescriptor, ColumnKind, DraftEditor,
    DropdownOverlay, GuardCheck, HeaderCheckbox, InlineEdit, InlineTarget, KeyValueStore,
    LeaveChoice, LeaveGuard, LeavePrompt, ListConfig, PageQuery, PagedEnvelope,
    PagedListController, RequestTicket, Row, RowAction, RowId, ScoreDetailsForm, ScoreRule,
    ScoreTypeId, ScrollContainer, SortDirection, SortState, StateChanged, TableCommand,
    TableEvent, TableState,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Text;
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row as UiRow, Table, Tabs};
use serde_json::Value;
use std::collections::BTreeSet;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::{Month, OffsetDateTime};

pub use input::{DATE_LAYOUT, InputError};

pub const SCORE_TYPE_SETTINGS_KEY: &str = "scoreTypeSettings";

const DEFAULT_COLUMN_WIDTH: u16 = 10;
const SELECT_COLUMN_WIDTH: u16 = 3;
const SORT_ASC_MARK: &str = "▲";
const SORT_DESC_MARK: &str = "▼";
const CATEGORY_OPTIONS: [(&str, &str); 3] = [
    ("technical", "Technical"),
    ("behavioral", "Behavioral"),
    ("cultural", "Cultural"),
];
const LIST_HINTS: &str = "enter open/toggle  e edit  n new  d delete  s sort  / search  < > period  P all periods  space select  q quit";
const DETAILS_HINTS: &str =
    "enter edit cell  n add rule  d remove rule  r rename  S save  x discard  tab back  q quit";

/// Backend operations the pages need. Implemented over the HTTP client and
/// over the in-memory demo backend.
pub trait AppRuntime {
    fn load_score_types(&mut self, query: &PageQuery) -> Result<PagedEnvelope<Row>>;
    fn set_score_type_active(&mut self, id: RowId, active: bool) -> Result<()>;
    fn create_score_type(&mut self, draft: &Row) -> Result<Row>;
    fn update_score_type(&mut self, id: RowId, patch: &Row) -> Result<Row>;
    fn delete_score_type(&mut self, id: RowId) -> Result<()>;
    fn load_score_details(&mut self, id: ScoreTypeId) -> Result<ScoreDetailsForm>;
    fn save_score_details(&mut self, form: &ScoreDetailsForm) -> Result<ScoreDetailsForm>;
}

pub fn score_type_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("Name", "name", ColumnKind::Text)
            .sortable()
            .width(22),
        ColumnDescriptor::new("Category", "category", ColumnKind::Select)
            .options(&CATEGORY_OPTIONS)
            .width(12),
        ColumnDescriptor::new("Weight", "weight", ColumnKind::Number)
            .sortable()
            .width(8),
        ColumnDescriptor::new("Created", "createdOn", ColumnKind::Date)
            .sortable()
            .width(12),
        ColumnDescriptor::new("Active", "active", ColumnKind::Toggle).width(8),
        ColumnDescriptor::new("", "actions", ColumnKind::Custom)
            .actions(&[RowAction::Edit, RowAction::Delete])
            .width(12),
    ]
}

pub fn score_rule_columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("Label", "label", ColumnKind::Text).width(18),
        ColumnDescriptor::new("Min", "minScore", ColumnKind::Number).width(6),
        ColumnDescriptor::new("Max", "maxScore", ColumnKind::Number).width(6),
        ColumnDescriptor::new("Points", "points", ColumnKind::Number).width(8),
        ColumnDescriptor::new("Active", "active", ColumnKind::Toggle).width(8),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    ScoreTypes,
    ScoreDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavTarget {
    ScoreTypes,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InputPurpose {
    Search,
    Cell { field: String },
    FormName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TextInput {
    purpose: InputPurpose,
    buffer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Cursor {
    row: usize,
    col: usize,
}

struct ScoreTypePage {
    table: TableState,
    list: PagedListController,
    cursor: Cursor,
    input: Option<TextInput>,
    dropdown_cursor: usize,
    pending_delete: Option<usize>,
}

impl ScoreTypePage {
    fn new(page_size: u32) -> Self {
        Self {
            table: TableState::new(score_type_columns()),
            list: PagedListController::new(
                ListConfig::new(SCORE_TYPE_SETTINGS_KEY).page_size(page_size),
            ),
            cursor: Cursor::default(),
            input: None,
            dropdown_cursor: 0,
            pending_delete: None,
        }
    }
}

struct ScoreDetailsPage<'a> {
    editor: DraftEditor<'a, ScoreDetailsForm>,
    table: TableState,
    cursor: Cursor,
    input: Option<TextInput>,
    invalid_rows: BTreeSet<usize>,
}

impl<'a> ScoreDetailsPage<'a> {
    fn open(store: &'a dyn KeyValueStore, form: ScoreDetailsForm) -> Result<Self> {
        let editor = DraftEditor::open(store, form)?;
        let mut page = Self {
            editor,
            table: TableState::new(score_rule_columns()),
            cursor: Cursor::default(),
            input: None,
            invalid_rows: BTreeSet::new(),
        };
        page.sync_rows(true)?;
        Ok(page)
    }

    /// Rebuilds the rule rows from the form. Without `reset` the table keeps
    /// its selection and overlay state.
    fn sync_rows(&mut self, reset: bool) -> Result<()> {
        let rows = self
            .editor
            .form()
            .rules
            .iter()
            .map(ScoreRule::to_row)
            .collect::<Result<Vec<_>>>()?;
        let reset_key = if reset {
            self.table.reset_key() + 1
        } else {
            self.table.reset_key()
        };
        self.table.dispatch(TableCommand::SetRows { rows, reset_key });
        self.cursor.row = step(self.cursor.row, 0, self.table.row_count());
        Ok(())
    }
}

struct PendingLeave {
    prompt: LeavePrompt,
    target: NavTarget,
}

/// Everything the terminal UI shows. Settings survive restarts through
/// `settings`; drafts go to `drafts`.
pub struct AppState<'a> {
    page: PageKind,
    score_types: ScoreTypePage,
    details: Option<ScoreDetailsPage<'a>>,
    guard: LeaveGuard,
    leave: Option<PendingLeave>,
    status: Option<String>,
    status_token: u64,
    notifier: ChangeNotifier,
    settings: &'a dyn KeyValueStore,
    drafts: &'a dyn KeyValueStore,
}

impl<'a> AppState<'a> {
    pub fn new(
        settings: &'a dyn KeyValueStore,
        drafts: &'a dyn KeyValueStore,
        page_size: u32,
    ) -> Self {
        Self {
            page: PageKind::ScoreTypes,
            score_types: ScoreTypePage::new(page_size),
            details: None,
            guard: LeaveGuard::new(),
            leave: None,
            status: None,
            status_token: 0,
            notifier: ChangeNotifier::new(),
            settings,
            drafts,
        }
    }

    pub const fn page(&self) -> PageKind {
        self.page
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn score_type_rows(&self) -> &[Row] {
        self.score_types.table.rows()
    }

    pub fn details_form(&self) -> Option<&ScoreDetailsForm> {
        self.details.as_ref().map(|details| details.editor.form())
    }

    pub fn subscribe(&mut self) -> Receiver<StateChanged> {
        self.notifier.subscribe()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
}

pub fn run_app<R: AppRuntime>(state: &mut AppState<'_>, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let changes = state.subscribe();
    let (internal_tx, internal_rx) = mpsc::channel();
    initialize(state, runtime, &internal_tx);

    let mut dirty = true;
    let mut result = Ok(());
    loop {
        dirty |= process_internal_events(state, &internal_rx);
        dirty |= changes.try_iter().count() > 0;

        if dirty {
            if let Err(error) = terminal.draw(|frame| render(frame, state)) {
                result = Err(error).context("draw frame");
                break;
            }
            dirty = false;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &internal_tx, key) {
                        break;
                    }
                    dirty = true;
                }
                Event::Resize(_, _) => dirty = true,
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn initialize<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    tx: &Sender<InternalEvent>,
) {
    match state.score_types.list.restore(state.settings) {
        Ok(clicked) => {
            state
                .score_types
                .table
                .dispatch(TableCommand::SetClickedIds(clicked));
        }
        Err(error) => emit_status(state, tx, format!("list settings unavailable: {error:#}")),
    }
    reload_score_types(state, runtime, tx);
}

fn process_internal_events(state: &mut AppState<'_>, rx: &Receiver<InternalEvent>) -> bool {
    let mut changed = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == state.status_token => {
                state.status = None;
                changed = true;
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
    changed
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState<'_>,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.status = Some(message.into());
    state.status_token = state.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, state.status_token);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if state.leave.is_some() {
        return handle_leave_key(state, internal_tx, key);
    }

    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return request_navigation(state, internal_tx, NavTarget::Quit);
    }

    match state.page {
        PageKind::ScoreTypes => handle_score_types_key(state, runtime, internal_tx, key),
        PageKind::ScoreDetails => handle_details_key(state, runtime, internal_tx, key),
    }
}

fn step(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    current.saturating_add_signed(delta).min(len - 1)
}

fn request_navigation(
    state: &mut AppState<'_>,
    internal_tx: &Sender<InternalEvent>,
    target: NavTarget,
) -> bool {
    let check = match (&state.page, &state.details) {
        (PageKind::ScoreDetails, Some(details)) => state.guard.attempt(&details.editor),
        _ => GuardCheck::Allow,
    };
    match check {
        GuardCheck::Allow => complete_navigation(state, target),
        GuardCheck::Blocked => {
            emit_status(state, internal_tx, "answer the open dialog first");
            false
        }
        GuardCheck::AskUser(prompt) => {
            state.leave = Some(PendingLeave { prompt, target });
            state.notifier.publish(StateChanged::Guard);
            false
        }
    }
}

fn complete_navigation(state: &mut AppState<'_>, target: NavTarget) -> bool {
    match target {
        NavTarget::Quit => true,
        NavTarget::ScoreTypes => {
            state.details = None;
            state.page = PageKind::ScoreTypes;
            state.notifier.publish(StateChanged::Guard);
            false
        }
    }
}

const fn choice_key(choice: LeaveChoice) -> char {
    match choice {
        LeaveChoice::Stay => 's',
        LeaveChoice::Keep => 'k',
        LeaveChoice::Discard => 'd',
    }
}

fn handle_leave_key(
    state: &mut AppState<'_>,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    let Some(pending) = state.leave.as_ref() else {
        return false;
    };
    let choice = match key.code {
        KeyCode::Esc => LeaveChoice::Stay,
        KeyCode::Char(ch) => match pending
            .prompt
            .choices
            .iter()
            .copied()
            .find(|choice| choice_key(*choice) == ch)
        {
            Some(choice) => choice,
            None => return false,
        },
        _ => return false,
    };
    let Some(pending) = state.leave.take() else {
        return false;
    };

    let resolved = match state.details.as_mut() {
        Some(details) => state.guard.resolve(&mut details.editor, choice),
        None => {
            state.guard.cancel();
            Ok(true)
        }
    };
    match resolved {
        Ok(true) => {
            if choice == LeaveChoice::Discard {
                emit_status(state, internal_tx, "draft discarded");
            }
            complete_navigation(state, pending.target)
        }
        Ok(false) => {
            state.notifier.publish(StateChanged::Guard);
            false
        }
        Err(error) => {
            emit_status(state, internal_tx, format!("cannot leave: {error:#}"));
            false
        }
    }
}

fn dispatch_list<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
    command: TableCommand,
) {
    let events = state.score_types.table.dispatch(command);
    state.notifier.publish(StateChanged::Table);
    for event in events {
        handle_list_event(state, runtime, internal_tx, event);
    }
}

fn reload_score_types<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
) {
    let ticket = state.score_types.list.request_first_page();
    fetch_score_types(state, runtime, internal_tx, ticket);
}

fn load_next_page<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
) {
    if let Some(ticket) = state.score_types.list.request_next_page() {
        fetch_score_types(state, runtime, internal_tx, ticket);
    }
}

fn fetch_score_types<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
    ticket: RequestTicket,
) {
    let query = state.score_types.list.query(ticket);
    let command = match runtime.load_score_types(&query) {
        Ok(envelope) => state.score_types.list.accept(ticket, envelope),
        Err(error) => {
            state.score_types.list.fail(ticket, &error);
            emit_status(state, internal_tx, format!("load failed: {error:#}"));
            None
        }
    };
    state.notifier.publish(StateChanged::List);

    let Some(command) = command else {
        return;
    };
    let replaced = matches!(command, TableCommand::SetRows { .. });
    dispatch_list(state, runtime, internal_tx, command);
    if replaced {
        let sort = state.score_types.list.filter().sort.clone();
        state
            .score_types
            .table
            .dispatch(TableCommand::SetSort(sort));
    }
}

fn persist_list_settings(state: &mut AppState<'_>, internal_tx: &Sender<InternalEvent>) {
    let clicked = state.score_types.table.clicked_ids();
    if let Err(error) = state.score_types.list.persist(state.settings, &clicked) {
        log::warn!("saving list settings failed: {error:#}");
        emit_status(state, internal_tx, format!("settings not saved: {error:#}"));
    }
}

fn handle_list_event<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
    event: TableEvent,
) {
    match event {
        TableEvent::RowsReset => {
            state.score_types.cursor.row = 0;
            state.score_types.input = None;
            state.score_types.pending_delete = None;
        }
        TableEvent::SelectionChanged(rows) => {
            emit_status(state, internal_tx, format!("{} selected", rows.len()));
        }
        TableEvent::RowClicked(row) => {
            persist_list_settings(state, internal_tx);
            if let Some(id) = row.id() {
                open_details(state, runtime, internal_tx, id);
            }
        }
        TableEvent::ColumnClicked(sort) => {
            if state.score_types.list.apply_sort(sort) {
                persist_list_settings(state, internal_tx);
                reload_score_types(state, runtime, internal_tx);
            }
        }
        TableEvent::EditClicked { index, row } => {
            dispatch_list(
                state,
                runtime,
                internal_tx,
                TableCommand::BeginEdit {
                    row: index,
                    draft: row,
                },
            );
        }
        TableEvent::DropdownOpened { row, field } => {
            let page = &mut state.score_types;
            let current = page
                .table
                .rows()
                .get(row)
                .map(|row| row.display(&field))
                .unwrap_or_default();
            page.dropdown_cursor = page
                .table
                .column(&field)
                .and_then(|column| {
                    column
                        .options
                        .iter()
                        .position(|option| option.value == current)
                })
                .unwrap_or(0);
        }
        TableEvent::DropdownClosed => {}
        TableEvent::OptionChosen { row, field, value } => {
            save_option(state, runtime, internal_tx, row, &field, value);
        }
        TableEvent::InlineStarted(_) => open_inline_input(&mut state.score_types),
        TableEvent::InlineRejected => {
            emit_status(state, internal_tx, "finish the open edit first");
        }
        TableEvent::InlineCancelled => {
            state.score_types.input = None;
        }
        TableEvent::InlineSaved { target, payload } => {
            state.score_types.input = None;
            save_inline(state, runtime, internal_tx, target, payload);
        }
        TableEvent::ToggleConfirmationRequested { .. } => {}
        TableEvent::ToggleChanged {
            row,
            checkbox,
            desired,
        } => apply_toggle(state, runtime, internal_tx, &row, checkbox, desired),
        TableEvent::RowRemoved { index, row } => {
            delete_row(state, runtime, internal_tx, index, row);
        }
    }
}

fn save_option<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
    row: usize,
    field: &str,
    value: String,
) {
    let Some(id) = state.score_types.table.rows().get(row).and_then(Row::id) else {
        return;
    };
    let patch = Row::new().with(field, value);
    match runtime.update_score_type(id, &patch) {
        Ok(updated) => {
            dispatch_list(
                state,
                runtime,
                internal_tx,
                TableCommand::MergeRow {
                    row,
                    patch: updated,
                },
            );
        }
        Err(error) => {
            emit_status(state, internal_tx, format!("update failed: {error:#}"));
            reload_score_types(state, runtime, internal_tx);
        }
    }
}

fn apply_toggle<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
    row: &Row,
    checkbox: CheckboxRef,
    desired: bool,
) {
    let Some(id) = row.id() else {
        return;
    };
    dispatch_list(
        state,
        runtime,
        internal_tx,
        TableCommand::SetCell {
            row: checkbox.row,
            field: checkbox.field.clone(),
            value: Value::Bool(desired),
        },
    );

    let name = row.display("name");
    match runtime.set_score_type_active(id, desired) {
        Ok(()) => {
            let verb = if desired { "activated" } else { "deactivated" };
            emit_status(state, internal_tx, format!("{name} {verb}"));
        }
        Err(error) => {
            dispatch_list(
                state,
                runtime,
                internal_tx,
                TableCommand::SetCell {
                    row: checkbox.row,
                    field: checkbox.field,
                    value: Value::Bool(!desired),
                },
            );
            emit_status(
                state,
                internal_tx,
                format!("could not change {name}: {error:#}"),
            );
            reload_score_types(state, runtime, internal_tx);
        }
    }
}

fn delete_row<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
    index: usize,
    row: Row,
) {
    let Some(id) = row.id() else {
        return;
    };
    let name = row.display("name");
    match runtime.delete_score_type(id) {
        Ok(()) => emit_status(state, internal_tx, format!("deleted {name}")),
        Err(error) => {
            dispatch_list(state, runtime, internal_tx, TableCommand::InsertRow { index, row });
            emit_status(state, internal_tx, format!("delete failed: {error:#}"));
        }
    }
    let page = &mut state.score_types;
    page.cursor.row = step(page.cursor.row, 0, page.table.row_count());
}

fn save_inline<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
    target: InlineTarget,
    payload: Row,
) {
    match target {
        InlineTarget::Create => match runtime.create_score_type(&payload) {
            Ok(created) => {
                let name = created.display("name");
                dispatch_list(
                    state,
                    runtime,
                    internal_tx,
                    TableCommand::InsertRow {
                        index: 0,
                        row: created,
                    },
                );
                state.score_types.cursor.row = 0;
                emit_status(state, internal_tx, format!("created {name}"));
            }
            Err(error) => {
                emit_status(state, internal_tx, format!("create failed: {error:#}"));
                dispatch_list(state, runtime, internal_tx, TableCommand::BeginCreate(payload));
            }
        },
        InlineTarget::Edit(index) => {
            let id = payload.id().or_else(|| {
                state
                    .score_types
                    .table
                    .rows()
                    .get(index)
                    .and_then(Row::id)
            });
            let Some(id) = id else {
                return;
            };
            match runtime.update_score_type(id, &payload) {
                Ok(updated) => {
                    dispatch_list(
                        state,
                        runtime,
                        internal_tx,
                        TableCommand::MergeRow {
                            row: index,
                            patch: updated,
                        },
                    );
                    emit_status(state, internal_tx, "saved");
                }
                Err(error) => {
                    emit_status(state, internal_tx, format!("save failed: {error:#}"));
                    reload_score_types(state, runtime, internal_tx);
                }
            }
        }
    }
}

fn new_score_type_draft() -> Row {
    Row::new()
        .with("name", "")
        .with("category", CATEGORY_OPTIONS[0].0)
        .with("weight", 1)
        .with("active", true)
}

fn next_typed_column(columns: &[ColumnDescriptor], from: usize, forward: bool) -> usize {
    let len = columns.len();
    if len == 0 {
        return 0;
    }
    (1..=len)
        .map(|offset| {
            if forward {
                (from + offset) % len
            } else {
                (from + len - offset) % len
            }
        })
        .find(|index| input::is_typed(&columns[*index]))
        .unwrap_or(from)
}

fn open_inline_input(page: &mut ScoreTypePage) {
    let Some(inline) = page.table.inline() else {
        return;
    };
    let columns = page.table.columns();
    if !columns.get(page.cursor.col).is_some_and(input::is_typed) {
        page.cursor.col = next_typed_column(columns, columns.len().saturating_sub(1), true);
    }
    let field = columns
        .get(page.cursor.col)
        .map(|column| column.field.clone())
        .unwrap_or_default();
    let buffer = inline.draft.display(&field);
    page.input = Some(TextInput {
        purpose: InputPurpose::Cell { field },
        buffer,
    });
}

fn commit_inline_cell(
    state: &mut AppState<'_>,
    internal_tx: &Sender<InternalEvent>,
    field: &str,
    buffer: &str,
) -> bool {
    let Some(column) = state.score_types.table.column(field).cloned() else {
        return false;
    };
    match input::parse_cell(&column, buffer) {
        Ok(value) => {
            state.score_types.table.dispatch(TableCommand::UpdateDraft {
                field: field.to_owned(),
                value,
            });
            true
        }
        Err(error) => {
            emit_status(state, internal_tx, error.to_string());
            false
        }
    }
}

fn handle_list_input_key<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(input) = state.score_types.input.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Char(ch) => {
            input.buffer.push(ch);
            return;
        }
        KeyCode::Backspace => {
            input.buffer.pop();
            return;
        }
        _ => {}
    }

    let input = input.clone();
    match input.purpose {
        InputPurpose::Search => match key.code {
            KeyCode::Enter => {
                state.score_types.input = None;
                if state.score_types.list.set_search(&input.buffer) {
                    persist_list_settings(state, internal_tx);
                    reload_score_types(state, runtime, internal_tx);
                }
            }
            KeyCode::Esc => state.score_types.input = None,
            _ => {}
        },
        InputPurpose::Cell { field } => match key.code {
            KeyCode::Esc => {
                state.score_types.input = None;
                dispatch_list(state, runtime, internal_tx, TableCommand::CancelInline);
            }
            KeyCode::Tab | KeyCode::BackTab => {
                if commit_inline_cell(state, internal_tx, &field, &input.buffer) {
                    let page = &mut state.score_types;
                    page.cursor.col = next_typed_column(
                        page.table.columns(),
                        page.cursor.col,
                        key.code == KeyCode::Tab,
                    );
                    open_inline_input(page);
                }
            }
            KeyCode::Enter => {
                if commit_inline_cell(state, internal_tx, &field, &input.buffer) {
                    state.score_types.input = None;
                    dispatch_list(state, runtime, internal_tx, TableCommand::SaveInline);
                }
            }
            _ => {}
        },
        InputPurpose::FormName => {}
    }
}

fn handle_dropdown_key<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(overlay) = state.score_types.table.overlay() else {
        return;
    };
    let options = state
        .score_types
        .table
        .column(&overlay.field)
        .map(|column| column.options.clone())
        .unwrap_or_default();
    let page = &mut state.score_types;
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            page.dropdown_cursor = step(page.dropdown_cursor, 1, options.len());
        }
        KeyCode::Char('k') | KeyCode::Up => {
            page.dropdown_cursor = step(page.dropdown_cursor, -1, options.len());
        }
        KeyCode::Enter => {
            if let Some(option) = options.get(page.dropdown_cursor) {
                let value = option.value.clone();
                dispatch_list(state, runtime, internal_tx, TableCommand::ChooseOption(value));
            }
        }
        KeyCode::Esc => dispatch_list(state, runtime, internal_tx, TableCommand::OutsideClick),
        _ => {}
    }
}

/// Screen-space bounds of the cell under the cursor, relative to the table
/// body.
fn cell_bounds(columns: &[ColumnDescriptor], cursor: Cursor) -> Bounds {
    let width_of = |column: &ColumnDescriptor| i32::from(column.width.unwrap_or(DEFAULT_COLUMN_WIDTH));
    let x = i32::from(SELECT_COLUMN_WIDTH)
        + 1
        + columns
            .iter()
            .take(cursor.col)
            .map(|column| width_of(column) + 1)
            .sum::<i32>();
    let y = i32::try_from(cursor.row).unwrap_or(i32::MAX - 2) + 1;
    let width = columns.get(cursor.col).map_or(DEFAULT_COLUMN_WIDTH.into(), width_of);
    Bounds::new(x, y, width, 1)
}

fn activate_cell<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
) {
    let page = &state.score_types;
    let row = page.cursor.row;
    let Some(column) = page.table.columns().get(page.cursor.col) else {
        return;
    };
    let Some(current) = page.table.rows().get(row) else {
        return;
    };
    let command = match column.kind {
        ColumnKind::Toggle => TableCommand::RequestToggle {
            row,
            field: column.field.clone(),
            desired: !current.bool_field(&column.field).unwrap_or(false),
        },
        ColumnKind::Select => TableCommand::ToggleDropdown {
            row,
            field: column.field.clone(),
            trigger: cell_bounds(page.table.columns(), page.cursor),
            container: ScrollContainer::default(),
        },
        ColumnKind::Custom => TableCommand::ClickEdit(row),
        _ => TableCommand::ClickRow(row),
    };
    dispatch_list(state, runtime, internal_tx, command);
}

fn step_month(month: Month, year: i32, forward: bool) -> (Month, i32) {
    if forward {
        let next = month.next();
        (next, if next == Month::January { year + 1 } else { year })
    } else {
        let previous = month.previous();
        (
            previous,
            if previous == Month::December {
                year - 1
            } else {
                year
            },
        )
    }
}

fn shift_period<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
    forward: bool,
) {
    let filter = state.score_types.list.filter();
    let (month, year) = match (filter.month(), filter.year) {
        (Some(month), Some(year)) => step_month(month, year, forward),
        _ => {
            let today = OffsetDateTime::now_utc();
            (today.month(), today.year())
        }
    };
    if state
        .score_types
        .list
        .set_period(Some(month), Some(year))
    {
        persist_list_settings(state, internal_tx);
        reload_score_types(state, runtime, internal_tx);
    }
}

fn handle_score_types_key<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if state.score_types.input.is_some() {
        handle_list_input_key(state, runtime, internal_tx, key);
        return false;
    }

    if state.score_types.table.pending_toggle().is_some() {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                dispatch_list(state, runtime, internal_tx, TableCommand::ConfirmToggle);
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                dispatch_list(state, runtime, internal_tx, TableCommand::CancelToggle);
                emit_status(state, internal_tx, "left unchanged");
            }
            _ => {}
        }
        return false;
    }

    if let Some(index) = state.score_types.pending_delete {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                state.score_types.pending_delete = None;
                dispatch_list(state, runtime, internal_tx, TableCommand::RemoveRow(index));
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                state.score_types.pending_delete = None;
                emit_status(state, internal_tx, "delete cancelled");
            }
            _ => {}
        }
        return false;
    }

    if state.score_types.table.overlay().is_some() {
        handle_dropdown_key(state, runtime, internal_tx, key);
        return false;
    }

    let row_count = state.score_types.table.row_count();
    let column_count = state.score_types.table.columns().len();
    let cursor = state.score_types.cursor;
    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), KeyModifiers::NONE) => {
            return request_navigation(state, internal_tx, NavTarget::Quit);
        }
        (KeyCode::Char('j') | KeyCode::Down, _) => {
            if cursor.row + 1 >= row_count {
                load_next_page(state, runtime, internal_tx);
            }
            let page = &mut state.score_types;
            page.cursor.row = step(cursor.row, 1, page.table.row_count());
        }
        (KeyCode::Char('k') | KeyCode::Up, _) => {
            state.score_types.cursor.row = step(cursor.row, -1, row_count);
        }
        (KeyCode::Char('h') | KeyCode::Left, _) => {
            state.score_types.cursor.col = step(cursor.col, -1, column_count);
        }
        (KeyCode::Char('l') | KeyCode::Right, _) => {
            state.score_types.cursor.col = step(cursor.col, 1, column_count);
        }
        (KeyCode::Char(' '), _) => {
            if cursor.row < row_count {
                dispatch_list(state, runtime, internal_tx, TableCommand::ToggleRow(cursor.row));
            }
        }
        (KeyCode::Char('A'), _) => {
            let checked = !state.score_types.table.is_all_selected();
            dispatch_list(state, runtime, internal_tx, TableCommand::SelectAll(checked));
        }
        (KeyCode::Char('s'), KeyModifiers::NONE) => {
            if let Some(column) = state.score_types.table.columns().get(cursor.col) {
                let field = column.field.clone();
                dispatch_list(state, runtime, internal_tx, TableCommand::ClickColumn(field));
            }
        }
        (KeyCode::Enter, _) => activate_cell(state, runtime, internal_tx),
        (KeyCode::Char('e'), KeyModifiers::NONE) => {
            dispatch_list(state, runtime, internal_tx, TableCommand::ClickEdit(cursor.row));
        }
        (KeyCode::Char('n'), KeyModifiers::NONE) => {
            dispatch_list(
                state,
                runtime,
                internal_tx,
                TableCommand::BeginCreate(new_score_type_draft()),
            );
        }
        (KeyCode::Char('d'), KeyModifiers::NONE) => {
            if let Some(row) = state.score_types.table.rows().get(cursor.row) {
                let name = row.display("name");
                state.score_types.pending_delete = Some(cursor.row);
                emit_status(state, internal_tx, format!("delete {name}? y/n"));
            }
        }
        (KeyCode::Char('/'), _) => {
            let buffer = state.score_types.list.filter().search.clone();
            state.score_types.input = Some(TextInput {
                purpose: InputPurpose::Search,
                buffer,
            });
        }
        (KeyCode::Char('<'), _) => shift_period(state, runtime, internal_tx, false),
        (KeyCode::Char('>'), _) => shift_period(state, runtime, internal_tx, true),
        (KeyCode::Char('P'), _) => {
            if state.score_types.list.set_period(None, None) {
                persist_list_settings(state, internal_tx);
                reload_score_types(state, runtime, internal_tx);
            }
        }
        (KeyCode::Char('r'), KeyModifiers::NONE) => {
            reload_score_types(state, runtime, internal_tx);
        }
        _ => {}
    }
    false
}

fn open_details<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
    id: RowId,
) {
    let form = match runtime.load_score_details(ScoreTypeId::new(id.get())) {
        Ok(form) => form,
        Err(error) => {
            emit_status(
                state,
                internal_tx,
                format!("cannot open score type {id}: {error:#}"),
            );
            return;
        }
    };
    match ScoreDetailsPage::open(state.drafts, form) {
        Ok(details) => {
            let resumed = details.editor.is_editing();
            state.details = Some(details);
            state.page = PageKind::ScoreDetails;
            state.notifier.publish(StateChanged::Draft);
            if resumed {
                emit_status(state, internal_tx, "resumed unsaved draft");
            }
        }
        Err(error) => {
            emit_status(
                state,
                internal_tx,
                format!("cannot open score type {id}: {error:#}"),
            );
        }
    }
}

enum DetailsOutcome {
    Idle,
    Status(String),
    Save,
    Navigate(NavTarget),
}

fn handle_details_key<R: AppRuntime>(
    state: &mut AppState<'_>,
    runtime: &mut R,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    let Some(details) = state.details.as_mut() else {
        state.page = PageKind::ScoreTypes;
        return false;
    };

    let outcome = if details.input.is_some() {
        details_input_key(details, key)
    } else {
        match (key.code, key.modifiers) {
            (KeyCode::Char('s'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                DetailsOutcome::Save
            }
            (KeyCode::Char('S'), _) => DetailsOutcome::Save,
            (KeyCode::Tab | KeyCode::Esc | KeyCode::Char('b'), _) => {
                DetailsOutcome::Navigate(NavTarget::ScoreTypes)
            }
            (KeyCode::Char('q'), KeyModifiers::NONE) => DetailsOutcome::Navigate(NavTarget::Quit),
            _ => details_edit_key(details, key),
        }
    };
    state.notifier.publish(StateChanged::Draft);

    match outcome {
        DetailsOutcome::Idle => false,
        DetailsOutcome::Status(message) => {
            emit_status(state, internal_tx, message);
            false
        }
        DetailsOutcome::Save => {
            let message = save_details(state, runtime);
            emit_status(state, internal_tx, message);
            false
        }
        DetailsOutcome::Navigate(target) => request_navigation(state, internal_tx, target),
    }
}

fn apply_form_edit(
    details: &mut ScoreDetailsPage<'_>,
    mutate: impl FnOnce(&mut ScoreDetailsForm),
) -> DetailsOutcome {
    details.invalid_rows.clear();
    let result = details
        .editor
        .edit(mutate)
        .and_then(|enabled| details.sync_rows(false).map(|()| enabled));
    match result {
        Ok(true) => DetailsOutcome::Idle,
        Ok(false) => DetailsOutcome::Status("no changes left to save".to_owned()),
        Err(error) => DetailsOutcome::Status(format!("edit failed: {error:#}")),
    }
}

fn details_input_key(details: &mut ScoreDetailsPage<'_>, key: KeyEvent) -> DetailsOutcome {
    let Some(input) = details.input.as_mut() else {
        return DetailsOutcome::Idle;
    };
    match key.code {
        KeyCode::Char(ch) => input.buffer.push(ch),
        KeyCode::Backspace => {
            input.buffer.pop();
        }
        KeyCode::Esc => details.input = None,
        KeyCode::Enter => {
            let Some(input) = details.input.take() else {
                return DetailsOutcome::Idle;
            };
            return match input.purpose {
                InputPurpose::Cell { field } => commit_rule_cell(details, &field, &input.buffer),
                InputPurpose::FormName => {
                    let name = input.buffer.trim().to_owned();
                    apply_form_edit(details, |form| form.name = name)
                }
                InputPurpose::Search => DetailsOutcome::Idle,
            };
        }
        _ => {}
    }
    DetailsOutcome::Idle
}

fn commit_rule_cell(
    details: &mut ScoreDetailsPage<'_>,
    field: &str,
    buffer: &str,
) -> DetailsOutcome {
    let index = details.cursor.row;
    let Some(column) = details.table.column(field).cloned() else {
        return DetailsOutcome::Idle;
    };
    let value = match input::parse_cell(&column, buffer) {
        Ok(value) => value,
        Err(error) => return DetailsOutcome::Status(error.to_string()),
    };
    let Some(mut row) = details.table.rows().get(index).cloned() else {
        return DetailsOutcome::Idle;
    };
    row.set(field, value);
    let rule = match ScoreRule::from_row(&row) {
        Ok(rule) => rule,
        Err(error) => return DetailsOutcome::Status(format!("{error:#}")),
    };
    apply_form_edit(details, move |form| {
        if let Some(slot) = form.rules.get_mut(index) {
            *slot = rule;
        }
    })
}

fn edit_rule_cell(details: &mut ScoreDetailsPage<'_>) -> DetailsOutcome {
    let index = details.cursor.row;
    let Some(column) = details.table.columns().get(details.cursor.col).cloned() else {
        return DetailsOutcome::Idle;
    };
    let Some(buffer) = details
        .table
        .rows()
        .get(index)
        .map(|row| row.display(&column.field))
    else {
        return DetailsOutcome::Idle;
    };

    if column.kind == ColumnKind::Toggle {
        return apply_form_edit(details, |form| {
            if let Some(rule) = form.rules.get_mut(index) {
                rule.active = !rule.active;
            }
        });
    }
    if input::is_typed(&column) {
        details.input = Some(TextInput {
            purpose: InputPurpose::Cell {
                field: column.field,
            },
            buffer,
        });
    }
    DetailsOutcome::Idle
}

fn details_edit_key(details: &mut ScoreDetailsPage<'_>, key: KeyEvent) -> DetailsOutcome {
    let row_count = details.table.row_count();
    let column_count = details.table.columns().len();
    let cursor = details.cursor;
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => details.cursor.row = step(cursor.row, 1, row_count),
        KeyCode::Char('k') | KeyCode::Up => details.cursor.row = step(cursor.row, -1, row_count),
        KeyCode::Char('h') | KeyCode::Left => {
            details.cursor.col = step(cursor.col, -1, column_count);
        }
        KeyCode::Char('l') | KeyCode::Right => {
            details.cursor.col = step(cursor.col, 1, column_count);
        }
        KeyCode::Enter | KeyCode::Char('e') => return edit_rule_cell(details),
        KeyCode::Char('n') => {
            let outcome = apply_form_edit(details, |form| form.rules.push(ScoreRule::blank()));
            details.cursor = Cursor {
                row: details.table.row_count().saturating_sub(1),
                col: 0,
            };
            return outcome;
        }
        KeyCode::Char('d') => {
            if cursor.row >= row_count {
                return DetailsOutcome::Idle;
            }
            return apply_form_edit(details, |form| {
                if cursor.row < form.rules.len() {
                    form.rules.remove(cursor.row);
                }
            });
        }
        KeyCode::Char('r') => {
            details.input = Some(TextInput {
                purpose: InputPurpose::FormName,
                buffer: details.editor.form().name.clone(),
            });
        }
        KeyCode::Char('x') => {
            details.invalid_rows.clear();
            let result = details
                .editor
                .discard()
                .and_then(|()| details.sync_rows(false));
            return match result {
                Ok(()) => DetailsOutcome::Status("changes discarded".to_owned()),
                Err(error) => DetailsOutcome::Status(format!("discard failed: {error:#}")),
            };
        }
        _ => {}
    }
    DetailsOutcome::Idle
}

fn save_details<R: AppRuntime>(state: &mut AppState<'_>, runtime: &mut R) -> String {
    let Some(details) = state.details.as_mut() else {
        return String::new();
    };
    if !details.editor.save_enabled() {
        return "nothing to save".to_owned();
    }
    if let Err(failure) = details.editor.validate() {
        details.invalid_rows = failure.rows.clone();
        return failure.message;
    }

    let committed = match runtime.save_score_details(details.editor.form()) {
        Ok(committed) => committed,
        Err(error) => {
            log::warn!("saving {} failed: {error:#}", details.editor.key());
            return format!("save failed: {error:#}");
        }
    };
    let id = RowId::new(committed.score_type_id.get());
    let name = committed.name.clone();
    if let Err(error) = details
        .editor
        .saved(committed)
        .and_then(|()| details.sync_rows(false))
    {
        return format!("saved, but the page is stale: {error:#}");
    }
    details.invalid_rows.clear();

    let page = &mut state.score_types;
    if let Some(index) = page.table.rows().iter().position(|row| row.id() == Some(id)) {
        page.table.dispatch(TableCommand::SetCell {
            row: index,
            field: "name".to_owned(),
            value: Value::String(name),
        });
    }
    "saved".to_owned()
}

fn checkbox_mark(checked: bool) -> &'static str {
    if checked { "[x]" } else { "[ ]" }
}

fn header_checkbox_mark(state: HeaderCheckbox) -> &'static str {
    match state {
        HeaderCheckbox::Unchecked => "[ ]",
        HeaderCheckbox::Indeterminate => "[-]",
        HeaderCheckbox::Checked => "[x]",
    }
}

fn header_label(column: &ColumnDescriptor, sort: &SortState) -> String {
    let Some(direction) = sort.direction_for(&column.field) else {
        return column.header.clone();
    };
    let mark = match direction {
        SortDirection::Asc => SORT_ASC_MARK,
        SortDirection::Desc => SORT_DESC_MARK,
    };
    if sort.order.len() > 1 {
        let position = sort
            .order
            .iter()
            .position(|field| *field == column.field)
            .map_or(0, |position| position + 1);
        format!("{} {mark}{position}", column.header)
    } else {
        format!("{} {mark}", column.header)
    }
}

fn cell_text(column: &ColumnDescriptor, row: &Row) -> String {
    match column.kind {
        ColumnKind::Toggle => {
            checkbox_mark(row.bool_field(&column.field).unwrap_or(false)).to_owned()
        }
        ColumnKind::Select => {
            let value = row.display(&column.field);
            column
                .options
                .iter()
                .find(|option| option.value == value)
                .map_or(value, |option| option.label.clone())
        }
        ColumnKind::Custom => column
            .row_actions
            .iter()
            .map(|action| action.label())
            .collect::<Vec<_>>()
            .join(" "),
        _ => row.display(&column.field),
    }
}

fn aligned(column: &ColumnDescriptor, text: String) -> Text<'static> {
    let alignment = match column.effective_align() {
        Align::Left => Alignment::Left,
        Align::Center => Alignment::Center,
        Align::Right => Alignment::Right,
    };
    Text::from(text).alignment(alignment)
}

fn list_title(list: &PagedListController, table: &TableState) -> String {
    let mut title = format!("score types {}/{}", table.row_count(), list.total_items());
    let filter = list.filter();
    if !filter.search.is_empty() {
        title.push_str(&format!(" search:{}", filter.search));
    }
    match (filter.month, filter.year) {
        (Some(month), Some(year)) => title.push_str(&format!(" period:{month:02}/{year}")),
        (None, Some(year)) => title.push_str(&format!(" period:{year}")),
        _ => {}
    }
    for (group, count) in list.group_counts() {
        title.push_str(&format!(" {group}:{count}"));
    }
    if list.has_next_page() {
        title.push_str(" more");
    }
    if list.is_loading() {
        title.push_str(" loading");
    }
    title
}

fn details_title(details: &ScoreDetailsPage<'_>) -> String {
    let mut title = format!("score type {}", details.editor.form().score_type_id);
    if details.editor.is_editing() {
        title.push_str(" [editing]");
    }
    if details.editor.save_enabled() {
        title.push_str(" [unsaved]");
    }
    title
}

fn leave_prompt_text(prompt: &LeavePrompt) -> String {
    let mut lines = vec![prompt.message.to_owned(), String::new()];
    lines.extend(
        prompt
            .choices
            .iter()
            .map(|choice| format!("{}  {}", choice_key(*choice), choice.label())),
    );
    lines.join("\n")
}

fn status_text(state: &AppState<'_>) -> String {
    if state.page == PageKind::ScoreTypes {
        if let Some(TextInput {
            purpose: InputPurpose::Search,
            buffer,
        }) = &state.score_types.input
        {
            return format!("search: {buffer}_");
        }
    }
    if let Some(status) = &state.status {
        return status.clone();
    }
    match state.page {
        PageKind::ScoreTypes => match state.score_types.list.last_error() {
            Some(error) => format!("load failed: {error}"),
            None => LIST_HINTS.to_owned(),
        },
        PageKind::ScoreDetails => DETAILS_HINTS.to_owned(),
    }
}

fn page_titles(state: &AppState<'_>) -> Vec<String> {
    let details = match &state.details {
        Some(details) if details.editor.save_enabled() => {
            format!("{} *", details.editor.form().name)
        }
        Some(details) => details.editor.form().name.clone(),
        None => "details".to_owned(),
    };
    vec!["score types".to_owned(), details]
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState<'_>) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let selected = match state.page {
        PageKind::ScoreTypes => 0,
        PageKind::ScoreDetails => 1,
    };
    let tabs = Tabs::new(page_titles(state))
        .block(Block::default().title("hireboard").borders(Borders::ALL))
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    match (&state.page, &state.details) {
        (PageKind::ScoreDetails, Some(details)) => render_details(frame, layout[1], details),
        _ => render_score_types(frame, layout[1], &state.score_types),
    }

    let status = Paragraph::new(status_text(state))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if state.page == PageKind::ScoreTypes {
        let page = &state.score_types;
        if let Some(pending) = page.table.pending_toggle() {
            let name = page
                .table
                .rows()
                .get(pending.checkbox.row)
                .map(|row| row.display("name"))
                .unwrap_or_default();
            let verb = if pending.desired {
                "Activate"
            } else {
                "Deactivate"
            };
            render_dialog(
                frame,
                "confirm",
                &format!("{verb} {name}?\n\ny  yes\nn  no"),
            );
        } else if let Some(index) = page.pending_delete {
            let name = page
                .table
                .rows()
                .get(index)
                .map(|row| row.display("name"))
                .unwrap_or_default();
            render_dialog(frame, "delete", &format!("Delete {name}?\n\ny  yes\nn  no"));
        }
    }

    if let Some(pending) = &state.leave {
        render_dialog(frame, pending.prompt.title, &leave_prompt_text(&pending.prompt));
    }
}

fn render_dialog(frame: &mut ratatui::Frame<'_>, title: &str, body: &str) {
    let area = centered_rect(50, 30, frame.area());
    frame.render_widget(Clear, area);
    let dialog = Paragraph::new(body.to_owned()).block(
        Block::default()
            .title(title.to_owned())
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Cyan)),
    );
    frame.render_widget(dialog, area);
}

fn column_widths(columns: &[ColumnDescriptor]) -> Vec<Constraint> {
    let mut widths = vec![Constraint::Length(SELECT_COLUMN_WIDTH)];
    widths.extend(
        columns
            .iter()
            .map(|column| Constraint::Length(column.width.unwrap_or(DEFAULT_COLUMN_WIDTH))),
    );
    widths
}

fn draft_row(
    columns: &[ColumnDescriptor],
    draft: &Row,
    input: Option<&TextInput>,
) -> UiRow<'static> {
    let mut cells = vec![Cell::from("+")];
    cells.extend(columns.iter().map(|column| match input {
        Some(TextInput {
            purpose: InputPurpose::Cell { field },
            buffer,
        }) if *field == column.field => Cell::from(format!("{buffer}_"))
            .style(Style::default().fg(Color::Black).bg(Color::Yellow)),
        _ => Cell::from(aligned(column, cell_text(column, draft)))
            .style(Style::default().fg(Color::Green)),
    }));
    UiRow::new(cells)
}

fn render_score_types(frame: &mut ratatui::Frame<'_>, area: Rect, page: &ScoreTypePage) {
    let table = &page.table;
    let columns = table.columns();

    let mut header_cells = vec![Cell::from(header_checkbox_mark(table.header_checkbox()))];
    header_cells.extend(columns.iter().map(|column| {
        Cell::from(header_label(column, table.sort())).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let mut rows = Vec::with_capacity(table.row_count() + 1);
    if let Some(InlineEdit {
        target: InlineTarget::Create,
        draft,
    }) = table.inline()
    {
        rows.push(draft_row(columns, draft, page.input.as_ref()));
    }
    let editing = match table.inline() {
        Some(InlineEdit {
            target: InlineTarget::Edit(index),
            draft,
        }) => Some((*index, draft)),
        _ => None,
    };
    for (index, row) in table.rows().iter().enumerate() {
        if let Some((_, draft)) = editing.filter(|(editing, _)| *editing == index) {
            rows.push(draft_row(columns, draft, page.input.as_ref()));
            continue;
        }

        let on_cursor = index == page.cursor.row;
        let mut cells = vec![Cell::from(checkbox_mark(table.is_selected(index)))];
        cells.extend(columns.iter().enumerate().map(|(column_index, column)| {
            let mut style = Style::default();
            if table.is_clicked(index) {
                style = style.fg(Color::Gray).add_modifier(Modifier::ITALIC);
            }
            if on_cursor {
                style = style.bg(Color::DarkGray);
            }
            if on_cursor && column_index == page.cursor.col {
                style = Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD);
            }
            Cell::from(aligned(column, cell_text(column, row))).style(style)
        }));
        rows.push(UiRow::new(cells));
    }

    let widget = Table::new(rows, column_widths(columns))
        .header(UiRow::new(header_cells))
        .column_spacing(1)
        .block(
            Block::default()
                .title(list_title(&page.list, table))
                .borders(Borders::ALL),
        );
    frame.render_widget(widget, area);

    if let Some(overlay) = table.overlay() {
        render_dropdown(frame, area, page, overlay);
    }
}

fn render_dropdown(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    page: &ScoreTypePage,
    overlay: &DropdownOverlay,
) {
    let Some(column) = page.table.column(&overlay.field) else {
        return;
    };
    let label_width = column
        .options
        .iter()
        .map(|option| option.label.chars().count())
        .max()
        .unwrap_or(4);
    let width = u16::try_from(label_width).unwrap_or(u16::MAX).saturating_add(4);
    let height = u16::try_from(column.options.len())
        .unwrap_or(u16::MAX)
        .saturating_add(2);
    let x = area
        .x
        .saturating_add(u16::try_from(overlay.left.max(0)).unwrap_or(0));
    let y = area
        .y
        .saturating_add(1)
        .saturating_add(u16::try_from(overlay.top.max(0)).unwrap_or(0));
    let popup = Rect::new(x, y, width, height).intersection(frame.area());

    let lines = column
        .options
        .iter()
        .enumerate()
        .map(|(index, option)| {
            let marker = if index == page.dropdown_cursor { ">" } else { " " };
            format!("{marker} {}", option.label)
        })
        .collect::<Vec<_>>()
        .join("\n");
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(column.header.clone())
                .borders(Borders::ALL),
        ),
        popup,
    );
}

fn render_details(frame: &mut ratatui::Frame<'_>, area: Rect, details: &ScoreDetailsPage<'_>) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let name = match &details.input {
        Some(TextInput {
            purpose: InputPurpose::FormName,
            buffer,
        }) => format!("name: {buffer}_"),
        _ => format!("name: {}", details.editor.form().name),
    };
    frame.render_widget(
        Paragraph::new(name).block(
            Block::default()
                .title(details_title(details))
                .borders(Borders::ALL),
        ),
        layout[0],
    );

    let columns = details.table.columns();
    let mut header_cells = vec![Cell::from("")];
    header_cells.extend(columns.iter().map(|column| {
        Cell::from(column.header.clone()).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));

    let rows = details.table.rows().iter().enumerate().map(|(index, row)| {
        let invalid = details.invalid_rows.contains(&index);
        let mut cells = vec![Cell::from(if invalid { "!" } else { "" })];
        cells.extend(columns.iter().enumerate().map(|(column_index, column)| {
            let under_cursor =
                index == details.cursor.row && column_index == details.cursor.col;
            let typing = match &details.input {
                Some(TextInput {
                    purpose: InputPurpose::Cell { field },
                    buffer,
                }) if under_cursor && *field == column.field => Some(buffer),
                _ => None,
            };
            if let Some(buffer) = typing {
                return Cell::from(format!("{buffer}_"))
                    .style(Style::default().fg(Color::Black).bg(Color::Yellow));
            }

            let mut style = Style::default();
            if invalid {
                style = style.fg(Color::Red);
            }
            if index == details.cursor.row {
                style = style.bg(Color::DarkGray);
            }
            if under_cursor {
                style = Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD);
            }
            Cell::from(aligned(column, cell_text(column, row))).style(style)
        }));
        UiRow::new(cells)
    });

    let widget = Table::new(rows, column_widths(columns))
        .header(UiRow::new(header_cells))
        .column_spacing(1)
        .block(Block::default().title("rules").borders(Borders::ALL));
    frame.render_widget(widget, layout[1]);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, AppState, InternalEvent, PageKind, SCORE_TYPE_SETTINGS_KEY, cell_bounds,
        handle_key_event, header_label, initialize, leave_prompt_text, list_title,
        score_type_columns, status_text, step_month,
    };
    use anyhow::Result;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use hireboard_app::{
        ColumnDescriptor, ColumnKind, DraftKey, KeyValueStore, LeavePrompt, MemoryStore,
        PageQuery, PagedEnvelope, Row, RowId, ScoreDetailsForm, ScoreTypeId, SortDirection,
        SortState, StateChanged,
    };
    use hireboard_testkit::DemoBackend;
    use std::sync::mpsc::{self, Sender};
    use time::Month;

    struct TestRuntime {
        backend: DemoBackend,
        queries: Vec<PageQuery>,
        detail_saves: usize,
    }

    impl TestRuntime {
        fn new(count: usize) -> Self {
            Self {
                backend: DemoBackend::new(count),
                queries: Vec::new(),
                detail_saves: 0,
            }
        }

        fn last_query(&self) -> &PageQuery {
            self.queries.last().expect("at least one query")
        }
    }

    impl AppRuntime for TestRuntime {
        fn load_score_types(&mut self, query: &PageQuery) -> Result<PagedEnvelope<Row>> {
            self.queries.push(query.clone());
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
            self.detail_saves += 1;
            self.backend.save_score_details(form)
        }
    }

    fn internal_tx() -> Sender<InternalEvent> {
        let (tx, _rx) = mpsc::channel();
        tx
    }

    fn press(
        state: &mut AppState<'_>,
        runtime: &mut TestRuntime,
        tx: &Sender<InternalEvent>,
        code: KeyCode,
    ) -> bool {
        handle_key_event(state, runtime, tx, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(
        state: &mut AppState<'_>,
        runtime: &mut TestRuntime,
        tx: &Sender<InternalEvent>,
        text: &str,
    ) {
        for ch in text.chars() {
            press(state, runtime, tx, KeyCode::Char(ch));
        }
    }

    fn move_to_column(
        state: &mut AppState<'_>,
        runtime: &mut TestRuntime,
        tx: &Sender<InternalEvent>,
        field: &str,
    ) {
        let index = score_type_columns()
            .iter()
            .position(|column| column.field == field)
            .expect("known column");
        for _ in 0..index {
            press(state, runtime, tx, KeyCode::Char('l'));
        }
    }

    fn names(state: &AppState<'_>) -> Vec<String> {
        state
            .score_type_rows()
            .iter()
            .map(|row| row.display("name"))
            .collect()
    }

    #[test]
    fn initialize_loads_first_page_and_restores_clicked_rows() -> Result<()> {
        let settings = MemoryStore::new();
        settings.put(SCORE_TYPE_SETTINGS_KEY, r#"{"search":"","clickedRowIds":[2]}"#)?;
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 3);
        let mut runtime = TestRuntime::new(5);
        let tx = internal_tx();

        initialize(&mut state, &mut runtime, &tx);

        assert_eq!(state.score_type_rows().len(), 3);
        assert_eq!(runtime.last_query().page, 1);
        assert_eq!(runtime.last_query().page_size, 3);
        assert!(state.score_types.table.is_clicked(1));
        assert!(!state.score_types.table.is_clicked(0));
        assert!(state.score_types.list.has_next_page());
        Ok(())
    }

    #[test]
    fn moving_past_the_last_row_loads_the_next_page() {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 3);
        let mut runtime = TestRuntime::new(5);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);

        press(&mut state, &mut runtime, &tx, KeyCode::Char('j'));
        press(&mut state, &mut runtime, &tx, KeyCode::Char('j'));
        assert_eq!(runtime.queries.len(), 1);

        press(&mut state, &mut runtime, &tx, KeyCode::Char('j'));
        assert_eq!(runtime.queries.len(), 2);
        assert_eq!(runtime.last_query().page, 2);
        assert_eq!(state.score_type_rows().len(), 5);
        assert_eq!(state.score_types.cursor.row, 3);

        press(&mut state, &mut runtime, &tx, KeyCode::Char('j'));
        press(&mut state, &mut runtime, &tx, KeyCode::Char('j'));
        assert_eq!(runtime.queries.len(), 2);
        assert_eq!(state.score_types.cursor.row, 4);
    }

    #[test]
    fn sort_key_cycles_server_sort_and_persists_it() -> Result<()> {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 10);
        let mut runtime = TestRuntime::new(5);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);

        press(&mut state, &mut runtime, &tx, KeyCode::Char('s'));
        assert_eq!(runtime.last_query().sort_fields.as_deref(), Some("name asc"));
        assert_eq!(names(&state)[0], "Communication");
        assert_eq!(
            state.score_types.table.direction_for("name"),
            Some(SortDirection::Asc)
        );

        press(&mut state, &mut runtime, &tx, KeyCode::Char('s'));
        assert_eq!(runtime.last_query().sort_fields.as_deref(), Some("name desc"));
        assert_eq!(names(&state)[0], "Technical");

        let stored = settings.get(SCORE_TYPE_SETTINGS_KEY)?.unwrap_or_default();
        assert!(stored.contains("\"desc\""), "settings: {stored}");

        press(&mut state, &mut runtime, &tx, KeyCode::Char('s'));
        assert_eq!(runtime.last_query().sort_fields, None);
        assert!(state.score_types.table.sort().is_empty());
        Ok(())
    }

    #[test]
    fn toggle_waits_for_confirmation() {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 10);
        let mut runtime = TestRuntime::new(5);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);
        move_to_column(&mut state, &mut runtime, &tx, "active");

        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        assert!(state.score_types.table.pending_toggle().is_some());
        press(&mut state, &mut runtime, &tx, KeyCode::Char('n'));
        assert!(state.score_types.table.pending_toggle().is_none());
        assert_eq!(state.score_type_rows()[0].bool_field("active"), Some(true));

        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        press(&mut state, &mut runtime, &tx, KeyCode::Char('y'));
        assert_eq!(state.score_type_rows()[0].bool_field("active"), Some(false));
        let stored = runtime
            .backend
            .score_type(RowId::new(1))
            .expect("score type exists");
        assert_eq!(stored.bool_field("active"), Some(false));
    }

    #[test]
    fn rejected_toggle_reverts_and_refetches() {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 10);
        let mut runtime = TestRuntime::new(5);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);
        move_to_column(&mut state, &mut runtime, &tx, "active");
        runtime.backend.set_fail_writes(true);

        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        press(&mut state, &mut runtime, &tx, KeyCode::Char('y'));

        assert_eq!(state.score_type_rows()[0].bool_field("active"), Some(true));
        assert_eq!(runtime.queries.len(), 2);
        assert!(
            state
                .status()
                .is_some_and(|status| status.contains("could not change Technical"))
        );
    }

    #[test]
    fn failed_delete_puts_the_row_back() {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 10);
        let mut runtime = TestRuntime::new(4);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);
        press(&mut state, &mut runtime, &tx, KeyCode::Char('j'));

        runtime.backend.set_fail_writes(true);
        press(&mut state, &mut runtime, &tx, KeyCode::Char('d'));
        press(&mut state, &mut runtime, &tx, KeyCode::Char('y'));
        assert_eq!(state.score_type_rows().len(), 4);
        assert_eq!(state.score_type_rows()[1].id(), Some(RowId::new(2)));
        assert!(
            state
                .status()
                .is_some_and(|status| status.starts_with("delete failed"))
        );

        runtime.backend.set_fail_writes(false);
        press(&mut state, &mut runtime, &tx, KeyCode::Char('d'));
        press(&mut state, &mut runtime, &tx, KeyCode::Char('n'));
        assert_eq!(state.score_type_rows().len(), 4);

        press(&mut state, &mut runtime, &tx, KeyCode::Char('d'));
        press(&mut state, &mut runtime, &tx, KeyCode::Char('y'));
        assert_eq!(state.score_type_rows().len(), 3);
        assert!(runtime.backend.score_type(RowId::new(2)).is_none());
    }

    #[test]
    fn inline_create_inserts_saved_row_and_reopens_on_conflict() {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 10);
        let mut runtime = TestRuntime::new(3);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);

        press(&mut state, &mut runtime, &tx, KeyCode::Char('n'));
        assert!(state.score_types.table.inline().is_some());
        type_text(&mut state, &mut runtime, &tx, "Case study");
        press(&mut state, &mut runtime, &tx, KeyCode::Enter);

        assert!(state.score_types.table.inline().is_none());
        assert_eq!(names(&state)[0], "Case study");
        assert_eq!(runtime.backend.len(), 4);

        press(&mut state, &mut runtime, &tx, KeyCode::Char('n'));
        type_text(&mut state, &mut runtime, &tx, "technical");
        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        assert!(
            state
                .status()
                .is_some_and(|status| status.contains("conflict"))
        );
        let reopened = state
            .score_types
            .table
            .inline()
            .expect("create reopens after a conflict");
        assert_eq!(reopened.draft.display("name"), "technical");

        press(&mut state, &mut runtime, &tx, KeyCode::Esc);
        assert!(state.score_types.table.inline().is_none());
        assert_eq!(runtime.backend.len(), 4);
    }

    #[test]
    fn inline_edit_validates_numbers_before_saving() {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 10);
        let mut runtime = TestRuntime::new(3);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);

        press(&mut state, &mut runtime, &tx, KeyCode::Char('e'));
        press(&mut state, &mut runtime, &tx, KeyCode::Tab);
        press(&mut state, &mut runtime, &tx, KeyCode::Backspace);
        type_text(&mut state, &mut runtime, &tx, "x");
        press(&mut state, &mut runtime, &tx, KeyCode::Tab);
        assert_eq!(state.status(), Some("Weight: enter a number"));
        assert!(state.score_types.table.inline().is_some());

        press(&mut state, &mut runtime, &tx, KeyCode::Backspace);
        type_text(&mut state, &mut runtime, &tx, "9");
        press(&mut state, &mut runtime, &tx, KeyCode::Enter);

        assert!(state.score_types.table.inline().is_none());
        let stored = runtime
            .backend
            .score_type(RowId::new(1))
            .expect("score type exists");
        assert_eq!(stored.display("weight"), "9");
        assert_eq!(state.score_type_rows()[0].display("weight"), "9");
    }

    #[test]
    fn dropdown_choice_updates_the_backend() {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 10);
        let mut runtime = TestRuntime::new(3);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);
        move_to_column(&mut state, &mut runtime, &tx, "category");

        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        let overlay = state
            .score_types
            .table
            .overlay()
            .expect("dropdown opens")
            .clone();
        assert_eq!(overlay.field, "category");
        assert_eq!(overlay.top, 2);

        press(&mut state, &mut runtime, &tx, KeyCode::Char('j'));
        press(&mut state, &mut runtime, &tx, KeyCode::Char('j'));
        press(&mut state, &mut runtime, &tx, KeyCode::Enter);

        assert!(state.score_types.table.overlay().is_none());
        assert_eq!(state.score_type_rows()[0].display("category"), "cultural");
        let stored = runtime
            .backend
            .score_type(RowId::new(1))
            .expect("score type exists");
        assert_eq!(stored.display("category"), "cultural");

        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        press(&mut state, &mut runtime, &tx, KeyCode::Esc);
        assert!(state.score_types.table.overlay().is_none());
    }

    #[test]
    fn search_input_filters_on_enter() {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 10);
        let mut runtime = TestRuntime::new(5);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);

        press(&mut state, &mut runtime, &tx, KeyCode::Char('/'));
        type_text(&mut state, &mut runtime, &tx, "lead");
        assert_eq!(status_text(&state), "search: lead_");
        press(&mut state, &mut runtime, &tx, KeyCode::Enter);

        assert_eq!(runtime.last_query().search.as_deref(), Some("lead"));
        assert_eq!(names(&state), vec!["Leadership"]);
    }

    #[test]
    fn period_keys_step_months_across_years() {
        assert_eq!(
            step_month(Month::December, 2025, true),
            (Month::January, 2026)
        );
        assert_eq!(
            step_month(Month::January, 2026, false),
            (Month::December, 2025)
        );

        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 10);
        let mut runtime = TestRuntime::new(2);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);

        press(&mut state, &mut runtime, &tx, KeyCode::Char('>'));
        let first = runtime.last_query().clone();
        assert!(first.month.is_some() && first.year.is_some());
        press(&mut state, &mut runtime, &tx, KeyCode::Char('>'));
        assert_ne!(runtime.last_query().month, first.month);
        press(&mut state, &mut runtime, &tx, KeyCode::Char('P'));
        assert_eq!(runtime.last_query().month, None);
        assert_eq!(runtime.last_query().year, None);
    }

    #[test]
    fn kept_draft_survives_leaving_and_resumes() -> Result<()> {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 10);
        let mut runtime = TestRuntime::new(3);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);

        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        assert_eq!(state.page(), PageKind::ScoreDetails);
        assert!(settings.get(SCORE_TYPE_SETTINGS_KEY)?.is_some_and(|raw| raw.contains("[1]")));

        let original = state.details_form().expect("details open").rules[0].label.clone();
        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        type_text(&mut state, &mut runtime, &tx, "!");
        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        let key = DraftKey::score_details(ScoreTypeId::new(1));
        assert!(drafts.get(key.as_str())?.is_some());

        press(&mut state, &mut runtime, &tx, KeyCode::Tab);
        assert_eq!(state.page(), PageKind::ScoreDetails);
        assert!(state.leave.is_some());

        press(&mut state, &mut runtime, &tx, KeyCode::Char('k'));
        assert_eq!(state.page(), PageKind::ScoreTypes);
        assert!(drafts.get(key.as_str())?.is_some());

        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        assert_eq!(state.page(), PageKind::ScoreDetails);
        assert_eq!(
            state.details_form().expect("details open").rules[0].label,
            format!("{original}!")
        );
        assert_eq!(state.status(), Some("resumed unsaved draft"));
        Ok(())
    }

    #[test]
    fn leave_dialog_can_stay_or_discard() -> Result<()> {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 10);
        let mut runtime = TestRuntime::new(3);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);

        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        press(&mut state, &mut runtime, &tx, KeyCode::Char('r'));
        type_text(&mut state, &mut runtime, &tx, " II");
        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        let key = DraftKey::score_details(ScoreTypeId::new(1));

        press(&mut state, &mut runtime, &tx, KeyCode::Esc);
        press(&mut state, &mut runtime, &tx, KeyCode::Char('x'));
        assert!(state.leave.is_some(), "unrelated keys keep the dialog open");
        press(&mut state, &mut runtime, &tx, KeyCode::Char('s'));
        assert!(state.leave.is_none());
        assert_eq!(state.page(), PageKind::ScoreDetails);

        press(&mut state, &mut runtime, &tx, KeyCode::Esc);
        press(&mut state, &mut runtime, &tx, KeyCode::Char('d'));
        assert_eq!(state.page(), PageKind::ScoreTypes);
        assert!(drafts.get(key.as_str())?.is_none());
        assert_eq!(state.status(), Some("draft discarded"));
        Ok(())
    }

    #[test]
    fn quit_is_guarded_only_with_pending_changes() {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 10);
        let mut runtime = TestRuntime::new(3);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);

        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        press(&mut state, &mut runtime, &tx, KeyCode::Char('l'));
        press(&mut state, &mut runtime, &tx, KeyCode::Char('l'));
        press(&mut state, &mut runtime, &tx, KeyCode::Char('l'));
        press(&mut state, &mut runtime, &tx, KeyCode::Char('l'));
        press(&mut state, &mut runtime, &tx, KeyCode::Enter);

        assert!(!press(&mut state, &mut runtime, &tx, KeyCode::Char('q')));
        assert!(state.leave.is_some());
        assert!(press(&mut state, &mut runtime, &tx, KeyCode::Char('k')));

        let mut fresh = AppState::new(&settings, &drafts, 10);
        initialize(&mut fresh, &mut runtime, &tx);
        assert!(press(&mut fresh, &mut runtime, &tx, KeyCode::Char('q')));
    }

    #[test]
    fn ctrl_q_asks_before_leaving_a_dirty_details_page() -> Result<()> {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 10);
        let mut runtime = TestRuntime::new(3);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);
        let ctrl_q = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL);

        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        press(&mut state, &mut runtime, &tx, KeyCode::Char('l'));
        press(&mut state, &mut runtime, &tx, KeyCode::Char('l'));
        press(&mut state, &mut runtime, &tx, KeyCode::Char('l'));
        press(&mut state, &mut runtime, &tx, KeyCode::Char('l'));
        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        let key = state
            .details
            .as_ref()
            .map(|details| details.editor.key().clone())
            .expect("details open");

        assert!(!handle_key_event(&mut state, &mut runtime, &tx, ctrl_q));
        assert!(state.leave.is_some());
        assert!(!handle_key_event(&mut state, &mut runtime, &tx, ctrl_q));
        assert!(state.leave.is_some());

        assert!(!press(&mut state, &mut runtime, &tx, KeyCode::Char('s')));
        assert_eq!(state.page(), PageKind::ScoreDetails);

        assert!(!handle_key_event(&mut state, &mut runtime, &tx, ctrl_q));
        assert!(press(&mut state, &mut runtime, &tx, KeyCode::Char('k')));
        assert!(drafts.get(key.as_str())?.is_some());

        let mut fresh = AppState::new(&settings, &drafts, 10);
        initialize(&mut fresh, &mut runtime, &tx);
        assert!(handle_key_event(&mut fresh, &mut runtime, &tx, ctrl_q));
        Ok(())
    }

    #[test]
    fn save_reports_invalid_rows_without_calling_the_backend() -> Result<()> {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 10);
        let mut runtime = TestRuntime::new(3);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);
        press(&mut state, &mut runtime, &tx, KeyCode::Enter);

        press(&mut state, &mut runtime, &tx, KeyCode::Char('S'));
        assert_eq!(state.status(), Some("nothing to save"));

        press(&mut state, &mut runtime, &tx, KeyCode::Char('n'));
        let blank = state.details_form().expect("details open").rules.len() - 1;
        press(&mut state, &mut runtime, &tx, KeyCode::Char('S'));
        assert_eq!(state.status(), Some("every score rule needs a label"));
        assert!(state.details.as_ref().is_some_and(|details| details.invalid_rows.contains(&blank)));
        assert_eq!(runtime.detail_saves, 0);

        press(&mut state, &mut runtime, &tx, KeyCode::Char('d'));
        assert_eq!(state.status(), Some("no changes left to save"));

        press(&mut state, &mut runtime, &tx, KeyCode::Char('g'));
        for _ in 0..blank {
            press(&mut state, &mut runtime, &tx, KeyCode::Char('k'));
        }
        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        for _ in 0..20 {
            press(&mut state, &mut runtime, &tx, KeyCode::Backspace);
        }
        type_text(&mut state, &mut runtime, &tx, "Weak");
        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        press(&mut state, &mut runtime, &tx, KeyCode::Char('S'));

        assert_eq!(state.status(), Some("saved"));
        assert_eq!(runtime.detail_saves, 1);
        let saved = runtime.backend.score_details(ScoreTypeId::new(1))?;
        assert_eq!(saved.rules[0].label, "Weak");
        let key = DraftKey::score_details(ScoreTypeId::new(1));
        assert!(drafts.get(key.as_str())?.is_none());
        Ok(())
    }

    #[test]
    fn invalid_rule_numbers_are_rejected_in_place() {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 10);
        let mut runtime = TestRuntime::new(3);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);
        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        let before = state.details_form().expect("details open").clone();

        press(&mut state, &mut runtime, &tx, KeyCode::Char('l'));
        press(&mut state, &mut runtime, &tx, KeyCode::Enter);
        type_text(&mut state, &mut runtime, &tx, ".5");
        press(&mut state, &mut runtime, &tx, KeyCode::Enter);

        assert!(
            state
                .status()
                .is_some_and(|status| status.contains("not a valid score rule"))
        );
        assert_eq!(state.details_form(), Some(&before));
    }

    #[test]
    fn list_changes_are_published() {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 10);
        let changes = state.subscribe();
        let mut runtime = TestRuntime::new(2);
        let tx = internal_tx();

        initialize(&mut state, &mut runtime, &tx);
        let seen: Vec<StateChanged> = changes.try_iter().collect();
        assert!(seen.contains(&StateChanged::List));
        assert!(seen.contains(&StateChanged::Table));

        press(&mut state, &mut runtime, &tx, KeyCode::Char(' '));
        assert_eq!(changes.try_iter().last(), Some(StateChanged::Table));
        assert_eq!(state.status(), Some("1 selected"));
    }

    #[test]
    fn header_labels_number_multi_column_sorts() {
        let name = ColumnDescriptor::new("Name", "name", ColumnKind::Text).sortable();
        let weight = ColumnDescriptor::new("Weight", "weight", ColumnKind::Number).sortable();
        let mut sort = SortState::default();
        sort.cycle("name");
        assert_eq!(header_label(&name, &sort), "Name ▲");

        sort.cycle("weight");
        sort.cycle("weight");
        assert_eq!(header_label(&name, &sort), "Name ▲1");
        assert_eq!(header_label(&weight, &sort), "Weight ▼2");
    }

    #[test]
    fn leave_prompt_lists_every_choice_with_its_key() {
        let text = leave_prompt_text(&LeavePrompt::default());
        assert!(text.contains("s  stay on this page"));
        assert!(text.contains("k  leave and keep the draft"));
        assert!(text.contains("d  leave and discard the draft"));
    }

    #[test]
    fn list_title_summarizes_filter_and_paging() {
        let settings = MemoryStore::new();
        let drafts = MemoryStore::new();
        let mut state = AppState::new(&settings, &drafts, 2);
        let mut runtime = TestRuntime::new(3);
        let tx = internal_tx();
        initialize(&mut state, &mut runtime, &tx);

        let title = list_title(&state.score_types.list, &state.score_types.table);
        assert!(title.starts_with("score types 2/3"), "title: {title}");
        assert!(title.contains(" more"));
        assert!(title.contains("active:"));
    }

    #[test]
    fn dropdown_anchor_accounts_for_preceding_columns() {
        let columns = score_type_columns();
        let bounds = cell_bounds(&columns, super::Cursor { row: 2, col: 1 });
        assert_eq!(bounds.x, 4 + 23);
        assert_eq!(bounds.y, 3);
        assert_eq!(bounds.width, 12);
    }
}
