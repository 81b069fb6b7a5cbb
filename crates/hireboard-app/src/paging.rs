// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::Month;

use crate::ids::RowId;
use crate::model::{PagedEnvelope, Row, SortState};
use crate::store::{KeyValueStore, get_json, put_json};
use crate::table::TableCommand;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Search, period and sort a list page is filtered by.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilter {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub month: Option<u8>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub sort: SortState,
}

impl ListFilter {
    pub fn month(&self) -> Option<Month> {
        self.month.and_then(|month| Month::try_from(month).ok())
    }
}

/// Stored under the page's settings key as one flat object:
/// `{search, month, year, sort, pageSize, clickedRowIds}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSettings {
    #[serde(flatten)]
    pub filter: ListFilter,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub clicked_row_ids: Vec<RowId>,
}

pub type RowTransform = fn(Row) -> Row;

#[derive(Debug, Clone)]
pub struct ListConfig {
    pub settings_key: String,
    pub initial_filter: ListFilter,
    pub page_size: u32,
    pub transform: RowTransform,
}

impl ListConfig {
    pub fn new(settings_key: &str) -> Self {
        Self {
            settings_key: settings_key.to_owned(),
            initial_filter: ListFilter::default(),
            page_size: DEFAULT_PAGE_SIZE,
            transform: |row| row,
        }
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn initial_filter(mut self, filter: ListFilter) -> Self {
        self.initial_filter = filter;
        self
    }

    pub fn transform(mut self, transform: RowTransform) -> Self {
        self.transform = transform;
        self
    }
}

/// Identifies one issued page request. Only the most recently issued
/// ticket may change the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    seq: u64,
    page: u32,
}

impl RequestTicket {
    pub const fn page(self) -> u32 {
        self.page
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub page: u32,
    pub page_size: u32,
    pub search: Option<String>,
    pub sort_fields: Option<String>,
    pub month: Option<u8>,
    pub year: Option<i32>,
}

impl PageQuery {
    /// Query-string pairs in the backend's parameter names.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(sort_fields) = &self.sort_fields {
            pairs.push(("SortFields", sort_fields.clone()));
        }
        if let Some(month) = self.month {
            pairs.push(("Month", month.to_string()));
        }
        if let Some(year) = self.year {
            pairs.push(("Year", year.to_string()));
        }
        pairs
    }
}

/// Backend side of a paged list.
pub trait RowSource {
    fn fetch_rows(&self, query: &PageQuery) -> Result<PagedEnvelope<Row>>;
}

/// Paging, filtering and request sequencing for one list page. The table
/// owns the rows; the controller produces the commands that fill it.
#[derive(Debug)]
pub struct PagedListController {
    config: ListConfig,
    filter: ListFilter,
    page_size: u32,
    loaded_page: u32,
    has_next_page: bool,
    total_items: u64,
    group_counts: BTreeMap<String, u64>,
    next_seq: u64,
    in_flight: Option<RequestTicket>,
    reset_key: u64,
    last_error: Option<String>,
}

impl PagedListController {
    pub fn new(config: ListConfig) -> Self {
        Self {
            filter: config.initial_filter.clone(),
            page_size: config.page_size,
            config,
            loaded_page: 0,
            has_next_page: false,
            total_items: 0,
            group_counts: BTreeMap::new(),
            next_seq: 0,
            in_flight: None,
            reset_key: 0,
            last_error: None,
        }
    }

    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    pub fn filter(&self) -> &ListFilter {
        &self.filter
    }

    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    pub const fn loaded_page(&self) -> u32 {
        self.loaded_page
    }

    pub const fn has_next_page(&self) -> bool {
        self.has_next_page
    }

    pub const fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn group_counts(&self) -> &BTreeMap<String, u64> {
        &self.group_counts
    }

    pub const fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Loads persisted settings, falling back to the initial filter when
    /// nothing usable is stored. A stored page size replaces the configured
    /// one. Returns the remembered clicked rows.
    pub fn restore(&mut self, store: &dyn KeyValueStore) -> Result<Vec<RowId>> {
        let key = self.config.settings_key.clone();
        match get_json::<ListSettings>(store, &key) {
            Ok(Some(settings)) => {
                self.filter = settings.filter;
                self.filter.sort = std::mem::take(&mut self.filter.sort).normalized();
                self.page_size = settings
                    .page_size
                    .filter(|size| *size > 0)
                    .unwrap_or(self.config.page_size);
                Ok(settings.clicked_row_ids)
            }
            Ok(None) => {
                self.filter = self.config.initial_filter.clone();
                self.page_size = self.config.page_size;
                Ok(Vec::new())
            }
            Err(error) => {
                log::warn!("ignoring list settings {key}: {error:#}");
                store.remove(&key)?;
                self.filter = self.config.initial_filter.clone();
                self.page_size = self.config.page_size;
                Ok(Vec::new())
            }
        }
    }

    pub fn persist(&self, store: &dyn KeyValueStore, clicked_ids: &[RowId]) -> Result<()> {
        let settings = ListSettings {
            filter: self.filter.clone(),
            page_size: Some(self.page_size),
            clicked_row_ids: clicked_ids.to_vec(),
        };
        put_json(store, &self.config.settings_key, &settings)
    }

    /// Returns whether the filter changed; callers then request page one.
    pub fn set_search(&mut self, search: &str) -> bool {
        let search = search.trim();
        if self.filter.search == search {
            return false;
        }
        search.clone_into(&mut self.filter.search);
        true
    }

    pub fn set_period(&mut self, month: Option<Month>, year: Option<i32>) -> bool {
        let month = month.map(u8::from);
        if self.filter.month == month && self.filter.year == year {
            return false;
        }
        self.filter.month = month;
        self.filter.year = year;
        true
    }

    pub fn apply_sort(&mut self, sort: SortState) -> bool {
        let sort = sort.normalized();
        if self.filter.sort == sort {
            return false;
        }
        self.filter.sort = sort;
        true
    }

    pub fn request_first_page(&mut self) -> RequestTicket {
        self.issue(1)
    }

    /// `None` when the last page is loaded or a request is outstanding.
    pub fn request_next_page(&mut self) -> Option<RequestTicket> {
        if !self.has_next_page || self.in_flight.is_some() {
            return None;
        }
        Some(self.issue(self.loaded_page + 1))
    }

    fn issue(&mut self, page: u32) -> RequestTicket {
        self.next_seq += 1;
        let ticket = RequestTicket {
            seq: self.next_seq,
            page,
        };
        self.in_flight = Some(ticket);
        ticket
    }

    fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.seq == self.next_seq
    }

    pub fn query(&self, ticket: RequestTicket) -> PageQuery {
        let search = self.filter.search.trim();
        PageQuery {
            page: ticket.page,
            page_size: self.page_size,
            search: (!search.is_empty()).then(|| search.to_owned()),
            sort_fields: self.filter.sort.sort_fields(),
            month: self.filter.month,
            year: self.filter.year,
        }
    }

    /// Applies a response. Page one replaces the table rows under a new
    /// reset key, later pages append. Stale responses yield `None`.
    pub fn accept(
        &mut self,
        ticket: RequestTicket,
        envelope: PagedEnvelope<Row>,
    ) -> Option<TableCommand> {
        if !self.is_current(ticket) {
            log::debug!(
                "dropping stale page {} for {}",
                ticket.page,
                self.config.settings_key
            );
            return None;
        }
        self.in_flight = None;
        self.last_error = None;
        self.loaded_page = ticket.page;
        self.has_next_page = envelope.has_next_page;
        self.total_items = envelope.total_items;
        if let Some(counts) = envelope.group_counts.or(envelope.status_group_count) {
            self.group_counts = counts;
        } else if ticket.page == 1 {
            self.group_counts.clear();
        }

        let rows = envelope
            .items
            .into_iter()
            .map(self.config.transform)
            .collect();
        if ticket.page == 1 {
            self.reset_key += 1;
            Some(TableCommand::SetRows {
                rows,
                reset_key: self.reset_key,
            })
        } else {
            Some(TableCommand::AppendRows(rows))
        }
    }

    /// Records a failed fetch. Rows already shown stay; nothing is retried.
    pub fn fail(&mut self, ticket: RequestTicket, error: &anyhow::Error) {
        if !self.is_current(ticket) {
            return;
        }
        log::warn!(
            "loading page {} of {} failed: {error:#}",
            ticket.page,
            self.config.settings_key
        );
        self.in_flight = None;
        self.last_error = Some(format!("{error:#}"));
    }

    /// Issues, fetches and applies one request against `source`.
    pub fn load(
        &mut self,
        source: &dyn RowSource,
        ticket: RequestTicket,
    ) -> Option<TableCommand> {
        let query = self.query(ticket);
        match source.fetch_rows(&query) {
            Ok(envelope) => self.accept(ticket, envelope),
            Err(error) => {
                self.fail(ticket, &error);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ListConfig, ListFilter, PageQuery, PagedListController, RowSource};
    use crate::ids::RowId;
    use crate::model::{PagedEnvelope, Row, SortState};
    use crate::store::{KeyValueStore, MemoryStore};
    use crate::table::TableCommand;
    use anyhow::{Result, anyhow};
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use time::Month;

    const KEY: &str = "benefitsFiterSettings";

    fn envelope(ids: &[i64], page: u32, has_next_page: bool) -> PagedEnvelope<Row> {
        PagedEnvelope {
            items: ids.iter().map(|id| Row::new().with("id", *id)).collect(),
            page,
            page_size: 2,
            total_items: 5,
            total_pages: 3,
            has_next_page,
            has_previous_page: page > 1,
            status_group_count: None,
            group_counts: None,
        }
    }

    fn controller() -> PagedListController {
        PagedListController::new(ListConfig::new(KEY).page_size(2))
    }

    fn row_ids(command: &TableCommand) -> Vec<i64> {
        let rows = match command {
            TableCommand::SetRows { rows, .. } | TableCommand::AppendRows(rows) => rows,
            _ => return Vec::new(),
        };
        rows.iter().filter_map(|row| row.id()).map(RowId::get).collect()
    }

    #[test]
    fn query_carries_filter_and_sort() {
        let mut list = controller();
        list.set_search("  nurse ");
        list.set_period(Some(Month::March), Some(2026));
        let mut sort = SortState::default();
        sort.cycle("score");
        sort.cycle("name");
        sort.cycle("name");
        list.apply_sort(sort);

        let ticket = list.request_first_page();
        let query = list.query(ticket);
        assert_eq!(
            query.pairs(),
            vec![
                ("page", "1".to_owned()),
                ("pageSize", "2".to_owned()),
                ("search", "nurse".to_owned()),
                ("SortFields", "score asc,name desc".to_owned()),
                ("Month", "3".to_owned()),
                ("Year", "2026".to_owned()),
            ]
        );
        assert_eq!(list.filter().month(), Some(Month::March));
    }

    #[test]
    fn empty_filter_sends_only_paging() {
        let mut list = controller();
        let ticket = list.request_first_page();
        assert_eq!(
            list.query(ticket),
            PageQuery {
                page: 1,
                page_size: 2,
                search: None,
                sort_fields: None,
                month: None,
                year: None,
            }
        );
    }

    #[test]
    fn first_page_replaces_and_later_pages_append() {
        let mut list = controller();
        let first = list.request_first_page();
        let command = list.accept(first, envelope(&[1, 2], 1, true));
        assert!(matches!(
            command,
            Some(TableCommand::SetRows { reset_key: 1, .. })
        ));

        let next = list.request_next_page().expect("next page available");
        assert_eq!(next.page(), 2);
        let appended = list
            .accept(next, envelope(&[3, 4], 2, false))
            .expect("current ticket applies");
        assert_eq!(row_ids(&appended), vec![3, 4]);
        assert!(matches!(appended, TableCommand::AppendRows(_)));
        assert!(list.request_next_page().is_none());

        let again = list.request_first_page();
        assert!(matches!(
            list.accept(again, envelope(&[1], 1, false)),
            Some(TableCommand::SetRows { reset_key: 2, .. })
        ));
    }

    #[test]
    fn next_page_waits_for_outstanding_request() {
        let mut list = controller();
        let first = list.request_first_page();
        assert!(list.request_next_page().is_none());
        list.accept(first, envelope(&[1, 2], 1, true));
        assert!(list.request_next_page().is_some());
        assert!(list.request_next_page().is_none());
    }

    #[test]
    fn stale_responses_are_dropped() {
        let mut list = controller();
        let old = list.request_first_page();
        list.set_search("engineer");
        let fresh = list.request_first_page();

        let applied = list
            .accept(fresh, envelope(&[7], 1, false))
            .expect("fresh ticket applies");
        assert_eq!(row_ids(&applied), vec![7]);
        assert!(list.accept(old, envelope(&[1, 2], 1, true)).is_none());
        assert!(!list.has_next_page());

        list.fail(old, &anyhow!("timeout"));
        assert_eq!(list.last_error(), None);
    }

    #[test]
    fn failure_keeps_state_and_clears_loading() {
        let mut list = controller();
        let first = list.request_first_page();
        list.accept(first, envelope(&[1, 2], 1, true));

        let next = list.request_next_page().expect("next page available");
        list.fail(next, &anyhow!("connection refused"));
        assert!(!list.is_loading());
        assert_eq!(list.loaded_page(), 1);
        assert!(list.last_error().is_some_and(|error| error.contains("refused")));
        assert!(list.request_next_page().is_some());
    }

    #[test]
    fn transform_and_group_counts_apply() {
        let mut list = PagedListController::new(
            ListConfig::new(KEY).transform(|row| row.with("label", "seen")),
        );
        let ticket = list.request_first_page();
        let mut page = envelope(&[1], 1, false);
        page.status_group_count = Some(BTreeMap::from([("active".to_owned(), 4)]));

        let command = list.accept(ticket, page).expect("current ticket applies");
        let TableCommand::SetRows { rows, .. } = command else {
            panic!("page one should replace rows");
        };
        assert_eq!(rows[0].display("label"), "seen");
        assert_eq!(list.group_counts().get("active"), Some(&4));
        assert_eq!(list.total_items(), 5);
    }

    #[test]
    fn settings_round_trip_through_store() -> Result<()> {
        let store = MemoryStore::new();
        let mut list = controller();
        list.set_search("driver");
        list.set_period(None, Some(2025));
        list.persist(&store, &[RowId::new(4), RowId::new(9)])?;

        let mut restored = controller();
        let clicked = restored.restore(&store)?;
        assert_eq!(clicked, vec![RowId::new(4), RowId::new(9)]);
        assert_eq!(restored.filter().search, "driver");
        assert_eq!(restored.filter().year, Some(2025));
        Ok(())
    }

    #[test]
    fn settings_are_stored_as_one_flat_object() -> Result<()> {
        let store = MemoryStore::new();
        let mut list = controller();
        list.set_search("gym");
        list.set_period(Some(Month::May), Some(2026));
        list.persist(&store, &[RowId::new(7)])?;

        let stored: serde_json::Value =
            serde_json::from_str(&store.get(KEY)?.unwrap_or_default())?;
        assert_eq!(stored["search"], json!("gym"));
        assert_eq!(stored["month"], json!(5));
        assert_eq!(stored["year"], json!(2026));
        assert_eq!(stored["pageSize"], json!(2));
        assert_eq!(stored["clickedRowIds"], json!([7]));
        assert!(stored["sort"].is_object());
        assert!(stored.get("filter").is_none());
        Ok(())
    }

    #[test]
    fn stored_page_size_overrides_configured_one() -> Result<()> {
        let store = MemoryStore::new();
        store.put(KEY, r#"{"search":"","pageSize":7,"clickedRowIds":[]}"#)?;
        let mut list = controller();
        list.restore(&store)?;
        assert_eq!(list.page_size(), 7);
        let ticket = list.request_first_page();
        assert_eq!(list.query(ticket).page_size, 7);

        store.put(KEY, r#"{"pageSize":0}"#)?;
        list.restore(&store)?;
        assert_eq!(list.page_size(), 2);
        Ok(())
    }

    #[test]
    fn corrupt_settings_fall_back_to_initial_filter() -> Result<()> {
        let store = MemoryStore::new();
        store.put(KEY, "{oops")?;
        let initial = ListFilter {
            year: Some(2026),
            ..ListFilter::default()
        };
        let mut list = PagedListController::new(ListConfig::new(KEY).initial_filter(initial));

        assert!(list.restore(&store)?.is_empty());
        assert_eq!(list.filter().year, Some(2026));
        assert!(store.get(KEY)?.is_none());
        Ok(())
    }

    #[test]
    fn unchanged_filters_report_no_change() {
        let mut list = controller();
        assert!(list.set_search("x"));
        assert!(!list.set_search(" x "));
        assert!(!list.set_period(None, None));
        assert!(!list.apply_sort(SortState::default()));
    }

    struct FakeSource {
        queries: RefCell<Vec<PageQuery>>,
        fail: bool,
    }

    impl RowSource for FakeSource {
        fn fetch_rows(&self, query: &PageQuery) -> Result<PagedEnvelope<Row>> {
            self.queries.borrow_mut().push(query.clone());
            if self.fail {
                return Err(anyhow!("backend offline"));
            }
            let rows = vec![Row::new().with("id", json!(query.page))];
            Ok(PagedEnvelope::single_page(rows))
        }
    }

    #[test]
    fn load_runs_a_request_against_a_source() {
        let source = FakeSource {
            queries: RefCell::new(Vec::new()),
            fail: false,
        };
        let mut list = controller();
        let ticket = list.request_first_page();
        let command = list.load(&source, ticket).expect("rows applied");
        assert_eq!(row_ids(&command), vec![1]);
        assert_eq!(source.queries.borrow().len(), 1);

        let failing = FakeSource {
            queries: RefCell::new(Vec::new()),
            fail: true,
        };
        let ticket = list.request_first_page();
        assert!(list.load(&failing, ticket).is_none());
        assert!(list.last_error().is_some());
    }
}
