//! # Table Presentation
//!
//! Turns rows plus column descriptors into a [`RenderedView`] for the
//! terminal, either as a table or as cards over the same normalized cells.
//!
//! Paging runs in one of two modes. In client mode the adapter filters, sorts
//! and slices the full row set itself. In server mode the rows are already one
//! server page; search and paging actions are handed back to the caller as
//! [`TableEffect::Server`] and no local slicing happens.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

type Accessor<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;
type SortKey<T> = Arc<dyn Fn(&T) -> SortValue + Send + Sync>;

/// Typed value a column sorts on, read from the row rather than its cell text.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    /// Sorts before every present value.
    Missing,
    Number(f64),
    Text(String),
}

impl SortValue {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
            (SortValue::Text(a), SortValue::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortValue::Missing => 0,
            SortValue::Number(_) => 1,
            SortValue::Text(_) => 2,
        }
    }
}

impl From<f64> for SortValue {
    fn from(value: f64) -> Self {
        SortValue::Number(value)
    }
}

impl From<u32> for SortValue {
    fn from(value: u32) -> Self {
        SortValue::Number(f64::from(value))
    }
}

impl From<String> for SortValue {
    fn from(value: String) -> Self {
        SortValue::Text(value)
    }
}

impl From<Option<DateTime<Utc>>> for SortValue {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        match value {
            Some(at) => SortValue::Number(at.timestamp_millis() as f64),
            None => SortValue::Missing,
        }
    }
}

/// How one column reads its cell from a row.
pub struct Column<T> {
    pub id: &'static str,
    pub header: &'static str,
    accessor: Accessor<T>,
    sort_key: Option<SortKey<T>>,
    pub sortable: bool,
    /// Participates in the global filter.
    pub filterable: bool,
}

impl<T> Clone for Column<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            header: self.header,
            accessor: Arc::clone(&self.accessor),
            sort_key: self.sort_key.clone(),
            sortable: self.sortable,
            filterable: self.filterable,
        }
    }
}

impl<T> Column<T> {
    pub fn new<F>(id: &'static str, header: &'static str, accessor: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        Self {
            id,
            header,
            accessor: Arc::new(accessor),
            sort_key: None,
            sortable: false,
            filterable: false,
        }
    }

    /// Sortable on the cell text, case-insensitively.
    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    /// Sortable on a typed key, for numbers and dates whose cell text does not
    /// order correctly.
    pub fn sort_by<K, F>(mut self, key: F) -> Self
    where
        K: Into<SortValue>,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        self.sort_key = Some(Arc::new(move |row: &T| key(row).into()));
        self.sortable = true;
        self
    }

    pub fn sort_value(&self, row: &T) -> SortValue {
        match &self.sort_key {
            Some(key) => key(row),
            None => SortValue::Text(self.value(row)),
        }
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub fn value(&self, row: &T) -> String {
        (self.accessor)(row)
    }
}

/// Rows that know how to present themselves.
pub trait TableRow {
    fn columns() -> Vec<Column<Self>>
    where
        Self: Sized;

    /// Heading used by the card presentation.
    fn card_title(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Presentation {
    #[default]
    Table,
    Cards,
}

/// Paging state owned by the server-backed list controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerSide {
    pub search_query: String,
    pub has_more: bool,
    pub can_go_prev: bool,
    pub is_first_page: bool,
    pub is_loading: bool,
    pub current_page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagingMode {
    Client { page_size: usize },
    Server(ServerSide),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableAction {
    SetFilter(String),
    SortBy(String),
    NextPage,
    PrevPage,
    FirstPage,
}

/// Requests the adapter hands to the owner of server-side paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAction {
    Search(String),
    NextPage,
    PrevPage,
    FirstPage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEffect {
    /// Local view state changed; render again.
    Updated,
    /// Route to the list controller.
    Server(ServerAction),
    /// Action not applicable in the current state.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortState {
    pub column: String,
    pub descending: bool,
}

pub struct TableAdapter<'a, T> {
    rows: &'a [T],
    columns: Vec<Column<T>>,
    empty_state: String,
    filter_slot: Option<String>,
    mode: PagingMode,
    presentation: Presentation,
    global_filter: String,
    sort: Option<SortState>,
    page_index: usize,
}

impl<'a, T> TableAdapter<'a, T> {
    pub fn new(rows: &'a [T], columns: Vec<Column<T>>) -> Self {
        Self {
            rows,
            columns,
            empty_state: "No results.".to_string(),
            filter_slot: None,
            mode: PagingMode::Client { page_size: 10 },
            presentation: Presentation::Table,
            global_filter: String::new(),
            sort: None,
            page_index: 0,
        }
    }

    pub fn with_empty_state<S: Into<String>>(mut self, empty_state: S) -> Self {
        self.empty_state = empty_state.into();
        self
    }

    /// Caller-rendered filter controls shown above the rows.
    pub fn with_filter_slot<S: Into<String>>(mut self, slot: S) -> Self {
        self.filter_slot = Some(slot.into());
        self
    }

    pub fn with_presentation(mut self, presentation: Presentation) -> Self {
        self.presentation = presentation;
        self
    }

    pub fn client_side(mut self, page_size: usize) -> Self {
        self.mode = PagingMode::Client {
            page_size: page_size.max(1),
        };
        self
    }

    pub fn server_side(mut self, server: ServerSide) -> Self {
        self.mode = PagingMode::Server(server);
        self
    }

    pub fn mode(&self) -> &PagingMode {
        &self.mode
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn sort_state(&self) -> Option<&SortState> {
        self.sort.as_ref()
    }

    pub fn handle(&mut self, action: TableAction) -> TableEffect {
        match action {
            TableAction::SortBy(column) => self.toggle_sort(&column),
            TableAction::SetFilter(text) => match &self.mode {
                PagingMode::Server(_) => TableEffect::Server(ServerAction::Search(text)),
                PagingMode::Client { .. } => {
                    self.global_filter = text;
                    self.page_index = 0;
                    TableEffect::Updated
                }
            },
            TableAction::NextPage => match &self.mode {
                PagingMode::Server(s) if s.has_more && !s.is_loading => {
                    TableEffect::Server(ServerAction::NextPage)
                }
                PagingMode::Client { .. } if self.page_index + 1 < self.page_count() => {
                    self.page_index += 1;
                    TableEffect::Updated
                }
                _ => TableEffect::Ignored,
            },
            TableAction::PrevPage => match &self.mode {
                PagingMode::Server(s) if s.can_go_prev && !s.is_loading => {
                    TableEffect::Server(ServerAction::PrevPage)
                }
                PagingMode::Client { .. } if self.page_index > 0 => {
                    self.page_index -= 1;
                    TableEffect::Updated
                }
                _ => TableEffect::Ignored,
            },
            TableAction::FirstPage => match &self.mode {
                PagingMode::Server(s) if !s.is_first_page && !s.is_loading => {
                    TableEffect::Server(ServerAction::FirstPage)
                }
                PagingMode::Client { .. } if self.page_index > 0 => {
                    self.page_index = 0;
                    TableEffect::Updated
                }
                _ => TableEffect::Ignored,
            },
        }
    }

    fn toggle_sort(&mut self, column: &str) -> TableEffect {
        if !self.columns.iter().any(|c| c.id == column && c.sortable) {
            return TableEffect::Ignored;
        }
        self.sort = match self.sort.take() {
            Some(current) if current.column == column && !current.descending => Some(SortState {
                column: current.column,
                descending: true,
            }),
            Some(current) if current.column == column => None,
            _ => Some(SortState {
                column: column.to_string(),
                descending: false,
            }),
        };
        TableEffect::Updated
    }

    /// Rows matching the global filter: case-insensitive substring over the filterable columns.
    fn matches(&self, row: &T) -> bool {
        if self.global_filter.trim().is_empty() {
            return true;
        }
        let needle = self.global_filter.trim().to_lowercase();
        self.columns
            .iter()
            .filter(|c| c.filterable)
            .any(|c| c.value(row).to_lowercase().contains(&needle))
    }

    fn visible_rows(&self) -> Vec<&'a T> {
        let mut rows: Vec<&'a T> = match &self.mode {
            PagingMode::Server(_) => self.rows.iter().collect(),
            PagingMode::Client { .. } => self.rows.iter().filter(|r| self.matches(r)).collect(),
        };

        if let Some(sort) = &self.sort
            && let Some(column) = self.columns.iter().find(|c| c.id == sort.column)
        {
            rows.sort_by(|a, b| {
                let ord = column.sort_value(a).compare(&column.sort_value(b));
                if sort.descending { ord.reverse() } else { ord }
            });
        }
        rows
    }

    fn filtered_len(&self) -> usize {
        self.rows.iter().filter(|r| self.matches(r)).count()
    }

    pub fn page_count(&self) -> usize {
        match &self.mode {
            PagingMode::Server(_) => 1,
            PagingMode::Client { page_size } => self.filtered_len().div_ceil(*page_size).max(1),
        }
    }

    pub fn render(&self) -> RenderedView {
        let search = match &self.mode {
            PagingMode::Server(s) => s.search_query.clone(),
            PagingMode::Client { .. } => self.global_filter.clone(),
        };

        if self.rows.is_empty() {
            return RenderedView {
                filter_slot: self.filter_slot.clone(),
                search,
                body: RenderedBody::Empty(self.empty_state.clone()),
                controls: None,
            };
        }

        let rows = self.visible_rows();
        let (page, controls) = match &self.mode {
            PagingMode::Server(s) => {
                let label = if s.is_loading {
                    "Loading...".to_string()
                } else {
                    format!("Showing {} rows", s.current_page_size.max(rows.len()))
                };
                (
                    rows,
                    PaginationControls {
                        can_prev: s.can_go_prev,
                        can_next: s.has_more,
                        can_first: !s.is_first_page,
                        disabled: s.is_loading,
                        label,
                    },
                )
            }
            PagingMode::Client { page_size } => {
                let page_count = self.page_count();
                let index = self.page_index.min(page_count - 1);
                let page: Vec<&T> = rows
                    .into_iter()
                    .skip(index * page_size)
                    .take(*page_size)
                    .collect();
                (
                    page,
                    PaginationControls {
                        can_prev: index > 0,
                        can_next: index + 1 < page_count,
                        can_first: index > 0,
                        disabled: false,
                        label: format!("Page {} of {}", index + 1, page_count),
                    },
                )
            }
        };

        let body = if page.is_empty() {
            RenderedBody::Empty("No matching results.".to_string())
        } else {
            match self.presentation {
                Presentation::Table => RenderedBody::Table {
                    headers: self.columns.iter().map(|c| c.header.to_string()).collect(),
                    rows: page
                        .iter()
                        .map(|row| self.columns.iter().map(|c| c.value(row)).collect())
                        .collect(),
                },
                Presentation::Cards => RenderedBody::Cards(
                    page.iter()
                        .map(|row| Card {
                            fields: self
                                .columns
                                .iter()
                                .map(|c| (c.header.to_string(), c.value(row)))
                                .collect(),
                            title: None,
                        })
                        .collect(),
                ),
            }
        };

        RenderedView {
            filter_slot: self.filter_slot.clone(),
            search,
            body,
            controls: Some(controls),
        }
    }
}

impl<T: TableRow> TableAdapter<'_, T> {
    /// Card view with titles taken from the row type.
    pub fn render_titled(&self) -> RenderedView {
        let mut view = self.render();
        if let RenderedBody::Cards(cards) = &mut view.body {
            let titles = self.visible_titles();
            for (card, title) in cards.iter_mut().zip(titles) {
                card.title = Some(title);
            }
        }
        view
    }

    fn visible_titles(&self) -> Vec<String> {
        let rows = self.visible_rows();
        let skip = match &self.mode {
            PagingMode::Client { page_size } => {
                self.page_index.min(self.page_count() - 1) * page_size
            }
            PagingMode::Server(_) => 0,
        };
        rows.into_iter().skip(skip).map(TableRow::card_title).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationControls {
    pub can_prev: bool,
    pub can_next: bool,
    pub can_first: bool,
    /// Every control is disabled while a fetch is in flight.
    pub disabled: bool,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub title: Option<String>,
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedBody {
    Empty(String),
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Cards(Vec<Card>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedView {
    pub filter_slot: Option<String>,
    pub search: String,
    pub body: RenderedBody,
    pub controls: Option<PaginationControls>,
}

impl fmt::Display for RenderedView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(slot) = &self.filter_slot {
            writeln!(f, "{slot}")?;
        }
        if !self.search.is_empty() {
            writeln!(f, "search: {}", self.search)?;
        }

        match &self.body {
            RenderedBody::Empty(message) => writeln!(f, "{message}")?,
            RenderedBody::Table { headers, rows } => write_table(f, headers, rows)?,
            RenderedBody::Cards(cards) => {
                for card in cards {
                    if let Some(title) = &card.title {
                        writeln!(f, "== {title}")?;
                    }
                    let pad = card.fields.iter().map(|(k, _)| width(k)).max().unwrap_or(0);
                    for (key, value) in &card.fields {
                        writeln!(f, "  {key:<pad$}  {value}")?;
                    }
                    writeln!(f)?;
                }
            }
        }

        if let Some(controls) = &self.controls {
            let mark = |enabled: bool| if enabled && !controls.disabled { "" } else { "x" };
            writeln!(
                f,
                "[first{}] [prev{}] [next{}]  {}",
                mark(controls.can_first),
                mark(controls.can_prev),
                mark(controls.can_next),
                controls.label
            )?;
        }
        Ok(())
    }
}

fn width(s: &str) -> usize {
    s.chars().count()
}

fn write_table(
    f: &mut fmt::Formatter<'_>,
    headers: &[String],
    rows: &[Vec<String>],
) -> fmt::Result {
    let mut widths: Vec<usize> = headers.iter().map(|h| width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(width(cell));
            }
        }
    }

    write_row(f, headers, &widths)?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(f, "{}", rule.join("-+-"))?;
    for row in rows {
        write_row(f, row, &widths)?;
    }
    Ok(())
}

fn write_row(f: &mut fmt::Formatter<'_>, cells: &[String], widths: &[usize]) -> fmt::Result {
    let rendered: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &w)| format!("{cell:<w$}"))
        .collect();
    writeln!(f, "{}", rendered.join(" | ").trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Member {
        name: &'static str,
        email: &'static str,
        level: u32,
    }

    impl TableRow for Member {
        fn columns() -> Vec<Column<Self>> {
            vec![
                Column::new("name", "Name", |m: &Member| m.name.to_string())
                    .sortable()
                    .filterable(),
                Column::new("email", "Email", |m: &Member| m.email.to_string()).filterable(),
                Column::new("level", "Level", |m: &Member| m.level.to_string())
                    .sort_by(|m: &Member| m.level),
            ]
        }

        fn card_title(&self) -> String {
            self.name.to_string()
        }
    }

    fn member(name: &'static str, email: &'static str, level: u32) -> Member {
        Member { name, email, level }
    }

    fn members() -> Vec<Member> {
        vec![
            member("Alice", "alice@example.com", 3),
            member("bob", "bob@example.com", 10),
            member("Carol", "carol@JOHN.dev", 1),
            member("Johnny", "j@example.com", 2),
        ]
    }

    #[test]
    fn empty_rows_render_empty_state_without_controls() {
        let rows: Vec<Member> = Vec::new();
        let view = TableAdapter::new(&rows, Member::columns())
            .with_empty_state("No team members yet")
            .render();
        assert_eq!(view.body, RenderedBody::Empty("No team members yet".to_string()));
        assert!(view.controls.is_none());

        let server = TableAdapter::new(&rows, Member::columns())
            .server_side(ServerSide {
                has_more: true,
                ..ServerSide::default()
            })
            .render();
        assert!(server.controls.is_none());
        assert!(!server.to_string().contains("Name"));
    }

    #[test]
    fn global_filter_is_case_insensitive_over_filterable_columns() {
        let rows = members();
        let mut table = TableAdapter::new(&rows, Member::columns()).client_side(10);
        assert_eq!(table.handle(TableAction::SetFilter("JOHN".into())), TableEffect::Updated);

        let RenderedBody::Table { rows: cells, .. } = table.render().body else {
            panic!("expected table");
        };
        let names: Vec<&str> = cells.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(names, vec!["Carol", "Johnny"]);

        // level is not filterable
        table.handle(TableAction::SetFilter("10".into()));
        assert_eq!(
            table.render().body,
            RenderedBody::Empty("No matching results.".to_string())
        );
    }

    #[test]
    fn client_paging_slices_rows() {
        let rows = members();
        let mut table = TableAdapter::new(&rows, Member::columns()).client_side(3);
        let first = table.render();
        assert_eq!(first.controls.as_ref().unwrap().label, "Page 1 of 2");
        assert_eq!(table.handle(TableAction::PrevPage), TableEffect::Ignored);

        assert_eq!(table.handle(TableAction::NextPage), TableEffect::Updated);
        let RenderedBody::Table { rows: cells, .. } = table.render().body else {
            panic!("expected table");
        };
        assert_eq!(cells.len(), 1);
        assert_eq!(table.handle(TableAction::NextPage), TableEffect::Ignored);
        assert_eq!(table.handle(TableAction::FirstPage), TableEffect::Updated);
        assert_eq!(table.page_index(), 0);
    }

    #[test]
    fn sort_toggles_and_compares_numbers() {
        let rows = members();
        let mut table = TableAdapter::new(&rows, Member::columns()).client_side(10);
        table.handle(TableAction::SortBy("level".into()));
        let RenderedBody::Table { rows: cells, .. } = table.render().body else {
            panic!("expected table");
        };
        let levels: Vec<&str> = cells.iter().map(|r| r[2].as_str()).collect();
        assert_eq!(levels, vec!["1", "2", "3", "10"]);

        table.handle(TableAction::SortBy("level".into()));
        assert!(table.sort_state().unwrap().descending);
        table.handle(TableAction::SortBy("level".into()));
        assert!(table.sort_state().is_none());

        assert_eq!(table.handle(TableAction::SortBy("email".into())), TableEffect::Ignored);
    }

    #[test]
    fn text_sort_ignores_case_and_missing_values_sort_first() {
        let rows = members();
        let mut table = TableAdapter::new(&rows, Member::columns()).client_side(10);
        table.handle(TableAction::SortBy("name".into()));
        let RenderedBody::Table { rows: cells, .. } = table.render().body else {
            panic!("expected table");
        };
        let names: Vec<&str> = cells.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(names, vec!["Alice", "bob", "Carol", "Johnny"]);

        assert_eq!(SortValue::Missing.compare(&SortValue::from(0.0)), Ordering::Less);
        assert_eq!(SortValue::from(None::<DateTime<Utc>>), SortValue::Missing);
    }

    #[test]
    fn server_mode_delegates_and_does_not_slice() {
        let rows = members();
        let server = ServerSide {
            search_query: "jo".into(),
            has_more: true,
            can_go_prev: false,
            is_first_page: true,
            is_loading: false,
            current_page_size: 4,
        };
        let mut table = TableAdapter::new(&rows, Member::columns())
            .client_side(2)
            .server_side(server.clone());

        let RenderedBody::Table { rows: cells, .. } = table.render().body else {
            panic!("expected table");
        };
        assert_eq!(cells.len(), 4);

        assert_eq!(
            table.handle(TableAction::SetFilter("john".into())),
            TableEffect::Server(ServerAction::Search("john".into()))
        );
        assert_eq!(
            table.handle(TableAction::NextPage),
            TableEffect::Server(ServerAction::NextPage)
        );
        assert_eq!(table.handle(TableAction::PrevPage), TableEffect::Ignored);
        assert_eq!(table.handle(TableAction::FirstPage), TableEffect::Ignored);

        let mut loading = TableAdapter::new(&rows, Member::columns()).server_side(ServerSide {
            is_loading: true,
            ..server
        });
        assert_eq!(loading.handle(TableAction::NextPage), TableEffect::Ignored);
        assert!(loading.render().controls.unwrap().disabled);
    }

    #[test]
    fn cards_share_cells_with_table() {
        let rows = members();
        let table = TableAdapter::new(&rows, Member::columns())
            .client_side(2)
            .with_presentation(Presentation::Cards);
        let view = table.render_titled();
        let RenderedBody::Cards(cards) = &view.body else {
            panic!("expected cards");
        };
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].title.as_deref(), Some("Alice"));
        assert_eq!(cards[1].fields[1], ("Email".to_string(), "bob@example.com".to_string()));
    }

    #[test]
    fn display_renders_aligned_table() {
        let rows = members();
        let text = TableAdapter::new(&rows, Member::columns())
            .client_side(2)
            .with_filter_slot("status: all")
            .render()
            .to_string();
        assert!(text.starts_with("status: all\n"));
        assert!(text.contains("Name  | Email"));
        assert!(text.contains("Page 1 of 2"));
        assert!(text.contains("[prevx]"));
    }
}
