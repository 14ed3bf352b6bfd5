//! Filter, search, sort and paginate over an ordered slice of rows.
//!
//! The same engine backs the dataset explorer, the result-set preview and the prediction
//! history. Stages always run in this order: status filter, free-text search, sort,
//! pagination. Rows describe themselves through [`ViewRow`].

pub mod rows;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::convert::Infallible;
use std::str::FromStr;

pub const FRAUDULENT: &str = "Fraudulent";
pub const LEGITIMATE: &str = "Legitimate";

pub trait ViewRow {
    type Field: Copy + PartialEq;

    /// Key compared by the status filter.
    fn status(&self) -> &str;

    /// Text the search term is matched against; any hit keeps the row.
    fn search_fields(&self) -> Vec<String>;

    /// Numeric sort key. Missing or unparsable values should read as 0.
    fn sort_value(&self, field: Self::Field) -> f64;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(String),
}

impl StatusFilter {
    pub fn matches(&self, status: &str) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(want) => want == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let lower = s.to_ascii_lowercase();
        Ok(match lower.as_str() {
            "" | "all" => StatusFilter::All,
            "1" | "fraud" | "fraudulent" => StatusFilter::Only(FRAUDULENT.into()),
            "0" | "legit" | "legitimate" => StatusFilter::Only(LEGITIMATE.into()),
            _ => StatusFilter::Only(s.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Column header state: unsorted, or one field in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState<F> {
    active: Option<(F, SortDirection)>,
}

impl<F: Copy + PartialEq> SortState<F> {
    pub fn none() -> Self {
        Self { active: None }
    }

    pub fn by(field: F, direction: SortDirection) -> Self {
        Self {
            active: Some((field, direction)),
        }
    }

    pub fn active(&self) -> Option<(F, SortDirection)> {
        self.active
    }

    /// Repeated selection of one field cycles none → asc → desc → none; a different field
    /// starts over at ascending.
    pub fn toggle(self, field: F) -> Self {
        let active = match self.active {
            Some((f, SortDirection::Asc)) if f == field => Some((field, SortDirection::Desc)),
            Some((f, SortDirection::Desc)) if f == field => None,
            _ => Some((field, SortDirection::Asc)),
        };
        Self { active }
    }
}

impl<F: Copy + PartialEq> Default for SortState<F> {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query<F> {
    pub status: StatusFilter,
    pub search: String,
    pub sort: SortState<F>,
    /// 1-based; the caller keeps it within `[1, total_pages]`.
    pub page: usize,
    pub page_size: usize,
}

impl<F: Copy + PartialEq> Query<F> {
    pub fn new(page_size: usize) -> Self {
        Self {
            status: StatusFilter::All,
            search: String::new(),
            sort: SortState::none(),
            page: 1,
            page_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<'a, T> {
    pub rows: Vec<&'a T>,
    pub page: usize,
    pub total_pages: usize,
    pub total_matching: usize,
}

/// Every matching row, filtered, searched and sorted, before pagination.
pub fn select<'a, T: ViewRow>(records: &'a [T], query: &Query<T::Field>) -> Vec<&'a T> {
    let needle = query.search.to_lowercase();

    let mut rows: Vec<&T> = records
        .iter()
        .filter(|r| query.status.matches(r.status()))
        .filter(|r| {
            needle.is_empty()
                || r.search_fields()
                    .iter()
                    .any(|f| f.to_lowercase().contains(&needle))
        })
        .collect();

    if let Some((field, direction)) = query.sort.active() {
        // sort_by is stable, so ties keep input order in both directions.
        rows.sort_by(|a, b| {
            let ord = a
                .sort_value(field)
                .partial_cmp(&b.sort_value(field))
                .unwrap_or(Ordering::Equal);
            match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
    }

    rows
}

pub fn view<'a, T: ViewRow>(records: &'a [T], query: &Query<T::Field>) -> Page<'a, T> {
    let matching = select(records, query);
    let page_size = query.page_size.max(1);
    let total_matching = matching.len();
    let total_pages = total_pages(total_matching, page_size);

    let start = query.page.saturating_sub(1).saturating_mul(page_size);
    let rows = matching
        .into_iter()
        .skip(start)
        .take(page_size)
        .collect();

    Page {
        rows,
        page: query.page,
        total_pages,
        total_matching,
    }
}

pub fn total_pages(total_matching: usize, page_size: usize) -> usize {
    total_matching.div_ceil(page_size.max(1))
}

/// Keeps a requested page inside `[1, total_pages]`; with no pages it stays at 1.
pub fn clamp_page(page: usize, total_pages: usize) -> usize {
    if total_pages == 0 {
        1
    } else {
        page.clamp(1, total_pages)
    }
}
