//! Substring filtering and page slicing for list endpoints.

use std::fmt;

use platform_api::{ApiResult, FieldError};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{self, Unexpected, Visitor},
};

pub const DEFAULT_PER_PAGE: u64 = 10;
pub const MAX_PER_PAGE: u64 = 100;

/// A paging number as sent by the client.
///
/// Any integer deserializes, so a negative or oversized value is reported by
/// [`ListQuery::window`] as a field error. Text that is not an integer at all
/// fails deserialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageNumber {
    Exact(u64),
    OutOfRange,
}

impl From<u64> for PageNumber {
    fn from(value: u64) -> Self {
        Self::Exact(value)
    }
}

impl PageNumber {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let digits = raw
            .strip_prefix('-')
            .or_else(|| raw.strip_prefix('+'))
            .unwrap_or(raw);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(raw.parse().map_or(Self::OutOfRange, Self::Exact))
    }

    fn within(self, min: u64, max: u64) -> Option<u64> {
        match self {
            Self::Exact(n) if (min..=max).contains(&n) => Some(n),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for PageNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PageNumberVisitor;

        impl Visitor<'_> for PageNumberVisitor {
            type Value = PageNumber;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an integer")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<PageNumber, E> {
                Ok(PageNumber::Exact(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<PageNumber, E> {
                Ok(u64::try_from(value).map_or(PageNumber::OutOfRange, PageNumber::Exact))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<PageNumber, E> {
                PageNumber::parse(value)
                    .ok_or_else(|| E::invalid_value(Unexpected::Str(value), &self))
            }
        }

        deserializer.deserialize_any(PageNumberVisitor)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub page: Option<PageNumber>,
    pub per_page: Option<PageNumber>,
}

/// A validated [`ListQuery`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Window {
    pub page: u64,
    pub per_page: u64,
    /// Lower-cased search term; `None` when the query had no usable text.
    pub needle: Option<String>,
}

impl ListQuery {
    pub fn window(&self) -> ApiResult<Window> {
        let page = self.page.unwrap_or(PageNumber::Exact(1)).within(1, u64::MAX);
        let per_page = self
            .per_page
            .unwrap_or(PageNumber::Exact(DEFAULT_PER_PAGE))
            .within(1, MAX_PER_PAGE);
        let mut errors = Vec::new();
        if page.is_none() {
            errors.push(FieldError::new("page", "must be at least 1"));
        }
        if per_page.is_none() {
            errors.push(FieldError::new(
                "per_page",
                format!("must be between 1 and {MAX_PER_PAGE}"),
            ));
        }
        let (Some(page), Some(per_page)) = (page, per_page) else {
            return Err(platform_api::ApiError::Validation(errors));
        };
        let needle = self
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);
        Ok(Window {
            page,
            per_page,
            needle,
        })
    }
}

pub trait Searchable {
    /// `needle` is already lower-cased.
    fn matches(&self, needle: &str) -> bool;
}

pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

/// Filters `rows` by the window's needle, then slices out the requested page.
pub fn paginate<T: Searchable>(rows: Vec<T>, window: &Window) -> Page<T> {
    let filtered: Vec<T> = match &window.needle {
        Some(needle) => rows.into_iter().filter(|row| row.matches(needle)).collect(),
        None => rows,
    };
    let total = filtered.len() as u64;
    let total_pages = total.div_ceil(window.per_page);
    let start = (window.page - 1).saturating_mul(window.per_page);
    let items = filtered
        .into_iter()
        .skip(usize::try_from(start).unwrap_or(usize::MAX))
        .take(window.per_page as usize)
        .collect();
    Page {
        items,
        page: window.page,
        per_page: window.per_page,
        total,
        total_pages,
    }
}
