//! Search parameters and the client-side filter applied to each entry.

use crate::error::{Result, ScopusError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Date format used by Scopus cover dates and by the date bounds
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Default number of records returned
pub const DEFAULT_LIMIT: usize = 10;

/// Scopus result view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    #[default]
    Standard,
    /// Includes the full `author` array (needs an entitled key)
    Complete,
}

impl View {
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

impl FromStr for View {
    type Err = ScopusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "complete" => Ok(Self::Complete),
            other => Err(ScopusError::Validation(format!("Unknown view: {}", other))),
        }
    }
}

/// One search request.
///
/// Build with [`SearchQuery::new`] and the `with_*` setters; date bounds
/// are parsed up front so a malformed bound fails before any request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub topic: String,
    pub min_citations: u64,
    pub limit: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub view: View,
}

impl SearchQuery {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            min_citations: 0,
            limit: DEFAULT_LIMIT,
            start_date: None,
            end_date: None,
            view: View::default(),
        }
    }

    pub fn with_min_citations(mut self, min_citations: u64) -> Self {
        self.min_citations = min_citations;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_view(mut self, view: View) -> Self {
        self.view = view;
        self
    }

    /// Set the inclusive date bounds from `YYYY-MM-DD` strings.
    pub fn with_date_range(mut self, start: Option<&str>, end: Option<&str>) -> Result<Self> {
        self.start_date = start.map(|s| parse_bound("start_date", s)).transpose()?;
        self.end_date = end.map(|s| parse_bound("end_date", s)).transpose()?;
        Ok(self)
    }

    /// Check the parameters before any request is made.
    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(ScopusError::Validation("topic must not be empty".to_string()));
        }
        if self.limit == 0 {
            return Err(ScopusError::Validation("limit must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Scopus search expression for the topic.
    pub fn expression(&self) -> String {
        format!("TITLE-ABS-KEY({})", self.topic)
    }

    pub fn has_date_bound(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some()
    }

    /// Decide whether an entry passes the citation and date filters.
    ///
    /// `cover_date` is `None` when upstream sent no date; such entries pass
    /// the date filter. A present but unparseable date fails it whenever a
    /// bound is active.
    pub fn admits(&self, citations: u64, cover_date: Option<&str>) -> bool {
        if citations < self.min_citations {
            return false;
        }

        let Some(raw) = cover_date else {
            return true;
        };
        if !self.has_date_bound() {
            return true;
        }

        match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
            Ok(date) => self.in_range(date),
            Err(_) => false,
        }
    }

    fn in_range(&self, date: NaiveDate) -> bool {
        if self.start_date.is_some_and(|start| date < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| date > end) {
            return false;
        }
        true
    }
}

fn parse_bound(name: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|e| {
        ScopusError::Validation(format!("{} must be YYYY-MM-DD, got {:?}: {}", name, raw, e))
    })
}
