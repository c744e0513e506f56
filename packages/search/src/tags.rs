//! Exact tag matching over image rows held by the caller.

use crate::error::{Result, SearchError};
use crate::service::check_limit;

/// Row that can be filtered by tags.
pub trait TaggedImage {
    fn team_id(&self) -> i64;
    fn tags(&self) -> &[String];
}

/// Tag query with offset pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagQuery {
    pub tags: Vec<String>,
    pub skip: usize,
    pub limit: usize,
}

impl TagQuery {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            skip: 0,
            limit: 100,
        }
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Every queried tag is present on the row (case-sensitive).
    pub fn matches(&self, tags: &[String]) -> bool {
        self.tags.iter().all(|wanted| tags.contains(wanted))
    }
}

/// Rows of `team_id` carrying every tag in `query`, in input order.
pub fn search_by_tags<'a, T, I>(rows: I, team_id: i64, query: &TagQuery) -> Result<Vec<&'a T>>
where
    T: TaggedImage + 'a,
    I: IntoIterator<Item = &'a T>,
{
    if query.tags.is_empty() {
        return Err(SearchError::InvalidRequest(
            "at least one tag is required".into(),
        ));
    }
    let limit = check_limit(query.limit)?;

    Ok(rows
        .into_iter()
        .filter(|row| row.team_id() == team_id && query.matches(row.tags()))
        .skip(query.skip)
        .take(limit)
        .collect())
}
