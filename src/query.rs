//! List query parameters, cache keys and the list response envelope.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::cursor::Cursor;

/// Server collections served through the list layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    AdminUsers,
    AdminPayments,
    AdminAnnouncements,
    Team,
    Notifications,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::AdminUsers,
        Collection::AdminPayments,
        Collection::AdminAnnouncements,
        Collection::Team,
        Collection::Notifications,
    ];

    /// Path of the collection relative to the API root.
    pub fn path(&self) -> &'static str {
        match self {
            Collection::AdminUsers => "admin/users",
            Collection::AdminPayments => "admin/payments",
            Collection::AdminAnnouncements => "admin/announcements",
            Collection::Team => "team/members",
            Collection::Notifications => "notifications",
        }
    }

    /// Path of the aggregate stats endpoint paired with this collection.
    pub fn stats_path(&self) -> Option<&'static str> {
        match self {
            Collection::AdminUsers => Some("admin/users/stats"),
            Collection::AdminPayments => Some("admin/payments/stats"),
            Collection::AdminAnnouncements => Some("admin/announcements/stats"),
            Collection::Team => Some("team/stats"),
            Collection::Notifications => None,
        }
    }

    /// Short name used on the command line and in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::AdminUsers => "users",
            Collection::AdminPayments => "payments",
            Collection::AdminAnnouncements => "announcements",
            Collection::Team => "team",
            Collection::Notifications => "notifications",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Server-side filters. Unset fields are omitted from the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

impl ListFilters {
    pub fn with_status<S: Into<String>>(mut self, status: S) -> Self {
        self.status = normalize(Some(status.into()));
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_kind<S: Into<String>>(mut self, kind: S) -> Self {
        self.kind = normalize(Some(kind.into()));
        self
    }

    pub fn with_priority<S: Into<String>>(mut self, priority: S) -> Self {
        self.priority = normalize(Some(priority.into()));
        self
    }

    /// Blank filter values mean "all".
    pub fn normalized(self) -> Self {
        Self {
            status: normalize(self.status),
            level: self.level,
            kind: normalize(self.kind),
            priority: normalize(self.priority),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.level.is_none()
            && self.kind.is_none()
            && self.priority.is_none()
    }
}

/// One list request. Built fresh for every fetch and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ListQuery {
    pub collection: Collection,
    pub cursor: Option<Cursor>,
    pub limit: u32,
    pub filters: ListFilters,
    pub search: Option<String>,
}

impl ListQuery {
    pub fn new(collection: Collection, limit: u32) -> Self {
        Self {
            collection,
            cursor: None,
            limit,
            filters: ListFilters::default(),
            search: None,
        }
    }

    pub fn with_cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_filters(mut self, filters: ListFilters) -> Self {
        self.filters = filters.normalized();
        self
    }

    pub fn with_search<S: Into<String>>(mut self, search: Option<S>) -> Self {
        self.search = search
            .map(Into::<String>::into)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }

    /// Serialized identity of the request. Every field participates, so
    /// different pages, filters or search terms never share an entry.
    pub fn key(&self) -> QueryKey {
        // Serializing a struct of strings and integers cannot fail.
        let body = serde_json::to_string(self).unwrap_or_default();
        QueryKey(format!("{}:{}", self.collection.path(), body))
    }

    /// Query-string pairs in the order the API documents them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(7);
        if let Some(cursor) = &self.cursor {
            pairs.push(("cursor", cursor.as_str().to_string()));
        }
        pairs.push(("limit", self.limit.to_string()));
        if let Some(status) = &self.filters.status {
            pairs.push(("status", status.clone()));
        }
        if let Some(level) = self.filters.level {
            pairs.push(("level", level.to_string()));
        }
        if let Some(kind) = &self.filters.kind {
            pairs.push(("type", kind.clone()));
        }
        if let Some(priority) = &self.filters.priority {
            pairs.push(("priority", priority.clone()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        pairs
    }
}

/// Cache identity of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(String);

impl QueryKey {
    /// Key for a non-list request such as a stats endpoint.
    pub fn for_path(path: &str) -> Self {
        Self(path.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of a collection as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResult<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub has_more: bool,
    #[serde(
        default,
        deserialize_with = "non_empty_cursor",
        skip_serializing_if = "Option::is_none"
    )]
    pub next_cursor: Option<Cursor>,
    #[serde(
        default,
        deserialize_with = "non_empty_cursor",
        skip_serializing_if = "Option::is_none"
    )]
    pub prev_cursor: Option<Cursor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unread_count: Option<u64>,
}

impl<T> ListResult<T> {
    /// Cursor for the following page, only when the server says there is one.
    pub fn next_page_cursor(&self) -> Option<Cursor> {
        if self.has_more {
            self.next_cursor.clone()
        } else {
            None
        }
    }

    pub fn map_items<U, E, F>(self, f: F) -> Result<ListResult<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        Ok(ListResult {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            total: self.total,
            has_more: self.has_more,
            next_cursor: self.next_cursor,
            prev_cursor: self.prev_cursor,
            unread_count: self.unread_count,
        })
    }
}

fn non_empty_cursor<'de, D>(deserializer: D) -> Result<Option<Cursor>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(Cursor::new))
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}
