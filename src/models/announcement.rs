//! Announcements published by admins to every marketer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::format_date;
use crate::table::{Column, TableRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl AnnouncementPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnouncementPriority::Low => "low",
            AnnouncementPriority::Medium => "medium",
            AnnouncementPriority::High => "high",
            AnnouncementPriority::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub priority: Option<AnnouncementPriority>,
    /// draft, published, archived
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl TableRow for Announcement {
    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("title", "Title", |a: &Announcement| a.title.clone())
                .sortable()
                .filterable(),
            Column::new("priority", "Priority", |a: &Announcement| {
                a.priority.map(|p| p.as_str()).unwrap_or("-").to_string()
            })
            .sortable(),
            Column::new("status", "Status", |a: &Announcement| {
                a.status.clone().unwrap_or_else(|| "-".to_string())
            })
            .sortable(),
            Column::new("content", "Content", |a: &Announcement| preview(&a.content, 48))
                .filterable(),
            Column::new("created", "Created", |a: &Announcement| format_date(a.created_at))
                .sort_by(|a: &Announcement| a.created_at),
        ]
    }

    fn card_title(&self) -> String {
        self.title.clone()
    }
}

/// Body of a create/update announcement request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementInput {
    pub title: String,
    pub content: String,
    pub priority: AnnouncementPriority,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnouncementStats {
    pub total: u64,
    pub published: u64,
    pub drafts: u64,
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_preview_flattens_and_truncates() {
        assert_eq!(preview("a\n  b", 10), "a b");
        assert_eq!(preview("abcdef", 3), "abc...");
    }

    #[test]
    fn input_serializes_type_field() {
        let input = AnnouncementInput {
            title: "Bonus week".into(),
            content: "Double commission".into(),
            priority: AnnouncementPriority::High,
            kind: Some("promotion".into()),
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["priority"], "high");
        assert_eq!(json["type"], "promotion");
    }
}
