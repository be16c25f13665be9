use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::format_date;
use crate::table::{Column, TableRow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl TableRow for Notification {
    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("read", "", |n: &Notification| {
                let marker = if n.read { " " } else { "*" };
                marker.to_string()
            }),
            Column::new("title", "Title", |n: &Notification| n.title.clone()).filterable(),
            Column::new("message", "Message", |n: &Notification| n.message.clone()).filterable(),
            Column::new("date", "Date", |n: &Notification| format_date(n.created_at))
                .sort_by(|n: &Notification| n.created_at),
        ]
    }

    fn card_title(&self) -> String {
        self.title.clone()
    }
}
