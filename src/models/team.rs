//! Downline members of the signed-in marketer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{format_date, money::format_amount};
use crate::table::{Column, TableRow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Depth in the downline; 1 is a direct recruit.
    pub level: u32,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub direct_referrals: u32,
    #[serde(default)]
    pub total_earnings: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

impl TableRow for TeamMember {
    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("name", "Name", |m: &TeamMember| m.name.clone())
                .sortable()
                .filterable(),
            Column::new("email", "Email", |m: &TeamMember| m.email.clone()).filterable(),
            Column::new("level", "Level", |m: &TeamMember| m.level.to_string())
                .sort_by(|m: &TeamMember| m.level),
            Column::new("referrals", "Referrals", |m: &TeamMember| {
                m.direct_referrals.to_string()
            })
            .sort_by(|m: &TeamMember| m.direct_referrals),
            Column::new("earnings", "Earnings", |m: &TeamMember| {
                format_amount(m.total_earnings, m.currency.as_deref())
            })
            .sort_by(|m: &TeamMember| m.total_earnings),
            Column::new("joined", "Joined", |m: &TeamMember| format_date(m.joined_at))
                .sort_by(|m: &TeamMember| m.joined_at),
        ]
    }

    fn card_title(&self) -> String {
        format!("{} (level {})", self.name, self.level)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamStats {
    pub total_members: u64,
    pub direct_members: u64,
    pub active_members: u64,
    pub team_earnings: f64,
}
