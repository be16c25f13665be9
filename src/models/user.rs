//! Marketer accounts: the signed-in profile and the admin user list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{format_date, money::format_amount};
use crate::table::{Column, TableRow};

/// Profile of the signed-in user, returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub referral_code: Option<String>,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case("admin"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Pending,
    Suspended,
    #[serde(other)]
    Other,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Pending => "pending",
            UserStatus::Suspended => "suspended",
            UserStatus::Other => "other",
        }
    }
}

/// Row of the admin user list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    /// Server identifier
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    pub email: String,
    pub status: UserStatus,
    /// Rank in the compensation plan
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub referral_code: Option<String>,
    /// Lifetime commission earned
    #[serde(default)]
    pub total_earnings: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl TableRow for AdminUser {
    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("name", "Name", |u: &AdminUser| u.name.clone())
                .sortable()
                .filterable(),
            Column::new("email", "Email", |u: &AdminUser| u.email.clone()).filterable(),
            Column::new("status", "Status", |u: &AdminUser| u.status.as_str().to_string())
                .sortable(),
            Column::new("level", "Level", |u: &AdminUser| u.level.to_string())
                .sort_by(|u: &AdminUser| u.level),
            Column::new("earnings", "Earnings", |u: &AdminUser| {
                format_amount(u.total_earnings, u.currency.as_deref())
            })
            .sort_by(|u: &AdminUser| u.total_earnings),
            Column::new("joined", "Joined", |u: &AdminUser| format_date(u.created_at))
                .sort_by(|u: &AdminUser| u.created_at),
        ]
    }

    fn card_title(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

/// Aggregates shown above the admin user list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserStats {
    pub total_users: u64,
    pub active_users: u64,
    pub suspended_users: u64,
    pub new_this_month: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_user_with_unknown_status() {
        let user: AdminUser = serde_json::from_value(serde_json::json!({
            "id": "u_1",
            "name": "Ada",
            "email": "ada@example.com",
            "status": "banned",
            "level": 4,
            "totalEarnings": 1500.25,
            "createdAt": "2024-03-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(user.status, UserStatus::Other);

        let cells: Vec<String> = AdminUser::columns().iter().map(|c| c.value(&user)).collect();
        assert_eq!(
            cells,
            vec!["Ada", "ada@example.com", "other", "4", "1,500.25 USD", "2024-03-01"]
        );
    }

    #[test]
    fn admin_role_check_is_case_insensitive() {
        let profile = UserProfile {
            id: "1".into(),
            name: "Root".into(),
            email: "root@example.com".into(),
            role: Some("ADMIN".into()),
            referral_code: None,
        };
        assert!(profile.is_admin());
    }
}
