//! Typed rows for the dashboard collections.
//!
//! Field names follow the API's camelCase JSON. Status-like fields are enums
//! with a catch-all variant so new server values do not break decoding.

pub mod announcement;
pub mod money;
pub mod notification;
pub mod payment;
pub mod team;
pub mod user;

pub use announcement::{Announcement, AnnouncementInput, AnnouncementPriority, AnnouncementStats};
pub use notification::Notification;
pub use payment::{Payment, PaymentStats, PaymentStatus};
pub use team::{TeamMember, TeamStats};
pub use user::{AdminUser, UserProfile, UserStats, UserStatus};

use chrono::{DateTime, Utc};

pub(crate) fn format_date(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}
