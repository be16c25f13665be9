//! Payout and commission payments reviewed by admins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{format_date, money::format_amount};
use crate::table::{Column, TableRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Failed,
    #[serde(other)]
    Other,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Other => "other",
        }
    }

    /// Only pending payments can be approved or rejected.
    pub fn is_reviewable(&self) -> bool {
        matches!(self, PaymentStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub currency: Option<String>,
    pub status: PaymentStatus,
    /// withdrawal, commission, bonus, ...
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl TableRow for Payment {
    fn columns() -> Vec<Column<Self>> {
        vec![
            Column::new("id", "ID", |p: &Payment| p.id.clone()).filterable(),
            Column::new("user", "User", |p: &Payment| {
                p.user_name.clone().unwrap_or_else(|| "-".to_string())
            })
            .sortable()
            .filterable(),
            Column::new("amount", "Amount", |p: &Payment| {
                format_amount(p.amount, p.currency.as_deref())
            })
            .sort_by(|p: &Payment| p.amount),
            Column::new("type", "Type", |p: &Payment| {
                p.kind.clone().unwrap_or_else(|| "-".to_string())
            })
            .sortable(),
            Column::new("status", "Status", |p: &Payment| p.status.as_str().to_string())
                .sortable(),
            Column::new("date", "Date", |p: &Payment| format_date(p.created_at))
                .sort_by(|p: &Payment| p.created_at),
        ]
    }

    fn card_title(&self) -> String {
        format!(
            "{} {}",
            self.id,
            format_amount(self.amount, self.currency.as_deref())
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentStats {
    pub total_payments: u64,
    pub pending_count: u64,
    pub approved_count: u64,
    pub rejected_count: u64,
    pub pending_amount: f64,
    pub paid_out_amount: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_type_field_and_renders_cells() {
        let payment: Payment = serde_json::from_value(serde_json::json!({
            "id": "pay_1",
            "userName": "John Doe",
            "amount": 250,
            "currency": "usd",
            "status": "pending",
            "type": "withdrawal"
        }))
        .unwrap();
        assert!(payment.status.is_reviewable());
        assert_eq!(payment.kind.as_deref(), Some("withdrawal"));

        let amount = &Payment::columns()[2];
        assert_eq!(amount.value(&payment), "250.00 USD");
        assert_eq!(payment.card_title(), "pay_1 250.00 USD");
    }
}
