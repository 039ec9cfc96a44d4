use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CertificateRecord {
    pub id: i64,
    pub name: String,
    pub event: String,
    /// Canonical `YYYY-MM-DD` text as stored.
    pub issue_date: String,
    pub number: String,
}

/// A validated certificate that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCertificate {
    pub name: String,
    pub event: String,
    pub issue_date: NaiveDate,
    /// `None` lets the store derive the number from the assigned id.
    pub number: Option<String>,
}

pub fn format_number(seq: i64) -> String {
    format!("CERT-{:04}", seq)
}
