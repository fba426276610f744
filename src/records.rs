// Record types for the two source tables
//
// Base 1 (companies) and Base 2 (transactions) are flat, denormalized rows.
// Numeric columns are coerced leniently: anything that is not a number
// becomes NaN instead of failing the whole load.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Date format used by both tables (`DT_ABRT`, `DT_REFE`)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// TRANSACTION KIND
// ============================================================================

/// Transaction type tag (`DS_TRAN`)
///
/// Unknown tags are kept verbatim in `Other` so a new payment rail never
/// aborts a load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionKind {
    Pix,
    Ted,
    Boleto,
    Sistemico,
    Other(String),
}

impl TransactionKind {
    /// Tag as it appears in the CSV
    pub fn tag(&self) -> &str {
        match self {
            TransactionKind::Pix => "PIX",
            TransactionKind::Ted => "TED",
            TransactionKind::Boleto => "BOLETO",
            TransactionKind::Sistemico => "SISTEMICO",
            TransactionKind::Other(tag) => tag.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, TransactionKind::Other(_))
    }
}

impl From<&str> for TransactionKind {
    fn from(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "PIX" => TransactionKind::Pix,
            "TED" => TransactionKind::Ted,
            "BOLETO" => TransactionKind::Boleto,
            "SISTEMICO" | "SISTÊMICO" => TransactionKind::Sistemico,
            _ => TransactionKind::Other(trimmed.to_string()),
        }
    }
}

impl From<String> for TransactionKind {
    fn from(raw: String) -> Self {
        TransactionKind::from(raw.as_str())
    }
}

impl From<TransactionKind> for String {
    fn from(kind: TransactionKind) -> Self {
        kind.tag().to_string()
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Default for TransactionKind {
    fn default() -> Self {
        TransactionKind::Other(String::new())
    }
}

// ============================================================================
// COMPANY (Base 1)
// ============================================================================

/// One row of Base 1: a business entity with revenue and balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(rename = "ID", default)]
    pub id: String,

    /// Annual revenue
    #[serde(rename = "VL_FATU", default = "nan", deserialize_with = "lenient_f64")]
    pub revenue: f64,

    /// Checking-account balance
    #[serde(rename = "VL_SLDO", default = "nan", deserialize_with = "lenient_f64")]
    pub balance: f64,

    #[serde(rename = "DT_ABRT", default)]
    pub founded_on: String,

    /// Industry classification code (CNAE)
    #[serde(rename = "DS_CNAE", default)]
    pub sector_code: String,

    #[serde(rename = "DT_REFE", default)]
    pub reference_date: String,
}

impl Company {
    pub fn founding_date(&self) -> Option<NaiveDate> {
        parse_date(&self.founded_on)
    }

    pub fn reference_day(&self) -> Option<NaiveDate> {
        parse_date(&self.reference_date)
    }

    /// True when revenue or balance failed numeric coercion
    pub fn has_invalid_numbers(&self) -> bool {
        self.revenue.is_nan() || self.balance.is_nan()
    }
}

// ============================================================================
// TRANSACTION (Base 2)
// ============================================================================

/// One row of Base 2: a money transfer between two company identifiers
///
/// Participant ids are not checked against the company table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "ID_PGTO", default)]
    pub payer_id: String,

    #[serde(rename = "ID_RCBE", default)]
    pub payee_id: String,

    #[serde(rename = "VL", default = "nan", deserialize_with = "lenient_f64")]
    pub amount: f64,

    #[serde(rename = "DS_TRAN", default)]
    pub kind: TransactionKind,

    #[serde(rename = "DT_REFE", default)]
    pub reference_date: String,
}

impl Transaction {
    pub fn reference_day(&self) -> Option<NaiveDate> {
        parse_date(&self.reference_date)
    }

    pub fn has_invalid_numbers(&self) -> bool {
        self.amount.is_nan()
    }

    /// Whether `company_id` is the payer or the payee
    pub fn involves(&self, company_id: &str) -> bool {
        self.payer_id == company_id || self.payee_id == company_id
    }
}

// ============================================================================
// FIELD COERCION
// ============================================================================

fn nan() -> f64 {
    f64::NAN
}

/// Deserialize a numeric column, yielding NaN for blank or malformed values
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().map(coerce_number).unwrap_or(f64::NAN))
}

/// String → number coercion used for every numeric column
pub fn coerce_number(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_tag() {
        assert_eq!(TransactionKind::from("PIX"), TransactionKind::Pix);
        assert_eq!(TransactionKind::from(" ted "), TransactionKind::Ted);
        assert_eq!(TransactionKind::from("Boleto"), TransactionKind::Boleto);
        assert_eq!(TransactionKind::from("SISTEMICO"), TransactionKind::Sistemico);
        assert_eq!(
            TransactionKind::from("DOC"),
            TransactionKind::Other("DOC".to_string())
        );
    }

    #[test]
    fn test_kind_display_uses_tag() {
        assert_eq!(TransactionKind::Pix.to_string(), "PIX");
        assert_eq!(TransactionKind::Other("DOC".into()).to_string(), "DOC");
        assert!(!TransactionKind::Other("DOC".into()).is_known());
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number("1500.5"), 1500.5);
        assert_eq!(coerce_number(" -20 "), -20.0);
        assert!(coerce_number("").is_nan());
        assert!(coerce_number("abc").is_nan());
        assert!(coerce_number("1.234,56").is_nan());
    }

    #[test]
    fn test_company_dates() {
        let company = Company {
            id: "CNPJ_00001".to_string(),
            revenue: 1000.0,
            balance: 10.0,
            founded_on: "2015-03-20".to_string(),
            sector_code: "Comércio varejista".to_string(),
            reference_date: "not a date".to_string(),
        };

        assert_eq!(
            company.founding_date(),
            NaiveDate::from_ymd_opt(2015, 3, 20)
        );
        assert_eq!(company.reference_day(), None);
        assert!(!company.has_invalid_numbers());
    }

    #[test]
    fn test_transaction_involves() {
        let tx = Transaction {
            payer_id: "A".to_string(),
            payee_id: "B".to_string(),
            amount: f64::NAN,
            kind: TransactionKind::Pix,
            reference_date: "2024-01-31".to_string(),
        };

        assert!(tx.involves("A"));
        assert!(tx.involves("B"));
        assert!(!tx.involves("C"));
        assert!(tx.has_invalid_numbers());
    }
}
