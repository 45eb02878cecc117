use std::{fmt::Display, str::FromStr};

pub use agw_common::Cents;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {0}: {1}")]
pub struct ConversionError(&'static str, String);

//--------------------------------------    TransferStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    /// Created, and waiting to be merged into a file and uploaded.
    Pending,
    /// Uploaded to the ODFI.
    Processed,
    /// Returned by the receiving institution.
    Reclaimed,
    Failed,
    Canceled,
}

impl Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processed => write!(f, "processed"),
            Self::Reclaimed => write!(f, "reclaimed"),
            Self::Failed => write!(f, "failed"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

impl FromStr for TransferStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processed" => Ok(Self::Processed),
            "reclaimed" => Ok(Self::Reclaimed),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            _ => Err(ConversionError("TransferStatus", s.to_string())),
        }
    }
}

//--------------------------------------   DepositoryStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DepositoryStatus {
    Unverified,
    Verified,
    Rejected,
}

impl Display for DepositoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unverified => write!(f, "unverified"),
            Self::Verified => write!(f, "verified"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for DepositoryStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unverified" => Ok(Self::Unverified),
            "verified" => Ok(Self::Verified),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ConversionError("DepositoryStatus", s.to_string())),
        }
    }
}

//--------------------------------------       Transfer        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct Transfer {
    pub id: String,
    /// The user that owns the transfer. Transfers without an owner cannot be reconciled.
    pub user_id: Option<String>,
    pub amount: Cents,
    pub status: TransferStatus,
    pub standard_entry_class_code: String,
    pub trace_number: String,
    pub effective_entry_date: NaiveDate,
    /// The id of the ACH file generated for this transfer.
    pub file_id: String,
    pub origin_routing_number: String,
    /// Set once the transfer's batch has been merged into a settlement file.
    pub merged_filename: Option<String>,
    pub return_code: Option<String>,
    /// The accounts ledger transaction recorded for this transfer, if any.
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub id: String,
    pub user_id: Option<String>,
    pub amount: Cents,
    pub standard_entry_class_code: String,
    pub trace_number: String,
    pub effective_entry_date: NaiveDate,
    pub file_id: String,
    pub origin_routing_number: String,
    pub transaction_id: Option<String>,
}

impl NewTransfer {
    pub fn new(id: &str, user_id: &str, amount: Cents, file_id: &str, origin_routing_number: &str) -> Self {
        Self {
            id: id.to_string(),
            user_id: Some(user_id.to_string()),
            amount,
            standard_entry_class_code: "PPD".to_string(),
            trace_number: String::default(),
            effective_entry_date: Utc::now().date_naive(),
            file_id: file_id.to_string(),
            origin_routing_number: origin_routing_number.to_string(),
            transaction_id: None,
        }
    }

    pub fn with_trace(mut self, sec_code: &str, trace_number: &str, effective_entry_date: NaiveDate) -> Self {
        self.standard_entry_class_code = sec_code.to_string();
        self.trace_number = trace_number.to_string();
        self.effective_entry_date = effective_entry_date;
        self
    }

    pub fn with_transaction_id(mut self, transaction_id: &str) -> Self {
        self.transaction_id = Some(transaction_id.to_string());
        self
    }
}

/// A lightweight projection of a pending [`Transfer`], used to group transfers by origin routing number before their
/// files are merged.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct GroupableTransfer {
    pub transfer_id: String,
    pub user_id: Option<String>,
    pub origin_routing_number: String,
    pub file_id: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      PageCursor       ---------------------------------------------------------
/// A position in a `(created_at, id)` ordered scan. Rows strictly after the cursor are returned by the next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self { created_at: DateTime::<Utc>::MIN_UTC, id: String::default() }
    }
}

impl PageCursor {
    pub fn new(created_at: DateTime<Utc>, id: &str) -> Self {
        Self { created_at, id: id.to_string() }
    }

    /// Moves the cursor forward. Positions earlier than the current one are ignored.
    pub fn advance(&mut self, created_at: DateTime<Utc>, id: &str) {
        if (created_at, id) > (self.created_at, self.id.as_str()) {
            self.created_at = created_at;
            self.id = id.to_string();
        }
    }
}

//--------------------------------------      Depository       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Depository {
    pub id: String,
    pub user_id: String,
    pub routing_number: String,
    pub account_number: String,
    pub status: DepositoryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDepository {
    pub id: String,
    pub user_id: String,
    pub routing_number: String,
    pub account_number: String,
    pub status: DepositoryStatus,
}

impl NewDepository {
    pub fn verified(id: &str, user_id: &str, routing_number: &str, account_number: &str) -> Self {
        Self {
            id: id.to_string(),
            user_id: user_id.to_string(),
            routing_number: routing_number.to_string(),
            account_number: account_number.to_string(),
            status: DepositoryStatus::Verified,
        }
    }

    pub fn with_status(mut self, status: DepositoryStatus) -> Self {
        self.status = status;
        self
    }
}

//--------------------------------------     MicroDeposit      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct MicroDeposit {
    pub id: i64,
    pub depository_id: String,
    pub user_id: String,
    pub file_id: String,
    pub amount: Cents,
    pub merged_filename: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMicroDeposit {
    pub depository_id: String,
    pub user_id: String,
    pub file_id: String,
    pub amount: Cents,
}

impl NewMicroDeposit {
    pub fn new(depository_id: &str, user_id: &str, file_id: &str, amount: Cents) -> Self {
        Self {
            depository_id: depository_id.to_string(),
            user_id: user_id.to_string(),
            file_id: file_id.to_string(),
            amount,
        }
    }
}

/// The grouping unit for micro-deposit verification files that still need to be merged.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UploadableMicroDeposit {
    pub file_id: String,
    pub depository_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn statuses_round_trip_through_strings() {
        for s in ["pending", "processed", "reclaimed", "failed", "canceled"] {
            assert_eq!(s.parse::<TransferStatus>().unwrap().to_string(), s);
        }
        for s in ["unverified", "verified", "rejected"] {
            assert_eq!(s.parse::<DepositoryStatus>().unwrap().to_string(), s);
        }
        assert!("Verified".parse::<DepositoryStatus>().is_ok());
        assert!("lost".parse::<TransferStatus>().is_err());
    }

    #[test]
    fn cursors_only_move_forward() {
        let t0 = Utc::now();
        let mut cursor = PageCursor::default();
        cursor.advance(t0, "b");
        assert_eq!(cursor, PageCursor::new(t0, "b"));
        cursor.advance(t0, "a");
        assert_eq!(cursor.id, "b");
        cursor.advance(t0, "c");
        assert_eq!(cursor.id, "c");
        cursor.advance(t0 - chrono::Duration::seconds(1), "z");
        assert_eq!(cursor, PageCursor::new(t0, "c"));
    }
}
