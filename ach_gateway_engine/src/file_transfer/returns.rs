//! # Return reconciliation
//!
//! Receiving institutions send back entries they could not post, each carrying an addenda 99 record with the return
//! reason code. For every returned entry the reconciler finds the transfer it refers to, reverses its ledger
//! transaction, marks it `reclaimed` and, depending on the return code, rejects the depositories involved so that no
//! further transfers are attempted against them.
//!
//! Everything that can fail without side effects (finding the transfer, resolving both depositories and deciding
//! what the return code requires) happens first. Then the ledger reversal is requested, and finally the transfer and
//! depository updates are written in one transaction. So an unhandled return code mutates nothing, and a failed
//! reversal leaves the transfer as it was.
//!
//! Failures that can clear up on their own (the ledger or the store being unavailable, or a depository that has not
//! been verified yet) are counted as retryable, and the controller keeps the return file to process it again.
//! Reversals carry an idempotency key derived from the ledger transaction, so a reversal that succeeded before the
//! store update failed is not applied twice on the next attempt. Entries whose transfer has already been reclaimed
//! are skipped.
use chrono::NaiveDate;
use log::*;
use thiserror::Error;

use crate::{
    ach::{EntryDetail, File},
    db_types::{Cents, Depository, DepositoryStatus, Transfer, TransferStatus},
    ledger::{new_request_id, LedgerClient, LedgerError},
    traits::{GatewayDatabase, GatewayDatabaseError},
};

#[derive(Debug, Error)]
pub enum ReturnError {
    #[error("Entry {0} has no return addenda")]
    NotAReturn(String),
    #[error("Entry {0} has an amount that is out of range")]
    InvalidAmount(String),
    #[error("No transfer matches returned entry {0}")]
    TransferNotFound(String),
    #[error("Transfer {0} has no owner")]
    TransferHasNoOwner(String),
    #[error("Transfer {0} has already been reclaimed")]
    AlreadyReclaimed(String),
    #[error("Transfer {0} cannot be reclaimed while it is {1}")]
    TransferNotReclaimable(String, TransferStatus),
    #[error("No {role} depository for user {user_id} at routing number {routing_number}")]
    DepositoryNotFound { role: &'static str, user_id: String, routing_number: String },
    #[error("The {role} depository {id} is {status}, not verified")]
    DepositoryNotVerified { role: &'static str, id: String, status: DepositoryStatus },
    #[error("Unhandled return code {0}")]
    UnhandledReturnCode(String),
    #[error("Ledger reversal failed. {0}")]
    LedgerError(#[from] LedgerError),
    #[error("Database error: {0}")]
    DatabaseError(#[from] GatewayDatabaseError),
}

impl ReturnError {
    /// True for failures that may not happen if the entry is processed again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReturnError::LedgerError(_) | ReturnError::DatabaseError(_) => true,
            ReturnError::DepositoryNotVerified { status, .. } => *status == DepositoryStatus::Unverified,
            _ => false,
        }
    }
}

/// What a return code requires of the depositories involved in the returned transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnAction {
    /// The receiving account is closed, unauthorised or otherwise unusable.
    RejectReceiver,
    /// The account holder has died or is otherwise legally incapacitated, which invalidates both accounts.
    RejectOriginatorAndReceiver,
}

/// The depository policy for a return code, or `None` for codes the gateway doesn't act on.
pub fn return_code_action(code: &str) -> Option<ReturnAction> {
    match code.trim().to_ascii_uppercase().as_str() {
        "R02" | "R05" | "R07" | "R10" | "R16" | "R20" => Some(ReturnAction::RejectReceiver),
        "R14" | "R15" => Some(ReturnAction::RejectOriginatorAndReceiver),
        _ => None,
    }
}

/// The parts of a returned entry needed to find and reclaim the original transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnEntry {
    /// The trace number of the original entry: the addenda 99 original trace when present, otherwise the entry's own.
    pub trace_number: String,
    pub amount: Cents,
    pub effective_entry_date: NaiveDate,
    pub return_code: String,
    pub standard_entry_class_code: String,
    pub rdfi_routing_number: String,
    pub dfi_account_number: String,
}

impl ReturnEntry {
    pub fn from_entry(entry: &EntryDetail, sec_code: &str, effective_entry_date: NaiveDate) -> Result<Self, ReturnError> {
        let addenda = entry.return_addenda().ok_or_else(|| ReturnError::NotAReturn(entry.trace_number.clone()))?;
        let amount =
            Cents::try_from(entry.amount).map_err(|_| ReturnError::InvalidAmount(entry.trace_number.clone()))?;
        let trace_number = if addenda.original_trace.trim().is_empty() {
            entry.trace_number.trim().to_string()
        } else {
            addenda.original_trace.trim().to_string()
        };
        Ok(Self {
            trace_number,
            amount,
            effective_entry_date,
            return_code: addenda.return_code.trim().to_string(),
            standard_entry_class_code: sec_code.trim().to_string(),
            rdfi_routing_number: entry.rdfi_routing_number(),
            dfi_account_number: entry.dfi_account_number.trim().to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReturnSummary {
    pub reconciled: usize,
    pub failed: usize,
    /// Failed entries that may succeed if the file is processed again. Included in `failed`.
    pub retryable: usize,
    /// Entries whose transfer had already been reclaimed.
    pub skipped: usize,
}

impl ReturnSummary {
    pub fn add(&mut self, other: ReturnSummary) {
        self.reconciled += other.reconciled;
        self.failed += other.failed;
        self.retryable += other.retryable;
        self.skipped += other.skipped;
    }
}

pub struct ReturnReconciler<B, L> {
    db: B,
    ledger: Option<L>,
}

impl<B, L> ReturnReconciler<B, L>
where
    B: GatewayDatabase,
    L: LedgerClient,
{
    pub fn new(db: B, ledger: Option<L>) -> Self {
        Self { db, ledger }
    }

    pub fn has_ledger(&self) -> bool {
        self.ledger.is_some()
    }

    /// Reconciles every returned entry in the file. Failures are logged per entry and never stop the rest of the
    /// file from being processed.
    pub async fn process_file(&self, file: &File) -> ReturnSummary {
        let mut summary = ReturnSummary::default();
        let origin = file.origin_routing_number();
        for batch in &file.batches {
            let sec_code = batch.header.standard_entry_class_code.as_str();
            let effective_date = match batch.header.effective_date() {
                Ok(d) => d,
                Err(e) => {
                    warn!(
                        "↩️ Batch {} from {origin} has an invalid effective entry date. Skipping its {} entries. {e}",
                        batch.header.batch_number,
                        batch.entries.len()
                    );
                    summary.failed += batch.entries.len();
                    continue;
                },
            };
            for entry in &batch.entries {
                let result = match ReturnEntry::from_entry(entry, sec_code, effective_date) {
                    Ok(ret) => self.process_entry(origin, &ret).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(transfer) => {
                        info!("↩️ Transfer {} reclaimed after return of entry {}", transfer.id, entry.trace_number);
                        summary.reconciled += 1;
                    },
                    Err(ReturnError::AlreadyReclaimed(id)) => {
                        debug!("↩️ Transfer {id} was already reclaimed. Skipping entry {}", entry.trace_number);
                        summary.skipped += 1;
                    },
                    Err(e) => {
                        let retryable = e.is_retryable();
                        warn!(
                            "↩️ Could not reconcile returned entry {}{}. {e}",
                            entry.trace_number,
                            if retryable { " (will retry)" } else { "" }
                        );
                        summary.failed += 1;
                        summary.retryable += usize::from(retryable);
                    },
                }
            }
        }
        summary
    }

    /// Reconciles a single returned entry. `origin_routing_number` is the immediate origin of the return file, which
    /// identifies the originator's depository.
    pub async fn process_entry(&self, origin_routing_number: &str, entry: &ReturnEntry) -> Result<Transfer, ReturnError> {
        let transfer = self
            .db
            .lookup_transfer_from_return(
                &entry.standard_entry_class_code,
                entry.amount,
                &entry.trace_number,
                entry.effective_entry_date,
            )
            .await?
            .ok_or_else(|| ReturnError::TransferNotFound(entry.trace_number.clone()))?;
        let user_id = transfer.user_id.clone().ok_or_else(|| ReturnError::TransferHasNoOwner(transfer.id.clone()))?;
        match transfer.status {
            TransferStatus::Pending | TransferStatus::Processed => {},
            TransferStatus::Reclaimed => return Err(ReturnError::AlreadyReclaimed(transfer.id)),
            status => return Err(ReturnError::TransferNotReclaimable(transfer.id, status)),
        }

        let origin = self.verified_depository("originator", &user_id, origin_routing_number, None).await?;
        let receiver = self
            .verified_depository("receiver", &user_id, &entry.rdfi_routing_number, Some(&entry.dfi_account_number))
            .await?;
        let rejected = match return_code_action(&entry.return_code) {
            Some(ReturnAction::RejectReceiver) => vec![receiver.id],
            Some(ReturnAction::RejectOriginatorAndReceiver) => vec![origin.id, receiver.id],
            None => return Err(ReturnError::UnhandledReturnCode(entry.return_code.clone())),
        };

        let reversed = match (&self.ledger, &transfer.transaction_id) {
            (Some(ledger), Some(tx_id)) => {
                ledger.reverse_transaction(tx_id, &user_id, &new_request_id()).await?;
                Some(tx_id)
            },
            _ => None,
        };
        self.db.reclaim_transfer(&transfer.id, &entry.return_code, &rejected).await.map_err(|e| {
            if let Some(tx_id) = reversed {
                error!("↩️ Ledger transaction {tx_id} was reversed but transfer {} could not be reclaimed. {e}", transfer.id);
            }
            ReturnError::from(e)
        })
    }

    async fn verified_depository(
        &self,
        role: &'static str,
        user_id: &str,
        routing_number: &str,
        account_number: Option<&str>,
    ) -> Result<Depository, ReturnError> {
        let depository = self
            .db
            .lookup_depository_from_return(user_id, routing_number, account_number)
            .await?
            .ok_or_else(|| ReturnError::DepositoryNotFound {
                role,
                user_id: user_id.to_string(),
                routing_number: routing_number.to_string(),
            })?;
        if depository.status != DepositoryStatus::Verified {
            return Err(ReturnError::DepositoryNotVerified { role, id: depository.id, status: depository.status });
        }
        Ok(depository)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ach::Addenda99;

    #[test]
    fn return_code_policy() {
        for code in ["R02", "R05", "R07", "R10", "R16", "R20"] {
            assert_eq!(return_code_action(code), Some(ReturnAction::RejectReceiver), "{code}");
        }
        assert_eq!(return_code_action("R14"), Some(ReturnAction::RejectOriginatorAndReceiver));
        assert_eq!(return_code_action("r15"), Some(ReturnAction::RejectOriginatorAndReceiver));
        assert_eq!(return_code_action("R99"), None);
        assert_eq!(return_code_action("R01"), None);
        assert_eq!(return_code_action(""), None);
    }

    #[test]
    fn transient_failures_are_retryable() {
        assert!(ReturnError::LedgerError(LedgerError::Unreachable("timeout".into())).is_retryable());
        let unverified =
            ReturnError::DepositoryNotVerified { role: "receiver", id: "d1".into(), status: DepositoryStatus::Unverified };
        assert!(unverified.is_retryable());
        let rejected =
            ReturnError::DepositoryNotVerified { role: "receiver", id: "d1".into(), status: DepositoryStatus::Rejected };
        assert!(!rejected.is_retryable());
        assert!(!ReturnError::UnhandledReturnCode("R99".into()).is_retryable());
        assert!(!ReturnError::TransferNotFound("121042880000001".into()).is_retryable());
    }

    #[test]
    fn return_entries_prefer_the_original_trace() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let entry = EntryDetail::new(26, "231380104", " 744-5678-99 ", 2_500, "231380100000009")
            .with_addenda(crate::ach::Addenda::Return(Addenda99::new("R02", "121042880000001", "23138010")));
        let ret = ReturnEntry::from_entry(&entry, "PPD", date).unwrap();
        assert_eq!(ret.trace_number, "121042880000001");
        assert_eq!(ret.amount, Cents::from(2_500));
        assert_eq!(ret.return_code, "R02");
        assert_eq!(ret.rdfi_routing_number, "231380104");
        assert_eq!(ret.dfi_account_number, "744-5678-99");

        let mut no_trace = entry.clone();
        no_trace.addenda = vec![crate::ach::Addenda::Return(Addenda99::new("R02", "", "23138010"))];
        assert_eq!(ReturnEntry::from_entry(&no_trace, "PPD", date).unwrap().trace_number, "231380100000009");

        let mut plain = entry;
        plain.addenda.clear();
        assert!(matches!(ReturnEntry::from_entry(&plain, "PPD", date), Err(ReturnError::NotAReturn(_))));
    }
}
