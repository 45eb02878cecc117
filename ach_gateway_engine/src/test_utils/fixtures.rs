//! Builders for the ACH files and store records that tests need over and over.
use chrono::NaiveDate;

use crate::{
    ach::{Addenda, Addenda99, Batch, BatchHeader, EntryDetail, File, FileHeader},
    db_types::{Cents, NewDepository, NewTransfer},
};

pub const ODFI_ROUTING: &str = "121042882";
pub const RDFI_ROUTING: &str = "231380104";
pub const ORIGINATOR_ACCOUNT: &str = "1029384756";
pub const RECEIVER_ACCOUNT: &str = "7445678990";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("invalid date")
}

/// A trace number for the `n`th entry originated through [`ODFI_ROUTING`].
pub fn trace_number(n: u32) -> String {
    format!("{}{n:07}", &ODFI_ROUTING[..8])
}

/// The single-batch, single-entry file generated for a transfer: a PPD credit to [`RECEIVER_ACCOUNT`].
pub fn transfer_file(origin: &str, trace: &str, amount: u64, effective: NaiveDate) -> File {
    let header = BatchHeader::new("PPD", "Gateway", "1234567890", origin)
        .with_effective_date(effective)
        .with_description("PAYMENT");
    let entry = EntryDetail::new(22, RDFI_ROUTING, RECEIVER_ACCOUNT, amount, trace).with_name("Jane Doe");
    File::new(FileHeader::new(RDFI_ROUTING, origin, effective)).with_batch(Batch::new(header).with_entry(entry))
}

/// A depository verification file: one PPD batch with a small credit to [`RECEIVER_ACCOUNT`] per amount. Trace numbers
/// count up from `first_trace`.
pub fn micro_deposit_file(origin: &str, first_trace: u32, amounts: &[u64], effective: NaiveDate) -> File {
    let header = BatchHeader::new("PPD", "Gateway", "1234567890", origin)
        .with_effective_date(effective)
        .with_description("ACCTVERIFY");
    let batch = amounts.iter().zip(first_trace..).fold(Batch::new(header), |batch, (&amount, n)| {
        batch.with_entry(EntryDetail::new(22, RDFI_ROUTING, RECEIVER_ACCOUNT, amount, &trace_number(n)))
    });
    File::new(FileHeader::new(RDFI_ROUTING, origin, effective)).with_batch(batch)
}

/// A returned entry for a file sent by [`ODFI_ROUTING`].
pub struct ReturnedEntry<'a> {
    pub original_trace: &'a str,
    pub amount: u64,
    pub return_code: &'a str,
    pub rdfi_routing: &'a str,
    pub account: &'a str,
}

impl<'a> ReturnedEntry<'a> {
    pub fn new(original_trace: &'a str, amount: u64, return_code: &'a str) -> Self {
        Self { original_trace, amount, return_code, rdfi_routing: RDFI_ROUTING, account: RECEIVER_ACCOUNT }
    }
}

/// A return file as an ODFI would send it back: one batch per call, with a return addenda on every entry.
pub fn return_file(effective: NaiveDate, entries: &[ReturnedEntry<'_>]) -> File {
    let header = BatchHeader::new("PPD", "Gateway", "1234567890", ODFI_ROUTING).with_effective_date(effective);
    let batch = entries.iter().enumerate().fold(Batch::new(header), |batch, (i, e)| {
        let trace = format!("{}{:07}", &RDFI_ROUTING[..8], i + 1);
        let addenda = Addenda99::new(e.return_code, e.original_trace, e.rdfi_routing);
        batch.with_entry(
            EntryDetail::new(22, e.rdfi_routing, e.account, e.amount, &trace).with_addenda(Addenda::Return(addenda)),
        )
    });
    File::new(FileHeader::new(RDFI_ROUTING, ODFI_ROUTING, effective)).with_batch(batch)
}

/// A pending transfer owned by `user_id`, matching the file built by [`transfer_file`].
pub fn new_transfer(id: &str, user_id: &str, trace: &str, amount: u64, effective: NaiveDate) -> NewTransfer {
    NewTransfer::new(id, user_id, Cents::from(amount as i64), &format!("file-{id}"), ODFI_ROUTING)
        .with_trace("PPD", trace, effective)
}

/// The originator and receiver depositories of a user, both verified.
pub fn depositories(user_id: &str) -> (NewDepository, NewDepository) {
    (
        NewDepository::verified(&format!("{user_id}-origin"), user_id, ODFI_ROUTING, ORIGINATOR_ACCOUNT),
        NewDepository::verified(&format!("{user_id}-receiver"), user_id, RDFI_ROUTING, RECEIVER_ACCOUNT),
    )
}
