//! Inbound files from an ODFI carry notifications of change: addenda 98 records telling the originator that some
//! detail of an entry (usually the account or routing number) should be corrected for future entries. They are
//! logged for an operator to act on.
use agw_common::helpers::mask_account_number;
use log::*;

use crate::ach::{Addenda98, File};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub trace_number: String,
    pub change_code: String,
    pub original_trace: String,
    pub corrected_data: String,
}

impl ChangeNotification {
    fn new(trace_number: &str, addenda: &Addenda98) -> Self {
        Self {
            trace_number: trace_number.to_string(),
            change_code: addenda.change_code.clone(),
            original_trace: addenda.original_trace.clone(),
            corrected_data: addenda.corrected_data.clone(),
        }
    }
}

/// Collects every notification of change in the file.
pub fn notifications_of_change(file: &File) -> Vec<ChangeNotification> {
    file.batches
        .iter()
        .flat_map(|b| b.entries.iter())
        .filter_map(|e| e.correction_addenda().map(|a| ChangeNotification::new(&e.trace_number, a)))
        .collect()
}

/// Logs the notifications of change in an inbound file and returns how many there were.
pub fn log_notifications_of_change(filename: &str, file: &File) -> usize {
    let notifications = notifications_of_change(file);
    for noc in &notifications {
        info!(
            "📥️ Notification of change in {filename}: entry {} (original trace {}) change code {} corrected data {}",
            noc.trace_number,
            noc.original_trace,
            noc.change_code,
            mask_account_number(&noc.corrected_data)
        );
    }
    if notifications.is_empty() {
        debug!("📥️ {filename} contains no notifications of change");
    }
    notifications.len()
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use super::*;
    use crate::ach::{Addenda, Batch, BatchHeader, EntryDetail, FileHeader};

    #[test]
    fn finds_change_notifications() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let noc = Addenda98 {
            change_code: "C01".into(),
            original_trace: "121042880000001".into(),
            original_rdfi: "23138010".into(),
            corrected_data: "1918171614".into(),
        };
        let batch = Batch::new(BatchHeader::new("COR", "Acme", "1234567890", "231380104"))
            .with_entry(EntryDetail::new(21, "121042882", "12345678", 0, "231380100000001").with_addenda(Addenda::Correction(noc)))
            .with_entry(EntryDetail::new(22, "121042882", "12345678", 100, "231380100000002"));
        let file = File::new(FileHeader::new("121042882", "231380104", date)).with_batch(batch);
        let found = notifications_of_change(&file);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].change_code, "C01");
        assert_eq!(found[0].trace_number, "231380100000001");
        assert_eq!(log_notifications_of_change("noc.ach", &file), 1);
    }
}
