use chrono::{NaiveDate, NaiveTime};

use crate::ach::AchError;

//--------------------------------------      FileHeader      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Routing number of the institution receiving the file (usually the ODFI or the ACH operator).
    pub immediate_destination: String,
    /// Routing number (or company identifier) of the sender of the file.
    pub immediate_origin: String,
    pub file_creation_date: NaiveDate,
    pub file_creation_time: Option<NaiveTime>,
    /// Distinguishes multiple files created on the same date between the same participants. `A-Z` or `0-9`.
    pub file_id_modifier: char,
    pub immediate_destination_name: String,
    pub immediate_origin_name: String,
    pub reference_code: String,
}

impl FileHeader {
    pub fn new(destination: &str, origin: &str, creation_date: NaiveDate) -> Self {
        Self {
            immediate_destination: destination.trim().to_string(),
            immediate_origin: origin.trim().to_string(),
            file_creation_date: creation_date,
            file_creation_time: None,
            file_id_modifier: 'A',
            immediate_destination_name: String::default(),
            immediate_origin_name: String::default(),
            reference_code: String::default(),
        }
    }

    pub fn with_names(mut self, destination_name: &str, origin_name: &str) -> Self {
        self.immediate_destination_name = destination_name.to_string();
        self.immediate_origin_name = origin_name.to_string();
        self
    }
}

//--------------------------------------      BatchHeader     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchHeader {
    /// 200 (mixed), 220 (credits only) or 225 (debits only)
    pub service_class_code: u16,
    pub company_name: String,
    pub company_discretionary_data: String,
    pub company_identification: String,
    /// The Standard Entry Class code, e.g. PPD, CCD, WEB, TEL.
    pub standard_entry_class_code: String,
    pub company_entry_description: String,
    pub company_descriptive_date: String,
    /// The raw `YYMMDD` effective entry date. It is kept unparsed, since returned files can carry values that do not
    /// form a valid date. Use [`BatchHeader::effective_date`] to interpret it.
    pub effective_entry_date: String,
    pub originator_status_code: char,
    /// The first eight digits of the ODFI routing number.
    pub odfi_identification: String,
    pub batch_number: u32,
}

impl BatchHeader {
    pub fn new(sec_code: &str, company_name: &str, company_identification: &str, odfi_routing: &str) -> Self {
        Self {
            service_class_code: 200,
            company_name: company_name.to_string(),
            company_discretionary_data: String::default(),
            company_identification: company_identification.to_string(),
            standard_entry_class_code: sec_code.to_ascii_uppercase(),
            company_entry_description: String::default(),
            company_descriptive_date: String::default(),
            effective_entry_date: String::default(),
            originator_status_code: '1',
            odfi_identification: odfi_routing.chars().take(8).collect(),
            batch_number: 1,
        }
    }

    pub fn with_effective_date(mut self, date: NaiveDate) -> Self {
        self.effective_entry_date = date.format("%y%m%d").to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.company_entry_description = description.to_string();
        self
    }

    pub fn effective_date(&self) -> Result<NaiveDate, AchError> {
        NaiveDate::parse_from_str(self.effective_entry_date.trim(), "%y%m%d")
            .map_err(|e| AchError::InvalidDate(format!("EffectiveEntryDate '{}': {e}", self.effective_entry_date)))
    }

    /// Header equality, ignoring the batch number (which is re-assigned whenever a batch moves between files).
    pub fn same_as(&self, other: &BatchHeader) -> bool {
        let mut other = other.clone();
        other.batch_number = self.batch_number;
        *self == other
    }
}

//--------------------------------------      EntryDetail     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDetail {
    pub transaction_code: u8,
    /// The first eight digits of the receiver's routing number
    pub rdfi_identification: String,
    pub check_digit: char,
    pub dfi_account_number: String,
    /// The amount, in cents
    pub amount: u64,
    pub identification_number: String,
    pub individual_name: String,
    pub discretionary_data: String,
    pub trace_number: String,
    pub addenda: Vec<Addenda>,
}

impl EntryDetail {
    pub fn new(transaction_code: u8, rdfi_routing: &str, account: &str, amount: u64, trace_number: &str) -> Self {
        let routing = rdfi_routing.trim();
        let rdfi_identification = routing.chars().take(8).collect();
        let check_digit = routing.chars().nth(8).unwrap_or('0');
        Self {
            transaction_code,
            rdfi_identification,
            check_digit,
            dfi_account_number: account.trim().to_string(),
            amount,
            identification_number: String::default(),
            individual_name: String::default(),
            discretionary_data: String::default(),
            trace_number: trace_number.to_string(),
            addenda: vec![],
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.individual_name = name.to_string();
        self
    }

    pub fn with_addenda(mut self, addenda: Addenda) -> Self {
        self.addenda.push(addenda);
        self
    }

    /// The full 9-digit routing number of the receiving institution.
    pub fn rdfi_routing_number(&self) -> String {
        format!("{}{}", self.rdfi_identification, self.check_digit)
    }

    /// Transaction codes ending in 5-9 debit the receiver's account.
    pub fn is_debit(&self) -> bool {
        self.transaction_code % 10 >= 5
    }

    pub fn return_addenda(&self) -> Option<&Addenda99> {
        self.addenda.iter().find_map(|a| match a {
            Addenda::Return(a) => Some(a),
            _ => None,
        })
    }

    pub fn correction_addenda(&self) -> Option<&Addenda98> {
        self.addenda.iter().find_map(|a| match a {
            Addenda::Correction(a) => Some(a),
            _ => None,
        })
    }

    pub fn line_count(&self) -> usize {
        1 + self.addenda.len()
    }
}

//--------------------------------------        Addenda       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Addenda {
    PaymentRelated(Addenda05),
    Correction(Addenda98),
    Return(Addenda99),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addenda05 {
    pub payment_related_information: String,
    pub sequence_number: u16,
}

/// Notification of change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addenda98 {
    pub change_code: String,
    pub original_trace: String,
    pub original_rdfi: String,
    pub corrected_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addenda99 {
    pub return_code: String,
    pub original_trace: String,
    pub date_of_death: String,
    pub original_rdfi: String,
    pub addenda_information: String,
}

impl Addenda99 {
    pub fn new(return_code: &str, original_trace: &str, original_rdfi: &str) -> Self {
        Self {
            return_code: return_code.to_string(),
            original_trace: original_trace.to_string(),
            date_of_death: String::default(),
            original_rdfi: original_rdfi.chars().take(8).collect(),
            addenda_information: String::default(),
        }
    }
}

//--------------------------------------         Batch        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub header: BatchHeader,
    pub entries: Vec<EntryDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchControl {
    pub service_class_code: u16,
    pub entry_addenda_count: usize,
    pub entry_hash: u64,
    pub total_debit: u64,
    pub total_credit: u64,
    pub company_identification: String,
    pub odfi_identification: String,
    pub batch_number: u32,
}

impl Batch {
    pub fn new(header: BatchHeader) -> Self {
        Self { header, entries: vec![] }
    }

    pub fn with_entry(mut self, entry: EntryDetail) -> Self {
        self.entries.push(entry);
        self
    }

    /// Header + entries + addenda + control
    pub fn line_count(&self) -> usize {
        2 + self.entries.iter().map(EntryDetail::line_count).sum::<usize>()
    }

    /// Two batches are equivalent when their headers match (ignoring the batch number) and they contain the same set
    /// of entries, regardless of order.
    pub fn is_equivalent(&self, other: &Batch) -> bool {
        if !self.header.same_as(&other.header) || self.entries.len() != other.entries.len() {
            return false;
        }
        let mut ours = self.entries.iter().collect::<Vec<_>>();
        let mut theirs = other.entries.iter().collect::<Vec<_>>();
        ours.sort_by(|a, b| a.trace_number.cmp(&b.trace_number));
        theirs.sort_by(|a, b| a.trace_number.cmp(&b.trace_number));
        ours == theirs
    }

    pub fn control(&self) -> BatchControl {
        let (total_debit, total_credit) = self.entries.iter().fold((0u64, 0u64), |(dr, cr), e| {
            if e.is_debit() {
                (dr + e.amount, cr)
            } else {
                (dr, cr + e.amount)
            }
        });
        BatchControl {
            service_class_code: self.header.service_class_code,
            entry_addenda_count: self.line_count() - 2,
            entry_hash: entry_hash(&self.entries),
            total_debit,
            total_credit,
            company_identification: self.header.company_identification.clone(),
            odfi_identification: self.header.odfi_identification.clone(),
            batch_number: self.header.batch_number,
        }
    }
}

/// The sum of the 8-digit RDFI identifications, truncated to the rightmost ten digits.
fn entry_hash(entries: &[EntryDetail]) -> u64 {
    let sum = entries.iter().map(|e| e.rdfi_identification.trim().parse::<u64>().unwrap_or_default()).sum::<u64>();
    sum % 10_000_000_000
}

//--------------------------------------          File        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub header: FileHeader,
    pub batches: Vec<Batch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileControl {
    pub batch_count: usize,
    pub block_count: usize,
    pub entry_addenda_count: usize,
    pub entry_hash: u64,
    pub total_debit: u64,
    pub total_credit: u64,
}

impl File {
    pub fn new(header: FileHeader) -> Self {
        Self { header, batches: vec![] }
    }

    pub fn with_batch(mut self, batch: Batch) -> Self {
        self.batches.push(batch);
        self
    }

    /// The routing number this file originates from, used to group files for merging.
    pub fn origin_routing_number(&self) -> &str {
        self.header.immediate_origin.trim()
    }

    /// File header + batches + file control, excluding block filler.
    pub fn line_count(&self) -> usize {
        2 + self.batches.iter().map(Batch::line_count).sum::<usize>()
    }

    pub fn control(&self) -> FileControl {
        let controls = self.batches.iter().map(Batch::control).collect::<Vec<_>>();
        let lines = self.line_count();
        FileControl {
            batch_count: self.batches.len(),
            block_count: lines.div_ceil(super::BLOCKING_FACTOR),
            entry_addenda_count: controls.iter().map(|c| c.entry_addenda_count).sum(),
            entry_hash: controls.iter().map(|c| c.entry_hash).sum::<u64>() % 10_000_000_000,
            total_debit: controls.iter().map(|c| c.total_debit).sum(),
            total_credit: controls.iter().map(|c| c.total_credit).sum(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn batch(traces: &[&str]) -> Batch {
        let header = BatchHeader::new("PPD", "Acme", "1234567890", "121042882");
        traces.iter().fold(Batch::new(header), |b, t| {
            b.with_entry(EntryDetail::new(22, "231380104", "744-5678-99", 10_000, t))
        })
    }

    #[test]
    fn equivalence_ignores_order_and_batch_number() {
        let a = batch(&["121042880000001", "121042880000002"]);
        let mut b = batch(&["121042880000002", "121042880000001"]);
        b.header.batch_number = 7;
        assert!(a.is_equivalent(&b));
        let c = batch(&["121042880000001", "121042880000003"]);
        assert!(!a.is_equivalent(&c));
        let d = batch(&["121042880000001"]);
        assert!(!a.is_equivalent(&d));
    }

    #[test]
    fn controls() {
        let mut b = batch(&["121042880000001", "121042880000002"]);
        b.entries.push(EntryDetail::new(27, "231380104", "1", 2_500, "121042880000003"));
        let control = b.control();
        assert_eq!(control.entry_addenda_count, 3);
        assert_eq!(control.total_credit, 20_000);
        assert_eq!(control.total_debit, 2_500);
        assert_eq!(control.entry_hash, 3 * 23_138_010);
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let file = File::new(FileHeader::new("231380104", "121042882", date)).with_batch(b.clone()).with_batch(b);
        assert_eq!(file.line_count(), 12);
        let control = file.control();
        assert_eq!(control.batch_count, 2);
        assert_eq!(control.block_count, 2);
        assert_eq!(control.entry_addenda_count, 6);
    }

    #[test]
    fn effective_dates() {
        let header = BatchHeader::new("PPD", "Acme", "1", "121042882")
            .with_effective_date(NaiveDate::from_ymd_opt(2019, 6, 24).unwrap());
        assert_eq!(header.effective_entry_date, "190624");
        assert_eq!(header.effective_date().unwrap(), NaiveDate::from_ymd_opt(2019, 6, 24).unwrap());
        let mut bad = header.clone();
        bad.effective_entry_date = "19XX24".into();
        assert!(matches!(bad.effective_date(), Err(AchError::InvalidDate(_))));
    }
}
