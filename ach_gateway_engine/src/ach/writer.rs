use std::fmt::Write;

use super::{Addenda, Batch, EntryDetail, File, BLOCKING_FACTOR, RECORD_LENGTH};

/// Renders the file as NACHA fixed-width records, including block filler. Every line is terminated with `\n`.
pub fn render_file(file: &File) -> String {
    let mut lines = Vec::with_capacity(file.line_count() + BLOCKING_FACTOR);
    lines.push(file_header(file));
    for batch in &file.batches {
        render_batch(batch, &mut lines);
    }
    lines.push(file_control(file));
    let filler = "9".repeat(RECORD_LENGTH);
    while lines.len() % BLOCKING_FACTOR != 0 {
        lines.push(filler.clone());
    }
    let mut out = String::with_capacity(lines.len() * (RECORD_LENGTH + 1));
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Counts the records in rendered file contents, ignoring blank lines and block filler records.
pub fn count_records(contents: &str) -> usize {
    contents.lines().map(str::trim_end).filter(|l| !l.is_empty() && !is_filler(l)).count()
}

pub(crate) fn is_filler(line: &str) -> bool {
    line.len() == RECORD_LENGTH && line.bytes().all(|b| b == b'9')
}

fn render_batch(batch: &Batch, lines: &mut Vec<String>) {
    lines.push(batch_header(batch));
    for entry in &batch.entries {
        lines.push(entry_detail(entry));
        for (i, addenda) in entry.addenda.iter().enumerate() {
            lines.push(addenda_record(entry, addenda, i));
        }
    }
    lines.push(batch_control(batch));
}

fn file_header(file: &File) -> String {
    let h = &file.header;
    let time = h.file_creation_time.map(|t| t.format("%H%M").to_string()).unwrap_or_default();
    let mut s = String::with_capacity(RECORD_LENGTH);
    s.push_str("101");
    s.push_str(&right(&h.immediate_destination, 10));
    s.push_str(&right(&h.immediate_origin, 10));
    s.push_str(&h.file_creation_date.format("%y%m%d").to_string());
    s.push_str(&alpha(&time, 4));
    s.push(h.file_id_modifier);
    s.push_str("094101");
    s.push_str(&alpha(&h.immediate_destination_name, 23));
    s.push_str(&alpha(&h.immediate_origin_name, 23));
    s.push_str(&alpha(&h.reference_code, 8));
    s
}

fn batch_header(batch: &Batch) -> String {
    let h = &batch.header;
    let mut s = String::with_capacity(RECORD_LENGTH);
    s.push('5');
    s.push_str(&numeric(u64::from(h.service_class_code), 3));
    s.push_str(&alpha(&h.company_name, 16));
    s.push_str(&alpha(&h.company_discretionary_data, 20));
    s.push_str(&alpha(&h.company_identification, 10));
    s.push_str(&alpha(&h.standard_entry_class_code, 3));
    s.push_str(&alpha(&h.company_entry_description, 10));
    s.push_str(&alpha(&h.company_descriptive_date, 6));
    s.push_str(&alpha(&h.effective_entry_date, 6));
    s.push_str(&alpha("", 3));
    s.push(h.originator_status_code);
    s.push_str(&alpha(&h.odfi_identification, 8));
    s.push_str(&numeric(u64::from(h.batch_number), 7));
    s
}

fn entry_detail(e: &EntryDetail) -> String {
    let mut s = String::with_capacity(RECORD_LENGTH);
    s.push('6');
    s.push_str(&numeric(u64::from(e.transaction_code), 2));
    s.push_str(&alpha(&e.rdfi_identification, 8));
    s.push(e.check_digit);
    s.push_str(&alpha(&e.dfi_account_number, 17));
    s.push_str(&numeric(e.amount, 10));
    s.push_str(&alpha(&e.identification_number, 15));
    s.push_str(&alpha(&e.individual_name, 22));
    s.push_str(&alpha(&e.discretionary_data, 2));
    s.push(if e.addenda.is_empty() { '0' } else { '1' });
    s.push_str(&alpha(&e.trace_number, 15));
    s
}

fn addenda_record(entry: &EntryDetail, addenda: &Addenda, index: usize) -> String {
    let mut s = String::with_capacity(RECORD_LENGTH);
    s.push('7');
    match addenda {
        Addenda::PaymentRelated(a) => {
            s.push_str("05");
            s.push_str(&alpha(&a.payment_related_information, 80));
            let seq = if a.sequence_number == 0 { index as u64 + 1 } else { u64::from(a.sequence_number) };
            s.push_str(&numeric(seq, 4));
            let entry_seq = entry.trace_number.chars().rev().take(7).collect::<Vec<_>>();
            let entry_seq = entry_seq.into_iter().rev().collect::<String>();
            s.push_str(&right_zero(&entry_seq, 7));
        },
        Addenda::Correction(a) => {
            s.push_str("98");
            s.push_str(&alpha(&a.change_code, 3));
            s.push_str(&alpha(&a.original_trace, 15));
            s.push_str(&alpha("", 6));
            s.push_str(&alpha(&a.original_rdfi, 8));
            s.push_str(&alpha(&a.corrected_data, 29));
            s.push_str(&alpha("", 15));
            s.push_str(&alpha(&entry.trace_number, 15));
        },
        Addenda::Return(a) => {
            s.push_str("99");
            s.push_str(&alpha(&a.return_code, 3));
            s.push_str(&alpha(&a.original_trace, 15));
            s.push_str(&alpha(&a.date_of_death, 6));
            s.push_str(&alpha(&a.original_rdfi, 8));
            s.push_str(&alpha(&a.addenda_information, 44));
            s.push_str(&alpha(&entry.trace_number, 15));
        },
    }
    s
}

fn batch_control(batch: &Batch) -> String {
    let c = batch.control();
    let mut s = String::with_capacity(RECORD_LENGTH);
    s.push('8');
    s.push_str(&numeric(u64::from(c.service_class_code), 3));
    s.push_str(&numeric(c.entry_addenda_count as u64, 6));
    s.push_str(&numeric(c.entry_hash, 10));
    s.push_str(&numeric(c.total_debit, 12));
    s.push_str(&numeric(c.total_credit, 12));
    s.push_str(&alpha(&c.company_identification, 10));
    s.push_str(&alpha("", 19));
    s.push_str(&alpha("", 6));
    s.push_str(&alpha(&c.odfi_identification, 8));
    s.push_str(&numeric(u64::from(c.batch_number), 7));
    s
}

fn file_control(file: &File) -> String {
    let c = file.control();
    let mut s = String::with_capacity(RECORD_LENGTH);
    s.push('9');
    s.push_str(&numeric(c.batch_count as u64, 6));
    s.push_str(&numeric(c.block_count as u64, 6));
    s.push_str(&numeric(c.entry_addenda_count as u64, 8));
    s.push_str(&numeric(c.entry_hash, 10));
    s.push_str(&numeric(c.total_debit, 12));
    s.push_str(&numeric(c.total_credit, 12));
    s.push_str(&alpha("", 39));
    s
}

/// Left-justified, space padded, truncated to `len` characters. Non-ASCII characters are replaced with spaces.
fn alpha(value: &str, len: usize) -> String {
    let mut s = value.chars().take(len).map(|c| if c.is_ascii() { c } else { ' ' }).collect::<String>();
    let pad = len - s.chars().count();
    s.extend(std::iter::repeat(' ').take(pad));
    s
}

/// Right-justified, space padded. Used for the immediate destination/origin fields.
fn right(value: &str, len: usize) -> String {
    let chars = value.trim().chars().filter(char::is_ascii).collect::<Vec<_>>();
    let value = chars[chars.len().saturating_sub(len)..].iter().collect::<String>();
    format!("{value:>len$}")
}

fn right_zero(value: &str, len: usize) -> String {
    format!("{value:0>len$}")
}

/// Zero padded, keeping the rightmost `len` digits.
fn numeric(value: u64, len: usize) -> String {
    let mut s = String::with_capacity(len);
    let _ = write!(s, "{value:0len$}");
    s[s.len() - len..].to_string()
}
