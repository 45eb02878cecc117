use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};

use super::{
    writer::is_filler,
    AchError,
    Addenda,
    Addenda05,
    Addenda98,
    Addenda99,
    Batch,
    BatchHeader,
    EntryDetail,
    File,
    FileHeader,
    RECORD_LENGTH,
};

/// Parses NACHA formatted file contents.
///
/// Block filler and blank lines are ignored. Batch and file control records are validated against the parsed batches
/// and entries, but are otherwise discarded since they are always re-derived when the file is rendered.
pub fn parse_file(contents: &str) -> Result<File, AchError> {
    let mut header = None;
    let mut batches: Vec<Batch> = vec![];
    let mut current: Option<Batch> = None;
    let mut saw_control = false;

    for (i, raw) in contents.lines().enumerate() {
        let n = i + 1;
        let line = raw.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || is_filler(line) {
            continue;
        }
        if saw_control {
            return Err(AchError::parse(n, "Records found after the file control record"));
        }
        let line = normalise(line, n)?;
        match &line[0..1] {
            "1" => {
                if header.is_some() {
                    return Err(AchError::parse(n, "Duplicate file header record"));
                }
                header = Some(file_header(&line, n)?);
            },
            "5" => {
                require_header(&header, n)?;
                if current.is_some() {
                    return Err(AchError::parse(n, "Batch header found before the previous batch control"));
                }
                current = Some(Batch::new(batch_header(&line, n)?));
            },
            "6" => {
                let batch = current.as_mut().ok_or_else(|| AchError::parse(n, "Entry detail outside of a batch"))?;
                batch.entries.push(entry_detail(&line, n)?);
            },
            "7" => {
                let entry = current
                    .as_mut()
                    .and_then(|b| b.entries.last_mut())
                    .ok_or_else(|| AchError::parse(n, "Addenda record without an entry detail"))?;
                entry.addenda.push(addenda(&line, n)?);
            },
            "8" => {
                let batch = current.take().ok_or_else(|| AchError::parse(n, "Batch control without a batch header"))?;
                let count: usize = field(&line, 4, 10, n, "EntryAddendaCount")?;
                let expected = batch.line_count() - 2;
                if count != expected {
                    return Err(AchError::parse(
                        n,
                        format!("Batch control entry/addenda count is {count}, but the batch contains {expected}"),
                    ));
                }
                batches.push(batch);
            },
            "9" => {
                require_header(&header, n)?;
                if current.is_some() {
                    return Err(AchError::parse(n, "File control found inside an open batch"));
                }
                let count: usize = field(&line, 1, 7, n, "BatchCount")?;
                if count != batches.len() {
                    return Err(AchError::parse(
                        n,
                        format!("File control batch count is {count}, but the file contains {}", batches.len()),
                    ));
                }
                saw_control = true;
            },
            t => return Err(AchError::parse(n, format!("Unknown record type '{t}'"))),
        }
    }
    let header = header.ok_or(AchError::MissingFileHeader)?;
    if !saw_control {
        return Err(AchError::MissingFileControl);
    }
    Ok(File { header, batches })
}

fn require_header(header: &Option<FileHeader>, n: usize) -> Result<(), AchError> {
    match header {
        Some(_) => Ok(()),
        None => Err(AchError::parse(n, "Record found before the file header")),
    }
}

/// Short lines (trailing whitespace stripped by some transports) are padded back out to the record length.
fn normalise(line: &str, n: usize) -> Result<String, AchError> {
    if !line.is_ascii() {
        return Err(AchError::parse(n, "Record contains non-ASCII characters"));
    }
    if line.len() > RECORD_LENGTH {
        return Err(AchError::parse(n, format!("Record is {} characters long", line.len())));
    }
    Ok(format!("{line:<RECORD_LENGTH$}"))
}

fn text(line: &str, start: usize, end: usize) -> String {
    line[start..end].trim().to_string()
}

fn field<T: FromStr>(line: &str, start: usize, end: usize, n: usize, name: &str) -> Result<T, AchError> {
    let raw = line[start..end].trim();
    raw.parse::<T>().map_err(|_| AchError::parse(n, format!("Invalid {name} '{raw}'")))
}

fn char_at(line: &str, pos: usize) -> char {
    line.as_bytes()[pos] as char
}

fn file_header(line: &str, n: usize) -> Result<FileHeader, AchError> {
    let date = NaiveDate::parse_from_str(&line[23..29], "%y%m%d")
        .map_err(|_| AchError::parse(n, format!("Invalid FileCreationDate '{}'", &line[23..29])))?;
    let raw_time = line[29..33].trim();
    let time = if raw_time.is_empty() {
        None
    } else {
        let t = NaiveTime::parse_from_str(raw_time, "%H%M")
            .map_err(|_| AchError::parse(n, format!("Invalid FileCreationTime '{raw_time}'")))?;
        Some(t)
    };
    Ok(FileHeader {
        immediate_destination: text(line, 3, 13),
        immediate_origin: text(line, 13, 23),
        file_creation_date: date,
        file_creation_time: time,
        file_id_modifier: char_at(line, 33),
        immediate_destination_name: text(line, 40, 63),
        immediate_origin_name: text(line, 63, 86),
        reference_code: text(line, 86, 94),
    })
}

fn batch_header(line: &str, n: usize) -> Result<BatchHeader, AchError> {
    Ok(BatchHeader {
        service_class_code: field(line, 1, 4, n, "ServiceClassCode")?,
        company_name: text(line, 4, 20),
        company_discretionary_data: text(line, 20, 40),
        company_identification: text(line, 40, 50),
        standard_entry_class_code: text(line, 50, 53),
        company_entry_description: text(line, 53, 63),
        company_descriptive_date: text(line, 63, 69),
        effective_entry_date: text(line, 69, 75),
        originator_status_code: char_at(line, 78),
        odfi_identification: text(line, 79, 87),
        batch_number: field(line, 87, 94, n, "BatchNumber")?,
    })
}

fn entry_detail(line: &str, n: usize) -> Result<EntryDetail, AchError> {
    Ok(EntryDetail {
        transaction_code: field(line, 1, 3, n, "TransactionCode")?,
        rdfi_identification: text(line, 3, 11),
        check_digit: char_at(line, 11),
        dfi_account_number: text(line, 12, 29),
        amount: field(line, 29, 39, n, "Amount")?,
        identification_number: text(line, 39, 54),
        individual_name: text(line, 54, 76),
        discretionary_data: text(line, 76, 78),
        trace_number: text(line, 79, 94),
        addenda: vec![],
    })
}

fn addenda(line: &str, n: usize) -> Result<Addenda, AchError> {
    match &line[1..3] {
        "05" => Ok(Addenda::PaymentRelated(Addenda05 {
            payment_related_information: text(line, 3, 83),
            sequence_number: field(line, 83, 87, n, "AddendaSequenceNumber")?,
        })),
        "98" => Ok(Addenda::Correction(Addenda98 {
            change_code: text(line, 3, 6),
            original_trace: text(line, 6, 21),
            original_rdfi: text(line, 27, 35),
            corrected_data: text(line, 35, 64),
        })),
        "99" => Ok(Addenda::Return(Addenda99 {
            return_code: text(line, 3, 6),
            original_trace: text(line, 6, 21),
            date_of_death: text(line, 21, 27),
            original_rdfi: text(line, 27, 35),
            addenda_information: text(line, 35, 79),
        })),
        t => Err(AchError::parse(n, format!("Unsupported addenda type code '{t}'"))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ach::render_file;

    fn sample() -> File {
        let date = NaiveDate::from_ymd_opt(2019, 6, 24).unwrap();
        let mut header = FileHeader::new("231380104", "121042882", date).with_names("Citadel", "Wells Fargo");
        header.file_creation_time = NaiveTime::from_hms_opt(13, 45, 0);
        let batch = Batch::new(BatchHeader::new("PPD", "Acme", "1234567890", "121042882").with_effective_date(date))
            .with_entry(
                EntryDetail::new(27, "231380104", "12345678", 2_500, "121042880000001")
                    .with_name("Jane Doe")
                    .with_addenda(Addenda::Return(Addenda99::new("R14", "121042880000001", "23138010"))),
            )
            .with_entry(EntryDetail::new(22, "231380104", "87654321", 1_000, "121042880000002").with_addenda(
                Addenda::Correction(Addenda98 {
                    change_code: "C01".into(),
                    original_trace: "121042880000002".into(),
                    original_rdfi: "23138010".into(),
                    corrected_data: "1918171614".into(),
                }),
            ));
        File::new(header).with_batch(batch)
    }

    #[test]
    fn parses_rendered_files() {
        let file = sample();
        let parsed = parse_file(&render_file(&file)).expect("parse failed");
        assert_eq!(parsed, file);
        let entry = &parsed.batches[0].entries[0];
        assert_eq!(entry.return_addenda().map(|a| a.return_code.as_str()), Some("R14"));
        assert_eq!(entry.rdfi_routing_number(), "231380104");
        assert!(parsed.batches[0].entries[1].correction_addenda().is_some());
    }

    #[test]
    fn short_lines_are_padded() {
        let rendered = render_file(&sample());
        let trimmed = rendered.lines().map(str::trim_end).collect::<Vec<_>>().join("\r\n");
        assert_eq!(parse_file(&trimmed).expect("parse failed"), sample());
    }

    #[test]
    fn rejects_bad_files() {
        assert_eq!(parse_file(""), Err(AchError::MissingFileHeader));
        let rendered = render_file(&sample());
        let no_control = rendered.lines().filter(|l| !l.starts_with('9')).collect::<Vec<_>>().join("\n");
        assert_eq!(parse_file(&no_control), Err(AchError::MissingFileControl));
        let bad_count = rendered.replacen("8200000004", "8200000009", 1);
        assert!(matches!(parse_file(&bad_count), Err(AchError::ParseError { .. })));
        let garbage = format!("{rendered}X");
        assert!(matches!(parse_file(&garbage), Err(AchError::ParseError { .. })));
        let orphan = rendered.lines().filter(|l| !l.starts_with('5')).collect::<Vec<_>>().join("\n");
        assert!(matches!(parse_file(&orphan), Err(AchError::ParseError { .. })));
    }
}
