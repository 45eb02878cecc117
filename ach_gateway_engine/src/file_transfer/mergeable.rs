//! On-disk settlement files that batches are merged into.
//!
//! Merged files live in `<storage>/merged` and are named `YYYYMMDD-<routing>-<seq>.ach`, where `seq` is a single
//! base-36 token (`1`..`9`, then `A`..`Z`). Once a file has been uploaded it is renamed with an `.uploaded` suffix,
//! which takes it out of every subsequent scan.
use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use chrono::NaiveDate;
use log::*;
use regex::Regex;
use tokio::{fs, io::AsyncWriteExt};

use crate::{
    ach::{count_records, parse_file, render_file, Batch, File, FileHeader},
    file_transfer::errors::MergeError,
};

pub const MERGED_DIR: &str = "merged";
pub const UPLOADED_SUFFIX: &str = ".uploaded";
pub const DEFAULT_MAX_LINES: usize = 10_000;
pub const FIRST_SEQUENCE: u32 = 1;
pub const MAX_SEQUENCE: u32 = 35;

const SEQUENCE_TOKENS: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn filename_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{8})-([0-9A-Za-z]+)-([0-9A-Z])\.ach$").ok()).as_ref()
}

/// Maps `0..=35` onto `"0"..="9"`, `"A"..="Z"`.
pub fn sequence_to_string(sequence: u32) -> Option<String> {
    SEQUENCE_TOKENS.get(sequence as usize).map(|b| char::from(*b).to_string())
}

fn sequence_from_token(token: &str) -> Option<u32> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.to_digit(36).filter(|_| !c.is_ascii_lowercase()),
        _ => None,
    }
}

/// The components of a merged filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedFilename {
    pub date: NaiveDate,
    pub routing_number: String,
    pub sequence: u32,
}

impl MergedFilename {
    pub fn new(date: NaiveDate, routing_number: &str, sequence: u32) -> Self {
        Self { date, routing_number: routing_number.to_string(), sequence }
    }

    /// Parses a bare filename (no directory). Uploaded files do not match.
    pub fn parse(filename: &str) -> Option<Self> {
        let caps = filename_regex()?.captures(filename)?;
        let date = NaiveDate::parse_from_str(&caps[1], "%Y%m%d").ok()?;
        let sequence = sequence_from_token(&caps[3])?;
        Some(Self { date, routing_number: caps[2].to_string(), sequence })
    }

    pub fn to_filename(&self) -> Result<String, MergeError> {
        let token = sequence_to_string(self.sequence).ok_or_else(|| MergeError::SequenceExhausted {
            routing_number: self.routing_number.clone(),
            date: self.date,
        })?;
        Ok(format!("{}-{}-{token}.ach", self.date.format("%Y%m%d"), self.routing_number))
    }
}

/// Extracts the sequence number from a merged filename. Accepts either a bare name or a path.
pub fn sequence_from_filename(filename: &str) -> Option<u32> {
    let name = Path::new(filename).file_name()?.to_str()?;
    MergedFilename::parse(name).map(|f| f.sequence)
}

/// One settlement file and the batches merged into it so far.
#[derive(Debug, Clone)]
pub struct MergeableFile {
    file: File,
    name: MergedFilename,
    dir: PathBuf,
    rendered: String,
}

impl MergeableFile {
    /// A new, empty file. The header is copied from `template` with the creation date and file id modifier set for
    /// this file.
    pub fn new(dir: &Path, template: &FileHeader, date: NaiveDate, sequence: u32) -> Result<Self, MergeError> {
        let name = MergedFilename::new(date, template.immediate_origin.trim(), sequence);
        // validates the sequence
        name.to_filename()?;
        let mut header = template.clone();
        header.file_creation_date = date;
        header.file_creation_time = None;
        header.file_id_modifier = char::from(SEQUENCE_TOKENS[sequence as usize]);
        let file = File::new(header);
        let rendered = render_file(&file);
        Ok(Self { file, name, dir: dir.to_path_buf(), rendered })
    }

    /// Reads and parses an existing merged file.
    pub async fn open(path: &Path) -> Result<Self, MergeError> {
        let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let name =
            MergedFilename::parse(filename).ok_or_else(|| MergeError::InvalidFilename(path.display().to_string()))?;
        let rendered = fs::read_to_string(path).await?;
        let file = parse_file(&rendered)?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self { file, name, dir, rendered })
    }

    /// Finds the most recent open (not yet uploaded) file for the routing number and date in `dir`.
    pub async fn latest(dir: &Path, routing_number: &str, date: NaiveDate) -> Result<Option<Self>, MergeError> {
        let latest = scan_merged_dir(dir)
            .await?
            .into_iter()
            .filter(|(name, _)| name.routing_number == routing_number && name.date == date)
            .max_by_key(|(name, _)| name.sequence);
        match latest {
            Some((_, path)) => Ok(Some(Self::open(&path).await?)),
            None => Ok(None),
        }
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn name(&self) -> &MergedFilename {
        &self.name
    }

    pub fn sequence(&self) -> u32 {
        self.name.sequence
    }

    pub fn routing_number(&self) -> &str {
        &self.name.routing_number
    }

    pub fn filename(&self) -> String {
        // the sequence is checked on construction
        self.name.to_filename().unwrap_or_default()
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(self.filename())
    }

    pub fn rendered(&self) -> &str {
        &self.rendered
    }

    /// The number of records in the rendered file, excluding block filler.
    pub fn line_count(&self) -> usize {
        count_records(&self.rendered)
    }

    pub fn batch_count(&self) -> usize {
        self.file.batches.len()
    }

    pub fn contains(&self, batch: &Batch) -> bool {
        self.file.batches.iter().any(|b| b.is_equivalent(batch))
    }

    /// Appends the batch, numbering it after the batches already present, and re-renders the file. Returns the new
    /// line count.
    pub fn push_batch(&mut self, mut batch: Batch) -> usize {
        batch.header.batch_number = self.file.batches.len() as u32 + 1;
        self.file.batches.push(batch);
        self.rendered = render_file(&self.file);
        self.line_count()
    }

    pub fn pop_batch(&mut self) -> Option<Batch> {
        let batch = self.file.batches.pop();
        self.rendered = render_file(&self.file);
        batch
    }

    /// An empty file for the same routing number and date, with the next sequence token.
    pub fn successor(&self) -> Result<Self, MergeError> {
        if self.name.sequence >= MAX_SEQUENCE {
            return Err(MergeError::SequenceExhausted {
                routing_number: self.name.routing_number.clone(),
                date: self.name.date,
            });
        }
        Self::new(&self.dir, &self.file.header, self.name.date, self.name.sequence + 1)
    }

    /// Writes the file to a temporary sibling, syncs it and renames it over the target.
    pub async fn save(&self) -> Result<PathBuf, MergeError> {
        self.stage().await?.commit().await
    }

    /// Writes and syncs the file to a temporary sibling of its target. Nothing is visible under the merged filename
    /// until the staged file is committed.
    pub async fn stage(&self) -> Result<StagedFile, MergeError> {
        fs::create_dir_all(&self.dir).await?;
        let staged = StagedFile { tmp: self.dir.join(format!(".{}.tmp", self.filename())), path: self.path() };
        let result = async {
            let mut f = fs::File::create(&staged.tmp).await?;
            f.write_all(self.rendered.as_bytes()).await?;
            f.flush().await?;
            f.sync_all().await
        }
        .await;
        if let Err(e) = result {
            staged.discard().await;
            return Err(e.into());
        }
        trace!("🗃️ Staged {} ({} records)", staged.path.display(), self.line_count());
        Ok(staged)
    }
}

/// A merged file written to a temporary sibling, waiting to be renamed into place.
#[derive(Debug)]
pub struct StagedFile {
    tmp: PathBuf,
    path: PathBuf,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Renames the staged file over its target.
    pub async fn commit(self) -> Result<PathBuf, MergeError> {
        if let Err(e) = fs::rename(&self.tmp, &self.path).await {
            self.discard().await;
            return Err(e.into());
        }
        trace!("🗃️ Saved {}", self.path.display());
        Ok(self.path)
    }

    pub async fn discard(&self) {
        if let Err(e) = fs::remove_file(&self.tmp).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("🗃️ Could not remove {}. {e}", self.tmp.display());
            }
        }
    }
}

/// Lists every open merged file in `dir`. Uploaded files, temporaries and anything else not matching the merged
/// filename pattern are ignored. A missing directory is treated as empty.
pub async fn scan_merged_dir(dir: &Path) -> Result<Vec<(MergedFilename, PathBuf)>, MergeError> {
    scan(dir, false).await
}

/// The highest sequence used for the routing number and date, counting uploaded files as well.
pub async fn highest_sequence(dir: &Path, routing_number: &str, date: NaiveDate) -> Result<Option<u32>, MergeError> {
    let seq = scan(dir, true)
        .await?
        .into_iter()
        .filter(|(name, _)| name.routing_number == routing_number && name.date == date)
        .map(|(name, _)| name.sequence)
        .max();
    Ok(seq)
}

async fn scan(dir: &Path, include_uploaded: bool) -> Result<Vec<(MergedFilename, PathBuf)>, MergeError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(e.into()),
    };
    let mut result = vec![];
    while let Some(entry) = entries.next_entry().await? {
        let filename = entry.file_name().to_string_lossy().to_string();
        let name = match filename.strip_suffix(UPLOADED_SUFFIX) {
            Some(stripped) if include_uploaded => stripped,
            Some(_) => continue,
            None => filename.as_str(),
        };
        if let Some(parsed) = MergedFilename::parse(name) {
            result.push((parsed, entry.path()));
        }
    }
    result.sort_by(|(a, _), (b, _)| (a.date, &a.routing_number, a.sequence).cmp(&(b.date, &b.routing_number, b.sequence)));
    Ok(result)
}

/// Renames an uploaded file with the `.uploaded` suffix.
pub async fn mark_uploaded(path: &Path) -> Result<PathBuf, MergeError> {
    let mut target = path.as_os_str().to_owned();
    target.push(UPLOADED_SUFFIX);
    let target = PathBuf::from(target);
    fs::rename(path, &target).await?;
    Ok(target)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ach::{BatchHeader, EntryDetail};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn header() -> FileHeader {
        FileHeader::new("231380104", "121042882", date()).with_names("Citadel", "Wells Fargo")
    }

    fn batch(trace: &str) -> Batch {
        Batch::new(BatchHeader::new("PPD", "Acme", "1234567890", "121042882").with_effective_date(date()))
            .with_entry(EntryDetail::new(22, "231380104", "12345678", 1_000, trace))
    }

    #[test]
    fn sequences_round_trip() {
        assert_eq!(sequence_to_string(0).unwrap(), "0");
        assert_eq!(sequence_to_string(9).unwrap(), "9");
        assert_eq!(sequence_to_string(10).unwrap(), "A");
        assert_eq!(sequence_to_string(35).unwrap(), "Z");
        assert_eq!(sequence_to_string(36), None);
        for seq in 0..=35 {
            let name = MergedFilename::new(date(), "121042882", seq).to_filename().unwrap();
            assert_eq!(sequence_from_filename(&name), Some(seq));
            let token = sequence_to_string(seq).unwrap();
            assert!(name.ends_with(&format!("-{token}.ach")));
        }
    }

    #[test]
    fn filenames() {
        let parsed = MergedFilename::parse("20240301-121042882-B.ach").unwrap();
        assert_eq!(parsed, MergedFilename::new(date(), "121042882", 11));
        assert_eq!(sequence_from_filename("/storage/merged/20240301-121042882-2.ach"), Some(2));
        assert_eq!(MergedFilename::parse("20240301-121042882-2.ach.uploaded"), None);
        assert_eq!(MergedFilename::parse("20240301-121042882-b.ach"), None);
        assert_eq!(MergedFilename::parse("20240301-121042882-10.ach"), None);
        assert_eq!(MergedFilename::parse("20241301-121042882-1.ach"), None);
        assert_eq!(MergedFilename::parse("notes.txt"), None);
    }

    #[test]
    fn new_files_take_the_sequence_as_file_id_modifier() {
        let f = MergeableFile::new(Path::new("/tmp"), &header(), date(), 11).unwrap();
        assert_eq!(f.file().header.file_id_modifier, 'B');
        assert_eq!(f.filename(), "20240301-121042882-B.ach");
        assert_eq!(f.line_count(), 2);
        assert!(MergeableFile::new(Path::new("/tmp"), &header(), date(), 36).is_err());
    }

    #[test]
    fn batches_are_renumbered_on_push() {
        let mut f = MergeableFile::new(Path::new("/tmp"), &header(), date(), 1).unwrap();
        assert_eq!(f.push_batch(batch("121042880000001")), 5);
        let mut second = batch("121042880000002");
        second.header.batch_number = 9;
        assert_eq!(f.push_batch(second), 8);
        assert_eq!(f.file().batches[1].header.batch_number, 2);
        assert!(f.contains(&batch("121042880000001")));
        f.pop_batch();
        assert_eq!(f.line_count(), 5);
        assert!(!f.contains(&batch("121042880000002")));
    }

    #[test]
    fn successors() {
        let f = MergeableFile::new(Path::new("/tmp"), &header(), date(), 9).unwrap();
        let next = f.successor().unwrap();
        assert_eq!(next.filename(), "20240301-121042882-A.ach");
        assert_eq!(next.batch_count(), 0);
        let last = MergeableFile::new(Path::new("/tmp"), &header(), date(), MAX_SEQUENCE).unwrap();
        assert!(matches!(last.successor(), Err(MergeError::SequenceExhausted { .. })));
    }

    #[tokio::test]
    async fn save_scan_and_mark_uploaded() {
        let _ = env_logger::try_init();
        let dir = tempfile::tempdir().unwrap();
        let mut f = MergeableFile::new(dir.path(), &header(), date(), 1).unwrap();
        f.push_batch(batch("121042880000001"));
        let path = f.save().await.unwrap();
        let next = f.successor().unwrap();
        next.save().await.unwrap();
        std::fs::write(dir.path().join("README"), "not an ach file").unwrap();

        let latest = MergeableFile::latest(dir.path(), "121042882", date()).await.unwrap().unwrap();
        assert_eq!(latest.sequence(), 2);
        let reopened = MergeableFile::open(&path).await.unwrap();
        assert_eq!(reopened.file(), f.file());
        assert_eq!(scan_merged_dir(dir.path()).await.unwrap().len(), 2);

        let uploaded = mark_uploaded(&next.path()).await.unwrap();
        assert!(uploaded.to_string_lossy().ends_with("-2.ach.uploaded"));
        let open = scan_merged_dir(dir.path()).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].0.sequence, 1);
        assert_eq!(highest_sequence(dir.path(), "121042882", date()).await.unwrap(), Some(2));
        assert_eq!(highest_sequence(dir.path(), "231380104", date()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn missing_dirs_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(scan_merged_dir(&missing).await.unwrap().is_empty());
        assert!(MergeableFile::latest(&missing, "121042882", date()).await.unwrap().is_none());
    }
}
