//! # Merge engine
//!
//! Each pending transfer (or micro-deposit) has its own single-purpose ACH file. The merge engine folds the batches
//! of those files into the shared settlement file for their origin routing number, so that an ODFI receives a handful
//! of large files a day rather than one per transfer.
//!
//! There is at most one open file per routing number and day. When appending a batch would take the file past
//! `max_lines` records, the batch is taken back out, the file is left as it is (ready to upload) and merging carries
//! on in its successor. Batches that are already present in the open file are skipped, so merging the same input
//! twice is harmless.
use std::{
    collections::VecDeque,
    mem,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use log::*;

use crate::{
    ach::{File, FileHeader},
    file_transfer::{
        errors::MergeError,
        mergeable::{highest_sequence, MergeableFile, FIRST_SEQUENCE, MAX_SEQUENCE, MERGED_DIR},
    },
};

/// The in-memory result of merging one input into a file.
#[derive(Debug)]
pub struct MergePlan {
    /// Files that filled up during the merge. Their contents are final.
    pub full: Vec<MergeableFile>,
    /// The file that remains open for further merges.
    pub open: MergeableFile,
    /// True when the open file has been modified.
    pub open_modified: bool,
    /// The file holding the last batch of the input.
    pub merged_filename: String,
    pub appended: usize,
    pub skipped: usize,
}

/// What a merge did on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub merged_filename: String,
    pub appended: usize,
    pub skipped: usize,
    /// Files that were closed during the merge and can be uploaded.
    pub ready: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MergeEngine {
    merged_dir: PathBuf,
    max_lines: usize,
}

impl MergeEngine {
    /// Merged files are kept in `<storage_root>/merged`.
    pub fn new(storage_root: &Path, max_lines: usize) -> Self {
        Self { merged_dir: storage_root.join(MERGED_DIR), max_lines }
    }

    pub fn merged_dir(&self) -> &Path {
        &self.merged_dir
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// The open file for the header's origin routing number on `date`. If there is none, a new file is allocated
    /// with the first sequence token not already used that day, including by uploaded files.
    pub async fn current_file(&self, template: &FileHeader, date: NaiveDate) -> Result<MergeableFile, MergeError> {
        let routing_number = template.immediate_origin.trim();
        if let Some(file) = MergeableFile::latest(&self.merged_dir, routing_number, date).await? {
            return Ok(file);
        }
        let sequence = match highest_sequence(&self.merged_dir, routing_number, date).await? {
            Some(seq) if seq >= MAX_SEQUENCE => {
                return Err(MergeError::SequenceExhausted { routing_number: routing_number.to_string(), date })
            },
            Some(seq) => seq + 1,
            None => FIRST_SEQUENCE,
        };
        debug!("🗃️ Starting merged file #{sequence} for {routing_number} on {date}");
        MergeableFile::new(&self.merged_dir, template, date, sequence)
    }

    /// Merges every batch of `incoming` into `current`, rolling over to successor files as they fill up. Nothing is
    /// written to disk.
    pub fn merge_into(&self, current: MergeableFile, incoming: &File) -> Result<MergePlan, MergeError> {
        if incoming.batches.is_empty() {
            return Err(MergeError::NoBatches);
        }
        let mut open = current;
        let mut open_modified = false;
        let mut full = vec![];
        let mut appended = 0;
        let mut skipped = 0;
        let mut merged_filename = open.filename();
        let mut remaining = incoming.batches.iter().cloned().collect::<VecDeque<_>>();

        while let Some(batch) = remaining.pop_front() {
            if open.contains(&batch) {
                trace!("🗃️ Batch for {} is already in {}", batch.header.company_name, open.filename());
                skipped += 1;
                merged_filename = open.filename();
                continue;
            }
            let lines = open.push_batch(batch);
            if lines == 0 {
                return Err(MergeError::EmptyFile(open.filename()));
            }
            if lines > self.max_lines {
                let batch = open.pop_batch().ok_or_else(|| MergeError::EmptyFile(open.filename()))?;
                if open.batch_count() == 0 {
                    return Err(MergeError::BatchTooLarge { lines: batch.line_count(), max: self.max_lines });
                }
                let next = open.successor()?;
                debug!("🗃️ {} is full at {} records. Continuing in {}", open.filename(), open.line_count(), next.filename());
                full.push(mem::replace(&mut open, next));
                open_modified = false;
                remaining.push_front(batch);
                continue;
            }
            open_modified = true;
            appended += 1;
            merged_filename = open.filename();
        }
        Ok(MergePlan { full, open, open_modified, merged_filename, appended, skipped })
    }

    /// Merges `incoming` into the open file for its origin routing number and persists every file that changed.
    ///
    /// Every changed file is staged before any of them is renamed into place, so a failed write leaves the merged
    /// directory as it was.
    pub async fn merge(&self, incoming: &File, date: NaiveDate) -> Result<MergeOutcome, MergeError> {
        if incoming.batches.is_empty() {
            return Err(MergeError::NoBatches);
        }
        let current = self.current_file(&incoming.header, date).await?;
        let plan = self.merge_into(current, incoming)?;
        let changed = plan.full.iter().chain(plan.open_modified.then_some(&plan.open));
        let mut staged = Vec::with_capacity(plan.full.len() + 1);
        for file in changed {
            match file.stage().await {
                Ok(s) => staged.push(s),
                Err(e) => {
                    for s in &staged {
                        s.discard().await;
                    }
                    return Err(e);
                },
            }
        }
        let mut ready = Vec::with_capacity(plan.full.len());
        let mut staged = staged.into_iter();
        while let Some(file) = staged.next() {
            match file.commit().await {
                Ok(path) if ready.len() < plan.full.len() => ready.push(path),
                Ok(_) => {},
                Err(e) => {
                    for s in staged {
                        s.discard().await;
                    }
                    return Err(e);
                },
            }
        }
        Ok(MergeOutcome {
            merged_filename: plan.merged_filename,
            appended: plan.appended,
            skipped: plan.skipped,
            ready,
        })
    }
}
