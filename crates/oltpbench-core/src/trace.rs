//! Recorded-trace playback.
//!
//! A trace is two line-oriented streams read in lockstep until either runs
//! out. The first whitespace token of each line of the first stream names the
//! transaction (by name or numeric id); every other token of both lines is a
//! parameter handed to the executor.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::transaction::{TransactionType, TransactionTypes};

/// Paths of the two trace streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSource {
    pub operations: PathBuf,
    pub arguments: PathBuf,
}

impl TraceSource {
    pub fn new(operations: impl Into<PathBuf>, arguments: impl Into<PathBuf>) -> Self {
        Self {
            operations: operations.into(),
            arguments: arguments.into(),
        }
    }

    /// Opens both files and resolves every entry against `types`.
    pub fn load(&self, types: &TransactionTypes) -> CoreResult<TracePlayback> {
        let entries = TraceReader::open(&self.operations, &self.arguments)?.read_all(types)?;
        Ok(TracePlayback::new(entries))
    }
}

/// One recorded transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub transaction: TransactionType,
    pub params: Arc<[String]>,
}

/// Reader over the two trace streams.
pub struct TraceReader<O, A> {
    operations: O,
    arguments: A,
}

impl TraceReader<BufReader<File>, BufReader<File>> {
    pub fn open(operations: &Path, arguments: &Path) -> CoreResult<Self> {
        let open = |path: &Path| {
            File::open(path).map(BufReader::new).map_err(|e| {
                CoreError::Trace(format!("cannot open trace file {}: {e}", path.display()))
            })
        };
        Ok(Self::new(open(operations)?, open(arguments)?))
    }
}

impl<O: BufRead, A: BufRead> TraceReader<O, A> {
    pub fn new(operations: O, arguments: A) -> Self {
        Self {
            operations,
            arguments,
        }
    }

    /// Reads every entry in file order.
    pub fn read_all(self, types: &TransactionTypes) -> CoreResult<Vec<TraceEntry>> {
        let mut entries = Vec::new();
        for (line_no, (op_line, arg_line)) in
            self.operations.lines().zip(self.arguments.lines()).enumerate()
        {
            let op_line = op_line?;
            let arg_line = arg_line?;
            let mut tokens = op_line.split_whitespace();
            let Some(key) = tokens.next() else {
                continue;
            };
            let transaction = resolve(types, key).ok_or_else(|| {
                CoreError::Trace(format!(
                    "line {}: unknown transaction type '{key}'",
                    line_no + 1
                ))
            })?;
            let params: Vec<String> = tokens
                .chain(arg_line.split_whitespace())
                .map(str::to_string)
                .collect();
            entries.push(TraceEntry {
                transaction: transaction.clone(),
                params: params.into(),
            });
        }
        Ok(entries)
    }
}

fn resolve<'a>(types: &'a TransactionTypes, key: &str) -> Option<&'a TransactionType> {
    match key.parse::<u32>() {
        Ok(id) => types.by_id(id),
        Err(_) => types.by_name(key),
    }
}

/// Trace entries shared by every terminal of a benchmark, consumed once in order.
#[derive(Debug)]
pub struct TracePlayback {
    entries: Vec<TraceEntry>,
    cursor: AtomicUsize,
}

impl TracePlayback {
    #[must_use]
    pub fn new(entries: Vec<TraceEntry>) -> Self {
        Self {
            entries,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Claims the next entry; `None` once the trace is exhausted.
    pub fn next_entry(&self) -> Option<&TraceEntry> {
        let position = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.entries.get(position)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries not yet claimed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.entries
            .len()
            .saturating_sub(self.cursor.load(Ordering::Relaxed))
    }
}
