//! # Schema-Inferring CSV Logger
//!
//! Appends flat records to one CSV file per destination key. The first
//! record written to a destination fixes its column order; later records
//! are projected onto those columns.
//!
//! The destination table is shared between ingestion threads. Each
//! destination has its own lock, held for the whole of one `write`, so rows
//! never interleave.

use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::error::{IngestError, Result};
use crate::record::value::write_quoted;
use crate::record::FlatRecord;

/// Line terminator for every header and row
pub const LINE_TERMINATOR: char = '\n';

/// Field separator
pub const FIELD_SEPARATOR: char = ',';

/// One open CSV file and its fixed schema
#[derive(Debug)]
struct Destination {
    path: PathBuf,
    file: File,
    schema: Option<IndexSet<String>>,
    header_written: bool,
    warned_keys: HashSet<String>,
    rows_written: u64,
}

impl Destination {
    fn open(path: PathBuf) -> Result<Self> {
        let unavailable = |source| IngestError::DestinationUnavailable {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(unavailable)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(unavailable)?;

        // Reopened files already carry a header; keep its column order
        let existing_len = file.metadata().map_err(unavailable)?.len();
        let schema = if existing_len > 0 {
            read_header(&path).map_err(unavailable)?
        } else {
            None
        };

        match &schema {
            Some(columns) => info!(
                "Reopened CSV destination {} with {} columns",
                path.display(),
                columns.len()
            ),
            None => info!("Opened CSV destination {}", path.display()),
        }

        Ok(Self {
            path,
            file,
            schema,
            header_written: existing_len > 0,
            warned_keys: HashSet::new(),
            rows_written: 0,
        })
    }

    /// Render header (if due) and row into one buffer, then append it
    ///
    /// The schema is only fixed once the first row is on disk.
    fn append(&mut self, record: &FlatRecord) -> Result<()> {
        let mut out = String::new();

        let fixed = self.schema.is_some();
        let schema = self
            .schema
            .take()
            .unwrap_or_else(|| record.keys().map(str::to_string).collect());

        let write_header = !self.header_written;
        if write_header {
            for (i, column) in schema.iter().enumerate() {
                if i > 0 {
                    out.push(FIELD_SEPARATOR);
                }
                write_quoted(column, &mut out);
            }
            out.push(LINE_TERMINATOR);
        }

        for (i, column) in schema.iter().enumerate() {
            if i > 0 {
                out.push(FIELD_SEPARATOR);
            }
            if let Some(value) = record.get(column) {
                value.write_csv_field(&mut out);
            }
        }
        out.push(LINE_TERMINATOR);

        for key in record.keys() {
            if !schema.contains(key) && self.warned_keys.insert(key.to_string()) {
                warn!(
                    "Dropping column '{}' not in schema of {}",
                    key,
                    self.path.display()
                );
            }
        }

        let appended = self
            .file
            .write_all(out.as_bytes())
            .and_then(|()| self.file.flush());
        if fixed || appended.is_ok() {
            self.schema = Some(schema);
        }
        appended?;

        if write_header {
            self.header_written = true;
        }
        self.rows_written += 1;
        Ok(())
    }
}

/// Column names from the header line of an existing file
///
/// A quoted name may contain a line break, so lines are read until the
/// quotes balance. Returns `None` for a blank header.
fn read_header(path: &Path) -> io::Result<Option<IndexSet<String>>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut header = String::new();

    while reader.read_line(&mut header)? > 0 {
        if header.matches('"').count() % 2 == 0 {
            break;
        }
    }

    let line = header.trim_end_matches(|c: char| c == '\n' || c == '\r');
    if line.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(parse_header(line)))
}

/// Split one header line into column names, undoing CSV quoting
fn parse_header(line: &str) -> IndexSet<String> {
    let mut columns = IndexSet::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            FIELD_SEPARATOR if !quoted => {
                columns.insert(std::mem::take(&mut field));
            }
            other => field.push(other),
        }
    }
    columns.insert(field);

    columns
}

/// Registry of CSV destinations rooted at one directory
///
/// # Examples
///
/// ```no_run
/// use telemetry_ingest::record::FlatRecord;
/// use telemetry_ingest::telemetry::logger::DestinationTable;
///
/// let table = DestinationTable::new("./logs");
/// let mut record = FlatRecord::new();
/// record.insert("a", 1i64);
/// record.insert("b", "x");
/// table.write("session.csv", &record)?;
/// # Ok::<(), telemetry_ingest::error::IngestError>(())
/// ```
#[derive(Debug)]
pub struct DestinationTable {
    root: PathBuf,
    closed: AtomicBool,
    destinations: Mutex<HashMap<String, Arc<Mutex<Destination>>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic mid-write leaves at worst a partial row; keep logging
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DestinationTable {
    /// Create an empty table; files are created under `root` on first write
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            closed: AtomicBool::new(false),
            destinations: Mutex::new(HashMap::new()),
        }
    }

    /// Directory all destination keys are resolved against
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path a destination key maps to
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Append one record to the destination named `key`
    ///
    /// The destination is opened on first use. The first record fixes the
    /// column order and writes the header; keys outside that order are
    /// dropped, missing keys are written as empty fields.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The table has been closed (`LoggerClosed`)
    /// - The file cannot be created or opened (`DestinationUnavailable`)
    /// - The append or flush fails (`Io`)
    pub fn write(&self, key: &str, record: &FlatRecord) -> Result<()> {
        if self.is_closed() {
            return Err(IngestError::LoggerClosed);
        }

        let destination = self.destination(key)?;
        let mut destination = lock(&destination);

        // close() may have run while we waited on the lock
        if self.is_closed() {
            return Err(IngestError::LoggerClosed);
        }

        destination.append(record)?;
        debug!("Appended row {} to {}", destination.rows_written, key);
        Ok(())
    }

    fn destination(&self, key: &str) -> Result<Arc<Mutex<Destination>>> {
        let mut table = lock(&self.destinations);

        // close() sets the flag under this lock, so nothing is reopened after it
        if self.is_closed() {
            return Err(IngestError::LoggerClosed);
        }

        if let Some(existing) = table.get(key) {
            return Ok(Arc::clone(existing));
        }

        let destination = Arc::new(Mutex::new(Destination::open(self.path_for(key))?));
        table.insert(key.to_string(), Arc::clone(&destination));
        Ok(destination)
    }

    /// Column order fixed for `key`, if any record has been written to it
    pub fn schema(&self, key: &str) -> Option<Vec<String>> {
        let destination = lock(&self.destinations).get(key).cloned()?;
        let destination = lock(&destination);
        destination
            .schema
            .as_ref()
            .map(|schema| schema.iter().cloned().collect())
    }

    /// Keys of every destination opened so far, sorted
    pub fn destination_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.destinations).keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Rows appended to `key` by this process
    pub fn rows_written(&self, key: &str) -> u64 {
        lock(&self.destinations)
            .get(key)
            .map(|destination| lock(destination).rows_written)
            .unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop accepting writes, wait for in-flight writes and close all files
    ///
    /// Idempotent.
    pub fn close(&self) -> Result<()> {
        let destinations: Vec<_> = {
            let mut table = lock(&self.destinations);
            if self.closed.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            table.drain().collect()
        };
        for (key, destination) in destinations {
            let mut destination = lock(&destination);
            destination.file.flush()?;
            info!(
                "Closed {} ({} rows this session)",
                key, destination.rows_written
            );
        }

        Ok(())
    }
}
