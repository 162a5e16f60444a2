//! A single CSV file used as an append-mostly table.
//!
//! Reads open a fresh reader each time and stream rows lazily. Writes take a
//! [`TableGuard`] for this table, so a read-modify-write sequence runs under
//! one exclusive hold.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::StringRecord;
use serde::Serialize;

use super::error::StoreError;
use super::lock::{TableGuard, TableLocks};

#[derive(Debug, Clone)]
pub struct CsvTable {
    path: PathBuf,
    locks: Arc<TableLocks>,
}

impl CsvTable {
    pub fn new(path: impl Into<PathBuf>, locks: Arc<TableLocks>) -> Self {
        Self {
            path: path.into(),
            locks,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn lock(&self) -> Result<TableGuard, StoreError> {
        self.locks.acquire(&self.path)
    }

    /// Whether the table has been created. A missing parent directory is an
    /// error rather than an absent table.
    pub fn exists(&self) -> Result<bool, StoreError> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() > 0),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                match self.path.parent() {
                    Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => {
                        Err(StoreError::NotFound(dir.to_path_buf()))
                    }
                    _ => Ok(false),
                }
            }
            Err(err) => Err(StoreError::io(&self.path, err)),
        }
    }

    fn check(&self, guard: &TableGuard) -> Result<(), StoreError> {
        if guard.covers(&self.path) {
            Ok(())
        } else {
            Err(StoreError::format(
                self.name(),
                "write attempted with a guard for another table",
            ))
        }
    }

    /// Create the table with an optional tag line and a header if it does not
    /// exist yet. Returns whether it was created.
    pub fn ensure(&self, guard: &TableGuard, tag: Option<&str>, header: &[&str]) -> Result<bool, StoreError> {
        self.check(guard)?;
        if self.exists()? {
            return Ok(false);
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        if let Some(tag) = tag {
            writeln!(file, "{tag}").map_err(|e| StoreError::io(&self.path, e))?;
        }
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(header)
            .map_err(|e| StoreError::csv(&self.path, e))?;
        writer.flush().map_err(|e| StoreError::io(&self.path, e))?;

        tracing::info!(table = %self.path.display(), "created table");
        Ok(true)
    }

    fn appender(&self) -> Result<csv::Writer<File>, StoreError> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::io(&self.path, e))?;
        Ok(csv::WriterBuilder::new().has_headers(false).from_writer(file))
    }

    pub fn append<I, T>(&self, guard: &TableGuard, record: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.check(guard)?;
        let mut writer = self.appender()?;
        writer
            .write_record(record)
            .map_err(|e| StoreError::csv(&self.path, e))?;
        writer.flush().map_err(|e| StoreError::io(&self.path, e))
    }

    /// Append one serde row; fields are written in declaration order.
    pub fn append_serialized<T: Serialize>(&self, guard: &TableGuard, row: &T) -> Result<(), StoreError> {
        self.check(guard)?;
        let mut writer = self.appender()?;
        writer
            .serialize(row)
            .map_err(|e| StoreError::csv(&self.path, e))?;
        writer.flush().map_err(|e| StoreError::io(&self.path, e))
    }

    /// Replace the table's contents through a temporary file and a rename.
    pub fn rewrite(
        &self,
        guard: &TableGuard,
        tag: Option<&str>,
        header: &StringRecord,
        rows: &[StringRecord],
    ) -> Result<(), StoreError> {
        self.check(guard)?;
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let mut file = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        if let Some(tag) = tag {
            writeln!(file, "{tag}").map_err(|e| StoreError::io(&tmp, e))?;
        }
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);
        writer
            .write_record(header)
            .map_err(|e| StoreError::csv(&tmp, e))?;
        for row in rows {
            writer.write_record(row).map_err(|e| StoreError::csv(&tmp, e))?;
        }
        writer.flush().map_err(|e| StoreError::io(&tmp, e))?;
        drop(writer);

        fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))
    }

    /// Open a fresh reader, or `None` if the table has not been created.
    pub fn read(&self) -> Result<Option<TableReader>, StoreError> {
        if !self.exists()? {
            return Ok(None);
        }
        TableReader::open(&self.path).map(Some)
    }
}

/// Streaming reader over one table. Yields data rows in insertion order.
pub struct TableReader {
    path: PathBuf,
    tag: Option<String>,
    header: StringRecord,
    records: csv::StringRecordsIntoIter<BufReader<File>>,
}

impl std::fmt::Debug for TableReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableReader")
            .field("path", &self.path)
            .field("tag", &self.tag)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl TableReader {
    fn open(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path).map_err(|e| StoreError::io(path, e))?;
        let mut reader = BufReader::new(file);

        let mut first = String::new();
        reader
            .read_line(&mut first)
            .map_err(|e| StoreError::io(path, e))?;
        let tag = if first.starts_with('#') {
            Some(first.trim().to_string())
        } else {
            reader
                .seek(SeekFrom::Start(0))
                .map_err(|e| StoreError::io(path, e))?;
            None
        };

        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let header = csv_reader
            .headers()
            .map_err(|e| StoreError::csv(path, e))?
            .clone();

        Ok(Self {
            path: path.to_path_buf(),
            tag,
            header,
            records: csv_reader.into_records(),
        })
    }

    /// The `#...` line above the header, if any.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn header(&self) -> &StringRecord {
        &self.header
    }
}

impl Iterator for TableReader {
    type Item = Result<StringRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.records
            .next()
            .map(|r| r.map_err(|e| StoreError::csv(&self.path, e)))
    }
}

/// Cells of a record as string slices.
pub fn cells(record: &StringRecord) -> Vec<&str> {
    record.iter().collect()
}
