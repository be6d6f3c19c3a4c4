//! File-based analysis record repository implementation

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::warn;
use wiseplate_domain::repository::AnalysisRecordRepository;
use wiseplate_types::{AnalysisRecord, Error, Result, StoreError};

/// File name of the record store inside the store directory
pub const RECORDS_FILE: &str = "analysis_records.json";

/// Extension appended to a store file that could not be parsed
pub const CORRUPT_SUFFIX: &str = "corrupt";

/// File-based implementation of AnalysisRecordRepository
///
/// Stores records as a JSON array, rewritten on every save through a
/// temp file in the same directory.
pub struct FileAnalysisRecordRepository {
    store_path: PathBuf,
    records: RefCell<Vec<AnalysisRecord>>,
}

impl FileAnalysisRecordRepository {
    /// Create or load a record repository
    ///
    /// An unparsable store is moved aside to `analysis_records.json.corrupt`
    /// and the repository starts empty.
    pub fn open(store_dir: &Path) -> Result<Self> {
        fs::create_dir_all(store_dir)?;
        let store_path = store_dir.join(RECORDS_FILE);

        let records = if store_path.exists() {
            let file = File::open(&store_path)?;
            let reader = BufReader::new(file);
            match serde_json::from_reader::<_, Vec<AnalysisRecord>>(reader) {
                Ok(records) => records,
                Err(e) => {
                    let err = StoreError::Corrupted(format!("{}: {}", store_path.display(), e));
                    let backup = corrupt_backup_path(&store_path);
                    match fs::rename(&store_path, &backup) {
                        Ok(()) => warn!(
                            error = %err,
                            backup = %backup.display(),
                            "Record store unreadable, starting empty"
                        ),
                        Err(rename_err) => warn!(
                            error = %err,
                            rename_error = %rename_err,
                            "Record store unreadable and could not be moved aside, starting empty"
                        ),
                    }
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Ok(Self {
            store_path,
            records: RefCell::new(records),
        })
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Save store to disk
    fn persist(&self) -> Result<()> {
        let store_dir = self.store_path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(store_dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &*self.records.borrow())?;
            writer.flush()?;
        }
        temp.persist(&self.store_path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn corrupt_backup_path(store_path: &Path) -> PathBuf {
    let mut name = store_path.as_os_str().to_owned();
    name.push(".");
    name.push(CORRUPT_SUFFIX);
    PathBuf::from(name)
}

impl AnalysisRecordRepository for FileAnalysisRecordRepository {
    fn save(&self, record: &AnalysisRecord) -> std::result::Result<(), Error> {
        self.records.borrow_mut().push(record.clone());
        if let Err(e) = self.persist() {
            // Keep memory and disk in agreement
            self.records.borrow_mut().pop();
            return Err(e);
        }
        Ok(())
    }

    fn find_by_id(&self, id: &str) -> std::result::Result<Option<AnalysisRecord>, Error> {
        Ok(self.records.borrow().iter().find(|r| r.id == id).cloned())
    }

    fn find_all(&self) -> std::result::Result<Vec<AnalysisRecord>, Error> {
        Ok(self.records.borrow().clone())
    }
}
