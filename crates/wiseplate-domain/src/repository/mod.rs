//! Repository trait definitions for data persistence

use chrono::NaiveDate;

use wiseplate_types::{AnalysisRecord, Error, UserId};

/// Repository for per-item analysis records
pub trait AnalysisRecordRepository {
    /// Save a new analysis record
    fn save(&self, record: &AnalysisRecord) -> Result<(), Error>;

    /// Find a record by its id
    fn find_by_id(&self, id: &str) -> Result<Option<AnalysisRecord>, Error>;

    /// Find all records
    fn find_all(&self) -> Result<Vec<AnalysisRecord>, Error>;

    /// Find records owned by a user, newest analysis date first
    fn find_by_user(&self, user: &UserId) -> Result<Vec<AnalysisRecord>, Error> {
        let mut records: Vec<_> = self
            .find_all()?
            .into_iter()
            .filter(|r| &r.user == user)
            .collect();
        records.sort_by(|a, b| b.analysis_date.cmp(&a.analysis_date));
        Ok(records)
    }

    /// Find records for an analysis date
    fn find_by_date(&self, date: NaiveDate) -> Result<Vec<AnalysisRecord>, Error> {
        Ok(self
            .find_all()?
            .into_iter()
            .filter(|r| r.analysis_date == Some(date))
            .collect())
    }
}
