//! JSON-file record store backing the `batch` command.
//!
//! The file holds an array of records. Records without both coordinates are
//! pending; resolutions and failures are applied in memory and written back
//! with [`JsonFileStore::save`].

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use geoqueue_core::orchestrator::CollaboratorFuture;
use geoqueue_core::{
    CollaboratorError, GeocodeError, ResolutionSink, ResolvedLocation, WorkItem, WorkSource,
};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(flatten)]
    pub item: WorkItem,
    #[serde(default, alias = "lat", skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, alias = "lng", skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geocoded_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geocoding_provider: Option<String>,
    /// Last failure code, cleared once the record resolves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geocoding_error: Option<String>,
}

impl StoredRecord {
    pub fn is_pending(&self) -> bool {
        self.latitude.is_none() || self.longitude.is_none()
    }
}

#[derive(Debug, Default)]
pub struct JsonFileStore {
    records: Mutex<Vec<StoredRecord>>,
}

impl JsonFileStore {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let raw = std::fs::read_to_string(path)?;
        let records = serde_json::from_str::<Vec<StoredRecord>>(&raw)?;
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<StoredRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn records(&self) -> Vec<StoredRecord> {
        self.lock().clone()
    }

    pub fn save(&self, path: &Path) -> Result<(), CliError> {
        let body = serde_json::to_vec_pretty(&*self.lock())?;
        std::fs::write(path, body)?;
        Ok(())
    }

    fn update<F>(&self, record_id: &str, apply: F) -> Result<(), CollaboratorError>
    where
        F: FnOnce(&mut StoredRecord),
    {
        let mut records = self.lock();
        let record = records
            .iter_mut()
            .find(|record| record.item.id == record_id)
            .ok_or_else(|| CollaboratorError::new(format!("record '{record_id}' not found")))?;
        apply(record);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StoredRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WorkSource for JsonFileStore {
    fn fetch_pending<'a>(&'a self) -> CollaboratorFuture<'a, Vec<WorkItem>> {
        Box::pin(async move {
            Ok(self
                .lock()
                .iter()
                .filter(|record| record.is_pending())
                .map(|record| record.item.clone())
                .collect())
        })
    }
}

impl ResolutionSink for JsonFileStore {
    fn persist_resolution<'a>(
        &'a self,
        record_id: &'a str,
        location: &'a ResolvedLocation,
    ) -> CollaboratorFuture<'a, ()> {
        Box::pin(async move {
            self.update(record_id, |record| {
                record.latitude = Some(location.latitude);
                record.longitude = Some(location.longitude);
                record.geocoded_address = Some(location.display_address.clone());
                record.geocoding_provider = Some(location.provider.clone());
                record.geocoding_error = None;
            })
        })
    }

    fn mark_failed<'a>(
        &'a self,
        record_id: &'a str,
        reason: &'a GeocodeError,
    ) -> CollaboratorFuture<'a, ()> {
        Box::pin(async move {
            self.update(record_id, |record| {
                record.geocoding_error = Some(reason.code().to_owned());
            })
        })
    }
}
