//! Pipeline entry point.
//!
//! One `Dashboard` per process: it owns the connection pool and the
//! extraction cache. The presentation layer calls `compute_views` on every
//! filter change; identical filter combinations reuse the cached
//! extraction and only recompute assembly and views.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, instrument};

use crate::assemble;
use crate::config::DashboardConfig;
use crate::db::QcDatabase;
use crate::error::Result;
use crate::extract::{self, ExtractOutcome, Extraction, FilterKey, FilterRequest, HaltReason};
use crate::views::{self, ViewBundle};

/// Outcome of one pipeline run. Expected empty results are `Halted`, not
/// errors; database faults surface as `Err` from `compute_views`.
#[derive(Debug)]
pub enum ComputeOutcome {
    Views(Box<ViewBundle>),
    Halted(HaltReason),
}

pub struct Dashboard {
    db: QcDatabase,
    cache: Mutex<HashMap<FilterKey, Extraction>>,
}

impl Dashboard {
    /// Connect using the supplied configuration. Fails fast on a bad
    /// connection string.
    pub async fn connect(config: &DashboardConfig) -> Result<Self> {
        let db = QcDatabase::connect(config).await?;
        Ok(Self::with_database(db))
    }

    pub fn with_database(db: QcDatabase) -> Self {
        Self {
            db,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Run the full pipeline for one filter combination: extraction (or
    /// cache hit), assembly, then all seven views.
    #[instrument(skip(self, request))]
    pub async fn compute_views(&self, request: &FilterRequest) -> Result<ComputeOutcome> {
        request.validate()?;
        let key = request.cache_key();

        let cached = {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            cache.get(&key).cloned()
        };

        let extraction = match cached {
            Some(extraction) => {
                debug!("extraction cache hit");
                extraction
            }
            None => match extract::run(&self.db, request).await? {
                ExtractOutcome::Halted(reason) => {
                    return Ok(ComputeOutcome::Halted(reason));
                }
                ExtractOutcome::Data(extraction) => {
                    let extraction = *extraction;
                    let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
                    cache.insert(key, extraction.clone());
                    extraction
                }
            },
        };

        let assembled = assemble::assemble(&extraction)?;
        let bundle = views::build(&assembled)?;
        info!(
            total = bundle.summary.total_samples,
            failed = bundle.summary.total_failed,
            "views computed"
        );
        Ok(ComputeOutcome::Views(Box::new(bundle)))
    }
}
