//! Filter resolution and staged extraction.
//!
//! The pipeline is strictly linear: resolve display names to ids, fetch
//! samples, reduce approvals to the latest per sample, then fetch defect
//! and reagent-failure rows. Resolution misses are expected outcomes, not
//! errors; they halt the run with a user-facing reason.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::{
    ApprovalRow, FillLineLookup, FillLineRow, LocationRow, ProductRow, QcDatabase, ReagentFailRow,
    SampleDefectRow, SampleRow, SpecRow,
};
use crate::error::{QcError, Result};
use crate::schema::catalog;

// ── Filter request ──────────────────────────────────────────────────────────

/// Typed request parameters mapped from the presentation layer's inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRequest {
    /// Inclusive start of the collection window.
    pub start_date: NaiveDate,
    /// Exclusive end of the collection window.
    pub end_date: NaiveDate,
    pub products: Vec<String>,
    pub locations: Vec<String>,
    pub fill_lines: Vec<String>,
}

impl Default for FilterRequest {
    /// The filter state the dashboard opens with.
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 5, 15).unwrap(),
            products: vec!["203".to_string()],
            locations: vec!["Newark".to_string()],
            fill_lines: catalog::FILL_LINES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl FilterRequest {
    /// Precondition check; runs before any query.
    pub fn validate(&self) -> Result<()> {
        if self.products.is_empty() || self.locations.is_empty() {
            return Err(QcError::InvalidFilter(
                "select at least one product and one location".to_string(),
            ));
        }
        Ok(())
    }

    /// Cache key for the exact filter combination. Name lists are sorted
    /// so selection order does not defeat the cache.
    pub fn cache_key(&self) -> FilterKey {
        let mut products = self.products.clone();
        let mut locations = self.locations.clone();
        let mut fill_lines = self.fill_lines.clone();
        products.sort();
        locations.sort();
        fill_lines.sort();
        FilterKey {
            start_date: self.start_date,
            end_date: self.end_date,
            products,
            locations,
            fill_lines,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterKey {
    start_date: NaiveDate,
    end_date: NaiveDate,
    products: Vec<String>,
    locations: Vec<String>,
    fill_lines: Vec<String>,
}

// ── Halt reasons ────────────────────────────────────────────────────────────

/// Expected empty outcomes that stop the pipeline without an error.
/// `NoSamples` is informational; the rest indicate filters that resolved
/// to nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    NoProductsMatched,
    NoLocationsMatched,
    NoFillLinesMatched,
    NoFillLineIdColumn,
    NoSamples,
}

impl HaltReason {
    pub fn message(&self) -> &'static str {
        match self {
            Self::NoProductsMatched => "No products found matching the selected criteria.",
            Self::NoLocationsMatched => "No locations found matching the selected criteria.",
            Self::NoFillLinesMatched => "No fill lines found matching the selected criteria.",
            Self::NoFillLineIdColumn => {
                "Could not find an integer ID column in the fill_lines table."
            }
            Self::NoSamples => "No sample data found for the selected filters.",
        }
    }

    /// Whether the reason is an informational empty state rather than a
    /// resolution miss.
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::NoSamples)
    }
}

impl std::fmt::Display for HaltReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

// ── Extraction result ───────────────────────────────────────────────────────

/// Everything fetched for one filter combination. This is the unit the
/// dashboard caches; assembly and views derive from it without further
/// queries.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub products: Vec<ProductRow>,
    pub locations: Vec<LocationRow>,
    pub fill_lines: Vec<FillLineRow>,
    pub samples: Vec<SampleRow>,
    pub latest_approvals: Vec<ApprovalRow>,
    pub sample_defects: Vec<SampleDefectRow>,
    pub reagent_fails: Vec<ReagentFailRow>,
    pub specs: Vec<SpecRow>,
}

#[derive(Debug)]
pub enum ExtractOutcome {
    Data(Box<Extraction>),
    Halted(HaltReason),
}

// ── Latest-approval reduction ───────────────────────────────────────────────

/// Keep one approval per sample: the chronologically latest, with ties
/// broken by the last row after a stable ascending sort. Output is ordered
/// by sample_set_id.
pub(crate) fn latest_approvals(mut approvals: Vec<ApprovalRow>) -> Vec<ApprovalRow> {
    approvals.sort_by_key(|a| a.approval_time);
    let mut latest = std::collections::BTreeMap::new();
    for approval in approvals {
        latest.insert(approval.sample_set_id, approval);
    }
    latest.into_values().collect()
}

// ── Pipeline ────────────────────────────────────────────────────────────────

/// Run the staged extraction for a validated request.
pub async fn run(db: &QcDatabase, request: &FilterRequest) -> Result<ExtractOutcome> {
    request.validate()?;

    let products = db.lookup_products(&request.products).await?;
    if products.is_empty() {
        warn!("no products matched {:?}", request.products);
        return Ok(ExtractOutcome::Halted(HaltReason::NoProductsMatched));
    }

    let locations = db.lookup_locations(&request.locations).await?;
    if locations.is_empty() {
        warn!("no locations matched {:?}", request.locations);
        return Ok(ExtractOutcome::Halted(HaltReason::NoLocationsMatched));
    }

    let fill_lines = match db.lookup_fill_lines(&request.fill_lines).await? {
        FillLineLookup::NoIdColumn => {
            warn!("fill_lines table exposes no integer id column");
            return Ok(ExtractOutcome::Halted(HaltReason::NoFillLineIdColumn));
        }
        FillLineLookup::Rows(rows) if rows.is_empty() => {
            warn!("no fill lines matched {:?}", request.fill_lines);
            return Ok(ExtractOutcome::Halted(HaltReason::NoFillLinesMatched));
        }
        FillLineLookup::Rows(rows) => rows,
    };

    let product_ids: Vec<i64> = products.iter().map(|p| p.product_id).collect();
    let location_ids: Vec<i64> = locations.iter().map(|l| l.location_id).collect();
    let fill_ids: Vec<i64> = fill_lines.iter().map(|f| f.fill_id).collect();

    // Dates become half-open timestamp bounds: [start 00:00, end 00:00).
    let start = request.start_date.and_time(chrono::NaiveTime::MIN);
    let end = request.end_date.and_time(chrono::NaiveTime::MIN);

    let samples = db
        .fetch_samples(start, end, &product_ids, &location_ids, &fill_ids)
        .await?;
    if samples.is_empty() {
        info!("extraction found no samples in range");
        return Ok(ExtractOutcome::Halted(HaltReason::NoSamples));
    }

    let sample_set_ids: Vec<i64> = samples.iter().map(|s| s.sample_set_id).collect();
    let approvals = db.fetch_approvals(&sample_set_ids).await?;
    let latest = latest_approvals(approvals);
    let approval_ids: Vec<i64> = latest.iter().map(|a| a.approval_id).collect();

    // No approvals means no defect or reagent queries at all.
    let (sample_defects, reagent_fails) = if approval_ids.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        (
            db.fetch_sample_defects(&approval_ids).await?,
            db.fetch_reagent_fails(&approval_ids).await?,
        )
    };

    let specs = if reagent_fails.is_empty() {
        Vec::new()
    } else {
        db.fetch_specs(&product_ids).await?
    };

    info!(
        samples = samples.len(),
        approvals = latest.len(),
        defects = sample_defects.len(),
        reagent_fails = reagent_fails.len(),
        "extraction complete"
    );

    Ok(ExtractOutcome::Data(Box::new(Extraction {
        products,
        locations,
        fill_lines,
        samples,
        latest_approvals: latest,
        sample_defects,
        reagent_fails,
        specs,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn approval(id: i64, sample: i64, month: u32) -> ApprovalRow {
        ApprovalRow {
            approval_id: id,
            sample_set_id: sample,
            approval_time: NaiveDate::from_ymd_opt(2025, month, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn latest_approval_wins_regardless_of_input_order() {
        let rows = vec![approval(1, 10, 1), approval(2, 10, 3), approval(3, 10, 2)];
        let latest = latest_approvals(rows);
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].approval_id, 2);
    }

    #[test]
    fn latest_approval_ties_keep_last_sorted_row() {
        // Equal timestamps: the stable sort leaves input order, so the
        // later input row wins.
        let rows = vec![approval(7, 10, 2), approval(8, 10, 2)];
        let latest = latest_approvals(rows);
        assert_eq!(latest[0].approval_id, 8);
    }

    #[test]
    fn one_latest_approval_per_sample() {
        let rows = vec![
            approval(1, 10, 1),
            approval(2, 11, 4),
            approval(3, 10, 5),
            approval(4, 12, 2),
        ];
        let latest = latest_approvals(rows);
        let ids: Vec<i64> = latest.iter().map(|a| a.approval_id).collect();
        assert_eq!(ids, vec![3, 2, 4]);
    }

    #[test]
    fn empty_product_selection_is_a_precondition_failure() {
        let request = FilterRequest {
            products: Vec::new(),
            ..FilterRequest::default()
        };
        assert!(matches!(
            request.validate(),
            Err(QcError::InvalidFilter(_))
        ));
    }

    #[test]
    fn cache_key_ignores_selection_order() {
        let mut a = FilterRequest::default();
        a.products = vec!["203".into(), "303".into()];
        let mut b = a.clone();
        b.products = vec!["303".into(), "203".into()];
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn cache_key_distinguishes_date_ranges() {
        let a = FilterRequest::default();
        let mut b = a.clone();
        b.end_date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn no_samples_halt_is_informational() {
        assert!(HaltReason::NoSamples.is_informational());
        assert!(!HaltReason::NoProductsMatched.is_informational());
    }
}
