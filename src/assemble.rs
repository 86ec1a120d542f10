//! Assembly of extraction rows into denormalized polars frames.
//!
//! Samples are left-joined with their latest approval, product and
//! location display names, and the fill-line display label. Reagent fails
//! are left-joined with spec/standard reference data. Derived columns
//! (`timespan`, `sample_defect`) are computed while the frames are built.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::error::Result;
use crate::extract::Extraction;
use crate::schema::{approval, defect, defect_label, fill_line, location, product, reagent, sample};

/// The denormalized tables every analytics view reads from.
#[derive(Debug, Clone)]
pub struct Assembled {
    /// One row per sample with approval, name, fill-display, and
    /// `timespan` columns attached.
    pub samples: DataFrame,
    /// Sample defects with the `sample_defect` label column.
    pub defects: DataFrame,
    /// Reagent fails with `standard_name` attached (null when the spec
    /// did not resolve).
    pub reagent_fails: DataFrame,
}

/// Calendar-month bucket: first day of the month `ts` falls in.
pub(crate) fn month_bucket(ts: NaiveDateTime) -> NaiveDate {
    // Day 1 exists in every month, so the fallback never fires.
    ts.date().with_day(1).unwrap_or_else(|| ts.date())
}

fn samples_frame(extraction: &Extraction) -> Result<DataFrame> {
    let rows = &extraction.samples;
    let timespans: Vec<NaiveDate> = rows.iter().map(|r| month_bucket(r.collected)).collect();
    let collected: Vec<NaiveDateTime> = rows.iter().map(|r| r.collected).collect();

    let columns: Vec<Column> = vec![
        Series::new(
            sample::SAMPLE_SET_ID.into(),
            rows.iter().map(|r| r.sample_set_id).collect::<Vec<i64>>(),
        )
        .into(),
        Series::new(sample::COLLECTED.into(), collected).into(),
        Series::new(sample::TIMESPAN.into(), timespans).into(),
        Series::new(
            product::PRODUCT_ID.into(),
            rows.iter().map(|r| r.product_id).collect::<Vec<i64>>(),
        )
        .into(),
        Series::new(
            location::LOCATION_ID.into(),
            rows.iter().map(|r| r.location_id).collect::<Vec<i64>>(),
        )
        .into(),
        Series::new(
            fill_line::FILL_ID.into(),
            rows.iter().map(|r| r.fill_id).collect::<Vec<i64>>(),
        )
        .into(),
        Series::new(
            sample::STATE.into(),
            rows.iter().map(|r| r.state).collect::<Vec<i32>>(),
        )
        .into(),
    ];
    Ok(DataFrame::new(columns)?)
}

fn approvals_frame(extraction: &Extraction) -> Result<DataFrame> {
    let rows = &extraction.latest_approvals;
    let columns: Vec<Column> = vec![
        Series::new(
            sample::SAMPLE_SET_ID.into(),
            rows.iter().map(|r| r.sample_set_id).collect::<Vec<i64>>(),
        )
        .into(),
        Series::new(
            approval::APPROVAL_ID.into(),
            rows.iter().map(|r| r.approval_id).collect::<Vec<i64>>(),
        )
        .into(),
        Series::new(
            approval::APPROVAL_TIME.into(),
            rows.iter()
                .map(|r| r.approval_time)
                .collect::<Vec<NaiveDateTime>>(),
        )
        .into(),
    ];
    Ok(DataFrame::new(columns)?)
}

fn products_frame(extraction: &Extraction) -> Result<DataFrame> {
    let rows = &extraction.products;
    let columns: Vec<Column> = vec![
        Series::new(
            product::PRODUCT_ID.into(),
            rows.iter().map(|r| r.product_id).collect::<Vec<i64>>(),
        )
        .into(),
        Series::new(
            product::DISK_SERIES.into(),
            rows.iter()
                .map(|r| r.disk_series.clone())
                .collect::<Vec<String>>(),
        )
        .into(),
    ];
    Ok(DataFrame::new(columns)?)
}

fn locations_frame(extraction: &Extraction) -> Result<DataFrame> {
    let rows = &extraction.locations;
    let columns: Vec<Column> = vec![
        Series::new(
            location::LOCATION_ID.into(),
            rows.iter().map(|r| r.location_id).collect::<Vec<i64>>(),
        )
        .into(),
        Series::new(
            location::LOCATION_NAME.into(),
            rows.iter()
                .map(|r| r.location_name.clone())
                .collect::<Vec<String>>(),
        )
        .into(),
    ];
    Ok(DataFrame::new(columns)?)
}

fn fill_lines_frame(extraction: &Extraction) -> Result<DataFrame> {
    // The id column was already normalized to `fill_id` by the probe, so
    // the display join needs no second probing pass.
    let rows = &extraction.fill_lines;
    let columns: Vec<Column> = vec![
        Series::new(
            fill_line::FILL_ID.into(),
            rows.iter().map(|r| r.fill_id).collect::<Vec<i64>>(),
        )
        .into(),
        Series::new(
            fill_line::FILL_DISPLAY.into(),
            rows.iter()
                .map(|r| r.display.clone())
                .collect::<Vec<String>>(),
        )
        .into(),
    ];
    Ok(DataFrame::new(columns)?)
}

fn defects_frame(extraction: &Extraction) -> Result<DataFrame> {
    let rows = &extraction.sample_defects;
    let labels: Vec<Option<&str>> = rows.iter().map(|r| defect_label(r.defect_type)).collect();
    let columns: Vec<Column> = vec![
        Series::new(
            approval::APPROVAL_ID.into(),
            rows.iter().map(|r| r.approval_id).collect::<Vec<i64>>(),
        )
        .into(),
        Series::new(
            defect::DEFECT_TYPE.into(),
            rows.iter()
                .map(|r| r.defect_type)
                .collect::<Vec<Option<i32>>>(),
        )
        .into(),
        Series::new(defect::SAMPLE_DEFECT.into(), labels).into(),
    ];
    Ok(DataFrame::new(columns)?)
}

fn reagent_fails_frame(extraction: &Extraction) -> Result<DataFrame> {
    let rows = &extraction.reagent_fails;
    let columns: Vec<Column> = vec![
        Series::new(
            approval::APPROVAL_ID.into(),
            rows.iter().map(|r| r.approval_id).collect::<Vec<i64>>(),
        )
        .into(),
        Series::new(
            reagent::SPEC_ID.into(),
            rows.iter().map(|r| r.spec_id).collect::<Vec<Option<i64>>>(),
        )
        .into(),
        Series::new(
            reagent::REAGENT.into(),
            rows.iter()
                .map(|r| r.reagent.clone())
                .collect::<Vec<Option<String>>>(),
        )
        .into(),
    ];
    Ok(DataFrame::new(columns)?)
}

fn specs_frame(extraction: &Extraction) -> Result<DataFrame> {
    let rows = &extraction.specs;
    let columns: Vec<Column> = vec![
        Series::new(
            reagent::SPEC_ID.into(),
            rows.iter().map(|r| r.spec_id).collect::<Vec<i64>>(),
        )
        .into(),
        Series::new(
            reagent::STANDARD_NAME.into(),
            rows.iter()
                .map(|r| r.standard_name.clone())
                .collect::<Vec<Option<String>>>(),
        )
        .into(),
    ];
    Ok(DataFrame::new(columns)?)
}

/// Build the denormalized tables from one extraction.
pub fn assemble(extraction: &Extraction) -> Result<Assembled> {
    let samples = samples_frame(extraction)?
        .lazy()
        .join(
            approvals_frame(extraction)?.lazy(),
            [col(sample::SAMPLE_SET_ID)],
            [col(sample::SAMPLE_SET_ID)],
            JoinArgs::new(JoinType::Left).with_suffix(Some("_approval".into())),
        )
        .join(
            products_frame(extraction)?.lazy(),
            [col(product::PRODUCT_ID)],
            [col(product::PRODUCT_ID)],
            JoinArgs::new(JoinType::Left),
        )
        .join(
            locations_frame(extraction)?.lazy(),
            [col(location::LOCATION_ID)],
            [col(location::LOCATION_ID)],
            JoinArgs::new(JoinType::Left),
        )
        .join(
            fill_lines_frame(extraction)?.lazy(),
            [col(fill_line::FILL_ID)],
            [col(fill_line::FILL_ID)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;

    let defects = defects_frame(extraction)?;

    // Unmatched spec ids keep a null standard_name (left join, not inner).
    let reagent_fails = reagent_fails_frame(extraction)?
        .lazy()
        .join(
            specs_frame(extraction)?.lazy(),
            [col(reagent::SPEC_ID)],
            [col(reagent::SPEC_ID)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;

    Ok(Assembled {
        samples,
        defects,
        reagent_fails,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata;
    use chrono::NaiveDate;

    #[test]
    fn month_bucket_truncates_to_first_of_month() {
        let mid = NaiveDate::from_ymd_opt(2025, 3, 17)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        let last = NaiveDate::from_ymd_opt(2025, 3, 31)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap();
        let bucket = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(month_bucket(mid), bucket);
        assert_eq!(month_bucket(last), bucket);
    }

    #[test]
    fn assembly_attaches_display_names() {
        let extraction = testdata::march_extraction();
        let assembled = assemble(&extraction).unwrap();

        let fills = assembled
            .samples
            .column(fill_line::FILL_DISPLAY)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .get(0)
            .map(|s| s.to_string());
        assert_eq!(fills.as_deref(), Some("Fill-1"));

        let loc = assembled
            .samples
            .column(location::LOCATION_NAME)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .get(0)
            .map(|s| s.to_string());
        assert_eq!(loc.as_deref(), Some("Newark"));

        let series = assembled
            .samples
            .column(product::DISK_SERIES)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .get(0)
            .map(|s| s.to_string());
        assert_eq!(series.as_deref(), Some("203"));
    }

    #[test]
    fn assembly_keeps_samples_without_approvals() {
        let mut extraction = testdata::march_extraction();
        extraction.latest_approvals.clear();
        let assembled = assemble(&extraction).unwrap();
        assert_eq!(assembled.samples.height(), extraction.samples.len());
        let null_approvals = assembled
            .samples
            .column(approval::APPROVAL_ID)
            .unwrap()
            .as_materialized_series()
            .null_count();
        assert_eq!(null_approvals, extraction.samples.len());
    }

    #[test]
    fn unmatched_spec_keeps_null_standard_name() {
        let extraction = testdata::march_extraction();
        let assembled = assemble(&extraction).unwrap();
        // testdata has one reagent fail pointing at a missing spec.
        let standards = assembled
            .reagent_fails
            .column(reagent::STANDARD_NAME)
            .unwrap()
            .as_materialized_series();
        assert_eq!(standards.null_count(), 1);
        assert_eq!(
            assembled.reagent_fails.height(),
            extraction.reagent_fails.len()
        );
    }

    #[test]
    fn defect_rows_carry_labels() {
        let extraction = testdata::march_extraction();
        let assembled = assemble(&extraction).unwrap();
        let labels = assembled
            .defects
            .column(defect::SAMPLE_DEFECT)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect::<Vec<_>>();
        assert!(labels.contains(&Some("Disk Bubbles".to_string())));
    }
}
