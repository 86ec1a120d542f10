//! The seven analytics views.
//!
//! Each view is an independent aggregation over the assembled frames and
//! degrades to an empty/absent state on missing data without blocking the
//! others. Pass/fail views operate on `analyzed` = samples restricted to
//! state ∈ {Passed, Failed}; defect and reagent views read their own
//! extracted tables directly.

use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::Serialize;

use crate::assemble::Assembled;
use crate::error::Result;
use crate::schema::{defect, fill_line, location, product, reagent, sample, state, status_label};

/// Cap on the raw sample listing.
const LISTING_CAP: usize = 100;

// ── View types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct QcSummary {
    pub total_samples: i64,
    pub total_passed: i64,
    pub total_failed: i64,
    /// failed / total × 100; 0 when there is nothing to analyze.
    pub fail_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyRate {
    /// First day of the calendar month.
    pub month: NaiveDate,
    pub passed: i64,
    pub failed: i64,
    pub fail_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FillLineFailures {
    pub fill_line: String,
    pub failures: i64,
}

/// One bucket of a frequency count, e.g. a reagent name and how many
/// failures carried it.
#[derive(Debug, Clone, Serialize)]
pub struct CountRow {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReagentAnalysis {
    /// Failure counts by reagent; empty when no reagent data exists.
    pub by_reagent: Vec<CountRow>,
    /// Failure counts by standard; unmatched specs contribute nothing
    /// here but still count toward reagent totals.
    pub by_standard: Vec<CountRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationFillRate {
    pub location: String,
    pub fill_line: String,
    pub passed: i64,
    pub failed: i64,
    pub fail_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleDetail {
    pub sample_id: i64,
    pub collected: NaiveDateTime,
    pub status: String,
    pub fill_line: Option<String>,
    pub location: Option<String>,
    pub product: Option<String>,
}

/// Everything the presentation layer renders for one filter combination.
#[derive(Debug, Clone, Serialize)]
pub struct ViewBundle {
    pub summary: QcSummary,
    pub monthly_fail_rate: Vec<MonthlyRate>,
    /// `None` means "no failures in the selected data" rather than an
    /// empty chart.
    pub failures_by_fill_line: Option<Vec<FillLineFailures>>,
    pub reagent_analysis: ReagentAnalysis,
    /// Defect label frequencies, sorted descending by count.
    pub defect_distribution: Vec<CountRow>,
    /// Present only when the analyzed set contains both passes and
    /// failures.
    pub location_fill_rates: Option<Vec<LocationFillRate>>,
    /// First 100 assembled rows in natural order.
    pub sample_listing: Vec<SampleDetail>,
}

// ── Column helpers ──────────────────────────────────────────────────────────

fn i64_col<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Int64Chunked> {
    Ok(df.column(name)?.as_materialized_series().i64()?)
}

fn str_col<'a>(df: &'a DataFrame, name: &str) -> Result<&'a StringChunked> {
    Ok(df.column(name)?.as_materialized_series().str()?)
}

fn passed_count() -> Expr {
    col(sample::STATE)
        .eq(lit(state::PASSED))
        .sum()
        .cast(DataType::Int64)
        .alias("passed")
}

fn failed_count() -> Expr {
    col(sample::STATE)
        .eq(lit(state::FAILED))
        .sum()
        .cast(DataType::Int64)
        .alias("failed")
}

fn rate(passed: i64, failed: i64) -> f64 {
    let total = passed + failed;
    if total == 0 {
        0.0
    } else {
        failed as f64 / total as f64 * 100.0
    }
}

// ── Views ───────────────────────────────────────────────────────────────────

fn analyzed_samples(samples: &DataFrame) -> Result<DataFrame> {
    let df = samples
        .clone()
        .lazy()
        .filter(
            col(sample::STATE)
                .eq(lit(state::PASSED))
                .or(col(sample::STATE).eq(lit(state::FAILED))),
        )
        .collect()?;
    Ok(df)
}

fn summary(analyzed: &DataFrame) -> Result<QcSummary> {
    let total = analyzed.height() as i64;
    if total == 0 {
        return Ok(QcSummary {
            total_samples: 0,
            total_passed: 0,
            total_failed: 0,
            fail_rate: 0.0,
        });
    }
    let counts = analyzed
        .clone()
        .lazy()
        .select([passed_count(), failed_count()])
        .collect()?;
    let passed = i64_col(&counts, "passed")?.get(0).unwrap_or(0);
    let failed = i64_col(&counts, "failed")?.get(0).unwrap_or(0);
    Ok(QcSummary {
        total_samples: total,
        total_passed: passed,
        total_failed: failed,
        fail_rate: failed as f64 / total as f64 * 100.0,
    })
}

fn monthly_fail_rate(analyzed: &DataFrame) -> Result<Vec<MonthlyRate>> {
    if analyzed.height() == 0 {
        return Ok(Vec::new());
    }
    let stats = analyzed
        .clone()
        .lazy()
        .group_by([col(sample::TIMESPAN)])
        .agg([passed_count(), failed_count()])
        .sort([sample::TIMESPAN], SortMultipleOptions::default())
        .collect()?;

    let months = stats
        .column(sample::TIMESPAN)?
        .as_materialized_series()
        .date()?
        .as_date_iter();
    let passed = i64_col(&stats, "passed")?;
    let failed = i64_col(&stats, "failed")?;

    let mut rows = Vec::with_capacity(stats.height());
    for (i, month) in months.enumerate() {
        let Some(month) = month else { continue };
        let p = passed.get(i).unwrap_or(0);
        let f = failed.get(i).unwrap_or(0);
        rows.push(MonthlyRate {
            month,
            passed: p,
            failed: f,
            fail_rate: rate(p, f),
        });
    }
    Ok(rows)
}

fn failures_by_fill_line(analyzed: &DataFrame) -> Result<Option<Vec<FillLineFailures>>> {
    if analyzed.height() == 0 {
        return Ok(None);
    }
    let stats = analyzed
        .clone()
        .lazy()
        .filter(col(fill_line::FILL_DISPLAY).is_not_null())
        .group_by([col(fill_line::FILL_DISPLAY)])
        .agg([failed_count()])
        .sort([fill_line::FILL_DISPLAY], SortMultipleOptions::default())
        .collect()?;

    let failed = i64_col(&stats, "failed")?;
    if failed.sum().unwrap_or(0) == 0 {
        return Ok(None);
    }

    let fills = str_col(&stats, fill_line::FILL_DISPLAY)?;
    let mut rows = Vec::with_capacity(stats.height());
    for i in 0..stats.height() {
        let Some(name) = fills.get(i) else { continue };
        rows.push(FillLineFailures {
            fill_line: name.to_string(),
            failures: failed.get(i).unwrap_or(0),
        });
    }
    Ok(Some(rows))
}

/// Non-null frequency count of `column`, descending by count with name as
/// tiebreaker.
fn frequency(df: &DataFrame, column: &str) -> Result<Vec<CountRow>> {
    if df.height() == 0 || df.column(column).is_err() {
        return Ok(Vec::new());
    }
    let counts = df
        .clone()
        .lazy()
        .filter(col(column).is_not_null())
        .group_by([col(column)])
        .agg([len().cast(DataType::Int64).alias("count")])
        .sort(
            ["count", column],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .collect()?;

    let names = str_col(&counts, column)?;
    let totals = i64_col(&counts, "count")?;
    let mut rows = Vec::with_capacity(counts.height());
    for i in 0..counts.height() {
        let Some(name) = names.get(i) else { continue };
        rows.push(CountRow {
            name: name.to_string(),
            count: totals.get(i).unwrap_or(0),
        });
    }
    Ok(rows)
}

fn location_fill_rates(
    analyzed: &DataFrame,
    summary: &QcSummary,
) -> Result<Option<Vec<LocationFillRate>>> {
    // Mixed outcomes are required for a rate comparison to mean anything.
    if summary.total_passed == 0 || summary.total_failed == 0 {
        return Ok(None);
    }
    let stats = analyzed
        .clone()
        .lazy()
        .filter(
            col(location::LOCATION_NAME)
                .is_not_null()
                .and(col(fill_line::FILL_DISPLAY).is_not_null()),
        )
        .group_by([col(location::LOCATION_NAME), col(fill_line::FILL_DISPLAY)])
        .agg([passed_count(), failed_count()])
        .sort(
            [location::LOCATION_NAME, fill_line::FILL_DISPLAY],
            SortMultipleOptions::default(),
        )
        .collect()?;

    let locations = str_col(&stats, location::LOCATION_NAME)?;
    let fills = str_col(&stats, fill_line::FILL_DISPLAY)?;
    let passed = i64_col(&stats, "passed")?;
    let failed = i64_col(&stats, "failed")?;

    let mut rows = Vec::with_capacity(stats.height());
    for i in 0..stats.height() {
        let (Some(loc), Some(fill)) = (locations.get(i), fills.get(i)) else {
            continue;
        };
        let p = passed.get(i).unwrap_or(0);
        let f = failed.get(i).unwrap_or(0);
        rows.push(LocationFillRate {
            location: loc.to_string(),
            fill_line: fill.to_string(),
            passed: p,
            failed: f,
            fail_rate: rate(p, f),
        });
    }
    Ok(Some(rows))
}

fn sample_listing(samples: &DataFrame) -> Result<Vec<SampleDetail>> {
    let head = samples.head(Some(LISTING_CAP));
    let ids = i64_col(&head, sample::SAMPLE_SET_ID)?;
    let collected = head
        .column(sample::COLLECTED)?
        .as_materialized_series()
        .datetime()?
        .as_datetime_iter();
    let states = head
        .column(sample::STATE)?
        .as_materialized_series()
        .i32()?;
    let fills = str_col(&head, fill_line::FILL_DISPLAY)?;
    let locations = str_col(&head, location::LOCATION_NAME)?;
    let products = str_col(&head, product::DISK_SERIES)?;

    let mut rows = Vec::with_capacity(head.height());
    for (i, ts) in collected.enumerate() {
        let (Some(id), Some(ts)) = (ids.get(i), ts) else {
            continue;
        };
        rows.push(SampleDetail {
            sample_id: id,
            collected: ts,
            status: status_label(states.get(i).unwrap_or(0)).to_string(),
            fill_line: fills.get(i).map(|s| s.to_string()),
            location: locations.get(i).map(|s| s.to_string()),
            product: products.get(i).map(|s| s.to_string()),
        });
    }
    Ok(rows)
}

/// Compute all seven views. Views run sequentially and independently; an
/// empty source only empties its own view.
pub fn build(assembled: &Assembled) -> Result<ViewBundle> {
    let analyzed = analyzed_samples(&assembled.samples)?;
    let summary = summary(&analyzed)?;
    let monthly_fail_rate = monthly_fail_rate(&analyzed)?;
    let failures_by_fill_line = failures_by_fill_line(&analyzed)?;
    let reagent_analysis = ReagentAnalysis {
        by_reagent: frequency(&assembled.reagent_fails, reagent::REAGENT)?,
        by_standard: frequency(&assembled.reagent_fails, reagent::STANDARD_NAME)?,
    };
    let defect_distribution = frequency(&assembled.defects, defect::SAMPLE_DEFECT)?;
    let location_fill_rates = location_fill_rates(&analyzed, &summary)?;
    let sample_listing = sample_listing(&assembled.samples)?;

    Ok(ViewBundle {
        summary,
        monthly_fail_rate,
        failures_by_fill_line,
        reagent_analysis,
        defect_distribution,
        location_fill_rates,
        sample_listing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::assemble;
    use crate::schema::state;
    use crate::testdata;
    use chrono::NaiveDate;

    fn march_bundle() -> ViewBundle {
        let assembled = assemble(&testdata::march_extraction()).unwrap();
        build(&assembled).unwrap()
    }

    #[test]
    fn summary_counts_and_rate() {
        let bundle = march_bundle();
        assert_eq!(bundle.summary.total_samples, 10);
        assert_eq!(bundle.summary.total_passed, 8);
        assert_eq!(bundle.summary.total_failed, 2);
        assert!((bundle.summary.fail_rate - 20.0).abs() < 1e-9);
    }

    #[test]
    fn summary_excludes_other_states() {
        let mut extraction = testdata::march_extraction();
        extraction.samples[0].state = 5;
        let assembled = assemble(&extraction).unwrap();
        let bundle = build(&assembled).unwrap();
        assert_eq!(bundle.summary.total_samples, 9);
        assert_eq!(
            bundle.summary.total_passed + bundle.summary.total_failed,
            bundle.summary.total_samples
        );
    }

    #[test]
    fn monthly_view_buckets_by_calendar_month() {
        let bundle = march_bundle();
        assert_eq!(bundle.monthly_fail_rate.len(), 1);
        let row = &bundle.monthly_fail_rate[0];
        assert_eq!(row.month, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert!((row.fail_rate - 20.0).abs() < 1e-9);
    }

    #[test]
    fn monthly_rate_is_100_when_only_failures() {
        let mut extraction = testdata::march_extraction();
        for s in &mut extraction.samples {
            s.state = state::FAILED;
        }
        let bundle = build(&assemble(&extraction).unwrap()).unwrap();
        assert!((bundle.monthly_fail_rate[0].fail_rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn fill_line_view_counts_failures() {
        let bundle = march_bundle();
        let rows = bundle.failures_by_fill_line.expect("failures exist");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fill_line, "Fill-1");
        assert_eq!(rows[0].failures, 2);
    }

    #[test]
    fn fill_line_view_reports_no_failures() {
        let mut extraction = testdata::march_extraction();
        for s in &mut extraction.samples {
            s.state = state::PASSED;
        }
        let bundle = build(&assemble(&extraction).unwrap()).unwrap();
        assert!(bundle.failures_by_fill_line.is_none());
    }

    #[test]
    fn reagent_counts_skip_unmatched_standards() {
        let bundle = march_bundle();
        // Both fails name the same reagent; only one resolved a standard.
        assert_eq!(bundle.reagent_analysis.by_reagent.len(), 1);
        assert_eq!(bundle.reagent_analysis.by_reagent[0].count, 2);
        assert_eq!(bundle.reagent_analysis.by_standard.len(), 1);
        assert_eq!(bundle.reagent_analysis.by_standard[0].name, "STD-11");
        assert_eq!(bundle.reagent_analysis.by_standard[0].count, 1);
    }

    #[test]
    fn defect_distribution_sorted_and_labeled() {
        let bundle = march_bundle();
        // Null defect type contributes no label; out-of-range becomes
        // Unknown.
        assert_eq!(bundle.defect_distribution.len(), 2);
        let names: Vec<&str> = bundle
            .defect_distribution
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert!(names.contains(&"Disk Bubbles"));
        assert!(names.contains(&"Unknown"));
    }

    #[test]
    fn location_fill_rates_need_mixed_outcomes() {
        let bundle = march_bundle();
        let rows = bundle.location_fill_rates.expect("mixed outcomes");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].location, "Newark");
        assert!((rows[0].fail_rate - 20.0).abs() < 1e-9);

        let mut extraction = testdata::march_extraction();
        for s in &mut extraction.samples {
            s.state = state::PASSED;
        }
        let bundle = build(&assemble(&extraction).unwrap()).unwrap();
        assert!(bundle.location_fill_rates.is_none());
    }

    #[test]
    fn listing_caps_at_100_and_maps_status() {
        let mut extraction = testdata::march_extraction();
        extraction.samples = (1..=250)
            .map(|n| crate::db::SampleRow {
                sample_set_id: n,
                collected: testdata::march(5, 9),
                product_id: 1,
                location_id: 1,
                fill_id: 1,
                state: if n % 2 == 0 { state::PASSED } else { 7 },
            })
            .collect();
        let bundle = build(&assemble(&extraction).unwrap()).unwrap();
        assert_eq!(bundle.sample_listing.len(), 100);
        let statuses: std::collections::HashSet<&str> = bundle
            .sample_listing
            .iter()
            .map(|r| r.status.as_str())
            .collect();
        assert!(statuses.contains("Passed"));
        assert!(statuses.contains("Unknown"));
    }
}
