//! Read-only access to the spin QC store.
//!
//! One method per lookup or extraction query. Identifier columns are cast
//! to `bigint` in SQL so the row structs stay stable across the integer
//! widths the source schema uses. Connections come from the pool per query
//! and are released when the fetch completes.

use chrono::NaiveDateTime;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row, TypeInfo};
use std::time::Duration;
use tracing::debug;

use crate::config::DashboardConfig;
use crate::error::Result;

// ── Row types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub product_id: i64,
    pub disk_series: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LocationRow {
    pub location_id: i64,
    pub location_name: String,
}

/// A fill line after id-column probing; `fill_id` holds whatever integer
/// column the probe settled on.
#[derive(Debug, Clone)]
pub struct FillLineRow {
    pub fill_id: i64,
    pub display: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SampleRow {
    pub sample_set_id: i64,
    pub collected: NaiveDateTime,
    pub product_id: i64,
    pub location_id: i64,
    pub fill_id: i64,
    pub state: i32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApprovalRow {
    pub approval_id: i64,
    pub sample_set_id: i64,
    pub approval_time: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SampleDefectRow {
    pub approval_id: i64,
    pub defect_type: Option<i32>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReagentFailRow {
    pub approval_id: i64,
    pub spec_id: Option<i64>,
    pub reagent: Option<String>,
}

/// A spec row with the standard name already attached (left join in SQL;
/// specs without a standard keep a null name).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SpecRow {
    pub spec_id: i64,
    pub standard_name: Option<String>,
}

/// Result of the fill-line lookup: the table may expose no integer
/// identifier column at all, which the caller reports as a halt.
#[derive(Debug, Clone)]
pub enum FillLineLookup {
    Rows(Vec<FillLineRow>),
    NoIdColumn,
}

// ── Fill-line id-column probe ───────────────────────────────────────────────

/// A column of the fill_lines result set as seen at read time.
#[derive(Debug, Clone)]
pub(crate) struct ProbedColumn {
    pub name: String,
    pub integer: bool,
}

/// Pick the identifier column for fill_lines: `fill_line_id` if present,
/// then `id`, then the first integer-typed column. The schema guarantees
/// none of these, so this probe is the single place that decides.
pub(crate) fn fill_id_column(columns: &[ProbedColumn]) -> Option<usize> {
    for wanted in ["fill_line_id", "id"] {
        if let Some(idx) = columns.iter().position(|c| c.name == wanted && c.integer) {
            return Some(idx);
        }
    }
    columns.iter().position(|c| c.integer)
}

fn probe_columns(row: &PgRow) -> Vec<ProbedColumn> {
    row.columns()
        .iter()
        .map(|c| ProbedColumn {
            name: c.name().to_string(),
            integer: matches!(c.type_info().name(), "INT2" | "INT4" | "INT8"),
        })
        .collect()
}

fn decode_int(row: &PgRow, idx: usize, type_name: &str) -> Result<Option<i64>> {
    let value = match type_name {
        "INT8" => row.try_get::<Option<i64>, _>(idx)?,
        "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(i64::from),
        _ => row.try_get::<Option<i16>, _>(idx)?.map(i64::from),
    };
    Ok(value)
}

// ── Database handle ─────────────────────────────────────────────────────────

pub struct QcDatabase {
    pool: PgPool,
}

impl QcDatabase {
    /// Build the connection pool. A read-only role is sufficient; nothing
    /// in the pipeline writes back.
    pub async fn connect(config: &DashboardConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn lookup_products(&self, names: &[String]) -> Result<Vec<ProductRow>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT product_id::bigint AS product_id, name AS disk_series \
             FROM products WHERE name = ANY($1)",
        )
        .bind(names)
        .fetch_all(&self.pool)
        .await?;
        debug!(matched = rows.len(), "product lookup");
        Ok(rows)
    }

    pub async fn lookup_locations(&self, names: &[String]) -> Result<Vec<LocationRow>> {
        let rows = sqlx::query_as::<_, LocationRow>(
            "SELECT location_id::bigint AS location_id, location_name \
             FROM locations WHERE location_name = ANY($1)",
        )
        .bind(names)
        .fetch_all(&self.pool)
        .await?;
        debug!(matched = rows.len(), "location lookup");
        Ok(rows)
    }

    /// Fetch fill lines by display label. Selects `*` because the
    /// identifier column name is schema-dependent; the probe resolves it
    /// from the result set.
    pub async fn lookup_fill_lines(&self, displays: &[String]) -> Result<FillLineLookup> {
        let rows = sqlx::query("SELECT * FROM fill_lines WHERE display = ANY($1)")
            .bind(displays)
            .fetch_all(&self.pool)
            .await?;

        let Some(first) = rows.first() else {
            return Ok(FillLineLookup::Rows(Vec::new()));
        };

        let columns = probe_columns(first);
        let Some(idx) = fill_id_column(&columns) else {
            return Ok(FillLineLookup::NoIdColumn);
        };
        let type_name = first.columns()[idx].type_info().name().to_string();

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(fill_id) = decode_int(row, idx, &type_name)? else {
                continue;
            };
            let display: String = row.try_get("display")?;
            out.push(FillLineRow { fill_id, display });
        }
        debug!(matched = out.len(), id_column = %columns[idx].name, "fill-line lookup");
        Ok(FillLineLookup::Rows(out))
    }

    /// Samples in `[start, end)` for the resolved id sets, excluding test
    /// samples.
    pub async fn fetch_samples(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        product_ids: &[i64],
        location_ids: &[i64],
        fill_ids: &[i64],
    ) -> Result<Vec<SampleRow>> {
        let rows = sqlx::query_as::<_, SampleRow>(
            "SELECT sample_set_id::bigint AS sample_set_id, collected, \
                    product_id::bigint AS product_id, \
                    location_id::bigint AS location_id, \
                    fill_id::bigint AS fill_id, \
                    state::int4 AS state \
             FROM sample_set \
             WHERE collected >= $1 AND collected < $2 \
               AND product_id = ANY($3) \
               AND location_id = ANY($4) \
               AND fill_id = ANY($5) \
               AND is_test = false",
        )
        .bind(start)
        .bind(end)
        .bind(product_ids)
        .bind(location_ids)
        .bind(fill_ids)
        .fetch_all(&self.pool)
        .await?;
        debug!(samples = rows.len(), "sample extraction");
        Ok(rows)
    }

    pub async fn fetch_approvals(&self, sample_set_ids: &[i64]) -> Result<Vec<ApprovalRow>> {
        let rows = sqlx::query_as::<_, ApprovalRow>(
            "SELECT approval_id::bigint AS approval_id, \
                    sample_set_id::bigint AS sample_set_id, \
                    \"timestamp\" AS approval_time \
             FROM approvals WHERE sample_set_id = ANY($1)",
        )
        .bind(sample_set_ids)
        .fetch_all(&self.pool)
        .await?;
        debug!(approvals = rows.len(), "approval extraction");
        Ok(rows)
    }

    pub async fn fetch_sample_defects(&self, approval_ids: &[i64]) -> Result<Vec<SampleDefectRow>> {
        let rows = sqlx::query_as::<_, SampleDefectRow>(
            "SELECT approval_id::bigint AS approval_id, type::int4 AS defect_type \
             FROM sample_defects WHERE approval_id = ANY($1)",
        )
        .bind(approval_ids)
        .fetch_all(&self.pool)
        .await?;
        debug!(defects = rows.len(), "defect extraction");
        Ok(rows)
    }

    pub async fn fetch_reagent_fails(&self, approval_ids: &[i64]) -> Result<Vec<ReagentFailRow>> {
        let rows = sqlx::query_as::<_, ReagentFailRow>(
            "SELECT approval_id::bigint AS approval_id, \
                    spec_id::bigint AS spec_id, reagent \
             FROM reagent_fails WHERE approval_id = ANY($1)",
        )
        .bind(approval_ids)
        .fetch_all(&self.pool)
        .await?;
        debug!(reagent_fails = rows.len(), "reagent-fail extraction");
        Ok(rows)
    }

    /// Specs for the resolved products, with standard names attached.
    /// Specs without a matching standard keep a null name (left join).
    pub async fn fetch_specs(&self, product_ids: &[i64]) -> Result<Vec<SpecRow>> {
        let rows = sqlx::query_as::<_, SpecRow>(
            "SELECT s.id::bigint AS spec_id, st.name AS standard_name \
             FROM specs s \
             LEFT JOIN standards st ON s.standard_id = st.standard_id \
             WHERE s.product_id = ANY($1)",
        )
        .bind(product_ids)
        .fetch_all(&self.pool)
        .await?;
        debug!(specs = rows.len(), "spec extraction");
        Ok(rows)
    }
}
