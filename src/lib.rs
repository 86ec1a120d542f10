//! Data pipeline for the spin-disk QC reporting dashboard.
//!
//! Given a filter request (date range, products, locations, fill lines),
//! the pipeline extracts sample, approval, defect, and reagent-failure
//! data from a read-only PostgreSQL store, assembles one denormalized
//! sample table, and computes seven analytics views for an external
//! presentation layer to render:
//!
//! ```no_run
//! use spin_qc::{ComputeOutcome, Dashboard, DashboardConfig, FilterRequest};
//!
//! # async fn run() -> spin_qc::Result<()> {
//! let dashboard = Dashboard::connect(&DashboardConfig::from_env()?).await?;
//! match dashboard.compute_views(&FilterRequest::default()).await? {
//!     ComputeOutcome::Views(bundle) => println!("{:.1}%", bundle.summary.fail_rate),
//!     ComputeOutcome::Halted(reason) => println!("{reason}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod assemble;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod extract;
pub mod schema;
pub mod views;

#[cfg(test)]
pub(crate) mod testdata;

pub use config::DashboardConfig;
pub use dashboard::{ComputeOutcome, Dashboard};
pub use error::{QcError, Result};
pub use extract::{Extraction, FilterRequest, HaltReason};
pub use views::ViewBundle;
