//! Shared in-memory extraction fixtures for unit tests.

use chrono::{NaiveDate, NaiveDateTime};

use crate::db::{
    ApprovalRow, FillLineRow, LocationRow, ProductRow, ReagentFailRow, SampleDefectRow, SampleRow,
    SpecRow,
};
use crate::extract::Extraction;
use crate::schema::state;

pub(crate) fn march(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// Ten March-2025 samples on Fill-1 in Newark: eight passed, two failed.
/// The failed samples carry approvals, three defect rows, and two reagent
/// fails (one of which points at a spec that does not exist).
pub(crate) fn march_extraction() -> Extraction {
    let samples = (1..=10)
        .map(|n| SampleRow {
            sample_set_id: n,
            collected: march(n as u32 + 2, 9),
            product_id: 1,
            location_id: 1,
            fill_id: 1,
            state: if n > 8 { state::FAILED } else { state::PASSED },
        })
        .collect();

    Extraction {
        products: vec![ProductRow {
            product_id: 1,
            disk_series: "203".to_string(),
        }],
        locations: vec![LocationRow {
            location_id: 1,
            location_name: "Newark".to_string(),
        }],
        fill_lines: vec![FillLineRow {
            fill_id: 1,
            display: "Fill-1".to_string(),
        }],
        samples,
        latest_approvals: vec![
            ApprovalRow {
                approval_id: 101,
                sample_set_id: 9,
                approval_time: march(20, 10),
            },
            ApprovalRow {
                approval_id: 102,
                sample_set_id: 10,
                approval_time: march(21, 10),
            },
        ],
        sample_defects: vec![
            SampleDefectRow {
                approval_id: 101,
                defect_type: Some(7),
            },
            SampleDefectRow {
                approval_id: 101,
                defect_type: Some(99),
            },
            SampleDefectRow {
                approval_id: 102,
                defect_type: None,
            },
        ],
        reagent_fails: vec![
            ReagentFailRow {
                approval_id: 101,
                spec_id: Some(50),
                reagent: Some("Buffer A".to_string()),
            },
            ReagentFailRow {
                approval_id: 102,
                spec_id: Some(999),
                reagent: Some("Buffer A".to_string()),
            },
        ],
        specs: vec![SpecRow {
            spec_id: 50,
            standard_name: Some("STD-11".to_string()),
        }],
    }
}
