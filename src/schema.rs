/// Column-name constants and fixed code tables for the spin QC schema.
/// Single source of truth for every extraction query and frame column.

// ── Product columns ─────────────────────────────────────────────────────────
pub mod product {
    pub const PRODUCT_ID: &str = "product_id";
    /// `products.name`, aliased at extraction time to the display name
    /// carried through assembly and the sample listing.
    pub const DISK_SERIES: &str = "disk_series";
}

// ── Location columns ────────────────────────────────────────────────────────
pub mod location {
    pub const LOCATION_ID: &str = "location_id";
    pub const LOCATION_NAME: &str = "location_name";
}

// ── Fill-line columns ───────────────────────────────────────────────────────
pub mod fill_line {
    /// Normalized identifier column after probing (the source table has no
    /// guaranteed id column name).
    pub const FILL_ID: &str = "fill_id";
    pub const DISPLAY: &str = "display";
    /// Derived display column attached to assembled samples.
    pub const FILL_DISPLAY: &str = "fill_display";
}

// ── Sample columns ──────────────────────────────────────────────────────────
pub mod sample {
    pub const SAMPLE_SET_ID: &str = "sample_set_id";
    pub const COLLECTED: &str = "collected";
    pub const STATE: &str = "state";
    /// First-of-month bucket derived from `collected`.
    pub const TIMESPAN: &str = "timespan";
}

// ── Approval columns ────────────────────────────────────────────────────────
pub mod approval {
    pub const APPROVAL_ID: &str = "approval_id";
    pub const APPROVAL_TIME: &str = "approval_time";
}

// ── Defect / reagent columns ────────────────────────────────────────────────
pub mod defect {
    pub const DEFECT_TYPE: &str = "defect_type";
    /// Human-readable label derived from `defect_type`.
    pub const SAMPLE_DEFECT: &str = "sample_defect";
}

pub mod reagent {
    pub const SPEC_ID: &str = "spec_id";
    pub const REAGENT: &str = "reagent";
    pub const STANDARD_NAME: &str = "standard_name";
}

// ── Sample state codes ──────────────────────────────────────────────────────
pub mod state {
    pub const PASSED: i32 = 1;
    pub const FAILED: i32 = 3;
}

/// Status text for a sample state code. Codes outside {1, 3} exist in the
/// store but are excluded from pass/fail analysis.
pub fn status_label(state: i32) -> &'static str {
    match state {
        state::PASSED => "Passed",
        state::FAILED => "Failed",
        _ => "Unknown",
    }
}

/// Defect descriptions indexed by the integer code stored in
/// `sample_defects.type`. The authoritative enumeration lives in the
/// external schema; if it ever reorders, this table silently desyncs.
pub const DEFECT_CODES: [&str; 23] = [
    "Other",
    "BB Misplacement",
    "BB Missing",
    "Bead Incorrect",
    "Bead Misplacement",
    "Bead Missing",
    "Disk Body Failure",
    "Disk Bubbles",
    "Disk Foreign Matter",
    "Disk Leaking",
    "Disk Lid Failure",
    "Oven Malfunction",
    "Oven Temperature",
    "Reagent Adjustment Failure",
    "Reagent Contamination Sprays Drips",
    "Reagent CrossedLines",
    "Reagent Discoloration",
    "Reagent Expired",
    "Reagent Fill Machine Weight",
    "Reagent Incorrect",
    "Reagent Missing",
    "Room GPP",
    "Room Power Outage",
];

/// Map a raw defect code to its description.
///
/// A missing code yields no label; an out-of-range code degrades to
/// "Unknown" rather than failing the pipeline.
pub fn defect_label(code: Option<i32>) -> Option<&'static str> {
    let code = code?;
    let label = usize::try_from(code)
        .ok()
        .and_then(|idx| DEFECT_CODES.get(idx).copied())
        .unwrap_or("Unknown");
    Some(label)
}

// ── Known catalog values ────────────────────────────────────────────────────
// Shipped for the presentation layer's multi-select defaults.
pub mod catalog {
    pub const PRODUCTS: [&str; 17] = [
        "203", "303", "Q203", "FF104", "Q104", "DW 21", "DW13", "FF203", "103", "801", "204",
        "26743BIO", "304", "BC 803", "402", "26744BIO", "104",
    ];

    pub const LOCATIONS: [&str; 2] = ["Newark", "Chestertown"];

    pub const FILL_LINES: [&str; 7] = [
        "Fill-1", "Fill-2", "Fill-3", "Fill-4", "Fill-5", "Fill-6", "Fill-7",
    ];
}
