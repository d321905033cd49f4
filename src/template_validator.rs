/// Template validation: structural gates for uploaded workbooks.
///
/// Gates malformed uploads before any record reaches the pipeline:
/// - Required sheet check: all mandatory sheets must exist.
/// - Comps alternative check: at least one comps-bearing sheet should
///   exist; absence of both is a warning, not a blocker.
/// - Required column check: critical headers must be present per sheet.
/// - Version marker check: optional cell-based version tracking.
///
/// Append-only rule: new columns may be added but existing ones must not
/// be renamed, reordered, or removed. This validator enforces that
/// contract against a caller-supplied workbook model; the actual
/// spreadsheet parsing lives in an external layer.
use regex::Regex;
use serde::{Deserialize, Serialize};

// ============ Workbook Model ============

/// Minimal tabular workbook interface the validator consumes.
///
/// Implemented by the external spreadsheet-parsing layer. Rows are
/// 1-based and addressed by column letter, matching spreadsheet
/// conventions.
pub trait Workbook {
    /// Names of all sheets present, in workbook order.
    fn sheet_names(&self) -> Vec<String>;
    /// Number of populated rows on a sheet; 0 for a missing sheet.
    fn row_count(&self, sheet: &str) -> usize;
    /// Cell content as text, `None` when empty or out of range.
    fn cell_value(&self, sheet: &str, column: &str, row: u32) -> Option<String>;

    /// Whether a sheet exists.
    fn has_sheet(&self, sheet: &str) -> bool {
        self.sheet_names().iter().any(|s| s == sheet)
    }
}

// ============ Types ============

/// Error codes for blocking template failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateErrorCode {
    MissingSheet,
    MissingColumn,
    ColumnMismatch,
    VersionMismatch,
    EmptySheet,
}

/// A single blocking validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateValidationError {
    pub code: TemplateErrorCode,
    pub message: String,
    pub sheet: Option<String>,
    pub column: Option<String>,
}

/// Structured validation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateValidationResult {
    /// Whether the template passes all required checks. Warnings never
    /// affect validity.
    pub valid: bool,
    /// Blocking errors that prevent processing.
    pub errors: Vec<TemplateValidationError>,
    /// Non-blocking warnings (possible reorders, missing comps sheets).
    pub warnings: Vec<String>,
    /// Detected template version ("unknown" when no marker present).
    pub version: String,
    /// Sheets found in the workbook.
    pub sheets_found: Vec<String>,
}

// ============ Template Contract ============

/// Sheets that must exist for the pipeline to function.
pub const REQUIRED_SHEETS: [&str; 4] = ["Analysis", "Full_API_call", "Maricopa", "Lot"];

/// Comps-bearing sheets: at least one should exist. The pipeline can
/// still run without comp-sheet structural guarantees, so absence of
/// both is only a warning.
pub const COMP_SHEET_ALTERNATIVES: [&str; 2] = ["comps", ".5mile"];

/// Minimum column headers required per sheet, as
/// (column letter, expected header text). Only columns the pipeline
/// actively reads; optional columns appended beyond these are allowed.
pub fn required_columns(sheet: &str) -> &'static [(&'static str, &'static str)] {
    match sheet {
        "comps" => &[
            ("B", "Address"),
            ("C", "City"),
            ("E", "Zip"),
            ("F", "APN"),
            ("G", "Sale Price"),
            ("I", "List Price"),
            ("L", "Bedrooms"),
            ("M", "Bathrooms"),
            ("N", "Square Feet"),
            ("P", "Year Built"),
            ("X", "MLS Number"),
            ("Y", "Status"),
        ],
        // The Analysis sheet has custom row-oriented headers.
        "Analysis" => &[("A", "Item"), ("B", "Full Address")],
        _ => &[],
    }
}

/// Sheets with a required-columns contract.
const COLUMN_CHECKED_SHEETS: [&str; 2] = ["comps", "Analysis"];

/// Version marker location: a cell beyond the data columns of the comps
/// sheet, so it never interferes with records.
const VERSION_MARKER_SHEET: &str = "comps";
const VERSION_MARKER_COLUMN: &str = "AL";
const VERSION_MARKER_ROW: u32 = 1;

// ============ Main Validation Function ============

/// Validate an uploaded workbook against the template contract.
///
/// Checks, in order: required sheets, comps alternatives, required
/// column headers, version marker. `expected_version` is an explicit
/// opt-in; `None` (the default deployment) accepts any version.
pub fn validate_template(
    workbook: &dyn Workbook,
    expected_version: Option<&str>,
) -> TemplateValidationResult {
    let mut errors: Vec<TemplateValidationError> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let sheets_found = workbook.sheet_names();

    // Required sheets.
    for sheet_name in REQUIRED_SHEETS {
        if !workbook.has_sheet(sheet_name) {
            errors.push(TemplateValidationError {
                code: TemplateErrorCode::MissingSheet,
                message: format!("Required sheet \"{}\" not found in workbook", sheet_name),
                sheet: Some(sheet_name.to_string()),
                column: None,
            });
        }
    }

    // Comps alternatives: one of the two should be present.
    if !COMP_SHEET_ALTERNATIVES.iter().any(|s| workbook.has_sheet(s)) {
        warnings.push(format!(
            "Neither \"{}\" nor \"{}\" sheet found - comp records will be unavailable",
            COMP_SHEET_ALTERNATIVES[0], COMP_SHEET_ALTERNATIVES[1]
        ));
    }

    // Required column headers.
    for sheet_name in COLUMN_CHECKED_SHEETS {
        if !workbook.has_sheet(sheet_name) {
            // Mandatory sheets were already reported as MissingSheet;
            // an absent alternative sheet has nothing to check.
            continue;
        }

        if workbook.row_count(sheet_name) == 0 {
            errors.push(TemplateValidationError {
                code: TemplateErrorCode::EmptySheet,
                message: format!("Sheet \"{}\" is empty (no rows)", sheet_name),
                sheet: Some(sheet_name.to_string()),
                column: None,
            });
            continue;
        }

        for (column, expected_header) in required_columns(sheet_name) {
            let actual = workbook
                .cell_value(sheet_name, column, 1)
                .map(|v| v.trim().to_string())
                .unwrap_or_default();

            if actual.is_empty() {
                errors.push(TemplateValidationError {
                    code: TemplateErrorCode::MissingColumn,
                    message: format!(
                        "Sheet \"{}\" column {} header is empty (expected \"{}\")",
                        sheet_name, column, expected_header
                    ),
                    sheet: Some(sheet_name.to_string()),
                    column: Some(column.to_string()),
                });
            } else if !header_match(&actual, expected_header) {
                warnings.push(format!(
                    "Sheet \"{}\" column {}: header \"{}\" differs from expected \"{}\" (may indicate column reorder)",
                    sheet_name, column, actual, expected_header
                ));
            }
        }
    }

    // Version marker.
    let version = workbook
        .cell_value(VERSION_MARKER_SHEET, VERSION_MARKER_COLUMN, VERSION_MARKER_ROW)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    if let Some(expected) = expected_version {
        if version != "unknown" && version != expected {
            errors.push(TemplateValidationError {
                code: TemplateErrorCode::VersionMismatch,
                message: format!(
                    "Template version \"{}\" does not match expected \"{}\"",
                    version, expected
                ),
                sheet: None,
                column: None,
            });
        }
    }

    let valid = errors.is_empty();
    if !valid {
        tracing::warn!(
            "Template validation failed with {} errors, {} warnings",
            errors.len(),
            warnings.len()
        );
    }

    TemplateValidationResult {
        valid,
        errors,
        warnings,
        version,
        sheets_found,
    }
}

// ============ Header Matching ============

/// Fuzzy header match: case-insensitive, underscores/hyphens treated as
/// spaces, repeated whitespace collapsed, then equal or one containing
/// the other (so "Sale Price ($)" matches "Sale Price").
fn header_match(actual: &str, expected: &str) -> bool {
    let separators = Regex::new(r"[_\-]+").unwrap();
    let whitespace = Regex::new(r"\s+").unwrap();
    let normalize = |s: &str| -> String {
        let lowered = s.to_lowercase();
        let spaced = separators.replace_all(&lowered, " ");
        whitespace.replace_all(&spaced, " ").trim().to_string()
    };

    let a = normalize(actual);
    let e = normalize(expected);

    a == e || a.contains(&e) || e.contains(&a)
}

// ============ Error Formatting ============

/// Format a validation result into the user-facing message. This is the
/// validator's output contract; callers must not build their own ad hoc
/// strings from the error list.
pub fn format_validation_errors(result: &TemplateValidationResult) -> String {
    if result.valid {
        return "Template is valid".to_string();
    }

    let mut lines: Vec<String> = result
        .errors
        .iter()
        .map(|e| format!("• {}", e.message))
        .collect();
    if !result.warnings.is_empty() {
        lines.push(String::new());
        lines.push("Warnings:".to_string());
        lines.extend(result.warnings.iter().map(|w| format!("  ⚠ {}", w)));
    }

    format!("Template validation failed:\n{}", lines.join("\n"))
}
