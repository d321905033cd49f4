/// Unit tests for the template validator: sheet gates, fuzzy header
/// matching, version markers, and error formatting.
use comp_valuation::template_validator::{
    format_validation_errors, validate_template, TemplateErrorCode, Workbook,
};
use std::collections::HashMap;

/// Minimal in-memory workbook for exercising the validator, standing in
/// for the external spreadsheet-parsing layer.
#[derive(Default)]
struct TestWorkbook {
    /// Sheet name -> (cell address like "B1" -> value, row count).
    sheets: Vec<(String, HashMap<String, String>, usize)>,
}

impl TestWorkbook {
    fn with_sheet(mut self, name: &str, rows: usize, cells: &[(&str, &str)]) -> Self {
        let map = cells
            .iter()
            .map(|(addr, value)| (addr.to_string(), value.to_string()))
            .collect();
        self.sheets.push((name.to_string(), map, rows));
        self
    }
}

impl Workbook for TestWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _, _)| name.clone()).collect()
    }

    fn row_count(&self, sheet: &str) -> usize {
        self.sheets
            .iter()
            .find(|(name, _, _)| name == sheet)
            .map(|(_, _, rows)| *rows)
            .unwrap_or(0)
    }

    fn cell_value(&self, sheet: &str, column: &str, row: u32) -> Option<String> {
        let (_, cells, _) = self.sheets.iter().find(|(name, _, _)| name == sheet)?;
        cells.get(&format!("{}{}", column, row)).cloned()
    }
}

const COMPS_HEADERS: [(&str, &str); 12] = [
    ("B1", "Address"),
    ("C1", "City"),
    ("E1", "Zip"),
    ("F1", "APN"),
    ("G1", "Sale Price"),
    ("I1", "List Price"),
    ("L1", "Bedrooms"),
    ("M1", "Bathrooms"),
    ("N1", "Square Feet"),
    ("P1", "Year Built"),
    ("X1", "MLS Number"),
    ("Y1", "Status"),
];

fn valid_workbook() -> TestWorkbook {
    TestWorkbook::default()
        .with_sheet("comps", 10, &COMPS_HEADERS)
        .with_sheet("Analysis", 40, &[("A1", "Item"), ("B1", "Full Address")])
        .with_sheet("Full_API_call", 5, &[])
        .with_sheet("Maricopa", 5, &[])
        .with_sheet("Lot", 5, &[])
}

#[cfg(test)]
mod sheet_tests {
    use super::*;

    #[test]
    fn test_valid_workbook_passes() {
        let result = validate_template(&valid_workbook(), None);
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
        assert_eq!(result.version, "unknown");
        assert_eq!(result.sheets_found.len(), 5);
    }

    #[test]
    fn test_missing_analysis_sheet_blocks() {
        let workbook = TestWorkbook::default()
            .with_sheet("comps", 10, &COMPS_HEADERS)
            .with_sheet("Full_API_call", 5, &[])
            .with_sheet("Maricopa", 5, &[])
            .with_sheet("Lot", 5, &[]);
        let result = validate_template(&workbook, None);

        assert!(!result.valid);
        let error = result
            .errors
            .iter()
            .find(|e| e.code == TemplateErrorCode::MissingSheet)
            .expect("expected MISSING_SHEET error");
        assert!(error.message.contains("Analysis"));
        assert_eq!(error.sheet.as_deref(), Some("Analysis"));
    }

    #[test]
    fn test_both_comp_sheets_absent_warns_but_passes() {
        let workbook = TestWorkbook::default()
            .with_sheet("Analysis", 40, &[("A1", "Item"), ("B1", "Full Address")])
            .with_sheet("Full_API_call", 5, &[])
            .with_sheet("Maricopa", 5, &[])
            .with_sheet("Lot", 5, &[]);
        let result = validate_template(&workbook, None);

        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.contains(".5mile")));
    }

    #[test]
    fn test_half_mile_alternative_satisfies_comps_check() {
        let workbook = TestWorkbook::default()
            .with_sheet(".5mile", 10, &[])
            .with_sheet("Analysis", 40, &[("A1", "Item"), ("B1", "Full Address")])
            .with_sheet("Full_API_call", 5, &[])
            .with_sheet("Maricopa", 5, &[])
            .with_sheet("Lot", 5, &[]);
        let result = validate_template(&workbook, None);
        assert!(result.valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_empty_required_sheet_blocks() {
        let workbook = TestWorkbook::default()
            .with_sheet("comps", 0, &[])
            .with_sheet("Analysis", 40, &[("A1", "Item"), ("B1", "Full Address")])
            .with_sheet("Full_API_call", 5, &[])
            .with_sheet("Maricopa", 5, &[])
            .with_sheet("Lot", 5, &[]);
        let result = validate_template(&workbook, None);
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == TemplateErrorCode::EmptySheet));
    }
}

#[cfg(test)]
mod column_tests {
    use super::*;

    #[test]
    fn test_empty_header_is_blocking() {
        let mut headers = COMPS_HEADERS.to_vec();
        headers.retain(|(addr, _)| *addr != "B1");
        let workbook = TestWorkbook::default()
            .with_sheet("comps", 10, &headers)
            .with_sheet("Analysis", 40, &[("A1", "Item"), ("B1", "Full Address")])
            .with_sheet("Full_API_call", 5, &[])
            .with_sheet("Maricopa", 5, &[])
            .with_sheet("Lot", 5, &[]);
        let result = validate_template(&workbook, None);

        assert!(!result.valid);
        let error = result
            .errors
            .iter()
            .find(|e| e.code == TemplateErrorCode::MissingColumn)
            .expect("expected MISSING_COLUMN error");
        assert_eq!(error.column.as_deref(), Some("B"));
        assert!(error.message.contains("Address"));
    }

    #[test]
    fn test_suffixed_header_fuzzy_matches() {
        let mut headers = COMPS_HEADERS.to_vec();
        headers.retain(|(addr, _)| *addr != "G1");
        headers.push(("G1", "Sale Price ($)"));
        let workbook = TestWorkbook::default()
            .with_sheet("comps", 10, &headers)
            .with_sheet("Analysis", 40, &[("A1", "Item"), ("B1", "Full Address")])
            .with_sheet("Full_API_call", 5, &[])
            .with_sheet("Maricopa", 5, &[])
            .with_sheet("Lot", 5, &[]);
        let result = validate_template(&workbook, None);

        assert!(result.valid);
        assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    }

    #[test]
    fn test_underscores_and_case_fuzzy_match() {
        let mut headers = COMPS_HEADERS.to_vec();
        headers.retain(|(addr, _)| *addr != "N1" && *addr != "X1");
        headers.push(("N1", "square_feet"));
        headers.push(("X1", "MLS  NUMBER"));
        let workbook = TestWorkbook::default()
            .with_sheet("comps", 10, &headers)
            .with_sheet("Analysis", 40, &[("A1", "Item"), ("B1", "Full Address")])
            .with_sheet("Full_API_call", 5, &[])
            .with_sheet("Maricopa", 5, &[])
            .with_sheet("Lot", 5, &[]);
        let result = validate_template(&workbook, None);
        assert!(result.valid);
        assert!(result.warnings.is_empty(), "warnings: {:?}", result.warnings);
    }

    #[test]
    fn test_mismatched_header_warns_without_blocking() {
        let mut headers = COMPS_HEADERS.to_vec();
        headers.retain(|(addr, _)| *addr != "G1");
        headers.push(("G1", "Cost"));
        let workbook = TestWorkbook::default()
            .with_sheet("comps", 10, &headers)
            .with_sheet("Analysis", 40, &[("A1", "Item"), ("B1", "Full Address")])
            .with_sheet("Full_API_call", 5, &[])
            .with_sheet("Maricopa", 5, &[])
            .with_sheet("Lot", 5, &[]);
        let result = validate_template(&workbook, None);

        assert!(result.valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("Cost") && w.contains("column reorder")));
    }
}

#[cfg(test)]
mod version_tests {
    use super::*;

    fn workbook_with_version(version: &str) -> TestWorkbook {
        let mut headers = COMPS_HEADERS.to_vec();
        headers.push(("AL1", version));
        TestWorkbook::default()
            .with_sheet("comps", 10, &headers)
            .with_sheet("Analysis", 40, &[("A1", "Item"), ("B1", "Full Address")])
            .with_sheet("Full_API_call", 5, &[])
            .with_sheet("Maricopa", 5, &[])
            .with_sheet("Lot", 5, &[])
    }

    #[test]
    fn test_version_marker_detected() {
        let result = validate_template(&workbook_with_version("v1.2"), None);
        assert!(result.valid);
        assert_eq!(result.version, "v1.2");
    }

    #[test]
    fn test_version_check_disabled_by_default() {
        // Any marker is accepted when no expected version is configured.
        let result = validate_template(&workbook_with_version("v99"), None);
        assert!(result.valid);
    }

    #[test]
    fn test_version_mismatch_blocks_when_configured() {
        let result = validate_template(&workbook_with_version("v2.0"), Some("v1.0"));
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code == TemplateErrorCode::VersionMismatch));
    }

    #[test]
    fn test_unknown_version_never_mismatches() {
        // No marker cell: version stays unknown and the check is skipped
        // even when an expected version is configured.
        let result = validate_template(&valid_workbook(), Some("v1.0"));
        assert!(result.valid);
        assert_eq!(result.version, "unknown");
    }
}

#[cfg(test)]
mod formatting_tests {
    use super::*;

    #[test]
    fn test_valid_result_formats_cleanly() {
        let result = validate_template(&valid_workbook(), None);
        assert_eq!(format_validation_errors(&result), "Template is valid");
    }

    #[test]
    fn test_failure_message_lists_errors_and_warnings() {
        let workbook = TestWorkbook::default()
            .with_sheet("Full_API_call", 5, &[])
            .with_sheet("Maricopa", 5, &[])
            .with_sheet("Lot", 5, &[]);
        let result = validate_template(&workbook, None);
        let message = format_validation_errors(&result);

        assert!(message.starts_with("Template validation failed:"));
        assert!(message.contains("• Required sheet \"Analysis\" not found"));
        assert!(message.contains("Warnings:"));
        assert!(message.contains("⚠"));
    }
}
