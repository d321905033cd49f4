/// Record hygiene: status classification, deduplication, and per-record
/// data quality scoring.
///
/// This stage keeps bad-status and noisy records from contaminating the
/// valuation set. Everything here is a pure function over the input
/// batch; "failure" is always expressed as data on the result, never as
/// an error.
use crate::models::{MlsRecord, MlsStatus};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============ Status Class Policy ============

/// Analysis-level status classification.
///
/// Controls which records are used for valuation vs context vs excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    /// Closed/sold records, usable for valuation math.
    Valuation,
    /// Pending and under-contract records, supporting market data.
    Supporting,
    /// Active records, market context only.
    Context,
    /// Cancelled, temp-off, withdrawn, or unrecognized statuses.
    Excluded,
}

/// Classify an MLS status code into an analysis class.
///
/// Pure lookup, no fallback ambiguity: every code maps to exactly one
/// class and unknown codes are excluded.
pub fn classify_status(status: MlsStatus) -> StatusClass {
    match status {
        MlsStatus::Closed => StatusClass::Valuation,
        MlsStatus::Pending | MlsStatus::UnderContract => StatusClass::Supporting,
        MlsStatus::Active => StatusClass::Context,
        MlsStatus::Cancelled
        | MlsStatus::TempOff
        | MlsStatus::Withdrawn
        | MlsStatus::Unknown => StatusClass::Excluded,
    }
}

/// Check if a record should be included in valuation analysis.
pub fn is_valuation_record(record: &MlsRecord) -> bool {
    classify_status(record.status) == StatusClass::Valuation
}

/// Check if a record should be excluded from all analysis.
pub fn is_excluded_record(record: &MlsRecord) -> bool {
    classify_status(record.status) == StatusClass::Excluded
}

/// Filter records to those whose status class is in `classes`.
pub fn filter_by_status_class(records: &[MlsRecord], classes: &[StatusClass]) -> Vec<MlsRecord> {
    records
        .iter()
        .filter(|r| classes.contains(&classify_status(r.status)))
        .cloned()
        .collect()
}

// ============ Deterministic Deduplication ============

/// Deduplication key: MLS number is primary, normalized address + zip is
/// the fallback.
fn dedupe_key(record: &MlsRecord, whitespace: &Regex) -> String {
    if let Some(mls) = record.mls_number.as_deref().filter(|m| !m.is_empty()) {
        return format!("mls:{}", mls);
    }
    let addr = record.address.as_deref().unwrap_or("");
    let addr = whitespace
        .replace_all(addr.trim(), " ")
        .to_uppercase();
    format!("addr:{}|{}", addr, record.zip.as_deref().unwrap_or(""))
}

/// Completeness score for tie-breaking. Higher = more complete record.
/// Weighted sum over 11 presence checks.
fn completeness_score(record: &MlsRecord) -> u32 {
    let mut score = 0;
    if record.sale_price.is_some_and(|p| p > 0.0) {
        score += 10;
    }
    if record.sale_date.is_some() {
        score += 10;
    }
    if record.apn.as_deref().is_some_and(|a| !a.is_empty()) {
        score += 5;
    }
    if record.square_feet.is_some_and(|s| s > 0.0) {
        score += 3;
    }
    if record.year_built.is_some_and(|y| y > 0) {
        score += 3;
    }
    if record.bedrooms.is_some_and(|b| b > 0.0) {
        score += 2;
    }
    if record.bathrooms.is_some_and(|b| b > 0.0) {
        score += 2;
    }
    if record.lot_size.is_some_and(|l| l > 0.0) {
        score += 2;
    }
    if record.latitude.is_some() && record.longitude.is_some() {
        score += 2;
    }
    if record.subdivision.as_deref().is_some_and(|s| !s.is_empty()) {
        score += 1;
    }
    if record.remarks.as_deref().is_some_and(|r| !r.is_empty()) {
        score += 1;
    }
    score
}

/// Status priority for tie-breaking: Sold > Under Contract > Pending >
/// Active > Temp Off/Withdrawn > Cancelled.
fn status_priority(status: MlsStatus) -> u8 {
    match status {
        MlsStatus::Closed => 5,
        MlsStatus::UnderContract => 4,
        MlsStatus::Pending => 3,
        MlsStatus::Active => 2,
        MlsStatus::TempOff | MlsStatus::Withdrawn => 1,
        MlsStatus::Cancelled | MlsStatus::Unknown => 0,
    }
}

/// Result of deduplicating a record batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupeResult {
    /// Surviving records, in first-seen key order.
    pub records: Vec<MlsRecord>,
    /// Number of duplicates removed.
    pub duplicates_removed: usize,
    /// Keys that had at least one collapse (for diagnostics).
    pub collapsed_keys: Vec<String>,
}

/// Deterministic deduplication of MLS records.
///
/// For records sharing a key, the survivor is chosen by the first rule
/// that discriminates:
/// 1. Higher status priority
/// 2. Higher completeness score
/// 3. More recent sale date
///
/// Full ties keep the earlier-seen record. Output order is first-seen
/// key order, so identical input always yields identical output.
pub fn deduplicate_records(records: &[MlsRecord]) -> DedupeResult {
    let whitespace = Regex::new(r"\s+").unwrap();

    let mut order: Vec<String> = Vec::new();
    let mut seen: HashMap<String, MlsRecord> = HashMap::new();
    let mut collapsed_keys: Vec<String> = Vec::new();

    for record in records {
        let key = dedupe_key(record, &whitespace);

        let existing = match seen.get(&key) {
            None => {
                order.push(key.clone());
                seen.insert(key, record.clone());
                continue;
            }
            Some(existing) => existing,
        };

        let keep_new = match status_priority(record.status).cmp(&status_priority(existing.status))
        {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => {
                match completeness_score(record).cmp(&completeness_score(existing)) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => match (record.sale_date, existing.sale_date) {
                        (Some(new_date), Some(old_date)) => new_date > old_date,
                        _ => false,
                    },
                }
            }
        };

        if keep_new {
            if !collapsed_keys.contains(&key) {
                collapsed_keys.push(key.clone());
            }
            seen.insert(key, record.clone());
        }
    }

    let deduped: Vec<MlsRecord> = order
        .iter()
        .filter_map(|key| seen.get(key).cloned())
        .collect();

    let duplicates_removed = records.len() - deduped.len();
    if duplicates_removed > 0 {
        tracing::debug!(
            "Deduplication removed {} of {} records ({} keys collapsed)",
            duplicates_removed,
            records.len(),
            collapsed_keys.len()
        );
    }

    DedupeResult {
        records: deduped,
        duplicates_removed,
        collapsed_keys,
    }
}

// ============ Data Quality Scoring ============

/// Minimum quality score to be included in analysis (out of 100).
pub const MIN_QUALITY_SCORE: u32 = 30;

/// A single contributing factor in the quality rubric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityFactor {
    pub name: String,
    pub weight: u32,
    pub present: bool,
    pub points: u32,
}

/// Per-record data quality result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityScore {
    /// Overall quality score 0-100.
    pub score: u32,
    /// Breakdown of contributing factors.
    pub factors: Vec<QualityFactor>,
    /// Reasons this record might be excluded from analysis.
    pub exclusion_reasons: Vec<String>,
    /// Whether the record passes the minimum quality threshold.
    pub passes: bool,
}

fn quality_factor(name: &str, weight: u32, present: bool) -> QualityFactor {
    QualityFactor {
        name: name.to_string(),
        weight,
        present,
        points: if present { weight } else { 0 },
    }
}

/// Score a single MLS record for data quality.
///
/// Fixed 100-point rubric:
/// - Core identification (15): MLS number 10, APN 5
/// - Pricing (25): sale price 15, list price 5, price per sqft 5
/// - Physical characteristics (25): sqft 8, beds 4, baths 4, year 5, lot 4
/// - Location (15): coordinates 5, city 5, subdivision 5
/// - Market data (10): status 4, DOM 3, sale date 3
/// - Transaction context (10): listing terms 5, agent info 5
///
/// Each sub-factor is binary presence: full weight if present, zero
/// otherwise. Exclusion reasons are collected independently of the score.
pub fn score_record_quality(record: &MlsRecord) -> QualityScore {
    let has_sale_price = record.sale_price.is_some_and(|p| p > 0.0);
    let has_sqft = record.square_feet.is_some_and(|s| s > 0.0);

    let factors = vec![
        // Core identification (15 pts)
        quality_factor(
            "MLS number",
            10,
            record.mls_number.as_deref().is_some_and(|m| !m.is_empty()),
        ),
        quality_factor(
            "APN",
            5,
            record.apn.as_deref().is_some_and(|a| !a.is_empty()),
        ),
        // Pricing (25 pts)
        quality_factor("Sale price", 15, has_sale_price),
        quality_factor("List price", 5, record.list_price.is_some_and(|p| p > 0.0)),
        quality_factor(
            "Price per sqft",
            5,
            record.price_per_sqft.is_some_and(|p| p > 0.0 && p.is_finite()),
        ),
        // Physical characteristics (25 pts)
        quality_factor("Square footage", 8, has_sqft),
        quality_factor("Bedrooms", 4, record.bedrooms.is_some_and(|b| b > 0.0)),
        quality_factor("Bathrooms", 4, record.bathrooms.is_some_and(|b| b > 0.0)),
        quality_factor("Year built", 5, record.year_built.is_some_and(|y| y > 0)),
        quality_factor("Lot size", 4, record.lot_size.is_some_and(|l| l > 0.0)),
        // Location (15 pts)
        quality_factor(
            "Coordinates",
            5,
            record.latitude.is_some() && record.longitude.is_some(),
        ),
        quality_factor(
            "City",
            5,
            record.city.as_deref().is_some_and(|c| !c.is_empty()),
        ),
        quality_factor(
            "Subdivision",
            5,
            record.subdivision.as_deref().is_some_and(|s| !s.is_empty()),
        ),
        // Market data (10 pts)
        quality_factor("Valid status", 4, record.status != MlsStatus::Unknown),
        quality_factor(
            "Days on market",
            3,
            record.days_on_market.is_some_and(|d| d > 0),
        ),
        quality_factor("Sale date", 3, record.sale_date.is_some()),
        // Transaction context (10 pts)
        quality_factor(
            "Listing terms",
            5,
            record.listing_terms.as_deref().is_some_and(|t| !t.is_empty()),
        ),
        quality_factor(
            "Agent info",
            5,
            record.listing_agent.as_deref().is_some_and(|a| !a.is_empty()),
        ),
    ];

    let score: u32 = factors.iter().map(|f| f.points).sum();

    let mut exclusion_reasons = Vec::new();
    if is_excluded_record(record) {
        exclusion_reasons.push(format!(
            "Status '{}' is excluded from analysis",
            record.status.display()
        ));
    }
    if record.address.as_deref().map_or(true, |a| a.is_empty()) {
        exclusion_reasons.push("Missing address".to_string());
    }
    if !has_sqft && !has_sale_price {
        exclusion_reasons.push("Missing both square footage and sale price".to_string());
    }
    if record.is_foreclosure {
        exclusion_reasons.push("Foreclosure - may not reflect market value".to_string());
    }
    if record.is_reo {
        exclusion_reasons.push("REO/Bank-owned - may not reflect market value".to_string());
    }
    if record.is_short_sale {
        exclusion_reasons.push("Short sale - may not reflect market value".to_string());
    }

    let missing_address = exclusion_reasons.iter().any(|r| r.contains("Missing address"));
    let passes = score >= MIN_QUALITY_SCORE && !missing_address;

    QualityScore {
        score,
        factors,
        exclusion_reasons,
        passes,
    }
}

// ============ Batch Scoring ============

/// A record annotated with its hygiene metadata. The original record is
/// carried unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub record: MlsRecord,
    pub quality_score: u32,
    pub status_class: StatusClass,
    pub exclusion_reasons: Vec<String>,
    pub quality_passes: bool,
}

/// Record counts per status class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusClassCounts {
    pub valuation: usize,
    pub supporting: usize,
    pub context: usize,
    pub excluded: usize,
}

impl StatusClassCounts {
    pub fn bump(&mut self, class: StatusClass) {
        match class {
            StatusClass::Valuation => self.valuation += 1,
            StatusClass::Supporting => self.supporting += 1,
            StatusClass::Context => self.context += 1,
            StatusClass::Excluded => self.excluded += 1,
        }
    }
}

/// Aggregate stats for a scored batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub passing: usize,
    pub failing: usize,
    pub by_status_class: StatusClassCounts,
    pub avg_score: u32,
}

/// Result of scoring and classifying a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredBatch {
    pub scored: Vec<ScoredRecord>,
    pub stats: BatchStats,
}

/// Score and annotate a batch of records with quality metadata and
/// status classes.
pub fn score_and_classify_batch(records: &[MlsRecord]) -> ScoredBatch {
    let mut by_status_class = StatusClassCounts::default();
    let mut total_score: u64 = 0;

    let scored: Vec<ScoredRecord> = records
        .iter()
        .map(|record| {
            let quality = score_record_quality(record);
            let status_class = classify_status(record.status);
            by_status_class.bump(status_class);
            total_score += quality.score as u64;
            ScoredRecord {
                record: record.clone(),
                quality_score: quality.score,
                status_class,
                exclusion_reasons: quality.exclusion_reasons,
                quality_passes: quality.passes,
            }
        })
        .collect();

    let passing = scored.iter().filter(|r| r.quality_passes).count();
    let avg_score = if records.is_empty() {
        0
    } else {
        (total_score as f64 / records.len() as f64).round() as u32
    };

    tracing::info!(
        "Hygiene batch: {} records, {} passing, avg quality {}",
        records.len(),
        passing,
        avg_score
    );

    ScoredBatch {
        stats: BatchStats {
            total: records.len(),
            passing,
            failing: records.len() - passing,
            by_status_class,
            avg_score,
        },
        scored,
    }
}
