/// Computed metrics: pure per-record derivation of price ratios, true
/// days on market, hold periods, and appreciation deltas.
///
/// Kept separate from parsing (external) and hygiene (record_hygiene):
/// this stage only derives, it never filters or mutates. Enrichment is
/// copy-with-additions; the input record rides along unchanged.
use crate::models::{BreakupsRecord, MlsRecord, MlsStatus, SubjectProperty};
use crate::util::{haversine_miles, round2, round4};
use serde::{Deserialize, Serialize};

/// List-to-sale ratios outside this range are flagged as anomalous.
const LIST_TO_SALE_MIN: f64 = 0.50;
const LIST_TO_SALE_MAX: f64 = 2.00;

// ============ MLS Metrics ============

/// Derived metrics for an MLS-schema record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlsComputedMetrics {
    /// Sale price / living-area sqft. `None` when either is missing.
    pub sale_price_per_sqft: Option<f64>,
    /// List price / living-area sqft. `None` when either is missing.
    pub list_price_per_sqft: Option<f64>,
    /// Sale price / list price, sold records only. Typical range
    /// 0.90-1.10.
    pub list_to_sale_ratio: Option<f64>,
    /// Whether the ratio falls outside the 0.50-2.00 plausibility range.
    pub list_to_sale_ratio_flagged: Option<bool>,
    /// Great-circle distance from the subject in miles, re-derived from
    /// coordinates rather than trusting the feed's distance field.
    pub distance_to_subject: Option<f64>,
    /// Calendar days from list date to sale date.
    pub true_days_on_market: Option<i64>,
    /// The feed's cumulative DOM (may include relists). Zero when absent.
    pub mls_reported_dom: u32,
    /// true DOM minus reported DOM. Positive = feed under-reports.
    pub dom_discrepancy: Option<i64>,
}

/// An MLS record with computed metrics attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedMlsRecord {
    pub record: MlsRecord,
    pub computed_metrics: MlsComputedMetrics,
}

/// Compute derived metrics for a single MLS record.
/// Pure function; the record is not mutated.
pub fn compute_mls_metrics(
    record: &MlsRecord,
    subject: Option<&SubjectProperty>,
) -> MlsComputedMetrics {
    let sqft = record.square_feet.filter(|s| *s > 0.0);
    let sale_price = record.sale_price.filter(|p| *p > 0.0);
    let list_price = record.list_price.filter(|p| *p > 0.0);

    let sale_price_per_sqft = match (sale_price, sqft) {
        (Some(price), Some(sqft)) => Some(round4(price / sqft)),
        _ => None,
    };
    let list_price_per_sqft = match (list_price, sqft) {
        (Some(price), Some(sqft)) => Some(round4(price / sqft)),
        _ => None,
    };

    // List-to-sale ratio is only meaningful once the listing closed.
    let (list_to_sale_ratio, list_to_sale_ratio_flagged) =
        if record.status == MlsStatus::Closed {
            match (sale_price, list_price) {
                (Some(sale), Some(list)) => {
                    let ratio = round4(sale / list);
                    let flagged = !(LIST_TO_SALE_MIN..=LIST_TO_SALE_MAX).contains(&ratio);
                    (Some(ratio), Some(flagged))
                }
                _ => (None, None),
            }
        } else {
            (None, None)
        };

    let distance_to_subject = match (subject, record.latitude, record.longitude) {
        (Some(subj), Some(lat), Some(lon)) => match (subj.latitude, subj.longitude) {
            (Some(subj_lat), Some(subj_lon))
                if subj_lat.is_finite() && subj_lon.is_finite() =>
            {
                Some(haversine_miles(subj_lat, subj_lon, lat, lon))
            }
            _ => None,
        },
        _ => None,
    };

    let true_days_on_market = match (record.sale_date, record.list_date) {
        (Some(sale), Some(list)) => {
            let days = (sale - list).num_days();
            (days >= 0).then_some(days)
        }
        _ => None,
    };

    let mls_reported_dom = record.days_on_market.unwrap_or(0);
    let dom_discrepancy = true_days_on_market.map(|dom| dom - mls_reported_dom as i64);

    MlsComputedMetrics {
        sale_price_per_sqft,
        list_price_per_sqft,
        list_to_sale_ratio,
        list_to_sale_ratio_flagged,
        distance_to_subject,
        true_days_on_market,
        mls_reported_dom,
        dom_discrepancy,
    }
}

/// Compute derived metrics for a batch of MLS records.
pub fn enrich_mls_batch(
    records: &[MlsRecord],
    subject: Option<&SubjectProperty>,
) -> Vec<EnrichedMlsRecord> {
    records
        .iter()
        .map(|record| EnrichedMlsRecord {
            record: record.clone(),
            computed_metrics: compute_mls_metrics(record, subject),
        })
        .collect()
}

// ============ Breakups Metrics ============

/// Derived metrics for a breakups-schema record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakupsComputedMetrics {
    /// Days between seller basis date and sale date.
    pub hold_period_days: Option<i64>,
    /// Dollar gain/loss from seller basis to sale.
    pub seller_basis_delta: Option<f64>,
    /// Fractional appreciation from seller basis to sale.
    pub seller_basis_appreciation: Option<f64>,
    pub sale_price_per_sqft: Option<f64>,
    pub list_to_sale_ratio: Option<f64>,
    pub true_days_on_market: Option<i64>,
}

/// A breakups record with computed metrics attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedBreakupsRecord {
    pub record: BreakupsRecord,
    pub computed_metrics: BreakupsComputedMetrics,
}

/// Compute derived metrics for a single breakups record.
/// Pure function; the record is not mutated.
pub fn compute_breakups_metrics(record: &BreakupsRecord) -> BreakupsComputedMetrics {
    let sqft = (record.sqft > 0.0).then_some(record.sqft);
    let sale_price = (record.sale_price > 0.0).then_some(record.sale_price);
    let list_price = (record.og_list_price > 0.0).then_some(record.og_list_price);
    let basis = (record.seller_basis > 0.0).then_some(record.seller_basis);

    let sale_price_per_sqft = match (sale_price, sqft) {
        (Some(price), Some(sqft)) => Some(round4(price / sqft)),
        _ => None,
    };

    let list_to_sale_ratio = if record.status() == MlsStatus::Closed {
        match (sale_price, list_price) {
            (Some(sale), Some(list)) => Some(round4(sale / list)),
            _ => None,
        }
    } else {
        None
    };

    let hold_period_days = match (record.sale_date, record.seller_basis_date) {
        (Some(sale), Some(basis_date)) => {
            let days = (sale - basis_date).num_days();
            (days >= 0).then_some(days)
        }
        _ => None,
    };

    let (seller_basis_delta, seller_basis_appreciation) = match (sale_price, basis) {
        (Some(sale), Some(basis)) => (
            Some(round2(sale - basis)),
            Some(round4((sale - basis) / basis)),
        ),
        _ => (None, None),
    };

    let true_days_on_market = match (record.sale_date, record.og_list_date) {
        (Some(sale), Some(list)) => {
            let days = (sale - list).num_days();
            (days >= 0).then_some(days)
        }
        _ => None,
    };

    BreakupsComputedMetrics {
        hold_period_days,
        seller_basis_delta,
        seller_basis_appreciation,
        sale_price_per_sqft,
        list_to_sale_ratio,
        true_days_on_market,
    }
}

/// Compute derived metrics for a batch of breakups records.
pub fn enrich_breakups_batch(records: &[BreakupsRecord]) -> Vec<EnrichedBreakupsRecord> {
    records
        .iter()
        .map(|record| EnrichedBreakupsRecord {
            record: record.clone(),
            computed_metrics: compute_breakups_metrics(record),
        })
        .collect()
}

// ============ Batch Summary ============

/// Metric coverage counts for a batch of enriched MLS records.
/// Used for diagnostics and quality reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_records: usize,
    pub sale_price_per_sqft_available: usize,
    pub list_price_per_sqft_available: usize,
    pub list_to_sale_ratio_available: usize,
    pub list_to_sale_ratio_flagged: usize,
    pub distance_to_subject_available: usize,
    pub true_dom_available: usize,
    pub dom_discrepancy_count: usize,
}

/// Summarize metric coverage for a batch of enriched MLS records.
pub fn summarize_mls_metrics(records: &[EnrichedMlsRecord]) -> MetricsSummary {
    let mut summary = MetricsSummary {
        total_records: records.len(),
        ..MetricsSummary::default()
    };

    for enriched in records {
        let m = &enriched.computed_metrics;
        if m.sale_price_per_sqft.is_some() {
            summary.sale_price_per_sqft_available += 1;
        }
        if m.list_price_per_sqft.is_some() {
            summary.list_price_per_sqft_available += 1;
        }
        if m.list_to_sale_ratio.is_some() {
            summary.list_to_sale_ratio_available += 1;
        }
        if m.list_to_sale_ratio_flagged == Some(true) {
            summary.list_to_sale_ratio_flagged += 1;
        }
        if m.distance_to_subject.is_some() {
            summary.distance_to_subject_available += 1;
        }
        if m.true_days_on_market.is_some() {
            summary.true_dom_available += 1;
        }
        if m.dom_discrepancy.is_some_and(|d| d != 0) {
            summary.dom_discrepancy_count += 1;
        }
    }

    summary
}
