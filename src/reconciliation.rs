/// Reconciliation: confidence-graded rent, NOI, and value estimates.
///
/// Grounds income and value estimates in actual comp data when it
/// exists, and degrades explicitly (never silently) to the upstream
/// modeled NOI when it does not:
/// 1. Derives a market rent estimate from scored lease comps.
/// 2. Cross-references modeled NOI against the lease-observed NOI.
/// 3. Blends a sales-comparison value with an income-approach value.
///
/// Every estimate carries a confidence grade; `synthetic` marks numbers
/// with no real comparable evidence behind them.
use crate::comp_scoring::{CompTier, RankedComp, ScoredComp, SimilarityFactors, TierCounts};
use crate::models::{BreakupsRecord, ModeledNoi};
use crate::util::{round2, round4};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============ Types ============

/// Confidence grade for an estimate.
///
/// - `High`: 3+ closed comps with strong similarity scores
/// - `Medium`: 1-2 closed comps or weaker similarity
/// - `Low`: minimal comp evidence
/// - `Synthetic`: modeled with no comp validation at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceGrade {
    High,
    Medium,
    Low,
    Synthetic,
}

impl ConfidenceGrade {
    /// Total order for picking the best-supported approach:
    /// high > medium > low > synthetic.
    fn rank(&self) -> u8 {
        match self {
            ConfidenceGrade::High => 3,
            ConfidenceGrade::Medium => 2,
            ConfidenceGrade::Low => 1,
            ConfidenceGrade::Synthetic => 0,
        }
    }
}

/// How a market rent estimate was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RentMethod {
    /// Each lease comp's rent weighted by its similarity score.
    CompWeighted,
    /// Unweighted average (no similarity scores available).
    CompAverage,
    /// No usable lease comps; implied from the modeled NOI.
    SyntheticMultiplier,
}

/// Market-derived rental estimate from actual lease comps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRentEstimate {
    /// Estimated monthly rent.
    pub monthly_rent: f64,
    /// Annual rent (monthly x 12).
    pub annual_rent: f64,
    /// Rent per sqft per month.
    pub rent_per_sqft_monthly: f64,
    /// Number of lease comps used.
    pub lease_comp_count: usize,
    /// Average similarity score of the lease comps used (0-100).
    pub avg_comp_score: u32,
    pub confidence: ConfidenceGrade,
    pub method: RentMethod,
}

/// Source of a reconciled NOI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiSource {
    Market,
    Blended,
    Modeled,
}

/// Reconciled NOI comparing modeled vs market-based estimates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciledNoi {
    /// Annual NOI from the upstream multiplier model (0 when absent).
    pub modeled_noi: f64,
    /// Annual NOI implied by market-derived lease data.
    pub market_noi: Option<f64>,
    /// Best-estimate annual NOI.
    pub reconciled_noi: f64,
    pub reconciled_cap_rate: Option<f64>,
    pub confidence: ConfidenceGrade,
    /// Fractional divergence of market NOI from modeled NOI.
    pub divergence: Option<f64>,
    pub source: NoiSource,
    pub explanation: String,
}

/// Valuation approach identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApproachName {
    SalesComparison,
    Income,
}

/// One valuation approach and its contribution to the blend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueApproach {
    pub name: ApproachName,
    pub value: Option<f64>,
    pub weight: f64,
    pub confidence: ConfidenceGrade,
    pub comp_count: usize,
}

/// Low/high bracket around the reconciled value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub low: f64,
    pub high: f64,
}

/// Reconciled value estimate for a subject property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciledValueEstimate {
    /// Score-weighted average sale price from scored comps.
    pub comp_weighted_value: Option<f64>,
    /// Median sale price among primary-tier comps only.
    pub primary_comp_median: Option<f64>,
    /// Income approach value (reconciled NOI / cap rate).
    pub income_approach_value: Option<f64>,
    /// Final blended value.
    pub reconciled_value: Option<f64>,
    pub confidence: ConfidenceGrade,
    pub range: Option<ValueRange>,
    pub approaches: Vec<ValueApproach>,
}

/// Diagnostics for a full reconciliation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationDiagnostics {
    pub total_comps_scored: usize,
    pub comps_by_tier: TierCounts,
    pub lease_comps_available: usize,
    pub sale_comps_available: usize,
    /// Whether market rent could actually be derived from lease comps.
    pub has_market_rent: bool,
    /// Whether a usable modeled NOI was supplied for comparison.
    pub has_modeled_noi: bool,
}

/// Terminal aggregate of the reconciliation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub market_rent: MarketRentEstimate,
    pub reconciled_noi: ReconciledNoi,
    pub value_estimate: ReconciledValueEstimate,
    pub diagnostics: ReconciliationDiagnostics,
}

// ============ Constants ============

/// Operating expense ratio applied to gross rent.
const OPERATING_EXPENSE_RATIO: f64 = 0.35;

/// Cap rate assumption for the income approach when nothing better is
/// available.
const DEFAULT_CAP_RATE: f64 = 0.065;

/// Minimum lease comps for a high-confidence rent estimate.
const HIGH_CONFIDENCE_LEASE_COMPS: usize = 3;

/// Minimum average comp score for high confidence.
const HIGH_CONFIDENCE_MIN_SCORE: u32 = 60;

/// Divergence above which the modeled/market discrepancy is flagged.
const DIVERGENCE_WARNING_THRESHOLD: f64 = 0.25;

/// Placeholder similarity score assumed for sale comps when no upstream
/// scoring was run. A documented default, not a tunable.
const DEFAULT_COMP_SCORE: u32 = 50;

// ============ Market Rent Estimation ============

/// Derive a market rent estimate from actual lease comp data.
///
/// Methods, in preference order:
/// 1. comp-weighted: each lease comp's rent weighted by similarity score
/// 2. comp-average: simple average when no scores are available
/// 3. synthetic-multiplier: implied by the modeled NOI when no usable
///    lease comps exist
pub fn estimate_market_rent(
    subject: &BreakupsRecord,
    lease_comps: &[BreakupsRecord],
    comp_scores: Option<&HashMap<String, ScoredComp>>,
    modeled_noi: Option<&ModeledNoi>,
) -> MarketRentEstimate {
    // Filter to closed lease comps with a recorded rent.
    let valid_leases: Vec<&BreakupsRecord> = lease_comps
        .iter()
        .filter(|lc| lc.is_rental() && lc.status() == crate::models::MlsStatus::Closed)
        .filter(|lc| lc.sale_price > 0.0)
        .collect();

    if valid_leases.is_empty() {
        let monthly_rent = modeled_noi.map(|m| m.monthly_rent).unwrap_or(0.0);
        return MarketRentEstimate {
            monthly_rent,
            annual_rent: monthly_rent * 12.0,
            rent_per_sqft_monthly: if subject.sqft > 0.0 {
                round2(monthly_rent / subject.sqft)
            } else {
                0.0
            },
            lease_comp_count: 0,
            avg_comp_score: 0,
            confidence: ConfidenceGrade::Synthetic,
            method: RentMethod::SyntheticMultiplier,
        };
    }

    if let Some(scores) = comp_scores.filter(|s| !s.is_empty()) {
        if let Some(weighted) = compute_weighted_rent(&valid_leases, subject, scores) {
            return weighted;
        }
    }

    // Fallback: simple sqft-based average.
    let rent_per_sqft_values: Vec<f64> = valid_leases
        .iter()
        .filter(|lc| lc.sqft > 0.0)
        .map(|lc| lc.sale_price / lc.sqft)
        .collect();

    if !rent_per_sqft_values.is_empty() && subject.sqft > 0.0 {
        let avg_rent_per_sqft =
            rent_per_sqft_values.iter().sum::<f64>() / rent_per_sqft_values.len() as f64;
        let monthly_rent = round2(avg_rent_per_sqft * subject.sqft);
        return MarketRentEstimate {
            monthly_rent,
            annual_rent: round2(monthly_rent * 12.0),
            rent_per_sqft_monthly: round2(avg_rent_per_sqft),
            lease_comp_count: valid_leases.len(),
            avg_comp_score: 0,
            confidence: grade_lease_confidence(valid_leases.len(), 0),
            method: RentMethod::CompAverage,
        };
    }

    // Last resort: average raw rent values.
    let avg_rent =
        valid_leases.iter().map(|lc| lc.sale_price).sum::<f64>() / valid_leases.len() as f64;
    MarketRentEstimate {
        monthly_rent: round2(avg_rent),
        annual_rent: round2(avg_rent * 12.0),
        rent_per_sqft_monthly: if subject.sqft > 0.0 {
            round2(avg_rent / subject.sqft)
        } else {
            0.0
        },
        lease_comp_count: valid_leases.len(),
        avg_comp_score: 0,
        confidence: grade_lease_confidence(valid_leases.len(), 0),
        method: RentMethod::CompAverage,
    }
}

/// Compute a score-weighted rent estimate. `None` when no lease comp has
/// a positive similarity score.
fn compute_weighted_rent(
    lease_comps: &[&BreakupsRecord],
    subject: &BreakupsRecord,
    comp_scores: &HashMap<String, ScoredComp>,
) -> Option<MarketRentEstimate> {
    struct ScoredLease {
        rent: f64,
        score: f64,
        sqft: f64,
    }

    let scored_leases: Vec<ScoredLease> = lease_comps
        .iter()
        .filter_map(|lc| {
            let comp_score = comp_scores.get(lc.comp_key())?;
            if comp_score.overall_score == 0 {
                return None;
            }
            Some(ScoredLease {
                rent: lc.sale_price,
                score: comp_score.overall_score as f64,
                sqft: lc.sqft,
            })
        })
        .collect();

    if scored_leases.is_empty() {
        return None;
    }

    let total_weight: f64 = scored_leases.iter().map(|sl| sl.score).sum();
    let avg_comp_score = (total_weight / scored_leases.len() as f64).round() as u32;

    if subject.sqft > 0.0 {
        // Sqft-normalized weighted average.
        let weighted_rent_per_sqft: f64 = scored_leases
            .iter()
            .filter(|sl| sl.sqft > 0.0)
            .map(|sl| (sl.rent / sl.sqft) * (sl.score / total_weight))
            .sum();

        if weighted_rent_per_sqft > 0.0 {
            let monthly_rent = round2(weighted_rent_per_sqft * subject.sqft);
            return Some(MarketRentEstimate {
                monthly_rent,
                annual_rent: round2(monthly_rent * 12.0),
                rent_per_sqft_monthly: round2(weighted_rent_per_sqft),
                lease_comp_count: scored_leases.len(),
                avg_comp_score,
                confidence: grade_lease_confidence(scored_leases.len(), avg_comp_score),
                method: RentMethod::CompWeighted,
            });
        }
    }

    // Raw weighted average when sqft normalization is not possible.
    let weighted_rent: f64 = scored_leases
        .iter()
        .map(|sl| sl.rent * (sl.score / total_weight))
        .sum();
    let monthly_rent = round2(weighted_rent);

    Some(MarketRentEstimate {
        monthly_rent,
        annual_rent: round2(monthly_rent * 12.0),
        rent_per_sqft_monthly: if subject.sqft > 0.0 {
            round2(monthly_rent / subject.sqft)
        } else {
            0.0
        },
        lease_comp_count: scored_leases.len(),
        avg_comp_score,
        confidence: grade_lease_confidence(scored_leases.len(), avg_comp_score),
        method: RentMethod::CompWeighted,
    })
}

// ============ Reconciled NOI ============

/// Reconcile the modeled NOI with the market-derived rental estimate.
///
/// Three outcomes:
/// 1. `market`: high-confidence lease evidence wins outright
/// 2. `blended`: partial lease evidence, blended with the model
/// 3. `modeled`: no lease evidence, modeled NOI with synthetic confidence
pub fn reconcile_noi(
    market_rent: &MarketRentEstimate,
    modeled_noi: Option<&ModeledNoi>,
    subject_price: f64,
) -> ReconciledNoi {
    let modeled_annual_noi = modeled_noi.map(|m| m.annual_noi).unwrap_or(0.0);

    let market_noi = if market_rent.method != RentMethod::SyntheticMultiplier
        && market_rent.annual_rent > 0.0
    {
        let gross_income = market_rent.annual_rent;
        let opex = gross_income * OPERATING_EXPENSE_RATIO;
        Some(round2(gross_income - opex))
    } else {
        None
    };

    let (reconciled_noi, source, confidence, mut explanation) = match market_noi {
        Some(market) if market_rent.confidence == ConfidenceGrade::High => (
            market,
            NoiSource::Market,
            ConfidenceGrade::High,
            format!(
                "Market-derived NOI from {} lease comps (avg score {}/100)",
                market_rent.lease_comp_count, market_rent.avg_comp_score
            ),
        ),
        Some(market) if modeled_annual_noi > 0.0 => {
            let market_weight = if market_rent.confidence == ConfidenceGrade::Medium {
                0.6
            } else {
                0.4
            };
            let blended = round2(market * market_weight + modeled_annual_noi * (1.0 - market_weight));
            let confidence = if market_rent.confidence == ConfidenceGrade::Medium {
                ConfidenceGrade::Medium
            } else {
                ConfidenceGrade::Low
            };
            (
                blended,
                NoiSource::Blended,
                confidence,
                format!(
                    "Blended NOI: {}% market ({} comps) + {}% modeled",
                    (market_weight * 100.0).round() as i64,
                    market_rent.lease_comp_count,
                    ((1.0 - market_weight) * 100.0).round() as i64
                ),
            )
        }
        _ => (
            modeled_annual_noi,
            NoiSource::Modeled,
            ConfidenceGrade::Synthetic,
            "Modeled NOI only - no lease comps available for market validation".to_string(),
        ),
    };

    let reconciled_cap_rate = if subject_price > 0.0 {
        Some(round4(reconciled_noi / subject_price))
    } else {
        None
    };

    // Divergence between modeled and market views of the same property.
    let mut divergence = None;
    if let Some(market) = market_noi {
        if modeled_annual_noi > 0.0 {
            let d = round4((market - modeled_annual_noi) / modeled_annual_noi);
            divergence = Some(d);
            if d.abs() > DIVERGENCE_WARNING_THRESHOLD {
                explanation.push_str(&format!(
                    " - WARNING: {}% divergence between market and modeled",
                    (d.abs() * 100.0).round() as i64
                ));
                tracing::warn!(
                    "NOI divergence {:.1}% exceeds {:.0}% threshold",
                    d.abs() * 100.0,
                    DIVERGENCE_WARNING_THRESHOLD * 100.0
                );
            }
        }
    }

    ReconciledNoi {
        modeled_noi: modeled_annual_noi,
        market_noi,
        reconciled_noi,
        reconciled_cap_rate,
        confidence,
        divergence,
        source,
        explanation,
    }
}

// ============ Reconciled Value Estimate ============

/// Produce a reconciled value estimate from two approaches:
/// sales comparison (score-weighted closed comps) and income
/// (reconciled NOI / cap rate). The cost approach is not implemented;
/// it would require improvement cost data this pipeline does not carry.
pub fn reconcile_value(
    sale_comps: &[RankedComp<BreakupsRecord>],
    reconciled_noi: &ReconciledNoi,
    cap_rate_override: Option<f64>,
) -> ReconciledValueEstimate {
    let mut approaches: Vec<ValueApproach> = Vec::new();

    // Sales comparison approach.
    let closed_comps: Vec<&RankedComp<BreakupsRecord>> = sale_comps
        .iter()
        .filter(|c| {
            c.item.status() == crate::models::MlsStatus::Closed
                && c.item.sale_price > 0.0
                && !c.item.is_rental()
        })
        .collect();

    let mut comp_weighted_value = None;
    let mut primary_comp_median = None;

    if !closed_comps.is_empty() {
        let total_score: f64 = closed_comps
            .iter()
            .map(|c| c.comp_score.overall_score as f64)
            .sum();
        if total_score > 0.0 {
            comp_weighted_value = Some(round2(
                closed_comps
                    .iter()
                    .map(|c| c.item.sale_price * (c.comp_score.overall_score as f64 / total_score))
                    .sum(),
            ));
        }

        let primary_prices: Vec<f64> = closed_comps
            .iter()
            .filter(|c| c.comp_score.tier == CompTier::Primary)
            .map(|c| c.item.sale_price)
            .collect();
        primary_comp_median = crate::util::median_price(&primary_prices);

        let primary_count = primary_prices.len();
        let sales_confidence = grade_sales_confidence(closed_comps.len(), primary_count);
        approaches.push(ValueApproach {
            name: ApproachName::SalesComparison,
            value: comp_weighted_value,
            weight: match sales_confidence {
                ConfidenceGrade::High => 0.7,
                ConfidenceGrade::Medium => 0.6,
                _ => 0.4,
            },
            confidence: sales_confidence,
            comp_count: closed_comps.len(),
        });
    }

    // Income approach.
    let mut income_approach_value = None;
    let cap_rate = cap_rate_override
        .or(reconciled_noi.reconciled_cap_rate)
        .unwrap_or(DEFAULT_CAP_RATE);

    if reconciled_noi.reconciled_noi > 0.0 && cap_rate > 0.0 {
        income_approach_value = Some(round2(reconciled_noi.reconciled_noi / cap_rate));
        approaches.push(ValueApproach {
            name: ApproachName::Income,
            value: income_approach_value,
            weight: match reconciled_noi.confidence {
                ConfidenceGrade::High => 0.5,
                ConfidenceGrade::Medium => 0.3,
                _ => 0.2,
            },
            confidence: reconciled_noi.confidence,
            comp_count: 0,
        });
    }

    // Blend approaches, renormalizing weights over those that produced
    // a value.
    let mut reconciled_value = None;
    let mut range = None;
    let mut overall_confidence = ConfidenceGrade::Synthetic;

    let total_weight: f64 = approaches
        .iter()
        .filter(|a| a.value.is_some())
        .map(|a| a.weight)
        .sum();

    if total_weight > 0.0 {
        let blended: f64 = approaches
            .iter()
            .filter_map(|a| a.value.map(|v| v * (a.weight / total_weight)))
            .sum();
        let value = round2(blended);
        reconciled_value = Some(value);

        overall_confidence = approaches
            .iter()
            .filter(|a| a.value.is_some())
            .map(|a| a.confidence)
            .max_by_key(|c| c.rank())
            .unwrap_or(ConfidenceGrade::Synthetic);

        let range_multiplier = match overall_confidence {
            ConfidenceGrade::High => 0.10,
            ConfidenceGrade::Medium => 0.20,
            ConfidenceGrade::Low => 0.30,
            ConfidenceGrade::Synthetic => 0.40,
        };
        range = Some(ValueRange {
            low: round2(value * (1.0 - range_multiplier)),
            high: round2(value * (1.0 + range_multiplier)),
        });
    }

    ReconciledValueEstimate {
        comp_weighted_value,
        primary_comp_median,
        income_approach_value,
        reconciled_value,
        confidence: overall_confidence,
        range,
        approaches,
    }
}

// ============ Full Reconciliation Orchestrator ============

/// Run the full reconciliation pipeline for one subject property.
///
/// Takes the subject, the full candidate record set (sale + lease rows),
/// optional upstream comp scores, and the optional modeled NOI, and
/// produces the terminal [`ReconciliationResult`]. When no upstream
/// scores are supplied, sale comps are assumed at the documented default
/// score of 50 (supporting tier).
pub fn reconcile_analysis(
    subject: &BreakupsRecord,
    all_properties: &[BreakupsRecord],
    sale_comp_scores: Option<&[RankedComp<BreakupsRecord>]>,
    modeled_noi: Option<&ModeledNoi>,
) -> ReconciliationResult {
    let lease_comps: Vec<BreakupsRecord> = all_properties
        .iter()
        .filter(|p| p.is_rental())
        .cloned()
        .collect();
    let sale_comps: Vec<&BreakupsRecord> = all_properties
        .iter()
        .filter(|p| !p.is_rental() && p.status() == crate::models::MlsStatus::Closed)
        .collect();

    // Score lookup keyed by APN-else-address, shared by the rent stage.
    let score_map: Option<HashMap<String, ScoredComp>> = sale_comp_scores.map(|scored| {
        scored
            .iter()
            .map(|sc| (sc.item.comp_key().to_string(), sc.comp_score.clone()))
            .collect()
    });

    tracing::info!(
        "Reconciling subject '{}': {} candidates ({} lease, {} closed sale)",
        subject.full_address,
        all_properties.len(),
        lease_comps.len(),
        sale_comps.len()
    );

    // Step 1: market rent estimation.
    let market_rent =
        estimate_market_rent(subject, &lease_comps, score_map.as_ref(), modeled_noi);

    // Step 2: reconcile NOI.
    let subject_price = subject.effective_price();
    let reconciled_noi = reconcile_noi(&market_rent, modeled_noi, subject_price);

    // Step 3: reconcile value.
    let scored_sale_comps: Vec<RankedComp<BreakupsRecord>> = match sale_comp_scores {
        Some(scored) => scored.to_vec(),
        None => all_properties
            .iter()
            .filter(|p| {
                !p.is_rental()
                    && p.status() == crate::models::MlsStatus::Closed
                    && p.sale_price > 0.0
            })
            .map(|p| RankedComp {
                item: p.clone(),
                comp_score: default_scored_comp(),
            })
            .collect(),
    };

    let value_estimate = reconcile_value(&scored_sale_comps, &reconciled_noi, None);

    let mut comps_by_tier = TierCounts::default();
    for sc in &scored_sale_comps {
        comps_by_tier.bump(sc.comp_score.tier);
    }

    ReconciliationResult {
        diagnostics: ReconciliationDiagnostics {
            total_comps_scored: scored_sale_comps.len(),
            comps_by_tier,
            lease_comps_available: lease_comps
                .iter()
                .filter(|lc| lc.status() == crate::models::MlsStatus::Closed && lc.sale_price > 0.0)
                .count(),
            sale_comps_available: sale_comps.iter().filter(|sc| sc.sale_price > 0.0).count(),
            has_market_rent: market_rent.method != RentMethod::SyntheticMultiplier,
            has_modeled_noi: modeled_noi.is_some_and(|m| m.annual_noi > 0.0),
        },
        market_rent,
        reconciled_noi,
        value_estimate,
    }
}

/// Placeholder score applied when no upstream similarity scoring ran.
fn default_scored_comp() -> ScoredComp {
    ScoredComp {
        overall_score: DEFAULT_COMP_SCORE,
        tier: CompTier::Supporting,
        factors: SimilarityFactors::default(),
        factors_available: 0,
        factors_total: 6,
        explanation: "Default score - no upstream similarity scoring applied".to_string(),
    }
}

// ============ Confidence Grading ============

fn grade_lease_confidence(comp_count: usize, avg_score: u32) -> ConfidenceGrade {
    if comp_count >= HIGH_CONFIDENCE_LEASE_COMPS && avg_score >= HIGH_CONFIDENCE_MIN_SCORE {
        return ConfidenceGrade::High;
    }
    if comp_count >= 2 {
        return ConfidenceGrade::Medium;
    }
    if comp_count >= 1 {
        return ConfidenceGrade::Low;
    }
    ConfidenceGrade::Synthetic
}

fn grade_sales_confidence(comp_count: usize, primary_count: usize) -> ConfidenceGrade {
    if primary_count >= 3 {
        return ConfidenceGrade::High;
    }
    if primary_count >= 1 || comp_count >= 3 {
        return ConfidenceGrade::Medium;
    }
    if comp_count >= 1 {
        return ConfidenceGrade::Low;
    }
    ConfidenceGrade::Synthetic
}
