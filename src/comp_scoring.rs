/// Comp scoring: weighted similarity engine for comparable ranking.
///
/// Each comp is scored against a subject across 6 factors (0-1 each).
/// Factors are weighted and combined into a 0-100 overall score; weight
/// for unavailable factors is redistributed proportionally across the
/// factors that are available. Comps are then tiered as primary,
/// supporting, or context, and ranked deterministically: ties broken by
/// factor count, then by identifier.
///
/// Two record schemas feed the same engine through `CompDescriptor`
/// adapters; everything downstream of the adapters is schema-agnostic.
use crate::config::ScoringConfig;
use crate::models::{BreakupsRecord, MlsRecord, SubjectProperty};
use crate::util::{haversine_miles, median_score, round4};
use serde::{Deserialize, Serialize};

// ============ Types ============

/// Boolean feature bundle compared by the features factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompFeatures {
    pub pool: bool,
    pub garage_spaces: u32,
    pub hoa: bool,
}

/// Individual factor scores, each 0-1. `None` means "insufficient data
/// for this factor", never "worst possible match".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimilarityFactors {
    /// Proximity: 1.0 = same location, 0.0 = at or beyond max distance.
    pub distance: Option<f64>,
    /// Price similarity: 1.0 = identical, 0.0 = 100%+ deviation.
    pub price: Option<f64>,
    /// Square footage similarity: 1.0 = identical, 0.0 = 100%+ deviation.
    pub sqft: Option<f64>,
    /// Age similarity: 1.0 = same year built, 0.0 = max difference.
    pub age: Option<f64>,
    /// Bedroom/bathroom match: 1.0 exact, 0.7 off-by-one, 0.3 off-by-two.
    pub bed_bath: Option<f64>,
    /// Feature match rate over pool, garage, HOA.
    pub features: Option<f64>,
}

/// Comp tier based on overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompTier {
    Primary,
    Supporting,
    Context,
}

impl CompTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompTier::Primary => "primary",
            CompTier::Supporting => "supporting",
            CompTier::Context => "context",
        }
    }
}

/// Scored comparable with full explainability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredComp {
    /// Overall similarity score 0-100.
    pub overall_score: u32,
    pub tier: CompTier,
    /// Factor-level scores.
    pub factors: SimilarityFactors,
    /// How many factors had usable inputs.
    pub factors_available: usize,
    pub factors_total: usize,
    /// Human-readable explanation of the score.
    pub explanation: String,
}

// ============ Factor Scoring Functions ============

/// Distance score: linear decay from 1.0 (same location) to 0.0 at
/// `max_distance` miles. `None` when the distance is unavailable.
pub fn score_distance(distance_miles: Option<f64>, max_distance: f64) -> Option<f64> {
    let distance = distance_miles.filter(|d| d.is_finite())?;
    if distance <= 0.0 {
        return Some(1.0);
    }
    if distance >= max_distance {
        return Some(0.0);
    }
    Some(round4(1.0 - distance / max_distance))
}

/// Price similarity: 1.0 = identical, decays linearly to 0.0 at 100%
/// deviation from the subject price. `None` when either price is
/// unavailable or non-positive.
pub fn score_price_similarity(comp_price: Option<f64>, subject_price: Option<f64>) -> Option<f64> {
    let comp = comp_price.filter(|p| *p > 0.0)?;
    let subject = subject_price.filter(|p| *p > 0.0)?;
    let deviation = (comp - subject).abs() / subject;
    if deviation >= 1.0 {
        return Some(0.0);
    }
    Some(round4(1.0 - deviation))
}

/// Square footage similarity, same shape as price similarity.
pub fn score_sqft_similarity(comp_sqft: Option<f64>, subject_sqft: Option<f64>) -> Option<f64> {
    let comp = comp_sqft.filter(|s| *s > 0.0)?;
    let subject = subject_sqft.filter(|s| *s > 0.0)?;
    let deviation = (comp - subject).abs() / subject;
    if deviation >= 1.0 {
        return Some(0.0);
    }
    Some(round4(1.0 - deviation))
}

/// Age similarity: 1.0 = same year built, decays to 0.0 at
/// `max_age_diff` years apart. `None` when either year is missing.
pub fn score_age_similarity(
    comp_year: Option<i32>,
    subject_year: Option<i32>,
    max_age_diff: f64,
) -> Option<f64> {
    let comp = comp_year.filter(|y| *y > 0)?;
    let subject = subject_year.filter(|y| *y > 0)?;
    let diff = (comp - subject).abs() as f64;
    if diff >= max_age_diff {
        return Some(0.0);
    }
    Some(round4(1.0 - diff / max_age_diff))
}

/// Bedroom/bathroom match:
///   exact match on both = 1.0, off-by-one on either = 0.7,
///   off-by-two = 0.3, off-by-three or more = 0.0.
/// `None` when any of the four counts is unavailable.
pub fn score_bed_bath_match(
    comp_bed: Option<f64>,
    comp_bath: Option<f64>,
    subject_bed: Option<f64>,
    subject_bath: Option<f64>,
) -> Option<f64> {
    let bed_diff = (comp_bed? - subject_bed?).abs();
    let bath_diff = (comp_bath? - subject_bath?).abs();
    let max_diff = bed_diff.max(bath_diff).round() as i64;

    Some(match max_diff {
        0 => 1.0,
        1 => 0.7,
        2 => 0.3,
        _ => 0.0,
    })
}

/// Feature match: proportion of boolean features (pool, garage present,
/// HOA) matching the subject, over 3 checks.
pub fn score_feature_match(comp: &CompFeatures, subject: &CompFeatures) -> f64 {
    let mut matches = 0;
    if comp.pool == subject.pool {
        matches += 1;
    }
    if (comp.garage_spaces > 0) == (subject.garage_spaces > 0) {
        matches += 1;
    }
    if comp.hoa == subject.hoa {
        matches += 1;
    }
    round4(matches as f64 / 3.0)
}

// ============ Schema Adapters ============

/// Schema-agnostic view of a comp: the six factor inputs. The one place
/// where the two record schemas differ is how these are extracted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompDescriptor {
    pub distance_miles: Option<f64>,
    pub price: Option<f64>,
    pub sqft: Option<f64>,
    pub year_built: Option<i32>,
    pub bedrooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub features: Option<CompFeatures>,
}

/// Subject-side factor inputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectDescriptor {
    pub price: Option<f64>,
    pub sqft: Option<f64>,
    pub year_built: Option<i32>,
    pub bedrooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub features: Option<CompFeatures>,
}

impl From<&SubjectProperty> for SubjectDescriptor {
    fn from(subject: &SubjectProperty) -> Self {
        // Features participate only when the subject declares all three.
        let features = match (subject.pool, subject.garage_spaces, subject.hoa) {
            (Some(pool), Some(garage_spaces), Some(hoa)) => Some(CompFeatures {
                pool,
                garage_spaces,
                hoa,
            }),
            _ => None,
        };
        Self {
            price: subject.price,
            sqft: subject.square_feet,
            year_built: subject.year_built,
            bedrooms: subject.bedrooms,
            bathrooms: subject.bathrooms,
            features,
        }
    }
}

impl CompDescriptor {
    /// Extract factor inputs from an MLS record. Uses the feed's
    /// pre-computed distance field; comp price is sale price when
    /// closed, else list price.
    pub fn from_mls(record: &MlsRecord) -> Self {
        let features = match (record.pool, record.garage_spaces, record.hoa) {
            (Some(pool), Some(garage_spaces), Some(hoa)) => Some(CompFeatures {
                pool,
                garage_spaces,
                hoa,
            }),
            _ => None,
        };
        Self {
            distance_miles: record.distance,
            price: record.sale_price.or(record.list_price),
            sqft: record.square_feet,
            year_built: record.year_built,
            bedrooms: record.bedrooms,
            bathrooms: record.bathrooms,
            features,
        }
    }

    /// Extract factor inputs from a breakups record, deriving distance
    /// via great-circle math from the subject row's coordinates. The
    /// breakups sheet carries no pool/garage/HOA booleans, so the
    /// features factor is never available in this schema.
    pub fn from_breakups(comp: &BreakupsRecord, subject: &BreakupsRecord) -> Self {
        let distance_miles = match (comp.lat, comp.lon, subject.lat, subject.lon) {
            (Some(lat), Some(lon), Some(subj_lat), Some(subj_lon))
                if [lat, lon, subj_lat, subj_lon].iter().all(|v| v.is_finite()) =>
            {
                Some(haversine_miles(subj_lat, subj_lon, lat, lon))
            }
            _ => None,
        };
        Self {
            distance_miles,
            price: (comp.sale_price > 0.0).then_some(comp.sale_price),
            sqft: (comp.sqft > 0.0).then_some(comp.sqft),
            year_built: (comp.year_built > 0.0).then_some(comp.year_built as i32),
            // Zero-means-missing in the breakups sheet.
            bedrooms: (comp.br > 0.0).then_some(comp.br),
            bathrooms: (comp.ba > 0.0).then_some(comp.ba),
            features: None,
        }
    }
}

// ============ Core Combination ============

/// Score a comp descriptor against a subject descriptor.
///
/// Factors with `None` scores are excluded; their weight is
/// redistributed proportionally to the available factors. With no
/// factors available the overall score is 0 (and the tier is context).
pub fn score_descriptor(
    comp: &CompDescriptor,
    subject: &SubjectDescriptor,
    config: &ScoringConfig,
) -> ScoredComp {
    let factors = SimilarityFactors {
        distance: score_distance(comp.distance_miles, config.max_distance_miles),
        price: score_price_similarity(comp.price, subject.price),
        sqft: score_sqft_similarity(comp.sqft, subject.sqft),
        age: score_age_similarity(comp.year_built, subject.year_built, config.max_age_diff_years),
        bed_bath: score_bed_bath_match(
            comp.bedrooms,
            comp.bathrooms,
            subject.bedrooms,
            subject.bathrooms,
        ),
        features: match (&comp.features, &subject.features) {
            (Some(comp_features), Some(subject_features)) => {
                Some(score_feature_match(comp_features, subject_features))
            }
            _ => None,
        },
    };

    build_scored_comp(factors, config)
}

/// Factor label order used for weighting, coverage, and explanations.
fn factor_entries(
    factors: &SimilarityFactors,
    config: &ScoringConfig,
) -> [(&'static str, Option<f64>, f64); 6] {
    let w = &config.weights;
    [
        ("distance", factors.distance, w.distance),
        ("price", factors.price, w.price),
        ("sqft", factors.sqft, w.sqft),
        ("age", factors.age, w.age),
        ("bed/bath", factors.bed_bath, w.bed_bath),
        ("features", factors.features, w.features),
    ]
}

fn build_scored_comp(factors: SimilarityFactors, config: &ScoringConfig) -> ScoredComp {
    let entries = factor_entries(&factors, config);

    let available: Vec<(f64, f64)> = entries
        .iter()
        .filter_map(|(_, score, weight)| score.map(|s| (s, *weight)))
        .collect();
    let total_available_weight: f64 = available.iter().map(|(_, w)| w).sum();

    let mut overall_score = 0u32;
    if total_available_weight > 0.0 {
        let weighted_sum: f64 = available
            .iter()
            .map(|(score, weight)| score * (weight / total_available_weight))
            .sum();
        overall_score = (weighted_sum * 100.0).round().clamp(0.0, 100.0) as u32;
    }

    let tier = classify_tier(overall_score, config);
    let explanation = build_explanation(&entries, overall_score, tier, available.len());

    ScoredComp {
        overall_score,
        tier,
        factors,
        factors_available: available.len(),
        factors_total: entries.len(),
        explanation,
    }
}

/// Classify a score into a tier.
fn classify_tier(score: u32, config: &ScoringConfig) -> CompTier {
    if score >= config.primary_threshold {
        CompTier::Primary
    } else if score >= config.supporting_threshold {
        CompTier::Supporting
    } else {
        CompTier::Context
    }
}

/// Build a human-readable explanation of the score.
fn build_explanation(
    entries: &[(&'static str, Option<f64>, f64)],
    overall_score: u32,
    tier: CompTier,
    available: usize,
) -> String {
    let parts: Vec<String> = entries
        .iter()
        .filter_map(|(name, score, _)| {
            score.map(|s| format!("{}: {}%", name, (s * 100.0).round() as i64))
        })
        .collect();

    let factor_str = if parts.is_empty() {
        "no factors available".to_string()
    } else {
        parts.join(", ")
    };

    format!(
        "Score {}/100 ({}) - {}/{} factors: {}",
        overall_score,
        tier.as_str(),
        available,
        entries.len(),
        factor_str
    )
}

// ============ Batch Ranking ============

/// One entry in a ranked batch: the original item plus its score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedComp<T> {
    pub item: T,
    pub comp_score: ScoredComp,
}

/// Count of comps per tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub primary: usize,
    pub supporting: usize,
    pub context: usize,
}

impl TierCounts {
    pub fn bump(&mut self, tier: CompTier) {
        match tier {
            CompTier::Primary => self.primary += 1,
            CompTier::Supporting => self.supporting += 1,
            CompTier::Context => self.context += 1,
        }
    }
}

/// How many comps had each factor available.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorCoverage {
    pub distance: usize,
    pub price: usize,
    pub sqft: usize,
    pub age: usize,
    pub bed_bath: usize,
    pub features: usize,
}

/// Summary statistics for a ranked batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankSummary {
    pub avg_score: u32,
    pub median_score: u32,
    pub total_scored: usize,
    pub factor_coverage: FactorCoverage,
}

/// Result of ranking a batch of comps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedComps<T> {
    /// Comps sorted by overall score descending (deterministic).
    pub ranked: Vec<RankedComp<T>>,
    pub tier_counts: TierCounts,
    pub summary: RankSummary,
}

/// Sort scored items deterministically and build the ranked result.
/// Order: score descending, then factors available descending, then the
/// caller-supplied identifier ascending.
pub fn build_ranked_result<T>(
    mut scored: Vec<RankedComp<T>>,
    get_id: impl Fn(&T) -> &str,
) -> RankedComps<T> {
    scored.sort_by(|a, b| {
        b.comp_score
            .overall_score
            .cmp(&a.comp_score.overall_score)
            .then_with(|| b.comp_score.factors_available.cmp(&a.comp_score.factors_available))
            .then_with(|| get_id(&a.item).cmp(get_id(&b.item)))
    });

    let mut tier_counts = TierCounts::default();
    let mut factor_coverage = FactorCoverage::default();
    let mut scores: Vec<u32> = Vec::with_capacity(scored.len());

    for entry in &scored {
        tier_counts.bump(entry.comp_score.tier);
        scores.push(entry.comp_score.overall_score);

        let f = &entry.comp_score.factors;
        if f.distance.is_some() {
            factor_coverage.distance += 1;
        }
        if f.price.is_some() {
            factor_coverage.price += 1;
        }
        if f.sqft.is_some() {
            factor_coverage.sqft += 1;
        }
        if f.age.is_some() {
            factor_coverage.age += 1;
        }
        if f.bed_bath.is_some() {
            factor_coverage.bed_bath += 1;
        }
        if f.features.is_some() {
            factor_coverage.features += 1;
        }
    }

    let avg_score = if scores.is_empty() {
        0
    } else {
        (scores.iter().map(|s| *s as u64).sum::<u64>() as f64 / scores.len() as f64).round()
            as u32
    };

    RankedComps {
        tier_counts,
        summary: RankSummary {
            avg_score,
            median_score: median_score(&scores),
            total_scored: scored.len(),
            factor_coverage,
        },
        ranked: scored,
    }
}

// ============ Entry Points ============

/// Score a single MLS comp against a subject.
pub fn score_mls_comp(
    comp: &MlsRecord,
    subject: &SubjectProperty,
    config: &ScoringConfig,
) -> ScoredComp {
    score_descriptor(
        &CompDescriptor::from_mls(comp),
        &SubjectDescriptor::from(subject),
        config,
    )
}

/// Score and rank a batch of MLS comps against a subject.
pub fn rank_mls_comps(
    comps: &[MlsRecord],
    subject: &SubjectProperty,
    config: &ScoringConfig,
) -> RankedComps<MlsRecord> {
    let subject_descriptor = SubjectDescriptor::from(subject);
    let scored: Vec<RankedComp<MlsRecord>> = comps
        .iter()
        .map(|comp| RankedComp {
            comp_score: score_descriptor(
                &CompDescriptor::from_mls(comp),
                &subject_descriptor,
                config,
            ),
            item: comp.clone(),
        })
        .collect();

    let result = build_ranked_result(scored, |item| item.ranking_id());
    tracing::debug!(
        "Ranked {} MLS comps: {} primary, {} supporting, {} context",
        result.summary.total_scored,
        result.tier_counts.primary,
        result.tier_counts.supporting,
        result.tier_counts.context
    );
    result
}

/// Score a single breakups comp against a subject row.
pub fn score_breakups_comp(
    comp: &BreakupsRecord,
    subject: &BreakupsRecord,
    config: &ScoringConfig,
) -> ScoredComp {
    let subject_descriptor = SubjectDescriptor {
        price: (subject.effective_price() > 0.0).then(|| subject.effective_price()),
        sqft: (subject.sqft > 0.0).then_some(subject.sqft),
        year_built: (subject.year_built > 0.0).then_some(subject.year_built as i32),
        bedrooms: (subject.br > 0.0).then_some(subject.br),
        bathrooms: (subject.ba > 0.0).then_some(subject.ba),
        features: None,
    };
    score_descriptor(
        &CompDescriptor::from_breakups(comp, subject),
        &subject_descriptor,
        config,
    )
}

/// Score and rank a batch of breakups comps against a subject row.
pub fn rank_breakups_comps(
    comps: &[BreakupsRecord],
    subject: &BreakupsRecord,
    config: &ScoringConfig,
) -> RankedComps<BreakupsRecord> {
    let scored: Vec<RankedComp<BreakupsRecord>> = comps
        .iter()
        .map(|comp| RankedComp {
            comp_score: score_breakups_comp(comp, subject, config),
            item: comp.clone(),
        })
        .collect();

    build_ranked_result(scored, |item| item.comp_key())
}
