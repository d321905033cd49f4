/// Unit tests for the comp scoring engine: factor functions, weighted
/// combination with redistribution, tiering, and deterministic ranking.
use comp_valuation::comp_scoring::{
    rank_breakups_comps, rank_mls_comps, score_age_similarity, score_bed_bath_match,
    score_breakups_comp, score_descriptor, score_distance, score_feature_match, score_mls_comp,
    score_price_similarity, score_sqft_similarity, CompDescriptor, CompFeatures, CompTier,
    SubjectDescriptor,
};
use comp_valuation::config::ScoringConfig;
use comp_valuation::models::{BreakupsRecord, MlsRecord, SubjectProperty};
use serde_json::json;

fn mls(fields: serde_json::Value) -> MlsRecord {
    let mut base = json!({ "status": "C" });
    let base_obj = base.as_object_mut().unwrap();
    for (k, v) in fields.as_object().unwrap() {
        base_obj.insert(k.clone(), v.clone());
    }
    serde_json::from_value(base).unwrap()
}

fn breakups(fields: serde_json::Value) -> BreakupsRecord {
    serde_json::from_value(fields).unwrap()
}

fn subject() -> SubjectProperty {
    serde_json::from_value(json!({
        "price": 400000.0,
        "square_feet": 2000.0,
        "year_built": 2000,
        "bedrooms": 4.0,
        "bathrooms": 3.0,
        "pool": true,
        "garage_spaces": 2,
        "hoa": false
    }))
    .unwrap()
}

#[cfg(test)]
mod factor_tests {
    use super::*;

    #[test]
    fn test_distance_endpoints() {
        assert_eq!(score_distance(Some(0.0), 3.0), Some(1.0));
        assert_eq!(score_distance(Some(3.0), 3.0), Some(0.0));
        assert_eq!(score_distance(Some(1.5), 3.0), Some(0.5));
        assert_eq!(score_distance(Some(5.0), 3.0), Some(0.0));
    }

    #[test]
    fn test_distance_unavailable() {
        assert_eq!(score_distance(None, 3.0), None);
        assert_eq!(score_distance(Some(f64::NAN), 3.0), None);
        assert_eq!(score_distance(Some(f64::INFINITY), 3.0), None);
    }

    #[test]
    fn test_price_similarity() {
        assert_eq!(score_price_similarity(Some(400000.0), Some(400000.0)), Some(1.0));
        assert_eq!(score_price_similarity(Some(800000.0), Some(400000.0)), Some(0.0));
        assert_eq!(score_price_similarity(Some(380000.0), Some(400000.0)), Some(0.95));
        // Deviation beyond 100% clamps to zero.
        assert_eq!(score_price_similarity(Some(900000.0), Some(400000.0)), Some(0.0));
    }

    #[test]
    fn test_price_similarity_unavailable() {
        assert_eq!(score_price_similarity(None, Some(400000.0)), None);
        assert_eq!(score_price_similarity(Some(400000.0), None), None);
        assert_eq!(score_price_similarity(Some(0.0), Some(400000.0)), None);
        assert_eq!(score_price_similarity(Some(-1.0), Some(400000.0)), None);
    }

    #[test]
    fn test_sqft_similarity() {
        assert_eq!(score_sqft_similarity(Some(2000.0), Some(2000.0)), Some(1.0));
        assert_eq!(score_sqft_similarity(Some(1900.0), Some(2000.0)), Some(0.95));
        assert_eq!(score_sqft_similarity(Some(0.0), Some(2000.0)), None);
    }

    #[test]
    fn test_age_similarity() {
        assert_eq!(score_age_similarity(Some(2000), Some(2000), 30.0), Some(1.0));
        assert_eq!(score_age_similarity(Some(2015), Some(2000), 30.0), Some(0.5));
        assert_eq!(score_age_similarity(Some(1970), Some(2000), 30.0), Some(0.0));
        assert_eq!(score_age_similarity(None, Some(2000), 30.0), None);
        assert_eq!(score_age_similarity(Some(0), Some(2000), 30.0), None);
    }

    #[test]
    fn test_bed_bath_match_ladder() {
        let s = |cb, cba| score_bed_bath_match(Some(cb), Some(cba), Some(4.0), Some(3.0));
        assert_eq!(s(4.0, 3.0), Some(1.0));
        assert_eq!(s(5.0, 3.0), Some(0.7));
        assert_eq!(s(4.0, 1.0), Some(0.3));
        assert_eq!(s(1.0, 3.0), Some(0.0));
    }

    #[test]
    fn test_bed_bath_match_unavailable() {
        assert_eq!(
            score_bed_bath_match(None, Some(2.0), Some(3.0), Some(2.0)),
            None
        );
        assert_eq!(
            score_bed_bath_match(Some(3.0), Some(2.0), Some(3.0), None),
            None
        );
    }

    #[test]
    fn test_feature_match_fractions() {
        let subject = CompFeatures { pool: true, garage_spaces: 2, hoa: false };
        assert_eq!(
            score_feature_match(&CompFeatures { pool: true, garage_spaces: 3, hoa: false }, &subject),
            1.0
        );
        assert_eq!(
            score_feature_match(&CompFeatures { pool: true, garage_spaces: 0, hoa: false }, &subject),
            0.6667
        );
        assert_eq!(
            score_feature_match(&CompFeatures { pool: false, garage_spaces: 0, hoa: true }, &subject),
            0.0
        );
    }
}

#[cfg(test)]
mod combination_tests {
    use super::*;

    #[test]
    fn test_full_factor_combination() {
        let comp = mls(json!({
            "distance": 1.0,
            "sale_price": 380000.0,
            "square_feet": 1900.0,
            "year_built": 2005,
            "bedrooms": 4.0,
            "bathrooms": 3.0,
            "pool": true,
            "garage_spaces": 2,
            "hoa": true
        }));
        let scored = score_mls_comp(&comp, &subject(), &ScoringConfig::default());

        assert_eq!(scored.factors_available, 6);
        assert_eq!(scored.factors_total, 6);
        // distance 0.6667, price 0.95, sqft 0.95, age 0.8333,
        // bed/bath 1.0, features 0.6667 under default weights.
        assert_eq!(scored.overall_score, 84);
        assert_eq!(scored.tier, CompTier::Primary);
        assert!(scored.explanation.contains("6/6 factors"));
        assert!(scored.explanation.contains("primary"));
    }

    #[test]
    fn test_all_null_scores_zero_context() {
        let scored = score_descriptor(
            &CompDescriptor::default(),
            &SubjectDescriptor::default(),
            &ScoringConfig::default(),
        );
        assert_eq!(scored.overall_score, 0);
        assert_eq!(scored.tier, CompTier::Context);
        assert_eq!(scored.factors_available, 0);
        assert!(scored.explanation.contains("no factors available"));
    }

    #[test]
    fn test_weight_redistribution_single_factor() {
        // Only price available: its weight becomes 1.0, so the overall
        // score is the price score alone.
        let comp = CompDescriptor {
            price: Some(380000.0),
            ..CompDescriptor::default()
        };
        let subj = SubjectDescriptor {
            price: Some(400000.0),
            ..SubjectDescriptor::default()
        };
        let scored = score_descriptor(&comp, &subj, &ScoringConfig::default());
        assert_eq!(scored.overall_score, 95);
        assert_eq!(scored.factors_available, 1);
    }

    #[test]
    fn test_tier_thresholds() {
        let config = ScoringConfig::default();
        // A lone price factor maps straight through to the overall score.
        let subj = SubjectDescriptor {
            price: Some(100.0),
            ..SubjectDescriptor::default()
        };
        let at = |comp_price: f64| {
            let comp = CompDescriptor {
                price: Some(comp_price),
                ..CompDescriptor::default()
            };
            score_descriptor(&comp, &subj, &config)
        };

        assert_eq!(at(100.0).tier, CompTier::Primary); // 100
        assert_eq!(at(130.0).tier, CompTier::Primary); // 70
        assert_eq!(at(131.0).tier, CompTier::Supporting); // 69
        assert_eq!(at(160.0).tier, CompTier::Supporting); // 40
        assert_eq!(at(161.0).tier, CompTier::Context); // 39
    }
}

#[cfg(test)]
mod ranking_tests {
    use super::*;

    #[test]
    fn test_rank_orders_by_score_desc() {
        let comps = vec![
            mls(json!({ "mls_number": "far", "sale_price": 700000.0 })),
            mls(json!({ "mls_number": "near", "sale_price": 400000.0 })),
        ];
        let ranked = rank_mls_comps(&comps, &subject(), &ScoringConfig::default());
        assert_eq!(ranked.ranked[0].item.mls_number.as_deref(), Some("near"));
        assert_eq!(ranked.summary.total_scored, 2);
    }

    #[test]
    fn test_equal_scores_tiebreak_on_factor_count() {
        // Both comps score 100, but one corroborates with two factors.
        let comps = vec![
            mls(json!({ "mls_number": "one-factor", "sale_price": 400000.0 })),
            mls(json!({
                "mls_number": "two-factor",
                "sale_price": 400000.0,
                "square_feet": 2000.0
            })),
        ];
        let ranked = rank_mls_comps(&comps, &subject(), &ScoringConfig::default());
        assert_eq!(
            ranked.ranked[0].item.mls_number.as_deref(),
            Some("two-factor")
        );
    }

    #[test]
    fn test_full_tie_breaks_lexicographically() {
        let comps = vec![
            mls(json!({ "mls_number": "B200", "sale_price": 400000.0 })),
            mls(json!({ "mls_number": "A100", "sale_price": 400000.0 })),
        ];
        let ranked = rank_mls_comps(&comps, &subject(), &ScoringConfig::default());
        assert_eq!(ranked.ranked[0].item.mls_number.as_deref(), Some("A100"));
        assert_eq!(ranked.ranked[1].item.mls_number.as_deref(), Some("B200"));
    }

    #[test]
    fn test_tier_counts_and_coverage() {
        let comps = vec![
            mls(json!({ "mls_number": "1", "sale_price": 400000.0, "square_feet": 2000.0 })),
            mls(json!({ "mls_number": "2", "sale_price": 560000.0 })),
            mls(json!({ "mls_number": "3" })),
        ];
        let ranked = rank_mls_comps(&comps, &subject(), &ScoringConfig::default());
        assert_eq!(ranked.tier_counts.primary, 1);
        assert_eq!(ranked.tier_counts.supporting, 1);
        assert_eq!(ranked.tier_counts.context, 1);
        assert_eq!(ranked.summary.factor_coverage.price, 2);
        assert_eq!(ranked.summary.factor_coverage.sqft, 1);
        assert_eq!(ranked.summary.factor_coverage.distance, 0);
    }

    #[test]
    fn test_summary_median_even_length() {
        let comps = vec![
            mls(json!({ "mls_number": "1", "sale_price": 400000.0 })), // 100
            mls(json!({ "mls_number": "2", "sale_price": 560000.0 })), // 60
        ];
        let ranked = rank_mls_comps(&comps, &subject(), &ScoringConfig::default());
        assert_eq!(ranked.summary.avg_score, 80);
        assert_eq!(ranked.summary.median_score, 80);
    }
}

#[cfg(test)]
mod adapter_tests {
    use super::*;

    #[test]
    fn test_mls_adapter_prefers_sale_price() {
        let comp = CompDescriptor::from_mls(&mls(json!({
            "sale_price": 380000.0, "list_price": 999999.0
        })));
        assert_eq!(comp.price, Some(380000.0));

        let comp = CompDescriptor::from_mls(&mls(json!({ "list_price": 410000.0 })));
        assert_eq!(comp.price, Some(410000.0));
    }

    #[test]
    fn test_mls_adapter_features_require_all_three() {
        let comp = CompDescriptor::from_mls(&mls(json!({ "pool": true, "garage_spaces": 2 })));
        assert_eq!(comp.features, None);

        let comp = CompDescriptor::from_mls(&mls(json!({
            "pool": true, "garage_spaces": 2, "hoa": false
        })));
        assert!(comp.features.is_some());
    }

    #[test]
    fn test_breakups_adapter_derives_distance_from_coordinates() {
        let subject_row = breakups(json!({
            "FULL_ADDRESS": "subject", "STATUS": "A",
            "LAT": 33.4484, "LON": -112.0740,
            "SALE_PRICE": 400000.0, "SQFT": 2000.0
        }));
        let comp_row = breakups(json!({
            "FULL_ADDRESS": "comp", "STATUS": "C",
            "LAT": 33.4484, "LON": -112.0740,
            "SALE_PRICE": 390000.0, "SQFT": 1900.0
        }));

        let descriptor = CompDescriptor::from_breakups(&comp_row, &subject_row);
        assert_eq!(descriptor.distance_miles, Some(0.0));
        // Breakups rows carry no boolean features.
        assert_eq!(descriptor.features, None);

        let scored = score_breakups_comp(&comp_row, &subject_row, &ScoringConfig::default());
        assert!(scored.factors.distance == Some(1.0));
        assert!(scored.factors.features.is_none());
    }

    #[test]
    fn test_breakups_adapter_zero_means_missing() {
        let row = breakups(json!({
            "FULL_ADDRESS": "comp", "STATUS": "C",
            "SALE_PRICE": 0.0, "SQFT": 0.0, "BR": 0.0, "BA": 0.0, "YEAR_BUILT": 0.0
        }));
        let subject_row = breakups(json!({ "FULL_ADDRESS": "subject", "STATUS": "A" }));
        let descriptor = CompDescriptor::from_breakups(&row, &subject_row);
        assert_eq!(descriptor.price, None);
        assert_eq!(descriptor.sqft, None);
        assert_eq!(descriptor.bedrooms, None);
        assert_eq!(descriptor.bathrooms, None);
        assert_eq!(descriptor.year_built, None);
    }

    #[test]
    fn test_rank_breakups_uses_apn_else_address() {
        let subject_row = breakups(json!({
            "FULL_ADDRESS": "subject", "STATUS": "A", "SALE_PRICE": 400000.0
        }));
        let comps = vec![
            breakups(json!({ "FULL_ADDRESS": "z street", "APN": "",
                             "STATUS": "C", "SALE_PRICE": 400000.0 })),
            breakups(json!({ "FULL_ADDRESS": "a street", "APN": "",
                             "STATUS": "C", "SALE_PRICE": 400000.0 })),
        ];
        let ranked = rank_breakups_comps(&comps, &subject_row, &ScoringConfig::default());
        assert_eq!(ranked.ranked[0].item.full_address, "a street");
    }
}
