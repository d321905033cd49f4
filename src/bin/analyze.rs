//! Utility to run the full valuation pipeline on a JSON fixture and
//! print the reconciliation result.
//!
//! Fixture format:
//! `{ "subject": <breakups record>, "properties": [<breakups record>],
//!    "modeled_noi": <optional modeled NOI> }`

use comp_valuation::comp_scoring::rank_breakups_comps;
use comp_valuation::config::ScoringConfig;
use comp_valuation::models::{BreakupsRecord, ModeledNoi};
use comp_valuation::reconciliation::reconcile_analysis;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize)]
struct AnalysisFixture {
    subject: BreakupsRecord,
    properties: Vec<BreakupsRecord>,
    #[serde(default)]
    modeled_noi: Option<ModeledNoi>,
}

/// Main entry point for the analysis utility.
///
/// Loads the fixture, scores and ranks the candidate comps, runs the
/// reconciliation pipeline, and prints the result as JSON.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path = env::args()
        .nth(1)
        .ok_or("usage: analyze <fixture.json>")?;
    let raw = std::fs::read_to_string(&path)?;
    let fixture: AnalysisFixture = serde_json::from_str(&raw)?;

    let config = ScoringConfig::from_env()?;

    tracing::info!(
        "Scoring {} candidate comps against '{}'",
        fixture.properties.len(),
        fixture.subject.full_address
    );
    let ranked = rank_breakups_comps(&fixture.properties, &fixture.subject, &config);

    tracing::info!(
        "Ranked: {} primary, {} supporting, {} context (avg {})",
        ranked.tier_counts.primary,
        ranked.tier_counts.supporting,
        ranked.tier_counts.context,
        ranked.summary.avg_score
    );

    let result = reconcile_analysis(
        &fixture.subject,
        &fixture.properties,
        Some(ranked.ranked.as_slice()),
        fixture.modeled_noi.as_ref(),
    );

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
