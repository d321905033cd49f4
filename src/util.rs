/// Shared numeric helpers for the valuation pipeline.
///
/// Every ratio/score in the pipeline is rounded through these helpers so
/// that re-running the pipeline on identical inputs yields bit-identical
/// output.

/// Round to 2 decimal places (dollar amounts, distances in miles).
pub fn round2(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

/// Round to 4 decimal places (ratios and factor scores).
pub fn round4(n: f64) -> f64 {
    (n * 10_000.0).round() / 10_000.0
}

/// Earth radius in miles.
const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Haversine great-circle distance between two lat/lon points, in miles,
/// rounded to 2 decimal places.
pub fn haversine_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    round2(EARTH_RADIUS_MILES * c)
}

/// Median of integer scores. An even-length list yields the rounded mean
/// of the two middle values.
pub fn median_score(values: &[u32]) -> u32 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        ((sorted[mid - 1] + sorted[mid]) as f64 / 2.0).round() as u32
    } else {
        sorted[mid]
    }
}

/// Median of dollar values, rounded to 2 decimals for even-length lists.
pub fn median_price(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        round2((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        sorted[mid]
    })
}
