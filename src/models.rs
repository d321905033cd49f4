use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============ Status Codes ============

/// MLS status codes as reported by the listing service.
///
/// Serialized as the single-letter wire code; anything unrecognized
/// deserializes to `Unknown` rather than failing the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MlsStatus {
    /// Active listing.
    #[serde(rename = "A")]
    Active,
    /// Closed / sold.
    #[serde(rename = "C")]
    Closed,
    /// Pending sale.
    #[serde(rename = "P")]
    Pending,
    /// Under contract (accepting backups).
    #[serde(rename = "U")]
    UnderContract,
    /// Cancelled listing.
    #[serde(rename = "X")]
    Cancelled,
    /// Temporarily off market.
    #[serde(rename = "T")]
    TempOff,
    /// Withdrawn listing.
    #[serde(rename = "W")]
    Withdrawn,
    /// Any code this pipeline does not recognize.
    #[serde(other)]
    Unknown,
}

impl MlsStatus {
    /// Parse a raw status code. Unrecognized codes map to `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "A" => MlsStatus::Active,
            "C" => MlsStatus::Closed,
            "P" => MlsStatus::Pending,
            "U" => MlsStatus::UnderContract,
            "X" => MlsStatus::Cancelled,
            "T" => MlsStatus::TempOff,
            "W" => MlsStatus::Withdrawn,
            _ => MlsStatus::Unknown,
        }
    }

    /// Human-readable status label.
    pub fn display(&self) -> &'static str {
        match self {
            MlsStatus::Active => "Active",
            MlsStatus::Closed => "Sold",
            MlsStatus::Pending => "Pending",
            MlsStatus::UnderContract => "Under Contract",
            MlsStatus::Cancelled => "Cancelled",
            MlsStatus::TempOff => "Temp Off",
            MlsStatus::Withdrawn => "Withdrawn",
            MlsStatus::Unknown => "Unknown",
        }
    }
}

// ============ MLS Schema ============

/// A single comparable property in the MLS schema, as produced by the
/// external CSV/Excel ingestion layer.
///
/// Treated as a read-only value object throughout the pipeline: stages
/// copy-with-additions, never mutate. Fields the feed can omit are
/// `Option`; `None` always means "no data", never "worst case".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlsRecord {
    // Core identification
    /// MLS listing number. Primary deduplication key when present.
    #[serde(default)]
    pub mls_number: Option<String>,
    /// Assessor Parcel Number.
    #[serde(default)]
    pub apn: Option<String>,

    // Address fields
    /// Full concatenated street address.
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,

    // Pricing
    /// Final sale price; `None` until the listing closes.
    #[serde(default)]
    pub sale_price: Option<f64>,
    #[serde(default)]
    pub list_price: Option<f64>,
    /// Feed-supplied price per square foot (re-derived in computed metrics).
    #[serde(default)]
    pub price_per_sqft: Option<f64>,

    // Dates
    #[serde(default)]
    pub sale_date: Option<NaiveDate>,
    #[serde(default)]
    pub list_date: Option<NaiveDate>,
    #[serde(default)]
    pub under_contract_date: Option<NaiveDate>,

    // Property characteristics
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub bedrooms: Option<f64>,
    /// Total bathrooms; half baths count as 0.5.
    #[serde(default)]
    pub bathrooms: Option<f64>,
    #[serde(default)]
    pub square_feet: Option<f64>,
    #[serde(default)]
    pub lot_size: Option<f64>,
    #[serde(default)]
    pub year_built: Option<i32>,
    #[serde(default)]
    pub stories: Option<u32>,

    // Features
    #[serde(default)]
    pub garage_spaces: Option<u32>,
    #[serde(default)]
    pub pool: Option<bool>,
    #[serde(default)]
    pub hoa: Option<bool>,
    #[serde(default)]
    pub hoa_fee: Option<f64>,

    // Market data
    #[serde(default)]
    pub days_on_market: Option<u32>,
    pub status: MlsStatus,

    // Location
    /// Distance from the subject in miles, when the feed pre-computes it.
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub subdivision: Option<String>,

    // Additional fields
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub listing_terms: Option<String>,
    #[serde(default)]
    pub listing_agent: Option<String>,
    #[serde(default)]
    pub listing_agency: Option<String>,

    // Distress flags
    #[serde(default)]
    pub is_foreclosure: bool,
    #[serde(default)]
    pub is_reo: bool,
    #[serde(default)]
    pub is_short_sale: bool,
}

impl MlsRecord {
    /// Identifier used for deterministic ranking tie-breaks: MLS number
    /// when present, else the address, else empty.
    pub fn ranking_id(&self) -> &str {
        self.mls_number
            .as_deref()
            .or(self.address.as_deref())
            .unwrap_or("")
    }
}

// ============ Breakups Schema ============

/// A single property row in the breakups schema.
///
/// The upstream sheet uses SCREAMING_SNAKE column names and a
/// zero-means-missing convention for numerics; both are preserved here
/// and converted to `Option` semantics at the scoring adapter boundary.
/// `SALE_PRICE` is polymorphic: for rental rows (`IS_RENTAL` = "Y") it
/// carries the recorded monthly rent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct BreakupsRecord {
    #[serde(default)]
    pub full_address: String,
    #[serde(default)]
    pub apn: String,
    /// Raw status code; see [`BreakupsRecord::status`].
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub og_list_date: Option<NaiveDate>,
    #[serde(default)]
    pub og_list_price: f64,
    #[serde(default)]
    pub sale_date: Option<NaiveDate>,
    #[serde(default)]
    pub sale_price: f64,
    #[serde(default)]
    pub seller_basis: f64,
    #[serde(default)]
    pub seller_basis_date: Option<NaiveDate>,
    #[serde(default)]
    pub br: f64,
    #[serde(default)]
    pub ba: f64,
    #[serde(default)]
    pub sqft: f64,
    #[serde(default)]
    pub lot_size: f64,
    /// "Y" marks lease rows.
    #[serde(default)]
    pub is_rental: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub year_built: f64,
    #[serde(default)]
    pub days_on_market: f64,
    #[serde(default)]
    pub dwelling_type: String,
    #[serde(default)]
    pub subdivision_name: String,
}

impl BreakupsRecord {
    /// Parsed status code.
    pub fn status(&self) -> MlsStatus {
        MlsStatus::from_code(&self.status)
    }

    /// Whether this row is a lease record.
    pub fn is_rental(&self) -> bool {
        self.is_rental.trim().eq_ignore_ascii_case("y")
    }

    /// Sale price if recorded, else original list price. Zero when both
    /// are missing.
    pub fn effective_price(&self) -> f64 {
        if self.sale_price > 0.0 {
            self.sale_price
        } else {
            self.og_list_price
        }
    }

    /// Identifier used for score lookups and ranking tie-breaks:
    /// APN when present, else the full address.
    pub fn comp_key(&self) -> &str {
        if self.apn.trim().is_empty() {
            &self.full_address
        } else {
            &self.apn
        }
    }
}

// ============ Subject Property ============

/// The property being valued. All fields optional: each missing field
/// disables the similarity factors that need it rather than failing the
/// batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubjectProperty {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Contract or estimated price used for price-similarity scoring.
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub square_feet: Option<f64>,
    #[serde(default)]
    pub year_built: Option<i32>,
    #[serde(default)]
    pub bedrooms: Option<f64>,
    #[serde(default)]
    pub bathrooms: Option<f64>,
    #[serde(default)]
    pub pool: Option<bool>,
    #[serde(default)]
    pub garage_spaces: Option<u32>,
    #[serde(default)]
    pub hoa: Option<bool>,
}

// ============ Modeled NOI Input ============

/// Pre-existing modeled NOI produced by the upstream valuation-multiplier
/// module. Consumed as-is; this core never derives one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeledNoi {
    pub monthly_rent: f64,
    pub annual_income: f64,
    pub operating_expenses: f64,
    pub annual_noi: f64,
    pub cap_rate: f64,
}
