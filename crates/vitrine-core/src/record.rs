//! Catalog Record
//!
//! The canonical representation of one inventory unit, as read from a feed
//! snapshot and persisted in the local store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::RemoteEntryId;

/// Status value marking a unit as sold.
pub const STATUS_SOLD: &str = "SOLD";

/// Status value marking a unit as available for sale.
pub const STATUS_AVAILABLE: &str = "AVAILABLE";

/// Decimal places a stored price keeps.
pub const PRICE_SCALE: u32 = 2;

/// Normalize a business key for identity comparisons.
///
/// Keys are compared after trimming surrounding whitespace; a key that is
/// empty after normalization is unusable for identity.
#[must_use]
pub fn normalize_key(key: &str) -> String {
    key.trim().to_string()
}

/// Publication state of a record in the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    /// Not yet (or not completely) published to the remote catalog.
    #[default]
    Pending,
    /// Published; the remote identifier is set.
    Published,
}

impl PublishStatus {
    /// Get the status as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Pending => "pending",
            PublishStatus::Published => "published",
        }
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PublishStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(PublishStatus::Pending),
            "published" => Ok(PublishStatus::Published),
            other => Err(CoreError::invalid_field(
                "publish_status",
                format!("unknown publish status '{other}'"),
            )),
        }
    }
}

/// One inventory unit.
///
/// `tag_number` is the stable business key. `price` is the single canonical
/// price used for change detection; the other price fields are carried for
/// downstream consumers and never trigger a remote mutation on their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Stable external identifier (business key, remote SKU).
    pub tag_number: String,

    pub description: Option<String>,
    pub designer: Option<String>,
    pub model: Option<String>,
    pub material: Option<String>,
    /// Dial or face colour.
    pub dial: Option<String>,
    pub diameter: Option<String>,
    pub condition: Option<String>,
    pub year: Option<String>,
    pub serial_number: Option<String>,
    pub reference_number: Option<String>,
    pub category: Option<String>,
    pub style: Option<String>,

    #[serde(default)]
    pub image_urls: Vec<String>,

    /// Canonical price.
    pub price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
    pub list_price: Option<Decimal>,

    /// Feed status (`AVAILABLE`, `SOLD`, ...).
    pub status: String,

    /// Remote catalog identifier, assigned once on first publish.
    pub remote_id: Option<RemoteEntryId>,

    #[serde(default)]
    pub publish_status: PublishStatus,

    pub last_synced_at: Option<DateTime<Utc>>,
}

impl CatalogRecord {
    /// Create an available record with only its business key set.
    #[must_use]
    pub fn new(tag_number: impl Into<String>) -> Self {
        Self {
            tag_number: tag_number.into(),
            description: None,
            designer: None,
            model: None,
            material: None,
            dial: None,
            diameter: None,
            condition: None,
            year: None,
            serial_number: None,
            reference_number: None,
            category: None,
            style: None,
            image_urls: Vec::new(),
            price: None,
            cost_price: None,
            wholesale_price: None,
            list_price: None,
            status: STATUS_AVAILABLE.to_string(),
            remote_id: None,
            publish_status: PublishStatus::Pending,
            last_synced_at: None,
        }
    }

    /// Set the feed status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Set the canonical price.
    #[must_use]
    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    /// The normalized business key.
    #[must_use]
    pub fn business_key(&self) -> &str {
        self.tag_number.trim()
    }

    /// Whether the record has been assigned a remote identifier.
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.remote_id.is_some()
    }

    /// Whether the record is sold (case-insensitive).
    #[must_use]
    pub fn is_sold(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case(STATUS_SOLD)
    }

    /// Validate the record for sync.
    pub fn validate(&self) -> Result<()> {
        if self.business_key().is_empty() {
            return Err(CoreError::BlankKey);
        }
        if self.status.trim().is_empty() {
            return Err(CoreError::invalid_field("status", "status is blank"));
        }
        for (field, price) in [
            ("price", self.price),
            ("cost_price", self.cost_price),
            ("wholesale_price", self.wholesale_price),
            ("list_price", self.list_price),
        ] {
            let Some(price) = price else { continue };
            if price.is_sign_negative() && !price.is_zero() {
                return Err(CoreError::invalid_field(field, "price must not be negative"));
            }
            // Prices must round-trip through the store unchanged.
            if price.normalize().scale() > PRICE_SCALE {
                return Err(CoreError::invalid_field(
                    field,
                    format!("price has more than {PRICE_SCALE} decimal places"),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_new_record_defaults() {
        let record = CatalogRecord::new("T-1");
        assert_eq!(record.status, STATUS_AVAILABLE);
        assert_eq!(record.publish_status, PublishStatus::Pending);
        assert!(!record.is_published());
        assert!(!record.is_sold());
    }

    #[test]
    fn test_business_key_is_trimmed() {
        let record = CatalogRecord::new("  T-2 \t");
        assert_eq!(record.business_key(), "T-2");
        assert_eq!(normalize_key(" T-2 "), "T-2");
    }

    #[test]
    fn test_sold_is_case_insensitive() {
        assert!(CatalogRecord::new("T-3").with_status("sold").is_sold());
        assert!(CatalogRecord::new("T-3").with_status(" Sold ").is_sold());
        assert!(!CatalogRecord::new("T-3").with_status("ON HOLD").is_sold());
    }

    #[test]
    fn test_validate_blank_key() {
        assert_eq!(CatalogRecord::new("").validate(), Err(CoreError::BlankKey));
        assert_eq!(CatalogRecord::new("  ").validate(), Err(CoreError::BlankKey));
    }

    #[test]
    fn test_validate_negative_price() {
        let record = CatalogRecord::new("T-4").with_price(Decimal::new(-100, 0));
        assert!(matches!(
            record.validate(),
            Err(CoreError::InvalidField { ref field, .. }) if field == "price"
        ));
    }

    #[test]
    fn test_validate_price_scale() {
        let record = CatalogRecord::new("T-6").with_price(Decimal::new(100_005, 3));
        assert!(matches!(
            record.validate(),
            Err(CoreError::InvalidField { ref field, .. }) if field == "price"
        ));

        let record = CatalogRecord::new("T-6").with_price(Decimal::new(100_500, 3));
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_validate_blank_status() {
        let record = CatalogRecord::new("T-5").with_status(" ");
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_publish_status_roundtrip() {
        assert_eq!("PUBLISHED".parse::<PublishStatus>(), Ok(PublishStatus::Published));
        assert_eq!(PublishStatus::Pending.to_string(), "pending");
        assert!("gone".parse::<PublishStatus>().is_err());
    }

    #[test]
    fn test_record_serde() {
        let record = CatalogRecord::new("T-6").with_price(Decimal::new(12500, 2));
        let json = serde_json::to_string(&record).unwrap();
        let back: CatalogRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
