//! Configuration for the list screens.
//!
//! [`ApiConfig`] describes the backend, [`Endpoint`] one list endpoint and
//! [`ListConfig`] the timing knobs of one list controller.

use crate::error::ConfigError;
use crate::filters::FilterField;
use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default quiet period for search input.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Default minimum spacing between two fetches.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

/// Default request time budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Backend location and display settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// API root, e.g. `https://shop.example.com`.
    pub base_url: String,
    /// Root for product images and other assets.
    pub asset_base_url: Option<String>,
    /// Offset used to bucket records into days.
    pub utc_offset: FixedOffset,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// `User-Agent` header.
    pub user_agent: String,
}

impl ApiConfig {
    /// Environment variable holding the API root.
    pub const BASE_URL_VAR: &'static str = "STOREFRONT_API_URL";
    /// Environment variable holding the asset root.
    pub const ASSET_URL_VAR: &'static str = "STOREFRONT_ASSET_URL";
    /// Environment variable holding the display offset in minutes east of UTC.
    pub const UTC_OFFSET_VAR: &'static str = "STOREFRONT_UTC_OFFSET_MINUTES";

    /// Configuration for `base_url` with UTC display.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            asset_base_url: None,
            utc_offset: Utc.fix(),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("storefront-lists/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Read configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] when the API root is not set and
    /// [`ConfigError::InvalidOffset`] when the offset is not a valid number of
    /// minutes.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            std::env::var(Self::BASE_URL_VAR).map_err(|_| ConfigError::MissingVar(Self::BASE_URL_VAR))?;

        let mut config = Self::new(base_url);
        if let Ok(asset_url) = std::env::var(Self::ASSET_URL_VAR) {
            config = config.with_asset_base_url(asset_url);
        }
        if let Ok(raw) = std::env::var(Self::UTC_OFFSET_VAR) {
            config = config.with_utc_offset(parse_offset_minutes(&raw)?);
        }
        Ok(config)
    }

    /// Set the asset root.
    #[must_use]
    pub fn with_asset_base_url(mut self, url: impl Into<String>) -> Self {
        self.asset_base_url = Some(url.into());
        self
    }

    /// Set the display offset.
    #[must_use]
    pub const fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// URL of a list endpoint: `{base}/api/{path}`.
    #[must_use]
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/api/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Absolute URL of an asset, when an asset root is configured.
    ///
    /// Absolute paths are returned unchanged.
    #[must_use]
    pub fn asset_url(&self, path: &str) -> Option<String> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Some(path.to_string());
        }
        self.asset_base_url.as_ref().map(|base| {
            format!(
                "{}/{}",
                base.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        })
    }
}

fn parse_offset_minutes(raw: &str) -> Result<FixedOffset, ConfigError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .and_then(|minutes| minutes.checked_mul(60))
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ConfigError::InvalidOffset(raw.to_string()))
}

/// Where each normalized [`crate::types::Record`] column comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Column holding the row id.
    pub id: String,
    /// Column holding the order key, for grouped lists.
    pub group_key: Option<String>,
    /// Column holding the timestamp.
    pub occurred_at: String,
    /// Column holding the status token.
    pub status: Option<String>,
}

impl RecordSchema {
    /// Schema with `id` and `occurred_at` columns.
    #[must_use]
    pub fn new(id: impl Into<String>, occurred_at: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            group_key: None,
            occurred_at: occurred_at.into(),
            status: None,
        }
    }

    /// Read the group key from `column`.
    #[must_use]
    pub fn with_group_key(mut self, column: impl Into<String>) -> Self {
        self.group_key = Some(column.into());
        self
    }

    /// Read the status from `column`.
    #[must_use]
    pub fn with_status(mut self, column: impl Into<String>) -> Self {
        self.status = Some(column.into());
        self
    }
}

/// One list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Name used in logs and on the command line.
    pub name: String,
    /// Path under `/api/`.
    pub path: String,
    /// Dotted path of the item array inside a wrapped response.
    pub collection: Option<String>,
    /// Column mapping.
    pub schema: RecordSchema,
    /// Whether the endpoint accepts `page` and reports `maxPage`.
    pub paginated: bool,
    /// Filters that must be set before a request is sent.
    pub required_filters: Vec<FilterField>,
    /// Request time budget.
    pub timeout: Duration,
}

impl Endpoint {
    /// Unpaginated endpoint returning a bare array.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<String>, schema: RecordSchema) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            collection: None,
            schema,
            paginated: false,
            required_filters: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Orders: one row per order line, grouped by `order_id`.
    #[must_use]
    pub fn orders() -> Self {
        Self::new(
            "orders",
            "orders",
            RecordSchema::new("id", "created_at")
                .with_group_key("order_id")
                .with_status("status"),
        )
        .with_collection("data.orders")
        .paginated()
    }

    /// Inventory movements: stock in and out per product.
    #[must_use]
    pub fn inventory() -> Self {
        Self::new(
            "inventory",
            "inventory/history",
            RecordSchema::new("id", "created_at"),
        )
        .with_collection("product")
        .with_timeout(Duration::from_secs(30))
    }

    /// Staff check-ins for one month.
    #[must_use]
    pub fn check_ins() -> Self {
        Self::new(
            "check-ins",
            "timekeeping",
            RecordSchema::new("id", "checked_in_at").with_status("status"),
        )
        .with_required_filter(FilterField::Month)
        .with_timeout(Duration::from_secs(10))
    }

    /// Look up a preset by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownEndpoint`] for unknown names.
    pub fn by_name(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "orders" => Ok(Self::orders()),
            "inventory" => Ok(Self::inventory()),
            "check-ins" | "checkins" | "timekeeping" => Ok(Self::check_ins()),
            _ => Err(ConfigError::UnknownEndpoint(name.to_string())),
        }
    }

    /// Items live at `path` inside a wrapped response.
    #[must_use]
    pub fn with_collection(mut self, path: impl Into<String>) -> Self {
        self.collection = Some(path.into());
        self
    }

    /// Enable pagination.
    #[must_use]
    pub const fn paginated(mut self) -> Self {
        self.paginated = true;
        self
    }

    /// Require `field` before fetching.
    #[must_use]
    pub fn with_required_filter(mut self, field: FilterField) -> Self {
        self.required_filters.push(field);
        self
    }

    /// Set the request time budget.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Timing and display settings of one list controller.
#[derive(Debug, Clone)]
pub struct ListConfig {
    /// Endpoint backing the list.
    pub endpoint: Endpoint,
    /// Quiet period for search input.
    pub debounce: Duration,
    /// Minimum spacing between fetch starts.
    pub cooldown: Duration,
    /// Offset used to bucket records into days.
    pub utc_offset: FixedOffset,
}

impl ListConfig {
    /// Default timings for `endpoint`.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            debounce: DEFAULT_DEBOUNCE,
            cooldown: DEFAULT_COOLDOWN,
            utc_offset: Utc.fix(),
        }
    }

    /// Set the search quiet period.
    #[must_use]
    pub const fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the fetch cool-down.
    #[must_use]
    pub const fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the display offset.
    #[must_use]
    pub const fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builds_endpoint_urls() {
        let config = ApiConfig::new("https://shop.example.com/");
        assert_eq!(
            config.endpoint_url("/orders"),
            "https://shop.example.com/api/orders"
        );
    }

    #[test]
    fn resolves_asset_urls() {
        let config = ApiConfig::new("https://shop.example.com");
        assert_eq!(config.asset_url("img/a.png"), None);

        let config = config.with_asset_base_url("https://cdn.example.com/");
        assert_eq!(
            config.asset_url("/img/a.png").as_deref(),
            Some("https://cdn.example.com/img/a.png")
        );
        assert_eq!(
            config.asset_url("https://other.example.com/b.png").as_deref(),
            Some("https://other.example.com/b.png")
        );
    }

    #[test]
    fn parses_offsets_in_minutes() {
        assert_eq!(
            parse_offset_minutes("420").unwrap(),
            FixedOffset::east_opt(7 * 3600).unwrap()
        );
        assert_eq!(
            parse_offset_minutes("-300").unwrap(),
            FixedOffset::west_opt(5 * 3600).unwrap()
        );
        assert!(parse_offset_minutes("2000").is_err());
        assert!(parse_offset_minutes("abc").is_err());
    }

    #[test]
    fn presets_by_name() {
        let orders = Endpoint::by_name("Orders").unwrap();
        assert!(orders.paginated);
        assert_eq!(orders.collection.as_deref(), Some("data.orders"));
        assert_eq!(orders.schema.group_key.as_deref(), Some("order_id"));

        let check_ins = Endpoint::by_name("check-ins").unwrap();
        assert_eq!(check_ins.required_filters, vec![FilterField::Month]);
        assert_eq!(check_ins.timeout, Duration::from_secs(10));

        assert!(matches!(
            Endpoint::by_name("refunds"),
            Err(ConfigError::UnknownEndpoint(_))
        ));
    }

    #[test]
    fn list_config_defaults() {
        let config = ListConfig::new(Endpoint::orders());
        assert_eq!(config.debounce, Duration::from_millis(500));
        assert_eq!(config.cooldown, Duration::from_secs(2));
        assert_eq!(config.utc_offset.local_minus_utc(), 0);
    }
}
