//! Filter state and the reducer that applies filter changes.
//!
//! [`apply_filter`] never fails: invalid values are dropped and the previous
//! value kept. A value of `"-1"` or blank clears a field back to "all".

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Sentinel the screens send for "all".
pub const ALL_VALUE: &str = "-1";

/// A filterable column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    /// Product id.
    Product,
    /// Category id.
    Category,
    /// Brand id.
    Brand,
    /// Color id.
    Color,
    /// Condition id.
    Condition,
    /// Customer id.
    Customer,
    /// Seller (staff) id.
    Seller,
    /// Status token.
    Status,
    /// Month number or `YYYY-MM`.
    Month,
    /// Free text.
    Search,
}

impl FilterField {
    /// Every field in query-string order.
    pub const ALL: [Self; 10] = [
        Self::Product,
        Self::Category,
        Self::Brand,
        Self::Color,
        Self::Condition,
        Self::Customer,
        Self::Seller,
        Self::Status,
        Self::Month,
        Self::Search,
    ];

    /// Query parameter name.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Category => "category",
            Self::Brand => "brand",
            Self::Color => "color",
            Self::Condition => "condition",
            Self::Customer => "customer",
            Self::Seller => "seller",
            Self::Status => "status",
            Self::Month => "month",
            Self::Search => "search",
        }
    }

    /// Fields overridden by a selected product.
    #[must_use]
    pub const fn is_product_attribute(self) -> bool {
        matches!(
            self,
            Self::Category | Self::Brand | Self::Color | Self::Condition
        )
    }

    /// Fields whose edits wait for a quiet period before fetching.
    #[must_use]
    pub const fn is_debounced(self) -> bool {
        matches!(self, Self::Search)
    }

    /// Normalize a raw value. `Ok(None)` clears the field, `Err(())` rejects
    /// the value.
    fn normalize(self, raw: &str) -> Result<Option<String>, ()> {
        let value = raw.trim();
        if value.is_empty() || value == ALL_VALUE {
            return Ok(None);
        }

        match self {
            Self::Product
            | Self::Category
            | Self::Brand
            | Self::Color
            | Self::Condition
            | Self::Customer
            | Self::Seller => {
                if value.bytes().all(|b| b.is_ascii_digit()) {
                    Ok(Some(value.to_string()))
                } else {
                    Err(())
                }
            },
            Self::Status => {
                if value
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
                {
                    Ok(Some(value.to_string()))
                } else {
                    Err(())
                }
            },
            Self::Month => parse_month(value).map(Some).ok_or(()),
            Self::Search => Ok(Some(value.to_string())),
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for FilterField {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.wire_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownFilter(s.to_string()))
    }
}

/// `"1"`..`"12"` (leading zero allowed) or `"YYYY-MM"`.
fn parse_month(value: &str) -> Option<String> {
    fn month_number(digits: &str) -> Option<u32> {
        if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().filter(|m| (1..=12).contains(m))
    }

    match value.split_once('-') {
        None => month_number(value).map(|m| m.to_string()),
        Some((year, month)) => {
            let valid_year = year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit());
            if valid_year && month.len() == 2 {
                month_number(month).map(|m| format!("{year}-{m:02}"))
            } else {
                None
            }
        },
    }
}

/// A single edit coming from the UI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterChange {
    /// Field being edited.
    pub field: FilterField,
    /// Raw value; `"-1"` or blank means "all".
    pub value: String,
}

impl FilterChange {
    /// Set `field` to `value`.
    #[must_use]
    pub fn new(field: FilterField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    /// Reset `field` to "all".
    #[must_use]
    pub fn clear(field: FilterField) -> Self {
        Self::new(field, ALL_VALUE)
    }
}

/// Current filter selection. Absent fields mean "all".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterState {
    values: BTreeMap<FilterField, String>,
}

impl FilterState {
    /// No filters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`apply_filter`].
    #[must_use]
    pub fn with(self, field: FilterField, value: &str) -> Self {
        apply_filter(&self, &FilterChange::new(field, value))
    }

    /// The selected value, or `None` for "all".
    #[must_use]
    pub fn get(&self, field: FilterField) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }

    /// Whether `field` is unfiltered.
    #[must_use]
    pub fn is_all(&self, field: FilterField) -> bool {
        !self.values.contains_key(&field)
    }

    /// Whether nothing is filtered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Fields from `required` that are still "all".
    #[must_use]
    pub fn missing(&self, required: &[FilterField]) -> Vec<FilterField> {
        required
            .iter()
            .copied()
            .filter(|field| self.is_all(*field))
            .collect()
    }

    /// Query parameters for every active field.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        self.values
            .iter()
            .map(|(field, value)| (field.wire_name(), value.clone()))
            .collect()
    }
}

/// How the list should react to a filter edit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refetch {
    /// Nothing changed.
    Skip,
    /// Fetch after the quiet period.
    Debounced,
    /// Fetch now.
    Immediate,
}

/// Apply one change to a filter state.
///
/// Precedence: while a product is selected, category, brand, color and
/// condition are fixed by that product and edits to them are ignored.
/// Selecting a product clears them.
#[must_use]
pub fn apply_filter(state: &FilterState, change: &FilterChange) -> FilterState {
    let mut next = state.clone();

    if change.field.is_product_attribute() && !state.is_all(FilterField::Product) {
        tracing::debug!(field = %change.field, "Ignoring edit while a product is selected");
        return next;
    }

    match change.field.normalize(&change.value) {
        Ok(Some(value)) => {
            if change.field == FilterField::Product {
                next.values.retain(|field, _| !field.is_product_attribute());
            }
            next.values.insert(change.field, value);
        },
        Ok(None) => {
            next.values.remove(&change.field);
        },
        Err(()) => {
            tracing::debug!(
                field = %change.field,
                value = %change.value,
                "Rejecting invalid filter value"
            );
        },
    }

    next
}

/// Decide how to react to the edit of `field` that turned `previous` into
/// `next`.
#[must_use]
pub fn refetch_for(previous: &FilterState, next: &FilterState, field: FilterField) -> Refetch {
    if previous == next {
        Refetch::Skip
    } else if field.is_debounced() {
        Refetch::Debounced
    } else {
        Refetch::Immediate
    }
}
