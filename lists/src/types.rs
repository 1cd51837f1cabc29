//! Domain types shared by the list screens.
//!
//! A [`Record`] is one row returned by a list endpoint. Orders, inventory
//! movements and check-ins all normalize to it; endpoint-specific columns
//! stay in [`Record::fields`].

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Naive layouts accepted in addition to RFC 3339.
const NAIVE_LAYOUTS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a backend timestamp into wall-clock time at `offset`.
///
/// Timestamps carrying an offset are converted to `offset`. Naive timestamps
/// are taken as already being local. Bare dates resolve to midnight.
///
/// Returns `None` for anything unparseable.
#[must_use]
pub fn parse_timestamp(raw: &str, offset: &FixedOffset) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(aware) = DateTime::parse_from_rfc3339(raw) {
        return Some(aware.with_timezone(offset).naive_local());
    }
    if let Ok(aware) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%z") {
        return Some(aware.with_timezone(offset).naive_local());
    }

    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// One row of a list endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique within one response.
    pub id: String,
    /// Identifier shared by rows belonging to one order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_key: Option<String>,
    /// Timestamp as sent by the backend.
    pub occurred_at: String,
    /// Raw status token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Remaining display columns.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Create a record with an id and a timestamp.
    #[must_use]
    pub fn new(id: impl Into<String>, occurred_at: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            group_key: None,
            occurred_at: occurred_at.into(),
            status: None,
            fields: Map::new(),
        }
    }

    /// Set the group key.
    #[must_use]
    pub fn with_group_key(mut self, key: impl Into<String>) -> Self {
        self.group_key = Some(key.into());
        self
    }

    /// Set the raw status token.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Add a display column.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// A display column by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Wall-clock timestamp at `offset`, if parseable.
    #[must_use]
    pub fn timestamp(&self, offset: &FixedOffset) -> Option<NaiveDateTime> {
        parse_timestamp(&self.occurred_at, offset)
    }

    /// Order status decoded from the raw token.
    #[must_use]
    pub fn order_status(&self) -> Option<OrderStatus> {
        self.status.as_deref().map(OrderStatus::from_wire)
    }

    /// Punctuality of a check-in record against a shift start.
    #[must_use]
    pub fn attendance(
        &self,
        shift_start: NaiveTime,
        grace: chrono::Duration,
        offset: &FixedOffset,
    ) -> Option<Attendance> {
        self.timestamp(offset)
            .map(|at| Attendance::evaluate(at.time(), shift_start, grace))
    }
}

/// Lifecycle of an order.
///
/// The backend sends either a numeric code or a snake/kebab-case name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Placed, nothing paid.
    New,
    /// Fully paid.
    Paid,
    /// Cancelled by staff or customer.
    Cancelled,
    /// Deposit received.
    PartiallyPaid,
    /// Token this client does not know.
    Unknown(String),
}

impl OrderStatus {
    /// Decode a status token.
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "0" | "new" => Self::New,
            "1" | "paid" => Self::Paid,
            "2" | "cancelled" | "canceled" => Self::Cancelled,
            "3" | "partially_paid" | "partially-paid" | "partial" => Self::PartiallyPaid,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    /// Whether the order is closed for further changes.
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str("New"),
            Self::Paid => f.write_str("Paid"),
            Self::Cancelled => f.write_str("Cancelled"),
            Self::PartiallyPaid => f.write_str("Partially paid"),
            Self::Unknown(raw) => write!(f, "Unknown ({raw})"),
        }
    }
}

/// Punctuality of a check-in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attendance {
    /// Within the grace period.
    OnTime,
    /// Past the grace period by `minutes`.
    Late {
        /// Whole minutes after the shift start.
        minutes: i64,
    },
}

impl Attendance {
    /// Compare a check-in time with the shift start.
    #[must_use]
    pub fn evaluate(checked_in: NaiveTime, shift_start: NaiveTime, grace: chrono::Duration) -> Self {
        let delay = checked_in.signed_duration_since(shift_start);
        if delay <= grace {
            Self::OnTime
        } else {
            Self::Late {
                minutes: delay.num_minutes(),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn ict() -> FixedOffset {
        FixedOffset::east_opt(7 * 3600).unwrap()
    }

    #[test]
    fn parses_offset_timestamps_into_target_offset() {
        let parsed = parse_timestamp("2024-05-01T20:30:00Z", &ict()).unwrap();
        assert_eq!(parsed.to_string(), "2024-05-02 03:30:00");
    }

    #[test]
    fn parses_naive_layouts_as_local() {
        let offset = ict();
        assert_eq!(
            parse_timestamp("2024-05-01 08:15:00", &offset).unwrap().to_string(),
            "2024-05-01 08:15:00"
        );
        assert_eq!(
            parse_timestamp("2024-05-01T08:15:00.250", &offset)
                .unwrap()
                .time()
                .to_string(),
            "08:15:00.250"
        );
        assert_eq!(
            parse_timestamp("2024-05-01", &offset).unwrap().to_string(),
            "2024-05-01 00:00:00"
        );
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert!(parse_timestamp("", &utc()).is_none());
        assert!(parse_timestamp("yesterday", &utc()).is_none());
        assert!(parse_timestamp("2024-13-01", &utc()).is_none());
    }

    #[test]
    fn decodes_order_status_tokens() {
        assert_eq!(OrderStatus::from_wire("0"), OrderStatus::New);
        assert_eq!(OrderStatus::from_wire("Paid"), OrderStatus::Paid);
        assert_eq!(OrderStatus::from_wire("canceled"), OrderStatus::Cancelled);
        assert_eq!(
            OrderStatus::from_wire("partially-paid"),
            OrderStatus::PartiallyPaid
        );
        assert_eq!(
            OrderStatus::from_wire("refunded"),
            OrderStatus::Unknown("refunded".into())
        );
        assert!(OrderStatus::Paid.is_final());
        assert!(!OrderStatus::PartiallyPaid.is_final());
    }

    #[test]
    fn attendance_honours_grace_period() {
        let start = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let grace = chrono::Duration::minutes(5);

        assert_eq!(
            Attendance::evaluate(NaiveTime::from_hms_opt(7, 55, 0).unwrap(), start, grace),
            Attendance::OnTime
        );
        assert_eq!(
            Attendance::evaluate(NaiveTime::from_hms_opt(8, 5, 0).unwrap(), start, grace),
            Attendance::OnTime
        );
        assert_eq!(
            Attendance::evaluate(NaiveTime::from_hms_opt(8, 17, 30).unwrap(), start, grace),
            Attendance::Late { minutes: 17 }
        );
    }

    #[test]
    fn record_builder_and_accessors() {
        let record = Record::new("7", "2024-05-01 08:17:00")
            .with_group_key("42")
            .with_status("1")
            .with_field("customer", "Lan");

        assert_eq!(record.group_key.as_deref(), Some("42"));
        assert_eq!(record.order_status(), Some(OrderStatus::Paid));
        assert_eq!(record.field("customer"), Some(&Value::from("Lan")));
        assert_eq!(
            record.attendance(
                NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                chrono::Duration::minutes(10),
                &utc()
            ),
            Some(Attendance::Late { minutes: 17 })
        );
    }
}
