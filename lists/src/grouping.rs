//! Bucketing of records by calendar day.
//!
//! [`group_records`] is a pure function of its inputs: the same records and
//! the same `now` always produce the same buckets.

use crate::types::{OrderStatus, Record};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Header of a day bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum BucketLabel {
    /// Same calendar day as `now`.
    Today,
    /// The calendar day before `now`.
    Yesterday,
    /// Any other day.
    Date(NaiveDate),
}

impl fmt::Display for BucketLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Today => f.write_str("Today"),
            Self::Yesterday => f.write_str("Yesterday"),
            Self::Date(date) => write!(f, "{}", date.format("%d/%m/%Y")),
        }
    }
}

/// All rows of one order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderGroup {
    /// The shared group key.
    pub key: String,
    /// Rows in response order; never empty.
    pub records: Vec<Record>,
}

impl OrderGroup {
    /// The first row, which carries the order-level columns.
    #[must_use]
    pub fn representative(&self) -> Option<&Record> {
        self.records.first()
    }

    /// Status of the order, read from its first row.
    #[must_use]
    pub fn status(&self) -> Option<OrderStatus> {
        self.representative().and_then(Record::order_status)
    }

    /// An order-level column, read from the first row.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.representative().and_then(|record| record.field(name))
    }

    /// Number of rows in the order.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always `false` for groups built by [`group_records`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn numeric_key(&self) -> Option<i64> {
        self.key.trim().parse().ok()
    }
}

/// Contents of a day bucket.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum BucketItems {
    /// Plain rows, newest first.
    Records(Vec<Record>),
    /// Orders, highest key first.
    Orders(Vec<OrderGroup>),
}

impl BucketItems {
    /// Number of rows or orders.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Records(records) => records.len(),
            Self::Orders(groups) => groups.len(),
        }
    }

    /// Whether the bucket holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One day of records.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DateBucket {
    /// Header.
    pub label: BucketLabel,
    /// Calendar day in the display offset.
    pub date: NaiveDate,
    /// Rows or orders of that day.
    pub items: BucketItems,
}

/// Bucket `records` by calendar day relative to `now`.
///
/// Records whose timestamp cannot be parsed are left out. When any record
/// carries a group key the buckets hold [`OrderGroup`]s; a record without a
/// key then forms a group of its own keyed by its id. A group lands in the
/// bucket of its first record.
///
/// Buckets come out as Today, Yesterday, then every other day newest first.
#[must_use]
pub fn group_records(records: &[Record], now: DateTime<FixedOffset>) -> Vec<DateBucket> {
    let offset = *now.offset();
    let today = now.date_naive();
    let yesterday = today.pred_opt();

    let dated: Vec<(NaiveDateTime, &Record)> = records
        .iter()
        .filter_map(|record| record.timestamp(&offset).map(|at| (at, record)))
        .collect();

    let grouped = dated.iter().any(|(_, record)| record.group_key.is_some());

    let mut days: Vec<(NaiveDate, BucketItems)> = if grouped {
        orders_by_day(&dated).into_iter().collect()
    } else {
        records_by_day(&dated).into_iter().collect()
    };

    days.sort_by_key(|(date, _)| {
        let rank = if *date == today {
            0
        } else if Some(*date) == yesterday {
            1
        } else {
            2
        };
        (rank, Reverse(*date))
    });

    days.into_iter()
        .map(|(date, items)| DateBucket {
            label: label_for(date, today, yesterday),
            date,
            items,
        })
        .collect()
}

fn label_for(date: NaiveDate, today: NaiveDate, yesterday: Option<NaiveDate>) -> BucketLabel {
    if date == today {
        BucketLabel::Today
    } else if Some(date) == yesterday {
        BucketLabel::Yesterday
    } else {
        BucketLabel::Date(date)
    }
}

fn records_by_day(dated: &[(NaiveDateTime, &Record)]) -> BTreeMap<NaiveDate, BucketItems> {
    let mut days: BTreeMap<NaiveDate, Vec<(NaiveDateTime, Record)>> = BTreeMap::new();
    for (at, record) in dated {
        days.entry(at.date())
            .or_default()
            .push((*at, (*record).clone()));
    }

    days.into_iter()
        .map(|(date, mut rows)| {
            rows.sort_by(|a, b| b.0.cmp(&a.0));
            let records = rows.into_iter().map(|(_, record)| record).collect();
            (date, BucketItems::Records(records))
        })
        .collect()
}

fn orders_by_day(dated: &[(NaiveDateTime, &Record)]) -> BTreeMap<NaiveDate, BucketItems> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(NaiveDate, OrderGroup)> = Vec::new();

    for (at, record) in dated {
        let key = record.group_key.as_deref().unwrap_or(&record.id);
        if let Some(&position) = positions.get(key) {
            groups[position].1.records.push((*record).clone());
        } else {
            positions.insert(key, groups.len());
            groups.push((
                at.date(),
                OrderGroup {
                    key: key.to_string(),
                    records: vec![(*record).clone()],
                },
            ));
        }
    }

    let mut days: BTreeMap<NaiveDate, Vec<OrderGroup>> = BTreeMap::new();
    for (date, group) in groups {
        days.entry(date).or_default().push(group);
    }

    days.into_iter()
        .map(|(date, mut groups)| {
            groups.sort_by(compare_keys_descending);
            (date, BucketItems::Orders(groups))
        })
        .collect()
}

/// Numeric keys descending; non-numeric keys after them in input order.
fn compare_keys_descending(a: &OrderGroup, b: &OrderGroup) -> Ordering {
    match (a.numeric_key(), b.numeric_key()) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
