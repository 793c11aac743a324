//! Interaction and taxonomy tables, and the projections between them.
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use failure::Fail;
use serde::de::{self, Deserializer, Visitor};
use serde::Serializer;

use crate::{Category, ItemId, Tag, Timestamp, UserId};

/// Timestamp parsing errors.
#[derive(Debug, Fail, PartialEq)]
pub enum TimestampError {
    /// The field holds nothing.
    #[fail(display = "Missing timestamp.")]
    Missing,
    /// The field holds something that is not a recognised instant.
    #[fail(display = "Cannot parse timestamp '{}'.", _0)]
    Unparseable(String),
}

/// Nanoseconds in one second.
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

/// Exact decimal epoch seconds, e.g. `1112486027` or `1112486027.75`.
fn parse_epoch_seconds(value: &str) -> Option<Timestamp> {
    let (whole, fraction) = match value.find('.') {
        Some(dot) => (&value[..dot], &value[dot + 1..]),
        None => (value, ""),
    };

    if fraction.len() > 9 || !fraction.bytes().all(|x| x.is_ascii_digit()) {
        return None;
    }

    let seconds = whole.parse::<i64>().ok()?;
    let mut nanos = if fraction.is_empty() {
        0
    } else {
        format!("{:0<9}", fraction).parse::<i64>().ok()?
    };
    if whole.starts_with('-') {
        nanos = -nanos;
    }

    seconds.checked_mul(NANOS_PER_SECOND)?.checked_add(nanos)
}

/// Parse a timestamp into nanoseconds since the Unix epoch.
///
/// Accepts integer or fractional epoch seconds, `YYYY-MM-DD HH:MM:SS[.fff]`
/// and RFC 3339. Sub-second precision is kept down to the nanosecond.
pub fn parse_timestamp(value: &str) -> Result<Timestamp, TimestampError> {
    let value = value.trim();

    if value.is_empty() {
        return Err(TimestampError::Missing);
    }

    if let Some(nanos) = parse_epoch_seconds(value) {
        return Ok(nanos);
    }

    let unparseable = || TimestampError::Unparseable(value.to_owned());

    for format in &DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Utc
                .from_utc_datetime(&datetime)
                .timestamp_nanos_opt()
                .ok_or_else(unparseable);
        }
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .and_then(|datetime| datetime.timestamp_nanos_opt())
        .ok_or_else(unparseable)
}

struct TimestampVisitor;

impl<'de> Visitor<'de> for TimestampVisitor {
    type Value = Timestamp;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("epoch seconds or a date-time string")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Timestamp, E> {
        value
            .checked_mul(NANOS_PER_SECOND)
            .ok_or_else(|| E::custom(TimestampError::Unparseable(value.to_string())))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Timestamp, E> {
        if value > i64::MAX as u64 {
            return Err(E::custom(TimestampError::Unparseable(value.to_string())));
        }
        self.visit_i64(value as i64)
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Timestamp, E> {
        let nanos = (value * NANOS_PER_SECOND as f64).round();
        if nanos.is_finite() && nanos.abs() < i64::MAX as f64 {
            Ok(nanos as i64)
        } else {
            Err(E::custom(TimestampError::Unparseable(value.to_string())))
        }
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Timestamp, E> {
        parse_timestamp(value).map_err(E::custom)
    }
}

/// Deserialize a timestamp field through [`parse_timestamp`].
///
/// Self-describing formats may also hand over numbers, read as epoch seconds.
pub fn deserialize_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Timestamp, D::Error> {
    deserializer.deserialize_str(TimestampVisitor)
}

/// Serialize a timestamp as `YYYY-MM-DD HH:MM:SS.fffffffff` in UTC.
///
/// The output parses back through [`parse_timestamp`] to the same value.
pub fn serialize_timestamp<S: Serializer>(
    timestamp: &Timestamp,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&Utc.timestamp_nanos(*timestamp).format(WRITE_FORMAT))
}

/// Rows that carry a timestamp and can therefore be split in time.
pub trait Timestamped {
    /// When the row was observed.
    fn timestamp(&self) -> Timestamp;
}

/// A single positive user-item interaction.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Interaction {
    user_id: UserId,
    item_id: ItemId,
    #[serde(
        deserialize_with = "deserialize_timestamp",
        serialize_with = "serialize_timestamp"
    )]
    timestamp: Timestamp,
    rating: f32,
}

impl Interaction {
    /// Build a new interaction.
    pub fn new(user_id: UserId, item_id: ItemId, timestamp: Timestamp, rating: f32) -> Self {
        Interaction {
            user_id,
            item_id,
            timestamp,
            rating,
        }
    }

    /// The interacting user.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The item interacted with.
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    /// The explicit rating the interaction was derived from.
    pub fn rating(&self) -> f32 {
        self.rating
    }
}

impl Timestamped for Interaction {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// One `(item, tag, category)` row of the taxonomy.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub struct TaxonomyLabel {
    item_id: ItemId,
    tag: Tag,
    category: Category,
}

impl TaxonomyLabel {
    /// Build a new taxonomy label.
    pub fn new<T: Into<Tag>, C: Into<Category>>(item_id: ItemId, tag: T, category: C) -> Self {
        TaxonomyLabel {
            item_id,
            tag: tag.into(),
            category: category.into(),
        }
    }

    /// The labelled item.
    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    /// The tag attached to the item.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The category attached to the tag.
    pub fn category(&self) -> &str {
        &self.category
    }
}

/// A table of interactions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Interactions {
    interactions: Vec<Interaction>,
}

impl Interactions {
    /// Build an empty table.
    pub fn new() -> Self {
        Interactions {
            interactions: Vec::new(),
        }
    }

    /// The rows, in table order.
    pub fn data(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// The distinct users present in the table.
    pub fn user_ids(&self) -> HashSet<UserId> {
        self.interactions.iter().map(|x| x.user_id()).collect()
    }

    /// The distinct items present in the table.
    pub fn item_ids(&self) -> HashSet<ItemId> {
        self.interactions.iter().map(|x| x.item_id()).collect()
    }

    /// Keep only the rows matching `func`.
    pub fn filter<F: Fn(&Interaction) -> bool>(&self, func: F) -> Self {
        Interactions {
            interactions: self.interactions.iter().filter(|x| func(x)).cloned().collect(),
        }
    }
}

impl From<Vec<Interaction>> for Interactions {
    fn from(data: Vec<Interaction>) -> Interactions {
        Interactions { interactions: data }
    }
}

impl From<Interactions> for Vec<Interaction> {
    fn from(interactions: Interactions) -> Vec<Interaction> {
        interactions.interactions
    }
}

/// Restrict interactions and taxonomy labels to the items both of them know.
///
/// An empty intersection yields two empty tables.
pub fn reduce_to_common_items(
    interactions: &Interactions,
    taxonomy_labels: &[TaxonomyLabel],
) -> (Interactions, Vec<TaxonomyLabel>) {
    let rated_items = interactions.item_ids();
    let labelled_items: HashSet<ItemId> = taxonomy_labels.iter().map(|x| x.item_id()).collect();
    let common_items: HashSet<ItemId> = rated_items.intersection(&labelled_items).cloned().collect();

    let interactions = interactions.filter(|x| common_items.contains(&x.item_id()));
    let taxonomy_labels = taxonomy_labels
        .iter()
        .filter(|x| common_items.contains(&x.item_id()))
        .cloned()
        .collect();

    (interactions, taxonomy_labels)
}

/// Interactions and taxonomy labels regrouped for binarization.
///
/// Keys are kept in ascending order, so matrices built by walking
/// these maps have a deterministic row order. Group contents are not
/// deduplicated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Groupings {
    /// Items each user interacted with.
    pub user_items: BTreeMap<UserId, Vec<ItemId>>,
    /// Tags attached to each item.
    pub item_tags: BTreeMap<ItemId, Vec<Tag>>,
    /// Categories attached to each tag.
    pub tag_categories: BTreeMap<Tag, Vec<Category>>,
}

/// Change grain from flat tables to per-entity groups.
pub fn build_groupings(interactions: &Interactions, taxonomy_labels: &[TaxonomyLabel]) -> Groupings {
    let mut groupings = Groupings::default();

    for interaction in interactions.data() {
        groupings
            .user_items
            .entry(interaction.user_id())
            .or_insert_with(Vec::new)
            .push(interaction.item_id());
    }

    for label in taxonomy_labels {
        groupings
            .item_tags
            .entry(label.item_id())
            .or_insert_with(Vec::new)
            .push(label.tag.clone());
        groupings
            .tag_categories
            .entry(label.tag.clone())
            .or_insert_with(Vec::new)
            .push(label.category.clone());
    }

    info!(
        num_users = groupings.user_items.len(),
        num_items = groupings.item_tags.len(),
        num_tags = groupings.tag_categories.len(),
        "Changed grain"
    );

    groupings
}
