//! Metadata values and lenient type coercion.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;

use crate::document::Document;
use crate::io::NormalizedPath;

// =============================================================================
// MetaValue
// =============================================================================

/// A dynamically typed metadata value.
#[derive(Debug, Clone, Default)]
pub enum MetaValue {
    /// Explicit absence of a value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    String(String),
    /// Logical path.
    Path(NormalizedPath),
    /// Date and time without zone.
    DateTime(NaiveDateTime),
    /// Ordered list.
    List(Vec<MetaValue>),
    /// Ordered string-keyed map.
    Map(IndexMap<String, MetaValue>),
    /// A document, e.g. a page or group member.
    Document(Document),
}

impl MetaValue {
    /// Whether this is [`MetaValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow as a string slice if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a list if this is a list.
    pub fn as_list(&self) -> Option<&[MetaValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Coerce to `T`, `None` when no coercion applies.
    pub fn get<T: FromMeta>(&self) -> Option<T> {
        T::from_meta(self)
    }

    /// Total ordering used for sorting documents by metadata.
    ///
    /// Integers and floats compare numerically; values of different kinds
    /// order by kind, with `Null` first.
    pub fn compare(&self, other: &MetaValue) -> Ordering {
        use MetaValue::*;
        match (self, other) {
            (Int(a), Int(b)) => a.cmp(b),
            (Int(a), Float(b)) => (*a as f64).total_cmp(b),
            (Float(a), Int(b)) => a.total_cmp(&(*b as f64)),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Bool(a), Bool(b)) => a.cmp(b),
            (String(a), String(b)) => a.cmp(b),
            (Path(a), Path(b)) => a.cmp(b),
            (DateTime(a), DateTime(b)) => a.cmp(b),
            (List(a), List(b)) => a
                .iter()
                .zip(b)
                .map(|(x, y)| x.compare(y))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Document(a), Document(b)) => a.id().cmp(&b.id()),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) => 2,
            Self::String(_) => 3,
            Self::Path(_) => 4,
            Self::DateTime(_) => 5,
            Self::List(_) => 6,
            Self::Map(_) => 7,
            Self::Document(_) => 8,
        }
    }
}

impl PartialEq for MetaValue {
    fn eq(&self, other: &Self) -> bool {
        use MetaValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (String(a), String(b)) => a == b,
            (Path(a), Path(b)) => a == b,
            (DateTime(a), DateTime(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (Document(a), Document(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
            Self::Path(p) => write!(f, "{p}"),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Self::Document(doc) => write!(f, "{doc}"),
        }
    }
}

// =============================================================================
// Conversions into MetaValue
// =============================================================================

macro_rules! from_int {
    ($($t:ty),*) => {$(
        impl From<$t> for MetaValue {
            fn from(v: $t) -> Self {
                Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
            }
        }
    )*};
}

from_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f32> for MetaValue {
    fn from(v: f32) -> Self {
        Self::Float(v.into())
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<NormalizedPath> for MetaValue {
    fn from(v: NormalizedPath) -> Self {
        Self::Path(v)
    }
}

impl From<NaiveDateTime> for MetaValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<NaiveDate> for MetaValue {
    fn from(v: NaiveDate) -> Self {
        Self::DateTime(v.and_time(NaiveTime::MIN))
    }
}

impl From<Document> for MetaValue {
    fn from(v: Document) -> Self {
        Self::Document(v)
    }
}

impl<T: Into<MetaValue>> From<Vec<T>> for MetaValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<MetaValue>> From<Option<T>> for MetaValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<IndexMap<String, MetaValue>> for MetaValue {
    fn from(v: IndexMap<String, MetaValue>) -> Self {
        Self::Map(v)
    }
}

impl From<serde_json::Value> for MetaValue {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value;
        match v {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

// =============================================================================
// FromMeta - lenient coercion out of MetaValue
// =============================================================================

/// Types that can be read out of a [`MetaValue`].
///
/// Coercion is lenient: strings parse into numbers, booleans, paths and
/// dates; a single value reads as a one-element `Vec`. A failed coercion
/// yields `None` so callers can fall back to a default.
pub trait FromMeta: Sized {
    /// Attempt the conversion.
    fn from_meta(value: &MetaValue) -> Option<Self>;
}

impl FromMeta for MetaValue {
    fn from_meta(value: &MetaValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromMeta for String {
    fn from_meta(value: &MetaValue) -> Option<Self> {
        match value {
            MetaValue::Null | MetaValue::Map(_) => None,
            other => Some(other.to_string()),
        }
    }
}

impl FromMeta for bool {
    fn from_meta(value: &MetaValue) -> Option<Self> {
        match value {
            MetaValue::Bool(b) => Some(*b),
            MetaValue::Int(i) => Some(*i != 0),
            MetaValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl FromMeta for i64 {
    fn from_meta(value: &MetaValue) -> Option<Self> {
        match value {
            MetaValue::Int(i) => Some(*i),
            MetaValue::Float(x) if x.fract() == 0.0 => Some(*x as i64),
            MetaValue::Bool(b) => Some(i64::from(*b)),
            MetaValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

macro_rules! from_meta_int {
    ($($t:ty),*) => {$(
        impl FromMeta for $t {
            fn from_meta(value: &MetaValue) -> Option<Self> {
                i64::from_meta(value).and_then(|i| <$t>::try_from(i).ok())
            }
        }
    )*};
}

from_meta_int!(i32, u32, u64, usize);

impl FromMeta for f64 {
    fn from_meta(value: &MetaValue) -> Option<Self> {
        match value {
            MetaValue::Float(x) => Some(*x),
            MetaValue::Int(i) => Some(*i as f64),
            MetaValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromMeta for NormalizedPath {
    fn from_meta(value: &MetaValue) -> Option<Self> {
        match value {
            MetaValue::Path(p) => Some(p.clone()),
            MetaValue::String(s) if !s.is_empty() => Some(NormalizedPath::new(s)),
            _ => None,
        }
    }
}

impl FromMeta for NaiveDateTime {
    fn from_meta(value: &MetaValue) -> Option<Self> {
        match value {
            MetaValue::DateTime(dt) => Some(*dt),
            MetaValue::String(s) => parse_datetime(s.trim()),
            _ => None,
        }
    }
}

impl FromMeta for NaiveDate {
    fn from_meta(value: &MetaValue) -> Option<Self> {
        NaiveDateTime::from_meta(value).map(|dt| dt.date())
    }
}

impl FromMeta for Document {
    fn from_meta(value: &MetaValue) -> Option<Self> {
        match value {
            MetaValue::Document(doc) => Some(doc.clone()),
            _ => None,
        }
    }
}

impl<T: FromMeta> FromMeta for Vec<T> {
    fn from_meta(value: &MetaValue) -> Option<Self> {
        match value {
            MetaValue::List(items) => items.iter().map(T::from_meta).collect(),
            MetaValue::Null => None,
            single => T::from_meta(single).map(|v| vec![v]),
        }
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_coercions() {
        let v = MetaValue::from("42");
        assert_eq!(v.get::<i64>(), Some(42));
        assert_eq!(v.get::<usize>(), Some(42));
        assert_eq!(v.get::<f64>(), Some(42.0));
        assert_eq!(MetaValue::from("True").get::<bool>(), Some(true));
        assert_eq!(MetaValue::from("nope").get::<bool>(), None);
        assert_eq!(MetaValue::from("abc").get::<i64>(), None);
        assert_eq!(
            MetaValue::from("a/../b.txt").get::<NormalizedPath>(),
            Some(NormalizedPath::new("b.txt"))
        );
    }

    #[test]
    fn test_negative_to_unsigned_fails() {
        assert_eq!(MetaValue::from(-3).get::<u32>(), None);
        assert_eq!(MetaValue::from(-3).get::<i32>(), Some(-3));
    }

    #[test]
    fn test_single_value_wraps_into_vec() {
        assert_eq!(MetaValue::from("x").get::<Vec<String>>(), Some(vec!["x".to_string()]));
        let list = MetaValue::from(vec![1, 2, 3]);
        assert_eq!(list.get::<Vec<i64>>(), Some(vec![1, 2, 3]));
        assert_eq!(list.get::<Vec<String>>().map(|v| v.len()), Some(3));
    }

    #[test]
    fn test_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(10, 30, 0));
        assert_eq!(MetaValue::from("2024-03-01T10:30:00").get(), expected);
        assert_eq!(MetaValue::from("2024-03-01 10:30:00").get(), expected);
        assert_eq!(
            MetaValue::from("2024-03-01").get::<NaiveDate>(),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
    }

    #[test]
    fn test_json_conversion() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"a": 1, "b": [true, "x"], "c": 1.5}"#).unwrap();
        let MetaValue::Map(map) = MetaValue::from(json) else {
            panic!("expected map");
        };
        assert_eq!(map["a"], MetaValue::Int(1));
        assert_eq!(map["b"], MetaValue::from(vec![MetaValue::Bool(true), "x".into()]));
        assert_eq!(map["c"], MetaValue::Float(1.5));
    }

    #[test]
    fn test_compare_mixed_numbers() {
        assert_eq!(MetaValue::Int(2).compare(&MetaValue::Float(1.5)), Ordering::Greater);
        assert_eq!(MetaValue::Null.compare(&MetaValue::Int(0)), Ordering::Less);
        assert_eq!(MetaValue::from("a").compare(&MetaValue::from("b")), Ordering::Less);
        assert_eq!(MetaValue::Int(1), MetaValue::Float(1.0));
    }
}
