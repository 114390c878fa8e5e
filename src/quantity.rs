//! Quantities and quantity filters

use crate::{Error, Result};
use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Value, ValueRef};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Numeric quantity attached to an anchor or relation.
#[derive(Debug, Clone, Copy)]
pub enum Quantity {
    Int(i64),
    Float(f64),
}

impl Quantity {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Quantity::Int(v) => v as f64,
            Quantity::Float(v) => v,
        }
    }

    pub fn is_finite(&self) -> bool {
        match *self {
            Quantity::Int(_) => true,
            Quantity::Float(v) => v.is_finite(),
        }
    }

    /// Reject NaN and infinities.
    pub fn validate(self) -> Result<Self> {
        if self.is_finite() {
            Ok(self)
        } else {
            Err(Error::Validation(format!("quantity {self} is not a finite number")))
        }
    }
}

// The store keeps quantities with NUMERIC affinity, so 1.0 reads back as 1.
impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Quantity::Int(a), Quantity::Int(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Quantity::Int(a), Quantity::Int(b)) => a.partial_cmp(b),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

impl From<i64> for Quantity {
    fn from(v: i64) -> Self {
        Quantity::Int(v)
    }
}

impl From<i32> for Quantity {
    fn from(v: i32) -> Self {
        Quantity::Int(v.into())
    }
}

impl From<f64> for Quantity {
    fn from(v: f64) -> Self {
        Quantity::Float(v)
    }
}

impl From<Quantity> for Value {
    fn from(q: Quantity) -> Self {
        match q {
            Quantity::Int(v) => Value::Integer(v),
            Quantity::Float(v) => Value::Real(v),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Int(v) => write!(f, "{}", v),
            Quantity::Float(v) => write!(f, "{}", v),
        }
    }
}

impl FromStr for Quantity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(v) = s.parse::<i64>() {
            return Ok(Quantity::Int(v));
        }
        match s.parse::<f64>() {
            Ok(v) => Quantity::Float(v).validate(),
            Err(_) => Err(Error::Validation(format!("quantity {s:?} is not a number"))),
        }
    }
}

impl ToSql for Quantity {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match *self {
            Quantity::Int(v) => ToSqlOutput::from(v),
            Quantity::Float(v) => ToSqlOutput::from(v),
        })
    }
}

impl FromSql for Quantity {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(v) => Ok(Quantity::Int(v)),
            ValueRef::Real(v) => Ok(Quantity::Float(v)),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match *self {
            Quantity::Int(v) => serializer.serialize_i64(v),
            Quantity::Float(v) => serializer.serialize_f64(v),
        }
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct QuantityVisitor;

        impl Visitor<'_> for QuantityVisitor {
            type Value = Quantity;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Quantity, E> {
                Ok(Quantity::Int(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Quantity, E> {
                Ok(i64::try_from(v).map_or(Quantity::Float(v as f64), Quantity::Int))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Quantity, E> {
                Ok(Quantity::Float(v))
            }
        }

        deserializer.deserialize_any(QuantityVisitor)
    }
}

// ========== Filters ==========

/// Raw quantity constraints as a caller states them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuantityBounds {
    pub eq: Option<Quantity>,
    pub gt: Option<Quantity>,
    pub gte: Option<Quantity>,
    pub lt: Option<Quantity>,
    pub lte: Option<Quantity>,
    pub not: bool,
}

impl QuantityBounds {
    /// Resolve into a [`QuantityFilter`].
    pub fn resolve(&self) -> Result<QuantityFilter> {
        QuantityFilter::from_bounds(self)
    }
}

/// One side of a range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub value: Quantity,
    pub inclusive: bool,
}

impl Bound {
    pub fn exclusive(value: Quantity) -> Self {
        Self { value, inclusive: false }
    }

    pub fn inclusive(value: Quantity) -> Self {
        Self { value, inclusive: true }
    }

    fn lower_op(&self) -> &'static str {
        if self.inclusive { ">=" } else { ">" }
    }

    fn upper_op(&self) -> &'static str {
        if self.inclusive { "<=" } else { "<" }
    }
}

/// Resolved shape of a quantity filter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum QuantityRange {
    #[default]
    Unbounded,
    Exactly(Quantity),
    Above(Bound),
    Below(Bound),
    /// Lower bound below the upper bound: both must hold
    Within { lower: Bound, upper: Bound },
    /// Lower bound at or above the upper bound: either may hold
    Outside { lower: Bound, upper: Bound },
}

/// Quantity filter with precedence already resolved.
///
/// `eq` wins over any bound; `gt` wins over `gte` and `lt` over `lte`.
/// Rows without a quantity never match a filter that constrains anything,
/// negated or not.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuantityFilter {
    range: QuantityRange,
    negated: bool,
}

impl QuantityFilter {
    /// Filter matching every row.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn exactly(q: Quantity) -> Result<Self> {
        Ok(Self::new(QuantityRange::Exactly(q.validate()?)))
    }

    fn new(range: QuantityRange) -> Self {
        Self { range, negated: false }
    }

    pub fn from_bounds(bounds: &QuantityBounds) -> Result<Self> {
        let check = |q: Option<Quantity>| q.map(Quantity::validate).transpose();
        let eq = check(bounds.eq)?;
        let lower = match (check(bounds.gt)?, check(bounds.gte)?) {
            (Some(v), _) => Some(Bound::exclusive(v)),
            (None, Some(v)) => Some(Bound::inclusive(v)),
            (None, None) => None,
        };
        let upper = match (check(bounds.lt)?, check(bounds.lte)?) {
            (Some(v), _) => Some(Bound::exclusive(v)),
            (None, Some(v)) => Some(Bound::inclusive(v)),
            (None, None) => None,
        };

        let range = match (eq, lower, upper) {
            (Some(q), _, _) => QuantityRange::Exactly(q),
            (None, Some(lower), Some(upper)) if lower.value < upper.value => {
                QuantityRange::Within { lower, upper }
            }
            (None, Some(lower), Some(upper)) => QuantityRange::Outside { lower, upper },
            (None, Some(lower), None) => QuantityRange::Above(lower),
            (None, None, Some(upper)) => QuantityRange::Below(upper),
            (None, None, None) => QuantityRange::Unbounded,
        };

        Ok(Self { range, negated: bounds.not })
    }

    pub fn range(&self) -> &QuantityRange {
        &self.range
    }

    pub fn is_unbounded(&self) -> bool {
        self.range == QuantityRange::Unbounded
    }

    /// SQL condition over `column`, or `None` when the filter matches
    /// everything. The condition is parenthesized as a whole.
    pub fn condition(&self, column: &str) -> Option<(String, Vec<Value>)> {
        let (body, params) = match self.range {
            QuantityRange::Unbounded => return None,
            QuantityRange::Exactly(q) => (format!("{column} = ?"), vec![q.into()]),
            QuantityRange::Above(b) => (format!("{column} {} ?", b.lower_op()), vec![b.value.into()]),
            QuantityRange::Below(b) => (format!("{column} {} ?", b.upper_op()), vec![b.value.into()]),
            QuantityRange::Within { lower, upper } => (
                format!("{column} {} ? AND {column} {} ?", lower.lower_op(), upper.upper_op()),
                vec![lower.value.into(), upper.value.into()],
            ),
            QuantityRange::Outside { lower, upper } => (
                format!("{column} {} ? OR {column} {} ?", lower.lower_op(), upper.upper_op()),
                vec![lower.value.into(), upper.value.into()],
            ),
        };

        // NULL compares as NULL on both branches, so NOT keeps it excluded
        let sql = if self.negated { format!("NOT ({body})") } else { format!("({body})") };
        Some((sql, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(bounds: QuantityBounds) -> QuantityFilter {
        bounds.resolve().unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!("5".parse::<Quantity>().unwrap(), Quantity::Int(5));
        assert_eq!("-2.5".parse::<Quantity>().unwrap(), Quantity::Float(-2.5));
        assert!(matches!("five".parse::<Quantity>(), Err(Error::Validation(_))));
        assert!(matches!("NaN".parse::<Quantity>(), Err(Error::Validation(_))));
        assert!(matches!("inf".parse::<Quantity>(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_numeric_equality() {
        assert_eq!(Quantity::Int(1), Quantity::Float(1.0));
        assert_ne!(Quantity::Int(1), Quantity::Float(1.5));
        assert!(Quantity::Int(3) < Quantity::Float(3.5));
    }

    #[test]
    fn test_serde_bare_number() {
        assert_eq!(serde_json::to_string(&Quantity::Int(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&Quantity::Float(0.5)).unwrap(), "0.5");
        let q: Quantity = serde_json::from_str("7").unwrap();
        assert_eq!(q, Quantity::Int(7));
        assert!(serde_json::from_str::<Quantity>("\"7\"").is_err());
    }

    #[test]
    fn test_eq_overrides_bounds() {
        let filter = resolve(QuantityBounds {
            eq: Some(5.into()),
            gt: Some(1.into()),
            lt: Some(9.into()),
            ..Default::default()
        });
        assert_eq!(*filter.range(), QuantityRange::Exactly(5.into()));
    }

    #[test]
    fn test_strict_overrides_inclusive() {
        let filter = resolve(QuantityBounds {
            gt: Some(1.into()),
            gte: Some(2.into()),
            lte: Some(8.into()),
            lt: Some(9.into()),
            ..Default::default()
        });
        assert_eq!(
            *filter.range(),
            QuantityRange::Within {
                lower: Bound::exclusive(1.into()),
                upper: Bound::exclusive(9.into()),
            }
        );
    }

    #[test]
    fn test_single_bounds() {
        let filter = resolve(QuantityBounds { gte: Some(3.into()), ..Default::default() });
        assert_eq!(*filter.range(), QuantityRange::Above(Bound::inclusive(3.into())));

        let filter = resolve(QuantityBounds { lte: Some(3.into()), ..Default::default() });
        assert_eq!(*filter.range(), QuantityRange::Below(Bound::inclusive(3.into())));
    }

    #[test]
    fn test_inverted_bounds_are_disjunction() {
        let filter = resolve(QuantityBounds {
            gt: Some(4.into()),
            lt: Some(3.into()),
            ..Default::default()
        });
        let (sql, params) = filter.condition("q").unwrap();
        assert_eq!(sql, "(q > ? OR q < ?)");
        assert_eq!(params, vec![Value::Integer(4), Value::Integer(3)]);
    }

    #[test]
    fn test_equal_bounds_are_disjunction() {
        let filter = resolve(QuantityBounds {
            gte: Some(3.into()),
            lte: Some(3.into()),
            ..Default::default()
        });
        assert!(matches!(filter.range(), QuantityRange::Outside { .. }));
        assert_eq!(filter.condition("q").unwrap().0, "(q >= ? OR q <= ?)");
    }

    #[test]
    fn test_within_condition() {
        let filter = resolve(QuantityBounds {
            gte: Some(1.into()),
            lt: Some(2.5.into()),
            ..Default::default()
        });
        let (sql, params) = filter.condition("q").unwrap();
        assert_eq!(sql, "(q >= ? AND q < ?)");
        assert_eq!(params, vec![Value::Integer(1), Value::Real(2.5)]);
    }

    #[test]
    fn test_negated_condition() {
        let filter = resolve(QuantityBounds { eq: Some(5.into()), not: true, ..Default::default() });
        let (sql, _) = filter.condition("q").unwrap();
        assert_eq!(sql, "NOT (q = ?)");
    }

    #[test]
    fn test_not_alone_is_unbounded() {
        let filter = resolve(QuantityBounds { not: true, ..Default::default() });
        assert!(filter.is_unbounded());
        assert!(filter.condition("q").is_none());
    }

    #[test]
    fn test_non_finite_rejected() {
        let result = QuantityBounds { gt: Some(f64::NAN.into()), ..Default::default() }.resolve();
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(QuantityFilter::exactly(f64::INFINITY.into()).is_err());
    }
}
