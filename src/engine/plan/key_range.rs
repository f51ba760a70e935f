use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::types::{Value, compare_key_prefix};

/// One side of a key range: a (possibly partial) key tuple.
///
/// A partial tuple bounds by prefix. An inclusive lower prefix starts at the
/// first key carrying that prefix, an exclusive one starts after the last
/// such key; upper bounds mirror this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBound {
    values: Vec<Value>,
    inclusive: bool,
    unrestricted: bool,
}

impl KeyBound {
    pub fn unrestricted() -> Self {
        Self {
            values: Vec::new(),
            inclusive: false,
            unrestricted: true,
        }
    }

    pub fn new(values: Vec<Value>, inclusive: bool) -> Self {
        if values.is_empty() {
            return Self::unrestricted();
        }
        Self {
            values,
            inclusive,
            unrestricted: false,
        }
    }

    pub fn inclusive(values: Vec<Value>) -> Self {
        Self::new(values, true)
    }

    pub fn exclusive(values: Vec<Value>) -> Self {
        Self::new(values, false)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn is_inclusive(&self) -> bool {
        self.inclusive
    }

    pub fn is_unrestricted(&self) -> bool {
        self.unrestricted
    }

    /// Orders two bounds used as range starts; unrestricted is negative infinity.
    pub fn cmp_as_lower(&self, other: &KeyBound) -> Ordering {
        match (self.unrestricted, other.unrestricted) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        let ord = compare_key_prefix(&self.values, &other.values);
        if ord != Ordering::Equal {
            return ord;
        }
        match self.values.len().cmp(&other.values.len()) {
            Ordering::Equal => match (self.inclusive, other.inclusive) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            },
            Ordering::Less if self.inclusive => Ordering::Less,
            Ordering::Less => Ordering::Greater,
            Ordering::Greater if other.inclusive => Ordering::Greater,
            Ordering::Greater => Ordering::Less,
        }
    }

    /// Orders two bounds used as range ends; unrestricted is positive infinity.
    pub fn cmp_as_upper(&self, other: &KeyBound) -> Ordering {
        match (self.unrestricted, other.unrestricted) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Greater,
            (false, true) => return Ordering::Less,
            (false, false) => {}
        }
        let ord = compare_key_prefix(&self.values, &other.values);
        if ord != Ordering::Equal {
            return ord;
        }
        match self.values.len().cmp(&other.values.len()) {
            Ordering::Equal => match (self.inclusive, other.inclusive) {
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => Ordering::Equal,
            },
            Ordering::Less if self.inclusive => Ordering::Greater,
            Ordering::Less => Ordering::Less,
            Ordering::Greater if other.inclusive => Ordering::Less,
            Ordering::Greater => Ordering::Greater,
        }
    }

    /// Whether a full key satisfies this bound used as a range start.
    pub fn admits_as_lower(&self, key: &[Value]) -> bool {
        if self.unrestricted {
            return true;
        }
        match compare_key_prefix(key, &self.values) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self.inclusive,
        }
    }

    /// Whether a full key satisfies this bound used as a range end.
    pub fn admits_as_upper(&self, key: &[Value]) -> bool {
        if self.unrestricted {
            return true;
        }
        match compare_key_prefix(key, &self.values) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => self.inclusive,
        }
    }
}

/// A pair of key bounds. A range whose start lies after its end is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRange {
    from: KeyBound,
    to: KeyBound,
}

impl KeyRange {
    pub fn new(from: KeyBound, to: KeyBound) -> Self {
        Self { from, to }
    }

    pub fn unrestricted() -> Self {
        Self::new(KeyBound::unrestricted(), KeyBound::unrestricted())
    }

    pub fn from(&self) -> &KeyBound {
        &self.from
    }

    pub fn to(&self) -> &KeyBound {
        &self.to
    }

    pub fn is_unrestricted(&self) -> bool {
        self.from.is_unrestricted() && self.to.is_unrestricted()
    }

    /// The tighter start and the tighter end of both ranges.
    pub fn intersect(&self, other: &KeyRange) -> KeyRange {
        let from = if self.from.cmp_as_lower(&other.from) == Ordering::Less {
            other.from.clone()
        } else {
            self.from.clone()
        };
        let to = if self.to.cmp_as_upper(&other.to) == Ordering::Greater {
            other.to.clone()
        } else {
            self.to.clone()
        };
        KeyRange::new(from, to)
    }

    pub fn is_empty(&self) -> bool {
        if self.from.is_unrestricted() || self.to.is_unrestricted() {
            return false;
        }
        let from = self.from.values();
        let to = self.to.values();
        match compare_key_prefix(from, to) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => match from.len().cmp(&to.len()) {
                Ordering::Equal => !(self.from.is_inclusive() && self.to.is_inclusive()),
                Ordering::Greater => !self.to.is_inclusive(),
                Ordering::Less => !self.from.is_inclusive(),
            },
        }
    }

    pub fn contains(&self, key: &[Value]) -> bool {
        self.from.admits_as_lower(key) && self.to.admits_as_upper(key)
    }
}

impl fmt::Display for KeyBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unrestricted {
            return f.write_str("*");
        }
        f.write_str("(")?;
        for (idx, value) in self.values.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.from.is_inclusive() { '[' } else { '(' };
        let close = if self.to.is_inclusive() { ']' } else { ')' };
        write!(f, "{open}{} .. {}{close}", self.from, self.to)
    }
}
