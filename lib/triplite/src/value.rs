//! Tagged scalar values and their codec.
//!
//! Every object of a statement is carried on the wire as NUL-terminated
//! UTF-8 bytes (with an optional language-tag trailer) and converted to a
//! [`Value`] according to the declared type of the property it is bound
//! to. Values compare with RDF semantics: `xsd:dateTime` ignores the
//! timezone offset and anything below a millisecond, doubles compare
//! bit-identical.

use crate::error::UpdateError;
use crate::ontology::PropertyKind;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use std::fmt;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

/// An `xsd:dateTime` point: seconds since the Unix epoch plus the UTC
/// offset it was written with.
///
/// The offset is kept so the value can be stored losslessly, but it is
/// ignored for comparison, as is anything below a millisecond.
#[derive(Debug, Clone, Copy)]
pub struct DateTime {
    seconds: f64,
    offset_seconds: i32,
}

impl DateTime {
    pub fn new(seconds: f64, offset_seconds: i32) -> Self {
        Self {
            seconds,
            offset_seconds,
        }
    }

    /// Parses an ISO 8601 / `xsd:dateTime` lexical form.
    ///
    /// A value without a timezone designator is read as UTC.
    pub fn from_iso8601(text: &str) -> Result<Self, UpdateError> {
        let has_offset = text
            .get(11..)
            .is_some_and(|t| t.contains(['Z', 'z', '+', '-']));
        let buf;
        let text = if has_offset {
            text
        } else {
            buf = format!("{text}Z");
            &buf
        };
        let parsed = OffsetDateTime::parse(text, &Rfc3339)
            .map_err(|e| UpdateError::InvalidLiteral(format!("Invalid datetime '{text}': {e}")))?;
        Ok(Self {
            seconds: parsed.unix_timestamp() as f64 + f64::from(parsed.nanosecond()) * 1e-9,
            offset_seconds: parsed.offset().whole_seconds(),
        })
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    pub fn offset_seconds(&self) -> i32 {
        self.offset_seconds
    }

    /// True when a plain integer timestamp loses nothing.
    fn fits_integer(&self) -> bool {
        self.offset_seconds == 0 && self.seconds.trunc() == self.seconds
    }

    pub fn to_iso8601(&self) -> Result<String, UpdateError> {
        let whole = self.seconds.floor();
        let nanos = (((self.seconds - whole) * 1e9).round() as u32).min(999_999_999);
        let utc = OffsetDateTime::from_unix_timestamp(whole as i64)
            .and_then(|t| t.replace_nanosecond(nanos))
            .map_err(|e| UpdateError::InvalidLiteral(format!("Datetime out of range: {e}")))?;
        let offset = UtcOffset::from_whole_seconds(self.offset_seconds)
            .map_err(|e| UpdateError::InvalidLiteral(format!("Invalid UTC offset: {e}")))?;
        utc.to_offset(offset)
            .format(&Rfc3339)
            .map_err(|e| UpdateError::InvalidLiteral(format!("Unformattable datetime: {e}")))
    }
}

impl PartialEq for DateTime {
    fn eq(&self, other: &Self) -> bool {
        // Offset is irrelevant for xsd:dateTime comparison, and this is a
        // floating point comparison, so ignore sub-millisecond too.
        (self.seconds - other.seconds).abs() < 0.001
    }
}

/// A decoded statement object, tagged with its storage type.
#[derive(Debug, Clone)]
pub enum Value {
    String(String),
    /// Raw wire bytes of a language-tagged string, ancillary data included.
    LangString(Vec<u8>),
    /// Also carries booleans (0/1) and `xsd:date` (midnight UTC timestamp).
    Integer(i64),
    Double(f64),
    DateTime(DateTime),
    /// The id of another resource.
    Resource(i64),
}

impl Value {
    /// Decodes object bytes for a literal-typed property.
    ///
    /// Resource-typed objects are not handled here: turning a URI into an
    /// id needs the id allocator.
    pub(crate) fn parse_literal(kind: PropertyKind, bytes: &[u8]) -> Result<Self, UpdateError> {
        let text = object_text(bytes);
        Ok(match kind {
            PropertyKind::String => Self::String(text.into_owned()),
            PropertyKind::LangString => Self::LangString(bytes.to_vec()),
            PropertyKind::Integer => Self::Integer(text.parse().map_err(|e| {
                UpdateError::InvalidLiteral(format!("Invalid integer '{text}': {e}"))
            })?),
            PropertyKind::Boolean => {
                // Anything that does not start with "true" counts as false.
                Self::Integer(i64::from(
                    text.get(..4).is_some_and(|t| t.eq_ignore_ascii_case("true")),
                ))
            }
            PropertyKind::Double => Self::Double(text.parse().map_err(|e| {
                UpdateError::InvalidLiteral(format!("Invalid double '{text}': {e}"))
            })?),
            PropertyKind::Date => {
                let datetime = DateTime::from_iso8601(&format!("{text}T00:00:00Z"))?;
                Self::Integer(datetime.seconds() as i64)
            }
            PropertyKind::DateTime => Self::DateTime(DateTime::from_iso8601(&text)?),
            PropertyKind::Resource => {
                return Err(UpdateError::Type(format!(
                    "'{text}' must be resolved to a resource id"
                )))
            }
        })
    }

    /// Reads a value back from a table column.
    pub(crate) fn from_column(
        kind: PropertyKind,
        column: ValueRef<'_>,
    ) -> Result<Option<Self>, UpdateError> {
        Ok(Some(match (kind, column) {
            (_, ValueRef::Null) => return Ok(None),
            (PropertyKind::String, ValueRef::Text(t)) => Self::String(text_from_utf8(t)?),
            (PropertyKind::LangString, ValueRef::Blob(b)) => Self::LangString(b.to_vec()),
            (PropertyKind::LangString, ValueRef::Text(t)) => {
                let mut bytes = t.to_vec();
                bytes.push(0);
                Self::LangString(bytes)
            }
            (
                PropertyKind::Integer | PropertyKind::Boolean | PropertyKind::Date,
                ValueRef::Integer(i),
            ) => Self::Integer(i),
            (PropertyKind::Double, ValueRef::Real(d)) => Self::Double(d),
            (PropertyKind::Double, ValueRef::Integer(i)) => Self::Double(i as f64),
            (PropertyKind::DateTime, ValueRef::Integer(i)) => {
                // UTC offset is irrelevant for comparison.
                Self::DateTime(DateTime::new(i as f64, 0))
            }
            (PropertyKind::DateTime, ValueRef::Text(t)) => {
                Self::DateTime(DateTime::from_iso8601(&text_from_utf8(t)?)?)
            }
            (PropertyKind::Resource, ValueRef::Integer(i)) => Self::Resource(i),
            (kind, column) => {
                return Err(UpdateError::InvalidLiteral(format!(
                    "Unexpected {:?} column for a {kind:?} property",
                    column.data_type()
                )))
            }
        }))
    }

    /// The text a full-text indexed value contributes to the index.
    pub(crate) fn fts_text(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::LangString(b) => std::str::from_utf8(text_bytes(b)).ok(),
            _ => None,
        }
    }

}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::LangString(a), Self::LangString(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) | (Self::Resource(a), Self::Resource(b)) => {
                a == b
            }
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::LangString(b) => {
                f.write_str(&String::from_utf8_lossy(text_bytes(b)))
            }
            Self::Integer(i) | Self::Resource(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::DateTime(d) => match d.to_iso8601() {
                Ok(s) => f.write_str(&s),
                Err(_) => write!(f, "{}", d.seconds()),
            },
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::String(s) => ToSqlOutput::from(s.as_str()),
            Self::LangString(b) => {
                let text = text_bytes(b);
                if b.len() > text.len() + 1 {
                    // Langtag trailer present, keep the raw bytes.
                    ToSqlOutput::from(b.as_slice())
                } else {
                    ToSqlOutput::from(String::from_utf8_lossy(text).into_owned())
                }
            }
            Self::Integer(i) | Self::Resource(i) => ToSqlOutput::from(*i),
            Self::Double(d) => ToSqlOutput::from(*d),
            Self::DateTime(d) => {
                // Anything that prevents a Unix timestamp from being
                // lossless is stored as ISO 8601 text instead.
                if d.fits_integer() {
                    ToSqlOutput::from(d.seconds() as i64)
                } else {
                    ToSqlOutput::from(d.to_iso8601().map_err(|e| {
                        rusqlite::Error::ToSqlConversionFailure(Box::new(e))
                    })?)
                }
            }
        })
    }
}

/// An ordered set of [`Value`]s.
///
/// Semantically a set under RDF equality, but insertion order is kept so
/// flushes and full-text rebuilds are deterministic.
#[derive(Debug, Clone, Default)]
pub struct ValueSet(Vec<Value>);

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` if it is not already present, reporting whether the
    /// set changed.
    pub fn add(&mut self, value: Value) -> bool {
        if self.0.contains(&value) {
            return false;
        }
        self.0.push(value);
        true
    }

    /// Removes the first value equal to `value`, reporting whether the set
    /// changed.
    pub fn remove(&mut self, value: &Value) -> bool {
        if let Some(i) = self.0.iter().position(|v| v == value) {
            self.0.remove(i);
            return true;
        }
        false
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&Value> {
        self.0.first()
    }

    pub fn get(&self, i: usize) -> Option<&Value> {
        self.0.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub(crate) fn push_loaded(&mut self, value: Value) {
        self.0.push(value);
    }
}

impl<'a> IntoIterator for &'a ValueSet {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The text payload of object bytes, langtag trailer and NUL excluded.
pub(crate) fn text_bytes(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(i) => &bytes[..i],
        None => bytes,
    }
}

/// The text payload of object bytes as a string, lossy on invalid UTF-8.
pub(crate) fn object_text(bytes: &[u8]) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(text_bytes(bytes))
}

fn text_from_utf8(bytes: &[u8]) -> Result<String, UpdateError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| UpdateError::InvalidLiteral(format!("Invalid UTF-8 in column: {e}")))
}

/// Builds wire object bytes: NUL-terminated text with an optional
/// language-tag trailer.
pub fn make_object_bytes(text: &str, langtag: Option<&str>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() + 1);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(0);
    if let Some(langtag) = langtag {
        bytes.extend_from_slice(langtag.as_bytes());
        bytes.push(0);
    }
    bytes
}
