use crate::error::{Result, WriteError};
use crate::timestamp::{timestamp_string, Precision};
use chrono::{DateTime, Utc};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt::Write;
use std::marker::PhantomData;

// `=` is not special in a measurement name and is written as is
const MEASUREMENT_SPECIAL_CHARS: &[char] = &[',', ' '];
const KEY_VALUE_SPECIAL_CHARS: &[char] = &[',', ' ', '='];
const STRING_FIELD_SPECIAL_CHARS: &[char] = &['"', '\\'];

/// A typed field value. Only these four kinds exist on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl std::fmt::Display for FieldValue {
    // Line protocol rendering of the value
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FieldValue::Boolean(v) => v.fmt(f),
            FieldValue::Integer(v) => write!(f, "{v}i"),
            FieldValue::Float(v) => v.fmt(f),
            FieldValue::String(v) => write!(f, "\"{}\"", escape(v, STRING_FIELD_SPECIAL_CHARS)),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        FieldValue::Integer(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

/// One measurement sample. Tags and fields keep their insertion order, which
/// is the order they are encoded in.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Point {
    measurement: String,
    #[serde(default, deserialize_with = "ordered_pairs")]
    tags: Vec<(String, String)>,
    #[serde(default, deserialize_with = "ordered_pairs")]
    fields: Vec<(String, FieldValue)>,
    #[serde(default, rename = "time")]
    timestamp: Option<DateTime<Utc>>,
}

impl Point {
    pub fn new(measurement: impl Into<String>) -> Self {
        Point {
            measurement: measurement.into(),
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp: None,
        }
    }

    /// Sets a tag, replacing the value of an existing tag with the same name.
    /// Names and values containing a line break fail to encode.
    pub fn add_tag(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        upsert(&mut self.tags, name.into(), value.into());
        self
    }

    /// Sets a field, replacing the value of an existing field with the same name.
    /// Names and string values containing a line break fail to encode.
    pub fn add_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        upsert(&mut self.fields, name.into(), value.into());
        self
    }

    pub fn set_timestamp(&mut self, instant: DateTime<Utc>) -> &mut Self {
        self.timestamp = Some(instant);
        self
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn timestamp(&self) -> Option<&DateTime<Utc>> {
        self.timestamp.as_ref()
    }

    /// Renders the point as a line protocol record without its timestamp:
    /// `measurement[,tag=val...] field=val[,field=val...]`.
    #[tracing::instrument(skip_all, level = tracing::Level::TRACE)]
    pub fn encode(&self) -> Result<String> {
        if self.measurement.is_empty() {
            return Err(WriteError::Encoding("measurement name is empty".to_string()));
        }
        if self.fields.is_empty() {
            return Err(WriteError::Encoding(format!(
                "point for measurement {} has no fields",
                self.measurement
            )));
        }
        self.check_line_breaks()?;

        let mut line = escape(&self.measurement, MEASUREMENT_SPECIAL_CHARS);
        for (name, value) in self.tags.iter() {
            line.push(',');
            line.push_str(&escape(name, KEY_VALUE_SPECIAL_CHARS));
            line.push('=');
            line.push_str(&escape(value, KEY_VALUE_SPECIAL_CHARS));
        }

        line.push(' ');
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&escape(name, KEY_VALUE_SPECIAL_CHARS));
            // Writing to a String cannot fail
            let _ = write!(line, "={value}");
        }

        Ok(line)
    }

    /// The full record as sent to the server: the encoded point, a space and
    /// the timestamp in `precision` units.
    pub fn to_line(&self, precision: Precision) -> Result<String> {
        self.to_line_at(self.timestamp(), precision)
    }

    /// Like [`Point::to_line`], but always stamped with the current time.
    pub fn to_line_now(&self, precision: Precision) -> Result<String> {
        self.to_line_at(None, precision)
    }

    fn to_line_at(&self, instant: Option<&DateTime<Utc>>, precision: Precision) -> Result<String> {
        let mut line = self.encode()?;
        line.push(' ');
        line.push_str(&timestamp_string(instant, precision));
        Ok(line)
    }

    // A line break would split the record across two lines of a batch body
    fn check_line_breaks(&self) -> Result<()> {
        let string_values = self.fields.iter().filter_map(|(_, value)| match value {
            FieldValue::String(v) => Some(v.as_str()),
            _ => None,
        });
        let has_line_break = std::iter::once(self.measurement.as_str())
            .chain(self.tags.iter().flat_map(|(name, value)| [name.as_str(), value.as_str()]))
            .chain(self.fields.iter().map(|(name, _)| name.as_str()))
            .chain(string_values)
            .any(|text| text.contains(|c| c == '\n' || c == '\r'));

        if has_line_break {
            return Err(WriteError::Encoding(format!(
                "point for measurement {} contains a line break",
                self.measurement.escape_debug()
            )));
        }
        Ok(())
    }
}

fn upsert<V>(pairs: &mut Vec<(String, V)>, name: String, value: V) {
    match pairs.iter_mut().find(|(existing, _)| *existing == name) {
        Some((_, existing_value)) => *existing_value = value,
        None => pairs.push((name, value)),
    }
}

fn escape(value: &str, special_chars: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special_chars.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// Deserializes a JSON object into ordered pairs, keeping document order and
// letting a repeated key overwrite the earlier value.
fn ordered_pairs<'de, D, V>(deserializer: D) -> std::result::Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct PairsVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for PairsVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a map of names to values")
        }

        fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut pairs = Vec::new();
            while let Some((name, value)) = access.next_entry::<String, V>()? {
                upsert(&mut pairs, name, value);
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_map(PairsVisitor(PhantomData))
}
