// subject.rs — Attribute bags evaluated against policy.
//
// A Subject is what a rule's `field` is looked up in. Two extraction
// strategies produce subjects:
//
// - Request subjects (live interception): url, method, hostname, path,
//   scheme, plus one `header_<name>` field per captured request header.
// - Resource subjects (batch gate): the scalar fields of a component record,
//   with attributes from an optional entity lookup filling only the fields
//   the record itself does not have.
//
// Values are a two-variant tagged union so comparisons stay typed.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// A single attribute value: a string or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Num(f64),
    Str(String),
}

impl AttrValue {
    /// Numeric view of the value. Strings count if they parse as a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Num(n) => Some(*n),
            AttrValue::Str(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Textual view of the value.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            AttrValue::Str(s) => Cow::Borrowed(s.as_str()),
            AttrValue::Num(n) => Cow::Owned(n.to_string()),
        }
    }

    /// Convert a scalar JSON value. Objects, arrays and null have no
    /// attribute representation and yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(AttrValue::Str(s.clone())),
            Value::Number(n) => n.as_f64().map(AttrValue::Num),
            Value::Bool(b) => Some(AttrValue::Str(b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => f.write_str(s),
            AttrValue::Num(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}

impl From<f64> for AttrValue {
    fn from(n: f64) -> Self {
        AttrValue::Num(n)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Num(n as f64)
    }
}

/// An ordered, named bag of attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    attrs: BTreeMap<String, AttrValue>,
}

impl Subject {
    /// Create an empty subject.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, replacing any previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<AttrValue>) {
        self.attrs.insert(field.into(), value.into());
    }

    /// Set an attribute and return self (builder pattern).
    pub fn with(mut self, field: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&AttrValue> {
        self.attrs.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.attrs.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Build a request subject from an outbound HTTP call.
    ///
    /// `url` and the upper-cased `method` are always present. `hostname`,
    /// `path` and `scheme` are present when the URL parses and the part is
    /// non-empty. Every header becomes `header_<name>`, see
    /// [`Subject::header_field`].
    pub fn from_request<I, K, V>(url: &str, method: &str, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut subject = Subject::new()
            .with("url", url)
            .with("method", method.to_ascii_uppercase());

        if let Ok(parsed) = Url::parse(url) {
            let host = parsed
                .host_str()
                .unwrap_or("")
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_ascii_lowercase();
            if !host.is_empty() {
                subject.insert("hostname", host);
            }
            let path = if parsed.path().is_empty() {
                "/"
            } else {
                parsed.path()
            };
            subject.insert("path", path);
            subject.insert("scheme", parsed.scheme());
        }

        for (name, value) in headers {
            subject.insert(Self::header_field(name.as_ref()), value.as_ref());
        }

        subject
    }

    /// Attribute name for a request header: `X-Api-Key` → `header_x_api_key`.
    pub fn header_field(name: &str) -> String {
        format!("header_{}", name.to_ascii_lowercase().replace('-', "_"))
    }

    /// Build a resource subject from a component record.
    ///
    /// Scalar fields of `record` are copied. Scalar fields of `entity` fill
    /// only the fields the record lacks; the record always wins. When no
    /// `type` field is present, `type` is an alias of `component_type`.
    pub fn from_resource(record: &Map<String, Value>, entity: Option<&Map<String, Value>>) -> Self {
        let mut subject = Subject::new();
        for (key, value) in record {
            if let Some(v) = AttrValue::from_json(value) {
                subject.insert(key.clone(), v);
            }
        }

        if let Some(attrs) = entity {
            for (key, value) in attrs {
                if subject.contains(key) {
                    continue;
                }
                if let Some(v) = AttrValue::from_json(value) {
                    subject.insert(key.clone(), v);
                }
            }
        }

        if !subject.contains("type") {
            if let Some(component_type) = subject.get("component_type").cloned() {
                subject.insert("type", component_type);
            }
        }

        subject
    }
}
