//! Content block schema.
//!
//! A [`BlockDef`] describes the shape of a block value stored as JSON. Pages and
//! site settings keep their flexible content as JSON trees; every write goes
//! through [`BlockDef::validate`] and [`BlockDef::normalize`], and every read
//! goes through [`BlockDef::resolve`] before it reaches the serializer.

pub mod library;
pub mod serialize;

use chrono::{NaiveDate, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::db::models::{Document, Image};
use crate::media::rendition::{Filter, FilterSpec};
use crate::media::{MediaIndex, MediaRefs};

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
            .unwrap();
}

const URL_SCHEMES: &[&str] = &["http", "https", "ftp", "ftps", "mailto", "tel"];

/// One child of a stream: a block tag, its value and a stable id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChild<V> {
    #[serde(rename = "type")]
    pub block_type: String,
    pub value: V,
    #[serde(default)]
    pub id: Option<String>,
}

/// An entry of a resolved stream. Entries that are not tagged blocks are
/// carried as stored.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Block(StreamChild<BlockValue>),
    Raw(Value),
}

impl From<StreamChild<BlockValue>> for StreamItem {
    fn from(child: StreamChild<BlockValue>) -> Self {
        StreamItem::Block(child)
    }
}

/// A block value with media references resolved, ready for serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockValue {
    /// Any value the schema treats as opaque JSON
    Scalar(Value),
    /// Struct fields in schema order, undeclared keys last
    Struct(Vec<(String, BlockValue)>),
    List(Vec<BlockValue>),
    Stream(Vec<StreamItem>),
    Image {
        image: Image,
        rendition: Option<FilterSpec>,
    },
    Document(Document),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

/// All problems found in one piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid content: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
pub struct InvalidContent(pub Vec<ValidationError>);

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: &'static str,
    pub fields: Vec<(&'static str, BlockDef)>,
}

#[derive(Debug, Clone)]
pub struct StreamDef {
    pub children: Vec<(&'static str, BlockDef)>,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub enum BlockDef {
    Char {
        max_length: Option<usize>,
        required: bool,
        default: Option<&'static str>,
    },
    Text {
        required: bool,
    },
    RichText {
        required: bool,
    },
    RawHtml {
        required: bool,
    },
    Url {
        required: bool,
    },
    Email {
        required: bool,
    },
    Integer {
        required: bool,
        default: Option<i64>,
    },
    Boolean {
        default: bool,
    },
    Date {
        required: bool,
    },
    Time {
        required: bool,
    },
    Choice {
        choices: &'static [&'static str],
        required: bool,
        default: Option<&'static str>,
    },
    Image {
        required: bool,
        rendition: Option<Filter>,
    },
    Document {
        required: bool,
    },
    Struct(StructDef),
    List(Box<BlockDef>),
    Stream(StreamDef),
}

impl BlockDef {
    pub fn char(max_length: usize) -> Self {
        BlockDef::Char {
            max_length: Some(max_length),
            required: true,
            default: None,
        }
    }

    pub fn text() -> Self {
        BlockDef::Text { required: true }
    }

    pub fn rich_text() -> Self {
        BlockDef::RichText { required: true }
    }

    pub fn raw_html() -> Self {
        BlockDef::RawHtml { required: true }
    }

    pub fn url() -> Self {
        BlockDef::Url { required: true }
    }

    pub fn email() -> Self {
        BlockDef::Email { required: true }
    }

    pub fn integer() -> Self {
        BlockDef::Integer {
            required: true,
            default: None,
        }
    }

    pub fn boolean(default: bool) -> Self {
        BlockDef::Boolean { default }
    }

    pub fn date() -> Self {
        BlockDef::Date { required: true }
    }

    pub fn time() -> Self {
        BlockDef::Time { required: true }
    }

    pub fn choice(choices: &'static [&'static str]) -> Self {
        BlockDef::Choice {
            choices,
            required: true,
            default: None,
        }
    }

    pub fn image() -> Self {
        BlockDef::Image {
            required: true,
            rendition: None,
        }
    }

    pub fn document() -> Self {
        BlockDef::Document { required: true }
    }

    pub fn structure(name: &'static str, fields: Vec<(&'static str, BlockDef)>) -> Self {
        BlockDef::Struct(StructDef { name, fields })
    }

    pub fn list(child: BlockDef) -> Self {
        BlockDef::List(Box::new(child))
    }

    pub fn stream(children: Vec<(&'static str, BlockDef)>) -> Self {
        BlockDef::Stream(StreamDef {
            children,
            required: true,
        })
    }

    /// Allow the block to be left blank.
    pub fn optional(mut self) -> Self {
        match &mut self {
            BlockDef::Char { required, .. }
            | BlockDef::Text { required }
            | BlockDef::RichText { required }
            | BlockDef::RawHtml { required }
            | BlockDef::Url { required }
            | BlockDef::Email { required }
            | BlockDef::Integer { required, .. }
            | BlockDef::Date { required }
            | BlockDef::Time { required }
            | BlockDef::Choice { required, .. }
            | BlockDef::Image { required, .. }
            | BlockDef::Document { required } => *required = false,
            BlockDef::Stream(def) => def.required = false,
            BlockDef::Boolean { .. } | BlockDef::Struct(_) | BlockDef::List(_) => {}
        }
        self
    }

    /// Default for char and choice blocks.
    pub fn with_default(mut self, value: &'static str) -> Self {
        if let BlockDef::Char { default, .. } | BlockDef::Choice { default, .. } = &mut self {
            *default = Some(value);
        }
        self
    }

    pub fn with_int_default(mut self, value: i64) -> Self {
        if let BlockDef::Integer { default, .. } = &mut self {
            *default = Some(value);
        }
        self
    }

    /// Serialize an image block as a single rendition instead of the full image object.
    pub fn with_rendition(mut self, filter: Filter) -> Self {
        if let BlockDef::Image { rendition, .. } = &mut self {
            *rendition = Some(filter);
        }
        self
    }

    /// Whether a missing value is replaced on normalization.
    pub fn has_default(&self) -> bool {
        match self {
            BlockDef::Char { default, .. } | BlockDef::Choice { default, .. } => default.is_some(),
            BlockDef::Integer { default, .. } => default.is_some(),
            BlockDef::Boolean { .. } => true,
            _ => false,
        }
    }

    /// Check `value` against this definition, appending problems to `errors`.
    pub fn validate(&self, value: &Value, path: &str, errors: &mut Vec<ValidationError>) {
        if value.is_null() && self.has_default() {
            return;
        }
        let mut fail = |message: String| {
            errors.push(ValidationError {
                path: if path.is_empty() { "value".into() } else { path.to_string() },
                message,
            })
        };

        match self {
            BlockDef::Char {
                max_length,
                required,
                ..
            } => match text_of(value) {
                Err(()) => fail("Expected text.".into()),
                Ok(s) if s.is_empty() => {
                    if *required {
                        fail(REQUIRED.into())
                    }
                }
                Ok(s) => {
                    let len = s.chars().count();
                    if let Some(max) = max_length.filter(|max| len > *max) {
                        fail(format!(
                            "Ensure this value has at most {} characters (it has {}).",
                            max, len
                        ))
                    }
                }
            },
            BlockDef::Text { required }
            | BlockDef::RichText { required }
            | BlockDef::RawHtml { required } => match text_of(value) {
                Err(()) => fail("Expected text.".into()),
                Ok(s) if s.trim().is_empty() && *required => fail(REQUIRED.into()),
                Ok(_) => {}
            },
            BlockDef::Url { required } => match text_of(value) {
                Err(()) => fail("Expected text.".into()),
                Ok(s) if s.is_empty() => {
                    if *required {
                        fail(REQUIRED.into())
                    }
                }
                Ok(s) if !is_valid_url(s) => fail("Enter a valid URL.".into()),
                Ok(_) => {}
            },
            BlockDef::Email { required } => match text_of(value) {
                Err(()) => fail("Expected text.".into()),
                Ok(s) if s.is_empty() => {
                    if *required {
                        fail(REQUIRED.into())
                    }
                }
                Ok(s) if !EMAIL_RE.is_match(s) => fail("Enter a valid email address.".into()),
                Ok(_) => {}
            },
            BlockDef::Integer { required, .. } => match value {
                Value::Null if *required => fail(REQUIRED.into()),
                Value::Null => {}
                Value::Number(n) if n.is_i64() => {}
                _ => fail("Enter a whole number.".into()),
            },
            BlockDef::Boolean { .. } => {
                if !matches!(value, Value::Null | Value::Bool(_)) {
                    fail("Enter true or false.".into())
                }
            }
            BlockDef::Date { required } => match text_of(value) {
                Err(()) => fail("Enter a valid date.".into()),
                Ok(s) if s.is_empty() => {
                    if *required {
                        fail(REQUIRED.into())
                    }
                }
                Ok(s) if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_err() => {
                    fail("Enter a valid date.".into())
                }
                Ok(_) => {}
            },
            BlockDef::Time { required } => match text_of(value) {
                Err(()) => fail("Enter a valid time.".into()),
                Ok(s) if s.is_empty() => {
                    if *required {
                        fail(REQUIRED.into())
                    }
                }
                Ok(s) if parse_time(s).is_none() => fail("Enter a valid time.".into()),
                Ok(_) => {}
            },
            BlockDef::Choice {
                choices, required, ..
            } => match text_of(value) {
                Err(()) => fail("Expected text.".into()),
                Ok(s) if s.is_empty() => {
                    if *required {
                        fail(REQUIRED.into())
                    }
                }
                Ok(s) if !choices.contains(&s) => fail(format!(
                    "Select a valid choice. {} is not one of the available choices.",
                    s
                )),
                Ok(_) => {}
            },
            BlockDef::Image { required, .. } => match value {
                Value::Null if *required => fail(REQUIRED.into()),
                Value::Null => {}
                Value::Number(n) if n.as_i64().is_some_and(|id| id > 0) => {}
                _ => fail("Enter a valid image id.".into()),
            },
            BlockDef::Document { required } => match value {
                Value::Null if *required => fail(REQUIRED.into()),
                Value::Null => {}
                Value::Number(n) if n.as_i64().is_some_and(|id| id > 0) => {}
                _ => fail("Enter a valid document id.".into()),
            },
            BlockDef::Struct(def) => match value {
                Value::Object(map) => {
                    for (name, field) in &def.fields {
                        field.validate(
                            map.get(*name).unwrap_or(&Value::Null),
                            &join_field(path, name),
                            errors,
                        );
                    }
                }
                Value::Null => {
                    for (name, field) in &def.fields {
                        field.validate(&Value::Null, &join_field(path, name), errors);
                    }
                }
                _ => fail("Expected an object.".into()),
            },
            BlockDef::List(child) => match value {
                Value::Array(items) => {
                    for (i, item) in items.iter().enumerate() {
                        child.validate(item, &format!("{}[{}]", path, i), errors);
                    }
                }
                Value::Null => {}
                _ => fail("Expected a list.".into()),
            },
            BlockDef::Stream(def) => match value {
                Value::Array(items) if items.is_empty() && def.required => fail(REQUIRED.into()),
                Value::Array(items) => {
                    for (i, item) in items.iter().enumerate() {
                        let child_path = format!("{}[{}]", path, i);
                        def.validate_child(item, &child_path, errors);
                    }
                }
                Value::Null if def.required => fail(REQUIRED.into()),
                Value::Null => {}
                _ => fail("Expected a list of blocks.".into()),
            },
        }
    }

    /// Fill defaults, order struct fields and give every stream child an id.
    pub fn normalize(&self, value: Value) -> Value {
        match self {
            BlockDef::Char { default, .. } | BlockDef::Choice { default, .. } => match value {
                Value::Null => Value::String(default.unwrap_or_default().to_string()),
                other => other,
            },
            BlockDef::Text { .. }
            | BlockDef::RichText { .. }
            | BlockDef::RawHtml { .. }
            | BlockDef::Url { .. }
            | BlockDef::Email { .. } => match value {
                Value::Null => Value::String(String::new()),
                other => other,
            },
            BlockDef::Integer { default, .. } => match (value, default) {
                (Value::Null, Some(d)) => Value::from(*d),
                (other, _) => other,
            },
            BlockDef::Boolean { default } => match value {
                Value::Null => Value::Bool(*default),
                other => other,
            },
            BlockDef::Date { .. } | BlockDef::Time { .. } => match value {
                Value::String(s) if s.is_empty() => Value::Null,
                other => other,
            },
            BlockDef::Image { .. } | BlockDef::Document { .. } => value,
            BlockDef::Struct(def) => {
                let mut map = match value {
                    Value::Object(map) => map,
                    Value::Null => Map::new(),
                    other => return other,
                };
                let mut out = Map::new();
                for (name, field) in &def.fields {
                    let v = map.remove(*name).unwrap_or(Value::Null);
                    out.insert(name.to_string(), field.normalize(v));
                }
                out.extend(map);
                Value::Object(out)
            }
            BlockDef::List(child) => match value {
                Value::Array(items) => {
                    Value::Array(items.into_iter().map(|v| child.normalize(v)).collect())
                }
                Value::Null => Value::Array(Vec::new()),
                other => other,
            },
            BlockDef::Stream(def) => match value {
                Value::Array(items) => {
                    Value::Array(items.into_iter().map(|v| def.normalize_child(v)).collect())
                }
                Value::Null => Value::Array(Vec::new()),
                other => other,
            },
        }
    }

    /// Record every image and document id referenced by `value`.
    pub fn collect_media(&self, value: &Value, refs: &mut MediaRefs) {
        match self {
            BlockDef::Image { .. } => {
                if let Some(id) = value.as_i64() {
                    refs.images.insert(id);
                }
            }
            BlockDef::Document { .. } => {
                if let Some(id) = value.as_i64() {
                    refs.documents.insert(id);
                }
            }
            BlockDef::Struct(def) => {
                if let Value::Object(map) = value {
                    for (name, field) in &def.fields {
                        if let Some(v) = map.get(*name) {
                            field.collect_media(v, refs);
                        }
                    }
                }
            }
            BlockDef::List(child) => {
                if let Value::Array(items) = value {
                    for item in items {
                        child.collect_media(item, refs);
                    }
                }
            }
            BlockDef::Stream(def) => {
                if let Value::Array(items) = value {
                    for item in items {
                        let tagged = item
                            .get("type")
                            .and_then(Value::as_str)
                            .and_then(|t| def.child(t))
                            .zip(item.get("value"));
                        if let Some((child, v)) = tagged {
                            child.collect_media(v, refs);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Turn stored JSON into a [`BlockValue`], looking up media in `media`.
    ///
    /// References to missing media become null. Values that do not have the
    /// shape the schema expects are passed through untouched.
    pub fn resolve(&self, value: &Value, media: &MediaIndex) -> BlockValue {
        match self {
            BlockDef::Image { rendition, .. } => match value.as_i64().and_then(|id| media.image(id)) {
                Some(image) => BlockValue::Image {
                    image: image.clone(),
                    rendition: rendition.map(FilterSpec::from),
                },
                None if value.is_i64() => BlockValue::Scalar(Value::Null),
                None => BlockValue::Scalar(value.clone()),
            },
            BlockDef::Document { .. } => match value.as_i64().and_then(|id| media.document(id)) {
                Some(doc) => BlockValue::Document(doc.clone()),
                None if value.is_i64() => BlockValue::Scalar(Value::Null),
                None => BlockValue::Scalar(value.clone()),
            },
            BlockDef::Struct(def) => match value {
                Value::Object(map) => {
                    let mut fields: Vec<(String, BlockValue)> = def
                        .fields
                        .iter()
                        .map(|(name, field)| {
                            let v = map.get(*name).unwrap_or(&Value::Null);
                            (name.to_string(), field.resolve(v, media))
                        })
                        .collect();
                    fields.extend(
                        map.iter()
                            .filter(|(k, _)| def.field(k).is_none())
                            .map(|(k, v)| (k.clone(), BlockValue::Scalar(v.clone()))),
                    );
                    BlockValue::Struct(fields)
                }
                other => BlockValue::Scalar(other.clone()),
            },
            BlockDef::List(child) => match value {
                Value::Array(items) => {
                    BlockValue::List(items.iter().map(|v| child.resolve(v, media)).collect())
                }
                other => BlockValue::Scalar(other.clone()),
            },
            BlockDef::Stream(def) => match def.resolve(value, media) {
                Some(children) => BlockValue::Stream(children),
                None => BlockValue::Scalar(value.clone()),
            },
            _ => BlockValue::Scalar(value.clone()),
        }
    }
}

impl StructDef {
    pub fn field(&self, name: &str) -> Option<&BlockDef> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, d)| d)
    }
}

impl StreamDef {
    pub fn child(&self, block_type: &str) -> Option<&BlockDef> {
        self.children
            .iter()
            .find(|(n, _)| *n == block_type)
            .map(|(_, d)| d)
    }

    fn validate_child(&self, item: &Value, path: &str, errors: &mut Vec<ValidationError>) {
        let block_type = match item.get("type").and_then(Value::as_str) {
            Some(t) => t,
            None => {
                errors.push(ValidationError {
                    path: path.to_string(),
                    message: "Expected an object with a block type.".into(),
                });
                return;
            }
        };
        match self.child(block_type) {
            Some(child) => child.validate(item.get("value").unwrap_or(&Value::Null), path, errors),
            None => errors.push(ValidationError {
                path: path.to_string(),
                message: format!("Unknown block type '{}'.", block_type),
            }),
        }
    }

    fn normalize_child(&self, item: Value) -> Value {
        let mut map = match item {
            Value::Object(map) => map,
            other => return other,
        };
        let child = map
            .get("type")
            .and_then(Value::as_str)
            .and_then(|t| self.child(t));
        if let Some(child) = child {
            let value = map.remove("value").unwrap_or(Value::Null);
            map.insert("value".into(), child.normalize(value));
        }
        let has_id = map.get("id").and_then(Value::as_str).is_some_and(|id| !id.is_empty());
        if !has_id {
            map.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
        }
        Value::Object(map)
    }

    /// Resolve a stored stream. `None` if the value is not a list.
    pub fn resolve(&self, value: &Value, media: &MediaIndex) -> Option<Vec<StreamItem>> {
        let items = match value {
            Value::Array(items) => items,
            Value::Null => return Some(Vec::new()),
            _ => return None,
        };

        Some(
            items
                .iter()
                .map(|item| {
                    let Ok(raw) = serde_json::from_value::<StreamChild<Value>>(item.clone()) else {
                        return StreamItem::Raw(item.clone());
                    };
                    let value = match self.child(&raw.block_type) {
                        Some(child) => child.resolve(&raw.value, media),
                        None => BlockValue::Scalar(raw.value),
                    };
                    StreamItem::Block(StreamChild {
                        block_type: raw.block_type,
                        value,
                        id: raw.id,
                    })
                })
                .collect(),
        )
    }
}

const REQUIRED: &str = "This field is required.";

/// Blank values count as empty text.
fn text_of(value: &Value) -> Result<&str, ()> {
    match value {
        Value::Null => Ok(""),
        Value::String(s) => Ok(s.as_str()),
        _ => Err(()),
    }
}

fn join_field(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    ["%H:%M:%S", "%H:%M", "%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
}

/// Absolute URLs with a known scheme, or site-relative / fragment links.
pub fn is_valid_url(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    if s.starts_with('#') || (s.starts_with('/') && !s.starts_with("//")) {
        return true;
    }
    match url::Url::parse(s) {
        Ok(url) => {
            URL_SCHEMES.contains(&url.scheme())
                && (url.cannot_be_a_base() || url.host_str().is_some_and(|h| !h.is_empty()))
        }
        Err(_) => false,
    }
}

/// Validate and normalize a whole value in one step.
pub fn clean(def: &BlockDef, value: Value, path: &str) -> Result<Value, InvalidContent> {
    let mut errors = Vec::new();
    def.validate(&value, path, &mut errors);
    if !errors.is_empty() {
        return Err(InvalidContent(errors));
    }
    Ok(def.normalize(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn card() -> BlockDef {
        BlockDef::structure(
            "CardBlock",
            vec![
                ("title", BlockDef::char(10)),
                ("link", BlockDef::url().optional()),
                ("style", BlockDef::choice(&["a", "b"]).with_default("a")),
                ("order", BlockDef::integer().with_int_default(0)),
                ("photo", BlockDef::image().optional()),
            ],
        )
    }

    fn body() -> BlockDef {
        BlockDef::stream(vec![
            ("card", card()),
            ("cards", BlockDef::list(card())),
            ("file", BlockDef::document()),
            ("text", BlockDef::rich_text()),
        ])
        .optional()
    }

    fn errors_for(def: &BlockDef, value: Value) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        def.validate(&value, "body", &mut errors);
        errors
    }

    fn image(id: i64) -> Image {
        Image {
            id,
            title: "Logo".into(),
            file: "original_images/logo.png".into(),
            width: 800,
            height: 600,
            file_size: Some(1000),
            file_hash: String::new(),
            tags: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_validation_reports_paths() {
        let errors = errors_for(
            &body(),
            json!([
                {"type": "card", "value": {"title": "far too long a title", "style": "c"}},
                {"type": "cards", "value": [{"title": "ok"}, {"title": ""}]},
                {"type": "nope", "value": 1},
            ]),
        );
        let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "body[0].title: Ensure this value has at most 10 characters (it has 20).",
                "body[0].style: Select a valid choice. c is not one of the available choices.",
                "body[1][1].title: This field is required.",
                "body[2]: Unknown block type 'nope'.",
            ]
        );
    }

    #[test]
    fn test_required_and_optional_streams() {
        assert!(errors_for(&body(), json!([])).is_empty());
        assert!(errors_for(&body(), Value::Null).is_empty());

        let required = BlockDef::stream(vec![("text", BlockDef::rich_text())]);
        assert_eq!(errors_for(&required, json!([]))[0].message, REQUIRED);
    }

    #[test]
    fn test_url_and_email_validation() {
        assert!(is_valid_url("https://example.com/register"));
        assert!(is_valid_url("mailto:info@example.com"));
        assert!(is_valid_url("#volunteer"));
        assert!(is_valid_url("/events/"));
        assert!(!is_valid_url("//evil.example"));
        assert!(!is_valid_url("javascript:alert(1)"));
        assert!(!is_valid_url("not a url"));

        let email = BlockDef::email().optional();
        assert!(errors_for(&email, json!("team@arc.example")).is_empty());
        assert!(errors_for(&email, json!("")).is_empty());
        assert_eq!(errors_for(&email, json!("team@")).len(), 1);
    }

    #[test]
    fn test_date_time_validation() {
        assert!(errors_for(&BlockDef::date(), json!("2025-05-17")).is_empty());
        assert_eq!(errors_for(&BlockDef::date(), json!("17/05/2025")).len(), 1);
        assert!(errors_for(&BlockDef::time(), json!("09:30")).is_empty());
        assert!(errors_for(&BlockDef::time(), json!("09:30:15")).is_empty());
        assert_eq!(errors_for(&BlockDef::time(), json!("9.30am")).len(), 1);
    }

    #[test]
    fn test_normalize_fills_defaults_and_ids() {
        let value = body().normalize(json!([
            {"type": "card", "value": {"title": "Hi", "extra": true}},
            {"type": "text", "value": "<p>x</p>", "id": "keep-me"},
        ]));

        let first = &value[0];
        assert!(uuid::Uuid::parse_str(first["id"].as_str().unwrap()).is_ok());
        assert_eq!(
            first["value"],
            json!({"title": "Hi", "link": "", "style": "a", "order": 0, "photo": null, "extra": true})
        );
        let keys: Vec<&String> = first["value"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["title", "link", "style", "order", "photo", "extra"]);
        assert_eq!(value[1]["id"], "keep-me");
    }

    #[test]
    fn test_clean_rejects_invalid_content() {
        let err = clean(&card(), json!({"title": 5}), "card").unwrap_err();
        assert_eq!(err.to_string(), "invalid content: card.title: Expected text.");
    }

    #[test]
    fn test_collect_media() {
        let mut refs = MediaRefs::default();
        body().collect_media(
            &json!([
                {"type": "card", "value": {"title": "a", "photo": 3}},
                {"type": "cards", "value": [{"title": "b", "photo": 4}, {"title": "c", "photo": null}]},
                {"type": "file", "value": 9},
                {"type": "unknown", "value": 99},
            ]),
            &mut refs,
        );
        assert_eq!(refs.images.into_iter().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(refs.documents.into_iter().collect::<Vec<_>>(), vec![9]);
    }

    #[test]
    fn test_resolve_media_and_missing_references() {
        let index = MediaIndex::new(vec![image(3)], vec![]);
        let resolved = body().resolve(
            &json!([
                {"type": "card", "value": {"title": "a", "photo": 3}, "id": "x"},
                {"type": "card", "value": {"title": "b", "photo": 42}},
                {"type": "file", "value": 7},
            ]),
            &index,
        );

        let BlockValue::Stream(items) = resolved else {
            panic!("expected a stream");
        };
        let children: Vec<&StreamChild<BlockValue>> = items
            .iter()
            .map(|item| match item {
                StreamItem::Block(child) => child,
                StreamItem::Raw(v) => panic!("unexpected raw entry {}", v),
            })
            .collect();
        assert_eq!(children[0].id.as_deref(), Some("x"));
        let BlockValue::Struct(fields) = &children[0].value else {
            panic!("expected a struct");
        };
        assert_eq!(fields[4].0, "photo");
        assert!(matches!(&fields[4].1, BlockValue::Image { image, rendition: None } if image.id == 3));

        let BlockValue::Struct(fields) = &children[1].value else {
            panic!("expected a struct");
        };
        assert_eq!(fields[4].1, BlockValue::Scalar(Value::Null));
        assert_eq!(children[2].value, BlockValue::Scalar(Value::Null));
    }

    #[test]
    fn test_malformed_child_does_not_hide_its_siblings() {
        let index = MediaIndex::new(vec![image(3)], vec![]);
        let resolved = body().resolve(
            &json!([
                {"type": 5, "value": {"photo": 3}},
                {"type": "card", "value": {"title": "a", "photo": 3}, "id": "x"},
                "stray",
            ]),
            &index,
        );

        let BlockValue::Stream(items) = resolved else {
            panic!("expected a stream");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], StreamItem::Raw(json!({"type": 5, "value": {"photo": 3}})));
        assert_eq!(items[2], StreamItem::Raw(json!("stray")));
        let StreamItem::Block(child) = &items[1] else {
            panic!("expected a block");
        };
        let BlockValue::Struct(fields) = &child.value else {
            panic!("expected a struct");
        };
        assert!(matches!(&fields[4].1, BlockValue::Image { image, .. } if image.id == 3));
    }

    #[test]
    fn test_resolve_passes_through_unexpected_shapes() {
        let index = MediaIndex::default();
        let odd = json!({"not": "a stream"});
        assert_eq!(body().resolve(&odd, &index), BlockValue::Scalar(odd.clone()));
        assert_eq!(card().resolve(&json!("text"), &index), BlockValue::Scalar(json!("text")));
    }
}
