// src/record.rs
//! # Record
//!
//! One normalized post as it lives in a community collection file. Field names
//! on disk follow the platform's listing schema (`selftext`, `ups`,
//! `num_comments`, ...) so collections written by earlier tooling stay readable.
//! Fields this crate does not know about are carried through untouched in
//! [`Record::extra`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Ratio assumed when the platform did not report one.
pub const DEFAULT_UPVOTE_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(rename = "selftext", default, deserialize_with = "lenient_string")]
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "subreddit", default, deserialize_with = "lenient_string")]
    pub source_community: String,
    #[serde(rename = "ups", default, deserialize_with = "lenient_int")]
    pub upvotes: i64,
    #[serde(rename = "downs", default, deserialize_with = "lenient_int")]
    pub downvotes: i64,
    #[serde(default, deserialize_with = "lenient_int")]
    pub score: i64,
    #[serde(default, deserialize_with = "lenient_ratio")]
    pub upvote_ratio: Option<f64>,
    #[serde(rename = "num_comments", default, deserialize_with = "lenient_int")]
    pub comment_count: i64,
    /// Seconds since epoch, UTC.
    #[serde(rename = "created_utc", default, deserialize_with = "lenient_float")]
    pub created_at: f64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub author: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub permalink: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub domain: String,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_self: bool,
    #[serde(rename = "over_18", default, deserialize_with = "lenient_bool")]
    pub nsfw: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub spoiler: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub locked: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub stickied: bool,

    #[serde(
        rename = "first_saved",
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub first_saved_at: Option<DateTime<Utc>>,
    #[serde(
        rename = "last_updated",
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_updated_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    /// Minimal record; everything but the identity and text defaulted.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            body: String::new(),
            url: None,
            source_community: String::new(),
            upvotes: 0,
            downvotes: 0,
            score: 0,
            upvote_ratio: None,
            comment_count: 0,
            created_at: 0.0,
            author: String::new(),
            permalink: String::new(),
            domain: String::new(),
            is_self: false,
            nsfw: false,
            spoiler: false,
            locked: false,
            stickied: false,
            first_saved_at: None,
            last_updated_at: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn upvote_ratio_or_default(&self) -> f64 {
        self.upvote_ratio.unwrap_or(DEFAULT_UPVOTE_RATIO)
    }

    /// Creation time as a UTC datetime, if it is representable.
    pub fn created_datetime(&self) -> Option<DateTime<Utc>> {
        if !self.created_at.is_finite() {
            return None;
        }
        DateTime::from_timestamp(self.created_at.trunc() as i64, 0)
    }

    /// True when any field that tracks live engagement or edited text differs.
    /// URL and permalink changes alone do not count.
    pub fn volatile_fields_differ(&self, other: &Record) -> bool {
        self.title != other.title
            || self.body != other.body
            || self.score != other.score
            || self.upvotes != other.upvotes
            || self.comment_count != other.comment_count
            || self.upvote_ratio != other.upvote_ratio
    }

    /// Overlay `incoming` onto `self`, keeping local bookkeeping from `self`
    /// and merging unknown fields (incoming wins on key clashes).
    pub fn overlay(&mut self, incoming: Record, now: DateTime<Utc>) {
        let first_saved_at = self.first_saved_at;
        let mut extra = std::mem::take(&mut self.extra);
        let mut incoming = incoming;
        extra.extend(std::mem::take(&mut incoming.extra));

        *self = incoming;
        self.extra = extra;
        self.first_saved_at = first_saved_at;
        self.last_updated_at = Some(now);
    }
}

/// Accepts RFC 3339 or a naive ISO timestamp (read as UTC); anything else is
/// dropped rather than failing the whole line.
fn lenient_timestamp<'de, D>(d: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.and_then(|s| parse_timestamp(&s)))
}

// Older collections carry floats for counters, nulls for deleted fields and
// the odd stringified number. None of that may cost the record its line.

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

fn lenient_int<'de, D>(d: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    if let Some(i) = v.as_i64() {
        return Ok(i);
    }
    Ok(as_f64(&v).filter(|f| f.is_finite()).map_or(0, |f| f.trunc() as i64))
}

fn lenient_float<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(as_f64(&v).filter(|f| f.is_finite()).unwrap_or(0.0))
}

fn lenient_ratio<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(d)?;
    Ok(as_f64(&v).filter(|f| f.is_finite()))
}

fn lenient_bool<'de, D>(d: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn lenient_id<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unusable id {other}"))),
    }
}

fn lenient_string<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|n| n.and_utc())
}
