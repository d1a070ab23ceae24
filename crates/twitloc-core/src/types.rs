//! # Wire Types
//!
//! JSON shapes exchanged with the localization backend.
//!
//! The backend owns these records and may add fields at any time, so every
//! record keeps unknown fields verbatim in an `extra` map instead of
//! rejecting them. Only the fields the client actually reads are typed.
//!
//! Records decode field by field. A typed field holding a value of another
//! shape reads as absent (or empty) and never fails the surrounding
//! response; optional fields keep that value in `extra` under its key.

use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

// =============================================================================
// METAMODEL STATUS
// =============================================================================

/// Status literal of a metamodel that is not loaded.
pub const STATUS_OFFLINE: &str = "offline";

/// Status literal of a metamodel whose build is running.
pub const STATUS_BUILDING: &str = "building";

/// Status literal of a metamodel that accepts localization jobs.
pub const STATUS_ONLINE: &str = "online";

/// Status literal of a metamodel whose last build failed.
pub const STATUS_ERROR: &str = "error";

/// Status record of a single metamodel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetamodelState {
    /// Lifecycle status (`offline`, `building`, `online`, `error`).
    /// Empty when the backend sent no string.
    pub status: String,

    /// Name echoed back by the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metamodel: Option<String>,

    /// Failure description when `status` is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Any other server-defined field.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MetamodelState {
    /// Create a record with only a status.
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Self::default()
        }
    }

    /// Whether the metamodel accepts localization jobs.
    pub fn is_online(&self) -> bool {
        self.status == STATUS_ONLINE
    }

    /// Decode a record from any JSON value. A non-object yields an empty record.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self::default();
        };
        Self {
            status: take_text(&mut fields, "status"),
            metamodel: take_optional(&mut fields, "metamodel"),
            error: take_optional(&mut fields, "error"),
            extra: fields,
        }
    }
}

impl<'de> Deserialize<'de> for MetamodelState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

/// Metamodel name -> status record, in the order the server listed them.
///
/// Decoded from a JSON object. Key order is kept as received so that
/// listings follow the server's ordering. A repeated key overwrites the
/// earlier value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetamodelStatus {
    entries: Vec<(String, MetamodelState)>,
}

impl MetamodelStatus {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a record. Overwriting keeps the existing position.
    pub fn insert(&mut self, name: impl Into<String>, state: MetamodelState) -> Option<MetamodelState> {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, state)),
            None => {
                self.entries.push((name, state));
                None
            }
        }
    }

    /// Lookup a record by metamodel name.
    pub fn get(&self, name: &str) -> Option<&MetamodelState> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, state)| state)
    }

    /// Metamodel names in server order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Status records in server order.
    pub fn states(&self) -> impl Iterator<Item = &MetamodelState> {
        self.entries.iter().map(|(_, state)| state)
    }

    /// `(name, record)` pairs in server order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetamodelState)> {
        self.entries.iter().map(|(key, state)| (key.as_str(), state))
    }

    /// Number of metamodels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no metamodel is listed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, MetamodelState)> for MetamodelStatus {
    fn from_iter<I: IntoIterator<Item = (String, MetamodelState)>>(iter: I) -> Self {
        let mut status = Self::new();
        for (name, state) in iter {
            status.insert(name, state);
        }
        status
    }
}

impl Serialize for MetamodelStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, state) in &self.entries {
            map.serialize_entry(name, state)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MetamodelStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatusVisitor;

        impl<'de> Visitor<'de> for StatusVisitor {
            type Value = MetamodelStatus;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping metamodel names to status records")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut status = MetamodelStatus::new();
                while let Some((name, state)) = access.next_entry::<String, MetamodelState>()? {
                    status.insert(name, state);
                }
                Ok(status)
            }
        }

        deserializer.deserialize_map(StatusVisitor)
    }
}

// =============================================================================
// LOCALIZATIONS
// =============================================================================

/// A single localization job as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Localization {
    /// Twitter screen name being localized.
    pub screen_name: String,

    /// Metamodel the job runs against.
    pub metamodel_name: String,

    /// Classification result. Absent while the job is pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_swiss: Option<bool>,

    /// Classifier confidence. Absent while the job is pending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Position of the job inside its bucket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,

    /// Any other server-defined field.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Localization {
    /// Create a pending job descriptor.
    pub fn pending(screen_name: impl Into<String>, metamodel_name: impl Into<String>) -> Self {
        Self {
            screen_name: screen_name.into(),
            metamodel_name: metamodel_name.into(),
            ..Self::default()
        }
    }

    /// Decode a job from any JSON value. A non-object yields an empty job.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self::default();
        };
        Self {
            screen_name: take_text(&mut fields, "screenName"),
            metamodel_name: take_text(&mut fields, "metamodelName"),
            is_swiss: take_loose_bool(&mut fields, "isSwiss"),
            confidence: take_optional(&mut fields, "confidence"),
            index: take_optional(&mut fields, "index"),
            extra: fields,
        }
    }
}

impl<'de> Deserialize<'de> for Localization {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

/// The three localization buckets, each in server order.
///
/// A bucket that is missing or not an array decodes as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalizationBuckets {
    #[serde(default, deserialize_with = "deserialize_jobs")]
    pub complete: Vec<Localization>,
    #[serde(default, deserialize_with = "deserialize_jobs")]
    pub pending: Vec<Localization>,
    #[serde(default, deserialize_with = "deserialize_jobs")]
    pub failed: Vec<Localization>,
}

impl LocalizationBuckets {
    /// Number of jobs across all buckets.
    pub fn total(&self) -> usize {
        self.complete.len() + self.pending.len() + self.failed.len()
    }

    /// Whether every bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

fn deserialize_jobs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Localization>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items.into_iter().map(Localization::from_value).collect(),
        _ => Vec::new(),
    })
}

// =============================================================================
// STATISTICS
// =============================================================================

/// Dataset counters served by `/statistics`.
///
/// All counters are optional: the record is server-defined and the client
/// only displays what it gets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tvt_users_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tvt_swiss_users_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tweets_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub influencers_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_influencers_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sports_influencers_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub politics_influencers_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_influencers_count: Option<u64>,

    /// Any other server-defined field.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl<'de> Deserialize<'de> for Statistics {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Self {
            users_count: take_optional(&mut fields, "usersCount"),
            tvt_users_count: take_optional(&mut fields, "tvtUsersCount"),
            tvt_swiss_users_count: take_optional(&mut fields, "tvtSwissUsersCount"),
            tweets_count: take_optional(&mut fields, "tweetsCount"),
            influencers_count: take_optional(&mut fields, "influencersCount"),
            media_influencers_count: take_optional(&mut fields, "mediaInfluencersCount"),
            sports_influencers_count: take_optional(&mut fields, "sportsInfluencersCount"),
            politics_influencers_count: take_optional(&mut fields, "politicsInfluencersCount"),
            other_influencers_count: take_optional(&mut fields, "otherInfluencersCount"),
            extra: fields,
        })
    }
}

impl Statistics {
    /// Known counters with a display label, in a fixed order.
    pub fn counters(&self) -> [(&'static str, Option<u64>); 9] {
        [
            ("Users", self.users_count),
            ("Labelled users", self.tvt_users_count),
            ("Labelled Swiss users", self.tvt_swiss_users_count),
            ("Tweets", self.tweets_count),
            ("Influencers", self.influencers_count),
            ("Media influencers", self.media_influencers_count),
            ("Sports influencers", self.sports_influencers_count),
            ("Politics influencers", self.politics_influencers_count),
            ("Other influencers", self.other_influencers_count),
        ]
    }
}

// =============================================================================
// FIELD DECODING
// =============================================================================

/// Remove `key` as text. Anything but a string reads as empty.
fn take_text(fields: &mut Map<String, Value>, key: &str) -> String {
    match fields.remove(key) {
        Some(Value::String(text)) => text,
        _ => String::new(),
    }
}

/// Remove `key` as a `T`. A value of another shape goes back into `fields`.
fn take_optional<T: DeserializeOwned>(fields: &mut Map<String, Value>, key: &str) -> Option<T> {
    let raw = fields.remove(key)?;
    if raw.is_null() {
        return None;
    }
    match T::deserialize(&raw) {
        Ok(value) => Some(value),
        Err(_) => {
            fields.insert(key.to_owned(), raw);
            None
        }
    }
}

/// Remove `key` as `true`, `false`, `"true"` or `"false"`.
///
/// The backend reports failed jobs with a JSON boolean but finished jobs
/// with the strings `"true"` / `"false"`. Any other value goes back into
/// `fields`.
fn take_loose_bool(fields: &mut Map<String, Value>, key: &str) -> Option<bool> {
    match fields.remove(key)? {
        Value::Null => None,
        Value::Bool(value) => Some(value),
        Value::String(text) if text == "true" => Some(true),
        Value::String(text) if text == "false" => Some(false),
        other => {
            fields.insert(key.to_owned(), other);
            None
        }
    }
}

// =============================================================================
// REQUEST BODIES
// =============================================================================

/// Body of `POST /buildmetamodel`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetamodelRequest {
    pub metamodel: String,
}

impl BuildMetamodelRequest {
    /// Request a build of `metamodel`.
    pub fn new(metamodel: impl Into<String>) -> Self {
        Self {
            metamodel: metamodel.into(),
        }
    }
}

/// Body of `POST /localize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizeRequest {
    pub screen_name: String,
    pub metamodel: String,
}

impl LocalizeRequest {
    /// Request the localization of `screen_name` with `metamodel`.
    pub fn new(screen_name: impl Into<String>, metamodel: impl Into<String>) -> Self {
        Self {
            screen_name: screen_name.into(),
            metamodel: metamodel.into(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
