//! The identity payload carried by every record version.

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::Date;

use crate::error::CoreError;
use crate::hash::AttachmentHash;
use crate::record::LinearId;

/// A document attached to an identity, referenced by content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub name: String,
    #[serde(default)]
    pub secure_hash: Option<AttachmentHash>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Document {
    pub fn new(name: impl Into<String>, secure_hash: AttachmentHash) -> Self {
        Self {
            name: name.into(),
            secure_hash: Some(secure_hash),
            active: true,
        }
    }
}

/// Business payload of an identity record.
///
/// `id_no` is the natural business key; the record's [`LinearId`] is
/// derived from it. `stakeholders` holds the names of the other parties the
/// record should be shared with, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id_no: String,
    #[serde(default)]
    pub name: String,
    #[serde(with = "iso_date")]
    pub dob: Date,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone_no: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub passport_no: String,
    #[serde(default, alias = "participants")]
    pub stakeholders: Vec<String>,
    #[serde(default)]
    pub documents: Option<Vec<Document>>,
}

impl Identity {
    pub fn business_key(&self) -> &str {
        &self.id_no
    }

    pub fn linear_id(&self) -> LinearId {
        LinearId::from_business_key(&self.id_no)
    }

    pub fn documents(&self) -> &[Document] {
        self.documents.as_deref().unwrap_or(&[])
    }

    /// Hashes of documents that are active and have been uploaded.
    pub fn active_attachments(&self) -> impl Iterator<Item = AttachmentHash> + '_ {
        self.documents()
            .iter()
            .filter(|d| d.active)
            .filter_map(|d| d.secure_hash)
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<Date, CoreError> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).map_err(|e| {
        CoreError::InvalidDate {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Format a date as `YYYY-MM-DD`.
pub fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

mod iso_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_date(&s).map_err(serde::de::Error::custom)
    }
}
