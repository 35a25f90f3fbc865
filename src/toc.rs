use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use chrono::format::SecondsFormat;
use chrono::DateTime;
use chrono::Utc;
use serde::ser::SerializeStruct;
use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;

use crate::ChecksumAlgo;
use crate::Error;
use crate::Result;
use crate::Sha1Digest;

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename = "xar")]
pub struct Xar {
    pub toc: Toc,
}

impl Xar {
    /// Serialize to the on-wire XML document, declaration included.
    pub fn to_xml(&self) -> Result<String> {
        let mut xml = String::new();
        xml.push_str(XML_DECLARATION);
        quick_xml::se::to_writer(&mut xml, self).map_err(|e| Error::Xml(e.to_string()))?;
        Ok(xml)
    }

    /// Parse a table-of-contents document.
    pub fn from_xml(text: &str) -> Result<Self> {
        quick_xml::de::from_str(text).map_err(|e| Error::Xml(e.to_string()))
    }
}

/// The table of contents.
///
/// Child element order is part of the wire contract: creation time, checksum,
/// then the signing block when present, then the file forest.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename = "toc", rename_all = "kebab-case")]
pub struct Toc {
    #[serde(default)]
    pub creation_time: Timestamp,
    pub checksum: TocChecksum,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_creation_time: Option<SignatureTimestamp>,
    #[serde(rename = "signature", default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureInfo>,
    #[serde(rename = "file", default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<TocFile>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename = "checksum")]
pub struct TocChecksum {
    #[serde(rename = "@style")]
    pub algo: ChecksumAlgo,
    pub size: u64,
    pub offset: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
#[serde(rename = "file")]
pub struct TocFile {
    #[serde(rename = "@id")]
    pub id: u64,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: EntryKind,
    #[serde(rename = "file", default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
}

#[derive(
    Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default,
)]
pub enum EntryKind {
    #[default]
    #[serde(rename = "file")]
    File,
    #[serde(rename = "directory")]
    Directory,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
#[serde(rename = "data", rename_all = "kebab-case")]
pub struct Data {
    pub offset: u64,
    pub size: u64,
    pub length: u64,
    pub archived_checksum: FileChecksum,
    pub extracted_checksum: FileChecksum,
    pub encoding: Encoding,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
#[serde(rename = "encoding")]
pub struct Encoding {
    #[serde(rename = "@style")]
    pub style: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct FileChecksum {
    #[serde(rename = "@style")]
    pub algo: ChecksumAlgo,
    #[serde(rename = "$value")]
    pub value: Sha1Digest,
}

impl From<Sha1Digest> for FileChecksum {
    fn from(other: Sha1Digest) -> Self {
        Self {
            algo: ChecksumAlgo::Sha1,
            value: other,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename = "signature")]
pub struct SignatureInfo {
    #[serde(rename = "@style")]
    pub style: String,
    pub offset: u64,
    pub size: u64,
    #[serde(rename = "KeyInfo")]
    pub key_info: KeyInfo,
}

#[derive(Deserialize, Debug)]
#[serde(rename = "KeyInfo")]
pub struct KeyInfo {
    #[serde(rename = "X509Data")]
    pub data: X509Data,
}

impl Serialize for KeyInfo {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("KeyInfo", 2)?;
        state.serialize_field("@xmlns", XMLDSIG_NAMESPACE)?;
        state.serialize_field("X509Data", &self.data)?;
        state.end()
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename = "X509Data")]
pub struct X509Data {
    #[serde(
        rename = "X509Certificate",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub certificates: Vec<X509Certificate>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename = "X509Certificate")]
pub struct X509Certificate {
    #[serde(rename = "$value")]
    pub data: String,
}

/// An instant rendered as an RFC-3339 UTC timestamp with second precision.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(pub SystemTime);

impl From<Timestamp> for String {
    fn from(other: Timestamp) -> String {
        let date_time: DateTime<Utc> = other.0.into();
        date_time.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl TryFrom<String> for Timestamp {
    type Error = Error;
    fn try_from(other: String) -> Result<Self> {
        let Ok(t) = DateTime::parse_from_rfc3339(&other) else {
            return Ok(Default::default());
        };
        Ok(Self(t.to_utc().into()))
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self(UNIX_EPOCH)
    }
}

/// An instant rendered as decimal seconds since 2001-01-01T00:00:00Z, the
/// convention Apple tooling uses for signature creation times. One decimal
/// digit of precision, always printed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(try_from = "String", into = "String")]
pub struct SignatureTimestamp(pub f64);

impl SignatureTimestamp {
    pub fn now() -> Self {
        let unix_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as i64;
        Self((unix_millis - APPLE_EPOCH_UNIX_MILLIS) as f64 / 1000.0)
    }
}

impl From<SignatureTimestamp> for String {
    fn from(other: SignatureTimestamp) -> String {
        format!("{:.1}", other.0)
    }
}

impl TryFrom<String> for SignatureTimestamp {
    type Error = Error;
    fn try_from(other: String) -> Result<Self> {
        other
            .trim()
            .parse::<f64>()
            .map(Self)
            .map_err(|_| Error::InvalidInput(format!("invalid signature timestamp {:?}", other)))
    }
}

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;
const XMLDSIG_NAMESPACE: &str = "http://www.w3.org/2000/09/xmldsig";
const APPLE_EPOCH_UNIX_MILLIS: i64 = 978_307_200_000;
