use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use base16ct::HexDisplay;
use digest::Digest;
use serde::Deserialize;
use serde::Serialize;
use sha1::Sha1;

use crate::Error;

/// Checksum algorithm as encoded in the archive header.
///
/// The format defines more algorithms; the archives produced and consumed
/// here standardize on SHA-1, so everything else is rejected on read.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(test, derive(arbitrary::Arbitrary))]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum ChecksumAlgo {
    #[default]
    Sha1 = 1,
}

impl ChecksumAlgo {
    /// Get hash size in bytes.
    pub fn hash_len(self) -> usize {
        match self {
            Self::Sha1 => SHA1_LEN,
        }
    }
}

impl From<ChecksumAlgo> for u32 {
    fn from(other: ChecksumAlgo) -> u32 {
        other as u32
    }
}

impl TryFrom<u32> for ChecksumAlgo {
    type Error = Error;
    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Sha1),
            _ => Err(Error::UnsupportedChecksumAlgo(code)),
        }
    }
}

/// A SHA-1 digest.
///
/// The raw 20 bytes go into the heap, the lowercase hex form into the
/// table of contents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(test, derive(arbitrary::Arbitrary))]
#[serde(into = "String", try_from = "String")]
pub struct Sha1Digest([u8; SHA1_LEN]);

impl Sha1Digest {
    /// Digest size in bytes.
    pub const LEN: usize = SHA1_LEN;

    /// Hash the data.
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha1::digest(data).into())
    }
}

impl FromStr for Sha1Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 2 * SHA1_LEN {
            return Err(Error::InvalidInput(format!("invalid sha1 string {:?}", s)));
        }
        let mut bytes = [0_u8; SHA1_LEN];
        base16ct::mixed::decode(s, &mut bytes[..])
            .map_err(|_| Error::InvalidInput(format!("invalid sha1 string {:?}", s)))?;
        Ok(Self(bytes))
    }
}

impl Display for Sha1Digest {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{:x}", HexDisplay(&self.0[..]))
    }
}

impl TryFrom<String> for Sha1Digest {
    type Error = Error;
    fn try_from(other: String) -> Result<Self, Self::Error> {
        other.as_str().parse()
    }
}

impl From<Sha1Digest> for String {
    fn from(other: Sha1Digest) -> String {
        base16ct::lower::encode_string(&other.0)
    }
}

impl AsRef<[u8]> for Sha1Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

const SHA1_LEN: usize = 20;
