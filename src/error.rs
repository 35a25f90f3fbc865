use thiserror::Error;

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors propagated to the caller. None are recovered internally.
#[derive(Debug, Error)]
pub enum Error {
    /// A file node is missing a name or source path, or a payload's declared
    /// size does not match the bytes actually read.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// PEM text contains no section with the requested name, or the section
    /// body is empty.
    #[error("no {0} section found in PEM text")]
    MissingPemSection(String),

    /// The private key PEM cannot be parsed as PKCS#1 or PKCS#8.
    #[error("cannot parse RSA private key: {0}")]
    InvalidPrivateKey(String),

    /// The signing primitive failed or produced an unexpected length.
    #[error("signing failed: {0}")]
    SignFailed(String),

    /// The deflate primitive reported an error.
    #[error("deflate error: {0}")]
    Compression(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The computed table-of-contents checksum differs from the stored one.
    #[error("table of contents checksum mismatch")]
    ChecksumMismatch,

    /// The decompressed table of contents is not the length the header declares.
    #[error("table of contents length mismatch: header says {expected}, got {actual}")]
    TocLengthMismatch { expected: u64, actual: u64 },

    #[error("not a xar file")]
    InvalidMagic,

    #[error("header too small: {0} bytes")]
    HeaderTooSmall(u16),

    #[error("unsupported checksum algorithm: {0}")]
    UnsupportedChecksumAlgo(u32),

    #[error("cannot serialize table of contents: {0}")]
    Xml(String),
}
