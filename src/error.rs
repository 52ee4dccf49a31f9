use thiserror::Error;

/// Failures while decoding an ELF file or one of its embedded tables.
///
/// Only the envelope errors abort the whole run: a report that hits a
/// `Structural`, `Io`, or `Resource` error is dropped with a diagnostic and
/// the remaining reports still run. Recoverable oddities (bad indices,
/// duplicate tables, unknown type codes) are not errors at all; they are
/// downgraded to placeholders plus a `utils::warn` at the point of occurrence.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The first four bytes are not the ELF magic.
    #[error("not an ELF file (bad magic)")]
    BadMagic,

    /// The file declares 64-bit records but this host cannot represent them.
    #[error("64-bit ELF file is not supported on this host")]
    UnsupportedWidth,

    /// A declared length, count, or terminator does not match the bytes
    /// actually present.
    #[error("{0}")]
    Structural(String),

    /// A read or seek past the end of the mapped file.
    #[error("{0}")]
    Io(String),

    /// A record count too large to allocate for.
    #[error("{0}")]
    Resource(String),
}
