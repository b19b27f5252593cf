use core::fmt;

/// The error type for parsing of segment headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An incoming segment could not be parsed because it was shorter than assumed.
    ///
    /// The buffer may be shorter than the fixed header or than the header length it claims, or an
    /// option extends past the end of the option space.
    Truncated,

    /// An incoming segment had an incorrect checksum and was dropped.
    WrongChecksum,

    /// An incoming segment was recognized but was self-contradictory.
    ///
    /// Examples: a header length below 20 octets, a zero port, an MSS option of the wrong size.
    Malformed,

    /// A header requested a feature this implementation does not provide.
    Unsupported,
}

/// The result type for the wire module.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Truncated     => write!(f, "truncated segment"),
            Error::WrongChecksum => write!(f, "checksum error"),
            Error::Malformed     => write!(f, "malformed segment"),
            Error::Unsupported   => write!(f, "unsupported option"),
        }
    }
}
