//! The process logic of the protocol layers.
//!
//! The `wire` module knows how a segment looks, this module knows what to do with it. Everything
//! below TCP is delegated: the network interface frames and unframes IP datagrams while a
//! [`Resolver`] turns host names and addresses into link level destinations. The [`tcp`] module
//! holds the connection state machines and the socket interface on top of them.
//!
//! ## Errors
//!
//! Operations report failure with a small set of coarse [`Error`] kinds. Protocol violations of a
//! peer are never errors: such segments are answered or dropped as TCP requires and the caller
//! only observes their effect on the connection state.
//!
//! [`Resolver`]: resolve/trait.Resolver.html
//! [`tcp`]: tcp/index.html
//! [`Error`]: enum.Error.html
use core::fmt;

use crate::storage::Medium;

pub mod resolve;
pub mod tcp;

/// The result type of layer operations.
pub type Result<T> = core::result::Result<T, Error>;

/// The ways an operation of a layer can fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// The operation was not permitted.
    ///
    /// Returned when a socket handle does not refer to a socket or when the socket is not in a
    /// state that allows the operation.
    Illegal,

    /// A size requested from a buffer can not be fulfilled.
    ///
    /// In contrast to `Illegal` this signals that a different size may be possible.
    BadSize,

    /// Unable to find a route towards the destination.
    Unreachable,

    /// The action could not be completed because there were not enough resources.
    ///
    /// The main difference towards `Illegal` is that it would have been legal with more
    /// resources, for example a free socket.
    Exhausted,

    /// The configured sockets need more memory than a medium provides.
    Overcommitted(Medium),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Illegal => f.write_str("operation not permitted"),
            Error::BadSize => f.write_str("buffer size can not be fulfilled"),
            Error::Unreachable => f.write_str("destination unreachable"),
            Error::Exhausted => f.write_str("resources exhausted"),
            Error::Overcommitted(medium) => write!(f, "{} memory overcommitted", medium),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// The outcome of a cooperative operation.
///
/// No operation blocks. When nothing could be done the caller is told why and is expected to try
/// again on a later iteration of its main loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status<T> {
    /// The operation made progress.
    Done(T),
    /// Nothing to work on yet, for example no readable bytes or no pending segment.
    NeedMoreData,
    /// No room to make progress, for example a full transmit buffer.
    WouldBlock,
}

impl<T> Status<T> {
    /// The value of a completed operation.
    pub fn done(self) -> Option<T> {
        match self {
            Status::Done(t) => Some(t),
            _ => None,
        }
    }

    /// Whether the operation made progress.
    pub fn is_done(&self) -> bool {
        match self {
            Status::Done(_) => true,
            _ => false,
        }
    }
}

/// Can convert from a wire error.
///
/// This indicates some layer tried to operate on a segment but failed.
impl From<crate::wire::Error> for Error {
    fn from(_: crate::wire::Error) -> Self {
        Error::Illegal
    }
}
