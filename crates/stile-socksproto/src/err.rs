//! Declare an error type for stile_socksproto.
use thiserror::Error;

/// An error that occurs while negotiating a SOCKS handshake.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Tried to handle a message that wasn't complete: try again with
    /// more input.
    #[error("message truncated; need to wait for more")]
    Truncated,

    /// The client didn't implement SOCKS correctly.
    #[error("SOCKS protocol syntax violation")]
    Syntax,

    /// The client declared a protocol version number that isn't one we
    /// support.  More likely than not, somebody is pointing a
    /// non-SOCKS program at this port.
    #[error("unrecognized SOCKS protocol version {0}")]
    BadProtocol(u8),

    /// The client began an HTTP request on this port.  There is no
    /// HTTP proxy behind it.
    #[error("HTTP proxying requested, but not implemented")]
    HttpNotImplemented,

    /// The client asked for a SOCKS feature this server does not
    /// provide at all.
    #[error("SOCKS feature not supported")]
    NotSupported,

    /// Tried to progress the handshake when it was already finished.
    /// This is a programming error.
    #[error("SOCKS handshake was finished; no need to call this again")]
    AlreadyFinished,
}

impl From<crate::wire::Error> for Error {
    fn from(e: crate::wire::Error) -> Error {
        use crate::wire::Error as E;
        match e {
            E::Truncated => Error::Truncated,
            _ => Error::Syntax,
        }
    }
}
