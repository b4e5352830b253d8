//! Server side of the SOCKS protocol, in the flavors spoken by real
//! clients: SOCKS4 and SOCKS5.
//!
//! SOCKS is an old and fairly simple protocol for telling a TCP proxy
//! where to connect.  This crate hides the wire details behind a
//! stateful handshake type: feed it bytes as they arrive from a
//! client, send the replies it hands back, and it eventually produces
//! a [`SocksRequest`] (where to connect) or a terminal refusal.
//!
//! Nothing in this crate performs I/O; the enclosing server owns the
//! sockets, the DNS lookups, and the relaying.  See the `stile` binary
//! crate for the driver.
//!
//! For more information about SOCKS:
//!
//!   * SOCKS5 is specified in
//!     [RFC 1928](https://tools.ietf.org/html/rfc1928), and see also
//!     [RFC 1929](https://tools.ietf.org/html/rfc1929) for
//!     Username/Password authentication in SOCKS5.
//!   * [The wikipedia article](https://en.wikipedia.org/wiki/SOCKS)
//!     is the best surviving documentation for SOCKS4.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]
#![deny(clippy::await_holding_lock)]

mod err;
mod handshake;
mod msg;
pub mod wire;

pub use err::Error;
pub use handshake::{Action, AuthPolicy, Rejection, SocksProxyHandshake};
pub use msg::{
    SocksAddr, SocksAuthMethod, SocksCmd, SocksHostname, SocksRequest, SocksStatus, SocksVersion,
};

/// A Result type for the stile_socksproto crate.
pub type Result<T> = std::result::Result<T, Error>;
