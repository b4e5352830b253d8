//! Structures that represent SOCKS messages.

use crate::{Error, Result};

use caret::caret_int;
use std::convert::TryFrom;
use std::fmt;
use std::net::IpAddr;

/// A SOCKS protocol version.
///
/// Versions 4 and 5 are separate protocols that happen to share a
/// port: they agree on almost nothing past the version byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum SocksVersion {
    /// SOCKS4: no method negotiation, no authentication, IPv4 only.
    V4,
    /// SOCKS5: method negotiation, optional authentication, and
    /// IPv4/domain/IPv6 addressing.
    V5,
}

impl fmt::Display for SocksVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksVersion::V4 => write!(f, "SOCKSv4"),
            SocksVersion::V5 => write!(f, "SOCKSv5"),
        }
    }
}

/// A completed SOCKS request, as negotiated on a SOCKS connection.
///
/// Once this request exists, we know where the client wants to
/// connect.  Don't discard it right away: it is also what formats the
/// final success-or-failure reply.
#[derive(Clone, Debug)]
pub struct SocksRequest {
    /// Negotiated SOCKS protocol version.
    version: SocksVersion,
    /// The command requested by the SOCKS client.
    cmd: SocksCmd,
    /// The target address.
    addr: SocksAddr,
    /// The target port.
    port: u16,
    /// The authentication method that was negotiated (SOCKS5 only).
    auth: Option<SocksAuthMethod>,
}

/// An address sent or received as part of a SOCKS handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum SocksAddr {
    /// A regular DNS hostname, to be resolved by the proxy.
    Hostname(SocksHostname),
    /// An IP address literal.
    Ip(IpAddr),
}

/// A hostname for use with SOCKS.  It is limited in length, since the
/// wire format carries a one-byte length prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SocksHostname(String);

caret_int! {
    /// Command from the socks client telling us what to do.
    pub struct SocksCmd(u8) {
        /// Open a TCP stream to a given address and port.
        CONNECT = 1,
        /// Wait for an inbound TCP connection.  Recognized, never relayed.
        BIND = 2,
        /// Open a UDP relay.  Recognized, never relayed.
        UDP_ASSOCIATE = 3,
    }
}

caret_int! {
    /// A SOCKS5 authentication method code, as offered by clients
    /// during method negotiation.
    pub struct SocksAuthMethod(u8) {
        /// No authentication required.
        NO_AUTH = 0x00,
        /// GSSAPI (RFC 1961).  Recognized but never selected by this
        /// server.
        GSSAPI = 0x01,
        /// Username/password authentication (RFC 1929).
        USERNAME_PASSWORD = 0x02,
        /// Sentinel: none of the offered methods was acceptable.
        NO_ACCEPTABLE = 0xFF,
    }
}

caret_int! {
    /// Possible reply status values from a SOCKS5 handshake.
    ///
    /// SOCKS4 only distinguishes success from failure; see
    /// `into_socks4_status`.
    pub struct SocksStatus(u8) {
        /// RFC 1928: "succeeded"
        SUCCEEDED = 0x00,
        /// RFC 1928: "general SOCKS server failure"
        GENERAL_FAILURE = 0x01,
        /// RFC 1928: "connection not allowable by ruleset"
        NOT_ALLOWED = 0x02,
        /// RFC 1928: "Network unreachable"
        NETWORK_UNREACHABLE = 0x03,
        /// RFC 1928: "Host unreachable"
        HOST_UNREACHABLE = 0x04,
        /// RFC 1928: "Connection refused"
        CONNECTION_REFUSED = 0x05,
        /// RFC 1928: "TTL expired"
        TTL_EXPIRED = 0x06,
        /// RFC 1928: "Command not supported"
        COMMAND_NOT_SUPPORTED = 0x07,
        /// RFC 1928: "Address type not supported"
        ADDRTYPE_NOT_SUPPORTED = 0x08,
    }
}

impl SocksStatus {
    /// Convert this status into a value for use in a SOCKS4 reply.
    ///
    /// SOCKS4 has two codes this server produces: 90 (granted) and 91
    /// (rejected or failed).
    pub(crate) fn into_socks4_status(self) -> u8 {
        match self {
            SocksStatus::SUCCEEDED => 90,
            _ => 91,
        }
    }
}

impl TryFrom<String> for SocksHostname {
    type Error = Error;
    fn try_from(s: String) -> Result<SocksHostname> {
        if s.len() > 255 {
            Err(Error::Syntax)
        } else {
            Ok(SocksHostname(s))
        }
    }
}

impl AsRef<str> for SocksHostname {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl From<SocksHostname> for String {
    fn from(s: SocksHostname) -> String {
        s.0
    }
}

impl SocksRequest {
    /// Create a SocksRequest with a given set of fields.
    ///
    /// Only relayable requests are constructed: commands this server
    /// refuses are answered before a request ever exists.
    pub(crate) fn new(
        version: SocksVersion,
        cmd: SocksCmd,
        addr: SocksAddr,
        port: u16,
        auth: Option<SocksAuthMethod>,
    ) -> Result<Self> {
        if cmd != SocksCmd::CONNECT {
            return Err(Error::NotSupported);
        }
        Ok(SocksRequest {
            version,
            cmd,
            addr,
            port,
            auth,
        })
    }

    /// Return the negotiated protocol version.
    pub fn version(&self) -> SocksVersion {
        self.version
    }

    /// Return the command that the client requested.
    pub fn command(&self) -> SocksCmd {
        self.cmd
    }

    /// Return the authentication method negotiated for this request,
    /// if any.  SOCKS4 has no authentication, so this is `None` there.
    pub fn auth_method(&self) -> Option<SocksAuthMethod> {
        self.auth
    }

    /// Return the requested port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Return the requested destination address.
    pub fn addr(&self) -> &SocksAddr {
        &self.addr
    }
}

impl fmt::Display for SocksAddr {
    /// Format a string (a hostname or IP address) corresponding to
    /// this SocksAddr.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksAddr::Ip(a) => write!(f, "{}", a),
            SocksAddr::Hostname(h) => write!(f, "{}", h.0),
        }
    }
}
