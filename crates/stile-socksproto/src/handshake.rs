//! Types to implement the proxy's side of the SOCKS handshake.

use crate::msg::{SocksAddr, SocksAuthMethod, SocksCmd, SocksRequest, SocksStatus, SocksVersion};
use crate::{Error, Result};

use crate::wire::Error as WireError;
use crate::wire::Result as WireResult;
use crate::wire::{Readable, Reader, Writeable, Writer};

use std::convert::TryInto;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tracing::{debug, warn};

/// An ongoing SOCKS handshake, seen from the proxy side.
///
/// To perform a handshake, call [`SocksProxyHandshake::handshake`]
/// repeatedly with new client input, draining bytes and sending reply
/// bytes as each returned [`Action`] instructs, until an action has
/// `finished` set.  A finished handshake holds either a
/// [`SocksRequest`] (retrieved with
/// [`SocksProxyHandshake::into_request`]) or a [`Rejection`] whose
/// refusal reply was already emitted in the final action.
#[derive(Clone, Debug)]
pub struct SocksProxyHandshake {
    /// Authentication requirements this handshake enforces.
    policy: AuthPolicy,
    /// Current state of the handshake.  Each completed message
    /// advances the state.
    state: State,
    /// SOCKS5 authentication method that has been negotiated (but not
    /// yet put in a SocksRequest object).
    auth: Option<SocksAuthMethod>,
    /// Completed SOCKS request.
    handshake: Option<SocksRequest>,
    /// Why the handshake ended without a request, if it did.
    reject: Option<Rejection>,
}

/// Possible state for a SOCKS connection.
///
/// Each completed message advances the state.
#[derive(Clone, Debug, Copy, PartialEq)]
enum State {
    /// Starting state: no messages have been handled yet.
    Initial,
    /// SOCKS5: we've negotiated username/password authentication, and
    /// are waiting for the client to send it.
    Socks5Auth,
    /// SOCKS5: we've finished the authentication (if any), and we're
    /// waiting for the actual request.
    Socks5Wait,
    /// Ending (successful) state: the client has sent all its
    /// messages and a request exists.
    Done,
    /// Ending (refused) state: the final action carried a refusal
    /// reply, and the connection should be closed once it is sent.
    Rejected,
}

/// An action to take in response to a SOCKS handshake message.
#[derive(Clone, Debug)]
pub struct Action {
    /// If nonzero, this many bytes should be drained from the
    /// client's inputs.
    pub drain: usize,
    /// If nonempty, this reply should be sent to the client.
    pub reply: Vec<u8>,
    /// If true, then this handshake is over, either successfully or not.
    pub finished: bool,
}

/// Authentication requirements for a proxy, checked during the SOCKS5
/// username/password subnegotiation.
///
/// With `enforce` set, clients that do not offer username/password
/// authentication are turned away during method negotiation.  Missing
/// credentials make verification fail whenever a client attempts it.
#[derive(Clone, Debug, Default)]
pub struct AuthPolicy {
    /// Refuse SOCKS5 clients that cannot authenticate.
    pub enforce: bool,
    /// The username clients must present.
    pub username: Option<String>,
    /// The password clients must present.
    pub password: Option<String>,
}

impl AuthPolicy {
    /// Check a client-supplied username and password against the
    /// stored credentials.
    fn permits(&self, username: &[u8], password: &[u8]) -> bool {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => u.as_bytes() == username && p.as_bytes() == password,
            _ => false,
        }
    }
}

/// Why a finished handshake produced no request.
///
/// Each of these was answered on the wire (a no-acceptable-method
/// reply, a failed auth status, or a command-not-supported reply)
/// before the handshake finished; they are retained so the caller can
/// log what happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Rejection {
    /// None of the client's offered authentication methods was
    /// acceptable under the configured policy.
    NoAcceptableMethod,
    /// The client's username/password pair did not match.
    BadCredentials,
    /// The client asked for a command this server does not relay.
    UnsupportedCommand(SocksCmd),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoAcceptableMethod => write!(f, "no acceptable authentication method"),
            Rejection::BadCredentials => write!(f, "authentication failed"),
            Rejection::UnsupportedCommand(c) => write!(f, "unsupported command {}", c),
        }
    }
}

impl SocksProxyHandshake {
    /// Construct a new SocksProxyHandshake in its initial state.
    pub fn new(policy: AuthPolicy) -> Self {
        SocksProxyHandshake {
            policy,
            state: State::Initial,
            auth: None,
            handshake: None,
            reject: None,
        }
    }

    /// Try to advance the handshake, given some client input in
    /// `input`.
    ///
    /// If there isn't enough input, gives [`Error::Truncated`]: read
    /// more and call this again with the longer buffer.  Other errors
    /// mean the connection should be closed without any reply.
    ///
    /// On success, return an Action describing what to tell the
    /// client, and how much of its input to consume.
    pub fn handshake(&mut self, input: &[u8]) -> Result<Action> {
        if input.is_empty() {
            return Err(Error::Truncated);
        }
        match (self.state, input[0]) {
            (State::Initial, 4) => self.s4(input),
            (State::Initial, 5) => self.s5_initial(input),
            // 67 is ASCII 'C', the first byte of an HTTP CONNECT line.
            (State::Initial, 67) => Err(Error::HttpNotImplemented),
            (State::Initial, v) => Err(Error::BadProtocol(v)),
            (State::Socks5Auth, 1) => self.s5_auth(input),
            (State::Socks5Wait, 5) => self.s5_request(input),
            (State::Done, _) | (State::Rejected, _) => Err(Error::AlreadyFinished),
            (_, _) => Err(Error::Syntax),
        }
    }

    /// Complete a SOCKS4 handshake.
    ///
    /// The whole protocol is a single message: command, port, IPv4
    /// address, and a NUL-terminated user id that we discard.
    fn s4(&mut self, input: &[u8]) -> Result<Action> {
        let mut r = Reader::from_slice(input);
        let version = r.take_u8()?;
        assert_eq!(version, 4);

        let cmd: SocksCmd = r.take_u8()?.into();
        let port = r.take_u16()?;
        let ip = r.take_u32()?;
        let _userid = r.take_until(0)?;

        if cmd != SocksCmd::CONNECT {
            // SOCKS4 has no command-not-supported reply; just close.
            return Err(Error::NotSupported);
        }

        let ip4: Ipv4Addr = ip.into();
        let request = SocksRequest::new(SocksVersion::V4, cmd, SocksAddr::Ip(ip4.into()), port, None)?;

        self.state = State::Done;
        self.handshake = Some(request);

        Ok(Action {
            drain: r.consumed(),
            reply: Vec::new(),
            finished: true,
        })
    }

    /// SOCKS5: initial handshake to negotiate the authentication
    /// method.
    ///
    /// Selection is deterministic: with `enforce` set, a client that
    /// does not offer username/password is refused outright.
    /// Otherwise username/password is preferred, then no-auth, then
    /// refusal.
    fn s5_initial(&mut self, input: &[u8]) -> Result<Action> {
        let mut r = Reader::from_slice(input);
        let version = r.take_u8()?;
        assert_eq!(version, 5);

        let nmethods = r.take_u8()?;
        let methods = r.take(nmethods as usize)?;

        let userpass: u8 = SocksAuthMethod::USERNAME_PASSWORD.into();
        let noauth: u8 = SocksAuthMethod::NO_AUTH.into();

        if self.policy.enforce && !methods.contains(&userpass) {
            warn!("client cannot do username/password, but authentication is required");
            return Ok(self.refuse_methods(r.consumed()));
        }

        let (next, method) = if methods.contains(&userpass) {
            (State::Socks5Auth, SocksAuthMethod::USERNAME_PASSWORD)
        } else if methods.contains(&noauth) {
            (State::Socks5Wait, SocksAuthMethod::NO_AUTH)
        } else {
            return Ok(self.refuse_methods(r.consumed()));
        };

        debug!("negotiated authentication method: {}", method);
        self.auth = Some(method);
        self.state = next;
        let m: u8 = method.into();
        Ok(Action {
            drain: r.consumed(),
            reply: vec![5, m],
            finished: false,
        })
    }

    /// Build the terminal no-acceptable-methods action.
    fn refuse_methods(&mut self, drain: usize) -> Action {
        let none: u8 = SocksAuthMethod::NO_ACCEPTABLE.into();
        self.state = State::Rejected;
        self.reject = Some(Rejection::NoAcceptableMethod);
        Action {
            drain,
            reply: vec![5, none],
            finished: true,
        }
    }

    /// SOCKS5: username/password subnegotiation (RFC 1929).
    fn s5_auth(&mut self, input: &[u8]) -> Result<Action> {
        let mut r = Reader::from_slice(input);
        let version = r.take_u8()?;
        assert_eq!(version, 1);

        let ulen = r.take_u8()?;
        let username = r.take(ulen as usize)?;
        let plen = r.take_u8()?;
        let password = r.take(plen as usize)?;

        if !self.policy.permits(username, password) {
            warn!("username/password verification failed");
            self.state = State::Rejected;
            self.reject = Some(Rejection::BadCredentials);
            return Ok(Action {
                drain: r.consumed(),
                reply: vec![1, 0xFF],
                finished: true,
            });
        }

        debug!("username/password verification succeeded");
        self.state = State::Socks5Wait;
        Ok(Action {
            drain: r.consumed(),
            reply: vec![1, 0x00],
            finished: false,
        })
    }

    /// SOCKS5: final step, to receive the client's actual request.
    fn s5_request(&mut self, input: &[u8]) -> Result<Action> {
        let mut r = Reader::from_slice(input);
        let version = r.take_u8()?;
        assert_eq!(version, 5);

        let cmd: SocksCmd = r.take_u8()?.into();
        let _reserved = r.take_u8()?;
        let addr: SocksAddr = r.extract()?;
        let port = r.take_u16()?;

        match cmd {
            SocksCmd::CONNECT => {}
            SocksCmd::BIND | SocksCmd::UDP_ASSOCIATE => {
                warn!("refusing {} request: only CONNECT is relayed", cmd);
                self.state = State::Rejected;
                self.reject = Some(Rejection::UnsupportedCommand(cmd));
                return Ok(Action {
                    drain: r.consumed(),
                    reply: s5_reply(SocksStatus::COMMAND_NOT_SUPPORTED, None),
                    finished: true,
                });
            }
            _ => return Err(Error::NotSupported),
        }

        let request = SocksRequest::new(SocksVersion::V5, cmd, addr, port, self.auth)?;

        self.state = State::Done;
        self.handshake = Some(request);

        Ok(Action {
            drain: r.consumed(),
            reply: Vec::new(),
            finished: true,
        })
    }

    /// Return true if this handshake is finished, successfully or not.
    pub fn finished(&self) -> bool {
        self.state == State::Done || self.state == State::Rejected
    }

    /// If this handshake finished without producing a request, say why.
    pub fn rejection(&self) -> Option<Rejection> {
        self.reject
    }

    /// Consume this handshake's state; if it finished successfully,
    /// return a SocksRequest.
    pub fn into_request(self) -> Option<SocksRequest> {
        self.handshake
    }
}

impl SocksRequest {
    /// Format a reply to this request, indicating success or failure.
    ///
    /// On success, `bound` should hold the local address of the
    /// upstream socket, which the reply presents to the client as the
    /// bind address.  Failure replies carry a zeroed address.
    pub fn reply(&self, status: SocksStatus, bound: Option<SocketAddr>) -> Vec<u8> {
        match self.version() {
            SocksVersion::V4 => s4_reply(status, bound),
            SocksVersion::V5 => s5_reply(status, bound),
        }
    }
}

/// Format a SOCKS4 reply.
fn s4_reply(status: SocksStatus, bound: Option<SocketAddr>) -> Vec<u8> {
    let mut w = Vec::new();
    w.write_u8(0);
    w.write_u8(status.into_socks4_status());
    match bound {
        Some(SocketAddr::V4(sa)) => {
            w.write_u16(sa.port());
            w.write(sa.ip());
        }
        _ => {
            w.write_u16(0);
            w.write_u32(0);
        }
    }
    w
}

/// Format a SOCKS5 reply.
fn s5_reply(status: SocksStatus, bound: Option<SocketAddr>) -> Vec<u8> {
    let mut w = Vec::new();
    w.write_u8(5);
    w.write_u8(status.into());
    w.write_u8(0); // reserved.
    match bound {
        Some(sa) => {
            w.write(&SocksAddr::Ip(sa.ip()));
            w.write_u16(sa.port());
        }
        None => {
            w.write(&SocksAddr::Ip(Ipv4Addr::UNSPECIFIED.into()));
            w.write_u16(0);
        }
    }
    w
}

impl Readable for SocksAddr {
    fn take_from(r: &mut Reader<'_>) -> WireResult<SocksAddr> {
        let atype = r.take_u8()?;
        match atype {
            1 => {
                let ip4: Ipv4Addr = r.extract()?;
                Ok(SocksAddr::Ip(ip4.into()))
            }
            3 => {
                let hlen = r.take_u8()?;
                let hostname = r.take(hlen as usize)?;
                let hostname = std::str::from_utf8(hostname)
                    .map_err(|_| WireError::BadMessage("bad utf8 on hostname"))?
                    .to_string();
                // hlen fits in a u8, so the length check cannot fire.
                let hostname = hostname
                    .try_into()
                    .map_err(|_| WireError::BadMessage("hostname too long"))?;
                Ok(SocksAddr::Hostname(hostname))
            }
            4 => {
                let ip6: std::net::Ipv6Addr = r.extract()?;
                Ok(SocksAddr::Ip(ip6.into()))
            }
            _ => Err(WireError::BadMessage("unrecognized address type.")),
        }
    }
}

impl Writeable for SocksAddr {
    fn write_onto<W: Writer + ?Sized>(&self, w: &mut W) {
        match self {
            SocksAddr::Ip(IpAddr::V4(ip)) => {
                w.write_u8(1);
                w.write(ip);
            }
            SocksAddr::Ip(IpAddr::V6(ip)) => {
                w.write_u8(4);
                w.write(ip);
            }
            SocksAddr::Hostname(h) => {
                let h = h.as_ref();
                w.write_u8(3);
                w.write_u8(h.len() as u8);
                w.write_all(h.as_bytes());
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::convert::TryInto;

    /// A policy with no credentials and no enforcement.
    fn open_policy() -> AuthPolicy {
        AuthPolicy::default()
    }

    /// A policy that knows one username/password pair.
    fn creds_policy(enforce: bool) -> AuthPolicy {
        AuthPolicy {
            enforce,
            username: Some("orpheus".to_string()),
            password: Some("lyre".to_string()),
        }
    }

    #[test]
    fn socks4_connect() {
        let mut h = SocksProxyHandshake::new(open_policy());
        let action = h
            .handshake(&[4, 1, 0, 80, 127, 0, 0, 1, 0])
            .unwrap();
        assert_eq!(action.drain, 9);
        assert!(action.reply.is_empty());
        assert!(action.finished);
        assert!(h.finished());
        assert_eq!(h.rejection(), None);

        let req = h.into_request().unwrap();
        assert_eq!(req.version(), SocksVersion::V4);
        assert_eq!(req.command(), SocksCmd::CONNECT);
        assert_eq!(req.addr().to_string(), "127.0.0.1");
        assert_eq!(req.port(), 80);
        assert_eq!(req.auth_method(), None);
    }

    #[test]
    fn socks4_non_connect_closes_without_reply() {
        let mut h = SocksProxyHandshake::new(open_policy());
        let e = h.handshake(&[4, 2, 0, 80, 127, 0, 0, 1, 0]);
        assert!(matches!(e, Err(Error::NotSupported)));
    }

    #[test]
    fn socks4_truncated() {
        let mut h = SocksProxyHandshake::new(open_policy());
        // fixed header incomplete.
        let e = h.handshake(&[4, 1, 0, 80]);
        assert!(matches!(e, Err(Error::Truncated)));
        // header complete, but no NUL terminator on the user id yet.
        let e = h.handshake(&[4, 1, 0, 80, 127, 0, 0, 1]);
        assert!(matches!(e, Err(Error::Truncated)));
    }

    #[test]
    fn version_dispatch() {
        let mut h = SocksProxyHandshake::new(open_policy());
        let e = h.handshake(&[67, 79, 78]);
        assert!(matches!(e, Err(Error::HttpNotImplemented)));

        let mut h = SocksProxyHandshake::new(open_policy());
        let e = h.handshake(&[6]);
        assert!(matches!(e, Err(Error::BadProtocol(6))));

        let mut h = SocksProxyHandshake::new(open_policy());
        let e = h.handshake(&[0]);
        assert!(matches!(e, Err(Error::BadProtocol(0))));
    }

    #[test]
    fn socks5_noauth_flow() {
        let mut h = SocksProxyHandshake::new(open_policy());

        // Offer only NO_AUTH.
        let action = h.handshake(&[5, 1, 0]).unwrap();
        assert_eq!(action.drain, 3);
        assert_eq!(action.reply, [5, 0]);
        assert!(!action.finished);

        // CONNECT to 1.2.3.4:80.
        let action = h.handshake(&[5, 1, 0, 1, 1, 2, 3, 4, 0, 80]).unwrap();
        assert_eq!(action.drain, 10);
        assert!(action.reply.is_empty());
        assert!(action.finished);

        let req = h.into_request().unwrap();
        assert_eq!(req.version(), SocksVersion::V5);
        assert_eq!(req.addr().to_string(), "1.2.3.4");
        assert_eq!(req.port(), 80);
        assert_eq!(req.auth_method(), Some(SocksAuthMethod::NO_AUTH));
    }

    #[test]
    fn socks5_grows_one_byte_at_a_time() {
        // The driver's read loop hands us ever-longer prefixes; every
        // one of them short of the full message is just "wait".
        let msg = [5, 2, 0, 2];
        let mut h = SocksProxyHandshake::new(open_policy());
        for len in 1..msg.len() {
            let e = h.handshake(&msg[..len]);
            assert!(matches!(e, Err(Error::Truncated)));
        }
        let action = h.handshake(&msg).unwrap();
        assert_eq!(action.reply, [5, 2]);
    }

    #[test]
    fn method_policy_enforced() {
        // enforce_auth + a client that can't authenticate = 0xFF.
        let mut h = SocksProxyHandshake::new(creds_policy(true));
        let action = h.handshake(&[5, 1, 0]).unwrap();
        assert_eq!(action.reply, [5, 0xFF]);
        assert!(action.finished);
        assert_eq!(h.rejection(), Some(Rejection::NoAcceptableMethod));
        assert!(h.into_request().is_none());
    }

    #[test]
    fn method_policy_prefers_userpass() {
        let mut h = SocksProxyHandshake::new(open_policy());
        let action = h.handshake(&[5, 2, 0, 2]).unwrap();
        assert_eq!(action.reply, [5, 2]);
        assert!(!action.finished);
    }

    #[test]
    fn method_policy_no_acceptable() {
        // GSSAPI alone is never acceptable, enforced or not.
        let mut h = SocksProxyHandshake::new(open_policy());
        let action = h.handshake(&[5, 1, 1]).unwrap();
        assert_eq!(action.reply, [5, 0xFF]);
        assert!(action.finished);
        assert_eq!(h.rejection(), Some(Rejection::NoAcceptableMethod));
    }

    /// Run the method negotiation and auth subnegotiation for a given
    /// username and password, returning the handshake and the auth
    /// action.
    fn auth_attempt(policy: AuthPolicy, user: &[u8], pass: &[u8]) -> (SocksProxyHandshake, Action) {
        let mut h = SocksProxyHandshake::new(policy);
        let action = h.handshake(&[5, 1, 2]).unwrap();
        assert_eq!(action.reply, [5, 2]);

        let mut msg = vec![1, user.len() as u8];
        msg.extend_from_slice(user);
        msg.push(pass.len() as u8);
        msg.extend_from_slice(pass);
        let action = h.handshake(&msg).unwrap();
        (h, action)
    }

    #[test]
    fn auth_accepts_matching_credentials() {
        let (mut h, action) = auth_attempt(creds_policy(true), b"orpheus", b"lyre");
        assert_eq!(action.reply, [1, 0]);
        assert!(!action.finished);

        // ...and the request can proceed.
        let action = h.handshake(&[5, 1, 0, 1, 10, 0, 0, 1, 0, 80]).unwrap();
        assert!(action.finished);
        let req = h.into_request().unwrap();
        assert_eq!(req.auth_method(), Some(SocksAuthMethod::USERNAME_PASSWORD));
    }

    #[test]
    fn auth_rejects_bad_credentials() {
        let (h, action) = auth_attempt(creds_policy(true), b"orpheus", b"drum");
        assert_eq!(action.reply, [1, 0xFF]);
        assert!(action.finished);
        assert_eq!(h.rejection(), Some(Rejection::BadCredentials));
        assert!(h.into_request().is_none());
    }

    #[test]
    fn auth_always_fails_without_stored_credentials() {
        let (h, action) = auth_attempt(open_policy(), b"anyone", b"anything");
        assert_eq!(action.reply, [1, 0xFF]);
        assert!(action.finished);
        assert_eq!(h.rejection(), Some(Rejection::BadCredentials));
    }

    #[test]
    fn socks5_domain_request() {
        let mut h = SocksProxyHandshake::new(open_policy());
        h.handshake(&[5, 1, 0]).unwrap();

        let mut msg = vec![5, 1, 0, 3, 11];
        msg.extend_from_slice(b"example.com");
        msg.extend_from_slice(&[1, 187]);
        let action = h.handshake(&msg).unwrap();
        assert!(action.finished);

        let req = h.into_request().unwrap();
        assert_eq!(req.addr().to_string(), "example.com");
        assert_eq!(req.port(), 443);
    }

    #[test]
    fn socks5_ipv6_request() {
        let mut h = SocksProxyHandshake::new(open_policy());
        h.handshake(&[5, 1, 0]).unwrap();

        let ip6: std::net::Ipv6Addr = "2001:db8::7".parse().unwrap();
        let mut msg = vec![5, 1, 0, 4];
        msg.extend_from_slice(&ip6.octets());
        msg.extend_from_slice(&[0, 22]);
        let action = h.handshake(&msg).unwrap();
        assert!(action.finished);

        let req = h.into_request().unwrap();
        assert_eq!(req.addr(), &SocksAddr::Ip(ip6.into()));
        assert_eq!(req.port(), 22);
    }

    #[test]
    fn socks5_refuses_bind_and_udp() {
        for cmd in &[2_u8, 3] {
            let mut h = SocksProxyHandshake::new(open_policy());
            h.handshake(&[5, 1, 0]).unwrap();
            let action = h.handshake(&[5, *cmd, 0, 1, 0, 0, 0, 0, 0, 80]).unwrap();
            assert!(action.finished);
            assert_eq!(action.reply, [5, 7, 0, 1, 0, 0, 0, 0, 0, 0]);
            assert_eq!(
                h.rejection(),
                Some(Rejection::UnsupportedCommand((*cmd).into()))
            );
            assert!(h.into_request().is_none());
        }
    }

    #[test]
    fn socks5_unknown_command_closes_without_reply() {
        let mut h = SocksProxyHandshake::new(open_policy());
        h.handshake(&[5, 1, 0]).unwrap();
        let e = h.handshake(&[5, 9, 0, 1, 0, 0, 0, 0, 0, 80]);
        assert!(matches!(e, Err(Error::NotSupported)));
    }

    #[test]
    fn socks5_unknown_address_type() {
        let mut h = SocksProxyHandshake::new(open_policy());
        h.handshake(&[5, 1, 0]).unwrap();
        let e = h.handshake(&[5, 1, 0, 9, 1, 2, 3, 4, 0, 80]);
        assert!(matches!(e, Err(Error::Syntax)));
    }

    #[test]
    fn wrong_message_in_auth_state() {
        let mut h = SocksProxyHandshake::new(creds_policy(false));
        h.handshake(&[5, 1, 2]).unwrap();
        // A SOCKS5 request where the auth message belongs.
        let e = h.handshake(&[5, 1, 0, 1, 0, 0, 0, 0, 0, 80]);
        assert!(matches!(e, Err(Error::Syntax)));
    }

    #[test]
    fn finished_handshake_rejects_input() {
        let mut h = SocksProxyHandshake::new(open_policy());
        h.handshake(&[4, 1, 0, 80, 127, 0, 0, 1, 0]).unwrap();
        let e = h.handshake(&[4, 1, 0, 80, 127, 0, 0, 1, 0]);
        assert!(matches!(e, Err(Error::AlreadyFinished)));
    }

    /// Build a v4 or v5 request for one address, and return it.
    fn request_for(addr: SocksAddr, port: u16) -> SocksRequest {
        let mut h = SocksProxyHandshake::new(open_policy());
        h.handshake(&[5, 1, 0]).unwrap();
        let mut msg: Vec<u8> = vec![5, 1, 0];
        msg.write(&addr);
        msg.write_u16(port);
        let action = h.handshake(&msg).unwrap();
        assert!(action.finished);
        h.into_request().unwrap()
    }

    #[test]
    fn request_round_trip() {
        // Encoding a request and running it through the handshake
        // yields the same (cmd, addr, port) for every address type.
        let cases: Vec<SocksAddr> = vec![
            SocksAddr::Ip("198.51.100.6".parse::<std::net::Ipv4Addr>().unwrap().into()),
            SocksAddr::Hostname("proxy.example.net".to_string().try_into().unwrap()),
            SocksAddr::Ip("2001:db8::2:1".parse::<std::net::Ipv6Addr>().unwrap().into()),
        ];
        for addr in cases {
            let req = request_for(addr.clone(), 8080);
            assert_eq!(req.command(), SocksCmd::CONNECT);
            assert_eq!(req.addr(), &addr);
            assert_eq!(req.port(), 8080);
        }
    }

    #[test]
    fn socks4_reply_encoding() {
        let req = {
            let mut h = SocksProxyHandshake::new(open_policy());
            h.handshake(&[4, 1, 0, 80, 127, 0, 0, 1, 0]).unwrap();
            h.into_request().unwrap()
        };

        let bound: SocketAddr = "127.0.0.1:80".parse().unwrap();
        let ok = req.reply(SocksStatus::SUCCEEDED, Some(bound));
        assert_eq!(ok, [0, 90, 0, 80, 127, 0, 0, 1]);

        let failed = req.reply(SocksStatus::CONNECTION_REFUSED, None);
        assert_eq!(failed, [0, 91, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn socks5_reply_encoding() {
        let req = request_for(
            SocksAddr::Ip("10.1.2.3".parse::<std::net::Ipv4Addr>().unwrap().into()),
            4242,
        );

        let bound: SocketAddr = "10.1.2.3:4242".parse().unwrap();
        let ok = req.reply(SocksStatus::SUCCEEDED, Some(bound));
        assert_eq!(ok, [5, 0, 0, 1, 10, 1, 2, 3, 0x10, 0x92]);

        let failed = req.reply(SocksStatus::CONNECTION_REFUSED, None);
        assert_eq!(failed, [5, 5, 0, 1, 0, 0, 0, 0, 0, 0]);

        // An IPv6 bound address downgrades nothing: it is sent as-is.
        let bound6: SocketAddr = "[2001:db8::1]:443".parse().unwrap();
        let ok6 = req.reply(SocksStatus::SUCCEEDED, Some(bound6));
        assert_eq!(ok6[0..4], [5, 0, 0, 4]);
        assert_eq!(ok6.len(), 4 + 16 + 2);
    }
}
