//! The SOCKS proxy itself: accept clients, drive their handshakes,
//! connect upstream, and hand the pair of sockets to the relay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{lookup_host, TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use stile_socksproto::{
    AuthPolicy, Error as SocksError, SocksAddr, SocksProxyHandshake, SocksRequest, SocksStatus,
};

use crate::relay;

/// How long to wait for an upstream TCP connection to be established.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the proxy server.
///
/// Read-only once the server starts; shared by every connection task.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct ProxyConfig {
    /// Address to bind the SOCKS listener to.
    pub(crate) listen_addr: String,
    /// Port to bind the SOCKS listener to.
    pub(crate) listen_port: u16,
    /// Refuse SOCKS5 clients that do not offer username/password
    /// authentication.
    pub(crate) enforce_auth: bool,
    /// Username checked during SOCKS5 authentication.
    pub(crate) username: Option<String>,
    /// Password checked during SOCKS5 authentication.
    pub(crate) password: Option<String>,
}

impl ProxyConfig {
    /// The authentication policy to inject into each connection's
    /// handshake.
    fn auth_policy(&self) -> AuthPolicy {
        AuthPolicy {
            enforce: self.enforce_auth,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

/// Bind the configured listener and serve SOCKS clients on it,
/// indefinitely.
pub(crate) async fn run_proxy(config: Arc<ProxyConfig>) -> Result<()> {
    let listener = TcpListener::bind((config.listen_addr.as_str(), config.listen_port))
        .await
        .with_context(|| {
            format!(
                "couldn't bind to {}:{}",
                config.listen_addr, config.listen_port
            )
        })?;
    info!("listening on {}", listener.local_addr()?);
    accept_loop(listener, config).await
}

/// Accept connections forever, running each one in its own task.
///
/// A connection's failure is logged by its task and never reaches this
/// loop.
async fn accept_loop(listener: TcpListener, config: Arc<ProxyConfig>) -> Result<()> {
    loop {
        let (stream, addr) = listener
            .accept()
            .await
            .context("failed to accept incoming connection")?;
        let config = Arc::clone(&config);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(config, stream, addr).await {
                warn!("connection from {} exited with error: {}", addr, e);
            }
        });
    }
}

/// Handle one accepted client connection, end to end: handshake,
/// upstream connect, reply, relay.
async fn handle_connection<S>(config: Arc<ProxyConfig>, stream: S, addr: SocketAddr) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    info!("new connection from {}", addr);
    let (mut client_r, mut client_w) = tokio::io::split(stream);

    // Part 1: drive the SOCKS handshake, to learn where we are being
    // asked to connect.  SOCKS5 needs multiple round trips, so this
    // runs in a loop, feeding the state machine ever-longer prefixes
    // of the input until it has seen a whole message.
    let mut handshake = SocksProxyHandshake::new(config.auth_policy());
    let mut inbuf = [0_u8; 1024];
    let mut n_read = 0;
    let hs = loop {
        let action = match handshake.handshake(&inbuf[..n_read]) {
            Err(SocksError::Truncated) => {
                let n = client_r
                    .read(&mut inbuf[n_read..])
                    .await
                    .context("error while reading SOCKS handshake")?;
                if n == 0 {
                    // EOF mid-handshake.  The protocol state is
                    // undetermined, so there is no reply to send.
                    debug!("{} hung up during the SOCKS handshake", addr);
                    return Ok(());
                }
                n_read += n;
                continue;
            }
            Err(SocksError::HttpNotImplemented) => {
                info!("{} sent an HTTP request, and there is no HTTP proxy here", addr);
                return Ok(());
            }
            Err(e) => return Err(e).context("invalid SOCKS handshake"),
            Ok(action) => action,
        };

        if action.drain > 0 {
            inbuf.copy_within(action.drain..n_read, 0);
            n_read -= action.drain;
        }
        if !action.reply.is_empty() {
            client_w
                .write_all(&action.reply)
                .await
                .context("error while writing reply to SOCKS handshake")?;
        }
        if action.finished {
            break handshake;
        }
    };

    if let Some(reject) = hs.rejection() {
        info!("refused request from {}: {}", addr, reject);
        return Ok(());
    }
    let request = match hs.into_request() {
        Some(r) => r,
        None => return Err(anyhow!("handshake finished without a request")),
    };

    info!(
        "got a {} request from {}: {} {}:{}",
        request.version(),
        addr,
        request.command(),
        request.addr(),
        request.port()
    );

    // Part 2: open the upstream connection, and tell the client how
    // it went.  All failures collapse to one coarse code per version.
    let upstream = match connect_to_dest(&request).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("couldn't reach {}:{}: {}", request.addr(), request.port(), e);
            let reply = request.reply(SocksStatus::CONNECTION_REFUSED, None);
            client_w
                .write_all(&reply)
                .await
                .context("couldn't write SOCKS failure reply")?;
            return Ok(());
        }
    };
    let bound = upstream
        .local_addr()
        .context("upstream socket has no local address")?;
    debug!(
        "connected to {}:{} from {}",
        request.addr(),
        request.port(),
        bound
    );

    let reply = request.reply(SocksStatus::SUCCEEDED, Some(bound));
    client_w
        .write_all(&reply)
        .await
        .context("couldn't write SOCKS success reply")?;

    // Part 3: relay bytes until one side hangs up.  Any client bytes
    // already sitting in the handshake buffer go along too.
    info!("forwarding between {} and {}:{}", addr, request.addr(), request.port());
    let client = client_r.unsplit(client_w);
    let result = relay::run(client, upstream, request.version(), &inbuf[..n_read]).await;
    info!(
        "forwarding between {} and {}:{} ended",
        addr,
        request.addr(),
        request.port()
    );
    result.context("error while relaying")?;
    Ok(())
}

/// Resolve a request's destination to a socket address.
///
/// IP literals pass through unchanged.  Hostnames get a forward
/// lookup, keeping the first IPv4 result; the client only ever sees
/// the address the reply is built from, so a resolved hostname always
/// answers with an IPv4 bind address.
async fn resolve_dest(request: &SocksRequest) -> Result<SocketAddr> {
    let port = request.port();
    let dest = match request.addr() {
        SocksAddr::Ip(ip) => SocketAddr::new(*ip, port),
        SocksAddr::Hostname(h) => {
            let host = h.as_ref();
            let mut addrs = lookup_host((host, port))
                .await
                .with_context(|| format!("couldn't resolve {}", host))?;
            let addr = addrs
                .find(|a| a.is_ipv4())
                .ok_or_else(|| anyhow!("no IPv4 address for {}", host))?;
            debug!("resolved {} to {}", host, addr.ip());
            addr
        }
    };
    Ok(dest)
}

/// Open the upstream TCP connection for a request, bounded by
/// [`CONNECT_TIMEOUT`].
async fn connect_to_dest(request: &SocksRequest) -> Result<TcpStream> {
    let dest = resolve_dest(request).await?;
    let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(dest))
        .await
        .map_err(|_| anyhow!("connection to {} timed out", dest))?
        .with_context(|| format!("couldn't connect to {}", dest))?;
    Ok(stream)
}
