//! The post-handshake relay: pump bytes between the client and the
//! upstream until one of them hangs up.

use std::io::ErrorKind;
use std::io::Result as IoResult;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace, warn};

use stile_socksproto::SocksVersion;

/// Buffer size for each relay direction.
const RELAY_BUF_LEN: usize = 4096;

/// Copy bytes between `client` and `upstream`, in both directions,
/// until either side reaches EOF.
///
/// `pending` holds any client bytes that were read past the end of the
/// handshake; they are forwarded upstream before the loop begins.
///
/// When the negotiated version is SOCKS4, the leading byte of the very
/// first client-to-upstream chunk is dropped.  SOCKS5 traffic is never
/// altered.
///
/// A connection reset on either side is logged and tolerated: the loop
/// re-enters its wait instead of tearing down immediately.  Any other
/// error, or EOF, ends the relay and shuts down both sockets.
pub(crate) async fn run<C, U>(
    client: C,
    upstream: U,
    version: SocksVersion,
    pending: &[u8],
) -> IoResult<()>
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_r, mut client_w) = tokio::io::split(client);
    let (mut upstream_r, mut upstream_w) = tokio::io::split(upstream);

    let mut strip_next = version == SocksVersion::V4;

    if !pending.is_empty() {
        let chunk = if strip_next { &pending[1..] } else { pending };
        strip_next = false;
        trace!("client => upstream: {} leftover bytes", chunk.len());
        upstream_w.write_all(chunk).await?;
    }

    let mut client_buf = [0_u8; RELAY_BUF_LEN];
    let mut upstream_buf = [0_u8; RELAY_BUF_LEN];

    let result: IoResult<()> = loop {
        tokio::select! {
            res = client_r.read(&mut client_buf) => match res {
                Ok(0) => break Ok(()),
                Ok(n) => {
                    let chunk = if strip_next {
                        &client_buf[1..n]
                    } else {
                        &client_buf[..n]
                    };
                    strip_next = false;
                    trace!("client => upstream: {} bytes", chunk.len());
                    if let Err(e) = upstream_w.write_all(chunk).await {
                        if e.kind() == ErrorKind::ConnectionReset {
                            warn!("connection reset while writing upstream; carrying on");
                            continue;
                        }
                        break Err(e);
                    }
                }
                Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                    warn!("connection reset by client; carrying on");
                }
                Err(e) => break Err(e),
            },
            res = upstream_r.read(&mut upstream_buf) => match res {
                Ok(0) => break Ok(()),
                Ok(n) => {
                    trace!("upstream => client: {} bytes", n);
                    if let Err(e) = client_w.write_all(&upstream_buf[..n]).await {
                        if e.kind() == ErrorKind::ConnectionReset {
                            warn!("connection reset while writing to client; carrying on");
                            continue;
                        }
                        break Err(e);
                    }
                }
                Err(e) if e.kind() == ErrorKind::ConnectionReset => {
                    warn!("connection reset by upstream; carrying on");
                }
                Err(e) => break Err(e),
            },
        }
    };

    // One side is done; unblock whoever is still waiting on the other.
    let _ = client_w.shutdown().await;
    let _ = upstream_w.shutdown().await;
    debug!("relay loop finished");
    result
}
