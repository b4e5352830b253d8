//! A small SOCKS proxy daemon.
//!
//! stile listens on a TCP port, speaks SOCKS4 and SOCKS5 to whoever
//! connects, and relays each accepted CONNECT to its destination.

#![warn(missing_docs)]

mod proxy;
mod relay;

use std::sync::Arc;

use anyhow::Result;
use argh::FromArgs;
use serde::Deserialize;

use crate::proxy::ProxyConfig;

#[derive(FromArgs, Debug, Clone)]
/// Listen on a TCP port, speak SOCKS4/SOCKS5, and proxy traffic.
struct Args {
    /// override the default location(s) for the configuration file
    #[argh(option, short = 'f')]
    rc: Vec<String>,
    /// override a configuration option (uses toml syntax)
    #[argh(option, short = 'c')]
    cfg: Vec<String>,
}

/// Default options to use for our configuration.
const STILE_DEFAULTS: &str = include_str!("./stile_defaults.toml");

/// Structure to hold our configuration options, whether from a
/// configuration file or the command line.
#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct StileConfig {
    /// Whether to log at trace level.
    trace: bool,

    /// The SOCKS proxy server itself.
    proxy: ProxyConfig,
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();

    let mut cfg = config::Config::new();
    cfg.merge(config::File::from_str(
        STILE_DEFAULTS,
        config::FileFormat::Toml,
    ))?;
    for file in &args.rc {
        cfg.merge(config::File::new(file, config::FileFormat::Toml))?;
    }
    for opt in &args.cfg {
        cfg.merge(config::File::from_str(opt, config::FileFormat::Toml))?;
    }
    let config: StileConfig = cfg.try_into()?;

    let level = if config.trace {
        tracing::Level::TRACE
    } else {
        tracing::Level::DEBUG
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(proxy::run_proxy(Arc::new(config.proxy)))
}
