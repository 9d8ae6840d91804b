//! Command-line and environment configuration.

use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::logging_layer::LogFormat;
use crate::rules::{RuleError, RuleSource, RuleTable};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "gameres-gate",
    about = "Local-first resource gateway for the legacy game client",
    version
)]
pub struct GateConfig {
    /// Address both servers bind to
    #[arg(long, env = "GAMERES_BIND", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind: IpAddr,

    /// Dispatch gateway port
    #[arg(long, env = "GAMERES_GATEWAY_PORT", default_value_t = 9990)]
    pub gateway_port: u16,

    /// Static web-root server port
    #[arg(long, env = "GAMERES_STATIC_PORT", default_value_t = 9991)]
    pub static_port: u16,

    /// Upstream origin; overrides the rule table's upstream endpoint
    #[arg(long, env = "GAMERES_UPSTREAM")]
    pub upstream: Option<String>,

    /// Directory holding local game resources
    #[arg(long, env = "GAMERES_ASSET_ROOT", default_value = "nieoasset")]
    pub asset_root: PathBuf,

    /// Directory served by the static server
    #[arg(long, env = "GAMERES_STATIC_ROOT", default_value = "public")]
    pub static_root: PathBuf,

    /// YAML rule table replacing the embedded one
    #[arg(long, env = "GAMERES_RULES")]
    pub rules: Option<PathBuf>,

    /// Operating mode flag (true = local, false = official); unset means local
    #[arg(long, env = "GAMERES_LOCAL_MODE")]
    pub local_mode: Option<bool>,

    /// Capacity of the missing-resource channel
    #[arg(long, env = "GAMERES_MISS_CAPACITY", default_value_t = 1024)]
    pub miss_capacity: usize,

    /// Write missing-resource notifications to stdout as JSON lines
    #[arg(long, env = "GAMERES_EMIT_MISSES")]
    pub emit_misses: bool,

    /// Log output format
    #[arg(long, env = "GAMERES_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            gateway_port: 9990,
            static_port: 9991,
            upstream: None,
            asset_root: PathBuf::from("nieoasset"),
            static_root: PathBuf::from("public"),
            rules: None,
            local_mode: None,
            miss_capacity: 1024,
            emit_misses: false,
            log_format: LogFormat::Pretty,
        }
    }
}

impl GateConfig {
    pub fn gateway_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.gateway_port)
    }

    pub fn static_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.static_port)
    }

    /// Base URL clients use to reach the dispatch gateway.
    pub fn local_gateway_url(&self) -> String {
        let host = if self.bind.is_unspecified() {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            self.bind
        };
        format!("http://{}", SocketAddr::new(host, self.gateway_port))
    }

    /// Load the rule table and point its endpoints at this configuration.
    ///
    /// # Errors
    ///
    /// Returns `RuleError` if the override file or the embedded table is
    /// invalid.
    pub fn load_rules(&self) -> Result<Arc<RuleTable>, RuleError> {
        let table = match &self.rules {
            Some(path) => RuleTable::from_file(path)?,
            None => RuleTable::embedded()?.as_ref().clone(),
        };
        let table = match &self.upstream {
            Some(upstream) => table.with_upstream(upstream.trim_end_matches('/')),
            None => table,
        };
        let table = table.with_local_gateway(self.local_gateway_url());

        let stats = table.stats();
        match table.source() {
            RuleSource::Embedded => info!(?stats, "using embedded rule table"),
            RuleSource::File { path, .. } => info!(path, ?stats, "loaded rule table"),
        }
        Ok(Arc::new(table))
    }
}
