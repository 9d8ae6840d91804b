//! Shared routing rule table.
//!
//! One versioned table holds the four pattern families (exclude, block,
//! force-proxy, resource), the login-endpoint patterns and the legacy-host
//! rewrites. The client request router and the dispatch gateway both consume
//! the same table, so the two enforcement points cannot drift apart.
//!
//! # Sources
//!
//! - [`RuleTable::embedded`]: the table compiled into the binary.
//! - [`RuleTable::from_file`]: a YAML override with the same layout.

pub mod pattern;

pub use pattern::{HostRewrite, Pattern};

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use pattern::{RawHostRewrite, RawPattern};

/// Rule table layout version understood by this build.
pub const RULE_TABLE_VERSION: u32 = 1;

const EMBEDDED_RULES: &str = include_str!("default_rules.yaml");

static EMBEDDED: Lazy<Result<Arc<RuleTable>, RuleError>> =
    Lazy::new(|| RuleTable::from_yaml(EMBEDDED_RULES, RuleSource::Embedded).map(Arc::new));

/// Fixed addresses the rules rewrite onto.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Endpoints {
    /// Base URL of the local dispatch gateway.
    pub local_gateway: String,
    /// Base URL of the locally hosted authentication API.
    pub api_gateway: String,
    /// Base URL of the fixed upstream origin.
    pub upstream: String,
    /// Origins the legacy client hard-codes for game resources.
    #[serde(default)]
    pub legacy_origins: Vec<String>,
}

/// Where a rule table was loaded from.
#[derive(Debug, Clone)]
pub enum RuleSource {
    /// Compiled into the binary
    Embedded,

    /// Loaded from an override file
    File {
        /// File path
        path: String,
        /// When it was loaded
        loaded_at: std::time::SystemTime,
    },
}

/// Rule table errors.
#[derive(Debug, Error, Clone)]
pub enum RuleError {
    /// Rule file not found
    #[error("Rule file not found: {path}")]
    FileNotFound {
        /// Path that was not found
        path: String,
    },

    /// Rule file could not be read
    #[error("Rule file unreadable: {path}: {details}")]
    Unreadable {
        /// Path of the file
        path: String,
        /// I/O error details
        details: String,
    },

    /// YAML syntax or shape error
    #[error("Rule table parse error: {details}")]
    ParseError {
        /// Error details
        details: String,
    },

    /// A single pattern failed to compile
    #[error("Invalid pattern in {family}: {details}")]
    InvalidPattern {
        /// Rule family the pattern belongs to
        family: String,
        /// Error details
        details: String,
    },

    /// Table declares a layout this build does not understand
    #[error("Unsupported rule table version {found} (expected {RULE_TABLE_VERSION})")]
    UnsupportedVersion {
        /// Version found in the document
        found: u32,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRuleTable {
    version: u32,
    endpoints: Endpoints,
    #[serde(default)]
    exclude: Vec<RawPattern>,
    #[serde(default)]
    block: Vec<RawPattern>,
    #[serde(default)]
    force_proxy: Vec<RawPattern>,
    #[serde(default)]
    resource: Vec<RawPattern>,
    #[serde(default)]
    login: Vec<RawPattern>,
    #[serde(default)]
    host_rewrites: Vec<RawHostRewrite>,
}

/// Compiled, read-only routing rules.
#[derive(Debug, Clone)]
pub struct RuleTable {
    version: u32,
    source: RuleSource,
    endpoints: Endpoints,
    exclude: Vec<Pattern>,
    block: Vec<Pattern>,
    force_proxy: Vec<Pattern>,
    resource: Vec<Pattern>,
    login: Vec<Pattern>,
    host_rewrites: Vec<HostRewrite>,
}

fn compile_family(raw: Vec<RawPattern>, family: &str) -> Result<Vec<Pattern>, RuleError> {
    raw.into_iter().map(|p| p.compile(family)).collect()
}

impl RuleTable {
    /// The table compiled into the binary.
    pub fn embedded() -> Result<Arc<RuleTable>, RuleError> {
        EMBEDDED.clone()
    }

    /// Parse a YAML rule document.
    pub fn from_yaml(yaml: &str, source: RuleSource) -> Result<Self, RuleError> {
        let raw: RawRuleTable = serde_yml::from_str(yaml).map_err(|e| RuleError::ParseError {
            details: e.to_string(),
        })?;

        if raw.version != RULE_TABLE_VERSION {
            return Err(RuleError::UnsupportedVersion { found: raw.version });
        }

        Ok(Self {
            version: raw.version,
            source,
            endpoints: raw.endpoints,
            exclude: compile_family(raw.exclude, "exclude")?,
            block: compile_family(raw.block, "block")?,
            force_proxy: compile_family(raw.force_proxy, "force_proxy")?,
            resource: compile_family(raw.resource, "resource")?,
            login: compile_family(raw.login, "login")?,
            host_rewrites: raw
                .host_rewrites
                .into_iter()
                .map(RawHostRewrite::compile)
                .collect::<Result<_, _>>()?,
        })
    }

    /// Load an override table from disk.
    pub fn from_file(path: &Path) -> Result<Self, RuleError> {
        let display = path.display().to_string();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RuleError::FileNotFound {
                    path: display.clone(),
                }
            } else {
                RuleError::Unreadable {
                    path: display.clone(),
                    details: e.to_string(),
                }
            }
        })?;
        Self::from_yaml(
            &yaml,
            RuleSource::File {
                path: display,
                loaded_at: std::time::SystemTime::now(),
            },
        )
    }

    /// Replace the upstream base for both enforcement points.
    pub fn with_upstream(mut self, upstream: impl Into<String>) -> Self {
        self.endpoints.upstream = upstream.into();
        self
    }

    /// Replace the local gateway base the client rewrites onto.
    pub fn with_local_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.endpoints.local_gateway = gateway.into();
        self
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn source(&self) -> &RuleSource {
        &self.source
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn is_excluded(&self, url: &str) -> bool {
        Pattern::any(&self.exclude, url)
    }

    pub fn is_blocked(&self, url: &str) -> bool {
        Pattern::any(&self.block, url)
    }

    /// Force-proxy patterns apply to the path component only.
    pub fn is_force_proxy(&self, path: &str) -> bool {
        Pattern::any(&self.force_proxy, path)
    }

    pub fn is_resource(&self, url: &str) -> bool {
        Pattern::any(&self.resource, url)
    }

    pub fn is_login(&self, url: &str) -> bool {
        Pattern::any(&self.login, url)
    }

    /// Rewrite a legacy authentication-host URL onto the local API endpoint.
    pub fn rewrite_legacy_host(&self, url: &str) -> Option<String> {
        self.host_rewrites
            .iter()
            .find_map(|rw| rw.remainder(url))
            .map(|rest| format!("{}{}", self.endpoints.api_gateway, rest))
    }

    /// Pattern counts per family, for startup logging.
    pub fn stats(&self) -> RuleStats {
        RuleStats {
            exclude: self.exclude.len(),
            block: self.block.len(),
            force_proxy: self.force_proxy.len(),
            resource: self.resource.len(),
            login: self.login.len(),
            host_rewrites: self.host_rewrites.len(),
        }
    }
}

/// Pattern counts per family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuleStats {
    pub exclude: usize,
    pub block: usize,
    pub force_proxy: usize,
    pub resource: usize,
    pub login: usize,
    pub host_rewrites: usize,
}
