//! Single rule patterns and legacy-host rewrites.

use regex::Regex;
use serde::Deserialize;

use super::RuleError;

/// A compiled matcher from one of the rule families.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Input starts with the literal.
    Prefix(String),
    /// Input ends with the literal.
    Suffix(String),
    /// Input contains the literal anywhere.
    Contains(String),
    /// Input matches the regular expression.
    Regex(Regex),
}

impl Pattern {
    /// Returns `true` if `input` matches this pattern.
    pub fn matches(&self, input: &str) -> bool {
        match self {
            Pattern::Prefix(p) => input.starts_with(p.as_str()),
            Pattern::Suffix(s) => input.ends_with(s.as_str()),
            Pattern::Contains(c) => input.contains(c.as_str()),
            Pattern::Regex(re) => re.is_match(input),
        }
    }

    /// Returns `true` if any pattern in `patterns` matches `input`.
    pub fn any(patterns: &[Pattern], input: &str) -> bool {
        patterns.iter().any(|p| p.matches(input))
    }
}

/// On-disk form of a pattern: exactly one key must be set.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawPattern {
    #[serde(default)]
    prefix: Option<String>,
    #[serde(default)]
    suffix: Option<String>,
    #[serde(default)]
    contains: Option<String>,
    #[serde(default)]
    regex: Option<String>,
}

impl RawPattern {
    pub(crate) fn compile(self, family: &str) -> Result<Pattern, RuleError> {
        match (self.prefix, self.suffix, self.contains, self.regex) {
            (Some(p), None, None, None) => Ok(Pattern::Prefix(p)),
            (None, Some(s), None, None) => Ok(Pattern::Suffix(s)),
            (None, None, Some(c), None) => Ok(Pattern::Contains(c)),
            (None, None, None, Some(r)) => {
                Regex::new(&r)
                    .map(Pattern::Regex)
                    .map_err(|e| RuleError::InvalidPattern {
                        family: family.to_string(),
                        details: e.to_string(),
                    })
            }
            _ => Err(RuleError::InvalidPattern {
                family: family.to_string(),
                details: "pattern must set exactly one of prefix, suffix, contains, regex"
                    .to_string(),
            }),
        }
    }
}

/// A legacy host whose traffic is moved onto the local API endpoint.
///
/// With a fixed `port` only `host:port` matches; without one the host
/// matches with or without any port. The host must be the URL's authority,
/// either after a scheme (`http://`) or protocol-relative (`//`); a host
/// named later in the path or query does not match. Everything after the
/// host (and port) is carried over verbatim.
#[derive(Debug, Clone)]
pub struct HostRewrite {
    matcher: Regex,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawHostRewrite {
    host: String,
    #[serde(default)]
    port: Option<u16>,
}

impl RawHostRewrite {
    pub(crate) fn compile(self) -> Result<HostRewrite, RuleError> {
        HostRewrite::new(self.host, self.port)
    }
}

impl HostRewrite {
    /// Build a rewrite for `host`, optionally pinned to `port`.
    pub fn new(host: impl AsRef<str>, port: Option<u16>) -> Result<Self, RuleError> {
        let host = host.as_ref();
        if host.is_empty() {
            return Err(RuleError::InvalidPattern {
                family: "host_rewrites".to_string(),
                details: "host must not be empty".to_string(),
            });
        }
        let port_part = match port {
            Some(p) => format!(":{p}"),
            None => "(?::\\d+)?".to_string(),
        };
        let matcher = Regex::new(&format!(
            "^(?:[A-Za-z][A-Za-z0-9+.-]*:)?//{}{}([/?#].*)?$",
            regex::escape(host),
            port_part
        ))
        .map_err(|e| RuleError::InvalidPattern {
            family: "host_rewrites".to_string(),
            details: e.to_string(),
        })?;
        Ok(Self { matcher })
    }

    /// Returns the path-and-query that follows the legacy host in `url`,
    /// or `None` if `url` does not mention the host.
    pub fn remainder<'a>(&self, url: &'a str) -> Option<&'a str> {
        self.matcher
            .captures(url)
            .map(|c| c.get(1).map_or("", |m| m.as_str()))
    }
}
