//! Route decisions produced by the client request router.
//!
//! Every outgoing call resolves to exactly one [`RouteDecision`]. The
//! decision is computed synchronously from the shared rule table and is
//! never persisted.

/// Where a request goes after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Issue the call unchanged.
    PassThrough(String),

    /// Issue the call against the local dispatch gateway.
    ///
    /// Host-relative URLs and URLs already on the gateway are carried
    /// over as-is; legacy resource origins are rewritten.
    Local(String),

    /// Issue the call against the fixed upstream origin.
    Upstream(String),

    /// Issue the call against the locally hosted authentication API.
    ApiGateway(String),

    /// Never touch the network; the adapter synthesizes an empty success.
    Block,
}

/// Why a request was routed the way it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteReason {
    /// URL named a legacy authentication host.
    LegacyAuthHost,
    /// URL matched an exclusion pattern.
    Excluded,
    /// URL matched a telemetry block pattern.
    Blocked,
    /// Path matched a force-proxy pattern.
    ForceProxy,
    /// Legacy resource origin rewritten onto the local gateway.
    LocalFirst,
    /// Resource URL already targets the local gateway.
    AlreadyLocal,
    /// Host-relative resource URL, resolved by the page against the gateway.
    Relative,
    /// Resource URL on an origin the rules do not own.
    ForeignOrigin,
    /// No rule family matched.
    Unmatched,
}

/// The result of resolving one outgoing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub outcome: RouteOutcome,
    pub reason: RouteReason,
}

impl RouteDecision {
    pub fn new(outcome: RouteOutcome, reason: RouteReason) -> Self {
        Self { outcome, reason }
    }

    /// Returns `true` if the call must not reach the network.
    pub fn is_block(&self) -> bool {
        matches!(self.outcome, RouteOutcome::Block)
    }

    /// Returns `true` if the effective target differs from `original`.
    pub fn is_rewrite(&self, original: &str) -> bool {
        self.target().is_some_and(|t| t != original)
    }

    /// Returns the URL the call should actually be issued against.
    pub fn target(&self) -> Option<&str> {
        match &self.outcome {
            RouteOutcome::PassThrough(u)
            | RouteOutcome::Local(u)
            | RouteOutcome::Upstream(u)
            | RouteOutcome::ApiGateway(u) => Some(u),
            RouteOutcome::Block => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_decision() {
        let d = RouteDecision::new(RouteOutcome::Block, RouteReason::Blocked);
        assert!(d.is_block());
        assert_eq!(d.target(), None);
        assert!(!d.is_rewrite("http://stat.taomee.com/x"));
    }

    #[test]
    fn test_pass_through_is_not_rewrite() {
        let url = "https://unpkg.com/ruffle/ruffle.js";
        let d = RouteDecision::new(
            RouteOutcome::PassThrough(url.to_string()),
            RouteReason::Excluded,
        );
        assert!(!d.is_block());
        assert_eq!(d.target(), Some(url));
        assert!(!d.is_rewrite(url));
    }

    #[test]
    fn test_api_gateway_rewrite() {
        let d = RouteDecision::new(
            RouteOutcome::ApiGateway("http://127.0.0.1:8211/seer/login".to_string()),
            RouteReason::LegacyAuthHost,
        );
        assert!(d.is_rewrite("http://45.125.46.70:8211/seer/login"));
    }
}
