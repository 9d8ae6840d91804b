//! Path classifier.
//!
//! Pure string matching over the shared [`RuleTable`]: no state, no I/O, and
//! every input terminates with a verdict. Families are tried in a fixed
//! order and the first applicable family wins:
//!
//! 1. exclude     → pass through unchanged
//! 2. block       → synthesize an empty success
//! 3. force-proxy → always the fixed upstream (path component only)
//! 4. resource    → local-first candidate
//! 5. otherwise   → pass through unchanged
//!
//! Legacy authentication hosts are rewritten by [`route`] before any family
//! is consulted.

use crate::decision::{RouteDecision, RouteOutcome, RouteReason};
use crate::rules::RuleTable;

/// Classification verdict for one URL or path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    PassThrough,
    Block,
    ForceProxy,
    LocalFirst,
}

impl Verdict {
    pub fn is_block(&self) -> bool {
        matches!(self, Verdict::Block)
    }

    pub fn is_force_proxy(&self) -> bool {
        matches!(self, Verdict::ForceProxy)
    }
}

/// Classify `url` (absolute or host-relative) against `rules`.
pub fn classify(rules: &RuleTable, url: &str) -> Verdict {
    classify_with_reason(rules, url).0
}

fn classify_with_reason(rules: &RuleTable, url: &str) -> (Verdict, RouteReason) {
    if rules.is_excluded(url) {
        return (Verdict::PassThrough, RouteReason::Excluded);
    }
    if rules.is_blocked(url) {
        return (Verdict::Block, RouteReason::Blocked);
    }
    if rules.is_force_proxy(path_of(url)) {
        return (Verdict::ForceProxy, RouteReason::ForceProxy);
    }
    if rules.is_resource(url) {
        return (Verdict::LocalFirst, RouteReason::LocalFirst);
    }
    (Verdict::PassThrough, RouteReason::Unmatched)
}

/// Resolve the effective target of an outgoing call.
pub fn route(rules: &RuleTable, url: &str) -> RouteDecision {
    if let Some(target) = rules.rewrite_legacy_host(url) {
        return RouteDecision::new(RouteOutcome::ApiGateway(target), RouteReason::LegacyAuthHost);
    }

    let (verdict, reason) = classify_with_reason(rules, url);
    match verdict {
        Verdict::PassThrough => RouteDecision::new(RouteOutcome::PassThrough(url.to_string()), reason),
        Verdict::Block => RouteDecision::new(RouteOutcome::Block, reason),
        Verdict::ForceProxy => {
            let upstream = rules.endpoints().upstream.trim_end_matches('/');
            RouteDecision::new(
                RouteOutcome::Upstream(format!("{}{}", upstream, path_and_query(url))),
                reason,
            )
        }
        Verdict::LocalFirst => local_first(rules, url),
    }
}

fn local_first(rules: &RuleTable, url: &str) -> RouteDecision {
    let endpoints = rules.endpoints();

    if url.starts_with(endpoints.local_gateway.as_str()) {
        return RouteDecision::new(RouteOutcome::Local(url.to_string()), RouteReason::AlreadyLocal);
    }
    if split_origin(url).is_none() {
        return RouteDecision::new(RouteOutcome::Local(url.to_string()), RouteReason::Relative);
    }

    let legacy = endpoints
        .legacy_origins
        .iter()
        .find(|origin| url.starts_with(origin.as_str()));
    match legacy {
        Some(origin) => RouteDecision::new(
            RouteOutcome::Local(format!(
                "{}{}",
                endpoints.local_gateway.trim_end_matches('/'),
                &url[origin.len()..]
            )),
            RouteReason::LocalFirst,
        ),
        None => RouteDecision::new(
            RouteOutcome::PassThrough(url.to_string()),
            RouteReason::ForeignOrigin,
        ),
    }
}

/// Split an absolute URL into `(origin, rest)`.
///
/// Returns `None` for host-relative input. Protocol-relative `//host/...`
/// counts as absolute.
pub fn split_origin(url: &str) -> Option<(&str, &str)> {
    let authority_start = if url.starts_with("//") {
        2
    } else {
        let idx = url.find("://")?;
        let scheme = &url[..idx];
        let valid = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid {
            return None;
        }
        idx + 3
    };

    let rest_start = url[authority_start..]
        .find(['/', '?', '#'])
        .map_or(url.len(), |i| authority_start + i);
    Some((&url[..rest_start], &url[rest_start..]))
}

/// Path and query of `url`, without the fragment. Never empty.
pub fn path_and_query(url: &str) -> &str {
    let rest = split_origin(url).map_or(url, |(_, rest)| rest);
    let rest = rest.split('#').next().unwrap_or_default();
    if rest.is_empty() { "/" } else { rest }
}

/// Path component of `url`, without query or fragment. Never empty.
pub fn path_of(url: &str) -> &str {
    let pq = path_and_query(url);
    let path = pq.split('?').next().unwrap_or_default();
    if path.is_empty() { "/" } else { path }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn rules() -> Arc<RuleTable> {
        RuleTable::embedded().unwrap()
    }

    #[test]
    fn test_split_origin() {
        assert_eq!(
            split_origin("http://a.b:1/x/y?q=1"),
            Some(("http://a.b:1", "/x/y?q=1"))
        );
        assert_eq!(split_origin("https://a.b"), Some(("https://a.b", "")));
        assert_eq!(split_origin("//cdn.test/lib.js"), Some(("//cdn.test", "/lib.js")));
        assert_eq!(split_origin("/resource/a.json"), None);
        assert_eq!(split_origin("/go?u=http://x"), None);
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(path_and_query("http://h/dll/a.swf?v=2#top"), "/dll/a.swf?v=2");
        assert_eq!(path_of("http://h/dll/a.swf?v=2"), "/dll/a.swf");
        assert_eq!(path_of("http://h"), "/");
        assert_eq!(path_of("/config/x.xml"), "/config/x.xml");
    }

    #[test]
    fn test_family_order() {
        let r = rules();
        assert_eq!(classify(&r, "https://unpkg.com/ruffle-rs/ruffle.js"), Verdict::PassThrough);
        assert_eq!(classify(&r, "/pkg/core.wasm"), Verdict::PassThrough);
        assert_eq!(classify(&r, "http://stat.taomee.com/hit?x=1"), Verdict::Block);
        assert_eq!(classify(&r, "http://114.80.98.38/seer-err-report.cgi"), Verdict::Block);
        assert_eq!(classify(&r, "/dll/engine.swf"), Verdict::ForceProxy);
        assert_eq!(classify(&r, "/resource/map1.json"), Verdict::LocalFirst);
        assert_eq!(classify(&r, "/index.html"), Verdict::PassThrough);
    }

    #[test]
    fn test_exclusion_beats_resource() {
        let r = rules();
        assert_eq!(classify(&r, "/resource/ruffle/config.xml"), Verdict::PassThrough);
        assert_eq!(classify(&r, "/config/server-config.js"), Verdict::PassThrough);
    }

    #[test]
    fn test_route_legacy_auth_host() {
        let r = rules();
        let d = route(&r, "http://45.125.46.70:8211/seer/customer/login?name=a&b=2");
        assert_eq!(d.reason, RouteReason::LegacyAuthHost);
        assert_eq!(
            d.target(),
            Some("http://127.0.0.1:8211/seer/customer/login?name=a&b=2")
        );

        let d = route(&r, "http://by.ctymc.cn:20672/seer/login?t=9");
        assert_eq!(d.target(), Some("http://127.0.0.1:8211/seer/login?t=9"));
    }

    #[test]
    fn test_route_local_first() {
        let r = rules();

        let d = route(&r, "http://61.160.213.26:12346/resource/map1.json?v=3");
        assert_eq!(d.reason, RouteReason::LocalFirst);
        assert_eq!(d.target(), Some("http://127.0.0.1:9990/resource/map1.json?v=3"));

        let d = route(&r, "/resource/map1.json");
        assert_eq!(d.reason, RouteReason::Relative);
        assert_eq!(d.target(), Some("/resource/map1.json"));

        let d = route(&r, "http://127.0.0.1:9990/config/a.xml");
        assert_eq!(d.reason, RouteReason::AlreadyLocal);

        let d = route(&r, "http://other.test/resource/a.json");
        assert_eq!(d.reason, RouteReason::ForeignOrigin);
        assert_eq!(d.outcome, RouteOutcome::PassThrough("http://other.test/resource/a.json".into()));
    }

    #[test]
    fn test_route_force_proxy_targets_upstream() {
        let r = rules();
        let d = route(&r, "http://61.160.213.26:12346/dll/engine.swf?v=1");
        assert_eq!(
            d.outcome,
            RouteOutcome::Upstream("https://www.nieo.cc/dll/engine.swf?v=1".into())
        );
    }

    #[test]
    fn test_route_block() {
        let r = rules();
        assert!(route(&r, "http://log.taomee.com/x").is_block());
    }

    proptest! {
        #[test]
        fn prop_force_proxy_paths_classify_as_force_proxy(name in "[a-f0-9_]{1,16}") {
            let r = rules();
            let path = format!("/dll/{name}.swf");
            prop_assert_eq!(classify(&r, &path), Verdict::ForceProxy);
            prop_assert!(r.is_force_proxy(path_of(&path)));
        }

        #[test]
        fn prop_blocked_hosts_always_block(path in "/[a-z0-9/]{0,24}") {
            let r = rules();
            let url = format!("http://stat.taomee.com{path}");
            prop_assert!(route(&r, &url).is_block());
        }

        #[test]
        fn prop_legacy_host_preserves_path_and_query(
            path in "/[a-zA-Z0-9/_.-]{0,32}",
            query in "[a-z0-9=&]{0,16}",
        ) {
            let r = rules();
            let suffix = if query.is_empty() { path.clone() } else { format!("{path}?{query}") };
            let url = format!("http://45.125.46.70:8211{suffix}");
            let d = route(&r, &url);
            let expected = format!("http://127.0.0.1:8211{suffix}");
            prop_assert_eq!(d.target(), Some(expected.as_str()));
        }

        #[test]
        fn prop_classify_never_panics(url in ".{0,64}") {
            let r = rules();
            let _ = route(&r, &url);
        }
    }
}
