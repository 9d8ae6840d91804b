#![no_main]

//! Fuzz target for URL routing and local path resolution.
//!
//! # Goal
//! Arbitrary URLs and request paths must never:
//! - Panic in classification or rewriting
//! - Produce a rewrite for a blocked URL
//! - Resolve a local path outside the asset root

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::path::Path;

use gameres_gate::classifier::{self, Verdict};
use gameres_gate::gateway::LocalStore;
use gameres_gate::rules::RuleTable;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    url: &'a str,
    path: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let Ok(rules) = RuleTable::embedded() else {
        return;
    };

    let verdict = classifier::classify(&rules, input.url);
    let decision = classifier::route(&rules, input.url);
    if verdict == Verdict::Block && rules.rewrite_legacy_host(input.url).is_none() {
        assert!(decision.target().is_none());
    }
    let _ = classifier::path_and_query(input.url);

    let root = Path::new("/fuzz-root");
    let store = LocalStore::new(root);
    if let Some(resolved) = store.resolve(input.path) {
        assert!(resolved.starts_with(root));
        assert!(!resolved.components().any(|c| matches!(c, std::path::Component::ParentDir)));
    }
});
