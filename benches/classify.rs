//! Classification throughput over a mix of representative client URLs.

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use gameres_gate::classifier;
use gameres_gate::gateway::LocalStore;
use gameres_gate::rules::RuleTable;

const URLS: &[&str] = &[
    "/resource/map/1001.swf",
    "/dll/PetFightDLL.swf?v=20240101",
    "http://61.160.213.26:12346/resource/item/xml/items.xml",
    "http://45.125.46.70:8211/seer/customer/login",
    "http://stat.taomee.com/report.cgi?id=1",
    "https://unpkg.com/@ruffle-rs/ruffle/ruffle.js",
    "/public/dist/app.bundle.js",
    "https://cdn.example.com/fonts/a.woff2",
];

fn bench_route(c: &mut Criterion) {
    let Ok(rules) = RuleTable::embedded() else {
        return;
    };

    c.bench_function("route_mixed", |b| {
        b.iter(|| {
            for url in URLS {
                black_box(classifier::route(&rules, black_box(url)));
            }
        })
    });

    c.bench_function("classify_resource", |b| {
        b.iter(|| classifier::classify(&rules, black_box("/resource/map/1001.swf")))
    });
}

fn bench_resolve(c: &mut Criterion) {
    let store = LocalStore::new("/srv/nieoasset");
    c.bench_function("local_resolve", |b| {
        b.iter(|| store.resolve(black_box("/resource/item/xml/%E9%81%93%E5%85%B7.xml")))
    });
}

criterion_group!(benches, bench_route, bench_resolve);
criterion_main!(benches);
