//! Criterion benchmarks for catalog search and request decoding.
//!
//! Search runs on the server's single dispatch path, under the state lock, so
//! its cost bounds how long every other request waits.
//!
//! Run with:
//! ```bash
//! cargo bench --package bittrickle-core --bench search_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use bittrickle_core::{decode_request, FileCatalog};

// ── Catalog fixture builders ──────────────────────────────────────────────────

/// Builds a catalog of `peers` identities with `files_per_peer` files each.
///
/// Identities are `peer-000`, `peer-001`, ...; files are `<peer>-file-<n>.dat`.
fn build_catalog(peers: usize, files_per_peer: usize) -> (FileCatalog, Vec<String>) {
    let mut catalog = FileCatalog::new();
    let identities: Vec<String> = (0..peers).map(|i| format!("peer-{i:03}")).collect();

    for identity in &identities {
        for n in 0..files_per_peer {
            catalog.publish(identity, &format!("{identity}-file-{n}.dat"));
        }
    }
    (catalog, identities)
}

// ── Benchmarks: search ────────────────────────────────────────────────────────

/// Benchmarks a selective search (few hits) as the number of peers grows.
fn bench_search_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_scaling");

    for &peers in &[4usize, 32, 128] {
        let (catalog, identities) = build_catalog(peers, 20);
        let active: Vec<&str> = identities.iter().map(String::as_str).collect();

        group.bench_with_input(BenchmarkId::new("peers", peers), &active, |b, active| {
            b.iter(|| {
                catalog.search(
                    black_box("peer-000"),
                    black_box("file-7."),
                    active.iter().copied(),
                )
            })
        });
    }

    group.finish();
}

/// Benchmarks a search that matches every file of every peer.
fn bench_search_match_all(c: &mut Criterion) {
    let (catalog, identities) = build_catalog(32, 20);
    let active: Vec<&str> = identities.iter().map(String::as_str).collect();

    c.bench_function("search_match_all_32x20", |b| {
        b.iter(|| catalog.search(black_box("nobody"), black_box(".dat"), active.iter().copied()))
    });
}

/// Benchmarks owner resolution for `get`.
fn bench_resolve_owner(c: &mut Criterion) {
    let (catalog, identities) = build_catalog(128, 20);
    let active: Vec<&str> = identities.iter().map(String::as_str).collect();

    c.bench_function("resolve_owner_128_peers", |b| {
        b.iter(|| catalog.resolve_owner(black_box("peer-127-file-19.dat"), active.iter().copied()))
    });
}

// ── Benchmarks: decode_request ────────────────────────────────────────────────

fn bench_decode_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_request");

    group.bench_function("heartbeat", |b| {
        b.iter(|| decode_request(black_box(b"HEARTBEAT")))
    });
    group.bench_function("auth", |b| {
        b.iter(|| decode_request(black_box(b"AUTH alice pw1 50123")))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_search_scaling,
    bench_search_match_all,
    bench_resolve_owner,
    bench_decode_request,
);
criterion_main!(benches);
