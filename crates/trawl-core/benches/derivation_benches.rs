//! Criterion benchmarks for the derivation hot path of a scan iteration.
//!
//! Covers: phrase generation, PBKDF2 seed stretching, single-address
//! derivation, and the four-scheme fan-out.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use trawl_core::mnemonic::mnemonic_to_seed;
use trawl_core::{DerivationEngine, WalletScheme, generate_mnemonic, parse_phrase};

const PHRASE: &str = "abandon abandon abandon abandon abandon abandon \
                      abandon abandon abandon abandon abandon about";

fn bench_generate(c: &mut Criterion) {
    c.bench_function("generate_mnemonic_12", |b| {
        b.iter(|| generate_mnemonic(black_box(12)))
    });
}

fn bench_seed(c: &mut Criterion) {
    let mnemonic = parse_phrase(PHRASE).expect("valid phrase");
    c.bench_function("mnemonic_to_seed", |b| {
        b.iter(|| mnemonic_to_seed(black_box(&mnemonic), ""))
    });
}

fn bench_derive(c: &mut Criterion) {
    let engine = DerivationEngine::default();
    let seed = engine.seed_from_phrase(PHRASE, "").expect("valid phrase");

    let mut group = c.benchmark_group("derive_address");
    for scheme in WalletScheme::ALL {
        group.bench_function(scheme.short_name(), |b| {
            b.iter(|| engine.derive_address(black_box(&seed), scheme, 0, 0, 0))
        });
    }
    group.finish();

    c.bench_function("derive_schemes", |b| {
        b.iter(|| engine.derive_schemes(black_box(&seed), 0))
    });
}

criterion_group!(benches, bench_generate, bench_seed, bench_derive);
criterion_main!(benches);
