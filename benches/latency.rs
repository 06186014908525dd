use criterion::{criterion_group, criterion_main, Criterion};
use ethers::types::U256;
use rust_decimal::Decimal;
use std::hint::black_box;
use token_balance_card::format::{fiat_estimate, format_balance, format_exact};
use token_balance_card::ChainAddress;

fn benchmark_address(c: &mut Criterion) {
    let mut group = c.benchmark_group("address_validation");

    group.bench_function("checksummed", |b| {
        b.iter(|| ChainAddress::parse(black_box("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed")))
    });

    group.bench_function("lowercase", |b| {
        b.iter(|| ChainAddress::parse(black_box("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed")))
    });

    group.finish();
}

fn benchmark_format(c: &mut Criterion) {
    let raw = U256::from_dec_str("123450000000000000000000").unwrap_or_default();
    let price = Decimal::new(1834, 4);

    let mut group = c.benchmark_group("balance_format");

    group.bench_function("display", |b| {
        b.iter(|| format_balance(black_box(raw), black_box(18)))
    });

    group.bench_function("exact", |b| {
        b.iter(|| format_exact(black_box(raw), black_box(18)))
    });

    group.bench_function("fiat", |b| {
        b.iter(|| fiat_estimate(black_box(raw), black_box(18), black_box(Some(price))))
    });

    group.finish();
}

criterion_group!(benches, benchmark_address, benchmark_format);
criterion_main!(benches);
