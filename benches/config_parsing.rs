//! Benchmark for config parsing and validation

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pulse::config::{PulseConfig, EXAMPLE_CONFIG};

fn bench_example_config(c: &mut Criterion) {
    c.bench_function("config_parse_example", |b| {
        b.iter(|| {
            let config: PulseConfig = toml::from_str(black_box(EXAMPLE_CONFIG)).unwrap();
            black_box(config)
        });
    });
}

fn bench_config_load_defaults(c: &mut Criterion) {
    c.bench_function("config_parse_defaults_only", |b| {
        b.iter(|| black_box(PulseConfig::load(None)));
    });
}

fn bench_config_validate(c: &mut Criterion) {
    let config: PulseConfig = toml::from_str(EXAMPLE_CONFIG).unwrap();

    c.bench_function("config_validate_example", |b| {
        b.iter(|| black_box(&config).validate().unwrap());
    });
}

criterion_group!(
    benches,
    bench_example_config,
    bench_config_load_defaults,
    bench_config_validate
);
criterion_main!(benches);
