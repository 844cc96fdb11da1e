use criterion::{criterion_group, criterion_main};


criterion_group!(
    benches,
    client::bench_publish_qos0,
    client::bench_publish_qos1_roundtrip,
    client::bench_parse_inbound_publish,
);
criterion_main!(benches);
