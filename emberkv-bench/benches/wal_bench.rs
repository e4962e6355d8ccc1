//! WAL benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use emberkv_wal::{RecordType, Wal, WalConfig};
use tempfile::TempDir;

fn create_test_wal(force_sync: bool) -> (TempDir, Wal) {
    let dir = TempDir::new().unwrap();
    let config = WalConfig::new(dir.path())
        .with_force_sync(force_sync)
        .with_max_file_size(64 * 1024 * 1024);
    let wal = Wal::open(config).unwrap();
    (dir, wal)
}

fn bench_wal_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_append");

    for (name, force_sync) in [("buffered", false), ("force_sync", true)] {
        let (_dir, wal) = create_test_wal(force_sync);
        let value = vec![0xA5u8; 100];

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("small_record", name), &value, |b, value| {
            b.iter(|| {
                black_box(
                    wal.append(RecordType::Set, "bench-key", value.clone(), 0)
                        .unwrap(),
                )
            });
        });
    }

    // Payload size sweep without fsync.
    let (_dir, wal) = create_test_wal(false);
    for size in [100, 1_000, 10_000] {
        let value = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(
            BenchmarkId::new("value_bytes", size),
            &value,
            |b, value| {
                b.iter(|| {
                    black_box(
                        wal.append(RecordType::Set, "bench-key", value.clone(), 0)
                            .unwrap(),
                    )
                });
            },
        );
    }

    group.finish();
}

fn bench_wal_read_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("wal_read_all");

    for count in [100, 1_000] {
        let (_dir, wal) = create_test_wal(false);
        for i in 0..count {
            wal.append(RecordType::Set, &format!("key-{i}"), vec![0u8; 100], 0)
                .unwrap();
        }

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &wal, |b, wal| {
            b.iter(|| black_box(wal.read_all().unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_wal_append, bench_wal_read_all);
criterion_main!(benches);
