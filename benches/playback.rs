use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tapedeck::{Cassette, MatcherSet, MemoryStorage, Mode, Recording, Request, Response};

fn request(i: usize) -> Request {
    Request::new("POST", format!("https://api.example.com/items/{i}"))
        .with_header("Content-Type", "application/json")
        .with_body(vec![b'x'; 256])
}

fn storage(size: usize) -> MemoryStorage {
    MemoryStorage::with_recordings(
        (0..size)
            .map(|i| Recording::new(&request(i), &Response::new(200).with_body(vec![b'y'; 1024])))
            .collect(),
    )
}

fn bench_scan_playback(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_playback");

    for size in [10, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let mut cassette =
                Cassette::new("bench", Mode::None, MatcherSet::default(), storage(size)).unwrap();
            let last = request(size - 1);

            b.iter(|| cassette.playback(black_box(&last)).unwrap());
        });
    }

    group.finish();
}

fn bench_strict_playback(c: &mut Criterion) {
    let mut group = c.benchmark_group("strict_playback");

    for size in [10, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let requests: Vec<Request> = (0..size).map(request).collect();

            b.iter(|| {
                let mut cassette =
                    Cassette::new("bench", Mode::Strict, MatcherSet::default(), storage(size))
                        .unwrap();
                for request in &requests {
                    black_box(cassette.playback(request).unwrap());
                }
                assert!(cassette.is_finished());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scan_playback, bench_strict_playback);
criterion_main!(benches);
