use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mapred::{Config, MapReduce};

/// Documents of random short words drawn from a bounded vocabulary, so runs
/// exercise both the duplicate-count path and fresh inserts.
fn make_docs(docs: usize, words_per_doc: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(42);
    let vocabulary: Vec<String> = (0..500)
        .map(|_| {
            (0..rng.gen_range(3..=8))
                .map(|_| (b'a' + rng.gen_range(0..26u8)) as char)
                .collect()
        })
        .collect();
    (0..docs)
        .map(|_| {
            (0..words_per_doc)
                .map(|_| vocabulary[rng.gen_range(0..vocabulary.len())].as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn word_count(engine: &MapReduce, docs: &[String]) -> u64 {
    let total = std::sync::atomic::AtomicU64::new(0);
    engine
        .run(
            docs,
            |emitter, doc| {
                for word in doc.split_whitespace() {
                    emitter.emit(word, "1");
                }
            },
            |key, puller| {
                let mut n = 0;
                while puller.pull(key) {
                    n += 1;
                }
                total.fetch_add(n, std::sync::atomic::Ordering::Relaxed);
            },
        )
        .unwrap();
    total.into_inner()
}

fn bench_word_count(c: &mut Criterion) {
    let docs = make_docs(64, 2000);
    let mut group = c.benchmark_group("word_count");

    for (mappers, reducers) in [(1, 1), (4, 4), (8, 4)] {
        let engine = MapReduce::new(Config {
            partitions: 32,
            mappers,
            reducers,
        });
        group.bench_function(format!("{mappers}m_{reducers}r"), |b| {
            b.iter(|| word_count(black_box(&engine), black_box(&docs)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_word_count);
criterion_main!(benches);
