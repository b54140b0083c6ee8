//! Key-decoder and buffer benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use keyline::keymap::KeyMap;
use keyline::{keys, Insert, Key, Text};

fn decoder() -> KeyMap {
    KeyMap::new([
        (keys::EOF, vec![0x04]),
        (keys::SUSPEND, vec![0x1a]),
        (keys::INTERRUPT, vec![0x03]),
        (keys::QUIT, vec![0x1c]),
        (keys::UP, b"\x1b[A".to_vec()),
        (keys::DOWN, b"\x1b[B".to_vec()),
        (keys::ENTER, b"\r".to_vec()),
    ])
}

fn bench_decode_plain_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("keymap");

    let plain = "the quick brown fox ".repeat(500);
    group.throughput(Throughput::Bytes(plain.len() as u64));

    group.bench_function("plain_text", |b| {
        b.iter(|| {
            let mut map = decoder();
            let mut keys_out: Vec<Key> = Vec::new();
            for &byte in black_box(plain.as_bytes()) {
                keys_out.extend(map.feed(byte));
            }
            black_box(keys_out)
        })
    });

    group.finish();
}

fn bench_decode_escape_sequences(c: &mut Criterion) {
    let mut group = c.benchmark_group("keymap");

    let stream = "abc\x1b[A\x1b[1;5D\x1bf\x1b[6~".repeat(200);
    group.throughput(Throughput::Bytes(stream.len() as u64));

    group.bench_function("escape_sequences", |b| {
        b.iter(|| {
            let mut map = decoder();
            let mut keys_out: Vec<Key> = Vec::new();
            for &byte in black_box(stream.as_bytes()) {
                keys_out.extend(map.feed(byte));
            }
            black_box(keys_out)
        })
    });

    group.finish();
}

fn bench_text_editing(c: &mut Criterion) {
    let mut group = c.benchmark_group("text");

    group.bench_function("insert_delete_with_cursors", |b| {
        b.iter(|| {
            let mut text = Text::new();
            let begin = text.begin();
            text.insert(Insert::Left, &begin, &"lorem ipsum\n".repeat(20));
            // A handful of live cursors to keep updated.
            let cursors: Vec<_> = (0..8).map(|n| text.begin().moved(n * 7, 0)).collect();
            for cursor in &cursors {
                text.insert(Insert::Left, cursor, "x");
            }
            let from = text.begin().moved(3, 0);
            let to = text.begin_line(10);
            text.delete(&from, &to);
            black_box(text.get_all())
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_decode_plain_text,
    bench_decode_escape_sequences,
    bench_text_editing
);
criterion_main!(benches);
