use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kfxmod::codec::{compress, decompress, Variant};
use kfxmod::metadata::ModMetadata;
use kfxmod::writer::{pack_dir, PackOptions};

const BENCH_META: &[u8] = br#"{"id":"bench_mod","version":"1.0","format_version":1}"#;

fn bench_codec(c: &mut Criterion) {
    let data: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();

    c.bench_function("zlib_compress_1mb", |b| {
        b.iter(|| compress(Variant::Zlib, black_box(&data)).unwrap())
    });

    let compressed = compress(Variant::Zlib, &data).unwrap();
    c.bench_function("zlib_decompress_1mb", |b| {
        b.iter(|| decompress(Variant::Zlib, black_box(&compressed), data.len()).unwrap())
    });
}

fn bench_pack_dir(c: &mut Criterion) {
    let dir = tempfile::TempDir::new().unwrap();
    let source = dir.path().join("mod");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::write(source.join("metadata.json"), BENCH_META).unwrap();
    let payload: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();
    std::fs::write(source.join("data.bin"), &payload).unwrap();
    let meta = ModMetadata::parse(BENCH_META).unwrap();
    let meta_path = source.join("metadata.json");

    c.bench_function("pack_1mb_zlib", |b| {
        b.iter(|| {
            let out = dir.path().join("out.kfxmod");
            pack_dir(
                &source,
                &out,
                meta.clone(),
                Some(&meta_path),
                &PackOptions::default(),
            )
            .unwrap()
        })
    });
}

criterion_group!(benches, bench_codec, bench_pack_dir);
criterion_main!(benches);
