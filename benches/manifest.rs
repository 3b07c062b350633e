//! Benchmark HLS playlist rendering for a full-length episode.
//!
//! A 24 minute episode at 5s segments is about 290 entries; playlists are
//! re-rendered on every player poll, so this is the hot read path.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reelcast_common::StreamMetadata;
use reelcast_media::hls;

fn episode_metadata(segments: u32) -> StreamMetadata {
    let mut metadata = StreamMetadata::new();
    for index in 0..segments {
        metadata.push_segment(index, if index % 7 == 6 { 4.8048 } else { 5.005 });
    }
    metadata.codecs.insert("avc1.640028".to_string());
    metadata.codecs.insert("mp4a.40.2".to_string());
    metadata.subtitle_text = Some("WEBVTT\n".to_string());
    metadata.subtitle_language = Some("eng".to_string());
    metadata
}

fn bench_manifest(c: &mut Criterion) {
    let metadata = episode_metadata(290);

    let mut group = c.benchmark_group("manifest");

    group.bench_function("media_playlist", |b| {
        b.iter(|| hls::media_playlist(black_box(&metadata), 5));
    });

    group.bench_function("master_playlist", |b| {
        b.iter(|| hls::master_playlist(black_box(&metadata), 5_000_000));
    });

    group.bench_function("subtitle_playlist", |b| {
        b.iter(|| hls::subtitle_playlist(black_box(&metadata)));
    });

    group.finish();
}

criterion_group!(benches, bench_manifest);
criterion_main!(benches);
