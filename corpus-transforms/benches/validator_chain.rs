//! Criterion benchmarks for validator chain throughput.

use corpus_core::{Conversion, LengthBounds, PipelineConfig, Record, SchemaMode};
use corpus_transforms::build_chain;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

fn pretrain_records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            let content = match i % 3 {
                0 => "这是一个用于测试的中文句子，内容足够长。".repeat(8),
                1 => "plain ascii text that is neither garbled nor chinese ".repeat(4),
                _ => "ÿþÿþ garbled ÿþÿþ".repeat(6),
            };
            let length = content.chars().count();
            Record::from_value(json!({"Content": content, "File": "bench.jsonl", "Length": length}))
                .unwrap()
        })
        .collect()
}

fn dialogue_records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            let turns: Vec<_> = (0..(2 + i % 6))
                .map(|t| {
                    let role = if t % 2 == 0 { "human" } else { "gpt" };
                    json!({"from": role, "value": format!("第{t}轮对话内容 turn {t}")})
                })
                .collect();
            Record::from_value(json!({ "conversations": turns })).unwrap()
        })
        .collect()
}

fn bench_pretrain_chain(c: &mut Criterion) {
    let chain = build_chain(&PipelineConfig {
        reject_garbled: true,
        require_script: true,
        length: Some(LengthBounds::new(16, 1024)),
        ..Default::default()
    });

    let mut group = c.benchmark_group("chain/pretrain");
    for count in [1_000, 10_000] {
        let records = pretrain_records(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &records, |b, records| {
            b.iter(|| {
                records
                    .iter()
                    .filter(|r| chain.apply(black_box((*r).clone())).is_accepted())
                    .count()
            });
        });
    }
    group.finish();
}

fn bench_dialogue_chain(c: &mut Criterion) {
    let chain = build_chain(&PipelineConfig {
        schema: SchemaMode::Dialogue,
        conversion: Conversion::FlattenDialogue,
        size_budget: Some(4090),
        length: Some(LengthBounds::new(0, 4090)),
        ..Default::default()
    });

    let mut group = c.benchmark_group("chain/dialogue");
    for count in [1_000, 10_000] {
        let records = dialogue_records(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &records, |b, records| {
            b.iter(|| {
                records
                    .iter()
                    .filter(|r| chain.apply(black_box((*r).clone())).is_accepted())
                    .count()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pretrain_chain, bench_dialogue_chain);
criterion_main!(benches);
