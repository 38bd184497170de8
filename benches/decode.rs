use std::sync::Arc;
use std::time::Duration;

use criterion::measurement::WallTime;
use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion, Throughput,
};
use kat_bind::pipe::record::parse;
use kat_bind::{
    from_reader, from_slice, to_value, Chain, DecodeOptions, Format, Parser, Record, Registry,
    SliceReader,
};
use serde::Deserialize;
use serde_json::Value;

#[derive(Default, Deserialize)]
struct Row {
    id: u64,
    name: String,
    active: bool,
    score: f64,
}

impl Record for Row {
    fn accept(&mut self, _tag: &Chain, key: &Chain, value: &Chain) -> kat_bind::Result<()> {
        match key.as_bytes() {
            b"id" => self.id = parse(value)?,
            b"name" => self.name = value.to_string(),
            b"active" => self.active = parse(value)?,
            b"score" => self.score = parse(value)?,
            _ => {}
        }
        Ok(())
    }
}

fn make_rows(count: usize) -> [String; 3] {
    let mut kat = String::from("L{");
    let mut json = String::from("[");
    let mut xml = String::from("<rows>");
    for index in 0..count {
        let name = format!("user {index} <{}>", index % 7);
        let score = index as f64 * 1.5;
        let active = index % 3 == 0;
        kat.push_str(&format!(
            "M{{i:id({index})s:name({name})b:active({active})d:score({score})}}"
        ));
        if index > 0 {
            json.push(',');
        }
        json.push_str(&format!(
            r#"{{"id":{index},"name":"{name}","active":{active},"score":{score}}}"#
        ));
        xml.push_str(&format!(
            "<row id=\"{index}\"><name>{}</name><active>{active}</active><score>{score}</score></row>",
            name.replace('<', "&lt;").replace('>', "&gt;")
        ));
    }
    kat.push('}');
    json.push(']');
    xml.push_str("</rows>");
    [kat, json, xml]
}

fn make_tree(depth: usize, width: usize) -> String {
    if depth == 0 {
        return r#""leaf""#.to_string();
    }
    let children: Vec<String> = (0..width)
        .map(|index| format!(r#""c{index}":{}"#, make_tree(depth - 1, width)))
        .collect();
    format!("{{{}}}", children.join(","))
}

fn bench_formats(group: &mut BenchmarkGroup<'_, WallTime>, name: &str, inputs: &[String; 3]) {
    for (format, input) in [Format::Kat, Format::Json, Format::Xml].into_iter().zip(inputs) {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_function(BenchmarkId::new(format.to_string(), name), |b| {
            b.iter(|| {
                let value = to_value(format, black_box(input.as_bytes())).unwrap();
                black_box(value);
            });
        });
    }

    let json = &inputs[1];
    group.throughput(Throughput::Bytes(json.len() as u64));
    group.bench_function(BenchmarkId::new("serde_json", name), |b| {
        b.iter(|| {
            let value: Value = serde_json::from_slice(black_box(json.as_bytes())).unwrap();
            black_box(value);
        });
    });
}

fn bench_records(group: &mut BenchmarkGroup<'_, WallTime>, registry: &Arc<Registry>) {
    let row = br#"{"id":42,"name":"kraity","active":true,"score":9.5,"extra":{"skipped":[1,2,3]}}"#;
    group.throughput(Throughput::Bytes(row.len() as u64));
    group.bench_function(BenchmarkId::new("record", "pooled"), |b| {
        b.iter(|| {
            let row: Row = from_slice(Format::Json, black_box(row), registry).unwrap();
            black_box(row);
        });
    });
    group.bench_function(BenchmarkId::new("record", "fresh_parser"), |b| {
        b.iter(|| {
            let mut parser = Parser::new();
            let mut reader = SliceReader::new(black_box(row));
            let row: Row = parser
                .decode(Format::Json, &mut reader, registry, &DecodeOptions::default())
                .unwrap();
            black_box(row);
        });
    });
    group.bench_function(BenchmarkId::new("record", "stream"), |b| {
        b.iter(|| {
            let row: Row = from_reader(Format::Json, black_box(&row[..]), registry).unwrap();
            black_box(row);
        });
    });
    group.bench_function(BenchmarkId::new("record", "serde_json"), |b| {
        b.iter(|| {
            let row: Row = serde_json::from_slice(black_box(row)).unwrap();
            black_box(row);
        });
    });
}

fn criterion_config() -> Criterion {
    if std::env::var("KAT_BENCH_MINIMAL").is_ok() {
        Criterion::default()
            .warm_up_time(Duration::from_secs(0))
            .measurement_time(Duration::from_millis(10))
            .sample_size(10)
            .nresamples(1)
    } else {
        Criterion::default()
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let rows = make_rows(2000);
    let tree = make_tree(6, 4);

    let mut registry = Registry::standard();
    registry.register_record::<Row>("Row");
    let registry = Arc::new(registry);

    let mut group = c.benchmark_group("decode");
    bench_formats(&mut group, "rows", &rows);
    group.finish();

    let mut group = c.benchmark_group("decode_tree");
    group.throughput(Throughput::Bytes(tree.len() as u64));
    group.bench_function(BenchmarkId::new("json", "tree"), |b| {
        b.iter(|| {
            let value = to_value(Format::Json, black_box(tree.as_bytes())).unwrap();
            black_box(value);
        });
    });
    group.finish();

    let mut group = c.benchmark_group("records");
    bench_records(&mut group, &registry);
    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = criterion_benchmark
}
criterion_main!(benches);
