use cdfio::{CdfFile, CdfWriter, DataType, TargetType, TypedArray, VariableSpec, WriterConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;

const RECORDS: usize = 3000;
const BLOCK: usize = 250;

fn build_file(compressed: bool) -> CdfFile {
    let mut rng = rand::thread_rng();
    let mut writer = CdfWriter::new(WriterConfig::default().with_checksum(false));
    let mut spec = VariableSpec::new("field", DataType::Real8).dims(&[3]);
    if compressed {
        spec = spec.compressed();
    }
    writer.define_variable(spec).unwrap();
    for _ in 0..RECORDS / BLOCK {
        let values: Vec<f64> = (0..BLOCK * 3).map(|_| rng.gen_range(-1.0e4..1.0e4)).collect();
        writer.append("field", None, TypedArray::F64(values)).unwrap();
    }
    CdfFile::from_bytes(writer.finalize().unwrap()).unwrap()
}

fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize");
    group.throughput(Throughput::Elements((RECORDS * 3) as u64));

    for compressed in [false, true] {
        let file = build_file(compressed);
        let label = if compressed { "gzip" } else { "raw" };
        for chunk in [64usize, 1024, 1 << 20] {
            let prepared = file
                .extract("field")
                .unwrap()
                .target(TargetType::F64)
                .chunk_elements(chunk)
                .build()
                .unwrap();
            group.bench_with_input(BenchmarkId::new(label, chunk), &prepared, |b, prepared| {
                b.iter(|| black_box(prepared.materialize().unwrap()))
            });
        }
    }
    group.finish();
}

fn bench_narrowing(c: &mut Criterion) {
    let file = build_file(false);
    let prepared = file
        .extract("field")
        .unwrap()
        .target(TargetType::F32)
        .preserve(false)
        .build()
        .unwrap();
    c.bench_function("materialize_f64_to_f32", |b| {
        b.iter(|| black_box(prepared.materialize().unwrap()))
    });
}

criterion_group!(benches, bench_materialize, bench_narrowing);
criterion_main!(benches);
