use cdfio::{
    ByteOrder, CdfFile, CdfWriter, DataType, EncodedBlock, Error, ExtractionPool, Majority,
    RecordRange, RecordSelection, SparseRecords, TargetType, TypedArray, VariableSpec,
    WriterConfig,
};

fn writer() -> CdfWriter {
    CdfWriter::new(WriterConfig::default().with_byte_order(ByteOrder::Little))
}

fn range(first: u64, last: u64) -> Option<RecordRange> {
    Some(RecordRange { first, last })
}

fn reopen(writer: CdfWriter) -> CdfFile {
    CdfFile::from_bytes(writer.finalize().unwrap()).unwrap()
}

#[test]
fn test_pad_fills_past_last_stored_record() {
    let mut w = writer();
    w.define_variable(
        VariableSpec::new("n", DataType::Real4)
            .sparse(SparseRecords::Pad)
            .pad_f64(-1.0e31),
    )
    .unwrap();
    w.append("n", None, TypedArray::F32((0..100).map(|i| i as f32).collect()))
        .unwrap();
    let file = reopen(w);

    let buffer = file
        .extract("n")
        .unwrap()
        .range(95, 105)
        .target(TargetType::F64)
        .build()
        .unwrap()
        .materialize()
        .unwrap();
    assert_eq!(buffer.first_record(), 95);
    assert_eq!(buffer.record_count(), 11);
    let values = buffer.to_f64_vec();
    assert_eq!(&values[..5], &[95.0, 96.0, 97.0, 98.0, 99.0]);
    let pad = -1.0e31f32 as f64;
    assert!(values[5..].iter().all(|&v| v == pad));
}

#[test]
fn test_previous_repeats_last_stored_record() {
    let mut w = writer();
    w.define_variable(VariableSpec::new("p", DataType::Int4).sparse(SparseRecords::Previous))
        .unwrap();
    w.append("p", range(10, 49), TypedArray::I32((10..50).collect()))
        .unwrap();
    w.append("p", range(60, 99), TypedArray::I32((60..100).collect()))
        .unwrap();
    let file = reopen(w);
    let read = |first: i64, last: i64| {
        file.extract("p")
            .unwrap()
            .range(first, last)
            .build()
            .unwrap()
            .materialize()
            .unwrap()
            .to_i64_vec()
    };

    let values = read(45, 65);
    assert_eq!(&values[..5], &[45, 46, 47, 48, 49]);
    assert!(values[5..15].iter().all(|&v| v == 49));
    assert_eq!(&values[15..], &[60, 61, 62, 63, 64, 65]);

    // range starting inside the gap seeds from the block before it
    assert_eq!(read(52, 58), vec![49; 7]);

    // nothing precedes record 5, so it falls back to pad
    let head = read(5, 11);
    assert!(head[..5].iter().all(|&v| v == -2147483647));
    assert_eq!(&head[5..], &[10, 11]);

    // past the last stored record
    assert_eq!(read(98, 101), vec![98, 99, 99, 99]);
}

#[test]
fn test_precision_guard() {
    let mut w = writer();
    w.define_variable(VariableSpec::new("big", DataType::Int8)).unwrap();
    w.append("big", None, TypedArray::I64(vec![1, 2, 3])).unwrap();
    let file = reopen(w);

    let err = file
        .extract("big")
        .unwrap()
        .target(TargetType::F32)
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        Error::IncompatibleConversion {
            from: DataType::Int8,
            to: TargetType::F32
        }
    ));

    let lossy = file
        .extract("big")
        .unwrap()
        .target(TargetType::F32)
        .preserve(false)
        .build()
        .unwrap()
        .materialize()
        .unwrap();
    assert_eq!(lossy.to_f64_vec(), vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_chunk_size_does_not_change_output() {
    let mut w = writer();
    w.define_variable(VariableSpec::new("t", DataType::Real8).dims(&[2]).compressed())
        .unwrap();
    let values: Vec<f64> = (0..6000).map(|i| (i as f64).sin()).collect();
    w.append("t", None, TypedArray::F64(values[..2000].to_vec())).unwrap();
    w.append("t", None, TypedArray::F64(values[2000..].to_vec())).unwrap();
    let file = reopen(w);

    let read = |chunk: usize| {
        file.extract("t")
            .unwrap()
            .target(TargetType::F32)
            .preserve(false)
            .chunk_elements(chunk)
            .build()
            .unwrap()
            .materialize()
            .unwrap()
    };
    let small = read(1024);
    let large = read(1 << 20);
    assert_eq!(small.record_count(), 3000);
    assert_eq!(small.as_bytes(), large.as_bytes());
    assert_eq!(read(7).as_bytes(), large.as_bytes());
}

#[test]
fn test_corrupt_compressed_block_is_read_as_raw() {
    let mut w = CdfWriter::new(
        WriterConfig::default()
            .with_byte_order(ByteOrder::Little)
            .with_checksum(false),
    );
    w.define_variable(VariableSpec::new("c", DataType::Int4).compressed())
        .unwrap();
    w.append("c", None, TypedArray::I32(vec![0; 1000])).unwrap();
    w.append("c", None, TypedArray::I32(vec![7; 10])).unwrap();
    let mut bytes = w.finalize().unwrap();

    let entries = CdfFile::from_bytes(bytes.clone()).unwrap().locate("c").unwrap();
    let start = entries[0].offset as usize;
    let len = u64::from_be_bytes(bytes[start + 16..start + 24].try_into().unwrap()) as usize;
    bytes[start + 24..start + 24 + len].fill(0xFF);

    let file = CdfFile::from_bytes(bytes).unwrap();
    let values = file
        .extract("c")
        .unwrap()
        .build()
        .unwrap()
        .materialize()
        .unwrap()
        .to_i64_vec();
    assert_eq!(values.len(), 1010);
    let raw = len / 4;
    assert!(values[..raw].iter().all(|&v| v == -1));
    assert!(values[raw..1000].iter().all(|&v| v == -2147483647));
    assert_eq!(&values[1000..], &[7; 10]);
}

#[test]
fn test_column_major_output_is_transposed() {
    let mut w = writer();
    w.define_variable(VariableSpec::new("grid", DataType::Int2).dims(&[2, 3]))
        .unwrap();
    w.append("grid", None, TypedArray::I16(vec![0, 1, 2, 3, 4, 5, 10, 11, 12, 13, 14, 15]))
        .unwrap();
    let file = reopen(w);

    let row = file.extract("grid").unwrap().build().unwrap().materialize().unwrap();
    assert_eq!(row.dims(), &[2, 3]);
    assert_eq!(row.to_i64_vec(), vec![0, 1, 2, 3, 4, 5, 10, 11, 12, 13, 14, 15]);

    let column = file
        .extract("grid")
        .unwrap()
        .majority(Majority::Column)
        .build()
        .unwrap()
        .materialize()
        .unwrap();
    assert_eq!(column.majority(), Majority::Column);
    assert_eq!(
        column.to_i64_vec(),
        vec![0, 3, 1, 4, 2, 5, 10, 13, 11, 14, 12, 15]
    );
}

#[test]
fn test_range_errors() {
    let mut w = writer();
    w.define_variable(VariableSpec::new("d", DataType::Real8)).unwrap();
    w.define_variable(VariableSpec::new("empty", DataType::Real8)).unwrap();
    w.append("d", None, TypedArray::F64(vec![0.5; 10])).unwrap();
    let file = reopen(w);

    let err = file.extract("d").unwrap().range(-1, 3).build().unwrap_err();
    assert!(matches!(err, Error::InvalidRange { first: -1, last: 3 }));
    let err = file.extract("d").unwrap().range(5, 2).build().unwrap_err();
    assert!(matches!(err, Error::InvalidRange { .. }));

    let prepared = file.extract("d").unwrap().range(20, 30).build().unwrap();
    assert!(matches!(
        prepared.materialize(),
        Err(Error::RecordOutOfRange { first: 20, last: 30, .. })
    ));
    let empty = file
        .extract("d")
        .unwrap()
        .range(20, 30)
        .allow_empty(true)
        .build()
        .unwrap()
        .materialize()
        .unwrap();
    assert!(empty.is_empty());

    let nothing = file.extract("empty").unwrap().build().unwrap().materialize().unwrap();
    assert_eq!(nothing.record_count(), 0);

    assert!(matches!(file.extract("missing"), Err(Error::UnknownVariable(_))));
}

#[test]
fn test_inverted_selection_rejected_at_build() {
    let mut w = writer();
    w.define_variable(VariableSpec::new("x", DataType::Int4)).unwrap();
    w.append("x", None, TypedArray::I32((0..10).collect())).unwrap();
    let file = reopen(w);

    let err = file
        .extract("x")
        .unwrap()
        .selection(RecordSelection::Range(RecordRange { first: 5, last: 2 }))
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRange { first: 5, last: 2 }));
}

#[test]
fn test_index_gap_without_sparse_policy_reads_pad() {
    let mut w = CdfWriter::new(
        WriterConfig::default()
            .with_byte_order(ByteOrder::Little)
            .with_checksum(false),
    );
    w.define_variable(
        VariableSpec::new("holes", DataType::Int4)
            .sparse(SparseRecords::Pad)
            .pad_i64(-9),
    )
    .unwrap();
    w.append("holes", range(0, 2), TypedArray::I32(vec![1, 2, 3])).unwrap();
    w.append("holes", range(5, 6), TypedArray::I32(vec![6, 7])).unwrap();
    let mut bytes = w.finalize().unwrap();

    // clear the sparse record mode in the descriptor
    let head = CdfFile::from_bytes(bytes.clone())
        .unwrap()
        .global_descriptor()
        .zvdr_head as usize;
    bytes[head + 48..head + 52].copy_from_slice(&0u32.to_be_bytes());

    let file = CdfFile::from_bytes(bytes).unwrap();
    assert_eq!(file.variable("holes").unwrap().sparse_records(), SparseRecords::None);
    let values = file
        .extract("holes")
        .unwrap()
        .build()
        .unwrap()
        .materialize()
        .unwrap()
        .to_i64_vec();
    assert_eq!(values, vec![1, 2, 3, -9, -9, 6, 7]);
}

#[test]
fn test_compressed_block_longer_than_its_entry() {
    let mut w = CdfWriter::new(
        WriterConfig::default()
            .with_byte_order(ByteOrder::Little)
            .with_checksum(false),
    );
    w.define_variable(VariableSpec::new("c", DataType::Int4).compressed())
        .unwrap();
    w.append("c", None, TypedArray::I32((0..10).collect())).unwrap();
    let mut bytes = w.finalize().unwrap();

    // shrink the declared record count so the block inflates past its entry
    let head = CdfFile::from_bytes(bytes.clone())
        .unwrap()
        .global_descriptor()
        .zvdr_head as usize;
    bytes[head + 24..head + 28].copy_from_slice(&4i32.to_be_bytes());

    let file = CdfFile::from_bytes(bytes).unwrap();
    let entries = file.locate("c").unwrap();
    assert_eq!((entries[0].first, entries[0].last), (0, 4));
    let values = file
        .extract("c")
        .unwrap()
        .build()
        .unwrap()
        .materialize()
        .unwrap()
        .to_i64_vec();
    assert_eq!(values, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_zero_sized_dimension_yields_empty_records() {
    let mut w = writer();
    w.define_variable(
        VariableSpec::new("void", DataType::Real8)
            .dims(&[0])
            .sparse(SparseRecords::Pad),
    )
    .unwrap();
    let file = reopen(w);

    let buffer = file
        .extract("void")
        .unwrap()
        .range(0, 3)
        .build()
        .unwrap()
        .materialize()
        .unwrap();
    assert_eq!(buffer.record_count(), 4);
    assert!(buffer.as_bytes().is_empty());
}

#[test]
fn test_selection_from_text() {
    let mut w = writer();
    w.define_variable(VariableSpec::new("s", DataType::Int4)).unwrap();
    w.append("s", None, TypedArray::I32((0..20).collect())).unwrap();
    let file = reopen(w);

    let selection: RecordSelection = cdfio::parse_selection("3:6").unwrap();
    let buffer = file
        .extract("s")
        .unwrap()
        .selection(selection)
        .build()
        .unwrap()
        .materialize()
        .unwrap();
    assert_eq!(buffer.to_i64_vec(), vec![3, 4, 5, 6]);
}

#[test]
fn test_non_record_varying_returns_record_zero() {
    let mut w = writer();
    w.define_variable(
        VariableSpec::new("axis", DataType::Real4)
            .dims(&[3])
            .record_variance(false),
    )
    .unwrap();
    w.append("axis", None, TypedArray::F32(vec![1.0, 2.0, 3.0])).unwrap();
    assert!(w
        .append("axis", range(1, 1), TypedArray::F32(vec![4.0, 5.0, 6.0]))
        .is_err());
    let file = reopen(w);

    let buffer = file
        .extract("axis")
        .unwrap()
        .range(5, 10)
        .build()
        .unwrap()
        .materialize()
        .unwrap();
    assert_eq!(buffer.record_count(), 1);
    assert_eq!(buffer.to_f64_vec(), vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_pool_matches_direct_extraction() {
    let mut w = writer();
    w.define_variable(VariableSpec::new("a", DataType::Int4).compressed())
        .unwrap();
    w.define_variable(VariableSpec::new("b", DataType::Real8)).unwrap();
    w.append("a", None, TypedArray::I32((0..5000).collect())).unwrap();
    w.append("b", None, TypedArray::F64((0..700).map(|i| i as f64 / 3.0).collect()))
        .unwrap();
    let file = reopen(w);

    let pool = ExtractionPool::new(2).unwrap();
    let handles: Vec<_> = ["a", "b", "a"]
        .iter()
        .map(|name| pool.submit(file.extract(name).unwrap().build().unwrap()))
        .collect();
    assert_eq!(pool.len(), 3);

    for (handle, name) in handles.iter().zip(["a", "b", "a"]) {
        let direct = file.extract(name).unwrap().build().unwrap().materialize().unwrap();
        let pooled = handle.wait().unwrap();
        assert_eq!(*pooled, direct);
        assert_eq!(pool.is_done(handle.id()), Some(true));
    }

    assert!(pool.discard(handles[0].id()));
    assert_eq!(pool.is_done(handles[0].id()), None);
    assert!(handles[0].wait().is_ok());
}

#[test]
fn test_pool_reports_failures() {
    let mut w = writer();
    w.define_variable(VariableSpec::new("d", DataType::Int4)).unwrap();
    w.append("d", None, TypedArray::I32(vec![1, 2])).unwrap();
    let file = reopen(w);

    let pool = ExtractionPool::new(1).unwrap();
    let handle = pool.submit(file.extract("d").unwrap().range(10, 12).build().unwrap());
    let err = handle.wait().unwrap_err();
    assert!(matches!(err, Error::Extraction(_)));
    assert!(matches!(pool.wait(handle.id()), Some(Err(_))));
}

#[test]
fn test_native_buffer_reused_as_encoded_block() {
    let mut w = writer();
    w.define_variable(VariableSpec::new("src", DataType::Int2).dims(&[2])).unwrap();
    w.append("src", None, TypedArray::I16(vec![1, -2, 3, -4, 5, -6])).unwrap();
    let source = reopen(w);
    let native = source
        .extract("src")
        .unwrap()
        .target(TargetType::Native)
        .build()
        .unwrap()
        .materialize()
        .unwrap();
    let block = EncodedBlock::from_native(&native).unwrap();
    assert_eq!(block.range, RecordRange { first: 0, last: 2 });

    for order in [ByteOrder::Little, ByteOrder::Big] {
        let mut w = CdfWriter::new(WriterConfig::default().with_byte_order(order));
        w.define_variable(VariableSpec::new("dst", DataType::Int2).dims(&[2])).unwrap();
        w.append_encoded("dst", block.clone()).unwrap();
        let copy = reopen(w);
        let values = copy.extract("dst").unwrap().build().unwrap().materialize().unwrap();
        assert_eq!(values.to_i64_vec(), vec![1, -2, 3, -4, 5, -6]);
    }
}

#[test]
fn test_snapshot_reads_committed_blocks() {
    let mut w = writer();
    w.define_variable(VariableSpec::new("live", DataType::Real8).compressed())
        .unwrap();
    w.append("live", None, TypedArray::F64(vec![1.0, 2.0])).unwrap();
    let first = w.snapshot().unwrap();
    w.append("live", None, TypedArray::F64(vec![3.0])).unwrap();
    let second = w.snapshot().unwrap();

    let read = |file: &CdfFile| {
        file.extract("live")
            .unwrap()
            .build()
            .unwrap()
            .materialize()
            .unwrap()
            .to_f64_vec()
    };
    assert_eq!(read(&first), vec![1.0, 2.0]);
    assert_eq!(read(&second), vec![1.0, 2.0, 3.0]);
}
