//! Write a small mission-style CDF with sparse and compressed variables

use cdfio::{
    AttributeEntry, CdfWriter, DataType, RecordRange, SparseRecords, TypedArray, VariableSpec,
    WriterConfig, FILL_VALUE,
};
use std::time::Instant;

fn main() -> cdfio::Result<()> {
    let filename = "example_dataset.cdf";
    let records = 10_000usize;

    println!("Writing {records} records to '{filename}'...");
    let start = Instant::now();

    let mut writer = CdfWriter::new(WriterConfig::default());
    writer.define_variable(VariableSpec::new("Epoch", DataType::Epoch))?;
    writer.define_variable(VariableSpec::new("B_GSE", DataType::Real4).dims(&[3]).compressed())?;
    writer.define_variable(
        VariableSpec::new("Density", DataType::Real4).sparse(SparseRecords::Previous),
    )?;
    writer.define_variable(VariableSpec::new("Label", DataType::Char).num_elems(8).record_variance(false))?;

    writer.set_global_attribute("Project", vec![AttributeEntry::text("Example Mission")])?;
    writer.set_global_attribute("Source_name", vec![AttributeEntry::texts(&["EX1", "Example spacecraft"])])?;
    writer.set_variable_attribute(FILL_VALUE, "B_GSE", AttributeEntry::floats(DataType::Real4, vec![-1.0e31]))?;

    let epoch: Vec<f64> = (0..records).map(|i| 63_000_000_000_000.0 + i as f64 * 1000.0).collect();
    let field: Vec<f32> = (0..records * 3).map(|i| (i as f32 * 0.01).sin() * 50.0).collect();

    // one block per variable, compressed in parallel
    writer.append_many(vec![
        ("Epoch".to_string(), None, TypedArray::F64(epoch)),
        ("B_GSE".to_string(), None, TypedArray::F32(field)),
    ])?;

    // density is only sampled every 100 records
    for block in 0..records / 100 {
        let record = (block * 100) as u64;
        writer.append(
            "Density",
            Some(RecordRange::point(record)),
            TypedArray::F32(vec![5.0 + block as f32 * 0.1]),
        )?;
    }
    writer.append("Label", None, TypedArray::Text(vec!["GSE".into()]))?;

    writer.write_to(filename)?;
    println!(
        "Wrote '{filename}' in {:.3}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    println!("   Run 'cargo run --example read_dataset' to read it back");
    Ok(())
}
