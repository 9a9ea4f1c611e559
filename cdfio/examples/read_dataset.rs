//! Read the file produced by `write_dataset`, directly and through the pool

use cdfio::{CdfFile, ExtractionPool, TargetType};
use std::time::Instant;

fn main() -> cdfio::Result<()> {
    let filename = "example_dataset.cdf";

    if !std::path::Path::new(filename).exists() {
        println!("File '{filename}' not found!");
        println!("   Run 'cargo run --example write_dataset' first");
        return Ok(());
    }

    let start = Instant::now();
    let file = CdfFile::open(filename)?;
    println!(
        "Opened '{filename}' in {:.3}ms ({:?}, {} majority)",
        start.elapsed().as_secs_f64() * 1000.0,
        file.encoding(),
        file.majority()
    );

    println!("\nVariables:");
    for variable in file.variables() {
        println!(
            "   {:<10} {:<8} dims {:?} records {} sparse {:?} compressed {}",
            variable.name(),
            variable.data_type(),
            variable.effective_dims(),
            variable.total_records(),
            variable.sparse_records(),
            variable.is_compressed()
        );
    }

    println!("\nGlobal attributes:");
    for attribute in file.attributes().iter() {
        for (number, entry) in attribute.entries() {
            if let Some(text) = entry.as_text() {
                println!("   {}[{number}] = {text:?}", attribute.name());
            }
        }
    }

    // gap records repeat the last sample
    let density = file
        .extract("Density")?
        .range(95, 105)
        .target(TargetType::F64)
        .build()?
        .materialize()?;
    println!("\nDensity[95..=105] = {:?}", density.to_f64_vec());

    let pool = ExtractionPool::new(0)?;
    let handles = ["Epoch", "B_GSE", "Density"]
        .iter()
        .map(|name| Ok((*name, pool.submit(file.extract(name)?.build()?))))
        .collect::<cdfio::Result<Vec<_>>>()?;

    let start = Instant::now();
    for (name, handle) in handles {
        let buffer = handle.wait()?;
        println!(
            "   {name:<8} {} records, {} bytes as {}",
            buffer.record_count(),
            buffer.as_bytes().len(),
            buffer.target()
        );
    }
    println!(
        "Pool extraction finished in {:.3}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );

    let label = file.extract("Label")?.build()?.materialize()?;
    println!("\nLabel = {:?}", label.strings());
    Ok(())
}
