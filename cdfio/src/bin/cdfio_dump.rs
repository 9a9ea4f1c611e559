use cdfio::{parse_selection, CdfFile, TargetType};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, long_about = None)]
#[command(about = "cdfio-dump - Inspect CDF files and print variable records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show descriptors, variables and global attributes
    Info {
        /// Path or http(s) URL of the CDF file
        file: String,
    },
    /// Print the records of one variable
    Dump {
        /// Path or http(s) URL of the CDF file
        file: String,

        /// Variable name
        variable: String,

        /// Records to print (format: first:last, n or all)
        #[arg(long, default_value = "all")]
        records: String,

        /// Output type (f64, f32, i64, i32, i16, i8, native)
        #[arg(long)]
        target: Option<String>,

        /// Allow lossy conversions
        #[arg(long)]
        lossy: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the block index of one variable
    Blocks {
        /// Path or http(s) URL of the CDF file
        file: String,

        /// Variable name
        variable: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let start_time = std::time::Instant::now();

    match &cli.command {
        Commands::Info { file } => handle_info(&open(file)?),
        Commands::Dump {
            file,
            variable,
            records,
            target,
            lossy,
            json,
        } => handle_dump(&open(file)?, variable, records, target.as_deref(), *lossy, *json)?,
        Commands::Blocks { file, variable } => handle_blocks(&open(file)?, variable)?,
    }

    tracing::info!(elapsed = ?start_time.elapsed(), "done");
    Ok(())
}

fn open(file: &str) -> Result<CdfFile, Box<dyn std::error::Error>> {
    if file.starts_with("http://") || file.starts_with("https://") {
        #[cfg(feature = "http")]
        {
            return Ok(cdfio::http_backend::open_url_blocking(file)?);
        }
        #[cfg(not(feature = "http"))]
        {
            return Err("remote files need the 'http' feature".into());
        }
    }
    Ok(CdfFile::open(file)?)
}

fn handle_info(file: &CdfFile) {
    let descriptor = file.descriptor();
    println!("CDF {}.{}.{}", descriptor.version, descriptor.release, descriptor.increment);
    println!("  Encoding: {:?} ({})", file.encoding(), file.byte_order());
    println!("  Majority: {}", file.majority());
    println!("  Checksum: {}", descriptor.has_md5_checksum());
    println!("  Whole-file compressed: {}", file.is_whole_file_compressed());

    println!("Variables:");
    for variable in file.variables() {
        println!(
            "  {:<24} {:<12} dims {:?} records {} sparse {:?}{}",
            variable.name(),
            variable.data_type().to_string(),
            variable.effective_dims(),
            variable.total_records(),
            variable.sparse_records(),
            if variable.is_compressed() { " gzip" } else { "" },
        );
    }

    println!("Global attributes:");
    for attribute in file.attributes().iter() {
        if attribute.scope() != cdfio::AttributeScope::Global {
            continue;
        }
        for (number, entry) in attribute.entries() {
            let value = entry
                .as_text()
                .or_else(|| entry.as_f64_vec().map(|v| format!("{v:?}")))
                .unwrap_or_default();
            println!("  {}[{number}] = {value}", attribute.name());
        }
    }
}

fn handle_dump(
    file: &CdfFile,
    variable: &str,
    records: &str,
    target: Option<&str>,
    lossy: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let selection = parse_selection(records).map_err(|e| format!("invalid --records: {e}"))?;
    let mut request = file.extract(variable)?.selection(selection).preserve(!lossy);
    if let Some(name) = target {
        let target = TargetType::parse(name).ok_or_else(|| format!("unknown target type '{name}'"))?;
        request = request.target(target);
    }
    let buffer = request.build()?.materialize()?;

    let per_record = buffer.values_per_record().max(1);
    if let Some(strings) = buffer.strings() {
        if json {
            println!("{}", serde_json::to_string_pretty(&strings)?);
        } else {
            for (i, s) in strings.iter().enumerate() {
                println!("{}: {s:?}", buffer.first_record() + (i / per_record) as u64);
            }
        }
        return Ok(());
    }

    let values = buffer.to_f64_vec();
    if json {
        let output = serde_json::json!({
            "variable": variable,
            "first_record": buffer.first_record(),
            "record_count": buffer.record_count(),
            "dims": buffer.dims(),
            "target": buffer.target().to_string(),
            "values": values,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for (i, record) in values.chunks(per_record).enumerate() {
            println!("{}: {record:?}", buffer.first_record() + i as u64);
        }
    }
    Ok(())
}

fn handle_blocks(file: &CdfFile, variable: &str) -> Result<(), Box<dyn std::error::Error>> {
    let entries = file.locate(variable)?;
    println!("{} blocks for {variable}:", entries.len());
    for entry in entries.iter() {
        println!(
            "  [{}, {}] at offset {} ({} records)",
            entry.first,
            entry.last,
            entry.offset,
            entry.records()
        );
    }
    Ok(())
}
