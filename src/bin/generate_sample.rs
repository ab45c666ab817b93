use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Write a synthetic raw pixel table for trying out the pipeline.
///
/// Every image gets one class; its pixels share the class's reflectance
/// peaks plus per-pixel noise. A few values are left missing and one class
/// is the catch-all "Mixed or Not Classified".
#[derive(Parser)]
#[command(name = "generate_sample")]
struct Args {
    /// Output file (.csv or .parquet)
    #[arg(short, long, default_value = "samples.csv")]
    output: PathBuf,
    /// Number of images
    #[arg(long, default_value_t = 40)]
    images: usize,
    /// Pixels per image
    #[arg(long, default_value_t = 25)]
    pixels: usize,
    /// Spectral bands between 400 and 1000 nm
    #[arg(long, default_value_t = 120)]
    bands: usize,
    /// Fraction of spectral values left missing
    #[arg(long, default_value_t = 0.002)]
    missing_rate: f64,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// (label as written in the source sheet, peaks as (centre nm, width nm, amplitude))
const CLASSES: [(&str, &[(f64, f64, f64)]); 4] = [
    ("Oak (mature stand)", &[(550.0, 40.0, 0.35), (850.0, 90.0, 0.8)]),
    ("Pine", &[(560.0, 30.0, 0.25), (800.0, 70.0, 0.6)]),
    ("Birch (young)", &[(540.0, 50.0, 0.4), (900.0, 60.0, 0.9)]),
    ("Mixed or Not Classified", &[(700.0, 200.0, 0.5)]),
];

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Box-Muller transform for a normal sample.
fn gauss(rng: &mut ChaCha8Rng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

struct Table {
    files: Vec<String>,
    labels: Vec<String>,
    wavelengths: Vec<f64>,
    /// Column-major: one Vec per band, `None` when missing.
    bands: Vec<Vec<Option<f64>>>,
}

fn generate(args: &Args) -> Table {
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let step = 600.0 / (args.bands.max(2) - 1) as f64;
    let wavelengths: Vec<f64> = (0..args.bands).map(|i| 400.0 + i as f64 * step).collect();

    let mut table = Table {
        files: Vec::new(),
        labels: Vec::new(),
        wavelengths: wavelengths.clone(),
        bands: vec![Vec::new(); args.bands],
    };

    for image in 0..args.images {
        let (label, peaks) = CLASSES[image % CLASSES.len()];
        let brightness = 0.8 + 0.4 * rng.gen::<f64>();
        for pixel in 0..args.pixels {
            table.files.push(format!("{}_scan_{pixel:03}.hdr", image + 1));
            table.labels.push(label.to_string());
            for (band, &wl) in wavelengths.iter().enumerate() {
                let signal: f64 = peaks
                    .iter()
                    .map(|&(mu, sigma, amp)| gaussian(wl, mu, sigma, amp))
                    .sum();
                let value = brightness * signal + gauss(&mut rng, 0.0, 0.01);
                let missing = rng.gen_bool(args.missing_rate.clamp(0.0, 1.0));
                table.bands[band].push((!missing).then_some(value));
            }
        }
    }
    table
}

fn column_names(table: &Table) -> Vec<String> {
    table
        .wavelengths
        .iter()
        .map(|wl| format!("frq_{wl:.1}"))
        .collect()
}

fn write_csv(path: &Path, table: &Table) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    let mut header = vec!["File".to_string(), "Label".to_string()];
    header.extend(column_names(table));
    writer.write_record(&header)?;

    for row in 0..table.files.len() {
        let mut record = vec![table.files[row].clone(), table.labels[row].clone()];
        record.extend(
            table
                .bands
                .iter()
                .map(|band| band[row].map(|v| format!("{v:.6}")).unwrap_or_default()),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &Path, table: &Table) -> Result<()> {
    let mut fields = vec![
        Field::new("File", DataType::Utf8, false),
        Field::new("Label", DataType::Utf8, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(table.files.clone())),
        Arc::new(StringArray::from(table.labels.clone())),
    ];
    for (name, band) in column_names(table).into_iter().zip(&table.bands) {
        fields.push(Field::new(name, DataType::Float64, true));
        columns.push(Arc::new(Float64Array::from(band.clone())));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns).context("building record batch")?;

    let file = std::fs::File::create(path).context("creating output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing writer")?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let table = generate(&args);

    let ext = args
        .output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" => write_csv(&args.output, &table)?,
        "parquet" | "pq" => write_parquet(&args.output, &table)?,
        other => bail!("Unsupported output extension: .{other}"),
    }

    println!(
        "Wrote {} pixels from {} images ({} bands each) to {}",
        table.files.len(),
        args.images,
        args.bands,
        args.output.display()
    );
    Ok(())
}
