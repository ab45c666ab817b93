/// Data layer: table types and ingestion.
///
/// Architecture:
/// ```text
///  .csv / .parquet / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → RawTable
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐     preprocessing      ┌─────────────┐
///   │ RawTable  │ ───────────────────▶  │ SampleTable │  cleaned, grouped, encoded
///   └──────────┘   (via LabeledTable)   └─────────────┘
/// ```

pub mod loader;
pub mod model;
