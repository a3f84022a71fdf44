pub mod aggregate;
pub mod columns;
pub mod config;
pub mod coverage;
pub mod indicators;
pub mod loader;
pub mod mortality;
pub mod pipeline;
pub mod ranking;
pub mod ratio;
pub mod regions;
pub mod report;
pub mod summary;
pub mod table;


pub use aggregate::{aggregate, Aggregation, GroupTotals};
pub use columns::{normalize_column_name, resolve_column, resolve_fields, FieldSpec, ResolvedColumns};
pub use config::{FieldCatalog, PipelineConfig, SourceSpec};
pub use coverage::{compute_coverage, over_unity, CoverageRecord, CoverageResult};
pub use indicators::Indicator;
pub use loader::{read_csv_table, CsvLoader, CsvOptions, TableLoader, TextEncoding};
pub use mortality::{mortality_report, MortalityCounts, MortalityReport, MortalityRow};
pub use pipeline::Pipeline;
pub use ranking::{bottom_n, compute_gaps, extremes, period_changes, top_n, Direction, Extremes, GapResult, PeriodChange, Ranked};
pub use ratio::Ratio;
pub use regions::{locate_dsei, DseiLocation, MapPoint, Region, RegionalMean};
pub use report::{IndicatorReport, JsonFileSink, PipelineReport, ReportSink, SourceFailure};
pub use summary::{gap_report, GapReport, GapSummary, PeriodComparison, PeriodSummary};
pub use table::{Cell, RawTable};
