use anyhow::{bail, Result};
use coverage::{CsvLoader, JsonFileSink, Pipeline, PipelineConfig, ReportSink};
use env_logger::Env;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = PipelineConfig::from_env()?;
    log::info!(
        "Reading {} sources from {} (benchmark {:.0}%, top {})",
        config.sources.len(),
        config.data_dir.display(),
        config.benchmark * 100.0,
        config.top_n
    );

    let loader = CsvLoader::new(&config.data_dir, config.delimiter_byte(), config.encoding);
    let report = Pipeline::new(&config, loader).run();

    JsonFileSink::new(&config.output_dir).publish(&report)?;

    if report.indicators.is_empty() {
        bail!(
            "no indicator could be computed ({} source failures, {} indicator failures)",
            report.source_failures.len(),
            report.indicator_failures.len()
        );
    }
    Ok(())
}
