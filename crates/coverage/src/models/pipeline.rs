//! The pipeline driver: load, resolve, aggregate, compute, rank.
//!
//! Every configured source is loaded through a [`TableLoader`], its columns
//! resolved against the [`FieldCatalog`], and the resolved columns projected
//! onto canonical names so that sources with differently spelled headers can
//! be stacked. Failures are isolated: a source that cannot be loaded or
//! resolved is recorded and skipped, and an indicator is aborted only when
//! none of its sources resolves.

use crate::errors::{AnalysisError, AnalysisResult};
use crate::models::aggregate::{aggregate, Aggregation};
use crate::models::columns::{resolve_fields, FieldSpec};
use crate::models::config::{PipelineConfig, SourceSpec};
use crate::models::coverage::{compute_coverage, for_period, over_unity, periods, CoverageResult};
use crate::models::indicators::Indicator;
use crate::models::loader::TableLoader;
use crate::models::mortality::{mortality_report, MortalityCounts};
use crate::models::ranking::{extremes, mean_across_periods};
use crate::models::regions::{map_points, regional_means};
use crate::models::report::{IndicatorFailure, IndicatorReport, PipelineReport, SourceFailure};
use crate::models::summary::{compare_periods, gap_report, summarize_periods};
use crate::models::table::{Cell, RawTable};

/// Canonical name of the period column after projection
const PERIOD: &str = "period";

/// Rows of one indicator stacked from all of its sources
struct IndicatorTable {
    table: RawTable,
    sources: Vec<String>,
    has_period: bool,
}

/// Runs the whole analysis for one configuration
pub struct Pipeline<'a, L: TableLoader> {
    config: &'a PipelineConfig,
    loader: L,
}

impl<'a, L: TableLoader> Pipeline<'a, L> {
    pub fn new(config: &'a PipelineConfig, loader: L) -> Self {
        Self { config, loader }
    }

    /// Run every indicator and the cross-indicator reports.
    ///
    /// Never fails as a whole: per-source and per-indicator errors end up in
    /// the report's failure lists.
    pub fn run(&self) -> PipelineReport {
        let mut report = PipelineReport::new(self.config.benchmark);
        let mut pooled: Vec<(Indicator, Aggregation)> = Vec::new();

        for indicator in Indicator::ALL {
            match self.run_indicator(indicator, &mut report) {
                Ok(Some((indicator_report, pooled_totals))) => {
                    log_indicator(&indicator_report, self.config.benchmark);
                    report.indicators.push(indicator_report);
                    pooled.push((indicator, pooled_totals));
                }
                Ok(None) => {}
                Err(e) => {
                    if e.is_missing_column() {
                        log::error!("{} aborted, input layout does not match the field catalog: {}", indicator, e);
                    } else {
                        log::error!("{} aborted: {}", indicator, e);
                    }
                    report.indicator_failures.push(IndicatorFailure {
                        indicator,
                        error: e.to_string(),
                    });
                }
            }
        }

        let pooled_coverage = |indicator: Indicator| -> Option<Vec<CoverageResult>> {
            pooled
                .iter()
                .find(|(i, _)| *i == indicator)
                .and_then(|(_, totals)| self.coverage_of(indicator, totals).ok())
        };
        let prenatal = pooled_coverage(Indicator::Prenatal);
        let ultrasound = pooled_coverage(Indicator::Ultrasound);

        if let (Some(prenatal), Some(ultrasound)) = (&prenatal, &ultrasound) {
            let gaps = gap_report(prenatal, ultrasound, self.config.gap_highlights);
            log::info!(
                "Prenatal vs ultrasound gap: {} districts, {} positive, {} negative, mean gap {}",
                gaps.summary.groups,
                gaps.summary.positive,
                gaps.summary.negative,
                gaps.summary.mean_gap
            );
            report.gap = Some(gaps);
        }

        if let (Some(prenatal), Some((_, totals))) =
            (&prenatal, pooled.iter().find(|(i, _)| *i == Indicator::Mortality))
        {
            match self.mortality_counts(totals) {
                Ok(counts) => {
                    let mortality = mortality_report(&counts, prenatal, self.config.mortality_top_n);
                    if let Some(worst) = mortality.top_by_mortality.first() {
                        log::info!(
                            "Highest infant mortality: {} ({:.1} per 1000 live births)",
                            worst.group_key,
                            worst.mortality_per_1000.value().unwrap_or_default()
                        );
                    }
                    report.mortality = Some(mortality);
                }
                Err(e) => report.warn(format!("Mortality report skipped: {}", e)),
            }
        }

        self.build_map(&mut report);

        if report.has_failures() {
            log::warn!(
                "Finished with {} source failures and {} indicator failures",
                report.source_failures.len(),
                report.indicator_failures.len()
            );
        }
        report
    }

    /// Load, stack and analyse the sources of a single indicator.
    ///
    /// Returns `Ok(None)` when no source produced a table.
    fn run_indicator(
        &self,
        indicator: Indicator,
        report: &mut PipelineReport,
    ) -> AnalysisResult<Option<(IndicatorReport, Aggregation)>> {
        let Some(stacked) = self.stack_sources(indicator, report)? else {
            report.warn(format!("No data loaded for {}", indicator));
            return Ok(None);
        };

        let catalog = &self.config.fields;
        let values: Vec<&str> = indicator
            .fields(catalog)
            .into_iter()
            .skip(1)
            .filter(|f| f.required || has_data(&stacked.table, &f.name))
            .map(|f| f.name.as_str())
            .collect();
        let period = stacked.has_period.then_some(PERIOD);

        let by_period = aggregate(&stacked.table, &catalog.district.name, period, &values)?;
        let pooled = aggregate(&stacked.table, &catalog.district.name, None, &values)?;

        let records = by_period.records(
            &indicator.numerator(catalog).name,
            &indicator.denominator(catalog).name,
        )?;
        let results = compute_coverage(&records);
        let benchmark = indicator.is_coverage().then_some(self.config.benchmark);

        let found_periods = periods(&results);
        let comparison = match (found_periods.first(), found_periods.last()) {
            (Some(&first), Some(&last)) if first < last => Some(compare_periods(
                &records,
                first,
                last,
                self.config.top_n,
                self.config.change_highlights,
            )),
            _ => None,
        };

        let regional = if indicator.is_coverage() {
            regional_means(&results)
        } else {
            Vec::new()
        };

        let indicator_report = IndicatorReport {
            indicator,
            sources: stacked.sources,
            periods: summarize_periods(&records, self.config.top_n, benchmark),
            comparison,
            averaged: extremes(&mean_across_periods(&results), self.config.top_n),
            regional,
            over_unity: over_unity(&results),
            skipped_rows: by_period.skipped_rows,
            coerced_cells: by_period.coerced_cells,
            records,
            results,
        };
        Ok(Some((indicator_report, pooled)))
    }

    /// Load every source of `indicator`, resolve its columns and stack the
    /// projections. Load and resolution failures are recorded per source and
    /// skipped; the last resolution error is returned when no source resolves.
    fn stack_sources(&self, indicator: Indicator, report: &mut PipelineReport) -> AnalysisResult<Option<IndicatorTable>> {
        let fields = indicator.fields(&self.config.fields);
        let mut tables = Vec::new();
        let mut sources = Vec::new();
        let mut unresolved: Option<AnalysisError> = None;

        for source in self.config.sources_for(indicator) {
            let table = match self.loader.load(source) {
                Ok(table) => table,
                Err(e) => {
                    log::error!("Failed to load source '{}': {}", source.name, e);
                    report.source_failures.push(SourceFailure {
                        source: source.name.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            if table.is_empty() {
                report.warn(format!("Source '{}' has no data rows", source.name));
            }

            match self.project_source(source, &table, &fields) {
                Ok(projected) => {
                    tables.push(projected);
                    sources.push(source.name.clone());
                }
                Err(e) => {
                    log::error!("Source '{}' cannot be used for {}: {}", source.name, indicator, e);
                    report.source_failures.push(SourceFailure {
                        source: source.name.clone(),
                        error: e.to_string(),
                    });
                    unresolved = Some(e);
                }
            }
        }

        if tables.is_empty() {
            return match unresolved {
                Some(e) => Err(e),
                None => Ok(None),
            };
        }
        let table = RawTable::concat(&tables);
        let has_period = has_data(&table, PERIOD);
        Ok(Some(IndicatorTable {
            table,
            sources,
            has_period,
        }))
    }

    /// Resolve `fields` in a loaded table and copy them under their field
    /// names, adding the source's period.
    fn project_source(&self, source: &SourceSpec, table: &RawTable, fields: &[&FieldSpec]) -> AnalysisResult<RawTable> {
        let owned: Vec<FieldSpec> = fields.iter().map(|f| (*f).clone()).collect();
        let resolved = resolve_fields(table.columns(), &owned)?;

        let tagged = match source.period {
            Some(year) => table.with_constant_column(&self.config.period_column, Cell::Int(i64::from(year))),
            None => table.clone(),
        };
        let period_source = tagged
            .column_index(&self.config.period_column)
            .ok()
            .map(|_| self.config.period_column.as_str());

        let mut mapping: Vec<(&str, Option<&str>)> =
            fields.iter().map(|f| (f.name.as_str(), resolved.get(&f.name))).collect();
        mapping.push((PERIOD, period_source));
        tagged.project(&mapping)
    }

    fn coverage_of(&self, indicator: Indicator, totals: &Aggregation) -> AnalysisResult<Vec<CoverageResult>> {
        let catalog = &self.config.fields;
        let records = totals.records(&indicator.numerator(catalog).name, &indicator.denominator(catalog).name)?;
        Ok(compute_coverage(&records))
    }

    fn mortality_counts(&self, totals: &Aggregation) -> AnalysisResult<Vec<MortalityCounts>> {
        let catalog = &self.config.fields;
        let births = totals.value_index(&catalog.live_births.name)?;
        let deaths = totals.value_index(&catalog.infant_deaths.name)?;
        let maternal = totals.value_index(&catalog.maternal_deaths.name).ok();

        Ok(totals
            .groups
            .iter()
            .map(|g| MortalityCounts {
                group_key: g.key.clone(),
                live_births: g.sums[births],
                infant_deaths: g.sums[deaths],
                maternal_deaths: maternal.map(|idx| g.sums[idx]),
            })
            .collect())
    }

    /// Map points for the latest period with prenatal data
    fn build_map(&self, report: &mut PipelineReport) {
        let Some(prenatal) = report.indicator(Indicator::Prenatal) else {
            return;
        };
        let Some(&latest) = periods(&prenatal.results).last() else {
            return;
        };
        let empty = Vec::new();
        let ultrasound = report
            .indicator(Indicator::Ultrasound)
            .map(|r| &r.results)
            .unwrap_or(&empty);

        let points = map_points(&for_period(&prenatal.results, latest), &for_period(ultrasound, latest));
        log::info!("{} districts placed on the {} map", points.len(), latest);
        report.map_period = Some(latest);
        report.map = points;
    }
}

/// Whether `column` exists and holds at least one non-missing cell
fn has_data(table: &RawTable, column: &str) -> bool {
    table
        .column(column)
        .map(|cells| cells.iter().any(|cell| !cell.is_missing()))
        .unwrap_or(false)
}

fn log_indicator(report: &IndicatorReport, benchmark: f64) {
    for summary in &report.periods {
        let period = summary.period.map(|p| p.to_string()).unwrap_or_else(|| "all".to_string());
        match summary.meeting_benchmark {
            Some(meeting) => log::info!(
                "{} {}: overall {}, {} districts, {} at or above {:.0}%",
                report.indicator,
                period,
                summary.overall,
                summary.districts,
                meeting,
                benchmark * 100.0
            ),
            None => log::info!(
                "{} {}: overall {}, {} districts",
                report.indicator,
                period,
                summary.overall,
                summary.districts
            ),
        }
        if let Some(best) = summary.rankings.top.first() {
            log::info!("  highest: {} ({})", best.group_key, best.coverage);
        }
        if let Some(worst) = summary.rankings.bottom.first() {
            log::info!("  lowest: {} ({})", worst.group_key, worst.coverage);
        }
    }
    if let Some(comparison) = &report.comparison {
        log::info!(
            "{} {} -> {}: overall change {}",
            report.indicator,
            comparison.earlier_period,
            comparison.later_period,
            comparison.overall_change
        );
    }
    if !report.over_unity.is_empty() {
        log::warn!(
            "{}: {} groups above 100% need review",
            report.indicator,
            report.over_unity.len()
        );
    }
}
