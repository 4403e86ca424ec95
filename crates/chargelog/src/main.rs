mod bootstrap;
mod report;

use anyhow::Result;
use charge_core::settings::Settings;
use charge_core::time_utils::{DateRange, TimezoneHandler};
use charge_data::analysis::AnalysisOptions;
use charge_data::reader::load_document;
use charge_runtime::AnalysisOrchestrator;
use tracing::{debug, info};

use crate::report::TextReport;

#[tokio::main]
async fn main() -> Result<()> {
    let (settings, config) = Settings::load()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    info!("chargelog v{} starting", env!("CARGO_PKG_VERSION"));
    debug!("Settings: {:?}", settings);

    let tz = TimezoneHandler::new(&settings.timezone);
    let date_range = DateRange::from_bounds(
        settings.start_date.as_deref(),
        settings.end_date.as_deref(),
        &tz,
    )?;

    let document = load_document(&settings.file, config.max_document_bytes)?;
    let orchestrator = AnalysisOrchestrator::new(&config);
    let options = AnalysisOptions { config, date_range };
    let result = orchestrator.run(&document, &options).await?;

    info!(
        "Analysed {} sessions into {} places",
        result.metadata.sessions_analyzed,
        result.places.len()
    );

    if settings.wants_json() {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", TextReport::new(&result, &tz, settings.miles));
    }

    Ok(())
}
