use chrono::Local;
use cf_scrap::{
    config::ScrapeConfig,
    info_time, logging,
    navigate::BrowserNavigator,
    parse::extract,
    process::process_site,
    sink::RecordSink,
    Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ScrapeConfig::from_env();
    logging::init(&config.log_path)?;
    let start_time = Local::now();

    let mut navigator = BrowserNavigator::connect(&config).await?;
    let sink = RecordSink::new(&config.output_path);
    let scraped = process_site(&mut navigator, extract, &sink, &config).await;

    if let Err(e) = navigator.quit().await {
        log::warn!("Browser session didn't close cleanly: {e}");
    }
    let progress = scraped?;
    info_time!(
        start_time,
        "Full program time: {} records written to {}",
        progress.persisted,
        sink.path().display()
    );

    Ok(())
}
