use chrono::Local;
use cf_scrap::{config::FetchConfig, fetch::fetch_all, info_time, logging, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let config = FetchConfig::default();
    logging::init(&config.log_path)?;
    let start_time = Local::now();

    let summary = fetch_all(&config).await;
    info_time!(
        start_time,
        "Full program time: {}/{} categories synced",
        summary.succeeded(),
        summary.results.len()
    );

    Ok(())
}
