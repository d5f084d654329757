use chrono::Local;

use crate::config::{RetryPolicy, ScrapeConfig};
use crate::navigate::{enumerate_result_pages, Navigator};
use crate::record::{Provenance, Record};
use crate::sink::RecordSink;
use crate::{info_time, Result};

/// Running totals for one scrape, threaded through the loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeProgress {
    pub pages: usize,
    pub persisted: usize,
    pub abandoned: usize,
    pub failed_attempts: usize,
}

/// How one result item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Persisted { attempts: usize },
    Abandoned { attempts: usize },
}

/// Walks every results page, extracting and persisting each result.
///
/// Failures on a single result are retried under `config.retry` and never end the run;
/// only a failure to set up the search does. The run ends when the portal has no next page
/// or the page bound is reached.
pub async fn process_site<N, F>(
    navigator: &mut N,
    mut extract: F,
    sink: &RecordSink,
    config: &ScrapeConfig,
) -> Result<ScrapeProgress>
where
    N: Navigator,
    F: FnMut(&str) -> Result<Record>,
{
    let start_time = Local::now();
    info_time!("Started scraping, writing to {}", sink.path().display());

    navigator.configure_search().await?;
    let listing = navigator.listing_source().await?;
    let pages = enumerate_result_pages(&listing, config.max_pages);
    let last_page = *pages.end();

    let mut progress = ScrapeProgress::default();
    for page in pages {
        let start_page_time = Local::now();
        process_page(navigator, &mut extract, sink, &config.retry, page, &mut progress).await;
        progress.pages += 1;
        info_time!(
            start_page_time,
            "Processed page {page}: {} persisted, {} abandoned so far",
            progress.persisted,
            progress.abandoned
        );

        if page == last_page || !advance(navigator, &config.retry).await {
            break;
        }
    }

    info_time!(
        start_time,
        "Finished: {} pages, {} records, {} abandoned.",
        progress.pages,
        progress.persisted,
        progress.abandoned
    );
    Ok(progress)
}

async fn process_page<N, F>(
    navigator: &mut N,
    extract: &mut F,
    sink: &RecordSink,
    policy: &RetryPolicy,
    page: usize,
    progress: &mut ScrapeProgress,
) where
    N: Navigator,
    F: FnMut(&str) -> Result<Record>,
{
    let mut count = None;
    for attempt in 1..=policy.max_attempts {
        match navigator.result_count().await {
            Ok(n) => {
                count = Some(n);
                break;
            }
            Err(e) => {
                log::error!("Page {page}: couldn't count results (attempt {attempt}): {e}");
                if attempt < policy.max_attempts {
                    policy.cool_down(attempt).await;
                }
            }
        }
    }
    let Some(count) = count else {
        log::error!("Page {page}: skipped, results never listed");
        return;
    };
    log::debug!("Page {page}: {count} results");

    for number in 0..count {
        scrape_item(navigator, extract, sink, policy, page, number, progress).await;
    }
}

/// Retry loop for one result item: Extracting -> Persisted | Retrying | Abandoned.
pub async fn scrape_item<N, F>(
    navigator: &mut N,
    extract: &mut F,
    sink: &RecordSink,
    policy: &RetryPolicy,
    page: usize,
    number: usize,
    progress: &mut ScrapeProgress,
) -> ItemOutcome
where
    N: Navigator,
    F: FnMut(&str) -> Result<Record>,
{
    for attempt in 1..=policy.max_attempts {
        match attempt_item(navigator, extract, sink, page, number).await {
            Ok(()) => {
                progress.persisted += 1;
                log::info!("Page {page} item {number}: persisted (attempt {attempt})");
                return ItemOutcome::Persisted { attempts: attempt };
            }
            Err(e) => {
                progress.failed_attempts += 1;
                log::error!(
                    "Page {page} item {number}: attempt {attempt}/{} failed: {e}",
                    policy.max_attempts
                );
                if attempt < policy.max_attempts {
                    policy.cool_down(attempt).await;
                }
            }
        }
    }

    progress.abandoned += 1;
    log::error!(
        "Page {page} item {number}: abandoned after {} attempts",
        policy.max_attempts
    );
    ItemOutcome::Abandoned {
        attempts: policy.max_attempts,
    }
}

/// Open, extract, persist, go back. Going back happens whenever the open succeeded. When
/// opening or going back fails the session may be left off the listing, so it is brought
/// back before the next attempt.
async fn attempt_item<N, F>(
    navigator: &mut N,
    extract: &mut F,
    sink: &RecordSink,
    page: usize,
    number: usize,
) -> Result<()>
where
    N: Navigator,
    F: FnMut(&str) -> Result<Record>,
{
    let rendered = match navigator.open_result(number).await {
        Ok(rendered) => rendered,
        Err(e) => {
            recover_listing(navigator).await;
            return Err(e);
        }
    };

    let saved = match extract(&rendered.html) {
        Ok(record) => {
            log::debug!("Extracted {} fields from {}", record.len(), rendered.url);
            let provenance = Provenance {
                url: rendered.url.clone(),
                page_number: page,
                number,
            };
            sink.append(&record, &provenance).await
        }
        Err(e) => Err(e),
    };

    let back = navigator.go_back().await;
    if back.is_err() {
        recover_listing(navigator).await;
    }
    saved.and(back)
}

async fn recover_listing<N: Navigator>(navigator: &mut N) {
    if let Err(e) = navigator.return_to_listing().await {
        log::error!("Couldn't return to the results listing: {e}");
    }
}

/// Moves to the next results page. `false` ends the run.
async fn advance<N: Navigator>(navigator: &mut N, policy: &RetryPolicy) -> bool {
    for attempt in 1..=policy.max_attempts {
        match navigator.advance_page().await {
            Ok(()) => return true,
            Err(e) if e.is_terminal() => {
                log::info!("Last results page reached");
                return false;
            }
            Err(e) => {
                log::error!("Couldn't advance to next page (attempt {attempt}): {e}");
                if attempt < policy.max_attempts {
                    policy.cool_down(attempt).await;
                }
            }
        }
    }
    log::error!("Giving up on pagination");
    false
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::navigate::RenderedPage;
    use crate::Error;

    #[derive(Default)]
    struct ScriptedNavigator {
        opens: usize,
        backs: usize,
    }

    impl Navigator for ScriptedNavigator {
        async fn configure_search(&mut self) -> Result<()> {
            Ok(())
        }
        async fn listing_source(&mut self) -> Result<String> {
            Ok(String::new())
        }
        async fn result_count(&mut self) -> Result<usize> {
            Ok(1)
        }
        async fn open_result(&mut self, index: usize) -> Result<RenderedPage> {
            self.opens += 1;
            Ok(RenderedPage {
                url: format!("https://example.org/notice/{index}"),
                html: String::new(),
            })
        }
        async fn go_back(&mut self) -> Result<()> {
            self.backs += 1;
            Ok(())
        }
        async fn return_to_listing(&mut self) -> Result<()> {
            Ok(())
        }
        async fn advance_page(&mut self) -> Result<()> {
            Err(Error::PaginationExhausted)
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            cooldown: Duration::ZERO,
        }
    }

    fn failing_then_ok(failures: usize) -> impl FnMut(&str) -> Result<Record> {
        let mut calls = 0;
        move |_| {
            calls += 1;
            if calls <= failures {
                return Err(Error::UiElementNotFound("content-block".to_string()));
            }
            let mut record = Record::new();
            record.insert("title", "ok");
            Ok(record)
        }
    }

    #[tokio::test]
    async fn four_failures_then_success_persists_once() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordSink::new(dir.path().join("out.csv"));
        let mut nav = ScriptedNavigator::default();
        let mut extract = failing_then_ok(4);
        let mut progress = ScrapeProgress::default();

        let outcome =
            scrape_item(&mut nav, &mut extract, &sink, &policy(), 1, 0, &mut progress).await;

        assert_eq!(outcome, ItemOutcome::Persisted { attempts: 5 });
        assert_eq!(progress.persisted, 1);
        assert_eq!(progress.failed_attempts, 4);
        assert_eq!((nav.opens, nav.backs), (5, 5));
        let text = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn always_failing_item_is_abandoned() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordSink::new(dir.path().join("out.csv"));
        let mut nav = ScriptedNavigator::default();
        let mut extract = failing_then_ok(usize::MAX);
        let mut progress = ScrapeProgress::default();

        let outcome =
            scrape_item(&mut nav, &mut extract, &sink, &policy(), 1, 0, &mut progress).await;

        assert_eq!(outcome, ItemOutcome::Abandoned { attempts: 5 });
        assert_eq!(nav.opens, 5);
        assert_eq!(progress.abandoned, 1);
        assert_eq!(progress.persisted, 0);
        assert!(!sink.path().exists());
    }
}
