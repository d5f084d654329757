use std::ops::RangeInclusive;
use std::time::Duration;

use regex::Regex;
use scraper::{Html, Selector};
use thirtyfour::prelude::*;
use thirtyfour::ChromiumLikeCapabilities;
use url::Url;

use crate::config::ScrapeConfig;
use crate::{Error, Result};

/// Search form controls clicked in order: awarded notices, opportunity type, engagement category.
const SEARCH_CONTROLS: [&str; 5] = ["Awarded", "opportunity", "Opportunity", "engagement", "Search"];
const RESULT_HEADER: &str = "search-result-header";
const CONTENT_BLOCK: &str = "content-block";
const NEXT_PAGE_XPATH: &str =
    ".//*[contains(@class, 'standard-paginate-next govuk-link break-word')]";
const PAGINATION_LINKS: &str = r#"a[class*="standard-paginate"]"#;
const PAGE_MARKER: &str = r"(?i)\bpage\s+\d[\d,]*\s+of\s+(\d[\d,]*)";

/// Markup of one detail page and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub url: String,
    pub html: String,
}

/// Drives the search portal: one stateful session, used strictly sequentially.
#[allow(async_fn_in_trait)]
pub trait Navigator {
    /// Applies the fixed search filter and lands on the first results page.
    async fn configure_search(&mut self) -> Result<()>;
    /// Markup of the results listing currently shown.
    async fn listing_source(&mut self) -> Result<String>;
    async fn result_count(&mut self) -> Result<usize>;
    /// Opens the `index`-th result of the current listing. Must be followed by `go_back`.
    async fn open_result(&mut self, index: usize) -> Result<RenderedPage>;
    async fn go_back(&mut self) -> Result<()>;
    /// Brings the session back to the listing the last `open_result` started from, if a
    /// failed step left it elsewhere. A no-op when already there.
    async fn return_to_listing(&mut self) -> Result<()>;
    /// Fails with `Error::PaginationExhausted` on the last page.
    async fn advance_page(&mut self) -> Result<()>;
}

/// Pages to visit, `1..=N`. N comes from the listing's pagination and is capped at
/// `ceiling`; without a readable marker the ceiling itself is used.
pub fn enumerate_result_pages(listing_html: &str, ceiling: usize) -> RangeInclusive<usize> {
    match discover_page_count(listing_html) {
        Some(pages) if pages > ceiling => {
            log::warn!("Listing reports {pages} results pages, capping at {ceiling}");
            1..=ceiling
        }
        Some(pages) => {
            log::info!("Listing reports {pages} results pages");
            1..=pages
        }
        None => {
            log::warn!("No results page marker found, falling back to {ceiling} pages");
            1..=ceiling
        }
    }
}

fn discover_page_count(listing_html: &str) -> Option<usize> {
    let doc = Html::parse_document(listing_html);
    let text = doc.root_element().text().collect::<Vec<_>>().join(" ");

    let from_marker = Regex::new(PAGE_MARKER).ok().and_then(|marker| {
        marker
            .captures_iter(&text)
            .filter_map(|caps| caps[1].replace(',', "").parse::<usize>().ok())
            .max()
    });

    from_marker.or_else(|| {
        let links = Selector::parse(PAGINATION_LINKS).ok()?;
        doc.select(&links)
            .filter_map(|a| a.text().collect::<String>().trim().parse::<usize>().ok())
            .max()
    })
}

/// `Navigator` over a Chrome session behind a WebDriver server.
pub struct BrowserNavigator {
    driver: WebDriver,
    wait_timeout: Duration,
    poll_interval: Duration,
    search_settle: Duration,
    result_settle: Duration,
    /// Listing shown when the last result was opened.
    listing_url: Option<Url>,
}

impl BrowserNavigator {
    pub async fn connect(config: &ScrapeConfig) -> Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        if config.headless {
            caps.set_headless()?;
        }

        let driver = WebDriver::new(config.webdriver_url.as_str(), caps).await?;
        if !config.headless {
            driver.maximize_window().await?;
        }
        driver.goto(config.search_url.as_str()).await?;
        log::info!("Browser session open at {}", config.search_url);

        Ok(BrowserNavigator {
            driver,
            wait_timeout: config.wait_timeout,
            poll_interval: config.poll_interval,
            search_settle: config.search_settle,
            result_settle: config.result_settle,
            listing_url: None,
        })
    }

    pub async fn quit(self) -> Result<()> {
        self.driver.quit().await?;
        Ok(())
    }

    async fn click_when_ready(&self, by: By, control: &str) -> Result<()> {
        let element = self
            .driver
            .query(by)
            .wait(self.wait_timeout, self.poll_interval)
            .first()
            .await
            .map_err(|_| Error::UiElementNotFound(control.to_string()))?;
        self.click_element(element, control).await
    }

    async fn click_element(&self, element: WebElement, control: &str) -> Result<()> {
        element
            .wait_until()
            .wait(self.wait_timeout, self.poll_interval)
            .clickable()
            .await
            .map_err(|_| Error::UiElementNotFound(control.to_string()))?;
        element.click().await?;
        Ok(())
    }
}

impl Navigator for BrowserNavigator {
    async fn configure_search(&mut self) -> Result<()> {
        // The filter panel only becomes clickable once scrolled into view.
        self.driver
            .execute("window.scrollTo(0, document.body.scrollHeight);", Vec::new())
            .await?;
        for control in SEARCH_CONTROLS {
            let by = By::XPath(format!(".//*[contains(text(),'{control}')]"));
            self.click_when_ready(by, control).await?;
            log::debug!("Clicked search control `{control}`");
        }
        tokio::time::sleep(self.search_settle).await;
        Ok(())
    }

    async fn listing_source(&mut self) -> Result<String> {
        Ok(self.driver.source().await?)
    }

    async fn result_count(&mut self) -> Result<usize> {
        Ok(self.driver.find_all(By::ClassName(RESULT_HEADER)).await?.len())
    }

    async fn open_result(&mut self, index: usize) -> Result<RenderedPage> {
        self.listing_url = Some(self.driver.current_url().await?);
        let header = self
            .driver
            .find_all(By::ClassName(RESULT_HEADER))
            .await?
            .into_iter()
            .nth(index)
            .ok_or_else(|| Error::UiElementNotFound(format!("{RESULT_HEADER}[{index}]")))?;
        header.scroll_into_view().await?;
        self.click_element(header, RESULT_HEADER).await?;

        self.driver
            .query(By::ClassName(CONTENT_BLOCK))
            .wait(self.wait_timeout, self.poll_interval)
            .first()
            .await
            .map_err(|_| Error::UiElementNotFound(CONTENT_BLOCK.to_string()))?;

        let url = self.driver.current_url().await?.to_string();
        let html = self.driver.source().await?;
        Ok(RenderedPage { url, html })
    }

    async fn go_back(&mut self) -> Result<()> {
        self.driver.back().await?;
        tokio::time::sleep(self.result_settle).await;
        Ok(())
    }

    async fn return_to_listing(&mut self) -> Result<()> {
        let Some(listing) = self.listing_url.clone() else {
            return Ok(());
        };
        let current = self.driver.current_url().await?;
        if current != listing {
            log::warn!("Stranded on {current}, going back to the results listing");
            self.driver.back().await?;
            tokio::time::sleep(self.result_settle).await;
        }
        Ok(())
    }

    async fn advance_page(&mut self) -> Result<()> {
        match self
            .click_when_ready(By::XPath(NEXT_PAGE_XPATH), "next page")
            .await
        {
            Err(Error::UiElementNotFound(_)) => Err(Error::PaginationExhausted),
            Err(e) => Err(e),
            Ok(()) => {
                tokio::time::sleep(self.result_settle).await;
                Ok(())
            }
        }
    }
}
