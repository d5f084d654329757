use std::path::Path;

use reqwest::Client;
use scraper::{Html, Selector};
use tokio::{fs, fs::File, io::AsyncWriteExt};
use url::Url;

use crate::fetch::{partial_path, RemoteStore};
use crate::{Error, Result};

/// A bulk data product published as links on an HTML index page.
pub struct HttpIndex {
    client: Client,
    base: Url,
    index_page: String,
    filter: String,
}

impl HttpIndex {
    /// `filter` is the substring an `href` must contain to count as part of this product.
    pub fn new(client: Client, base: &str, index_page: &str, filter: &str) -> Result<Self> {
        Ok(HttpIndex {
            client,
            base: Url::parse(base)?,
            index_page: index_page.to_string(),
            filter: filter.to_string(),
        })
    }
}

impl RemoteStore for HttpIndex {
    async fn list(&mut self) -> Result<Vec<String>> {
        let url = self.base.join(&self.index_page)?;
        let html = request_page_html(&self.client, &url).await?;
        Ok(anchor_hrefs(&html, &self.filter))
    }

    async fn download(&mut self, name: &str, dest: &Path) -> Result<u64> {
        let url = self.base.join(name)?;
        let mut res = self.client.get(url.clone()).send().await?;
        if !res.status().is_success() {
            return Err(Error::TransferFailure {
                resource: url.to_string(),
                reason: res.status().to_string(),
            });
        }

        let part = partial_path(dest);
        let mut file = File::create(&part).await?;
        let mut written = 0u64;
        while let Some(chunk) = res.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);
        fs::rename(&part, dest).await?;
        Ok(written)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Requests a page and returns a `Result<String>` containing the HTML.
async fn request_page_html(client: &Client, url: &Url) -> Result<String> {
    let res = client.get(url.clone()).send().await?;
    if !res.status().is_success() {
        return Err(Error::TransferFailure {
            resource: url.to_string(),
            reason: res.status().to_string(),
        });
    }
    let html = res.text().await?;
    Ok(html)
}

/// Every `a[href]` whose target contains `filter`, in page order, without repeats.
pub fn anchor_hrefs(html: &str, filter: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut hrefs: Vec<String> = Vec::new();
    for href in doc.select(&anchors).filter_map(|a| a.value().attr("href")) {
        if href.contains(filter) && !hrefs.iter().any(|h| h == href) {
            hrefs.push(href.to_string());
        }
    }
    hrefs
}
