//! Mirrors the Companies House bulk data products into local directories.
//!
//! Each category lists what the remote side advertises and fetches only the files that
//! aren't on disk yet. Local files are never overwritten or removed. Categories share
//! nothing and run concurrently; a failure in one is logged and doesn't touch the others.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Local;
use reqwest::Client;

use crate::config::FetchConfig;
use crate::ftp::{load_token, FtpStore};
use crate::request::HttpIndex;
use crate::{info_time, Result};

/// A remote listing that files can be fetched from.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Names of the files on offer, as advertised.
    async fn list(&mut self) -> Result<Vec<String>>;
    /// Copies `name` to `dest`, returning the number of bytes written.
    async fn download(&mut self, name: &str, dest: &Path) -> Result<u64>;
    /// Ends the session. Called once a sync finishes, whether or not it succeeded.
    async fn close(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub listed: usize,
    pub skipped: usize,
    pub fetched: usize,
    pub bytes: u64,
}

/// Where an in-flight download is written before it is renamed into place.
pub(crate) fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Local file name for an advertised name, which may carry a path.
fn local_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Fetches every listed file missing from `dir`, then closes the store.
pub async fn sync_store<S: RemoteStore>(store: &mut S, dir: &Path) -> Result<SyncReport> {
    let synced = sync_missing(store, dir).await;
    if let Err(e) = store.close().await {
        log::warn!("Couldn't close session for {}: {e}", dir.display());
    }
    synced
}

async fn sync_missing<S: RemoteStore>(store: &mut S, dir: &Path) -> Result<SyncReport> {
    tokio::fs::create_dir_all(dir).await?;
    let names = store.list().await?;
    let mut report = SyncReport {
        listed: names.len(),
        ..SyncReport::default()
    };

    let mut claimed: HashSet<&str> = HashSet::new();
    for name in &names {
        let local = local_name(name);
        if local.is_empty() {
            continue;
        }
        if local != name.as_str() {
            log::debug!("{name} stored as {local}");
        }
        if !claimed.insert(local) {
            log::warn!("{name} has the same file name as an earlier entry, skipping {local}");
            report.skipped += 1;
            continue;
        }
        let dest = dir.join(local);
        if tokio::fs::try_exists(&dest).await? {
            log::info!("{local} exists");
            report.skipped += 1;
            continue;
        }

        log::info!("{local} doesn't exist, getting it");
        let start_time = Local::now();
        let bytes = store.download(name, &dest).await?;
        info_time!(start_time, "Fetched {local} ({bytes} bytes)");
        report.fetched += 1;
        report.bytes += bytes;
    }
    Ok(report)
}

/// The four bulk products.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    BasicCompany,
    Psc,
    Accounts,
    Officers,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::BasicCompany,
        Category::Psc,
        Category::Accounts,
        Category::Officers,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::BasicCompany => "basic_data",
            Category::Psc => "psc_data",
            Category::Accounts => "accounts_data",
            Category::Officers => "officer_data",
        }
    }

    /// Index page and href filter for the categories published over HTTP.
    fn http_index(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Category::BasicCompany => Some(("en_output.html", "BasicCompanyDataAsOneFile")),
            Category::Psc => Some((
                "en_pscdata.html",
                "persons-with-significant-control-snapshot",
            )),
            Category::Accounts => Some(("en_monthlyaccountsdata.html", ".zip")),
            Category::Officers => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::BasicCompany => "free data product",
            Category::Psc => "psc data",
            Category::Accounts => "accounts data",
            Category::Officers => "officer FTP data",
        };
        f.write_str(name)
    }
}

/// How each category's sync ended.
#[derive(Debug, Default)]
pub struct FetchSummary {
    pub results: Vec<(Category, Result<SyncReport>)>,
}

impl FetchSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_ok()).count()
    }
}

async fn fetch_category(
    category: Category,
    client: &Client,
    config: &FetchConfig,
) -> Result<SyncReport> {
    let dir = config.data_dir.join(category.dir_name());
    match category.http_index() {
        Some((page, filter)) => {
            let mut index = HttpIndex::new(client.clone(), &config.data_url, page, filter)?;
            sync_store(&mut index, &dir).await
        }
        None => {
            let token = load_token(&config.token_path)?;
            let mut store = FtpStore::connect(
                (config.ftp_host.as_str(), config.ftp_port),
                &config.ftp_user,
                &token,
            )
            .await?;
            sync_store(&mut store, &dir).await
        }
    }
}

/// Failure boundary around one category.
async fn run_category(
    category: Category,
    client: &Client,
    config: &FetchConfig,
) -> (Category, Result<SyncReport>) {
    let res = fetch_category(category, client, config).await;
    match &res {
        Ok(report) => log::info!(
            "Got the {category}! {} listed, {} new, {} already present",
            report.listed,
            report.fetched,
            report.skipped
        ),
        Err(e) => log::error!("Problem getting the {category}! {e}"),
    }
    (category, res)
}

/// Syncs all four categories concurrently.
pub async fn fetch_all(config: &FetchConfig) -> FetchSummary {
    let client = Client::new();
    let [basic, psc, accounts, officers] = Category::ALL;
    let (basic, psc, accounts, officers) = tokio::join!(
        run_category(basic, &client, config),
        run_category(psc, &client, config),
        run_category(accounts, &client, config),
        run_category(officers, &client, config),
    );
    FetchSummary {
        results: vec![basic, psc, accounts, officers],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    /// Serves a fixed listing and writes the file name as content.
    #[derive(Default)]
    struct FakeStore {
        names: Vec<String>,
        fail_on: Option<String>,
        transfers: Vec<String>,
        closed: usize,
    }

    impl RemoteStore for FakeStore {
        async fn list(&mut self) -> Result<Vec<String>> {
            Ok(self.names.clone())
        }

        async fn download(&mut self, name: &str, dest: &Path) -> Result<u64> {
            self.transfers.push(name.to_string());
            if self.fail_on.as_deref() == Some(name) {
                return Err(Error::TransferFailure {
                    resource: name.to_string(),
                    reason: "connection reset".to_string(),
                });
            }
            tokio::fs::write(dest, name).await?;
            Ok(name.len() as u64)
        }

        async fn close(&mut self) -> Result<()> {
            self.closed += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn only_missing_files_are_fetched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file1.zip"), "already here").unwrap();
        let mut store = FakeStore {
            names: vec!["file1.zip".to_string(), "file2.zip".to_string()],
            ..FakeStore::default()
        };

        let report = sync_store(&mut store, dir.path()).await.unwrap();

        assert_eq!(store.transfers, ["file2.zip"]);
        assert_eq!(
            report,
            SyncReport {
                listed: 2,
                skipped: 1,
                fetched: 1,
                bytes: 9
            }
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("file1.zip")).unwrap(),
            "already here"
        );
        assert_eq!(store.closed, 1);
    }

    #[tokio::test]
    async fn store_closed_when_transfer_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FakeStore {
            names: vec!["a.zip".to_string(), "b.zip".to_string(), "c.zip".to_string()],
            fail_on: Some("b.zip".to_string()),
            ..FakeStore::default()
        };

        let res = sync_store(&mut store, dir.path()).await;

        assert!(matches!(res, Err(Error::TransferFailure { .. })));
        assert_eq!(store.transfers, ["a.zip", "b.zip"]);
        assert_eq!(store.closed, 1);
        assert!(dir.path().join("a.zip").exists());
    }

    #[tokio::test]
    async fn creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("psc_data");
        let mut store = FakeStore {
            names: vec!["archive/psc-snapshot-2023-02-01_1of2.zip".to_string()],
            ..FakeStore::default()
        };

        sync_store(&mut store, &dir).await.unwrap();

        assert!(dir.join("psc-snapshot-2023-02-01_1of2.zip").exists());
    }

    #[tokio::test]
    async fn same_file_name_under_two_paths_is_fetched_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FakeStore {
            names: vec!["2023/accounts.zip".to_string(), "2024/accounts.zip".to_string()],
            ..FakeStore::default()
        };

        let report = sync_store(&mut store, dir.path()).await.unwrap();

        assert_eq!(store.transfers, ["2023/accounts.zip"]);
        assert_eq!((report.fetched, report.skipped), (1, 1));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("accounts.zip")).unwrap(),
            "2023/accounts.zip"
        );
    }

    #[test]
    fn partial_path_sits_beside_destination() {
        let dest = Path::new("data/basic_data/BasicCompanyDataAsOneFile-2023-02-01.zip");
        assert_eq!(
            partial_path(dest),
            Path::new("data/basic_data/BasicCompanyDataAsOneFile-2023-02-01.zip.part")
        );
    }

    #[tokio::test]
    async fn category_failures_are_isolated() {
        let root = tempfile::tempdir().unwrap();
        let config = FetchConfig {
            // Nothing listens here, every HTTP category fails fast.
            data_url: "http://127.0.0.1:9/".to_string(),
            token_path: root.path().join("missing_token"),
            data_dir: root.path().join("data"),
            ..FetchConfig::default()
        };

        let summary = fetch_all(&config).await;

        assert_eq!(summary.results.len(), 4);
        assert_eq!(summary.succeeded(), 0);
        let (category, res) = &summary.results[3];
        assert_eq!(*category, Category::Officers);
        assert!(matches!(res, Err(Error::Io(_))));
    }
}
