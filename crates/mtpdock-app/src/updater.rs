//! Update checks against GitHub Releases.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mtpdock_core::UpdateNotice;
use mtpdock_lifecycle::{LifecycleError, UpdateChecker};
use semver::Version;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Default GitHub repository for updates.
pub const DEFAULT_REPO_OWNER: &str = "mtpdock";
pub const DEFAULT_REPO_NAME: &str = "mtpdock";

/// Errors that can occur during update operations.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse version: {0}")]
    VersionParse(#[from] semver::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No compatible asset found for this platform")]
    NoCompatibleAsset,
}

/// Result type for update operations.
pub type Result<T> = std::result::Result<T, UpdateError>;

impl From<UpdateError> for LifecycleError {
    fn from(e: UpdateError) -> Self {
        LifecycleError::Update(e.to_string())
    }
}

/// A GitHub release.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    pub html_url: String,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

/// A release asset (downloadable file).
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// Checks for and downloads releases published on GitHub.
#[derive(Debug)]
pub struct GitHubUpdater {
    owner: String,
    repo: String,
    current_version: Version,
    client: reqwest::Client,
    download_dir: PathBuf,
}

impl GitHubUpdater {
    /// Creates an updater for the default repository.
    pub fn new(download_dir: PathBuf) -> Result<Self> {
        let current_version = Version::parse(env!("CARGO_PKG_VERSION"))?;

        let client = reqwest::Client::builder()
            .user_agent(format!("MtpDock/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            owner: DEFAULT_REPO_OWNER.to_string(),
            repo: DEFAULT_REPO_NAME.to_string(),
            current_version,
            client,
            download_dir,
        })
    }

    /// Compares against `version` instead of the running version.
    pub fn with_current_version(mut self, version: Version) -> Self {
        self.current_version = version;
        self
    }

    /// Picks the newest eligible release that is newer than the current version.
    pub fn select_update(
        &self,
        releases: &[GitHubRelease],
        allow_prerelease: bool,
    ) -> Option<UpdateNotice> {
        let (version, release) = releases
            .iter()
            .filter(|r| !r.draft && (allow_prerelease || !r.prerelease))
            .filter_map(|r| {
                let tag = r.tag_name.strip_prefix('v').unwrap_or(&r.tag_name);
                match Version::parse(tag) {
                    Ok(version) => Some((version, r)),
                    Err(e) => {
                        debug!(tag = %r.tag_name, error = %e, "Skipping release with bad tag");
                        None
                    }
                }
            })
            .filter(|(version, _)| *version > self.current_version)
            .max_by(|(a, _), (b, _)| a.cmp(b))?;

        let asset = find_compatible_asset(&release.assets, platform_asset_patterns());

        Some(UpdateNotice {
            version: version.to_string(),
            release_url: release.html_url.clone(),
            download_url: asset.map(|a| a.browser_download_url.clone()),
            asset_name: asset.map(|a| a.name.clone()),
            prerelease: release.prerelease,
            downloaded: None,
        })
    }

    /// Fetches recent releases from GitHub.
    async fn fetch_releases(&self) -> Result<Vec<GitHubRelease>> {
        let url = format!(
            "https://api.github.com/repos/{}/{}/releases",
            self.owner, self.repo
        );

        let releases = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(releases)
    }

    /// Checks for a newer release.
    pub async fn check_for_updates(&self, allow_prerelease: bool) -> Result<Option<UpdateNotice>> {
        let releases = self.fetch_releases().await?;
        debug!(count = releases.len(), "Fetched releases");
        Ok(self.select_update(&releases, allow_prerelease))
    }

    /// Downloads the update asset to the download directory.
    pub async fn download_update(&self, notice: &UpdateNotice) -> Result<PathBuf> {
        let download_url = notice
            .download_url
            .as_ref()
            .ok_or(UpdateError::NoCompatibleAsset)?;
        let asset_name = notice
            .asset_name
            .as_deref()
            .and_then(|name| Path::new(name).file_name())
            .ok_or(UpdateError::NoCompatibleAsset)?;

        tokio::fs::create_dir_all(&self.download_dir).await?;
        let dest_path = self.download_dir.join(asset_name);

        let bytes = self
            .client
            .get(download_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        tokio::fs::write(&dest_path, &bytes).await?;

        info!(path = %dest_path.display(), bytes = bytes.len(), "Update downloaded");
        Ok(dest_path)
    }
}

#[async_trait]
impl UpdateChecker for GitHubUpdater {
    async fn check(
        &self,
        allow_prerelease: bool,
    ) -> mtpdock_lifecycle::Result<Option<UpdateNotice>> {
        Ok(self.check_for_updates(allow_prerelease).await?)
    }

    async fn download(&self, notice: &UpdateNotice) -> mtpdock_lifecycle::Result<PathBuf> {
        Ok(self.download_update(notice).await?)
    }
}

/// Finds the first asset matching a pattern, trying patterns in order.
fn find_compatible_asset<'a>(
    assets: &'a [GitHubAsset],
    patterns: &[&str],
) -> Option<&'a GitHubAsset> {
    patterns.iter().find_map(|pattern| {
        assets
            .iter()
            .find(|asset| asset.name.to_lowercase().contains(pattern))
    })
}

/// Returns asset name patterns for the current platform, best first.
fn platform_asset_patterns() -> &'static [&'static str] {
    #[cfg(target_os = "macos")]
    {
        #[cfg(target_arch = "aarch64")]
        {
            &["macos-arm64.dmg", "darwin-arm64", "aarch64-apple-darwin"]
        }
        #[cfg(not(target_arch = "aarch64"))]
        {
            &["macos-x64.dmg", "darwin-x64", "x86_64-apple-darwin"]
        }
    }

    #[cfg(target_os = "windows")]
    {
        &["windows-x64.exe", "windows-x64.msi", "windows", "win64"]
    }

    #[cfg(target_os = "linux")]
    {
        &[
            "linux-x64.appimage",
            "x86_64.appimage",
            "linux-x64.deb",
            "amd64.deb",
            "linux",
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        &[]
    }
}

/// Whether an app bundle at `exe` was installed to the Applications folder.
pub fn installed_in_applications(exe: &Path) -> bool {
    exe.starts_with("/Applications")
}

/// Whether this install can update itself.
///
/// On macOS an app run from outside `/Applications` (a mounted disk image,
/// Downloads) cannot replace itself.
pub fn updates_supported() -> bool {
    if !cfg!(target_os = "macos") {
        return true;
    }

    std::env::current_exe()
        .map(|exe| installed_in_applications(&exe))
        .unwrap_or(false)
}
