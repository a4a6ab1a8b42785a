//! Update check seam.

use std::path::PathBuf;

use async_trait::async_trait;
use mtpdock_core::{UpdateConfig, UpdateNotice};
use tracing::{info, warn};

use crate::error::{LifecycleError, Result};
use crate::event::{EventSender, LifecycleEvent};

/// Something that can look for and fetch newer releases.
#[async_trait]
pub trait UpdateChecker: Send + Sync {
    /// Returns a notice if a newer release exists.
    async fn check(&self, allow_prerelease: bool) -> Result<Option<UpdateNotice>>;

    /// Downloads the release asset and returns its local path.
    async fn download(&self, notice: &UpdateNotice) -> Result<PathBuf>;
}

/// Runs one update check and reports a found update back to the event loop.
///
/// A failed download still reports the update, just without a local file.
pub async fn run_update_check(
    checker: &dyn UpdateChecker,
    config: UpdateConfig,
    events: &EventSender,
) -> Result<()> {
    let Some(mut notice) = checker.check(config.allow_prerelease).await? else {
        info!("No update available");
        return Ok(());
    };

    info!(version = %notice.version, "Update available");

    if config.auto_download_enabled {
        match checker.download(&notice).await {
            Ok(path) => notice.downloaded = Some(path),
            Err(e) => warn!(version = %notice.version, error = %e, "Update download failed"),
        }
    }

    events
        .send(LifecycleEvent::UpdateAvailable(notice))
        .map_err(|_| LifecycleError::ChannelClosed)
}
