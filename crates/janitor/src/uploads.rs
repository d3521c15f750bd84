use crate::error::{ErrorKind, Result};
use crate::janitor::Janitor;
use exn::ResultExt;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

impl Janitor {
    /// Remove uploads (stitched or partial) that were last touched longer ago
    /// than the maximum unconverted upload age. Their conversion either
    /// failed or was never going to happen.
    #[instrument(skip_all)]
    pub(crate) async fn clean_old_uploads(&self, cancel: &CancellationToken) -> Result<()> {
        let max_age = time::Duration::try_from(self.config.max_unconverted_upload_age()).unwrap_or(time::Duration::MAX);
        let now = OffsetDateTime::now_utc();
        let files = self.backend.list(Some(self.layout.uploads_dir())).await.or_raise(|| ErrorKind::Storage)?;

        let mut removed = 0u64;
        for file in files.into_iter().filter(|file| file.age(now) > max_age) {
            if cancel.is_cancelled() {
                break;
            }
            if self.remove(&file.path, &self.metrics.uploads_removed).await? {
                removed += 1;
                tracing::info!(path = %file.path.display(), age = %file.age(now), "Removed unconverted upload");
            }
        }
        if removed > 0 {
            tracing::info!(removed, "Removed old uploads");
        }
        Ok(())
    }
}
