//! Runtime configuration updates.

use std::sync::Arc;

use crate::config::{Config, ConfigUpdate};
use crate::error::Result;

use super::Uploader;

impl Uploader {
    /// Get the current configuration
    ///
    /// Returns the configuration applied to uploads admitted from now on. The
    /// configuration is wrapped in an Arc, so this is a cheap clone operation.
    pub async fn config(&self) -> Arc<Config> {
        Arc::clone(&self.state.lock().await.config)
    }

    /// Apply a runtime configuration update
    ///
    /// Changes only affect sessions admitted after this call; uploads already in
    /// flight keep the options they started with. Raising `max_concurrent_uploads`
    /// admits queued files immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the updated configuration
    /// is invalid; the current configuration is left unchanged.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use chunk_uploader::{ConfigUpdate, Uploader};
    /// # async fn example(uploader: Uploader) -> chunk_uploader::Result<()> {
    /// uploader
    ///     .update_config(ConfigUpdate {
    ///         max_concurrent_uploads: Some(5),
    ///         ..Default::default()
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn update_config(&self, update: ConfigUpdate) -> Result<()> {
        let mut state = self.state.lock().await;
        let updated = update.apply_to(&state.config)?;

        let previous_ceiling = state.config.max_concurrent_uploads();
        let ceiling = updated.max_concurrent_uploads();
        state.config = Arc::new(updated);

        tracing::info!(
            endpoint = state.config.upload.endpoint.as_deref().unwrap_or("<none>"),
            max_concurrent_uploads = ceiling,
            "Configuration updated"
        );

        if ceiling > previous_ceiling {
            self.process_queue(&mut state);
            self.finish_if_drained(&mut state);
        }
        Ok(())
    }
}
