//! The channel-source seam: where records actually come from.

use async_trait::async_trait;
use futures::stream::BoxStream;
use vigil_types::EventBookmark;

use crate::types::{SourceRecord, WatchError};

/// A provider of raw records for a single channel. Implementations wrap
/// whatever the host OS/log backend is (e.g. a Windows Event Log
/// subscription, a journald reader); the watcher itself is backend-agnostic.
#[async_trait]
pub trait ChannelSource: Send + Sync {
    /// Subscribe to `channel`, resuming after `after` if given, else from
    /// the stream's current tail. `xpath_filter` is passed through opaquely.
    async fn subscribe(
        &self,
        channel: &str,
        xpath_filter: Option<&str>,
        after: Option<&EventBookmark>,
    ) -> Result<BoxStream<'static, SourceRecord>, WatchError>;
}
