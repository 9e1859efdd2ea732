//! Resolving a preview link into an image in the store.

use crate::Identifier;
use crate::error::{ErrorKind, Result};
use crate::fetch;
use exn::ResultExt;
use reqwest::Client;
use std::future::Future;
use tgimg_config::HttpConfig;
use tgimg_extract::error::ErrorKind as ExtractErrorKind;
use tgimg_extract::{ImageReference, ReferenceKind, decode_inline};
use tgimg_storage::BackendHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// The outcome of (successfully) resolving a link.
///
/// Each variant carries the identifier the image is stored under; compose it
/// with wherever the store is published to build a public path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The image was already in the store; no network request was made.
    Cached(Identifier),
    /// The image was fetched from a remote URL.
    Downloaded { identifier: Identifier, bytes: u64 },
    /// The image was embedded in the preview page and decoded.
    Decoded { identifier: Identifier, bytes: u64 },
}
impl Resolution {
    pub fn identifier(&self) -> &Identifier {
        match self {
            Self::Cached(identifier) => identifier,
            Self::Downloaded { identifier, .. } | Self::Decoded { identifier, .. } => identifier,
        }
    }

    pub fn into_identifier(self) -> Identifier {
        match self {
            Self::Cached(identifier) => identifier,
            Self::Downloaded { identifier, .. } | Self::Decoded { identifier, .. } => identifier,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }
}

/// Turns Telegram preview links into images in a store.
///
/// Steps run strictly in sequence: derive the identifier, check the store,
/// fetch the preview page, locate the preview image, then fetch or decode it
/// into the store. Nothing is retried.
///
/// Concurrent resolutions of the same link are not coordinated: both may
/// miss the store and run the whole pipeline, and the last write wins.
/// Every write is atomic, so neither ever observes a partial image.
#[derive(Clone)]
pub struct Resolver {
    client: Client,
    backend: BackendHandle,
}
impl Resolver {
    pub fn new(client: Client, backend: BackendHandle) -> Self {
        Self { client, backend }
    }

    /// Create a resolver with an HTTP client built from `config`.
    pub fn from_config(config: &HttpConfig, backend: BackendHandle) -> Result<Self> {
        Ok(Self::new(fetch::client(config)?, backend))
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Whether the store already holds `identifier`.
    ///
    /// Presence only: an empty or corrupt file counts.
    pub async fn exists(&self, identifier: &Identifier) -> Result<bool> {
        self.backend.exists(identifier.as_path()).await.or_raise(|| ErrorKind::Storage {
            identifier: identifier.to_string(),
        })
    }

    /// The stored identifier for a link, if it has been resolved before.
    ///
    /// Both the plain identifier and its inline-decoded form are checked.
    pub async fn cached(&self, identifier: &Identifier) -> Result<Option<Identifier>> {
        if self.exists(identifier).await? {
            return Ok(Some(identifier.clone()));
        }
        let inline = identifier.inline();
        if self.exists(&inline).await? {
            return Ok(Some(inline));
        }
        Ok(None)
    }

    /// Resolve `link` into the store. See [`Resolver`] for the steps taken.
    pub async fn resolve(&self, link: &str) -> Result<Resolution> {
        self.resolve_with_cancellation(link, &CancellationToken::new()).await
    }

    /// Same as [`resolve()`](Self::resolve), but gives up with
    /// [`ErrorKind::Cancelled`] as soon as `cancel` fires. Cancelling during
    /// the final write discards it.
    #[instrument(skip(self, cancel), fields(backend = self.backend.name(), identifier = tracing::field::Empty))]
    pub async fn resolve_with_cancellation(&self, link: &str, cancel: &CancellationToken) -> Result<Resolution> {
        let identifier = Identifier::from_link(link)?;
        tracing::Span::current().record("identifier", identifier.as_str());

        if let Some(cached) = self.cached(&identifier).await? {
            tracing::debug!(stored = %cached, "Image already in store");
            return Ok(Resolution::Cached(cached));
        }

        let reference = self.locate(link, cancel).await?;
        let resolution = match reference.kind() {
            ReferenceKind::Remote => {
                let bytes = self.download(link, reference.as_str(), &identifier, cancel).await?;
                Resolution::Downloaded { identifier, bytes }
            },
            ReferenceKind::Inline => {
                let data = decode_inline(reference.as_str()).or_raise(|| ErrorKind::Decode { url: link.to_string() })?;
                let identifier = identifier.inline();
                let bytes = self.store(link, &identifier, &data, cancel).await?;
                Resolution::Decoded { identifier, bytes }
            },
            ReferenceKind::Unknown => exn::bail!(ErrorKind::UnsupportedReference {
                url: link.to_string(),
                reference: reference.into_inner(),
            }),
        };
        tracing::info!(stored = %resolution.identifier(), "Image stored");
        Ok(resolution)
    }

    /// Fetches the preview page and finds its preview image.
    async fn locate(&self, link: &str, cancel: &CancellationToken) -> Result<ImageReference> {
        let response = cancellable(cancel, link, fetch::get(&self.client, link)).await?;
        let page = cancellable(cancel, link, fetch::body(response, link)).await?;
        // The parsed document can't be held across an await point; only the
        // owned reference leaves this block.
        match tgimg_extract::extract(&page) {
            Ok(reference) => Ok(reference),
            Err(err) => {
                let url = link.to_string();
                let kind = match &*err {
                    ExtractErrorKind::MissingImage => ErrorKind::Extraction { url },
                    _ => ErrorKind::Parse { url },
                };
                Err(err.raise(kind))
            },
        }
    }

    /// Streams a remote image into the store.
    async fn download(
        &self,
        link: &str,
        url: &str,
        identifier: &Identifier,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let storage = || ErrorKind::Storage { identifier: identifier.to_string() };
        let mut response = cancellable(cancel, link, fetch::get(&self.client, url)).await?;
        let mut staged =
            cancellable(cancel, link, async { self.backend.stage(identifier.as_path()).await.or_raise(storage) })
                .await?;
        while let Some(chunk) = cancellable(cancel, link, fetch::chunk(&mut response, url)).await? {
            cancellable(cancel, link, async { staged.append(&chunk).await.or_raise(storage) }).await?;
        }
        cancellable(cancel, link, async { staged.commit().await.or_raise(storage) }).await
    }

    /// Writes already materialized bytes into the store.
    async fn store(&self, link: &str, identifier: &Identifier, data: &[u8], cancel: &CancellationToken) -> Result<u64> {
        cancellable(cancel, link, async {
            self.backend.write(identifier.as_path(), data).await.or_raise(|| ErrorKind::Storage {
                identifier: identifier.to_string(),
            })
        })
        .await
    }
}

/// Runs `future` unless `cancel` fires first.
async fn cancellable<T>(cancel: &CancellationToken, link: &str, future: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => exn::bail!(ErrorKind::Cancelled { url: link.to_string() }),
        result = future => result,
    }
}
