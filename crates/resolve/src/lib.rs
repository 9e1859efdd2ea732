//! Resolve Telegram preview links into images in the local store.
//!
//! A [`Resolver`] takes a `t.me` preview link, derives the file name the image
//! is stored under, and only touches the network when the store does not
//! already hold it. Remote preview images are streamed into the store; inline
//! ones are decoded from the page itself and stored with an
//! [`INLINE_SUFFIX`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use tgimg_config::HttpConfig;
//! use tgimg_resolve::Resolver;
//! use tgimg_storage::backend::LocalBackend;
//! # async fn example() -> tgimg_resolve::error::Result<()> {
//! let backend = Arc::new(LocalBackend::new("images", "/srv/images").unwrap());
//! let resolver = Resolver::from_config(&HttpConfig::default(), backend)?;
//! let resolution = resolver.resolve("https://t.me/channel/123").await?;
//! println!("stored as {}", resolution.identifier());
//! # Ok(())
//! # }
//! ```

pub mod error;
mod fetch;
mod identifier;
mod resolve;
mod upload;

pub use crate::fetch::client;
pub use crate::identifier::{INLINE_SUFFIX, Identifier};
pub use crate::resolve::{Resolution, Resolver};
pub use crate::upload::{ImgbbUploader, Uploader};
