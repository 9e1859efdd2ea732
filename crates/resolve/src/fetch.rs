//! Plain HTTP GETs with the error mapping every fetch in this crate shares.

use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use reqwest::{Client, Response};
use tgimg_config::HttpConfig;
use tracing::instrument;

/// Builds the client used for both the preview page and the image itself.
///
/// The configured timeout bounds each request as a whole (connect, headers
/// and body), so a stalled remote surfaces as [`ErrorKind::Timeout`].
pub fn client(config: &HttpConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .user_agent(config.user_agent.as_str())
        .build()
        .or_raise(|| ErrorKind::Client)
}

/// Sends a GET request and insists on a success status.
#[instrument(level = "debug", skip(client))]
pub(crate) async fn get(client: &Client, url: &str) -> Result<Response> {
    let response = client.get(url).send().await.map_err(|e| transport(url, e))?;
    let status = response.status();
    if !status.is_success() {
        tracing::debug!(status = status.as_u16(), "Unsuccessful response");
        exn::bail!(ErrorKind::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// Next chunk of a response body, `None` once the body is exhausted.
pub(crate) async fn chunk(response: &mut Response, url: &str) -> Result<Option<Vec<u8>>> {
    let chunk = response.chunk().await.map_err(|e| transport(url, e))?;
    Ok(chunk.map(|bytes| bytes.to_vec()))
}

/// The whole response body.
pub(crate) async fn body(response: Response, url: &str) -> Result<Vec<u8>> {
    let bytes = response.bytes().await.map_err(|e| transport(url, e))?;
    Ok(bytes.to_vec())
}

/// Maps a transport-level failure, keeping the client error as the cause.
pub(crate) fn transport(url: &str, err: reqwest::Error) -> Error {
    let url = url.to_string();
    let kind = if err.is_timeout() { ErrorKind::Timeout { url } } else { ErrorKind::Fetch { url } };
    exn::Exn::from(err).raise(kind)
}
