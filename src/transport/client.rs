//! # CloudPRNT HTTP Client
//!
//! Thin wrapper over `reqwest` that knows the CloudPRNT endpoints:
//!
//! | Call | Request |
//! |------|---------|
//! | Status push | `POST <poll-url>` with a JSON [`StatusReport`] |
//! | Job fetch | `GET <poll-url>?type=<mt>&mac=<id>[&token=<tok>]` |
//! | Acknowledge | `DELETE <poll-url>?code=<code>&mac=<id>[&token=<tok>]` |
//! | Settings | `GET <dir>/cloudprnt-setting.json?mac=<id>&replaced_path=<last>` |
//!
//! Every request carries the configured basic-auth credentials. Non-2xx
//! responses become [`CloudPrntError::HttpStatus`].

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, Url};
use tracing::debug;

use crate::cloudprnt::{Ack, PollStatus, StatusReport};
use crate::error::CloudPrntError;
use crate::printer::{BasicAuth, EmulatorConfig, PrinterIdentity};

/// Settings resource that replaces the last segment of the poll URL.
pub const SETTINGS_RESOURCE: &str = "cloudprnt-setting.json";

/// Bound on status, fetch and acknowledge calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound on the settings fetch.
pub const SETTINGS_TIMEOUT: Duration = Duration::from_secs(15);

pub struct CloudPrntClient {
    http: reqwest::Client,
    poll_url: Url,
    identity: PrinterIdentity,
    auth: Option<BasicAuth>,
}

impl CloudPrntClient {
    pub fn new(config: &EmulatorConfig) -> Result<Self, CloudPrntError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("cloudprnt-emulator/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CloudPrntError::Transport(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            poll_url: config.poll_url.clone(),
            identity: config.identity.clone(),
            auth: config.auth.clone(),
        })
    }

    pub fn poll_url(&self) -> &Url {
        &self.poll_url
    }

    pub fn identity(&self) -> &PrinterIdentity {
        &self.identity
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.auth {
            Some(auth) => builder.basic_auth(&auth.user, auth.password.as_ref()),
            None => builder,
        }
    }

    /// Send and require a 2xx status.
    async fn send(&self, builder: RequestBuilder) -> Result<Response, CloudPrntError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CloudPrntError::HttpStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(response)
    }

    /// Push a status report and decode the server's reply.
    pub async fn post_status(&self, report: &StatusReport) -> Result<PollStatus, CloudPrntError> {
        let response = self
            .send(self.request(Method::POST, self.poll_url.clone()).json(report))
            .await?;
        let body = response.bytes().await?;
        let status: PollStatus = serde_json::from_slice(&body)?;
        debug!(?status, "Poll response");
        Ok(status)
    }

    /// Push a status report, ignoring the reply body.
    pub async fn post_report(&self, report: &StatusReport) -> Result<(), CloudPrntError> {
        self.send(self.request(Method::POST, self.poll_url.clone()).json(report))
            .await?;
        Ok(())
    }

    /// Download a job payload in the given media type.
    pub async fn fetch_job(
        &self,
        media_type: &str,
        token: Option<&str>,
    ) -> Result<Vec<u8>, CloudPrntError> {
        let mut query = vec![("type", media_type), ("mac", self.identity.as_str())];
        if let Some(token) = token {
            query.push(("token", token));
        }

        let response = self
            .send(self.request(Method::GET, self.poll_url.clone()).query(&query))
            .await?;
        let body = response.bytes().await?;
        debug!(media_type, len = body.len(), "Fetched job");
        Ok(body.to_vec())
    }

    /// Report how a job ended.
    pub async fn acknowledge(&self, ack: &Ack) -> Result<(), CloudPrntError> {
        let code = ack.code.to_string();
        let mut query = vec![("code", code.as_str()), ("mac", self.identity.as_str())];
        if let Some(token) = ack.token.as_deref() {
            query.push(("token", token));
        }

        self.send(self.request(Method::DELETE, self.poll_url.clone()).query(&query))
            .await?;
        debug!(code = %ack.code, token = ?ack.token, "Acknowledged job");
        Ok(())
    }

    /// Fetch the settings document. The status is not checked; the
    /// negotiator classifies it.
    pub async fn fetch_settings(&self) -> Result<Response, CloudPrntError> {
        let url = settings_url(&self.poll_url, &self.identity)?;
        debug!(%url, "Fetching server settings");
        let response = self
            .request(Method::GET, url)
            .timeout(SETTINGS_TIMEOUT)
            .send()
            .await
            .map_err(|e| CloudPrntError::Transport(format!("Settings fetch failed: {}", e)))?;
        Ok(response)
    }
}

/// Derive the settings URL from the poll URL.
///
/// The last path segment is replaced with [`SETTINGS_RESOURCE`] and passed
/// along as `replaced_path`, together with the device `mac`. Any query of
/// the poll URL is dropped.
///
/// ```
/// use cloudprnt_emulator::printer::PrinterIdentity;
/// use cloudprnt_emulator::transport::client::settings_url;
/// use reqwest::Url;
///
/// let poll = Url::parse("http://host/cloudprnt/poll.php?x=1")?;
/// let url = settings_url(&poll, &PrinterIdentity::default())?;
/// assert_eq!(
///     url.as_str(),
///     "http://host/cloudprnt/cloudprnt-setting.json?mac=00%3A11%3A62%3A00%3A00%3A01&replaced_path=poll.php"
/// );
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn settings_url(poll_url: &Url, identity: &PrinterIdentity) -> Result<Url, CloudPrntError> {
    let last = poll_url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| {
            CloudPrntError::Config(format!("Poll URL '{}' has no path to replace", poll_url))
        })?
        .to_string();

    let mut url = poll_url.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|_| CloudPrntError::Config(format!("Poll URL '{}' cannot be a base", poll_url)))?
        .pop()
        .push(SETTINGS_RESOURCE);
    url.query_pairs_mut()
        .append_pair("mac", identity.as_str())
        .append_pair("replaced_path", &last);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_settings_url_replaces_last_segment() {
        let settings = settings_url(&url("https://example.com/a/b/poll"), &PrinterIdentity::default())
            .unwrap();
        assert_eq!(settings.path(), "/a/b/cloudprnt-setting.json");

        let pairs: Vec<(String, String)> = settings.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("mac".to_string(), "00:11:62:00:00:01".to_string()),
                ("replaced_path".to_string(), "poll".to_string()),
            ]
        );
    }

    #[test]
    fn test_settings_url_at_root() {
        let settings =
            settings_url(&url("http://localhost:8080/poll.php"), &PrinterIdentity::default())
                .unwrap();
        assert_eq!(settings.path(), "/cloudprnt-setting.json");
    }

    #[test]
    fn test_settings_url_needs_a_segment() {
        for poll in ["http://localhost:8080/", "http://localhost:8080/dir/"] {
            assert!(matches!(
                settings_url(&url(poll), &PrinterIdentity::default()),
                Err(CloudPrntError::Config(_))
            ));
        }
    }
}
