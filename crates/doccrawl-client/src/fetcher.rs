use std::net::IpAddr;
use std::time::Duration;

use doccrawl_core::error::AppError;
use doccrawl_core::traits::Fetcher;
use reqwest::{Client, StatusCode};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "doccrawl/0.1 (documentation crawler)";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP fetcher using reqwest.
///
/// Downloads pages, sitemaps and robots.txt files. By default, requests to
/// private/reserved IP ranges are refused; use
/// [`allow_private_urls`](Self::allow_private_urls) for CLI runs where the
/// operator controls the machine (and for local test servers).
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout_secs: u64,
    block_private: bool,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_options(DEFAULT_FETCH_TIMEOUT, DEFAULT_USER_AGENT)
    }

    pub fn with_options(timeout: Duration, user_agent: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
            block_private: true,
        })
    }

    /// Allow requests to private/reserved IPs.
    pub fn allow_private_urls(mut self) -> Self {
        self.block_private = false;
        self
    }

    fn map_send_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else {
            AppError::HttpError(e.to_string())
        }
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let parsed = Url::parse(url).map_err(|e| AppError::HttpError(format!("Invalid URL: {e}")))?;
        if self.block_private {
            ensure_public_target(&parsed).await?;
        }

        tracing::debug!(%url, "GET");
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::TOO_MANY_REQUESTS => return Err(AppError::RateLimitExceeded),
            status => {
                return Err(AppError::HttpError(format!(
                    "HTTP {} for {url}",
                    status.as_u16()
                )));
            }
        }

        response
            .text()
            .await
            .map_err(|e| AppError::HttpError(format!("Failed to read response body: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Private address guard
// ---------------------------------------------------------------------------

/// Refuse non-http(s) URLs and hosts that resolve to a private/reserved IP.
async fn ensure_public_target(url: &Url) -> Result<(), AppError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::HttpError(format!(
            "URL scheme '{}' is not allowed (only http/https)",
            url.scheme()
        )));
    }
    let host = url
        .host_str()
        .ok_or_else(|| AppError::HttpError("URL has no host".to_string()))?;

    let ips: Vec<IpAddr> = match host.trim_matches(['[', ']']).parse::<IpAddr>() {
        Ok(ip) => vec![ip],
        Err(_) => {
            let port = url.port_or_known_default().unwrap_or(80);
            tokio::net::lookup_host((host, port))
                .await
                .map_err(|e| AppError::NetworkError(format!("DNS resolution failed for {host}: {e}")))?
                .map(|addr| addr.ip())
                .collect()
        }
    };

    if ips.is_empty() {
        return Err(AppError::NetworkError(format!(
            "DNS resolution returned no addresses for {host}"
        )));
    }
    if let Some(ip) = ips.into_iter().find(|ip| is_reserved(*ip)) {
        return Err(AppError::HttpError(format!(
            "Blocked private address: {host} resolves to {ip}"
        )));
    }
    Ok(())
}

/// Loopback, private, link-local, CGN and other non-routable ranges.
fn is_reserved(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || (a == 100 && (b & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_reserved(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xFFC0) == 0xFE80
                || (first & 0xFE00) == 0xFC00
        }
    }
}
