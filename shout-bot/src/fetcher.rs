use crate::config::FetchConfig;
use crate::types::{BotError, Result};
use crate::utils::bytes::human_readable;
use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use interfaces::defs::TitleFetcher;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

static TITLE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));
static TITLE_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s<>]+").expect("valid whitespace regex"));
static CHARSET_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)charset=([-_a-zA-Z0-9]+)").expect("valid charset regex"));

/// Media type and charset from a `Content-Type` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    pub media_type: String,
    pub charset: Option<String>,
}

impl ContentType {
    pub fn parse(header: &str) -> Self {
        let media_type = header.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        let charset = CHARSET_PARAM
            .captures(header)
            .map(|c| c[1].to_ascii_lowercase());
        Self { media_type, charset }
    }

    pub fn is_html(&self) -> bool {
        self.media_type == "text/html"
    }

    /// Declared charset when it is one we can decode, UTF-8 otherwise.
    pub fn encoding(&self) -> &'static Encoding {
        self.charset
            .as_deref()
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8)
    }
}

/// First `<title>` in `html`, whitespace-collapsed and entity-decoded.
pub fn extract_title(html: &str) -> Option<String> {
    let raw = TITLE_TAG.captures(html)?.get(1)?.as_str();
    let collapsed = TITLE_NOISE.replace_all(raw, " ");
    Some(html_escape::decode_html_entities(collapsed.trim()).into_owned())
}

/// Decode `bytes` as `encoding`; malformed sequences become U+FFFD.
pub fn decode_body(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        debug!("Page is not valid {}, replaced malformed bytes", encoding.name());
    }
    text.into_owned()
}

pub struct HttpTitleFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpTitleFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    pub async fn fetch(&self, url: &str) -> Result<String> {
        let start_time = Instant::now();
        let url = Url::parse(url)?;
        debug!("Fetching title for {}", url);

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BotError::General(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ContentType::parse);

        let content_type = match content_type {
            Some(ct) if ct.is_html() => ct,
            other => {
                let media_type = other.map(|ct| ct.media_type).unwrap_or_else(|| "unknown".to_string());
                let length = response.content_length().unwrap_or(0);
                return Ok(format!("Type: {}, length: {}", media_type, human_readable(length)));
            }
        };

        let head = self.read_head(response).await?;
        let html = decode_body(&head, content_type.encoding());

        let result = match extract_title(&html) {
            Some(title) => title,
            None => format!(
                "Title not found or not within first {} bytes of page, aborting.",
                self.config.max_title_bytes
            ),
        };

        info!("Fetched {} ({} bytes read) in {}ms", url, head.len(), start_time.elapsed().as_millis());
        Ok(result)
    }

    /// Read at most `max_title_bytes` of the body.
    async fn read_head(&self, mut response: Response) -> Result<Vec<u8>> {
        let cap = self.config.max_title_bytes;
        let mut head = Vec::with_capacity(cap.min(64 * 1024));

        while head.len() < cap {
            match response.chunk().await? {
                Some(chunk) => {
                    let take = (cap - head.len()).min(chunk.len());
                    head.extend_from_slice(&chunk[..take]);
                }
                None => break,
            }
        }

        Ok(head)
    }
}

#[async_trait]
impl TitleFetcher for HttpTitleFetcher {
    async fn fetch_title_or_descriptor(&self, url: &str) -> anyhow::Result<String> {
        Ok(self.fetch(url).await?)
    }
}
