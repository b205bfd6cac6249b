use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use thiserror::Error;

/// Everything the engine treats as an ordinary, expected fetch outcome.
#[derive(Debug, Clone, Error)]
pub enum QuoteError {
    #[error("http error: {0}")]
    Http(String),
    #[error("wrong status code {0}")]
    Status(u16),
    #[error("not found")]
    NotFound,
    #[error("could not parse price")]
    ParsePrice,
    #[error("could not get the name")]
    NoName,
}

#[derive(Debug, Clone)]
pub struct Quote {
    pub value: f64,
    pub currency: String,
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch(&self, market: &str, short: &str) -> Result<Quote, QuoteError>;
    /// Resolves the display name; used once, when a stock is first created.
    async fn lookup_name(&self, market: &str, short: &str) -> Result<String, QuoteError>;
}

const BASE_URL: &str = "https://www.boursorama.com/cours.phtml";

/// Maps our market code to the quote page's symbol prefix.
pub fn page_symbol(market: &str, short: &str) -> String {
    match market {
        // NASDAQ & NYSE
        "US" => short.to_string(),
        // XETRA
        "US2" => format!("1z{short}"),
        // EURONEXT Paris
        "FR" => format!("1rP{short}"),
        // EURONEXT Amsterdam
        "AM" => format!("1rA{short}"),
        // Warrants
        "W" => format!("2rP{short}"),
        _ => short.to_string(),
    }
}

/// Reference URL appended to notifications for contacts that opted in.
pub fn page_url(market: &str, short: &str) -> String {
    format!("{}?symbole={}", BASE_URL, page_symbol(market, short))
}

fn re_quote() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<span class="cotation">([0-9 \.]+)[^A-Z<>]*([A-Z]{2,3})</span>"#)
            .expect("quote regex")
    })
}

fn re_names() -> &'static [Regex; 2] {
    static RE: OnceLock<[Regex; 2]> = OnceLock::new();
    RE.get_or_init(|| {
        [
            Regex::new(r#"(?s)<[^>]* itemprop="name" title="([^"]+)"[^>]*>"#).expect("name regex"),
            Regex::new(r"(?s)<h1>.*<a.*>(.*)</a>.*</h1>").expect("name regex"),
        ]
    })
}

/// Extracts `(price, currency)` from a quote page body.
pub fn parse_quote(body: &str) -> Result<Quote, QuoteError> {
    let caps = re_quote().captures(body).ok_or(QuoteError::ParsePrice)?;
    let raw = caps[1].replace(' ', "");
    let value = raw.parse::<f64>().map_err(|_| QuoteError::ParsePrice)?;
    Ok(Quote {
        value,
        currency: caps[2].to_string(),
    })
}

/// Extracts the display name from a quote page body, trying each known
/// page layout in turn.
pub fn parse_name(body: &str) -> Result<String, QuoteError> {
    for re in re_names() {
        if let Some(caps) = re.captures(body) {
            let name = caps[1].trim().to_string();
            if !name.is_empty() {
                return Ok(name);
            }
        }
    }
    Err(QuoteError::NoName)
}

/// Scrapes quotes from the Boursorama pages.
#[derive(Clone)]
pub struct BoursoramaClient {
    http: Client,
}

impl BoursoramaClient {
    pub fn new(timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http }
    }

    async fn page(&self, market: &str, short: &str) -> Result<String, QuoteError> {
        let url = page_url(market, short);
        tracing::debug!("fetching {}", url);

        let res = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| QuoteError::Http(e.to_string()))?;

        if !res.status().is_success() {
            return Err(QuoteError::Status(res.status().as_u16()));
        }

        // unknown symbols redirect to the search page
        if res.url().as_str().contains("recherche") {
            return Err(QuoteError::NotFound);
        }

        res.text().await.map_err(|e| QuoteError::Http(e.to_string()))
    }
}

#[async_trait]
impl QuoteSource for BoursoramaClient {
    async fn fetch(&self, market: &str, short: &str) -> Result<Quote, QuoteError> {
        let body = self.page(market, short).await?;
        parse_quote(&body)
    }

    async fn lookup_name(&self, market: &str, short: &str) -> Result<String, QuoteError> {
        let body = self.page(market, short).await?;
        parse_name(&body)
    }
}

/// Scripted quote source for tests: outcomes are consumed in FIFO order per
/// `MARKET:SHORT` key, and names come from a fixed table. Shipped in the
/// library so integration tests can use it.
#[derive(Default)]
pub struct ScriptedQuotes {
    quotes: Mutex<HashMap<String, VecDeque<Result<Quote, QuoteError>>>>,
    names: Mutex<HashMap<String, String>>,
}

impl ScriptedQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, key: &str, outcome: Result<Quote, QuoteError>) {
        self.quotes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn enqueue_price(&self, key: &str, value: f64) {
        self.enqueue(
            key,
            Ok(Quote {
                value,
                currency: "EUR".to_string(),
            }),
        );
    }

    pub fn set_name(&self, key: &str, name: &str) {
        self.names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), name.to_string());
    }
}

#[async_trait]
impl QuoteSource for ScriptedQuotes {
    async fn fetch(&self, market: &str, short: &str) -> Result<Quote, QuoteError> {
        self.quotes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(&format!("{market}:{short}"))
            .and_then(|q| q.pop_front())
            .unwrap_or(Err(QuoteError::NotFound))
    }

    async fn lookup_name(&self, market: &str, short: &str) -> Result<String, QuoteError> {
        self.names
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&format!("{market}:{short}"))
            .cloned()
            .ok_or(QuoteError::NotFound)
    }
}
