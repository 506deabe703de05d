//! Casablanca Stock Exchange quote source.
//!
//! Serves quotes for a small set of listed tickers through a TTL cache.
//! Prices come from a built-in reference table (the upstream exchange has
//! no public quote API; a real scraper would slot in behind the same cache
//! path). The cache is owned entirely by this collaborator and has no
//! coupling to challenge state.

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

use super::market_data::MarketDataError;

const SOURCE_NAME: &str = "Casablanca Stock Exchange";
const CACHE_CAPACITY: usize = 64;

/// Reference quotes: ticker, company, price (MAD), day change percent.
const REFERENCE_QUOTES: &[(&str, &str, f64, f64)] = &[
    ("IAM", "Maroc Telecom", 142.50, 1.25),
    ("ATW", "Attijariwafa Bank", 385.20, -0.85),
    ("BCP", "Banque Centrale Populaire", 210.80, 0.45),
    ("MNG", "Managem", 439.77, -1.67),
    ("SNEP", "SNEP", 512.30, 0.95),
];

/// One regional exchange quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionalQuote {
    pub symbol: String,
    pub price: f64,
    pub change_percent: f64,
    pub timestamp: DateTime<Utc>,
    pub currency: String,
    pub source: String,
    pub company_name: String,
}

struct CachedQuote {
    quote: RegionalQuote,
    fetched: Instant,
}

/// Quote source with TTL caching.
#[derive(Clone)]
pub struct CasablancaClient {
    cache: Arc<Mutex<LruCache<String, CachedQuote>>>,
    ttl: Duration,
}

impl CasablancaClient {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(
                NonZeroUsize::new(CACHE_CAPACITY).expect("cache capacity must be non-zero"),
            ))),
            ttl,
        }
    }

    /// Tickers this source can quote.
    pub fn supported_tickers() -> Vec<&'static str> {
        REFERENCE_QUOTES.iter().map(|(ticker, ..)| *ticker).collect()
    }

    /// Quote for a ticker, served from cache while fresh.
    pub fn quote(&self, ticker: &str) -> Result<RegionalQuote, MarketDataError> {
        let ticker = ticker.to_uppercase();

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.get(&ticker) {
            if cached.fetched.elapsed() < self.ttl {
                debug!("Serving cached quote for {}", ticker);
                return Ok(cached.quote.clone());
            }
        }

        let quote = Self::fetch(&ticker)?;
        cache.put(
            ticker,
            CachedQuote {
                quote: quote.clone(),
                fetched: Instant::now(),
            },
        );
        Ok(quote)
    }

    fn fetch(ticker: &str) -> Result<RegionalQuote, MarketDataError> {
        let (_, company, price, change_percent) = REFERENCE_QUOTES
            .iter()
            .find(|(t, ..)| *t == ticker)
            .ok_or_else(|| MarketDataError::UnsupportedSymbol {
                symbol: ticker.to_string(),
                supported: Self::supported_tickers().join(", "),
            })?;

        Ok(RegionalQuote {
            symbol: ticker.to_string(),
            price: *price,
            change_percent: *change_percent,
            timestamp: Utc::now(),
            currency: "MAD".to_string(),
            source: SOURCE_NAME.to_string(),
            company_name: company.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_ticker_quote() {
        let client = CasablancaClient::new(Duration::from_secs(60));
        let quote = client.quote("IAM").unwrap();
        assert_eq!(quote.symbol, "IAM");
        assert_eq!(quote.company_name, "Maroc Telecom");
        assert_eq!(quote.currency, "MAD");
        assert_eq!(quote.price, 142.50);
    }

    #[test]
    fn test_ticker_lookup_is_case_insensitive() {
        let client = CasablancaClient::new(Duration::from_secs(60));
        assert_eq!(client.quote("atw").unwrap().symbol, "ATW");
    }

    #[test]
    fn test_unknown_ticker_rejected() {
        let client = CasablancaClient::new(Duration::from_secs(60));
        let err = client.quote("XYZ").unwrap_err();
        assert!(matches!(err, MarketDataError::UnsupportedSymbol { .. }));
    }

    #[test]
    fn test_cache_serves_same_timestamp_within_ttl() {
        let client = CasablancaClient::new(Duration::from_secs(60));
        let first = client.quote("BCP").unwrap();
        let second = client.quote("BCP").unwrap();
        assert_eq!(first.timestamp, second.timestamp);
    }

    #[test]
    fn test_cache_refreshes_after_expiry() {
        let client = CasablancaClient::new(Duration::from_millis(1));
        let first = client.quote("MNG").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let second = client.quote("MNG").unwrap();
        assert!(second.timestamp >= first.timestamp);
    }

    #[test]
    fn test_supported_tickers() {
        let tickers = CasablancaClient::supported_tickers();
        assert_eq!(tickers.len(), 5);
        assert!(tickers.contains(&"IAM"));
    }
}
