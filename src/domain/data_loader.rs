//! Historical data loading: validation, cache, rate limiting and retry in
//! front of the registered data sources.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info, warn};

use super::bar::BarSeries;
use super::error::TradesimError;
use crate::ports::cache_port::{CacheKey, CachePort};
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    Fixed,
    #[default]
    Exponential,
}

impl std::str::FromStr for Backoff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(Backoff::Fixed),
            "exponential" => Ok(Backoff::Exponential),
            other => Err(format!("backoff must be 'fixed' or 'exponential', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            backoff: Backoff::Exponential,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                self.base_delay.saturating_mul(factor)
            }
        }
    }
}

/// Blocks the current thread. Injected so tests can observe waits instead of
/// sleeping through them.
pub trait Pause {
    fn pause(&mut self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Allows at most one request per `min_interval`.
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        RateLimiter {
            min_interval,
            last_request: None,
        }
    }

    /// Waits out the rest of the interval since the previous request, then
    /// marks a new request as sent.
    pub fn acquire(&mut self, pause: &mut dyn Pause) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "rate limit wait");
                pause.pause(wait);
            }
        }
        self.last_request = Some(Instant::now());
    }
}

pub struct DataLoader {
    sources: BTreeMap<String, Box<dyn DataPort>>,
    cache: Option<Box<dyn CachePort>>,
    retry: RetryPolicy,
    limiter: RateLimiter,
    pause: Box<dyn Pause>,
    today: NaiveDate,
}

impl DataLoader {
    pub fn new() -> Self {
        DataLoader {
            sources: BTreeMap::new(),
            cache: None,
            retry: RetryPolicy::default(),
            limiter: RateLimiter::default(),
            pause: Box::new(ThreadPause),
            today: chrono::Local::now().date_naive(),
        }
    }

    /// Registers `source` under its own name, replacing any earlier one.
    pub fn with_source(mut self, source: Box<dyn DataPort>) -> Self {
        self.sources.insert(source.name().to_string(), source);
        self
    }

    pub fn with_cache(mut self, cache: Box<dyn CachePort>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_rate_limit(mut self, min_interval: Duration) -> Self {
        self.limiter = RateLimiter::new(min_interval);
        self
    }

    pub fn with_pause(mut self, pause: Box<dyn Pause>) -> Self {
        self.pause = pause;
        self
    }

    /// Date that start dates are checked against.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Bars for `symbols` over `[start, end]` from `source`, served from the
    /// cache when possible.
    pub fn load_historical_data(
        &mut self,
        symbols: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
        source: &str,
    ) -> Result<BarSeries, TradesimError> {
        self.validate_request(symbols, start, end)?;

        let key = CacheKey::new(source, symbols, start, end);
        if let Some(cache) = &self.cache {
            if let Some(series) = cache.load(&key) {
                info!(%key, bars = series.len(), "cache hit");
                return Ok(series);
            }
            debug!(%key, "cache miss");
        }

        let series = self.fetch_with_retry(source, &key.symbols, start, end)?;
        let present = series.symbols();
        for symbol in &key.symbols {
            if !present.contains(symbol) {
                return Err(TradesimError::NoData {
                    symbol: symbol.clone(),
                    source_name: source.to_string(),
                });
            }
        }

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store(&key, &series) {
                warn!(%key, error = %e, "failed to store cache entry");
            }
        }
        Ok(series)
    }

    fn validate_request(
        &self,
        symbols: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<(), TradesimError> {
        if symbols.is_empty() {
            return Err(TradesimError::Validation {
                reason: "symbols list cannot be empty".into(),
            });
        }
        if symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(TradesimError::Validation {
                reason: "symbols must not be blank".into(),
            });
        }
        if start > end {
            return Err(TradesimError::InvalidRange { start, end });
        }
        if start.date() > self.today {
            return Err(TradesimError::Validation {
                reason: format!("start date {} is in the future", start.date()),
            });
        }
        Ok(())
    }

    fn fetch_with_retry(
        &mut self,
        source: &str,
        symbols: &[String],
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<BarSeries, TradesimError> {
        let port = self
            .sources
            .get(source)
            .ok_or_else(|| TradesimError::UnknownSource(source.to_string()))?;

        let mut last_error = String::new();
        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let delay = self.retry.delay_for(attempt);
                info!(
                    source,
                    attempt,
                    max_retries = self.retry.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "retrying fetch"
                );
                self.pause.pause(delay);
            }
            self.limiter.acquire(self.pause.as_mut());

            match port.get_historical_data(symbols, start, end) {
                Ok(series) => return Ok(series),
                Err(e) if e.is_retryable() => {
                    warn!(source, attempt = attempt + 1, error = %e, "fetch failed");
                    last_error = e.to_string();
                }
                Err(e) => return Err(e),
            }
        }

        Err(TradesimError::RetriesExhausted {
            source_name: source.to_string(),
            attempts: self.retry.max_retries + 1,
            last: last_error,
        })
    }
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}
