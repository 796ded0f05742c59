use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use error_stack::{Report, ResultExt, bail};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::model::{Bar, Lookback, Symbol};
use crate::source::PriceSource;

const SOURCE_NAME: &str = "yahoo";

/// Daily bars from the Yahoo Finance v8 chart API.
///
/// One request per symbol; failures are reported, never retried.
pub struct YahooSource {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl YahooSource {
    pub fn new(config: &SourceConfig) -> Result<Self, Report<SourceError>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .change_context(SourceError::Client {
                source_name: SOURCE_NAME.into(),
            })?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        })
    }

    fn chart_url(&self, symbol: &Symbol) -> String {
        format!("{}/v8/finance/chart/{}", self.base_url, symbol.as_str())
    }
}

impl PriceSource for YahooSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn fetch_daily(
        &self,
        symbol: &Symbol,
        range: Lookback,
    ) -> BoxFuture<'_, Result<Vec<Bar>, Report<SourceError>>> {
        let symbol = symbol.clone();
        Box::pin(async move {
            self.rate_limiter.until_ready().await;

            let url = self.chart_url(&symbol);
            let params = [("range", range.as_str()), ("interval", "1d")];
            debug!(%url, %range, "requesting yahoo chart");

            let response = self
                .client
                .get(&url)
                .query(&params)
                .send()
                .await
                .change_context(SourceError::Request {
                    source_name: SOURCE_NAME.into(),
                })
                .attach_with(|| format!("symbol: {symbol}"))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                bail!(SourceError::NotFound {
                    symbol: symbol.to_string(),
                });
            }
            if status == StatusCode::TOO_MANY_REQUESTS {
                bail!(SourceError::RateLimited {
                    source_name: SOURCE_NAME.into(),
                });
            }
            if !status.is_success() {
                return Err(Report::new(SourceError::Request {
                    source_name: SOURCE_NAME.into(),
                })
                .attach(format!("HTTP status: {status}")));
            }

            let chart: ChartResponse =
                response
                    .json()
                    .await
                    .change_context(SourceError::MalformedResponse {
                        source_name: SOURCE_NAME.into(),
                    })?;

            let bars = parse_chart(&symbol, chart)?;

            info!(
                symbol = %symbol,
                range = %range,
                fetched = bars.len(),
                "yahoo daily bars fetched"
            );

            Ok(bars)
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds.
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

fn malformed(detail: &str) -> Report<SourceError> {
    Report::new(SourceError::MalformedResponse {
        source_name: SOURCE_NAME.into(),
    })
    .attach(detail.to_owned())
}

/// Turn a chart payload into oldest-first bars.
///
/// Dates are taken in the exchange's local time. Rows with no OHLC at all
/// (market holidays) are dropped. A row sharing its date with the previous
/// one (the live quote for the current session) replaces it. Partially empty
/// rows keep NaN in the missing fields so series validation can name them.
fn parse_chart(symbol: &Symbol, response: ChartResponse) -> Result<Vec<Bar>, Report<SourceError>> {
    let body = response.chart;
    if let Some(err) = body.error {
        if err.code == "Not Found" {
            bail!(SourceError::NotFound {
                symbol: symbol.to_string(),
            });
        }
        return Err(malformed(&format!("{}: {}", err.code, err.description)));
    }

    let data = body
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| malformed("chart result is empty"))?;

    // A valid symbol with no trading history answers without timestamps.
    let timestamps = data.timestamp.unwrap_or_default();
    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| malformed("no quote data"))?;

    let n = timestamps.len();
    if [quote.open.len(), quote.high.len(), quote.low.len(), quote.close.len()]
        .iter()
        .any(|&len| len != n)
    {
        return Err(malformed("quote arrays do not match timestamps"));
    }

    let mut bars: Vec<Bar> = Vec::with_capacity(n);
    for (i, &ts) in timestamps.iter().enumerate() {
        let date = timestamp_date(ts, data.meta.gmtoffset)
            .ok_or_else(|| malformed(&format!("invalid timestamp: {ts}")))?;

        let (open, high, low, close) = (quote.open[i], quote.high[i], quote.low[i], quote.close[i]);
        if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
            continue;
        }

        let bar = Bar {
            date,
            open: open.unwrap_or(f64::NAN),
            high: high.unwrap_or(f64::NAN),
            low: low.unwrap_or(f64::NAN),
            close: close.unwrap_or(f64::NAN),
            volume: quote.volume.get(i).copied().flatten().unwrap_or(0),
        };
        match bars.last_mut() {
            Some(prev) if prev.date == date => {
                debug!(%symbol, %date, "replacing same-day row with later quote");
                *prev = bar;
            }
            _ => bars.push(bar),
        }
    }

    Ok(bars)
}

fn timestamp_date(ts: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(ts.checked_add(gmtoffset)?, 0).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PriceSeries;

    fn symbol() -> Symbol {
        Symbol::parse("AAPL").unwrap()
    }

    fn chart(json: &str) -> ChartResponse {
        serde_json::from_str(json).expect("fixture should deserialize")
    }

    const TWO_DAYS: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1704205800, 1704292200, 1704378600],
                "indicators": {
                    "quote": [{
                        "open":   [187.15, null, 182.15],
                        "high":   [188.44, null, 183.09],
                        "low":    [183.89, null, 180.88],
                        "close":  [185.64, null, 181.91],
                        "volume": [82488700, null, 71983600]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_bars_and_skips_empty_rows() {
        let bars = parse_chart(&symbol(), chart(TWO_DAYS)).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].close, 185.64);
        assert_eq!(bars[1].high, 183.09);
        assert_eq!(bars[1].volume, 71983600);
    }

    #[test]
    fn live_quote_on_same_day_replaces_previous_row() {
        let json = r#"{"chart":{"result":[{
            "meta":{"gmtoffset":-18000},
            "timestamp":[1704205800, 1704292200, 1704310000],
            "indicators":{"quote":[{
                "open":  [187.15, 184.22, 184.22],
                "high":  [188.44, 185.88, 186.10],
                "low":   [183.89, 183.43, 183.43],
                "close": [185.64, 184.25, 185.90],
                "volume":[82488700, 58414500, 61000000]}]}}],
            "error":null}}"#;
        let bars = parse_chart(&symbol(), chart(json)).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(bars[1].close, 185.90);
        assert_eq!(bars[1].volume, 61000000);

        let series = PriceSeries::new(symbol(), bars).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn same_utc_day_without_meta_is_merged() {
        let json = r#"{"chart":{"result":[{"timestamp":[1704292200, 1704310000],
            "indicators":{"quote":[{"open":[1.0,2.0],"high":[1.0,2.0],"low":[1.0,2.0],"close":[1.0,2.0]}]}}],
            "error":null}}"#;
        let bars = parse_chart(&symbol(), chart(json)).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 2.0);
    }

    #[test]
    fn dates_use_exchange_offset() {
        // 2024-01-03T00:00:00Z is still Jan 2 in New York.
        assert_eq!(
            timestamp_date(1704240000, -18000),
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );
        assert_eq!(
            timestamp_date(1704240000, 0),
            NaiveDate::from_ymd_opt(2024, 1, 3)
        );
    }

    #[test]
    fn partial_rows_keep_nan() {
        let json = r#"{"chart":{"result":[{"timestamp":[1704205800],
            "indicators":{"quote":[{"open":[1.0],"high":[null],"low":[0.5],"close":[0.9],"volume":[null]}]}}],
            "error":null}}"#;
        let bars = parse_chart(&symbol(), chart(json)).unwrap();
        assert!(bars[0].high.is_nan());
        assert_eq!(bars[0].volume, 0);
    }

    #[test]
    fn not_found_error_maps_to_not_found() {
        let json = r#"{"chart":{"result":null,
            "error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart(&symbol(), chart(json)).unwrap_err();
        assert!(matches!(
            err.current_context(),
            SourceError::NotFound { symbol } if symbol == "AAPL"
        ));
    }

    #[test]
    fn other_chart_error_is_malformed() {
        let json = r#"{"chart":{"result":null,
            "error":{"code":"Bad Request","description":"Invalid input"}}}"#;
        let err = parse_chart(&symbol(), chart(json)).unwrap_err();
        assert!(matches!(
            err.current_context(),
            SourceError::MalformedResponse { .. }
        ));
    }

    #[test]
    fn mismatched_arrays_are_malformed() {
        let json = r#"{"chart":{"result":[{"timestamp":[1704205800, 1704292200],
            "indicators":{"quote":[{"open":[1.0],"high":[1.0],"low":[1.0],"close":[1.0]}]}}],
            "error":null}}"#;
        assert!(parse_chart(&symbol(), chart(json)).is_err());
    }

    #[test]
    fn missing_timestamps_yield_no_bars() {
        let json = r#"{"chart":{"result":[{
            "indicators":{"quote":[{"open":[],"high":[],"low":[],"close":[]}]}}],
            "error":null}}"#;
        assert!(parse_chart(&symbol(), chart(json)).unwrap().is_empty());
    }

    #[test]
    fn chart_url_strips_trailing_slash() {
        let config = SourceConfig {
            base_url: "http://localhost:9000/".into(),
            ..SourceConfig::default()
        };
        let source = YahooSource::new(&config).unwrap();
        assert_eq!(
            source.chart_url(&symbol()),
            "http://localhost:9000/v8/finance/chart/AAPL"
        );
    }

    /// Integration test: requires network access. Run with `cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn integration_fetch_daily() {
        let source = YahooSource::new(&SourceConfig::default()).unwrap();
        let bars = source.fetch_daily(&symbol(), Lookback::Month1).await.unwrap();
        assert!(!bars.is_empty());
        assert!(bars.windows(2).all(|w| w[0].date < w[1].date));
    }
}
