use crate::config::Config;
use crate::error::AppError;
use crate::formatters::parse_timestamp;
use crate::types::{
    lenient_category, AnalyticsBundle, AnalyticsReport, BacktestResults, ComponentHealth,
    DailyStat, FundingRate, HealthState, HealthStatus, MarketPrice, MarketPrices, PairCategory,
    PairsResponse, PerformanceSummary, Position, PositionSide, TodayStats, Trade, TradingOverview,
    VolumeWeightedMomentum,
};
use chrono::{DateTime, Utc};
use futures_util::future::join3;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, trace, warn};

// --- Wire formats ---
// Raw backend shapes. They never leave this module: every operation maps them
// into the view-models in `types`.

#[derive(Deserialize, Debug)]
struct RawHealth {
    status: String,
    #[serde(default)]
    timestamp: String,
}

#[derive(Deserialize, Debug)]
struct RawOverview {
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    active_positions: u64,
    #[serde(default)]
    total_positions: u64,
    #[serde(default)]
    total_realized_pnl: Decimal,
    #[serde(default)]
    total_pnl: Decimal,
    #[serde(default)]
    today: TodayStats,
    #[serde(default)]
    win_rate: Decimal,
}

/// Positions as the backend sends them. Several fields are optional or come
/// under alternative names; `normalize_position` reconciles them once.
#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct RawPosition {
    pub symbol: String,
    #[serde(default)]
    pub side: String,
    pub entry_price: Decimal,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub leverage: Option<Decimal>,
    #[serde(default)]
    pub notional: Option<Decimal>,
    #[serde(default)]
    pub hold_time_min: Option<Decimal>,
    #[serde(default)]
    pub opened_at: Option<String>,
    #[serde(default)]
    pub unrealized_pnl: Option<Decimal>,
    #[serde(default)]
    pub current_price: Option<Decimal>,
    #[serde(default)]
    pub liquidation_price: Option<Decimal>,
}

#[derive(Deserialize, Debug)]
struct RawPositions {
    #[serde(default)]
    positions: Vec<RawPosition>,
}

/// One quote, either from the array form (`price`, `time`) or the keyed form
/// (`mark_price`, `timestamp`).
#[derive(Deserialize, Debug, Clone, Default)]
pub(crate) struct RawPrice {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub mark_price: Option<Decimal>,
    #[serde(default)]
    pub funding_rate: Option<Decimal>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub change_24h_pct: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_category")]
    pub category: Option<PairCategory>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// The backend has shipped both shapes for `prices`.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub(crate) enum RawPriceSet {
    List(Vec<RawPrice>),
    Keyed(BTreeMap<String, RawPrice>),
}

#[derive(Deserialize, Debug)]
pub(crate) struct RawLatestPrices {
    pub prices: RawPriceSet,
    #[serde(default)]
    pub count: Option<usize>,
}

// --- Normalization ---

/// Field precedence:
/// - side: "ask"/"ASK" is SHORT, anything else LONG
/// - quantity: `quantity`, then `amount`, else 0
/// - leverage: `leverage` when >= 1, else 1
/// - notional: `notional`, else `amount` (then `quantity`) * (`current_price`,
///   else `entry_price`)
/// - hold_time_min: `hold_time_min` (floored), else whole minutes since
///   `opened_at`, else 0
pub(crate) fn normalize_position(raw: RawPosition, now: DateTime<Utc>) -> Position {
    let quantity = raw.quantity.or(raw.amount).unwrap_or(Decimal::ZERO);
    let leverage = raw
        .leverage
        .filter(|l| *l >= Decimal::ONE)
        .unwrap_or(Decimal::ONE);
    let notional = raw.notional.unwrap_or_else(|| {
        raw.amount.or(raw.quantity).unwrap_or(Decimal::ZERO)
            * raw.current_price.unwrap_or(raw.entry_price)
    });
    let opened_at = raw.opened_at.as_deref().and_then(parse_timestamp);
    let hold_time_min = match raw.hold_time_min.and_then(|m| m.floor().to_i64()) {
        Some(minutes) => minutes,
        None => opened_at
            .map(|t| (now - t).num_milliseconds().div_euclid(60_000).max(0))
            .unwrap_or(0),
    };

    Position {
        symbol: raw.symbol,
        side: PositionSide::from_wire(&raw.side),
        entry_price: raw.entry_price,
        quantity,
        leverage,
        notional,
        hold_time_min,
        opened_at,
        unrealized_pnl: raw.unrealized_pnl,
        liquidation_price: raw.liquidation_price,
        current_price: raw.current_price,
        amount: raw.amount,
    }
}

fn normalize_price(symbol: &str, raw: RawPrice) -> Option<MarketPrice> {
    let Some(mark_price) = raw.price.or(raw.mark_price) else {
        warn!("[ApiClient] Dropping quote for {}: no price field.", symbol);
        return None;
    };
    Some(MarketPrice {
        mark_price,
        // No funding endpoint yet.
        funding_rate: raw.funding_rate.unwrap_or(Decimal::ZERO),
        timestamp: raw.time.or(raw.timestamp).unwrap_or_default(),
        change_24h_pct: raw.change_24h_pct,
        category: raw.category,
        display_name: raw.display_name.unwrap_or_else(|| symbol.to_string()),
    })
}

/// Folds either wire shape into one keyed mapping.
pub(crate) fn normalize_market_prices(raw: RawLatestPrices, fetched_at: DateTime<Utc>) -> MarketPrices {
    let mut prices = BTreeMap::new();
    match raw.prices {
        RawPriceSet::List(list) => {
            for quote in list {
                let Some(symbol) = quote.symbol.clone() else {
                    warn!("[ApiClient] Dropping quote without symbol.");
                    continue;
                };
                if let Some(price) = normalize_price(&symbol, quote) {
                    prices.insert(symbol, price);
                }
            }
        }
        RawPriceSet::Keyed(map) => {
            for (symbol, quote) in map {
                if let Some(price) = normalize_price(&symbol, quote) {
                    prices.insert(symbol, price);
                }
            }
        }
    }
    if let Some(count) = raw.count {
        if count != prices.len() {
            debug!("[ApiClient] latest-prices reported count={} but {} quotes were usable.", count, prices.len());
        }
    }
    MarketPrices { timestamp: fetched_at, prices }
}

fn normalize_overview(raw: RawOverview) -> TradingOverview {
    let mut active_positions = raw.active_positions;
    if active_positions > raw.total_positions {
        warn!(
            "[ApiClient] Overview reports {} active of {} total positions; clamping.",
            active_positions, raw.total_positions
        );
        active_positions = raw.total_positions;
    }
    TradingOverview {
        timestamp: raw.timestamp,
        active_positions,
        total_positions: raw.total_positions,
        total_realized_pnl: raw.total_realized_pnl,
        total_pnl: raw.total_pnl,
        today: raw.today,
        win_rate: raw.win_rate,
    }
}

fn normalize_health(raw: RawHealth) -> HealthStatus {
    HealthStatus {
        status: if raw.status == "healthy" { HealthState::Healthy } else { HealthState::Degraded },
        timestamp: raw.timestamp,
        // Assumed healthy whenever the API itself answers.
        components: ComponentHealth { postgres: true, redis: true, sqlite: None },
    }
}

// --- Client ---

/// Typed, read-only client for the dashboard backend.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(config.api_base_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base_url}{path}` and parse the JSON body. No retries: a failed
    /// call is simply reported to the caller.
    async fn fetch_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let url = format!("{}{}", self.base_url, path);
        trace!("[ApiClient] GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(query)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!("[ApiClient] API Error fetching {}: {}", path, e);
                AppError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("[ApiClient] API Error fetching {}: HTTP {}", path, status.as_u16());
            return Err(AppError::HttpError(status.as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| {
            warn!("[ApiClient] Could not parse response of {}: {}", path, e);
            AppError::ParseError(e)
        })
    }

    // --- Health check ---

    pub async fn get_health(&self) -> Result<HealthStatus, AppError> {
        let raw: RawHealth = self.fetch_json("/health", &[]).await?;
        Ok(normalize_health(raw))
    }

    // --- Trading performance ---

    pub async fn get_trading_overview(&self) -> Result<TradingOverview, AppError> {
        let raw: RawOverview = self.fetch_json("/v1/trading/overview", &[]).await?;
        Ok(normalize_overview(raw))
    }

    pub async fn get_current_positions(&self) -> Result<Vec<Position>, AppError> {
        let raw: RawPositions = self.fetch_json("/v1/positions", &[]).await?;
        let now = Utc::now();
        Ok(raw.positions.into_iter().map(|p| normalize_position(p, now)).collect())
    }

    /// Not yet implemented: the backend has no trades endpoint. Always empty.
    pub async fn get_recent_trades(&self, limit: usize) -> Result<Vec<Trade>, AppError> {
        debug!("[ApiClient] get_recent_trades(limit={}) is not implemented by the backend yet.", limit);
        Ok(Vec::new())
    }

    pub async fn get_daily_stats(&self, days: u32) -> Result<Vec<DailyStat>, AppError> {
        self.fetch_json("/v1/daily-stats", &[("days", days.to_string())]).await
    }

    // --- Market data ---

    pub async fn get_market_prices(&self) -> Result<MarketPrices, AppError> {
        let raw: RawLatestPrices = self.fetch_json("/v1/latest-prices", &[]).await?;
        Ok(normalize_market_prices(raw, Utc::now()))
    }

    /// Not yet implemented: no funding-rate endpoint exists. Always empty.
    pub async fn get_funding_history(&self, symbol: &str, hours: u32) -> Result<Vec<FundingRate>, AppError> {
        debug!("[ApiClient] get_funding_history({}, {}h) is not implemented by the backend yet.", symbol, hours);
        Ok(Vec::new())
    }

    pub async fn get_pairs(
        &self,
        category: Option<PairCategory>,
        active_only: bool,
    ) -> Result<PairsResponse, AppError> {
        let mut query = vec![("active_only", active_only.to_string())];
        if let Some(category) = category {
            query.push(("category", category.as_str().to_string()));
        }
        self.fetch_json("/v1/pairs", &query).await
    }

    // --- Performance analytics ---

    /// Not yet implemented: returns an all-zero summary stamped with the current time.
    pub async fn get_performance_summary(&self) -> Result<PerformanceSummary, AppError> {
        debug!("[ApiClient] get_performance_summary is not implemented by the backend yet.");
        Ok(PerformanceSummary {
            timestamp: Utc::now().to_rfc3339(),
            total_pnl: Decimal::ZERO,
            total_volume: Decimal::ZERO,
            total_trades: 0,
            win_rate: Decimal::ZERO,
            profit_factor: Decimal::ZERO,
            sharpe_ratio: None,
            max_drawdown: None,
            by_symbol: None,
            error: None,
        })
    }

    pub async fn get_analytics(&self, timeframe: &str) -> Result<AnalyticsReport, AppError> {
        self.fetch_json("/analytics", &[("timeframe", timeframe.to_string())]).await
    }

    pub async fn get_backtest_results(&self) -> Result<BacktestResults, AppError> {
        self.fetch_json("/backtest/results", &[]).await
    }

    pub async fn get_volume_weighted_momentum(
        &self,
    ) -> Result<BTreeMap<String, VolumeWeightedMomentum>, AppError> {
        self.fetch_json("/volume-weighted-momentum/all", &[]).await
    }

    /// Fetches the three analytics endpoints concurrently. Report and backtest
    /// results are required; momentum is best-effort.
    pub async fn get_analytics_bundle(&self, timeframe: &str) -> Result<AnalyticsBundle, AppError> {
        let (report, backtest, momentum) = join3(
            self.get_analytics(timeframe),
            self.get_backtest_results(),
            self.get_volume_weighted_momentum(),
        )
        .await;

        let volume_weighted_momentum = match momentum {
            Ok(m) => Some(m),
            Err(e) => {
                warn!("[ApiClient] Volume-weighted momentum unavailable ({}), continuing without it.", e);
                None
            }
        };

        Ok(AnalyticsBundle {
            timeframe: timeframe.to_string(),
            report: report?,
            backtest: backtest?,
            volume_weighted_momentum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use rust_decimal::dec;

    fn raw_position(json: &str) -> RawPosition {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_short_position_notional_from_current_price() {
        let raw = raw_position(r#"{"symbol":"BTC","side":"ASK","amount":10,"entry_price":100,"current_price":110}"#);
        let pos = normalize_position(raw, Utc::now());

        assert_eq!(pos.side, PositionSide::Short);
        assert_eq!(pos.quantity, dec!(10));
        assert_eq!(pos.notional, dec!(1100));
        assert_eq!(pos.leverage, dec!(1));
        assert_eq!(pos.amount, Some(dec!(10)));
    }

    #[test]
    fn test_position_precedence_rules() {
        let raw = raw_position(
            r#"{"symbol":"ETH","side":"bid","quantity":2,"amount":3,"entry_price":2000,"leverage":5,"notional":4200,"hold_time_min":42.9}"#,
        );
        let pos = normalize_position(raw, Utc::now());

        assert_eq!(pos.side, PositionSide::Long);
        assert_eq!(pos.quantity, dec!(2));
        assert_eq!(pos.leverage, dec!(5));
        assert_eq!(pos.notional, dec!(4200));
        assert_eq!(pos.hold_time_min, 42);
    }

    #[test]
    fn test_notional_fallback_prefers_amount_over_quantity() {
        let raw = raw_position(r#"{"symbol":"ETH","quantity":2,"amount":3,"entry_price":100}"#);
        let pos = normalize_position(raw, Utc::now());
        assert_eq!(pos.quantity, dec!(2));
        assert_eq!(pos.notional, dec!(300));

        let raw = raw_position(r#"{"symbol":"ETH","quantity":2,"entry_price":100,"current_price":150}"#);
        assert_eq!(normalize_position(raw, Utc::now()).notional, dec!(300));
    }

    #[test]
    fn test_notional_falls_back_to_entry_price() {
        let raw = raw_position(r#"{"symbol":"SOL","side":"ask","amount":4,"entry_price":25,"leverage":0}"#);
        let pos = normalize_position(raw, Utc::now());
        assert_eq!(pos.notional, dec!(100));
        assert_eq!(pos.leverage, dec!(1));
    }

    #[test]
    fn test_hold_time_derived_from_opened_at() {
        let now = Utc::now();
        let opened = (now - ChronoDuration::seconds(150)).to_rfc3339();
        let mut raw = raw_position(r#"{"symbol":"BTC","entry_price":1}"#);
        raw.opened_at = Some(opened);
        let pos = normalize_position(raw, now);
        assert_eq!(pos.hold_time_min, 2);
        assert!(pos.opened_at.is_some());

        let mut future = raw_position(r#"{"symbol":"BTC","entry_price":1}"#);
        future.opened_at = Some((now + ChronoDuration::minutes(10)).to_rfc3339());
        assert_eq!(normalize_position(future, now).hold_time_min, 0);

        let missing = raw_position(r#"{"symbol":"BTC","entry_price":1}"#);
        assert_eq!(normalize_position(missing, now).hold_time_min, 0);
    }

    #[test]
    fn test_market_prices_from_array() {
        let raw: RawLatestPrices = serde_json::from_str(
            r#"{"prices":[{"symbol":"BTC","display_name":"Bitcoin","price":50000,"time":"2025-01-01T00:00:00Z","change_24h_pct":2.5,"bid":49999,"ask":50001,"category":"major"}],"count":1}"#,
        )
        .unwrap();
        let prices = normalize_market_prices(raw, Utc::now());

        let btc = &prices.prices["BTC"];
        assert_eq!(btc.mark_price, dec!(50000));
        assert_eq!(btc.change_24h_pct, Some(dec!(2.5)));
        assert_eq!(btc.funding_rate, Decimal::ZERO);
        assert_eq!(btc.category, Some(PairCategory::Major));
        assert_eq!(btc.display_name, "Bitcoin");
        assert_eq!(btc.timestamp, "2025-01-01T00:00:00Z");
    }

    #[test]
    fn test_market_prices_from_keyed_map() {
        let raw: RawLatestPrices = serde_json::from_str(
            r#"{"prices":{"ETH":{"mark_price":3000.5,"funding_rate":0.0001,"timestamp":"t","change_24h_pct":null,"category":null}}}"#,
        )
        .unwrap();
        let prices = normalize_market_prices(raw, Utc::now());

        let eth = &prices.prices["ETH"];
        assert_eq!(eth.mark_price, dec!(3000.5));
        assert_eq!(eth.funding_rate, dec!(0.0001));
        assert_eq!(eth.change_24h_pct, None);
        assert_eq!(eth.category, None);
        assert_eq!(eth.display_name, "ETH");
    }

    #[test]
    fn test_market_prices_skip_unusable_quotes() {
        let raw: RawLatestPrices = serde_json::from_str(
            r#"{"prices":[{"display_name":"nameless","price":1},{"symbol":"DOGE"},{"symbol":"XRP","price":0.5}],"count":3}"#,
        )
        .unwrap();
        let prices = normalize_market_prices(raw, Utc::now());
        assert_eq!(prices.prices.len(), 1);
        assert!(prices.prices.contains_key("XRP"));
    }

    #[test]
    fn test_market_prices_equality_ignores_fetch_time() {
        let body = r#"{"prices":[{"symbol":"BTC","price":1}]}"#;
        let a = normalize_market_prices(serde_json::from_str(body).unwrap(), Utc::now());
        let b = normalize_market_prices(
            serde_json::from_str(body).unwrap(),
            Utc::now() + ChronoDuration::seconds(5),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_overview_clamps_active_positions() {
        let raw: RawOverview = serde_json::from_str(
            r#"{"timestamp":"t","active_positions":5,"total_positions":3,"total_unrealized_pnl":1,"total_realized_pnl":2,"total_pnl":3,"today":{"volume":10,"pnl":1,"fees":0.1,"num_trades":4},"win_rate":55}"#,
        )
        .unwrap();
        let overview = normalize_overview(raw);
        assert_eq!(overview.active_positions, 3);
        assert_eq!(overview.today.num_trades, 4);
        assert_eq!(overview.win_rate, dec!(55));
    }

    #[test]
    fn test_health_mapping() {
        let healthy = normalize_health(RawHealth { status: "healthy".into(), timestamp: "t".into() });
        assert_eq!(healthy.status, HealthState::Healthy);
        assert!(healthy.components.postgres && healthy.components.redis);

        let degraded = normalize_health(RawHealth { status: "starting".into(), timestamp: "t".into() });
        assert_eq!(degraded.status, HealthState::Degraded);
    }

    #[tokio::test]
    async fn test_placeholders_return_empty_values() {
        let client = ApiClient::new("http://127.0.0.1:9", Duration::from_millis(50)).unwrap();
        assert!(client.get_recent_trades(20).await.unwrap().is_empty());
        assert!(client.get_funding_history("BTC", 168).await.unwrap().is_empty());
        let summary = client.get_performance_summary().await.unwrap();
        assert_eq!(summary.total_trades, 0);
        assert_eq!(summary.total_pnl, Decimal::ZERO);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }
}
