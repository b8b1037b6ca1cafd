// src/feeds.rs

use crate::api_client::ApiClient;
use crate::config::RefreshIntervals;
use crate::error::AppError;
use crate::poller::{PollOptions, Poller};
use crate::types::{
    AnalyticsBundle, DailyStat, HealthStatus, MarketPrices, PerformanceSummary, Position, Trade,
    TradingOverview,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Caller overrides. Unset fields fall back to the feed's defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedOptions {
    pub refresh_interval: Option<Duration>,
    pub enabled: Option<bool>,
}

impl FeedOptions {
    pub fn interval(refresh_interval: Duration) -> Self {
        Self { refresh_interval: Some(refresh_interval), enabled: None }
    }

    pub fn disabled() -> Self {
        Self { refresh_interval: None, enabled: Some(false) }
    }

    pub fn resolve(self, default_interval: Duration) -> PollOptions {
        PollOptions {
            refresh_interval: self.refresh_interval.unwrap_or(default_interval),
            enabled: self.enabled.unwrap_or(true),
        }
    }
}

/// Binds API client operations to pollers with per-feed default cadences.
#[derive(Clone)]
pub struct Feeds {
    client: Arc<ApiClient>,
    intervals: RefreshIntervals,
}

impl Feeds {
    pub fn new(client: Arc<ApiClient>, intervals: RefreshIntervals) -> Self {
        Self { client, intervals }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    fn bind<T, C, Fut>(&self, name: &str, default_ms: u64, options: FeedOptions, call: C) -> Poller<T>
    where
        T: PartialEq + Send + Sync + 'static,
        C: Fn(Arc<ApiClient>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let client = self.client.clone();
        let options = options.resolve(Duration::from_millis(default_ms));
        Poller::spawn(name, move || call(client.clone()), options)
    }

    pub fn trading_overview(&self, options: FeedOptions) -> Poller<TradingOverview> {
        self.bind("overview", self.intervals.overview_ms, options, |client| async move {
            client.get_trading_overview().await
        })
    }

    pub fn current_positions(&self, options: FeedOptions) -> Poller<Vec<Position>> {
        self.bind("positions", self.intervals.positions_ms, options, |client| async move {
            client.get_current_positions().await
        })
    }

    pub fn recent_trades(&self, limit: usize, options: FeedOptions) -> Poller<Vec<Trade>> {
        self.bind("recent_trades", self.intervals.recent_trades_ms, options, move |client| async move {
            client.get_recent_trades(limit).await
        })
    }

    pub fn daily_stats(&self, days: u32, options: FeedOptions) -> Poller<Vec<DailyStat>> {
        self.bind("daily_stats", self.intervals.daily_stats_ms, options, move |client| async move {
            client.get_daily_stats(days).await
        })
    }

    pub fn market_prices(&self, options: FeedOptions) -> Poller<MarketPrices> {
        self.bind("market_prices", self.intervals.market_prices_ms, options, |client| async move {
            client.get_market_prices().await
        })
    }

    pub fn performance_summary(&self, options: FeedOptions) -> Poller<PerformanceSummary> {
        self.bind("performance", self.intervals.performance_ms, options, |client| async move {
            client.get_performance_summary().await
        })
    }

    pub fn analytics(&self, timeframe: &str, options: FeedOptions) -> Poller<AnalyticsBundle> {
        let timeframe = timeframe.to_string();
        self.bind("analytics", self.intervals.analytics_ms, options, move |client| {
            let timeframe = timeframe.clone();
            async move { client.get_analytics_bundle(&timeframe).await }
        })
    }

    pub fn health(&self, options: FeedOptions) -> Poller<HealthStatus> {
        self.bind("health", self.intervals.health_ms, options, |client| async move {
            client.get_health().await
        })
    }
}
