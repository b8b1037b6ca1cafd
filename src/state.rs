use crate::config::Config;
use crate::feeds::{FeedOptions, Feeds};
use crate::poller::Poller;
use crate::types::{
    AnalyticsBundle, DailyStat, HealthStatus, MarketPrices, Position, TradingOverview,
};

/// Every feed the dashboard page shows. Panels poll independently, so a
/// render may combine values fetched at slightly different moments.
pub struct DashboardState {
    pub overview: Poller<TradingOverview>,
    pub positions: Poller<Vec<Position>>,
    pub market_prices: Poller<MarketPrices>,
    pub daily_stats: Poller<Vec<DailyStat>>,
    pub analytics: Poller<AnalyticsBundle>,
    pub health: Poller<HealthStatus>,
}

impl DashboardState {
    /// Starts all feeds. Must be called from within a Tokio runtime.
    pub fn start(feeds: &Feeds, config: &Config) -> Self {
        Self {
            overview: feeds.trading_overview(FeedOptions::default()),
            positions: feeds.current_positions(FeedOptions::default()),
            market_prices: feeds.market_prices(FeedOptions::default()),
            daily_stats: feeds.daily_stats(config.daily_stats_days, FeedOptions::default()),
            analytics: feeds.analytics(&config.analytics_timeframe, FeedOptions::default()),
            health: feeds.health(FeedOptions::default()),
        }
    }

    /// Fetches every panel now instead of waiting for its next tick.
    pub fn refresh_all(&self) {
        self.overview.refetch();
        self.positions.refetch();
        self.market_prices.refetch();
        self.daily_stats.refetch();
        self.analytics.refetch();
        self.health.refetch();
    }

    /// Swaps the daily-stats range; the feed restarts with the new window.
    pub fn set_daily_stats_days(&mut self, feeds: &Feeds, days: u32) {
        let options = FeedOptions {
            refresh_interval: Some(self.daily_stats.options().refresh_interval),
            enabled: Some(self.daily_stats.options().enabled),
        };
        self.daily_stats = feeds.daily_stats(days, options);
    }

    pub async fn stop(self) {
        self.overview.stop().await;
        self.positions.stop().await;
        self.market_prices.stop().await;
        self.daily_stats.stop().await;
        self.analytics.stop().await;
        self.health.stop().await;
    }
}
