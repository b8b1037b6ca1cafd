use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// --- Health ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
}

/// Sub-component flags. Not verified independently: they are reported healthy
/// whenever the top-level health call succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub postgres: bool,
    pub redis: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlite: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub timestamp: String,
    pub components: ComponentHealth,
}

// --- Trading performance ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TodayStats {
    pub volume: Decimal,
    pub pnl: Decimal,
    pub fees: Decimal,
    pub num_trades: u64,
}

/// Aggregate snapshot. `active_positions <= total_positions` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingOverview {
    pub timestamp: String,
    pub active_positions: u64,
    pub total_positions: u64,
    pub total_realized_pnl: Decimal,
    pub total_pnl: Decimal,
    pub today: TodayStats,
    /// Percentage in 0..=100.
    pub win_rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// The backend encodes shorts as the book side they rest on: "ask"/"ASK".
    /// Everything else is a long.
    pub fn from_wire(side: &str) -> Self {
        match side {
            "ask" | "ASK" => PositionSide::Short,
            _ => PositionSide::Long,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

/// One open trade, reconciled from the backend's optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: PositionSide,
    pub entry_price: Decimal,
    pub quantity: Decimal,
    /// Always >= 1.
    pub leverage: Decimal,
    pub notional: Decimal,
    pub hold_time_min: i64,
    pub opened_at: Option<DateTime<Utc>>,
    pub unrealized_pnl: Option<Decimal>,
    pub liquidation_price: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub amount: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: String,
    pub symbol: String,
    pub side: String,
    pub position_side: String,
    pub quantity: Decimal,
    pub price: Decimal,
    pub notional: Decimal,
    pub pnl: Decimal,
    pub commission: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStat {
    pub date: String,
    #[serde(default)]
    pub volume: Decimal,
    #[serde(default)]
    pub pnl: Decimal,
    #[serde(default)]
    pub fees: Decimal,
    #[serde(default)]
    pub num_trades: u64,
    #[serde(default)]
    pub win_rate: Decimal,
}

// --- Market data ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PairCategory {
    #[serde(rename = "major")]
    Major,
    #[serde(rename = "mid-cap")]
    MidCap,
    #[serde(rename = "emerging")]
    Emerging,
    #[serde(rename = "small-cap")]
    SmallCap,
}

impl PairCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PairCategory::Major => "major",
            PairCategory::MidCap => "mid-cap",
            PairCategory::Emerging => "emerging",
            PairCategory::SmallCap => "small-cap",
        }
    }
}

impl FromStr for PairCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "major" => Ok(PairCategory::Major),
            "mid-cap" => Ok(PairCategory::MidCap),
            "emerging" => Ok(PairCategory::Emerging),
            "small-cap" => Ok(PairCategory::SmallCap),
            other => Err(format!("unknown pair category '{}'", other)),
        }
    }
}

impl fmt::Display for PairCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown categories become `None` instead of rejecting the whole payload.
pub(crate) fn lenient_category<'de, D>(deserializer: D) -> Result<Option<PairCategory>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPrice {
    pub mark_price: Decimal,
    pub funding_rate: Decimal,
    pub timestamp: String,
    pub change_24h_pct: Option<Decimal>,
    pub category: Option<PairCategory>,
    pub display_name: String,
}

/// Current quotes keyed by ticker symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketPrices {
    /// When the client assembled this snapshot.
    pub timestamp: DateTime<Utc>,
    pub prices: BTreeMap<String, MarketPrice>,
}

// The fetch time differs on every cycle; only the quotes decide equality.
impl PartialEq for MarketPrices {
    fn eq(&self, other: &Self) -> bool {
        self.prices == other.prices
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairConfig {
    pub symbol: String,
    pub quote: String,
    pub max_leverage: u32,
    #[serde(default)]
    pub min_order_size: Decimal,
    #[serde(default)]
    pub tick_size: Decimal,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, deserialize_with = "lenient_category")]
    pub category: Option<PairCategory>,
    #[serde(default)]
    pub whale_threshold_usd: Option<Decimal>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairsResponse {
    pub pairs: Vec<PairConfig>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRate {
    pub timestamp: String,
    pub funding_rate: Decimal,
    pub funding_rate_pct: Decimal,
    pub mark_price: Decimal,
}

// --- Performance analytics ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolPerformance {
    pub pnl: Decimal,
    pub volume: Decimal,
    pub trades: u64,
    pub win_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub timestamp: String,
    pub total_pnl: Decimal,
    pub total_volume: Decimal,
    pub total_trades: u64,
    pub win_rate: Decimal,
    pub profit_factor: Decimal,
    pub sharpe_ratio: Option<Decimal>,
    pub max_drawdown: Option<Decimal>,
    pub by_symbol: Option<BTreeMap<String, SymbolPerformance>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaperTradingStats {
    pub total_trades: u64,
    pub win_rate: f64,
    #[serde(rename = "totalPnL")]
    pub total_pnl: f64,
    pub daily_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataCollectionStats {
    pub total_ticks: u64,
    pub duplicates_filtered: u64,
    pub outliers_filtered: u64,
    pub candles_generated: u64,
    pub tick_rate: BTreeMap<String, f64>,
    pub errors: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SymbolMarketData {
    pub symbol: String,
    pub price: f64,
    #[serde(rename = "change24h")]
    pub change_24h: f64,
    #[serde(rename = "volume24h")]
    pub volume_24h: f64,
    pub volatility: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataSummary {
    pub symbols: Vec<SymbolMarketData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsDailyStat {
    pub date: String,
    pub pnl: f64,
    pub trades: u64,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceHistory {
    pub daily_stats: Vec<AnalyticsDailyStat>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MomentumScore {
    pub symbol: String,
    pub score: f64,
    pub price_momentum: f64,
    pub technical_score: f64,
    pub volume_score: f64,
    pub funding_score: f64,
    pub last_updated: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumScores {
    pub symbols: Vec<MomentumScore>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhaleTrade {
    pub symbol: String,
    pub size: f64,
    pub side: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WhaleActivity {
    pub total_whales: u64,
    pub recent_whales: Vec<WhaleTrade>,
    pub whale_impact: BTreeMap<String, f64>,
}

/// Payload of `/analytics?timeframe=`. Sections missing from the response default to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsReport {
    pub paper_trading: PaperTradingStats,
    pub data_collection: DataCollectionStats,
    pub market_data: MarketDataSummary,
    pub performance: PerformanceHistory,
    pub momentum_scores: MomentumScores,
    pub whale_activity: WhaleActivity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestResult {
    pub filename: String,
    pub start_date: String,
    pub end_date: String,
    pub total_trades: u64,
    pub win_rate: f64,
    pub total_return_pct: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub profit_factor: f64,
    pub initial_capital: f64,
    pub final_capital: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestResults {
    pub results: Vec<BacktestResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeWeightedMomentum {
    pub combined_score: Option<f64>,
    pub whale_momentum: Option<f64>,
    pub volume_confirmation: Option<f64>,
}

/// Everything the analytics panel shows, fetched together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsBundle {
    pub timeframe: String,
    pub report: AnalyticsReport,
    pub backtest: BacktestResults,
    /// Absent when the momentum endpoint failed; the rest of the bundle is still usable.
    pub volume_weighted_momentum: Option<BTreeMap<String, VolumeWeightedMomentum>>,
}
