use crate::formatters::{format_currency, format_funding_rate, format_percentage, format_price};
use crate::types::{
    AnalyticsBundle, DailyStat, MarketPrice, MarketPrices, PairCategory, Position, PositionSide,
    TradingOverview,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

pub const NO_POSITIONS: &str = "No active positions";
pub const NO_MARKET_DATA: &str = "No market data available";
pub const NO_SEARCH_MATCH: &str = "No pairs match your search";
pub const NO_DAILY_STATS: &str = "No trading history yet";
pub const NO_BACKTESTS: &str = "No backtest results available";

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct MetricCard {
    pub title: String,
    pub value: String,
    pub change: String,
    pub positive: bool,
    pub description: String,
}

pub fn metric_cards(overview: &TradingOverview) -> Vec<MetricCard> {
    let today_pnl = overview.today.pnl;
    let pnl_change = if today_pnl.is_zero() {
        "No trades today".to_string()
    } else {
        let sign = if today_pnl >= Decimal::ZERO { "+" } else { "" };
        format!("{}{} today", sign, format_currency(today_pnl))
    };
    let has_positions = overview.total_positions > 0;

    vec![
        MetricCard {
            title: "Total P&L".to_string(),
            value: format_currency(overview.total_pnl),
            change: pnl_change,
            positive: overview.total_pnl >= Decimal::ZERO,
            description: "Total profit/loss (unrealized + realized)".to_string(),
        },
        MetricCard {
            title: "Active Positions".to_string(),
            value: overview.active_positions.to_string(),
            change: format!("{} total positions", overview.total_positions),
            positive: overview.active_positions > 0,
            description: "Currently open trades".to_string(),
        },
        MetricCard {
            title: "Today's Volume".to_string(),
            value: format_currency(overview.today.volume),
            change: format!("{} trades executed", overview.today.num_trades),
            positive: overview.today.volume > Decimal::ZERO,
            description: "Trading volume today".to_string(),
        },
        MetricCard {
            title: "Win Rate".to_string(),
            value: if has_positions { format!("{:.1}%", overview.win_rate.round_dp(1)) } else { "N/A".to_string() },
            change: if has_positions {
                format!("{} total trades", overview.total_positions)
            } else {
                "No trades yet".to_string()
            },
            positive: overview.win_rate >= Decimal::from(50),
            description: "Successful trade percentage".to_string(),
        },
    ]
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PositionRow {
    pub symbol: String,
    pub side: String,
    pub entry_price: String,
    pub current_price: String,
    pub pnl_percent: String,
    pub pnl_usd: String,
    pub size: String,
    pub units: String,
    pub leverage: String,
    pub duration: String,
    pub positive: bool,
}

/// Unrealized PnL as (percent, USD). Current price defaults to entry.
pub fn position_pnl(position: &Position) -> (Decimal, Decimal) {
    if position.entry_price.is_zero() {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    let current = position.current_price.unwrap_or(position.entry_price);
    let move_pct = (current - position.entry_price) / position.entry_price * Decimal::ONE_HUNDRED;
    let pnl_pct = match position.side {
        PositionSide::Long => move_pct,
        PositionSide::Short => -move_pct,
    };
    let pnl_usd = pnl_pct / Decimal::ONE_HUNDRED * position.notional;
    (pnl_pct, pnl_usd)
}

pub fn position_row(position: &Position) -> PositionRow {
    let (pnl_pct, pnl_usd) = position_pnl(position);
    let current = position.current_price.unwrap_or(position.entry_price);
    let usd_sign = if pnl_usd >= Decimal::ZERO { "+" } else { "" };

    PositionRow {
        symbol: position.symbol.clone(),
        side: position.side.to_string(),
        entry_price: format!("${:.2}", position.entry_price.round_dp(2)),
        current_price: format!("${:.2}", current.round_dp(2)),
        pnl_percent: format_percentage(pnl_pct, 2),
        pnl_usd: format!("{}{}", usd_sign, format_currency(pnl_usd)),
        size: format_currency(position.notional),
        units: format!("{:.4} units", position.quantity.round_dp(4)),
        leverage: format!("{}x", position.leverage.normalize()),
        duration: format!("{}m", position.hold_time_min),
        positive: pnl_pct >= Decimal::ZERO,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PriceSort {
    #[default]
    Symbol,
    /// Highest first.
    Price,
    /// Biggest 24h gain first; missing change counts as 0.
    Change,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceQuery {
    pub search: String,
    pub category: Option<PairCategory>,
    pub sort: PriceSort,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PriceRow {
    pub symbol: String,
    pub display_name: String,
    pub category: String,
    pub price: String,
    pub change_24h: Option<String>,
    pub funding_rate: String,
    pub positive: bool,
}

fn matches_query(symbol: &str, price: &MarketPrice, query: &PriceQuery) -> bool {
    if let Some(category) = query.category {
        if price.category != Some(category) {
            return false;
        }
    }
    let needle = query.search.trim().to_lowercase();
    needle.is_empty()
        || symbol.to_lowercase().contains(&needle)
        || price.display_name.to_lowercase().contains(&needle)
}

pub fn price_rows(prices: &MarketPrices, query: &PriceQuery) -> Vec<PriceRow> {
    let mut selected: Vec<(&String, &MarketPrice)> = prices
        .prices
        .iter()
        .filter(|(symbol, price)| matches_query(symbol, price, query))
        .collect();

    match query.sort {
        PriceSort::Symbol => selected.sort_by(|a, b| a.0.cmp(b.0)),
        PriceSort::Price => selected.sort_by(|a, b| b.1.mark_price.cmp(&a.1.mark_price)),
        PriceSort::Change => selected.sort_by(|a, b| {
            let a_change = a.1.change_24h_pct.unwrap_or(Decimal::ZERO);
            let b_change = b.1.change_24h_pct.unwrap_or(Decimal::ZERO);
            b_change.cmp(&a_change)
        }),
    }

    selected
        .into_iter()
        .map(|(symbol, price)| PriceRow {
            symbol: symbol.clone(),
            display_name: price.display_name.clone(),
            category: price.category.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
            price: format!("${}", format_price(price.mark_price)),
            change_24h: price.change_24h_pct.map(|c| format_percentage(c, 2)),
            funding_rate: format_funding_rate(price.funding_rate),
            positive: price.change_24h_pct.unwrap_or(Decimal::ZERO) >= Decimal::ZERO,
        })
        .collect()
}

pub fn price_empty_message(query: &PriceQuery) -> &'static str {
    if query.search.trim().is_empty() {
        NO_MARKET_DATA
    } else {
        NO_SEARCH_MATCH
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChartPoint {
    pub id: String,
    pub date: String,
    pub pnl: Decimal,
    pub cumulative: Decimal,
    pub volume: Decimal,
    pub trades: u64,
}

/// The backend lists newest first; the chart runs oldest first with a running PnL.
pub fn chart_points(stats: &[DailyStat]) -> Vec<ChartPoint> {
    let mut cumulative = Decimal::ZERO;
    stats
        .iter()
        .rev()
        .enumerate()
        .map(|(index, stat)| {
            cumulative += stat.pnl;
            let date = NaiveDate::parse_from_str(stat.date.get(..10).unwrap_or(&stat.date), "%Y-%m-%d")
                .map(|d| d.format("%b %-d").to_string())
                .unwrap_or_else(|_| stat.date.clone());
            ChartPoint {
                id: format!("{}-{}", stat.date, index),
                date,
                pnl: stat.pnl,
                cumulative,
                volume: stat.volume,
                trades: stat.num_trades,
            }
        })
        .collect()
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct MomentumRow {
    pub symbol: String,
    pub score: String,
    pub signal: &'static str,
    pub volume_weighted: Option<String>,
    pub whale: Option<String>,
    pub confirmation: Option<String>,
}

fn momentum_signal(score: f64) -> &'static str {
    if score >= 0.3 {
        "bullish"
    } else if score <= -0.3 {
        "bearish"
    } else {
        "neutral"
    }
}

pub fn momentum_rows(bundle: &AnalyticsBundle) -> Vec<MomentumRow> {
    bundle
        .report
        .momentum_scores
        .symbols
        .iter()
        .map(|m| {
            let vw = bundle.volume_weighted_momentum.as_ref().and_then(|all| all.get(&m.symbol));
            let fmt = |v: Option<f64>| format!("{:.2}", v.unwrap_or_default());
            MomentumRow {
                symbol: m.symbol.clone(),
                score: format!("{:.2}", m.score),
                signal: momentum_signal(m.score),
                volume_weighted: vw.map(|v| match v.combined_score {
                    Some(s) => format!("{:.2}", s),
                    None => "N/A".to_string(),
                }),
                whale: vw.map(|v| if v.whale_momentum.is_some() { fmt(v.whale_momentum) } else { "N/A".to_string() }),
                confirmation: vw.map(|v| if v.volume_confirmation.is_some() { fmt(v.volume_confirmation) } else { "N/A".to_string() }),
            }
        })
        .collect()
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct BacktestRow {
    pub name: String,
    pub period: String,
    pub trades: u64,
    pub win_rate: String,
    pub total_return: String,
    pub max_drawdown: String,
    pub sharpe: String,
}

/// First `limit` backtests as listed by the backend.
pub fn backtest_rows(bundle: &AnalyticsBundle, limit: usize) -> Vec<BacktestRow> {
    bundle
        .backtest
        .results
        .iter()
        .take(limit)
        .map(|r| BacktestRow {
            name: r.filename.clone(),
            period: format!("{} - {}", r.start_date, r.end_date),
            trades: r.total_trades,
            win_rate: format!("{:.1}%", r.win_rate),
            total_return: format!("{}{:.2}%", if r.total_return_pct >= 0.0 { "+" } else { "" }, r.total_return_pct),
            max_drawdown: format!("{:.2}%", r.max_drawdown),
            sharpe: format!("{:.2}", r.sharpe_ratio),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalyticsReport, BacktestResult, BacktestResults, MomentumScore, TodayStats, VolumeWeightedMomentum};
    use chrono::Utc;
    use rust_decimal::dec;
    use std::collections::BTreeMap;

    fn overview(total_positions: u64, today_pnl: Decimal) -> TradingOverview {
        TradingOverview {
            timestamp: "t".to_string(),
            active_positions: total_positions.min(2),
            total_positions,
            total_realized_pnl: dec!(100),
            total_pnl: dec!(-1234.5),
            today: TodayStats { volume: dec!(50000), pnl: today_pnl, fees: dec!(3), num_trades: 7 },
            win_rate: dec!(62.44),
        }
    }

    fn position(side: PositionSide, entry: Decimal, current: Option<Decimal>, notional: Decimal) -> Position {
        Position {
            symbol: "BTCUSDT".to_string(),
            side,
            entry_price: entry,
            quantity: dec!(0.5),
            leverage: dec!(3),
            notional,
            hold_time_min: 42,
            opened_at: None,
            unrealized_pnl: None,
            liquidation_price: None,
            current_price: current,
            amount: None,
        }
    }

    fn quote(price: Decimal, change: Option<Decimal>, category: Option<PairCategory>, name: &str) -> MarketPrice {
        MarketPrice {
            mark_price: price,
            funding_rate: Decimal::ZERO,
            timestamp: String::new(),
            change_24h_pct: change,
            category,
            display_name: name.to_string(),
        }
    }

    fn sample_prices() -> MarketPrices {
        let mut prices = BTreeMap::new();
        prices.insert("BTC".to_string(), quote(dec!(50000), Some(dec!(1.5)), Some(PairCategory::Major), "Bitcoin"));
        prices.insert("PEPE".to_string(), quote(dec!(0.0000012), Some(dec!(12)), Some(PairCategory::SmallCap), "Pepe"));
        prices.insert("ETH".to_string(), quote(dec!(3000), None, Some(PairCategory::Major), "Ethereum"));
        MarketPrices { timestamp: Utc::now(), prices }
    }

    #[test]
    fn test_metric_cards() {
        let cards = metric_cards(&overview(10, dec!(25.5)));
        assert_eq!(cards[0].value, "-$1,234.50");
        assert_eq!(cards[0].change, "+$25.50 today");
        assert!(!cards[0].positive);
        assert_eq!(cards[1].change, "10 total positions");
        assert_eq!(cards[2].change, "7 trades executed");
        assert_eq!(cards[3].value, "62.4%");

        let cards = metric_cards(&overview(0, Decimal::ZERO));
        assert_eq!(cards[0].change, "No trades today");
        assert_eq!(cards[3].value, "N/A");
        assert_eq!(cards[3].change, "No trades yet");
    }

    #[test]
    fn test_position_pnl_long_and_short() {
        let long = position(PositionSide::Long, dec!(100), Some(dec!(110)), dec!(1000));
        assert_eq!(position_pnl(&long), (dec!(10), dec!(100)));

        let short = position(PositionSide::Short, dec!(100), Some(dec!(110)), dec!(1000));
        assert_eq!(position_pnl(&short), (dec!(-10), dec!(-100)));

        let flat = position(PositionSide::Long, dec!(100), None, dec!(1000));
        assert_eq!(position_pnl(&flat), (Decimal::ZERO, Decimal::ZERO));
    }

    #[test]
    fn test_position_row_formatting() {
        let row = position_row(&position(PositionSide::Short, dec!(100), Some(dec!(110)), dec!(1000)));
        assert_eq!(row.side, "SHORT");
        assert_eq!(row.entry_price, "$100.00");
        assert_eq!(row.current_price, "$110.00");
        assert_eq!(row.pnl_percent, "-10.00%");
        assert_eq!(row.pnl_usd, "-$100.00");
        assert_eq!(row.size, "$1,000.00");
        assert_eq!(row.units, "0.5000 units");
        assert_eq!(row.leverage, "3x");
        assert_eq!(row.duration, "42m");
        assert!(!row.positive);
    }

    #[test]
    fn test_price_rows_filter_and_sort() {
        let prices = sample_prices();

        let rows = price_rows(&prices, &PriceQuery::default());
        let symbols: Vec<_> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, ["BTC", "ETH", "PEPE"]);
        assert_eq!(rows[0].price, "$50000.00");
        assert_eq!(rows[2].price, "$0.00000120");
        assert_eq!(rows[1].change_24h, None);

        let by_price = price_rows(&prices, &PriceQuery { sort: PriceSort::Price, ..Default::default() });
        assert_eq!(by_price[0].symbol, "BTC");
        assert_eq!(by_price[2].symbol, "PEPE");

        let by_change = price_rows(&prices, &PriceQuery { sort: PriceSort::Change, ..Default::default() });
        let symbols: Vec<_> = by_change.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, ["PEPE", "BTC", "ETH"]);

        let majors = price_rows(&prices, &PriceQuery { category: Some(PairCategory::Major), ..Default::default() });
        assert_eq!(majors.len(), 2);

        let search = PriceQuery { search: "ether".to_string(), ..Default::default() };
        let found = price_rows(&prices, &search);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].symbol, "ETH");

        let none = PriceQuery { search: "zzz".to_string(), ..Default::default() };
        assert!(price_rows(&prices, &none).is_empty());
        assert_eq!(price_empty_message(&none), NO_SEARCH_MATCH);
        assert_eq!(price_empty_message(&PriceQuery::default()), NO_MARKET_DATA);
    }

    #[test]
    fn test_price_row_without_category_is_not_labelled_major() {
        let mut prices = sample_prices();
        prices.prices.insert("XYZ".to_string(), quote(dec!(2), None, None, "XYZ"));

        let rows = price_rows(&prices, &PriceQuery::default());
        let xyz = rows.iter().find(|r| r.symbol == "XYZ").unwrap();
        assert_eq!(xyz.category, "-");
        assert_eq!(rows[0].category, "major");

        let majors = price_rows(&prices, &PriceQuery { category: Some(PairCategory::Major), ..Default::default() });
        assert!(majors.iter().all(|r| r.symbol != "XYZ"));
    }

    #[test]
    fn test_chart_points_oldest_first_with_running_total() {
        let stat = |date: &str, pnl: Decimal| DailyStat {
            date: date.to_string(),
            volume: dec!(1000),
            pnl,
            fees: dec!(1),
            num_trades: 3,
            win_rate: dec!(50),
        };
        let stats = vec![stat("2025-01-03", dec!(-5)), stat("2025-01-02", dec!(20)), stat("2025-01-01", dec!(10))];

        let points = chart_points(&stats);
        assert_eq!(points[0].date, "Jan 1");
        assert_eq!(points[0].cumulative, dec!(10));
        assert_eq!(points[1].cumulative, dec!(30));
        assert_eq!(points[2].cumulative, dec!(25));
        assert_eq!(points[2].id, "2025-01-03-2");
        assert!(chart_points(&[]).is_empty());
    }

    #[test]
    fn test_momentum_and_backtest_rows() {
        let mut report = AnalyticsReport::default();
        report.momentum_scores.symbols = vec![
            MomentumScore { symbol: "BTC".into(), score: 0.45, ..Default::default() },
            MomentumScore { symbol: "ETH".into(), score: -0.1, ..Default::default() },
        ];
        let mut vw = BTreeMap::new();
        vw.insert("BTC".to_string(), VolumeWeightedMomentum { combined_score: Some(0.5), whale_momentum: None, volume_confirmation: Some(1.234) });
        let bundle = AnalyticsBundle {
            timeframe: "24h".into(),
            report,
            backtest: BacktestResults {
                results: (0..7)
                    .map(|i| BacktestResult { filename: format!("run{}", i), total_return_pct: -1.5, ..Default::default() })
                    .collect(),
            },
            volume_weighted_momentum: Some(vw),
        };

        let rows = momentum_rows(&bundle);
        assert_eq!(rows[0].signal, "bullish");
        assert_eq!(rows[0].volume_weighted.as_deref(), Some("0.50"));
        assert_eq!(rows[0].whale.as_deref(), Some("N/A"));
        assert_eq!(rows[0].confirmation.as_deref(), Some("1.23"));
        assert_eq!(rows[1].signal, "neutral");
        assert_eq!(rows[1].volume_weighted, None);

        let backtests = backtest_rows(&bundle, 5);
        assert_eq!(backtests.len(), 5);
        assert_eq!(backtests[0].total_return, "-1.50%");
    }
}
