// src/bin/snapshot.rs

use nexwave_dashboard::{api_client::ApiClient, config::Config, error::AppError};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

fn section<T: Serialize>(name: &str, result: Result<T, AppError>) -> Value {
    match result {
        Ok(data) => serde_json::to_value(data).unwrap_or(Value::Null),
        Err(e) => {
            warn!("[Snapshot] {} failed: {}", name, e);
            json!({ "error": e.to_string(), "status": e.status_label() })
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::load()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.get_log_level())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let client = ApiClient::from_config(&config)?;
    info!("[Snapshot] Fetching every endpoint from {}", client.base_url());

    let (health, overview, positions, trades, daily, prices, pairs, performance, analytics) = tokio::join!(
        client.get_health(),
        client.get_trading_overview(),
        client.get_current_positions(),
        client.get_recent_trades(20),
        client.get_daily_stats(config.daily_stats_days),
        client.get_market_prices(),
        client.get_pairs(None, true),
        client.get_performance_summary(),
        client.get_analytics_bundle(&config.analytics_timeframe),
    );

    let snapshot = json!({
        "api_base_url": client.base_url(),
        "health": section("health", health),
        "overview": section("overview", overview),
        "positions": section("positions", positions),
        "recent_trades": section("recent_trades", trades),
        "daily_stats": section("daily_stats", daily),
        "market_prices": section("market_prices", prices),
        "pairs": section("pairs", pairs),
        "performance": section("performance", performance),
        "analytics": section("analytics", analytics),
    });

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
