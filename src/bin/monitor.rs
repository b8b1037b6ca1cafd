// src/bin/monitor.rs

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use nexwave_dashboard::{
    api_client::ApiClient,
    config::Config,
    feeds::Feeds,
    formatters::{format_currency, format_relative_time_at},
    poller::{PanelState, PollState},
    state::DashboardState,
    types::HealthState,
    view_model::{
        backtest_rows, chart_points, metric_cards, momentum_rows, position_row, price_empty_message,
        price_rows, PriceQuery, NO_BACKTESTS, NO_DAILY_STATS, NO_POSITIONS,
    },
};
use chrono::Utc;
use std::io::{self, stdout, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::load()?;

    // The terminal is redrawn in place, so logs go to the file only.
    let file_appender = rolling::daily("logs", "monitor.log");
    let (non_blocking_file, _guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.get_log_level().as_str().to_lowercase()));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking_file).with_ansi(false))
        .init();

    info!("[Monitor] Dashboard starting against {}", config.api_base_url);

    let client = Arc::new(ApiClient::from_config(&config)?);
    let feeds = Feeds::new(client, config.refresh.clone());
    let state = DashboardState::start(&feeds, &config);
    let query = PriceQuery::default();

    let mut interval = tokio::time::interval(config.ui_update_interval());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("[Monitor] Ctrl+C received, stopping feeds.");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = redraw_terminal(&state, &query) {
                    error!("[Monitor] Failed to draw dashboard: {}", e);
                    break;
                }
            }
        }
    }

    state.stop().await;
    info!("[Monitor] Stopped.");
    Ok(())
}

fn status_line<T>(state: &PollState<T>) -> String {
    let updated = state
        .last_changed
        .map(|t| format!("updated {}", format_relative_time_at(t, Utc::now())))
        .unwrap_or_default();
    match state.panel_state() {
        PanelState::Loading => "loading...".to_string(),
        PanelState::Ready => updated,
        PanelState::Stale => format!("stale, {} ({})", updated, error_text(state)),
        PanelState::Failed => format!("error: {}", error_text(state)),
    }
}

fn error_text<T>(state: &PollState<T>) -> String {
    state.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
}

fn redraw_terminal(state: &DashboardState, query: &PriceQuery) -> io::Result<()> {
    let mut out = stdout();
    execute!(out, Clear(ClearType::All), cursor::MoveTo(0, 0))?;

    let health = state.health.snapshot();
    let health_label = match health.data.as_deref().map(|h| h.status) {
        Some(HealthState::Healthy) => "healthy",
        Some(HealthState::Degraded) => "degraded",
        None if health.error.is_some() => "unreachable",
        None => "checking",
    };
    writeln!(out, "--- Trading Dashboard (backend: {}) ---\n", health_label)?;

    let overview = state.overview.snapshot();
    writeln!(out, "--- Overview [{}] ---", status_line(&overview))?;
    if let Some(data) = overview.data.as_deref() {
        for card in metric_cards(data) {
            writeln!(out, "{:<16} | {:>16} | {}", card.title, card.value, card.change)?;
        }
    }

    let positions = state.positions.snapshot();
    writeln!(out, "\n--- Active Positions [{}] ---", status_line(&positions))?;
    match positions.data.as_deref().map(Vec::as_slice) {
        Some([]) => writeln!(out, "{}", NO_POSITIONS)?,
        Some(list) => {
            writeln!(
                out,
                "{:<12} | {:<5} | {:>12} | {:>12} | {:>9} | {:>12} | {:>14} | {:>5} | {:>6}",
                "PAIR", "SIDE", "ENTRY", "CURRENT", "PNL %", "PNL", "SIZE", "LEV", "HELD"
            )?;
            writeln!(out, "{:-<110}", "")?;
            for row in list.iter().map(position_row) {
                writeln!(
                    out,
                    "{:<12} | {:<5} | {:>12} | {:>12} | {:>9} | {:>12} | {:>14} | {:>5} | {:>6}",
                    row.symbol, row.side, row.entry_price, row.current_price, row.pnl_percent,
                    row.pnl_usd, row.size, row.leverage, row.duration
                )?;
            }
        }
        None => {}
    }

    let prices = state.market_prices.snapshot();
    writeln!(out, "\n--- Market Prices [{}] ---", status_line(&prices))?;
    if let Some(data) = prices.data.as_deref() {
        let rows = price_rows(data, query);
        if rows.is_empty() {
            writeln!(out, "{}", price_empty_message(query))?;
        }
        for row in rows {
            writeln!(
                out,
                "{:<12} | {:<10} | {:>18} | {:>9} | funding {}",
                row.symbol,
                row.category,
                row.price,
                row.change_24h.as_deref().unwrap_or("-"),
                row.funding_rate
            )?;
        }
    }

    let daily = state.daily_stats.snapshot();
    writeln!(out, "\n--- Daily PnL [{}] ---", status_line(&daily))?;
    if let Some(stats) = daily.data.as_deref() {
        let points = chart_points(stats);
        if points.is_empty() {
            writeln!(out, "{}", NO_DAILY_STATS)?;
        }
        for point in points.iter().rev().take(7) {
            writeln!(
                out,
                "{:<8} | {:>14} | cumulative {:>14} | {} trades",
                point.date,
                format_currency(point.pnl),
                format_currency(point.cumulative),
                point.trades
            )?;
        }
    }

    let analytics = state.analytics.snapshot();
    writeln!(out, "\n--- Analytics [{}] ---", status_line(&analytics))?;
    if let Some(bundle) = analytics.data.as_deref() {
        for row in momentum_rows(bundle) {
            writeln!(
                out,
                "{:<12} | {:>6} {:<8} | vw {}",
                row.symbol,
                row.score,
                row.signal,
                row.volume_weighted.as_deref().unwrap_or("N/A")
            )?;
        }
        let backtests = backtest_rows(bundle, 5);
        if backtests.is_empty() {
            writeln!(out, "{}", NO_BACKTESTS)?;
        }
        for row in backtests {
            writeln!(
                out,
                "{:<24} | {:>5} trades | win {:>6} | return {:>8} | dd {:>7}",
                row.name, row.trades, row.win_rate, row.total_return, row.max_drawdown
            )?;
        }
    }

    out.flush()
}
