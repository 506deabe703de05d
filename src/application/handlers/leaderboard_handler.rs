//! Monthly leaderboard.

use axum::{extract::State, Json};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::application::AppState;
use crate::persistence::repository::ChallengeRepository;

use super::{trading_error, ApiError};
use crate::domain::errors::TradingError;

const LEADERBOARD_SIZE: u32 = 10;

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub username: String,
    pub profit_percent: f64,
    pub avg_profit_percent: f64,
    pub total_trades: i64,
}

/// Top users by average challenge profit percent over challenges started
/// in the current calendar month.
pub async fn monthly(
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    let (month_start, month_end) = month_bounds(Utc::now())
        .ok_or_else(|| {
            trading_error(TradingError::Configuration {
                reason: "failed to compute month bounds".to_string(),
            })
        })?;

    let rows = ChallengeRepository::new(state.pool.clone())
        .monthly_leaderboard(month_start, month_end, LEADERBOARD_SIZE)
        .await
        .map_err(|e| trading_error(e.into()))?;

    let leaderboard = rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| LeaderboardEntry {
            rank: i + 1,
            username: row.username,
            profit_percent: row.avg_profit_percent,
            avg_profit_percent: row.avg_profit_percent,
            total_trades: row.total_trades,
        })
        .collect();

    Ok(Json(leaderboard))
}

/// `[start, end)` of the calendar month containing `now`, in UTC.
fn month_bounds(now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)?.and_hms_opt(0, 0, 0)?;
    let (next_year, next_month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)?.and_hms_opt(0, 0, 0)?;
    Some((
        Utc.from_utc_datetime(&start),
        Utc.from_utc_datetime(&end),
    ))
}
