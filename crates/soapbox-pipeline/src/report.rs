// SPDX-FileCopyrightText: 2026 Soapbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Daily activity summary for operators.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use soapbox_core::SoapboxError;
use soapbox_storage::Store;

/// Counts for one UTC day: what went out, what is coming, what broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub published_today: i64,
    pub scheduled_tomorrow: i64,
    pub failed_today: i64,
}

/// Build the report for the UTC day containing `now`.
pub async fn daily_report(store: &Store, now: DateTime<Utc>) -> Result<DailyReport, SoapboxError> {
    let date = now.date_naive();
    let today_start = day_start(date);
    let tomorrow_start = day_start(date + chrono::Duration::days(1));
    let day_after_start = day_start(date + chrono::Duration::days(2));

    let (published_today, scheduled_tomorrow, failed_today) = store
        .report_counts(today_start, tomorrow_start, day_after_start)
        .await?;

    Ok(DailyReport {
        date,
        published_today,
        scheduled_tomorrow,
        failed_today,
    })
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(date.year(), date.month(), date.day(), 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}
