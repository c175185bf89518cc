use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use sqlx::{query_as, FromRow, PgPool};
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::booking::BookingStatus;
use crate::models::order::OrderStatus;
use crate::types::{
    BookingReport, DashboardStats, Interval, LabelCount, ProductSales, SalesPoint, SalesReport,
    TrendPoint, UserReport,
};

pub const DEFAULT_RANGE_DAYS: i64 = 30;
pub const DEFAULT_TOP_DOMAINS: usize = 5;
const MAX_RANGE_DAYS: i64 = 366 * 5;
const MIN_REPORT_YEAR: i32 = 1970;
const MAX_REPORT_YEAR: i32 = 9999;

pub const AGE_GROUPS: [&str; 7] = [
    "under_18", "18_24", "25_34", "35_44", "45_54", "55_plus", "unknown",
];

/// Whole years between `dob` and `today`.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> Option<u32> {
    if dob > today {
        return None;
    }
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    u32::try_from(years).ok()
}

pub fn age_group(dob: Option<NaiveDate>, today: NaiveDate) -> &'static str {
    match dob.and_then(|dob| age_on(dob, today)) {
        None => "unknown",
        Some(age) if age < 18 => "under_18",
        Some(age) if age <= 24 => "18_24",
        Some(age) if age <= 34 => "25_34",
        Some(age) if age <= 44 => "35_44",
        Some(age) if age <= 54 => "45_54",
        Some(_) => "55_plus",
    }
}

pub fn email_domain(email: &str) -> Option<String> {
    let (local, domain) = email.trim().rsplit_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(domain.to_lowercase())
}

/// Highest counts first, ties broken alphabetically.
pub fn top_counts(counts: HashMap<String, i64>, limit: usize) -> Vec<LabelCount> {
    let mut entries: Vec<LabelCount> = counts
        .into_iter()
        .map(|(label, count)| LabelCount { label, count })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    entries.truncate(limit);
    entries
}

pub fn bucket_start(date: NaiveDate, interval: Interval) -> NaiveDate {
    match interval {
        Interval::Day => date,
        Interval::Week => date
            .checked_sub_signed(Duration::days(date.weekday().num_days_from_monday() as i64))
            .unwrap_or(date),
        Interval::Month => date.with_day(1).unwrap_or(date),
    }
}

/// `None` once the calendar runs out.
fn next_bucket(bucket: NaiveDate, interval: Interval) -> Option<NaiveDate> {
    match interval {
        Interval::Day => bucket.checked_add_signed(Duration::days(1)),
        Interval::Week => bucket.checked_add_signed(Duration::weeks(1)),
        Interval::Month => {
            let (year, month) = if bucket.month() == 12 {
                (bucket.year().checked_add(1)?, 1)
            } else {
                (bucket.year(), bucket.month() + 1)
            };
            NaiveDate::from_ymd_opt(year, month, 1)
        }
    }
}

/// Groups per-day status counts into contiguous buckets, empty buckets included.
pub fn booking_series(
    rows: &[(NaiveDate, BookingStatus, i64)],
    from: NaiveDate,
    to: NaiveDate,
    interval: Interval,
) -> Vec<TrendPoint> {
    let mut buckets: BTreeMap<NaiveDate, TrendPoint> = BTreeMap::new();
    let mut cursor = bucket_start(from, interval);
    while cursor <= to {
        buckets.insert(
            cursor,
            TrendPoint {
                bucket: cursor,
                pending: 0,
                approved: 0,
                cancelled: 0,
                total: 0,
            },
        );
        match next_bucket(cursor, interval) {
            Some(next) => cursor = next,
            None => break,
        }
    }

    for (date, status, count) in rows {
        if *date < from || *date > to {
            continue;
        }
        if let Some(point) = buckets.get_mut(&bucket_start(*date, interval)) {
            match status {
                BookingStatus::Pending => point.pending += count,
                BookingStatus::Approved => point.approved += count,
                BookingStatus::Cancelled => point.cancelled += count,
            }
            point.total += count;
        }
    }

    buckets.into_values().collect()
}

/// Month buckets from `from` to `to`, counting only revenue-bearing orders.
pub fn sales_series(
    rows: &[(NaiveDate, OrderStatus, i64, i64)],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<SalesPoint> {
    let mut months: BTreeMap<NaiveDate, SalesPoint> = BTreeMap::new();
    let mut cursor = bucket_start(from, Interval::Month);
    while cursor <= to {
        months.insert(
            cursor,
            SalesPoint {
                month: cursor,
                orders: 0,
                revenue_cents: 0,
            },
        );
        match next_bucket(cursor, Interval::Month) {
            Some(next) => cursor = next,
            None => break,
        }
    }

    for (month, status, orders, revenue) in rows {
        if !status.is_revenue() {
            continue;
        }
        if let Some(point) = months.get_mut(&bucket_start(*month, Interval::Month)) {
            point.orders += orders;
            point.revenue_cents += revenue;
        }
    }

    months.into_values().collect()
}

#[derive(Debug, FromRow)]
pub struct UserFacts {
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

pub fn summarize_users(users: &[UserFacts], today: NaiveDate, top: usize) -> UserReport {
    let mut ages: HashMap<&'static str, i64> = HashMap::new();
    let mut domains: HashMap<String, i64> = HashMap::new();
    let mut signups: BTreeMap<String, i64> = BTreeMap::new();
    let mut verified = 0;

    for user in users {
        *ages.entry(age_group(user.date_of_birth, today)).or_insert(0) += 1;
        if let Some(domain) = email_domain(&user.email) {
            *domains.entry(domain).or_insert(0) += 1;
        }
        *signups
            .entry(user.created_at.format("%Y-%m").to_string())
            .or_insert(0) += 1;
        if user.is_verified {
            verified += 1;
        }
    }

    let total = users.len() as i64;
    UserReport {
        total,
        verified,
        unverified: total - verified,
        age_groups: AGE_GROUPS
            .iter()
            .map(|group| LabelCount {
                label: group.to_string(),
                count: ages.get(group).copied().unwrap_or(0),
            })
            .collect(),
        email_domains: top_counts(domains, top),
        signups_by_month: signups
            .into_iter()
            .map(|(label, count)| LabelCount { label, count })
            .collect(),
    }
}

/// Defaults to the trailing window ending today.
pub fn resolve_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    today: NaiveDate,
) -> AppResult<(NaiveDate, NaiveDate)> {
    let to = to.unwrap_or(today);
    let from = match from {
        Some(from) => from,
        None => to
            .checked_sub_signed(Duration::days(DEFAULT_RANGE_DAYS - 1))
            .ok_or_else(|| AppError::bad_request("Report range is out of bounds"))?,
    };
    for date in [from, to] {
        if !(MIN_REPORT_YEAR..=MAX_REPORT_YEAR).contains(&date.year()) {
            return Err(AppError::bad_request(format!(
                "Report dates must fall between {} and {}",
                MIN_REPORT_YEAR, MAX_REPORT_YEAR
            )));
        }
    }
    if from > to {
        return Err(AppError::bad_request("`from` must not be after `to`"));
    }
    if (to - from).num_days() > MAX_RANGE_DAYS {
        return Err(AppError::bad_request("Report range is too large"));
    }
    Ok((from, to))
}

pub async fn booking_report(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
    interval: Interval,
) -> AppResult<BookingReport> {
    let daily_future = query_as::<_, (NaiveDate, BookingStatus, i64)>(
        r#"
        SELECT booking_date, status, COUNT(*)
        FROM bookings
        WHERE booking_date BETWEEN $1 AND $2
        GROUP BY booking_date, status
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool);

    let packages_future = query_as::<_, (String, i64)>(
        r#"
        SELECT p.title, COUNT(*)
        FROM bookings b
        JOIN packages p ON p.id = b.package_id
        WHERE b.booking_date BETWEEN $1 AND $2
        GROUP BY p.title
        ORDER BY COUNT(*) DESC, p.title ASC
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool);

    let (daily, packages) = tokio::try_join!(daily_future, packages_future)?;
    debug!("Booking report over {} day rows", daily.len());

    Ok(BookingReport {
        from,
        to,
        interval,
        series: booking_series(&daily, from, to, interval),
        by_package: packages
            .into_iter()
            .map(|(label, count)| LabelCount { label, count })
            .collect(),
    })
}

pub async fn user_report(pool: &PgPool, top: usize) -> AppResult<UserReport> {
    let users = query_as::<_, UserFacts>(
        "SELECT email, date_of_birth, is_verified, created_at FROM users WHERE role = 'customer'",
    )
    .fetch_all(pool)
    .await?;

    Ok(summarize_users(&users, Utc::now().date_naive(), top))
}

pub async fn sales_report(pool: &PgPool, from: NaiveDate, to: NaiveDate) -> AppResult<SalesReport> {
    let end_exclusive = to
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| AppError::bad_request("Report range is out of bounds"))?;

    let monthly_future = query_as::<_, (NaiveDate, OrderStatus, i64, i64)>(
        r#"
        SELECT date_trunc('month', created_at)::DATE, status, COUNT(*),
               COALESCE(SUM(total_cents), 0)::BIGINT
        FROM orders
        WHERE created_at >= $1 AND created_at < $2
        GROUP BY 1, 2
        "#,
    )
    .bind(from)
    .bind(end_exclusive)
    .fetch_all(pool);

    let products_future = query_as::<_, (String, i64, i64)>(
        r#"
        SELECT i.product_name, SUM(i.quantity)::BIGINT, SUM(i.quantity * i.unit_price_cents)::BIGINT
        FROM order_items i
        JOIN orders o ON o.id = i.order_id
        WHERE o.status IN ('paid', 'processing', 'completed')
          AND o.created_at >= $1 AND o.created_at < $2
        GROUP BY i.product_name
        ORDER BY 2 DESC, 1 ASC
        LIMIT 5
        "#,
    )
    .bind(from)
    .bind(end_exclusive)
    .fetch_all(pool);

    let (monthly, products) = tokio::try_join!(monthly_future, products_future)?;
    let series = sales_series(&monthly, from, to);
    let total_revenue_cents = series.iter().map(|p| p.revenue_cents).sum();

    Ok(SalesReport {
        from,
        to,
        series,
        total_revenue_cents,
        top_products: products
            .into_iter()
            .map(|(product_name, quantity, revenue_cents)| ProductSales {
                product_name,
                quantity,
                revenue_cents,
            })
            .collect(),
    })
}

pub async fn dashboard_stats(pool: &PgPool) -> AppResult<DashboardStats> {
    let row = query_as::<_, (i64, i64, i64, i64, i64, i64, i64, i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users WHERE role = 'customer'),
            (SELECT COUNT(*) FROM users WHERE role = 'customer' AND is_verified),
            (SELECT COUNT(*) FROM bookings WHERE status = 'pending'),
            (SELECT COUNT(*) FROM bookings
                WHERE status = 'approved' AND booking_date >= CURRENT_DATE),
            (SELECT COUNT(*) FROM orders),
            (SELECT COALESCE(SUM(total_cents), 0)::BIGINT FROM orders
                WHERE status IN ('paid', 'processing', 'completed')),
            (SELECT COUNT(*) FROM notifications
                WHERE is_active AND starts_at <= NOW() AND ends_at > NOW()),
            (SELECT COUNT(*) FROM products WHERE is_active),
            (SELECT COUNT(*) FROM staff WHERE is_active)
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(DashboardStats {
        users: row.0,
        verified_users: row.1,
        pending_bookings: row.2,
        upcoming_bookings: row.3,
        orders: row.4,
        revenue_cents: row.5,
        active_notifications: row.6,
        products: row.7,
        staff: row.8,
    })
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn to_csv(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    let header_line: Vec<String> = headers.iter().map(|h| csv_field(h)).collect();
    out.push_str(&header_line.join(","));
    out.push_str("\r\n");
    for row in rows {
        let line: Vec<String> = row.iter().map(|v| csv_field(v)).collect();
        out.push_str(&line.join(","));
        out.push_str("\r\n");
    }
    out
}

pub fn booking_report_csv(report: &BookingReport) -> String {
    let rows: Vec<Vec<String>> = report
        .series
        .iter()
        .map(|p| {
            vec![
                p.bucket.to_string(),
                p.pending.to_string(),
                p.approved.to_string(),
                p.cancelled.to_string(),
                p.total.to_string(),
            ]
        })
        .collect();
    to_csv(&["bucket", "pending", "approved", "cancelled", "total"], &rows)
}

pub fn user_report_csv(report: &UserReport) -> String {
    let mut rows = vec![
        vec!["summary".into(), "total".into(), report.total.to_string()],
        vec!["summary".into(), "verified".into(), report.verified.to_string()],
        vec!["summary".into(), "unverified".into(), report.unverified.to_string()],
    ];
    let sections = [
        ("age_group", &report.age_groups),
        ("email_domain", &report.email_domains),
        ("signup_month", &report.signups_by_month),
    ];
    for (section, entries) in sections {
        for entry in entries.iter() {
            rows.push(vec![
                section.to_string(),
                entry.label.clone(),
                entry.count.to_string(),
            ]);
        }
    }
    to_csv(&["section", "label", "count"], &rows)
}

pub fn sales_report_csv(report: &SalesReport) -> String {
    let rows: Vec<Vec<String>> = report
        .series
        .iter()
        .map(|p| {
            vec![
                p.month.format("%Y-%m").to_string(),
                p.orders.to_string(),
                format!("{:.2}", p.revenue_cents as f64 / 100.0),
            ]
        })
        .collect();
    to_csv(&["month", "orders", "revenue"], &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_respects_birthday() {
        let today = date(2024, 6, 15);
        assert_eq!(age_on(date(2000, 6, 15), today), Some(24));
        assert_eq!(age_on(date(2000, 6, 16), today), Some(23));
        assert_eq!(age_on(date(2030, 1, 1), today), None);
    }

    #[test]
    fn age_groups_cover_edges() {
        let today = date(2024, 6, 15);
        assert_eq!(age_group(Some(date(2007, 6, 16)), today), "under_18");
        assert_eq!(age_group(Some(date(2006, 6, 15)), today), "18_24");
        assert_eq!(age_group(Some(date(1999, 6, 15)), today), "25_34");
        assert_eq!(age_group(Some(date(1980, 1, 1)), today), "35_44");
        assert_eq!(age_group(Some(date(1970, 1, 1)), today), "45_54");
        assert_eq!(age_group(Some(date(1950, 1, 1)), today), "55_plus");
        assert_eq!(age_group(None, today), "unknown");
    }

    #[test]
    fn domains_extracted_lowercase() {
        assert_eq!(email_domain("Jane@Gmail.COM"), Some("gmail.com".to_string()));
        assert_eq!(email_domain("no-at-sign"), None);
        assert_eq!(email_domain("@example.com"), None);
    }

    #[test]
    fn top_counts_orders_and_truncates() {
        let counts = HashMap::from([
            ("yahoo.com".to_string(), 2),
            ("gmail.com".to_string(), 5),
            ("aol.com".to_string(), 2),
            ("live.com".to_string(), 1),
        ]);
        let top = top_counts(counts, 3);
        let labels: Vec<&str> = top.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["gmail.com", "aol.com", "yahoo.com"]);
    }

    #[test]
    fn week_and_month_buckets() {
        // 2024-06-13 is a Thursday
        assert_eq!(bucket_start(date(2024, 6, 13), Interval::Week), date(2024, 6, 10));
        assert_eq!(bucket_start(date(2024, 6, 13), Interval::Month), date(2024, 6, 1));
        assert_eq!(next_bucket(date(2024, 12, 1), Interval::Month), Some(date(2025, 1, 1)));
    }

    #[test]
    fn booking_series_fills_gaps() {
        let rows = vec![
            (date(2024, 6, 1), BookingStatus::Pending, 2),
            (date(2024, 6, 1), BookingStatus::Approved, 1),
            (date(2024, 6, 3), BookingStatus::Cancelled, 4),
        ];
        let series = booking_series(&rows, date(2024, 6, 1), date(2024, 6, 3), Interval::Day);
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].total, 3);
        assert_eq!(series[0].pending, 2);
        assert_eq!(series[1].total, 0);
        assert_eq!(series[2].cancelled, 4);
    }

    #[test]
    fn booking_series_groups_by_month() {
        let rows = vec![
            (date(2024, 5, 20), BookingStatus::Approved, 1),
            (date(2024, 6, 2), BookingStatus::Approved, 2),
            (date(2024, 6, 28), BookingStatus::Pending, 3),
        ];
        let series = booking_series(&rows, date(2024, 5, 15), date(2024, 6, 30), Interval::Month);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].bucket, date(2024, 5, 1));
        assert_eq!(series[0].approved, 1);
        assert_eq!(series[1].total, 5);
    }

    #[test]
    fn sales_ignore_unpaid_orders() {
        let rows = vec![
            (date(2024, 5, 1), OrderStatus::Paid, 2, 10_000),
            (date(2024, 5, 1), OrderStatus::Pending, 4, 99_000),
            (date(2024, 6, 1), OrderStatus::Completed, 1, 2_500),
            (date(2024, 6, 1), OrderStatus::Cancelled, 1, 7_000),
        ];
        let series = sales_series(&rows, date(2024, 4, 10), date(2024, 6, 30));
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].revenue_cents, 0);
        assert_eq!(series[1].orders, 2);
        assert_eq!(series[1].revenue_cents, 10_000);
        assert_eq!(series[2].revenue_cents, 2_500);
    }

    #[test]
    fn user_summary() {
        let created = Utc.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();
        let users = vec![
            UserFacts {
                email: "a@gmail.com".into(),
                date_of_birth: Some(date(2000, 1, 1)),
                is_verified: true,
                created_at: created,
            },
            UserFacts {
                email: "b@gmail.com".into(),
                date_of_birth: None,
                is_verified: false,
                created_at: created,
            },
            UserFacts {
                email: "c@studio.io".into(),
                date_of_birth: Some(date(1960, 1, 1)),
                is_verified: true,
                created_at: created + Duration::days(40),
            },
        ];
        let report = summarize_users(&users, date(2024, 6, 15), 5);

        assert_eq!(report.total, 3);
        assert_eq!(report.verified, 2);
        assert_eq!(report.unverified, 1);
        assert_eq!(report.age_groups.len(), AGE_GROUPS.len());
        let unknown = report.age_groups.iter().find(|g| g.label == "unknown").unwrap();
        assert_eq!(unknown.count, 1);
        assert_eq!(report.email_domains[0].label, "gmail.com");
        assert_eq!(report.email_domains[0].count, 2);
        assert_eq!(
            report.signups_by_month,
            vec![
                LabelCount { label: "2024-03".into(), count: 2 },
                LabelCount { label: "2024-04".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn range_defaults_and_validation() {
        let today = date(2024, 6, 30);
        assert_eq!(resolve_range(None, None, today).unwrap(), (date(2024, 6, 1), today));
        assert!(resolve_range(Some(date(2024, 7, 1)), Some(date(2024, 6, 1)), today).is_err());
    }

    #[test]
    fn range_rejects_calendar_extremes() {
        let today = date(2024, 6, 30);
        assert!(resolve_range(None, Some(NaiveDate::MAX), today).is_err());
        assert!(resolve_range(None, Some(NaiveDate::MIN), today).is_err());
        assert!(resolve_range(Some(date(9999, 12, 1)), Some(date(9999, 12, 31)), today).is_ok());
    }

    #[test]
    fn series_stops_at_last_representable_date() {
        assert_eq!(next_bucket(NaiveDate::MAX, Interval::Day), None);
        assert_eq!(next_bucket(NaiveDate::MAX, Interval::Month), None);
        let to = NaiveDate::MAX;
        let from = to - Duration::days(2);
        assert_eq!(booking_series(&[], from, to, Interval::Day).len(), 3);
        assert_eq!(sales_series(&[], from, to).len(), 1);
    }

    #[test]
    fn csv_escapes_fields() {
        let csv = to_csv(
            &["name", "note"],
            &[vec!["Smith, J".to_string(), "said \"hi\"".to_string()]],
        );
        assert_eq!(csv, "name,note\r\n\"Smith, J\",\"said \"\"hi\"\"\"\r\n");
    }

    #[test]
    fn sales_csv_formats_money() {
        let report = SalesReport {
            from: date(2024, 6, 1),
            to: date(2024, 6, 30),
            series: vec![SalesPoint {
                month: date(2024, 6, 1),
                orders: 3,
                revenue_cents: 12_345,
            }],
            total_revenue_cents: 12_345,
            top_products: vec![],
        };
        assert_eq!(sales_report_csv(&report), "month,orders,revenue\r\n2024-06,3,123.45\r\n");
    }
}
