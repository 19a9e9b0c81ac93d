//! Filter / drill-down query compositor.
//!
//! Translates a [`FilterSpec`] into parameterized aggregate SQL against the
//! analytical store. Presence of a primary dimension value pins its
//! predicate and advances the GROUP BY one level down the drill chain
//! (family, major, minor, patch); a secondary level only ever applies when
//! the preceding level is present. Every user-supplied value is a bound
//! parameter — nothing is interpolated into the SQL text.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use duckdb::params_from_iter;
use duckdb::types::Value;

use sitelens_core::filters::{effective, split_levels};
use sitelens_core::period::{self, PeriodRange};
use sitelens_core::FilterSpec;

use crate::analytic::AnalyticStore;
use crate::errors::Result;
use crate::row_types::{AggregateRow, Summary};

/// Aggregate rows are capped at this many groups, except countries (the map
/// wants every country that appears).
const ROW_LIMIT: usize = 20;

/// One queryable dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Browser,
    Os,
    Country,
    Referrer,
    Page,
}

/// Accumulated WHERE clauses plus their bound parameters.
#[derive(Default)]
struct Predicates {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl Predicates {
    fn push(&mut self, clause: &str, param: Value) {
        self.clauses.push(clause.to_string());
        self.params.push(param);
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// Run one dimensional aggregate: `(value, count, drillable)` rows ordered
/// by count descending.
pub fn aggregate(
    store: &AnalyticStore,
    dimension: Dimension,
    filters: &FilterSpec,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<Vec<AggregateRow>> {
    let range = period::resolve(&filters.period, tz, now)?;

    let (sql, params) = match dimension {
        Dimension::Browser => {
            let level = drill_level(
                filters.browser.as_deref(),
                filters.browser_version.as_deref(),
            );
            version_chain_sql(
                &["browser", "browser_major", "browser_minor", "browser_patch"],
                level,
                filters,
                range,
            )
        }
        Dimension::Os => {
            let level = drill_level(filters.os.as_deref(), filters.os_version.as_deref());
            version_chain_sql(
                &["os", "os_major", "os_minor", "os_patch"],
                level,
                filters,
                range,
            )
        }
        Dimension::Referrer => referrer_sql(filters, range),
        Dimension::Country => country_sql(filters, range),
        Dimension::Page => page_sql(filters, range),
    };

    store.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params), |row| {
                Ok(AggregateRow {
                    value: row.get(0)?,
                    count: row.get(1)?,
                    drillable: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Summary metrics over the same predicate set the dimensional queries use.
pub fn summary(
    store: &AnalyticStore,
    filters: &FilterSpec,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<Summary> {
    let range = period::resolve(&filters.period, tz, now)?;
    let preds = session_predicates(filters, range, true);
    let where_sql = preds.where_sql();

    let (sessions, avg_duration, bounce_rate) = store.with_conn(|conn| {
        let row = conn.query_row(
            &format!(
                "SELECT COUNT(*),
                        COALESCE(AVG(session_end - session_start), 0),
                        COALESCE(SUM(CASE WHEN session_end - session_start = 0
                                     THEN 1 ELSE 0 END), 0)
                 FROM sessions{where_sql}"
            ),
            params_from_iter(preds.params.clone()),
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )?;
        Ok(row)
    })?;

    let page_views = count_page_views(store, filters, range)?;

    let bounce_rate = if sessions == 0 {
        0
    } else {
        ((bounce_rate as f64 / sessions as f64) * 100.0).round() as i64
    };

    Ok(Summary {
        sessions,
        page_views,
        avg_session_duration: avg_duration,
        bounce_rate,
    })
}

/// Pageview count over the filtered sessions, optionally narrowed to one
/// exact page.
fn count_page_views(
    store: &AnalyticStore,
    filters: &FilterSpec,
    range: PeriodRange,
) -> Result<i64> {
    let mut preds = session_predicates(filters, range, false);
    preds.push("events.name = ?", Value::Text("pageview".to_string()));
    if let Some(page) = &filters.page {
        preds.push(
            "events.page = ?",
            Value::Text(effective(page).to_string()),
        );
    }
    let where_sql = preds.where_sql();

    store.with_conn(|conn| {
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*)
                 FROM events
                 JOIN sessions ON sessions.id = events.session_id{where_sql}"
            ),
            params_from_iter(preds.params.clone()),
            |row| row.get(0),
        )?;
        Ok(count)
    })
}

/// How many levels of a version chain are pinned: 0 = nothing, 1 = family,
/// 2 = family+major, 3 = family+major+minor. Capped at the patch level.
/// A secondary value without its primary pins nothing.
fn drill_level(primary: Option<&str>, secondary: Option<&str>) -> usize {
    match primary {
        None => 0,
        Some(_) => match secondary {
            None => 1,
            Some(versions) => (1 + versions.split('/').count()).min(3),
        },
    }
}

/// Shared session predicates: period range plus every pinned dimension.
/// `use_page_filter` applies the page filter through an EXISTS over the
/// session's events (used by session-scoped queries; event-scoped queries
/// filter `events.page` directly instead).
fn session_predicates(filters: &FilterSpec, range: PeriodRange, use_page_filter: bool) -> Predicates {
    let mut preds = Predicates::default();
    let text = |v: &str| Value::Text(effective(v).to_string());

    preds.push("sessions.session_start >= ?", Value::BigInt(range.start));
    if let Some(end) = range.end {
        preds.push("sessions.session_start <= ?", Value::BigInt(end));
    }

    if let Some(browser) = &filters.browser {
        preds.push("sessions.browser = ?", text(browser));
        if let Some(version) = &filters.browser_version {
            let levels = split_levels(version);
            let columns = ["browser_major", "browser_minor", "browser_patch"];
            for (column, level) in columns.iter().zip(&levels) {
                preds.push(
                    &format!("sessions.{column} = ?"),
                    Value::Text(level.clone()),
                );
            }
        }
    }

    if let Some(os) = &filters.os {
        preds.push("sessions.os = ?", text(os));
        if let Some(version) = &filters.os_version {
            let levels = split_levels(version);
            let columns = ["os_major", "os_minor", "os_patch"];
            for (column, level) in columns.iter().zip(&levels) {
                preds.push(
                    &format!("sessions.{column} = ?"),
                    Value::Text(level.clone()),
                );
            }
        }
    }

    if let Some(country) = &filters.country {
        preds.push("sessions.country = ?", text(country));
    }

    if let Some(referrer) = &filters.referrer {
        preds.push("sessions.referrer = ?", text(referrer));
        if let Some(path) = &filters.referrer_path {
            preds.push("sessions.referrer_full_path = ?", text(path));
        }
    }

    if use_page_filter {
        if let Some(page) = &filters.page {
            preds.push(
                "EXISTS (SELECT 1 FROM events
                         WHERE events.session_id = sessions.id AND events.page = ?)",
                text(page),
            );
        }
    }

    preds
}

/// Aggregate SQL for a browser/OS version chain at the given drill level.
fn version_chain_sql(
    columns: &[&str; 4],
    level: usize,
    filters: &FilterSpec,
    range: PeriodRange,
) -> (String, Vec<Value>) {
    let value_col = columns[level];
    let drill_expr = if level + 1 < columns.len() {
        let next = columns[level + 1];
        format!("SUM(CASE WHEN sessions.{next} <> '' AND sessions.{next} <> '0' THEN 1 ELSE 0 END)")
    } else {
        "0".to_string()
    };

    let preds = session_predicates(filters, range, true);
    let where_sql = preds.where_sql();
    let sql = format!(
        "SELECT sessions.{value_col} AS value, COUNT(*) AS count, {drill_expr} AS drillable
         FROM sessions{where_sql}
         GROUP BY sessions.{value_col}
         ORDER BY count DESC
         LIMIT {ROW_LIMIT}"
    );
    (sql, preds.params)
}

/// Referrer chain: domain, then full path. Two levels only.
fn referrer_sql(filters: &FilterSpec, range: PeriodRange) -> (String, Vec<Value>) {
    let (value_col, drill_expr) = if filters.referrer.is_some() {
        ("referrer_full_path", "0".to_string())
    } else {
        (
            "referrer",
            "SUM(CASE WHEN sessions.referrer_full_path <> '' THEN 1 ELSE 0 END)".to_string(),
        )
    };

    let preds = session_predicates(filters, range, true);
    let where_sql = preds.where_sql();
    let sql = format!(
        "SELECT sessions.{value_col} AS value, COUNT(*) AS count, {drill_expr} AS drillable
         FROM sessions{where_sql}
         GROUP BY sessions.{value_col}
         ORDER BY count DESC
         LIMIT {ROW_LIMIT}"
    );
    (sql, preds.params)
}

/// Countries are flat and uncapped — the dashboard map wants every country
/// that appears, not just the top rows.
fn country_sql(filters: &FilterSpec, range: PeriodRange) -> (String, Vec<Value>) {
    let preds = session_predicates(filters, range, true);
    let where_sql = preds.where_sql();
    let sql = format!(
        "SELECT sessions.country AS value, COUNT(*) AS count, 0 AS drillable
         FROM sessions{where_sql}
         GROUP BY sessions.country
         ORDER BY count DESC"
    );
    (sql, preds.params)
}

/// Pages aggregate over pageview events joined to their filtered sessions.
fn page_sql(filters: &FilterSpec, range: PeriodRange) -> (String, Vec<Value>) {
    let mut preds = session_predicates(filters, range, false);
    preds.push("events.name = ?", Value::Text("pageview".to_string()));
    if let Some(page) = &filters.page {
        preds.push(
            "events.page = ?",
            Value::Text(effective(page).to_string()),
        );
    }
    let where_sql = preds.where_sql();
    let sql = format!(
        "SELECT events.page AS value, COUNT(*) AS count, 0 AS drillable
         FROM events
         JOIN sessions ON sessions.id = events.session_id{where_sql}
         GROUP BY events.page
         ORDER BY count DESC
         LIMIT {ROW_LIMIT}"
    );
    (sql, preds.params)
}
