use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Row, Rows, Value, params, params_from_iter};
use probe::types::{OutcomeFilter, Tuple};
use probe::{
    ActivityKind, ActivityLogEntry, BlobState, Monitor, MonitorStatus, MonitorStore, ResultFilter,
    ResultPage, ResultRecord, ResultRow, ResultStore, ResultView, StorageError,
};

use super::models::{
    ACTIVITY_COLUMNS, LastResult, MONITOR_COLUMNS, MonitorList, RESULT_COLUMNS, activity_from_row,
    db_error, monitor_from_row, record_from_row, to_json, to_millis,
};
use crate::pool::{LibsqlManager, LibsqlPool};

/// Monitor tuple lists that can be replaced on their own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleColumn {
    Env,
    Variables,
}

impl TupleColumn {
    fn column(&self) -> &'static str {
        match self {
            TupleColumn::Env => "env",
            TupleColumn::Variables => "variables",
        }
    }
}

/// Monitor removed together with the ids of its results
#[derive(Debug, Clone)]
pub struct DeletedMonitor {
    pub monitor: Monitor,
    pub result_ids: Vec<String>,
}

/// libsql backed persistence. Every query is scoped by account except
/// [`MonitorStore::active_monitors`], which feeds the scheduler.
pub struct Repository {
    pool: LibsqlPool,
}

async fn collect<T>(
    mut rows: Rows,
    map: impl Fn(&Row) -> Result<T, StorageError>,
) -> Result<Vec<T>, StorageError> {
    let mut items = Vec::new();
    while let Some(row) = rows.next().await.map_err(db_error)? {
        items.push(map(&row)?);
    }
    Ok(items)
}

async fn first<T>(
    rows: Rows,
    map: impl Fn(&Row) -> Result<T, StorageError>,
) -> Result<Option<T>, StorageError> {
    Ok(collect(rows, map).await?.into_iter().next())
}

async fn count(rows: Rows) -> Result<u64, StorageError> {
    let counted = first(rows, |row| row.get::<i64>(0).map_err(db_error)).await?;
    Ok(counted.unwrap_or(0) as u64)
}

async fn find_monitor_on(
    conn: &Connection,
    account: &str,
    monitor_id: &str,
) -> Result<Option<Monitor>, StorageError> {
    let rows = conn
        .query(
            &format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE id = ? AND account_id = ?"),
            params![monitor_id, account],
        )
        .await
        .map_err(db_error)?;
    first(rows, monitor_from_row).await
}

async fn insert_activity_on(conn: &Connection, entry: &ActivityLogEntry) -> Result<(), StorageError> {
    conn.execute(
        &format!("INSERT INTO activity_log ({ACTIVITY_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"),
        params![
            entry.id.as_str(),
            entry.account_id.as_str(),
            entry.monitor_id.as_str(),
            entry.kind.as_str(),
            to_json(&entry.data)?,
            to_millis(entry.created_at)
        ],
    )
    .await
    .map_err(db_error)?;
    Ok(())
}

fn monitor_values(monitor: &Monitor) -> Result<Vec<Value>, StorageError> {
    Ok(vec![
        Value::Text(monitor.name.clone()),
        Value::Text(monitor.method.clone()),
        Value::Text(monitor.url.clone()),
        Value::Text(to_json(&monitor.headers)?),
        Value::Text(to_json(&monitor.query_params)?),
        monitor.body.clone().map(Value::Text).unwrap_or(Value::Null),
        Value::Text(to_json(&monitor.variables)?),
        Value::Text(to_json(&monitor.env)?),
        Value::Text(to_json(&monitor.assertions)?),
        Value::Integer(monitor.frequency as i64),
        monitor.timeout_ms.map(|ms| Value::Integer(ms as i64)).unwrap_or(Value::Null),
        Value::Text(monitor.status.as_str().to_string()),
        Value::Text(to_json(&monitor.locations)?),
        Value::Integer(to_millis(monitor.updated_at)),
    ])
}

/// WHERE clause and bound values for a result filter
fn result_conditions(account: &str, filter: &ResultFilter) -> (String, Vec<Value>) {
    let mut clauses = vec!["account_id = ?".to_string()];
    let mut values = vec![Value::Text(account.to_string())];

    if let Some(monitor_id) = &filter.monitor_id {
        clauses.push("monitor_id = ?".into());
        values.push(Value::Text(monitor_id.clone()));
    }
    if let Some(start) = filter.start {
        clauses.push("created_at >= ?".into());
        values.push(Value::Integer(to_millis(start)));
    }
    if let Some(end) = filter.end {
        clauses.push("created_at < ?".into());
        values.push(Value::Integer(to_millis(end)));
    }
    match filter.outcome {
        Some(OutcomeFilter::Ok) => clauses.push("err = ''".into()),
        Some(OutcomeFilter::Err) => clauses.push("err <> ''".into()),
        None => {}
    }
    if !filter.locations.is_empty() {
        let placeholders = vec!["?"; filter.locations.len()].join(", ");
        clauses.push(format!("location IN ({placeholders})"));
        values.extend(filter.locations.iter().cloned().map(Value::Text));
    }

    (clauses.join(" AND "), values)
}

impl Repository {
    pub fn new(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<deadpool::managed::Object<LibsqlManager>, StorageError> {
        self.pool.get().await.map_err(StorageError::structured)
    }

    /// Insert a monitor and its creation activity atomically
    pub async fn create_monitor(&self, monitor: &Monitor) -> Result<(), StorageError> {
        let conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(db_error)?;

        let mut values = vec![Value::Text(monitor.id.clone()), Value::Text(monitor.account_id.clone())];
        values.extend(monitor_values(monitor)?);
        values.push(Value::Integer(to_millis(monitor.created_at)));
        tx.execute(
            "INSERT INTO monitors (id, account_id, name, method, url, headers, query_params, body, \
             variables, env, assertions, frequency, timeout_ms, status, locations, updated_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params_from_iter(values),
        )
        .await
        .map_err(db_error)?;

        let activity = ActivityLogEntry::new(
            &monitor.account_id,
            &monitor.id,
            &monitor.name,
            ActivityKind::MonitorCreated,
        );
        insert_activity_on(&tx, &activity).await?;

        tx.commit().await.map_err(db_error)
    }

    /// Replace a monitor's definition.
    ///
    /// A status change is logged as `MONITOR_UP` or `MONITOR_PAUSED` in the
    /// same transaction. Returns `None` when the monitor does not exist.
    pub async fn update_monitor(
        &self,
        account: &str,
        monitor: &Monitor,
    ) -> Result<Option<Monitor>, StorageError> {
        let conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(db_error)?;

        let Some(original) = find_monitor_on(&tx, account, &monitor.id).await? else {
            return Ok(None);
        };

        let mut values = monitor_values(monitor)?;
        values.push(Value::Text(monitor.id.clone()));
        values.push(Value::Text(account.to_string()));
        tx.execute(
            "UPDATE monitors SET name = ?, method = ?, url = ?, headers = ?, query_params = ?, \
             body = ?, variables = ?, env = ?, assertions = ?, frequency = ?, timeout_ms = ?, \
             status = ?, locations = ?, updated_at = ? WHERE id = ? AND account_id = ?",
            params_from_iter(values),
        )
        .await
        .map_err(db_error)?;

        if original.status != monitor.status {
            let kind = match monitor.status {
                MonitorStatus::Active => ActivityKind::MonitorUp,
                MonitorStatus::Paused => ActivityKind::MonitorPaused,
            };
            let activity = ActivityLogEntry::new(account, &monitor.id, &monitor.name, kind);
            insert_activity_on(&tx, &activity).await?;
        }

        let updated = find_monitor_on(&tx, account, &monitor.id).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(updated)
    }

    /// Delete a monitor and, by cascade, its results.
    ///
    /// Returns the removed monitor with the ids of the deleted results so
    /// their payloads can be purged.
    pub async fn delete_monitor(
        &self,
        account: &str,
        monitor_id: &str,
    ) -> Result<Option<DeletedMonitor>, StorageError> {
        let conn = self.conn().await?;
        let tx = conn.transaction().await.map_err(db_error)?;

        let Some(monitor) = find_monitor_on(&tx, account, monitor_id).await? else {
            return Ok(None);
        };

        let activity =
            ActivityLogEntry::new(account, monitor_id, &monitor.name, ActivityKind::MonitorRemoved);
        insert_activity_on(&tx, &activity).await?;

        let rows = tx
            .query(
                "SELECT id FROM monitor_results WHERE monitor_id = ? AND account_id = ?",
                params![monitor_id, account],
            )
            .await
            .map_err(db_error)?;
        let result_ids = collect(rows, |row| row.get::<String>(0).map_err(db_error)).await?;

        tx.execute("DELETE FROM monitors WHERE id = ? AND account_id = ?", params![monitor_id, account])
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(Some(DeletedMonitor { monitor, result_ids }))
    }

    pub async fn list_monitors(&self, account: &str) -> Result<MonitorList, StorageError> {
        let conn = self.conn().await?;

        let total = count(
            conn.query("SELECT COUNT(*) FROM monitors WHERE account_id = ?", params![account])
                .await
                .map_err(db_error)?,
        )
        .await?;

        let rows = conn
            .query(
                &format!(
                    "SELECT {MONITOR_COLUMNS} FROM monitors WHERE account_id = ? ORDER BY created_at DESC"
                ),
                params![account],
            )
            .await
            .map_err(db_error)?;
        let items = collect(rows, monitor_from_row).await?;

        Ok(MonitorList { total, items })
    }

    /// Replace the env or variables list; `false` when no monitor matched
    pub async fn set_tuples(
        &self,
        account: &str,
        monitor_id: &str,
        column: TupleColumn,
        tuples: &[Tuple],
    ) -> Result<bool, StorageError> {
        let conn = self.conn().await?;
        let updated = conn
            .execute(
                &format!(
                    "UPDATE monitors SET {} = ?, updated_at = ? WHERE id = ? AND account_id = ?",
                    column.column()
                ),
                params![to_json(tuples)?, to_millis(Utc::now()), monitor_id, account],
            )
            .await
            .map_err(db_error)?;
        Ok(updated > 0)
    }

    /// `(total_time, failed)` for every result of a monitor in `(start, end]`
    pub async fn result_samples(
        &self,
        account: &str,
        monitor_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        locations: &[String],
    ) -> Result<Vec<(f64, bool)>, StorageError> {
        let mut sql = "SELECT total_time, err FROM monitor_results \
                       WHERE account_id = ? AND monitor_id = ? AND created_at > ? AND created_at <= ?"
            .to_string();
        let mut values = vec![
            Value::Text(account.to_string()),
            Value::Text(monitor_id.to_string()),
            Value::Integer(to_millis(start)),
            Value::Integer(to_millis(end)),
        ];
        if !locations.is_empty() {
            sql.push_str(&format!(" AND location IN ({})", vec!["?"; locations.len()].join(", ")));
            values.extend(locations.iter().cloned().map(Value::Text));
        }

        let conn = self.conn().await?;
        let rows = conn.query(&sql, params_from_iter(values)).await.map_err(db_error)?;
        collect(rows, |row| {
            let total: f64 = row.get(0).map_err(db_error)?;
            let err: String = row.get(1).map_err(db_error)?;
            Ok((total, !err.is_empty()))
        })
        .await
    }

    /// Most recent results of a monitor, newest first
    pub async fn latest_results(
        &self,
        account: &str,
        monitor_id: &str,
        limit: u32,
    ) -> Result<Vec<LastResult>, StorageError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT id, err, total_time FROM monitor_results \
                 WHERE account_id = ? AND monitor_id = ? ORDER BY created_at DESC LIMIT ?",
                params![account, monitor_id, limit as i64],
            )
            .await
            .map_err(db_error)?;
        collect(rows, |row| {
            Ok(LastResult {
                id: row.get(0).map_err(db_error)?,
                err: row.get(1).map_err(db_error)?,
                total_time: row.get(2).map_err(db_error)?,
            })
        })
        .await
    }

    /// Activity log of an account, newest first
    pub async fn list_activity(
        &self,
        account: &str,
        monitor_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>, StorageError> {
        let conn = self.conn().await?;
        let rows = match monitor_id {
            Some(monitor_id) => {
                conn.query(
                    &format!(
                        "SELECT {ACTIVITY_COLUMNS} FROM activity_log WHERE account_id = ? AND monitor_id = ? \
                         ORDER BY created_at DESC LIMIT ?"
                    ),
                    params![account, monitor_id, limit as i64],
                )
                .await
            }
            None => {
                conn.query(
                    &format!(
                        "SELECT {ACTIVITY_COLUMNS} FROM activity_log WHERE account_id = ? \
                         ORDER BY created_at DESC LIMIT ?"
                    ),
                    params![account, limit as i64],
                )
                .await
            }
        }
        .map_err(db_error)?;
        collect(rows, activity_from_row).await
    }
}

#[async_trait]
impl MonitorStore for Repository {
    async fn find_monitor(
        &self,
        account: &str,
        monitor_id: &str,
    ) -> Result<Option<Monitor>, StorageError> {
        let conn = self.conn().await?;
        find_monitor_on(&conn, account, monitor_id).await
    }

    async fn active_monitors(&self) -> Result<Vec<Monitor>, StorageError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(&format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE status = 'active'"), ())
            .await
            .map_err(db_error)?;
        collect(rows, monitor_from_row).await
    }
}

#[async_trait]
impl ResultStore for Repository {
    async fn insert_result(&self, account: &str, record: &ResultRecord) -> Result<(), StorageError> {
        let timings = &record.timings;
        let values = vec![
            Value::Text(record.id.clone()),
            Value::Text(record.monitor_id.clone()),
            Value::Text(account.to_string()),
            Value::Text(record.mode.as_str().to_string()),
            Value::Integer(to_millis(record.created_at)),
            Value::Text(record.url.clone()),
            Value::Text(record.method.clone()),
            Value::Text(record.protocol.clone()),
            Value::Text(record.ip.clone()),
            Value::Text(record.location.clone()),
            record.code.map(|code| Value::Integer(code.into())).unwrap_or(Value::Null),
            Value::Text(record.err.clone()),
            Value::Real(timings.wait),
            Value::Real(timings.dns),
            Value::Real(timings.tcp),
            Value::Real(timings.tls),
            Value::Real(timings.upload),
            Value::Real(timings.ttfb),
            Value::Real(timings.download),
            Value::Real(timings.total),
            Value::Text(to_json(&record.assert_results)?),
            Value::Text(record.blobs.as_str().to_string()),
        ];

        let conn = self.conn().await?;
        conn.execute(
            &format!(
                "INSERT INTO monitor_results ({RESULT_COLUMNS}) VALUES \
                 (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params_from_iter(values),
        )
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn set_blob_state(
        &self,
        account: &str,
        result_id: &str,
        state: BlobState,
    ) -> Result<(), StorageError> {
        let conn = self.conn().await?;
        let updated = conn
            .execute(
                "UPDATE monitor_results SET blobs = ? WHERE id = ? AND account_id = ?",
                params![state.as_str(), result_id, account],
            )
            .await
            .map_err(db_error)?;

        if updated == 0 {
            return Err(StorageError::NotFound(result_id.to_string()));
        }
        Ok(())
    }

    async fn find_result(
        &self,
        account: &str,
        result_id: &str,
    ) -> Result<Option<ResultRecord>, StorageError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                &format!("SELECT {RESULT_COLUMNS} FROM monitor_results WHERE id = ? AND account_id = ?"),
                params![result_id, account],
            )
            .await
            .map_err(db_error)?;
        first(rows, record_from_row).await
    }

    async fn query_results(
        &self,
        account: &str,
        filter: &ResultFilter,
    ) -> Result<ResultPage, StorageError> {
        let (conditions, values) = result_conditions(account, filter);
        let conn = self.conn().await?;

        let mut page_values = values.clone();
        page_values.push(Value::Integer(filter.limit.map(i64::from).unwrap_or(-1)));
        page_values.push(Value::Integer(filter.offset.into()));
        let rows = conn
            .query(
                &format!(
                    "SELECT {RESULT_COLUMNS} FROM monitor_results WHERE {conditions} \
                     ORDER BY created_at DESC LIMIT ? OFFSET ?"
                ),
                params_from_iter(page_values),
            )
            .await
            .map_err(db_error)?;
        let records = collect(rows, record_from_row).await?;

        let items = records
            .into_iter()
            .map(|record| match filter.view {
                ResultView::Summary => ResultRow::Summary((&record).into()),
                ResultView::Detail => ResultRow::Detail(Box::new(record)),
            })
            .collect();

        let total_item_count = if filter.with_totals {
            let rows = conn
                .query(
                    &format!("SELECT COUNT(*) FROM monitor_results WHERE {conditions}"),
                    params_from_iter(values),
                )
                .await
                .map_err(db_error)?;
            Some(count(rows).await?)
        } else {
            None
        };

        Ok(ResultPage { items, total_item_count })
    }
}
