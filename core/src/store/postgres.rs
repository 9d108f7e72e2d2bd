// tidemark/src/store/postgres.rs

//! PostgreSQL backend.
//!
//! Rows cross the wire as `jsonb`: reads use `to_jsonb(t)`, writes go
//! through `jsonb_populate_record`, so no per-table Rust SQL is needed.
//! The change feed is a row trigger calling `pg_notify` on
//! [`CHANGE_CHANNEL`], consumed with one `PgListener` per subscription.
//! Blobs are written under a local directory served at a public base URL.
//!
//! The access policy is the same `Schema` the in-process backend enforces,
//! checked here before each statement; unique keys are real unique indexes.

use crate::error::{SyncError, SyncResult};
use crate::store::change::{ChangeEvent, ChangeStream};
use crate::store::query::{is_identifier, Filter, Merge, Predicate, Query, Row, Upsert};
use crate::store::schema::{Principal, ReadScope, Schema, StoreKeys, TableSchema};
use crate::store::{sanitize_patch, stamp_new_row, Connector, RemoteStore};

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgListener, PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{event, instrument, Level};
use uuid::Uuid;

/// `LISTEN` channel the row triggers notify on.
pub const CHANGE_CHANNEL: &str = "tidemark_changes";

const NOTIFY_FUNCTION_SQL: &str = r#"
CREATE OR REPLACE FUNCTION tidemark_notify() RETURNS trigger AS $$
BEGIN
  PERFORM pg_notify(
    'tidemark_changes',
    json_build_object(
      'table', TG_TABLE_NAME,
      'op', lower(TG_OP),
      'row', CASE WHEN TG_OP = 'DELETE' THEN to_jsonb(OLD) ELSE to_jsonb(NEW) END
    )::text
  );
  RETURN NULL;
END;
$$ LANGUAGE plpgsql;
"#;

struct PgBackend {
  pool: PgPool,
  schema: Schema,
  keys: StoreKeys,
  blob_root: PathBuf,
  public_base: String,
}

#[derive(Clone)]
pub struct PgStore {
  inner: Arc<PgBackend>,
}

impl PgStore {
  pub async fn connect(
    database_url: &str,
    schema: Schema,
    keys: StoreKeys,
    blob_root: impl Into<PathBuf>,
    public_base: impl Into<String>,
  ) -> SyncResult<Self> {
    let pool = PgPoolOptions::new().max_connections(8).connect(database_url).await?;
    event!(Level::INFO, "Connected to PostgreSQL.");
    Ok(Self::from_pool(pool, schema, keys, blob_root, public_base))
  }

  pub fn from_pool(
    pool: PgPool,
    schema: Schema,
    keys: StoreKeys,
    blob_root: impl Into<PathBuf>,
    public_base: impl Into<String>,
  ) -> Self {
    Self {
      inner: Arc::new(PgBackend {
        pool,
        schema,
        keys,
        blob_root: blob_root.into(),
        public_base: public_base.into().trim_end_matches('/').to_string(),
      }),
    }
  }

  pub fn pool(&self) -> &PgPool {
    &self.inner.pool
  }

  pub fn client(&self, principal: Principal) -> PgClient {
    PgClient {
      backend: self.inner.clone(),
      principal,
    }
  }

  /// Runs a (multi-statement) schema script such as the application's table definitions.
  pub async fn run_script(&self, sql: &str) -> SyncResult<()> {
    sqlx::raw_sql(sql).execute(&self.inner.pool).await?;
    Ok(())
  }

  /// Installs the notify function and one row trigger per declared table.
  #[instrument(name = "PgStore::install_change_feed", skip_all, err(Display))]
  pub async fn install_change_feed(&self) -> SyncResult<()> {
    sqlx::raw_sql(NOTIFY_FUNCTION_SQL).execute(&self.inner.pool).await?;
    for table in self.inner.schema.tables() {
      let name = checked(table.name)?;
      let sql = format!(
        "DROP TRIGGER IF EXISTS tidemark_feed ON {name};
         CREATE TRIGGER tidemark_feed AFTER INSERT OR UPDATE OR DELETE ON {name}
         FOR EACH ROW EXECUTE FUNCTION tidemark_notify();"
      );
      sqlx::raw_sql(&sql).execute(&self.inner.pool).await?;
      event!(Level::DEBUG, table = name, "Change feed trigger installed.");
    }
    Ok(())
  }
}

impl Connector for PgStore {
  fn connect(&self, key: &str, user: Option<Uuid>) -> SyncResult<Arc<dyn RemoteStore>> {
    let principal = self.inner.keys.principal_for(key, user)?;
    Ok(Arc::new(self.client(principal)))
  }
}

fn checked(name: &str) -> SyncResult<&str> {
  if is_identifier(name) {
    Ok(name)
  } else {
    Err(SyncError::Internal(format!("'{}' is not a plain SQL identifier", name)))
  }
}

/// SQL `WHERE` fragment for `filter` over alias `t`, with its jsonb parameters
/// numbered from `first`.
fn where_clause(filter: &Filter, first: usize) -> SyncResult<(String, Vec<Value>)> {
  let mut clauses = Vec::new();
  let mut params = Vec::new();
  let mut containment = Map::new();
  for predicate in filter.predicates() {
    match predicate {
      Predicate::Eq(col, value) => {
        containment.insert(checked(col)?.to_string(), value.clone());
      }
      Predicate::In(col, values) => {
        params.push(Value::Array(values.clone()));
        clauses.push(format!("${}::jsonb @> (to_jsonb(t) -> '{}')", first + params.len() - 1, checked(col)?));
      }
    }
  }
  if !containment.is_empty() {
    params.push(Value::Object(containment));
    clauses.push(format!("to_jsonb(t) @> ${}::jsonb", first + params.len() - 1));
  }
  if clauses.is_empty() {
    clauses.push("TRUE".to_string());
  }
  Ok((clauses.join(" AND "), params))
}

fn decode(table: &str, row: &PgRow) -> SyncResult<Row> {
  let Json(value): Json<Value> = row.try_get("row")?;
  match value {
    Value::Object(map) => Ok(map),
    other => Err(SyncError::Internal(format!("'{}' returned a non-object row: {}", table, other))),
  }
}

#[derive(Clone)]
pub struct PgClient {
  backend: Arc<PgBackend>,
  principal: Principal,
}

impl PgClient {
  async fn is_admin(&self) -> SyncResult<bool> {
    let (Principal::User(user), Some(roles)) = (self.principal, self.backend.schema.role_source()) else {
      return Ok(false);
    };
    let sql = format!(
      "SELECT EXISTS (SELECT 1 FROM {} WHERE {}::text = $1 AND {}::text = $2)",
      checked(roles.table)?,
      checked(roles.user_column)?,
      checked(roles.role_column)?
    );
    let admin: bool = sqlx::query_scalar(&sql)
      .bind(user.to_string())
      .bind(roles.admin_value)
      .fetch_one(&self.backend.pool)
      .await?;
    Ok(admin)
  }

  async fn scope(&self, table: &TableSchema) -> SyncResult<ReadScope> {
    let is_admin = self.is_admin().await?;
    match self.backend.schema.read_scope(table, self.principal, is_admin) {
      ReadScope::Denied => Err(SyncError::Unauthorized(format!(
        "{:?} may not read '{}'",
        self.principal, table.name
      ))),
      scope => Ok(scope),
    }
  }

  async fn check_write(&self, table: &TableSchema, row: &Row) -> SyncResult<()> {
    let is_admin = self.is_admin().await?;
    self.backend.schema.check_write(table, self.principal, is_admin, row)
  }

  /// Locks and returns the visible row with `id` inside `tx`.
  async fn lock_visible(
    &self,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    table: &TableSchema,
    id: Uuid,
  ) -> SyncResult<Row> {
    let scope = self.scope(table).await?;
    let (clause, params) = where_clause(&scope.narrow(Filter::all()), 2)?;
    let sql = format!(
      "SELECT to_jsonb(t) AS row FROM {} AS t WHERE t.id = $1 AND {} FOR UPDATE",
      checked(table.name)?,
      clause
    );
    let mut query = sqlx::query(&sql).bind(id);
    for p in params {
      query = query.bind(Json(p));
    }
    let found = query.fetch_optional(&mut **tx).await?;
    match found {
      Some(row) => decode(table.name, &row),
      None => Err(SyncError::not_found(table.name, format!("no row with id {}", id))),
    }
  }
}

#[async_trait]
impl RemoteStore for PgClient {
  fn principal(&self) -> Principal {
    self.principal
  }

  #[instrument(name = "PgClient::fetch", skip_all, fields(table = table), err(Display))]
  async fn fetch(&self, table: &str, query: &Query) -> SyncResult<Vec<Row>> {
    let schema = self.backend.schema.get(table)?;
    let scope = self.scope(schema).await?;
    let (clause, params) = where_clause(&scope.narrow(query.filter.clone()), 1)?;
    let order = match &query.order {
      Some(o) => format!(" ORDER BY t.{} {}", checked(o.column)?, if o.ascending { "ASC" } else { "DESC" }),
      None => String::new(),
    };
    let sql = format!(
      "SELECT to_jsonb(t) AS row FROM {} AS t WHERE {}{}",
      checked(schema.name)?,
      clause,
      order
    );
    let mut q = sqlx::query(&sql);
    for p in params {
      q = q.bind(Json(p));
    }
    let rows = q.fetch_all(&self.backend.pool).await?;
    rows.iter().map(|r| decode(table, r)).collect()
  }

  #[instrument(name = "PgClient::insert", skip_all, fields(table = table), err(Display))]
  async fn insert(&self, table: &str, mut row: Row) -> SyncResult<Row> {
    let schema = self.backend.schema.get(table)?;
    self.check_write(schema, &row).await?;
    stamp_new_row(&mut row, chrono::Utc::now());
    let name = checked(schema.name)?;
    let sql = format!(
      "INSERT INTO {name} AS t SELECT * FROM jsonb_populate_record(NULL::{name}, $1::jsonb) RETURNING to_jsonb(t) AS row"
    );
    let inserted = sqlx::query(&sql)
      .bind(Json(Value::Object(row)))
      .fetch_one(&self.backend.pool)
      .await?;
    decode(table, &inserted)
  }

  #[instrument(name = "PgClient::update", skip(self, patch), fields(table = table), err(Display))]
  async fn update(&self, table: &str, id: Uuid, mut patch: Row) -> SyncResult<Row> {
    sanitize_patch(&mut patch);
    let schema = self.backend.schema.get(table)?;
    let name = checked(schema.name)?;
    let mut tx = self.backend.pool.begin().await?;
    let stored = self.lock_visible(&mut tx, schema, id).await?;
    self.check_write(schema, &stored).await?;
    let mut merged = stored.clone();
    merged.extend(patch.clone());
    self.check_write(schema, &merged).await?;
    if patch.is_empty() {
      tx.commit().await?;
      return Ok(stored);
    }

    let assignments = patch
      .keys()
      .map(|col| checked(col).map(|c| format!("{c} = p.{c}")))
      .collect::<SyncResult<Vec<_>>>()?
      .join(", ");
    let sql = format!(
      "UPDATE {name} AS t SET {assignments} FROM jsonb_populate_record(NULL::{name}, $2::jsonb) AS p \
       WHERE t.id = $1 RETURNING to_jsonb(t) AS row"
    );
    let updated = sqlx::query(&sql)
      .bind(id)
      .bind(Json(Value::Object(patch)))
      .fetch_one(&mut *tx)
      .await?;
    tx.commit().await?;
    decode(table, &updated)
  }

  #[instrument(name = "PgClient::delete", skip(self), fields(table = table), err(Display))]
  async fn delete(&self, table: &str, id: Uuid) -> SyncResult<()> {
    let schema = self.backend.schema.get(table)?;
    let mut tx = self.backend.pool.begin().await?;
    let stored = self.lock_visible(&mut tx, schema, id).await?;
    self.check_write(schema, &stored).await?;
    let sql = format!("DELETE FROM {} WHERE id = $1", checked(schema.name)?);
    sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(())
  }

  #[instrument(name = "PgClient::upsert", skip(self, row), fields(table = table), err(Display))]
  async fn upsert(&self, table: &str, mut row: Row, upsert: &Upsert) -> SyncResult<Row> {
    let schema = self.backend.schema.get(table)?;
    if schema.find_key(&upsert.conflict).is_none() {
      return Err(SyncError::Internal(format!(
        "no unique key ({}) declared on '{}'",
        upsert.conflict.join(", "),
        table
      )));
    }
    self.check_write(schema, &row).await?;
    stamp_new_row(&mut row, chrono::Utc::now());

    let conflict = upsert
      .conflict
      .iter()
      .map(|c| checked(c))
      .collect::<SyncResult<Vec<_>>>()?;
    let keep = format!("{c} = t.{c}", c = conflict.first().copied().unwrap_or("id"));
    let assignments = match &upsert.merge {
      Merge::Keep => keep,
      Merge::Increment(col) => {
        let c = checked(col)?;
        format!("{c} = t.{c} + EXCLUDED.{c}")
      }
      Merge::Replace => {
        let cols = row
          .keys()
          .filter(|c| !matches!(c.as_str(), "id" | "created_at") && !conflict.contains(&c.as_str()))
          .map(|c| checked(c).map(|c| format!("{c} = EXCLUDED.{c}")))
          .collect::<SyncResult<Vec<_>>>()?;
        if cols.is_empty() {
          keep
        } else {
          cols.join(", ")
        }
      }
    };
    let name = checked(schema.name)?;
    let sql = format!(
      "INSERT INTO {name} AS t SELECT * FROM jsonb_populate_record(NULL::{name}, $1::jsonb) \
       ON CONFLICT ({}) DO UPDATE SET {assignments} RETURNING to_jsonb(t) AS row",
      conflict.join(", ")
    );
    let stored = sqlx::query(&sql)
      .bind(Json(Value::Object(row)))
      .fetch_one(&self.backend.pool)
      .await?;
    decode(table, &stored)
  }

  #[instrument(name = "PgClient::subscribe", skip_all, fields(table = table), err(Display))]
  async fn subscribe(&self, table: &str, filter: Filter) -> SyncResult<ChangeStream> {
    let schema = self.backend.schema.get(table)?;
    let scope = self.scope(schema).await?;
    let mut listener = PgListener::connect_with(&self.backend.pool).await?;
    listener.listen(CHANGE_CHANNEL).await?;

    let (tx, stream) = ChangeStream::channel(schema.name);
    let table_name = schema.name;
    tokio::spawn(async move {
      loop {
        tokio::select! {
          _ = tx.closed() => break,
          received = listener.recv() => match received {
            Ok(notification) => {
              let change: ChangeEvent = match serde_json::from_str(notification.payload()) {
                Ok(change) => change,
                Err(e) => {
                  event!(Level::WARN, table = table_name, error = %e, "Dropping malformed change notification.");
                  continue;
                }
              };
              if change.table != table_name || !scope.admits(&change.row) || !filter.matches(&change.row) {
                continue;
              }
              if tx.send(change).await.is_err() {
                break;
              }
            }
            Err(e) => {
              event!(Level::WARN, table = table_name, error = %e, "Change listener failed; subscription closed.");
              break;
            }
          }
        }
      }
    });
    Ok(stream)
  }

  #[instrument(name = "PgClient::upload_blob", skip(self, bytes), fields(size = bytes.len()), err(Display))]
  async fn upload_blob(&self, bucket: &str, path: &str, bytes: Vec<u8>, content_type: &str) -> SyncResult<String> {
    if self.principal == Principal::Anonymous {
      return Err(SyncError::Unauthorized("anonymous uploads are not allowed".to_string()));
    }
    if bucket.is_empty() || path.is_empty() || path.contains("..") || path.starts_with('/') {
      return Err(SyncError::Internal(format!("invalid blob location '{}/{}'", bucket, path)));
    }
    let target = self.backend.blob_root.join(bucket).join(path);
    if let Some(dir) = target.parent() {
      tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| SyncError::Unavailable(format!("blob directory: {}", e)))?;
    }
    tokio::fs::write(&target, bytes)
      .await
      .map_err(|e| SyncError::Unavailable(format!("blob write: {}", e)))?;
    event!(Level::DEBUG, content_type, path = %target.display(), "Blob stored.");
    Ok(format!("{}/{}/{}", self.backend.public_base, bucket, path))
  }
}
