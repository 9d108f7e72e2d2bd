// tidemark/src/store/schema.rs

//! Table declarations and the row-level access policy every backend enforces.
//!
//! A backend consults the [`Schema`] on each call: which rows the acting
//! [`Principal`] may see, whether it may write, and which unique keys a
//! write must not duplicate.

use crate::error::{SyncError, SyncResult};
use crate::store::query::{Filter, Row};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Who is issuing a store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Principal {
  Anonymous,
  User(Uuid),
  /// Service-key holder. Bypasses row scoping; reserved for administrative cross-user reads.
  Elevated,
}

impl Principal {
  pub fn user_id(&self) -> Option<Uuid> {
    match self {
      Principal::User(id) => Some(*id),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  /// Readable by anyone; writable by admins.
  Catalog,
  /// Each row belongs to the user named in the owner column; admins see every row.
  Owned,
  /// Only the elevated tier may touch it.
  Restricted,
}

#[derive(Debug, Clone)]
pub struct TableSchema {
  pub name: &'static str,
  pub access: Access,
  pub owner_column: Option<&'static str>,
  pub unique_keys: Vec<Vec<&'static str>>,
  /// Columns a non-admin user may only leave unset or set to the given value.
  pub guards: Vec<(&'static str, Value)>,
}

impl TableSchema {
  pub fn catalog(name: &'static str) -> Self {
    Self {
      name,
      access: Access::Catalog,
      owner_column: None,
      unique_keys: Vec::new(),
      guards: Vec::new(),
    }
  }

  pub fn owned(name: &'static str, owner_column: &'static str) -> Self {
    Self {
      name,
      access: Access::Owned,
      owner_column: Some(owner_column),
      unique_keys: Vec::new(),
      guards: Vec::new(),
    }
  }

  pub fn restricted(name: &'static str) -> Self {
    Self {
      name,
      access: Access::Restricted,
      owner_column: None,
      unique_keys: Vec::new(),
      guards: Vec::new(),
    }
  }

  pub fn unique(mut self, columns: &[&'static str]) -> Self {
    self.unique_keys.push(columns.to_vec());
    self
  }

  /// Restricts `column` to `value` for writes by non-admin users, e.g. a role
  /// column or a status flag only staff may set.
  pub fn guard(mut self, column: &'static str, value: impl Into<Value>) -> Self {
    self.guards.push((column, value.into()));
    self
  }

  pub fn guards_hold(&self, row: &Row) -> bool {
    self.guards.iter().all(|(column, value)| match row.get(*column) {
      None | Some(Value::Null) => true,
      Some(v) => v == value,
    })
  }

  /// Finds a declared unique key that `candidate` would duplicate among `existing`.
  /// Keys with a null column never conflict, matching SQL unique-index semantics.
  pub fn conflicting_key<'a>(
    &self,
    candidate: &Row,
    existing: impl Iterator<Item = &'a Row> + Clone,
    ignore_id: Option<&Value>,
  ) -> Option<String> {
    self.unique_keys.iter().find_map(|key| {
      let values: Option<Vec<&Value>> = key
        .iter()
        .map(|col| candidate.get(*col).filter(|v| !v.is_null()))
        .collect();
      let values = values?;
      let clash = existing.clone().any(|row| {
        if ignore_id.is_some() && row.get("id") == ignore_id {
          return false;
        }
        key.iter().zip(&values).all(|(col, v)| row.get(*col) == Some(*v))
      });
      clash.then(|| key.join(", "))
    })
  }

  pub fn find_key(&self, columns: &[String]) -> Option<&Vec<&'static str>> {
    self
      .unique_keys
      .iter()
      .find(|key| key.len() == columns.len() && key.iter().all(|c| columns.iter().any(|x| x == c)))
  }
}

/// Where the role of a signed-in user is read from.
#[derive(Debug, Clone)]
pub struct RoleSource {
  pub table: &'static str,
  pub user_column: &'static str,
  pub role_column: &'static str,
  pub admin_value: &'static str,
}

impl RoleSource {
  /// True when any row of `rows` grants `user` the admin role.
  pub fn grants_admin<'a>(&self, user: Uuid, rows: impl IntoIterator<Item = &'a Row>) -> bool {
    let user = Value::String(user.to_string());
    rows.into_iter().any(|row| {
      row.get(self.user_column) == Some(&user)
        && row.get(self.role_column).and_then(Value::as_str) == Some(self.admin_value)
    })
  }
}

/// Visibility of a table's rows for one principal.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadScope {
  All,
  Owner { column: &'static str, user_id: Uuid },
  Denied,
}

impl ReadScope {
  pub fn admits(&self, row: &Row) -> bool {
    match self {
      ReadScope::All => true,
      ReadScope::Owner { column, user_id } => {
        row.get(*column).and_then(Value::as_str) == Some(user_id.to_string().as_str())
      }
      ReadScope::Denied => false,
    }
  }

  /// The scope folded into a filter, for backends that push it down to the query.
  pub fn narrow(&self, filter: Filter) -> Filter {
    match self {
      ReadScope::Owner { column, user_id } => filter.eq(*column, user_id.to_string()),
      _ => filter,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
  tables: HashMap<&'static str, TableSchema>,
  roles: Option<RoleSource>,
}

impl Schema {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn table(mut self, table: TableSchema) -> Self {
    self.tables.insert(table.name, table);
    self
  }

  pub fn roles(mut self, roles: RoleSource) -> Self {
    self.roles = Some(roles);
    self
  }

  pub fn role_source(&self) -> Option<&RoleSource> {
    self.roles.as_ref()
  }

  pub fn get(&self, name: &str) -> SyncResult<&TableSchema> {
    self
      .tables
      .get(name)
      .ok_or_else(|| SyncError::not_found(name, "table is not declared in the schema"))
  }

  pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
    self.tables.values()
  }

  pub fn read_scope(&self, table: &TableSchema, principal: Principal, is_admin: bool) -> ReadScope {
    match (table.access, principal) {
      (_, Principal::Elevated) => ReadScope::All,
      (Access::Catalog, _) => ReadScope::All,
      (Access::Owned, Principal::User(_)) if is_admin => ReadScope::All,
      (Access::Owned, Principal::User(user_id)) => match table.owner_column {
        Some(column) => ReadScope::Owner { column, user_id },
        None => ReadScope::Denied,
      },
      (Access::Owned, Principal::Anonymous) | (Access::Restricted, _) => ReadScope::Denied,
    }
  }

  /// Checks a write of `row` (the incoming row for inserts, the stored row
  /// for updates and deletes) by `principal`.
  pub fn check_write(&self, table: &TableSchema, principal: Principal, is_admin: bool, row: &Row) -> SyncResult<()> {
    let allowed = match (table.access, principal) {
      (_, Principal::Elevated) => true,
      (_, Principal::Anonymous) => false,
      (Access::Catalog, Principal::User(_)) => is_admin,
      (Access::Owned, Principal::User(_)) if is_admin => true,
      (Access::Owned, Principal::User(user_id)) => {
        ReadScope::Owner {
          column: table.owner_column.unwrap_or("user_id"),
          user_id,
        }
        .admits(row)
          && table.guards_hold(row)
      }
      (Access::Restricted, Principal::User(_)) => false,
    };
    if allowed {
      Ok(())
    } else {
      Err(SyncError::Unauthorized(format!(
        "{:?} may not write to '{}'",
        principal, table.name
      )))
    }
  }
}

/// API keys a backend hands clients out against.
#[derive(Clone)]
pub struct StoreKeys {
  pub public_key: String,
  pub service_key: String,
}

impl StoreKeys {
  pub fn new(public_key: impl Into<String>, service_key: impl Into<String>) -> Self {
    Self {
      public_key: public_key.into(),
      service_key: service_key.into(),
    }
  }

  /// The service key yields the elevated tier; the public key a restricted
  /// client bound to `user` (or anonymous).
  pub fn principal_for(&self, key: &str, user: Option<Uuid>) -> SyncResult<Principal> {
    if key == self.service_key {
      Ok(Principal::Elevated)
    } else if key == self.public_key {
      Ok(user.map_or(Principal::Anonymous, Principal::User))
    } else {
      Err(SyncError::Unauthorized("invalid API key".to_string()))
    }
  }
}

impl std::fmt::Debug for StoreKeys {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StoreKeys")
      .field("public_key", &"[REDACTED]")
      .field("service_key", &"[REDACTED]")
      .finish()
  }
}
