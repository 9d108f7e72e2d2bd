// cardshop/src/schema.rs

//! The shop's tables as the store enforces them. Must agree with
//! `migrations/schema.sql` for the PostgreSQL backend.

use tidemark::store::RoleSource;
use tidemark::{Schema, TableSchema};

/// Bucket all shop media is uploaded to.
pub const MEDIA_BUCKET: &str = "media";

pub fn storefront_schema() -> Schema {
  Schema::new()
    .table(TableSchema::catalog("products"))
    .table(TableSchema::catalog("categories"))
    .table(TableSchema::catalog("services"))
    .table(
      TableSchema::owned("carts", "user_id")
        .unique(&["user_id", "product_id"])
        .unique(&["user_id", "service_id"]),
    )
    // Only staff mark requests done.
    .table(TableSchema::owned("want_to_buy", "user_id").guard("done", false))
    .table(
      TableSchema::owned("users", "user_id")
        .unique(&["user_id"])
        .guard("role", "customer"),
    )
    .table(TableSchema::restricted("identities").unique(&["email"]))
    .roles(RoleSource {
      table: "users",
      user_column: "user_id",
      role_column: "role",
      admin_value: "admin",
    })
}
