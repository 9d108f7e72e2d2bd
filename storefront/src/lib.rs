// cardshop/src/lib.rs

//! Cardshop: a trading-card storefront and admin console on top of tidemark.
//!
//! Every table the shop uses is mirrored by a `tidemark::Container`; this
//! crate adds the per-table configuration (models, schema) and the shop's
//! rules on top (cart merging, profile bootstrap, media-first uploads,
//! checkout handoff), all reached through one explicit [`Storefront`] root.

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod errors;
pub mod media;
pub mod models;
pub mod profile;
pub mod requests;
pub mod schema;
pub mod seed;
pub mod session;
pub mod state;

pub use cart::{Cart, CartLine};
pub use catalog::Catalog;
pub use config::{AppConfig, StoreUrl};
pub use errors::{AppError, Notice, Result};
pub use media::{MediaPrefix, Upload};
pub use profile::Profiles;
pub use requests::RequestBoard;
pub use session::{AdminConsole, Session, Storefront};
pub use state::{AppState, Backend};
