// cardshop/src/models/mod.rs

//! Row types of the shop's tables. Field names are the wire column names.

pub mod cart_item;
pub mod category;
pub mod identity;
pub mod product;
pub mod service;
pub mod user_details;
pub mod want_to_buy;

// Re-export the model structs for convenient access
pub use cart_item::{CartItem, CartTarget};
pub use category::{Category, CategoryPatch, NewCategory};
pub use identity::Identity;
pub use product::{NewProduct, Product, ProductPatch};
pub use service::{NewService, Service, ServicePatch};
pub use user_details::{Role, UserDetails};
pub use want_to_buy::{NewWantToBuy, WantToBuy};
