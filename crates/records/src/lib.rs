//! `tillpoint-records`
//!
//! **Responsibility:** canonical entity representations for every table the
//! sync subsystem touches, plus the wire-normalization layer that maps the
//! legacy snake_case remote schema onto the one canonical camelCase shape.

pub mod account;
pub mod customer;
pub mod product;
pub mod sale;
pub mod wire;

pub use account::{Store, Subscription, SubscriptionStatus, SubscriptionTier, User};
pub use customer::Customer;
pub use product::{Product, DEFAULT_MIN_STOCK};
pub use sale::{PaymentStatus, Return, Sale, SaleLine};
