//! # oraql-rls
//!
//! Dynamic WHERE-clause injection for Oraql.
//!
//! Rulesets may define injectors: conditional row-filter templates applied
//! to the generated SQL based on session claims. This crate resolves which
//! injectors apply and rewrites the SQL text:
//!
//! **Before:**
//! ```sql
//! SELECT id, status FROM orders
//! ```
//!
//! **After (for a session whose role is `customer`):**
//! ```sql
//! SELECT id, status FROM orders WHERE user_id = 'customer_user_1'
//! ```
//!
//! When the tenant's dynamic-injection toggle is off, any existing WHERE
//! clause is stripped instead: disabled injection also disables
//! user-supplied filtering.

pub mod error;
pub mod injector;

pub use error::InjectionError;
pub use injector::{InjectionResult, InjectorResolver};
