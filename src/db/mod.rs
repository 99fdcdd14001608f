//! Database module for the delivery backend
//!
//! This module owns persistence of the user document: the `UserStore`
//! seam, its PostgreSQL implementation and an in-memory one for tests
//! and single-node development.

pub mod memory;
pub mod models;
pub mod operations;
pub mod store;

pub use memory::InMemoryUserStore;
pub use models::{Order, OrderItem, RefreshTokenRecord, RecentAddress, SavedAddress, User, UserSummary};
pub use operations::DbOperations;
pub use store::{UserMutation, UserStore};
