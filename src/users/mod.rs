//! Profile, address book and order records held on the user document.

pub mod addresses;
pub mod handlers;
pub mod orders;

pub use addresses::{AddressInput, ProfileUpdate};
pub use orders::{NewOrderRequest, OrderPatch};
