pub mod memory;
pub mod postgres;
pub mod ride_store;
pub mod transaction;

pub use memory::InMemoryRideStore;
pub use postgres::PgRideStore;
pub use ride_store::{ChangeSet, RideStore, StoredRide};
pub use transaction::*;
