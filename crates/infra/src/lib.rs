//! Infrastructure layer: credential and movie stores, background workers.

pub mod credentials;
pub mod movies;
pub mod workers;

#[cfg(feature = "mongo")]
pub mod mongo;


pub use credentials::InMemoryCredentialStore;
pub use movies::InMemoryMovieStore;
pub use workers::revocation_sweeper::{RevocationSweeper, SweeperHandle};
