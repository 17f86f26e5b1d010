//! Concrete implementations of the collaborator traits.

pub mod file_store;
pub mod mock;

pub use file_store::FileUserStore;
