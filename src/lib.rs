//! Course and task storage over a document database.
//!
//! [`datastore::StorageService`] is the entry point: get, save, update and
//! delete courses and the tasks nested under them, run owner-wide bulk
//! operations, and subscribe to live changes.

pub mod config;
pub mod datastore;
pub mod log;
pub mod model;
