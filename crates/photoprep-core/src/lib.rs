//! Core photoprep client library (session, auth handoff, images, processing).
//!
//! Everything here runs on a single-threaded cooperative executor. Shared
//! stores are `Rc<RefCell<_>>` handles and are never borrowed across an
//! `.await`, so no locking is involved.

pub mod account;
pub mod app;
pub mod auth;
pub mod compare;
pub mod config;
pub mod error;
pub mod events;
pub mod images;
pub mod navigation;
pub mod processing;
pub mod remote;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;
