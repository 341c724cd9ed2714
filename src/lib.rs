//! Marketplace core: product catalogue, picture galleries, and an
//! asynchronous event dispatch pipeline.
//!
//! The crate splits into two halves that meet in the service layer:
//!
//! * **Consistency** lives in [`storage`]: gallery positions are assigned
//!   atomically, detaching a cover picture clears the cover in the same
//!   step, and every mutation is guarded by ownership checks in
//!   [`services`].
//! * **Dispatch** lives in [`dispatch`]: committed mutations produce
//!   events into a bounded queue, and a worker pool delivers them to the
//!   configured broker sink at least once, redelivering on failure.
//!
//! [`rest`] exposes the whole thing over HTTP; binaries wire the pieces
//! together from [`config`].

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod rest;
pub mod services;
pub mod storage;
pub mod utils;
