//! Core types and boundary traits for Tether.
//!
//! `tether-core` is the **contract layer** for the rest of the workspace. It
//! owns the pieces every other crate agrees on:
//!
//! - **Boundary traits**: [`Connection`] and [`PreparedQuery`] are what a
//!   backing store must implement. Tether never interprets SQL itself; it
//!   hands statement text to the store unmodified and works with whatever
//!   compiled query object comes back.
//! - **Data model**: [`Value`] carries bound parameters and extracted columns
//!   across the boundary; [`Id`] is the integer primary-key type assigned by
//!   the store's autoincrement mechanism.
//! - **Error taxonomy**: [`Error`] and the [`Result`] alias used throughout.
//!
//! # Who Uses This Crate
//!
//! - `tether-statement` drives `Connection`/`PreparedQuery` through its
//!   statement pool.
//! - `tether-cache` keys its identity maps by `Id` and loads records through
//!   the statement layer.
//! - Driver crates (`tether-mem`) implement `Connection` and produce
//!   `Value`s.
//!
//! Most applications should use the `tether` facade; reach for `tether-core`
//! directly when writing a driver.

pub mod connection;
pub mod error;
pub mod identifiers;
pub mod value;

pub use connection::{Connection, PreparedQuery};
pub use error::{Error, Result};
pub use identifiers::{Id, quote_ident};
pub use value::{FromValue, Value};
