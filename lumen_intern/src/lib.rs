//! Interned-string table for the Lumen VM.
//!
//! One canonical table maps string contents to a shared reference, with
//! the guarantee that equal contents always resolve to the same
//! reference for as long as any holder keeps it alive:
//!
//! - Lock-free lookup on the hot path; only insertion of a new string
//!   takes the table lock, and re-checks under it
//! - Safepoint-only maintenance: sweeping of dead entries (serial or
//!   parallel via chunk claiming) and whole-table rehashing
//! - Seeded alternate hashing as a hash-flood defense, switched on by
//!   the first rehash
//! - Exhaustive fail-continue verification for debugging

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod claim;
pub mod config;
pub mod hashing;
pub mod safepoint;
pub mod string;
pub mod table;

pub use claim::BucketClaimer;
pub use config::{StringTableConfig, TableConfigError};
pub use safepoint::Safepoint;
pub use string::{InternedStr, StrRef};
pub use table::{StringTable, StringTableStats};
