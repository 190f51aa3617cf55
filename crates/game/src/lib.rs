//! game
//!
//! This crate models the core domain of the server: accounts, characters,
//! realms, and the shared-world object system with its field-diff update
//! records.

#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_import_braces,
    unused_qualifications,
    clippy::useless_conversion,
    clippy::todo,
    clippy::unimplemented
)]

pub mod accounts;
pub mod characters;
pub mod defaults;
pub mod objects;
pub mod realms;
