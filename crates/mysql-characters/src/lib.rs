//! MySQL-backed character persistence. Creation and deletion are
//! multi-statement and run inside a transaction; any store error rolls
//! the whole operation back.

#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_import_braces,
    unused_qualifications
)]

mod characters;

pub use characters::MySqlCharacterService;
