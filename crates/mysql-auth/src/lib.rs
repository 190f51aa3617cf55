//! MySQL-backed implementations of the account service and the realm
//! list. Store connections are leaf resources: each operation draws one
//! from the pool and releases it on every exit path.

#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_import_braces,
    unused_qualifications
)]

mod accounts;
mod realms;

pub use accounts::MySqlAccountService;
pub use realms::MySqlRealmList;
