//! realms
//!
//! The realm list served at the tail of the login handshake.

use async_trait::async_trait;
use derive_more::{From, Into};
use num_enum::IntoPrimitive;
use sqlx::Type;

/// A marker for a realm id.
#[derive(Type, Clone, Debug, From, Into, Copy, PartialEq, Eq)]
#[sqlx(transparent)]
pub struct RealmId(pub u32);

/// The advertised category of a realm.
#[repr(u8)]
#[derive(Clone, Copy, Type, Debug, IntoPrimitive, PartialEq, Eq)]
pub enum RealmType {
    Normal = 0,
    Pvp = 1,
    Rp = 6,
    RpPvp = 8,
}

/// One realm row as the realmlist response advertises it.
#[derive(Clone, Debug, PartialEq)]
pub struct Realm {
    pub id: RealmId,
    pub name: String,
    pub realm_type: RealmType,
    pub external_address: String,
    pub port: u16,
    pub flags: u8,
    pub timezone: u8,
    pub population: f32,
}

impl Realm {
    /// The socket string the client connects to.
    pub fn socket(&self) -> String {
        format!("{}:{}", self.external_address, self.port)
    }
}

/// A trait that models a realmlist.
#[async_trait]
pub trait RealmList: Send + Sync {
    /// Return the list of realms sorted by id.
    async fn realms(&self) -> Vec<Realm>;
}
