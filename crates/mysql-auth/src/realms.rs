use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use sqlx::{MySqlPool, Row};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use runeward_game::realms::{Realm, RealmId, RealmList, RealmType};

/// The realm list, read from the auth database and cached between
/// refreshes so the login flood after a restart does not hammer the
/// store.
#[derive(Debug)]
pub struct MySqlRealmList {
    pool: MySqlPool,
    update_interval: Duration,
    next_update: RwLock<SystemTime>,
    realms: RwLock<Vec<Realm>>,
}

impl MySqlRealmList {
    pub fn new(pool: MySqlPool, update_interval: Duration) -> Self {
        debug!("starting realmlist service");
        Self {
            pool,
            update_interval,
            next_update: RwLock::new(SystemTime::UNIX_EPOCH),
            realms: RwLock::new(Vec::new()),
        }
    }

    async fn refresh(&self) -> Result<Vec<Realm>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, name, icon, address, port, flag, timezone, population \
             FROM realmlist ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Realm {
                    id: RealmId(row.try_get("id")?),
                    name: row.try_get("name")?,
                    realm_type: match row.try_get::<u8, _>("icon")? {
                        1 => RealmType::Pvp,
                        6 => RealmType::Rp,
                        8 => RealmType::RpPvp,
                        _ => RealmType::Normal,
                    },
                    external_address: row.try_get("address")?,
                    port: row.try_get("port")?,
                    flags: row.try_get("flag")?,
                    timezone: row.try_get("timezone")?,
                    population: row.try_get("population")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl RealmList for MySqlRealmList {
    async fn realms(&self) -> Vec<Realm> {
        let now = SystemTime::now();
        if now > *self.next_update.read().await {
            match self.refresh().await {
                Ok(realms) => {
                    debug!("refreshed realm list: {} realms", realms.len());
                    *self.realms.write().await = realms;
                    *self.next_update.write().await = now + self.update_interval;
                }
                Err(e) => warn!("could not refresh realm list: {e}"),
            }
        }

        self.realms.read().await.clone()
    }
}
