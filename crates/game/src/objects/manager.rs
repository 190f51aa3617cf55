use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use rand::Rng;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::{Guid, ObjectField, ObjectType, Player};

/// Process-wide registry mapping GUID to live object, with a per-type
/// index. The registry holds non-owning lookup entries: the connection a
/// player belongs to owns its lifetime and unregisters it on teardown.
///
/// Lock order: the registry lock is always taken before any per-object
/// lock, and per-object locks are never nested.
#[derive(Debug, Default)]
pub struct ObjectManager {
    registry: RwLock<Registry>,
}

#[derive(Debug, Default)]
struct Registry {
    objects: HashMap<Guid, Arc<Mutex<Player>>>,
    by_type: HashMap<ObjectType, HashSet<Guid>>,
}

impl ObjectManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an object, assigning a fresh GUID if it has none. GUID lows
    /// are drawn from the 24-bit range and redrawn until unused.
    pub async fn register(&self, mut player: Player) -> Arc<Mutex<Player>> {
        let mut registry = self.registry.write().await;

        if player.guid().low() == 0 {
            let object_type = player.unit.object.object_type();
            let mut rng = rand::thread_rng();
            let guid = loop {
                let candidate = Guid::new(object_type, rng.gen_range(1..0x00FF_FFFF));
                if !registry.objects.contains_key(&candidate) {
                    break candidate;
                }
            };
            player.unit.object.set_guid(guid);
            player.unit.object.set_u64(ObjectField::Guid, guid.0);
        }

        let guid = player.guid();
        let object_type = player.unit.object.object_type();
        debug!("registering object {}", guid);

        let entry = Arc::new(Mutex::new(player));
        registry.objects.insert(guid, entry.clone());
        registry.by_type.entry(object_type).or_default().insert(guid);
        entry
    }

    pub async fn unregister(&self, guid: Guid) -> Option<Arc<Mutex<Player>>> {
        let mut registry = self.registry.write().await;
        let entry = registry.objects.remove(&guid)?;
        for guids in registry.by_type.values_mut() {
            guids.remove(&guid);
        }
        debug!("unregistered object {}", guid);
        Some(entry)
    }

    pub async fn get(&self, guid: Guid) -> Option<Arc<Mutex<Player>>> {
        self.registry.read().await.objects.get(&guid).cloned()
    }

    /// Look up an object only if it is registered as a player.
    pub async fn get_player(&self, guid: Guid) -> Option<Arc<Mutex<Player>>> {
        let registry = self.registry.read().await;
        registry
            .by_type
            .get(&ObjectType::Player)
            .filter(|guids| guids.contains(&guid))
            .and_then(|_| registry.objects.get(&guid).cloned())
    }

    /// Every player standing in the given map and zone. Used by the
    /// update engine to enumerate replication subscribers.
    pub async fn players_in_map(&self, map: u32, zone: u32) -> Vec<Arc<Mutex<Player>>> {
        let candidates: Vec<_> = {
            let registry = self.registry.read().await;
            registry
                .by_type
                .get(&ObjectType::Player)
                .map(|guids| {
                    guids
                        .iter()
                        .filter_map(|guid| registry.objects.get(guid).cloned())
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut matching = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let position = candidate.lock().await.unit.object.position;
            if position.map == map && position.zone == zone {
                matching.push(candidate);
            }
        }
        matching
    }

    /// All registered players, for server-wide broadcasts.
    pub async fn players(&self) -> Vec<Arc<Mutex<Player>>> {
        let registry = self.registry.read().await;
        registry
            .by_type
            .get(&ObjectType::Player)
            .map(|guids| {
                guids
                    .iter()
                    .filter_map(|guid| registry.objects.get(guid).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;
    use crate::accounts::AccountId;
    use crate::characters::{
        CharacterData, CharacterFeatures, CharacterId, Class, Gender, Race,
    };
    use crate::defaults::{new_character_stats, race_defaults};

    fn player(low: u32) -> Player {
        let race = Race::Human;
        let class = Class::Warrior;
        let data = CharacterData {
            guid: CharacterId(low),
            account: AccountId(1),
            name: format!("Char{low}"),
            race,
            class,
            gender: Gender::Female,
            features: CharacterFeatures::default(),
            stats: new_character_stats(race, class, Gender::Female),
            position: race_defaults(race).start,
        };
        Player::from_character(AccountId(1), &data)
    }

    #[tokio::test]
    async fn generated_guids_are_unique() {
        let manager = ObjectManager::new();
        let mut seen = HashSet::new();
        for _ in 0..64 {
            let entry = manager.register(player(0)).await;
            let guid = entry.lock().await.guid();
            assert_ne!(guid.low(), 0);
            assert!(seen.insert(guid), "duplicate guid {guid}");
        }
    }

    #[tokio::test]
    async fn register_lookup_unregister() {
        let manager = ObjectManager::new();
        let entry = manager.register(player(7)).await;
        let guid = entry.lock().await.guid();

        assert!(manager.get(guid).await.is_some());
        assert!(manager.get_player(guid).await.is_some());
        assert!(manager.unregister(guid).await.is_some());
        assert!(manager.get(guid).await.is_none());
        assert!(manager.unregister(guid).await.is_none());
    }

    #[tokio::test]
    async fn players_in_map_filters_by_map_and_zone() {
        let manager = ObjectManager::new();
        let human = manager.register(player(1)).await;
        let _ = manager.register(player(2)).await;

        {
            // Move one player elsewhere.
            let mut human = human.lock().await;
            human.unit.object.position.zone = 999;
        }

        let start = race_defaults(Race::Human).start;
        let nearby = manager.players_in_map(start.map, start.zone).await;
        assert_eq!(nearby.len(), 1);
        assert_eq!(nearby[0].lock().await.guid().low(), 2);
    }
}
