use std::collections::HashSet;

use crate::accounts::AccountId;
use crate::characters::{CharacterData, Skill, Spell};
use crate::defaults;

use super::{
    type_mask, Guid, ObjectField, ObjectType, PlayerField, Position, Unit, UnitField,
};

/// Skill slots available on the field table.
pub const NUM_SKILLS: usize = 128;
/// Spells a player may know.
pub const NUM_SPELLS: usize = 100;

/// A Player is a Unit controlled by a connected client. The owning world
/// connection keeps the player alive; the registry only holds a lookup
/// entry keyed by GUID.
#[derive(Debug, Clone)]
pub struct Player {
    pub unit: Unit,
    pub name: String,
    pub account: AccountId,
    skills: Vec<Skill>,
    spells: Vec<Spell>,
    /// GUIDs this player has been shown create blocks for.
    pub tracked_guids: HashSet<Guid>,
}

impl Player {
    /// Build a player object from its stored character record, seeding
    /// the field table the update engine replicates from.
    pub fn from_character(account: AccountId, data: &CharacterData) -> Self {
        let guid = Guid::new(ObjectType::Player, data.guid.0);
        let mut unit = Unit::new(guid, ObjectType::Player);

        let stats = &data.stats;
        let object = &mut unit.object;
        object.set_u64(ObjectField::Guid, guid.0);
        object.set(ObjectField::Type, type_mask(ObjectType::Player));
        object.set_f32(ObjectField::ScaleX, stats.scale_x);

        object.set(UnitField::Health, stats.health);
        object.set(UnitField::MaxHealth, stats.health);
        object.set(UnitField::Power1, stats.mana);
        object.set(UnitField::MaxPower1, stats.mana);
        object.set(UnitField::Level, stats.level);
        object.set(UnitField::FactionTemplate, stats.faction_template);
        object.set(
            UnitField::Bytes0,
            u32::from(u8::from(data.race))
                | u32::from(u8::from(data.class)) << 8
                | u32::from(u8::from(data.gender)) << 16,
        );
        object.set(UnitField::DisplayId, stats.display_id);
        object.set(UnitField::NativeDisplayId, stats.display_id);

        let features = &data.features;
        object.set(
            PlayerField::Bytes,
            u32::from(features.skin)
                | u32::from(features.face) << 8
                | u32::from(features.hair_style) << 16
                | u32::from(features.hair_color) << 24,
        );
        object.set(PlayerField::Bytes2, u32::from(features.facial_hair));
        object.set(PlayerField::Bytes3, u32::from(u8::from(data.gender)));
        object.set(PlayerField::Exp, 0);
        object.set(PlayerField::NextLevelExp, 400);

        let position = Position {
            map: data.position.map,
            zone: data.position.zone,
            x: data.position.x,
            y: data.position.y,
            z: data.position.z,
            orientation: data.position.orientation,
        };
        object.position = position;
        unit.movement.x = position.x;
        unit.movement.y = position.y;
        unit.movement.z = position.z;
        unit.movement.orientation = position.orientation;

        Self {
            unit,
            name: data.name.clone(),
            account,
            skills: Vec::new(),
            spells: Vec::new(),
            tracked_guids: HashSet::new(),
        }
    }

    pub fn guid(&self) -> Guid {
        self.unit.object.guid()
    }

    pub fn skills(&self) -> &[Skill] {
        &self.skills
    }

    pub fn spells(&self) -> &[Spell] {
        &self.spells
    }

    /// Import skills into the local list and the update fields. Slots are
    /// filled in the order given, bounded by the field region.
    pub fn import_skills(&mut self, skills: Vec<Skill>) {
        self.skills.clear();
        for skill in skills.into_iter().take(NUM_SKILLS) {
            let slot = self.skills.len() as u16;
            self.set_skill_fields(slot, &skill);
            self.skills.push(skill);
        }
    }

    fn set_skill_fields(&mut self, slot: u16, skill: &Skill) {
        let id_field = u16::from(PlayerField::SkillInfo1Id) + slot * 3;
        let level_field = u16::from(PlayerField::SkillInfo1Level) + slot * 3;
        let stat_field = u16::from(PlayerField::SkillInfo1StatLevel) + slot * 3;

        let (max_level, max_stat_level) = defaults::skill_max_levels(skill.id);
        let object = &mut self.unit.object;
        object.set(id_field, u32::from(skill.id));
        object.set(
            level_field,
            u32::from(skill.level) | u32::from(max_level) << 16,
        );
        object.set(
            stat_field,
            u32::from(skill.stat_level) | u32::from(max_stat_level) << 16,
        );
    }

    pub fn import_spells(&mut self, spells: Vec<Spell>) {
        self.spells = spells.into_iter().take(NUM_SPELLS).collect();
    }

    /// Record that this player has seen a create block for `guid`.
    /// Returns false when it was already tracked.
    pub fn track(&mut self, guid: Guid) -> bool {
        self.tracked_guids.insert(guid)
    }

    pub fn untrack(&mut self, guid: Guid) -> bool {
        self.tracked_guids.remove(&guid)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::characters::{
        CharacterCreate, CharacterFeatures, CharacterId, Class, Gender, Race,
    };
    use crate::defaults::{new_character_stats, race_defaults};

    fn character() -> CharacterData {
        let race = Race::Dwarf;
        let class = Class::Hunter;
        let create = CharacterCreate {
            name: "Brom".to_string(),
            race,
            class,
            gender: Gender::Male,
            features: CharacterFeatures {
                skin: 1,
                face: 2,
                hair_style: 3,
                hair_color: 4,
                facial_hair: 5,
            },
        };
        CharacterData {
            guid: CharacterId(0x1234),
            account: AccountId(1),
            name: create.name.clone(),
            race,
            class,
            gender: create.gender,
            features: create.features,
            stats: new_character_stats(race, class, create.gender),
            position: race_defaults(race).start,
        }
    }

    #[test]
    fn field_table_reflects_the_character() {
        let player = Player::from_character(AccountId(1), &character());
        let object = &player.unit.object;

        assert_eq!(object.get(ObjectField::Type), Some(0x19));
        assert_eq!(object.get(ObjectField::Guid), Some(0x1234));
        assert_eq!(player.unit.race(), u32::from(u8::from(Race::Dwarf)));
        assert_eq!(player.unit.class(), u32::from(u8::from(Class::Hunter)));
        assert_eq!(
            object.get(PlayerField::Bytes),
            Some(1 | 2 << 8 | 3 << 16 | 4 << 24)
        );
        assert_eq!(object.position.map, 0);
        assert_eq!(object.position.zone, 1);
    }

    #[test]
    fn skill_import_packs_levels_and_caps() {
        let mut player = Player::from_character(AccountId(1), &character());
        player.import_skills(vec![Skill {
            id: 45,
            level: 1,
            stat_level: 1,
            max_level: 5,
            max_stat_level: 300,
        }]);

        let object = &player.unit.object;
        let base = u16::from(PlayerField::SkillInfo1Id);
        assert_eq!(object.get(base), Some(45));
        assert_eq!(object.get(base + 1), Some(1 | 5 << 16));
        assert_eq!(object.get(base + 2), Some(1 | 300 << 16));
    }

    #[test]
    fn skill_import_is_bounded() {
        let mut player = Player::from_character(AccountId(1), &character());
        let too_many = (0..200)
            .map(|i| Skill {
                id: i as u16,
                level: 1,
                stat_level: 1,
                max_level: 1,
                max_stat_level: 1,
            })
            .collect();
        player.import_skills(too_many);
        assert_eq!(player.skills().len(), NUM_SKILLS);
    }
}
