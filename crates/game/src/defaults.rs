//! defaults
//!
//! Static game-content tables loaded at boot: per-race start locations and
//! models, per-class base stats, and the starting skill/spell kits. Only
//! the combinations listed here are creatable; anything else is rejected
//! as unsupported.

use crate::characters::{CharacterPosition, CharacterStats, Class, Gender, Race};

/// Starting level of a fresh character.
pub const START_LEVEL: u32 = 1;

/// Per-race boot data.
#[derive(Debug, Clone, Copy)]
pub struct RaceDefaults {
    pub start: CharacterPosition,
    pub model_male: u32,
    pub model_female: u32,
    pub faction_template: u32,
    pub scale_x: f32,
}

/// Per-class boot data.
#[derive(Debug, Clone, Copy)]
pub struct ClassDefaults {
    pub health: u32,
    pub mana: u32,
    pub strength: u32,
    pub agility: u32,
    pub stamina: u32,
    pub intellect: u32,
    pub spirit: u32,
    /// Starting skill lines as (id, level, stat_level).
    pub skills: &'static [(u16, u16, u16)],
    /// Starting spell ids.
    pub spells: &'static [u32],
}

pub fn race_defaults(race: Race) -> RaceDefaults {
    let start = |map, zone, x, y, z, orientation| CharacterPosition {
        map,
        zone,
        x,
        y,
        z,
        orientation,
    };
    match race {
        Race::Human => RaceDefaults {
            start: start(0, 12, -8949.95, -132.49, 83.53, 0.0),
            model_male: 49,
            model_female: 50,
            faction_template: 1,
            scale_x: 1.0,
        },
        Race::Orc => RaceDefaults {
            start: start(1, 14, -618.52, -4251.67, 38.72, 0.0),
            model_male: 51,
            model_female: 52,
            faction_template: 2,
            scale_x: 1.0,
        },
        Race::Dwarf => RaceDefaults {
            start: start(0, 1, -6240.32, 331.03, 382.76, 6.17),
            model_male: 53,
            model_female: 54,
            faction_template: 3,
            scale_x: 1.0,
        },
        Race::NightElf => RaceDefaults {
            start: start(1, 141, 10311.3, 832.46, 1326.41, 5.69),
            model_male: 55,
            model_female: 56,
            faction_template: 4,
            scale_x: 1.0,
        },
        Race::Undead => RaceDefaults {
            start: start(0, 85, 1676.35, 1677.45, 121.67, 2.71),
            model_male: 57,
            model_female: 58,
            faction_template: 5,
            scale_x: 1.0,
        },
        Race::Tauren => RaceDefaults {
            start: start(1, 215, -2917.58, -257.98, 52.99, 0.0),
            model_male: 59,
            model_female: 60,
            faction_template: 6,
            scale_x: 1.35,
        },
        Race::Gnome => RaceDefaults {
            start: start(0, 1, -6237.02, 329.66, 382.75, 0.0),
            model_male: 1563,
            model_female: 1564,
            faction_template: 115,
            scale_x: 1.0,
        },
        Race::Troll => RaceDefaults {
            start: start(1, 14, -618.52, -4251.67, 38.72, 0.0),
            model_male: 1478,
            model_female: 1479,
            faction_template: 116,
            scale_x: 1.0,
        },
    }
}

pub fn class_defaults(class: Class) -> ClassDefaults {
    match class {
        Class::Warrior => ClassDefaults {
            health: 60,
            mana: 0,
            strength: 20,
            agility: 20,
            stamina: 22,
            intellect: 20,
            spirit: 20,
            skills: &[(26, 1, 1), (95, 1, 1), (162, 1, 1)],
            spells: &[78, 6603],
        },
        Class::Rogue => ClassDefaults {
            health: 55,
            mana: 0,
            strength: 18,
            agility: 25,
            stamina: 20,
            intellect: 20,
            spirit: 20,
            skills: &[(38, 1, 1), (95, 1, 1), (173, 1, 1)],
            spells: &[1752, 2098, 6603],
        },
        Class::Priest => ClassDefaults {
            health: 42,
            mana: 110,
            strength: 17,
            agility: 18,
            stamina: 18,
            intellect: 24,
            spirit: 25,
            skills: &[(54, 1, 1), (95, 1, 1)],
            spells: &[585, 2050, 6603],
        },
        Class::Mage => ClassDefaults {
            health: 40,
            mana: 120,
            strength: 17,
            agility: 18,
            stamina: 17,
            intellect: 25,
            spirit: 24,
            skills: &[(136, 1, 1), (95, 1, 1)],
            spells: &[133, 168, 6603],
        },
        Class::Warlock => ClassDefaults {
            health: 43,
            mana: 100,
            strength: 17,
            agility: 19,
            stamina: 18,
            intellect: 23,
            spirit: 23,
            skills: &[(136, 1, 1), (95, 1, 1)],
            spells: &[686, 687, 6603],
        },
        Class::Hunter => ClassDefaults {
            health: 46,
            mana: 65,
            strength: 18,
            agility: 23,
            stamina: 19,
            intellect: 20,
            spirit: 21,
            skills: &[(45, 1, 1), (95, 1, 1), (173, 1, 1)],
            spells: &[75, 2973, 6603],
        },
        Class::Paladin => ClassDefaults {
            health: 58,
            mana: 80,
            strength: 21,
            agility: 18,
            stamina: 21,
            intellect: 20,
            spirit: 21,
            skills: &[(26, 1, 1), (95, 1, 1), (162, 1, 1)],
            spells: &[635, 21084, 6603],
        },
        Class::Shaman => ClassDefaults {
            health: 52,
            mana: 85,
            strength: 19,
            agility: 18,
            stamina: 21,
            intellect: 21,
            spirit: 23,
            skills: &[(26, 1, 1), (95, 1, 1), (162, 1, 1)],
            spells: &[403, 331, 6603],
        },
        Class::Druid => ClassDefaults {
            health: 46,
            mana: 60,
            strength: 18,
            agility: 18,
            stamina: 19,
            intellect: 22,
            spirit: 24,
            skills: &[(136, 1, 1), (95, 1, 1)],
            spells: &[5176, 5185, 6603],
        },
    }
}

/// Skill cap as (max_level, max_stat_level), keyed by skill line.
pub fn skill_max_levels(skill_id: u16) -> (u16, u16) {
    match skill_id {
        // weapon and defense lines scale with level
        26 | 38 | 45 | 54 | 136 | 162 | 173 => (5, 300),
        95 => (5, 300),
        _ => (1, 1),
    }
}

/// The combinations that exist in this era of the game. `None` means the
/// combination is rejected with the unsupported-combo result code.
pub fn is_supported_combination(race: Race, class: Class) -> bool {
    use Class::*;
    use Race::*;
    match (race, class) {
        (Human, Warrior | Paladin | Rogue | Priest | Mage | Warlock) => true,
        (Orc, Warrior | Hunter | Rogue | Shaman | Warlock) => true,
        (Dwarf, Warrior | Paladin | Hunter | Rogue | Priest) => true,
        (NightElf, Warrior | Hunter | Rogue | Priest | Druid) => true,
        (Undead, Warrior | Rogue | Priest | Mage | Warlock) => true,
        (Tauren, Warrior | Hunter | Shaman | Druid) => true,
        (Gnome, Warrior | Rogue | Mage | Warlock) => true,
        (Troll, Warrior | Hunter | Rogue | Priest | Shaman | Mage) => true,
        _ => false,
    }
}

/// Assemble the boot-time stat block for a fresh character.
pub fn new_character_stats(race: Race, class: Class, gender: Gender) -> CharacterStats {
    let r = race_defaults(race);
    let c = class_defaults(class);
    CharacterStats {
        level: START_LEVEL,
        health: c.health,
        mana: c.mana,
        strength: c.strength,
        agility: c.agility,
        stamina: c.stamina,
        intellect: c.intellect,
        spirit: c.spirit,
        display_id: match gender {
            Gender::Male => r.model_male,
            Gender::Female => r.model_female,
        },
        faction_template: r.faction_template,
        scale_x: r.scale_x,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn all_supported_combinations_have_defaults() {
        for race in [
            Race::Human,
            Race::Orc,
            Race::Dwarf,
            Race::NightElf,
            Race::Undead,
            Race::Tauren,
            Race::Gnome,
            Race::Troll,
        ] {
            for class in [
                Class::Warrior,
                Class::Paladin,
                Class::Hunter,
                Class::Rogue,
                Class::Priest,
                Class::Shaman,
                Class::Mage,
                Class::Warlock,
                Class::Druid,
            ] {
                if is_supported_combination(race, class) {
                    let stats = new_character_stats(race, class, Gender::Male);
                    assert!(stats.health > 0);
                    assert!(stats.display_id > 0);
                    assert!(!class_defaults(class).skills.is_empty());
                }
            }
        }
    }

    #[test]
    fn shamans_stay_horde_paladins_stay_alliance() {
        assert!(!is_supported_combination(Race::Human, Class::Shaman));
        assert!(!is_supported_combination(Race::Orc, Class::Paladin));
    }
}
