//! Absolute indices into the dense 32-bit field table. The numbering is
//! part of the replication wire contract; do not renumber.

use num_enum::IntoPrimitive;

/// Fields shared by every object. `Guid` spans two words (low, high).
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
pub enum ObjectField {
    Guid = 0x00,
    Type = 0x02,
    Entry = 0x03,
    ScaleX = 0x04,
    Padding = 0x05,
}

pub const OBJECT_END: u16 = 0x06;

/// Unit-block fields, directly after the object block. The leading
/// entries are all two-word GUID references.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
pub enum UnitField {
    Charm = 0x06,
    Summon = 0x08,
    CharmedBy = 0x0A,
    SummonedBy = 0x0C,
    CreatedBy = 0x0E,
    Target = 0x10,
    Persuaded = 0x12,
    ChannelObject = 0x14,
    Health = 0x16,
    Power1 = 0x17,
    Power2 = 0x18,
    Power3 = 0x19,
    Power4 = 0x1A,
    Power5 = 0x1B,
    MaxHealth = 0x1C,
    MaxPower1 = 0x1D,
    MaxPower2 = 0x1E,
    MaxPower3 = 0x1F,
    MaxPower4 = 0x20,
    MaxPower5 = 0x21,
    Level = 0x22,
    FactionTemplate = 0x23,
    /// race | class << 8 | gender << 16
    Bytes0 = 0x24,
    Flags = 0x25,
    DisplayId = 0x26,
    NativeDisplayId = 0x27,
    MountDisplayId = 0x28,
    MinDamage = 0x29,
    MaxDamage = 0x2A,
    Bytes1 = 0x2B,
}

pub const UNIT_END: u16 = 0x2C;

/// Player-block fields. The skill region is 128 slots of three words
/// (id, level | max_level << 16, stat_level | max_stat_level << 16).
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
pub enum PlayerField {
    Flags = 0x2C,
    /// skin | face << 8 | hair_style << 16 | hair_color << 24
    Bytes = 0x2D,
    /// facial_hair in the low byte
    Bytes2 = 0x2E,
    /// gender in the low byte
    Bytes3 = 0x2F,
    Exp = 0x30,
    NextLevelExp = 0x31,
    SkillInfo1Id = 0x32,
    SkillInfo1Level = 0x33,
    SkillInfo1StatLevel = 0x34,
    CharacterPoints1 = 0x1B2,
    Coinage = 0x1B3,
}

pub const PLAYER_END: u16 = 0x1B4;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn skill_region_ends_where_the_tail_fields_begin() {
        // 128 slots of 3 words each.
        let region = u16::from(PlayerField::SkillInfo1Id) + 128 * 3;
        assert_eq!(region, u16::from(PlayerField::CharacterPoints1));
        assert!(PLAYER_END > region);
    }
}
