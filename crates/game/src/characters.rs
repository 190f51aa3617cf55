//! characters
//!
//! Character records as the store sees them, and the service trait the
//! world server drives for the character list, creation and deletion.

use async_trait::async_trait;
use derive_more::Display;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use sqlx::Type;
use thiserror::Error;

use crate::accounts::AccountId;

/// The store-side identifier of a character; becomes the low word of the
/// in-world object GUID.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Type)]
#[sqlx(transparent)]
pub struct CharacterId(pub u32);

/// Playable races, numbered as the client numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Race {
    Human = 1,
    Orc = 2,
    Dwarf = 3,
    NightElf = 4,
    Undead = 5,
    Tauren = 6,
    Gnome = 7,
    Troll = 8,
}

/// Playable classes, numbered as the client numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Class {
    Warrior = 1,
    Paladin = 2,
    Hunter = 3,
    Rogue = 4,
    Priest = 5,
    Shaman = 7,
    Mage = 8,
    Warlock = 9,
    Druid = 11,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Gender {
    Male = 0,
    Female = 1,
}

/// Cosmetic features chosen at the character screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacterFeatures {
    pub skin: u8,
    pub face: u8,
    pub hair_style: u8,
    pub hair_color: u8,
    pub facial_hair: u8,
}

/// Where a character last stood.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CharacterPosition {
    pub map: u32,
    pub zone: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub orientation: f32,
}

/// The slice of per-class/per-race constants a fresh character is seeded
/// with and that the char-enum screen needs back.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CharacterStats {
    pub level: u32,
    pub health: u32,
    pub mana: u32,
    pub strength: u32,
    pub agility: u32,
    pub stamina: u32,
    pub intellect: u32,
    pub spirit: u32,
    pub display_id: u32,
    pub faction_template: u32,
    pub scale_x: f32,
}

/// A character as the persistence layer hands it over.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterData {
    pub guid: CharacterId,
    pub account: AccountId,
    pub name: String,
    pub race: Race,
    pub class: Class,
    pub gender: Gender,
    pub features: CharacterFeatures,
    pub stats: CharacterStats,
    pub position: CharacterPosition,
}

/// The values a CMSG_CHAR_CREATE carries; everything else is seeded from
/// the race/class defaults.
#[derive(Debug, Clone)]
pub struct CharacterCreate {
    pub name: String,
    pub race: Race,
    pub class: Class,
    pub gender: Gender,
    pub features: CharacterFeatures,
}

/// One learned skill line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skill {
    pub id: u16,
    pub level: u16,
    pub stat_level: u16,
    pub max_level: u16,
    pub max_stat_level: u16,
}

/// One known spell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spell {
    pub id: u32,
}

/// The persistence capability for characters and their skills/spells.
#[async_trait]
pub trait CharacterService: Send + Sync {
    async fn character_by_guid(
        &self,
        guid: CharacterId,
    ) -> Result<Option<CharacterData>, CharacterOpError>;

    async fn character_exists_by_name(&self, name: &str) -> Result<bool, CharacterOpError>;

    async fn characters_by_account(
        &self,
        account: AccountId,
    ) -> Result<Vec<CharacterData>, CharacterOpError>;

    /// Create a character with its default skills, spells, stats and start
    /// position in one transaction.
    async fn create_character(
        &self,
        account: AccountId,
        create: CharacterCreate,
    ) -> Result<CharacterData, CharacterCreateError>;

    /// Delete a character and everything hanging off it in one
    /// transaction. Returns false when no such character exists.
    async fn delete_character(&self, guid: CharacterId) -> Result<bool, CharacterOpError>;

    async fn skills_for(&self, guid: CharacterId) -> Result<Vec<Skill>, CharacterOpError>;

    async fn spells_for(&self, guid: CharacterId) -> Result<Vec<Spell>, CharacterOpError>;
}

/// Errors that may occur when reading or deleting characters.
#[derive(Error, Debug)]
pub enum CharacterOpError {
    #[error("persistence failure: {0}")]
    PersistError(String),
}

/// Failure modes of character creation, each with a fixed client-visible
/// result code.
#[derive(Error, Debug)]
pub enum CharacterCreateError {
    #[error("character creation failed")]
    Failed,
    #[error("a character with that name already exists")]
    NameInUse,
    #[error("unsupported race and class combination")]
    UnsupportedCombination,
}

impl CharacterCreateError {
    /// The numeric result reported back to the creation caller:
    /// 1 unspecified failure, 2 name taken, 3 unsupported combination.
    pub fn code(&self) -> u8 {
        match self {
            CharacterCreateError::Failed => 1,
            CharacterCreateError::NameInUse => 2,
            CharacterCreateError::UnsupportedCombination => 3,
        }
    }
}
