use std::collections::HashMap;

use derive_more::Display;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::update::ObjectUpdate;

/// A 64-bit globally unique object identifier. The low word is the
/// store-side id (or a generated value), the high word carries the object
/// type tag.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display(fmt = "{:#018x}", _0)]
pub struct Guid(pub u64);

impl Guid {
    pub fn new(object_type: ObjectType, low: u32) -> Self {
        Self((u64::from(u8::from(object_type)) << 32) | u64::from(low))
    }

    pub fn low(&self) -> u32 {
        self.0 as u32
    }

    pub fn high(&self) -> u32 {
        (self.0 >> 32) as u32
    }
}

/// The object type tag.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
pub enum ObjectType {
    Object = 0,
    Item = 1,
    Container = 2,
    Unit = 3,
    Player = 4,
    GameObject = 5,
    DynamicObject = 6,
    Corpse = 7,
}

/// The cumulative type mask written into the TYPE field; each concrete
/// type also carries the bits of everything it extends.
pub fn type_mask(object_type: ObjectType) -> u32 {
    match object_type {
        ObjectType::Object => 0x01,
        ObjectType::Item => 0x03,
        ObjectType::Container => 0x07,
        ObjectType::Unit => 0x09,
        ObjectType::Player => 0x19,
        ObjectType::GameObject => 0x21,
        ObjectType::DynamicObject => 0x41,
        ObjectType::Corpse => 0x81,
    }
}

/// A location in the world.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub map: u32,
    pub zone: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub orientation: f32,
}

/// The data every world object carries: its GUID, type tag, position, and
/// the dense field table the replication engine diffs.
///
/// `fields` is the live view; `synced` is the snapshot as of the last
/// update record taken. Field writes are serialised by the per-object
/// lock the registry wraps around the owning object.
#[derive(Debug, Clone)]
pub struct BaseObject {
    guid: Guid,
    object_type: ObjectType,
    pub position: Position,
    fields: HashMap<u16, u32>,
    synced: HashMap<u16, u32>,
}

impl BaseObject {
    pub fn new(guid: Guid, object_type: ObjectType) -> Self {
        Self {
            guid,
            object_type,
            position: Position::default(),
            fields: HashMap::new(),
            synced: HashMap::new(),
        }
    }

    pub fn guid(&self) -> Guid {
        self.guid
    }

    /// Replace the GUID; only the registry does this, before the object
    /// is visible to anyone else.
    pub(super) fn set_guid(&mut self, guid: Guid) {
        self.guid = guid;
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn get(&self, index: impl Into<u16>) -> Option<u32> {
        self.fields.get(&index.into()).copied()
    }

    pub fn set(&mut self, index: impl Into<u16>, value: u32) {
        self.fields.insert(index.into(), value);
    }

    pub fn set_f32(&mut self, index: impl Into<u16>, value: f32) {
        self.set(index, value.to_bits());
    }

    /// Write a two-word field (GUID references).
    pub fn set_u64(&mut self, index: impl Into<u16>, value: u64) {
        let index = index.into();
        self.fields.insert(index, value as u32);
        self.fields.insert(index + 1, (value >> 32) as u32);
    }

    /// Diff the live fields against the last-synced snapshot and collect
    /// an update record over exactly the words whose bit pattern changed,
    /// in ascending field order. Returns `None` when nothing is dirty.
    /// Advances the snapshot.
    pub fn take_update(&mut self) -> Option<ObjectUpdate> {
        let mut dirty: Vec<(u16, u32)> = self
            .fields
            .iter()
            .filter(|&(index, value)| self.synced.get(index) != Some(value))
            .map(|(&index, &value)| (index, value))
            .collect();

        if dirty.is_empty() {
            return None;
        }
        dirty.sort_unstable_by_key(|&(index, _)| index);

        let mut update = ObjectUpdate::new();
        for (index, value) in dirty {
            update.add_u32(index, value);
        }
        self.synced = self.fields.clone();
        Some(update)
    }

    /// Collect every set field into a record, for the create block shown
    /// to a fresh subscriber. Does not advance the snapshot: the view an
    /// observer gets must not swallow diffs still owed to everyone else.
    pub fn create_view(&self) -> ObjectUpdate {
        let mut all: Vec<(u16, u32)> = self.fields.iter().map(|(&i, &v)| (i, v)).collect();
        all.sort_unstable_by_key(|&(index, _)| index);

        let mut update = ObjectUpdate::new();
        for (index, value) in all {
            update.add_u32(index, value);
        }
        update
    }

    /// Like [`Self::create_view`], but also advances the snapshot. Used
    /// for the owner's first create block, after which only diffs flow.
    pub fn full_update(&mut self) -> ObjectUpdate {
        let update = self.create_view();
        self.synced = self.fields.clone();
        update
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::objects::{ObjectField, UnitField};

    #[test]
    fn guid_packs_type_into_the_high_word() {
        let guid = Guid::new(ObjectType::Player, 0xDEAD);
        assert_eq!(guid.low(), 0xDEAD);
        assert_eq!(guid.high(), 4);
    }

    #[test]
    fn take_update_covers_exactly_the_changed_words() {
        let mut object = BaseObject::new(Guid::new(ObjectType::Player, 1), ObjectType::Player);
        object.set(UnitField::Health, 100);
        object.set(UnitField::Level, 1);
        assert!(object.take_update().is_some());

        // Re-assigning the same bit pattern is not dirty.
        object.set(UnitField::Health, 100);
        assert!(object.take_update().is_none());

        object.set(UnitField::Health, 80);
        let update = object.take_update().expect("health changed");
        assert_eq!(update.to_bytes()[1..5], (1u32 << 0x16).to_le_bytes());
    }

    #[test]
    fn float_dirtiness_is_bit_exact() {
        let mut object = BaseObject::new(Guid::new(ObjectType::Player, 1), ObjectType::Player);
        object.set_f32(ObjectField::ScaleX, 1.0);
        object.take_update();

        object.set_f32(ObjectField::ScaleX, 1.0);
        assert!(object.take_update().is_none());
        object.set_f32(ObjectField::ScaleX, 1.0 + f32::EPSILON);
        assert!(object.take_update().is_some());
    }
}
