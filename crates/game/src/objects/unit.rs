use super::{BaseObject, Guid, ObjectType, UnitField};

/// Movement flag bits as the client reports them.
pub mod movement_flags {
    pub const FORWARD: u32 = 0x0000_0001;
    pub const BACKWARD: u32 = 0x0000_0002;
    pub const STRAFE_LEFT: u32 = 0x0000_0004;
    pub const STRAFE_RIGHT: u32 = 0x0000_0008;
    pub const TURN_LEFT: u32 = 0x0000_0010;
    pub const TURN_RIGHT: u32 = 0x0000_0020;
    pub const IS_FALLING: u32 = 0x0000_2000;
    pub const IS_SWIMMING: u32 = 0x0020_0000;
}

/// The most recently recorded movement block for a unit. The unit's
/// authoritative position lives on [`BaseObject`]; this mirrors what the
/// client last sent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Movement {
    pub flags: u32,
    pub time: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub orientation: f32,
    pub pitch: f32,
    pub fall_time: u32,
}

/// Per-unit movement speeds, yards per second (turn rate in radians).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Speeds {
    pub walk: f32,
    pub run: f32,
    pub run_backward: f32,
    pub swim: f32,
    pub swim_backward: f32,
    pub turn: f32,
}

impl Default for Speeds {
    fn default() -> Self {
        Self {
            walk: 2.5,
            run: 7.0,
            run_backward: 4.5,
            swim: 4.722_222_3,
            swim_backward: 2.5,
            turn: std::f32::consts::PI,
        }
    }
}

/// A Unit is an object that can move, attack and die.
#[derive(Debug, Clone)]
pub struct Unit {
    pub object: BaseObject,
    pub movement: Movement,
    pub speeds: Speeds,
}

const RACE_MASK: u32 = 0x0000_00FF;
const CLASS_MASK: u32 = 0x0000_FF00;
const GENDER_MASK: u32 = 0x00FF_0000;

impl Unit {
    pub fn new(guid: Guid, object_type: ObjectType) -> Self {
        Self {
            object: BaseObject::new(guid, object_type),
            movement: Movement::default(),
            speeds: Speeds::default(),
        }
    }

    fn bytes_0(&self) -> u32 {
        self.object.get(UnitField::Bytes0).unwrap_or(0)
    }

    pub fn race(&self) -> u32 {
        self.bytes_0() & RACE_MASK
    }

    pub fn class(&self) -> u32 {
        (self.bytes_0() & CLASS_MASK) >> 8
    }

    pub fn gender(&self) -> u32 {
        (self.bytes_0() & GENDER_MASK) >> 16
    }

    pub fn is_falling(&self) -> bool {
        self.movement.flags & movement_flags::IS_FALLING != 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bytes_0_unpacks_race_class_gender() {
        let mut unit = Unit::new(Guid::new(ObjectType::Player, 1), ObjectType::Player);
        unit.object.set(UnitField::Bytes0, 1 | (8 << 8) | (1 << 16));
        assert_eq!(unit.race(), 1);
        assert_eq!(unit.class(), 8);
        assert_eq!(unit.gender(), 1);
    }
}
