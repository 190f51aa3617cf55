//! objects
//!
//! The shared-world object model: the dense field table every object
//! carries, the unit/player layers on top of it, the process-wide
//! registry, and the field-diff update records the replication engine
//! serialises.

mod base;
mod fields;
mod manager;
mod player;
mod unit;
mod update;

pub use base::{type_mask, BaseObject, Guid, ObjectType, Position};
pub use fields::{ObjectField, PlayerField, UnitField, OBJECT_END, PLAYER_END, UNIT_END};
pub use manager::ObjectManager;
pub use player::Player;
pub use unit::{movement_flags, Movement, Speeds, Unit};
pub use update::{ObjectUpdate, UpdateParseError};
