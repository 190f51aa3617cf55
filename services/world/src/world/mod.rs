mod chat;
mod session;
#[allow(clippy::module_inception)]
mod world;

pub use chat::{ChatManager, Outgoing, Recipients};
pub use session::{Session, SessionFlags, WorldState};
pub use world::World;
