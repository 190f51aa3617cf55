/// Identifies one accepted socket for the lifetime of the process.
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug)]
pub struct ClientId(pub u64);
