mod arena;
mod types;

pub use arena::NodeArena;
pub use types::{Geometry, NodeHandle, NodeKey, ViewNode};
