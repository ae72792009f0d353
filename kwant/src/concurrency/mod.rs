/// Sequencing primitives used to publish objects as they get created
pub mod slot;

pub use slot::{Slot, WeakSlot};
