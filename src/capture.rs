//! Frame acquisition: a capture thread writing into a latest-wins slot.

mod frame;
mod slot;
mod source;

pub use frame::{Frame, Rotation};
pub use slot::{FrameSlot, SlotStats};
pub use source::{CaptureDevice, DeviceFailure, FrameSource};
