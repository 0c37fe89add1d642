// src/resource/mod.rs

//! Bounded execution-slot allocation.
//!
//! - [`manager`] is the counting allocator ([`ResourceManager`]) and its
//!   lease type ([`Slot`]).
//! - [`slot_manager`] tracks one slot per task and supports bulk release.

pub mod manager;
pub mod slot_manager;

pub use manager::{ResourceManager, ResourceStats, Slot};
pub use slot_manager::{SlotInfo, SlotManager};
