//! Pung placement calculator.
//!
//! Pure arithmetic that decides which worker instances a VM hosts. Nothing
//! in this crate touches the OS; `pung-launcher` turns its output into
//! worker invocations.
//!
//! # Components
//!
//! - **`topology`**: Global experiment size and per-VM fan-out
//! - **`placer`**: Server slices, client targets, synthetic load

pub mod error;
pub mod placer;
pub mod topology;

pub use error::{PlacementError, PlacementResult};
pub use placer::{ClientSlot, ServerSlice, assign_clients, compute_client_target, compute_server_slice, extra_tuples};
pub use topology::{GlobalTopology, PartitionMode};
