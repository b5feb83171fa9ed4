//! Session registry, turn sweeping and snapshot files.

#![allow(unused_imports)]

pub mod locks;
pub mod persistence;
pub mod store;
pub mod sweeper;

pub use locks::KeyedLocks;
pub use persistence::{SnapshotError, SnapshotFile};
pub use store::{SessionStore, TimeoutResolution};
pub use sweeper::{spawn_sweeper, SweeperHandle};
