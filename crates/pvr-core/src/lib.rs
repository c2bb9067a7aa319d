//! PVR Core - Shared types for PVR backend clients
//!
//! This crate provides the domain types shared between backend modules
//! (`pvr-addon`) and the client registry engine (`pvrd`).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod capabilities;
pub mod channel;
pub mod epg;
pub mod error;
pub mod id;
pub mod recording;
pub mod settings;
pub mod stream;
pub mod timer;

// Re-exports for convenience
pub use capabilities::Capabilities;
pub use channel::{Channel, ChannelGroup, GroupMember};
pub use epg::EpgEntry;
pub use error::{BackendError, BackendResult, ConnectError, PvrError, PvrResult, StoreError};
pub use id::{AddonId, ClientId};
pub use recording::Recording;
pub use settings::VideoSettings;
pub use stream::{
    CodecType, MenuHook, MenuHookCategory, SeekWhence, SignalStatus, StreamInfo, StreamProperties,
};
pub use timer::{Timer, TimerState};
