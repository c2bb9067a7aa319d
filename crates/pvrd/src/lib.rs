//! PVR engine - client registry, lifecycle supervisor and stream sessions
//!
//! This crate presents a dynamic set of PVR backend modules as one service:
//! - `registry` - identity → client handle map and shared session state
//! - `supervisor` - background task registering, connecting and removing clients
//! - `aggregate` / `data` - fan-out over all clients and single-client operations
//! - `stream` - the single open playback stream and channel switching
//! - `scan` - channel scans with the supervisor suspended
//! - `config` - TOML configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        PvrClients                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐  gate   ┌─────────────────────────┐    │
//! │  │   Supervisor    │◀───────▶│      ScanService        │    │
//! │  │ (poll task)     │         └────────────┬────────────┘    │
//! │  └────────┬────────┘                      │                 │
//! │           │ register/connect/remove       │ lookup          │
//! │           ▼                               ▼                 │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                     Registry                        │    │
//! │  │   Mutex<RegistryState>  ──▶  broadcast::Sender      │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │           ▲                               ▲                 │
//! │           │ snapshot                      │ session         │
//! │  ┌────────┴────────┐         ┌────────────┴────────────┐    │
//! │  │   DataService   │         │     StreamManager       │    │
//! │  │   (fan-out)     │         │  (open/switch/close)    │    │
//! │  └─────────────────┘         └─────────────────────────┘    │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//!   outside tests
//! - All fallible operations return `Result` or `Option`
//! - A failing backend is isolated; it never takes the registry down

pub mod aggregate;
pub mod clients;
pub mod config;
pub mod data;
pub mod registry;
pub mod scan;
pub mod stream;
pub mod supervisor;

pub use aggregate::Aggregated;
pub use clients::{Collaborators, PvrClients};
pub use config::{ClientsConfig, ConfigError, PvrdConfig};
pub use registry::{ClientEvent, ClientHandle, ClientInfo, Registry, RemovalReason};
pub use stream::{SettingsAction, StreamKind, StreamManager, StreamSession, SwitchOutcome};
pub use supervisor::SupervisorPass;
