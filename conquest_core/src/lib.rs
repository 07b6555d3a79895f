//! Core crate for the conquest server.
//!
//! Resolves control-point contests once per round, tracks fleets against hull
//! quotas, and exchanges [`conquest_proto`] messages with clients. The host
//! simulation is reached only through [`WorldQuery`] and [`FactionDirectory`];
//! [`InMemoryWorld`] implements both for headless runs and tests.

pub mod aggregate;
pub mod client;
pub mod fleet;
pub mod ledger;
pub mod memory_world;
pub mod network;
pub mod owners;
pub mod resolution;
pub mod router;
pub mod scheduler;
pub mod server;
pub mod settings;
pub mod state;
pub mod transport;
pub mod world;

pub use aggregate::{aggregate, assess_blocks, CandidateGrid, Eligibility, FactionTally};
pub use client::{ClientSurface, ConquestClient};
pub use fleet::{FleetRecord, FleetRegistry, FleetStatus, GridSummary};
pub use ledger::TokenLedger;
pub use memory_world::{InMemoryWorld, ScenarioError, WorldScenario};
pub use network::{FrameClient, FrameServer};
pub use owners::{EntityId, FactionDirectory, FactionId, FleetOwner, PlayerId};
pub use resolution::{
    pick_winner, rank_reward_destinations, resolve_control_point, resolve_round,
    ControlPointOutcome, ControlPointResult, RoundError, RoundReport, WinnerSelection,
};
pub use router::{Dispatch, LocalIdentity, MessageHandler, MessageRouter, RouterError};
pub use scheduler::{RoundGuard, Scheduler, SchedulerError, ThreadScheduler};
pub use server::{ConquestServer, DerelictCompletion};
pub use settings::{
    load_settings_from_env, ConquestSettings, ControlPoint, FaultPolicy, HullRule,
    SettingsError, SettingsMetadata,
};
pub use state::{ConquestState, StateError};
pub use transport::{MemoryTransport, Transport, TransportError};
pub use world::{
    Block, BlockKind, BlockState, GridCategory, GridInfo, GridSize, InventoryHandle,
    ItemDefinition, WorldError, WorldQuery,
};
