// # ddns-core
//
// Core library for the DDNS reconciliation loop.
//
// ## Architecture Overview
//
// This library provides the core functionality for dynamic DNS updates:
// - **IpSource**: Trait for discovering the current public IP
// - **DnsProvider**: Trait for listing and updating a zone's A records
// - **DdnsEngine**: The poll → compare → update loop and its scheduler
// - **LoopState**: The last known IP, passed explicitly from cycle to cycle
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from HTTP implementations
// 2. **Explicit State**: No globals; each cycle takes and returns its state
// 3. **Never Crash on I/O**: Call failures are logged and the loop carries on
// 4. **Library-First**: All core functionality can be used as a library

pub mod traits;
pub mod engine;
pub mod config;
pub mod error;
pub mod state;

// Re-export core types for convenience
pub use traits::{IpSource, DnsProvider, DnsRecord, PublicIp};
pub use engine::{DdnsEngine, Ticker};
pub use config::{CommitPolicy, DdnsConfig, EngineConfig, IpSourceConfig, ProviderConfig};
pub use error::{Error, Result};
pub use state::{CycleOutcome, LoopState, UpdateReport};
