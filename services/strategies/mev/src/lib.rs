//! # MEV Library - Private Bundle Submission
//!
//! ## Purpose
//!
//! Everything between a signed executor transaction and a block builder:
//! signing, pre-flight simulation and authenticated `eth_sendBundle`
//! submission to private relays.
//!
//! ## Integration Points
//!
//! - **Input Sources**: executor calldata from the bundle orchestrator
//! - **Output Destinations**: simulation service, private relays / builders
//!
//! ## Architecture Role
//!
//! ```text
//! Executor calldata → [Signer] → [Simulator] → [BundleBuilder] → [Relays]
//!                      EIP-1559    HTTP POST     victim tx first    eth_sendBundle
//! ```
//!
//! Relays and the simulator sit behind the [`BundleRelay`] and
//! [`BundleSimulator`] traits so the execution pipeline can be driven by
//! in-memory fakes.

pub mod bundle;
pub mod flashbots;
pub mod signer;
pub mod simulation;

pub use bundle::{BundleBuilder, RelayBundle};
pub use flashbots::{BundleRelay, RelayAck, RelayClient, SIGNATURE_HEADER};
pub use signer::{SignedTransaction, TransactionSigner, UnsignedTransaction};
pub use simulation::{BundleSimulator, SimulationClient, SimulationOutcome, SimulationRequest};
