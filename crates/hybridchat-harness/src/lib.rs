//! Deterministic simulation harness for Hybridchat.
//!
//! Turmoil-based implementations of the Environment, a chat server and chat
//! participants, for reproducible tests over virtual time and a simulated
//! network. Presence expiry in particular needs tens of seconds to elapse,
//! which turmoil provides instantly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod frame_io;
pub mod sim_client;
pub mod sim_env;
pub mod sim_server;

pub use sim_client::SimClient;
pub use sim_env::{SIM_EPOCH_MILLIS, SimEnv};
pub use sim_server::SimServer;
