//! Robot Control Module
//!
//! The control path layered over the agent transport.
//!
//! ```text
//! discovery ──▶ connection ──▶ drive ──▶ teardown
//!  (address)    (attribute)    (frames)   (always)
//! ```
//!
//! ## Modules
//!
//! - [`session`] - Session object shared by every stage
//! - [`discovery`] - Service-filtered scan for the robot's address
//! - [`connection`] - Connect and select the writable attribute
//! - [`drive`] - Key-driven motor command loop
//! - [`teardown`] - Disconnect, forget and exit

pub mod connection;
pub mod discovery;
pub mod drive;
pub mod session;
pub mod teardown;

pub use session::RobotSession;
