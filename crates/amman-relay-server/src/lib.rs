//! Server side of the amman relay.
//!
//! - [`RelayHandler`]: the contract a relay implements, one method per
//!   request kind, and [`dispatch`], the single place requests reach it.
//! - [`serve_channel`]: the persistent-channel router.
//! - [`RestRouter`]: the stateless HTTP router.
//! - [`RelayServer`]: both routers behind one listener.
//! - [`AmmanRelayHandler`]: the reference handler, driving a validator
//!   through [`ValidatorManager`] and [`AccountPersister`].

mod accounts;
mod amman;
mod channel;
mod collaborators;
mod config;
mod error;
mod handler;
mod rest;
mod server;
mod shutdown;

pub use accounts::{
    AccountObservers, AccountStateStore, AccountStateUpdate, AccountStates,
};
pub use amman::AmmanRelayHandler;
pub use channel::serve_channel;
pub use collaborators::{
    AccountPersister, BoxError, RestartOutcome, SessionState, ValidatorManager,
};
pub use config::RelayConfig;
pub use error::ServerError;
pub use handler::{RelayHandler, dispatch};
pub use rest::RestRouter;
pub use server::{RelayServer, RelayServerBuilder};
pub use shutdown::{ServerExit, ShutdownSignal};
