//! # Starfield Persistence
//!
//! Snapshots (`.simstate`, lossless) and streams (`.simstream`, lossy position +
//! speed time series) for any engine implementing
//! [`starfield_simulation::StateExchange`].

pub mod error;
pub mod paths;
pub mod recorder;
pub mod replayer;
pub mod session;
pub mod snapshot;
pub mod stream;

pub use error::*;
pub use paths::*;
pub use recorder::*;
pub use replayer::*;
pub use session::*;
pub use snapshot::*;
pub use stream::*;
