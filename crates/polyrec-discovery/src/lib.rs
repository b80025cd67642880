//! Instrument discovery for the market recorder.
//!
//! Periodically derives the tracked instrument window from an external
//! discovery document and hot-swaps the routing table. Sources are pluggable
//! behind the `InstrumentSource` capability: HTTP, an external fetch command,
//! or a test stub.

pub mod error;
pub mod refresh;
pub mod snapshot;
pub mod source;
pub mod window;

pub use error::{DiscoveryError, DiscoveryResult};
pub use refresh::RefreshLoop;
pub use snapshot::{DiscoveryDocument, DiscoverySnapshot};
pub use source::{CommandSource, HttpSource, InstrumentSource, DEFAULT_FETCH_TIMEOUT};
pub use window::select_instruments;
