//! lnroute core: identifiers, exact millisatoshi amounts and router
//! configuration shared by every lnroute crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::RouterConfig;
pub use error::CoreError;
pub use types::{forwarding_fee, Msat, NodeId, ShortChannelId, ShortChannelIdDir, NODE_ID_LEN};
