//! Routing: node discovery and session-affine target selection.

pub mod handler;
pub mod nodes;

pub use handler::{NewSessionTarget, SessionRoutingHandler, SESSION_ID_PARAM};
pub use nodes::{NodeInfoProvider, StaticNodeInfoProvider};
