use std::sync::Weak;

use crate::{Error, Result};

/// Receives connection events from a `Socket`, on whatever thread the
/// socket delivers them.
pub trait SocketListener: Send + Sync {
    fn on_connected(&self);
    fn on_disconnected(&self);
    fn on_message(&self, text: &str);
    fn on_failure(&self, error: Error);
}

/// A duplex text connection to a node.
///
/// `connect` only starts connecting; the outcome arrives through the
/// listener as `on_connected` or `on_failure`.
pub trait Socket: Send + Sync {
    fn connect(&self, url: &str) -> Result<()>;
    fn disconnect(&self);
    fn send(&self, text: &str) -> Result<()>;
    fn set_listener(&self, listener: Weak<dyn SocketListener>);
}
