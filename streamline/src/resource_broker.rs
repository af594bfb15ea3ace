use std::net::TcpListener;

use crate::error::DataflowError;

/// Arbitrates host resources (currently: TCP ports) a pipeline's nodes
/// request during wiring, so two nodes in the same pipeline never collide on
/// the same port.
pub trait ResourceBroker: Send + Sync {
    /// Reserve and return an available TCP port.
    fn reserve_port(&self) -> Result<u16, DataflowError>;
}

/// The default broker: asks the OS for an ephemeral port by binding to port
/// 0, then immediately releases the listener. Good enough to avoid
/// in-process collisions; a caller racing against other processes on the
/// same host should rebind promptly.
#[derive(Debug, Default)]
pub struct TcpPortBroker;

impl ResourceBroker for TcpPortBroker {
    fn reserve_port(&self) -> Result<u16, DataflowError> {
        let listener = TcpListener::bind("0.0.0.0:0")
            .map_err(|_| DataflowError::ResourceUnavailable { resource: "tcp port".to_string() })?;
        listener
            .local_addr()
            .map(|addr| addr.port())
            .map_err(|_| DataflowError::ResourceUnavailable { resource: "tcp port".to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserves_a_nonzero_port() {
        let broker = TcpPortBroker;
        let port = broker.reserve_port().unwrap();
        assert_ne!(port, 0);
    }
}
