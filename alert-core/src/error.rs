use thiserror::Error;

/// Connectivity failures. Both are recoverable and map onto a state
/// transition in the connectivity manager.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("WiFi association failed after {attempts} attempts")]
    AssociationFailed { attempts: u32 },
    #[error("server discovery failed after {attempts} attempts")]
    DiscoveryTimeout { attempts: u32 },
}

/// Why an alert toggle was rolled back.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum AlertError {
    #[error("no WiFi connectivity")]
    NoConnectivity,
    #[error("alert server unreachable")]
    ServerUnreachable,
    #[error("alert request got no response")]
    SendFailed,
}

impl From<LinkError> for AlertError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::AssociationFailed { .. } => AlertError::NoConnectivity,
            LinkError::DiscoveryTimeout { .. } => AlertError::ServerUnreachable,
        }
    }
}
