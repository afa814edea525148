// # Service Restarter Trait
//
// Defines the interface for restarting the dependent reverse-proxy service
// after a certificate has been renewed.
//
// ## Implementations
//
// - docker CLI: `certrenew-docker` crate (`DockerRestarter`)

use async_trait::async_trait;

/// Trait for container runtime integrations
///
/// The restarter is bound to one fixed logical service name at construction.
///
/// # Errors
///
/// - [`Error::NotFound`](crate::Error::NotFound): the named service does not exist
/// - [`Error::Runtime`](crate::Error::Runtime): any other runtime or API failure
///
/// Both are logged by the engine and never abort the process.
#[async_trait]
pub trait ServiceRestarter: Send + Sync {
    /// Restart the dependent service
    async fn restart(&self) -> Result<(), crate::Error>;

    /// Logical name of the service this restarter targets
    fn target(&self) -> &str;
}
