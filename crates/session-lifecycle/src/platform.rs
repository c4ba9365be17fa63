//! Host platform collaborator.

use client_config_and_utils::Environment;

pub trait Platform: Send + Sync {
    /// True while rendering on a server, where there is no user session.
    fn is_server_rendering(&self) -> bool;
    fn environment(&self) -> Environment;
}

/// The desktop shell: always client-side.
#[derive(Debug, Clone, Default)]
pub struct DesktopPlatform {
    environment: Environment,
}

impl DesktopPlatform {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }
}

impl Platform for DesktopPlatform {
    fn is_server_rendering(&self) -> bool {
        false
    }

    fn environment(&self) -> Environment {
        self.environment
    }
}
