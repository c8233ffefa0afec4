use std::sync::Arc;

use subtle::ConstantTimeEq;

use crate::config::{AdminSettings, DeployEnvironment};
use crate::infra::runtime::Engine;

/// Shared admin secret, resolved once at start-up.
#[derive(Clone)]
pub struct AdminToken(Option<Arc<str>>);

impl AdminToken {
    pub fn new(token: Option<&str>) -> Self {
        Self(
            token
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(Arc::from),
        )
    }

    /// Constant-time comparison. With no secret configured nothing matches.
    pub fn verify(&self, candidate: &str) -> bool {
        match &self.0 {
            Some(expected) if !candidate.is_empty() => {
                bool::from(expected.as_bytes().ct_eq(candidate.as_bytes()))
            }
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct AdminState {
    pub engine: Engine,
    pub token: AdminToken,
    pub environment: DeployEnvironment,
}

impl AdminState {
    pub fn new(engine: Engine, settings: &AdminSettings) -> Self {
        Self {
            engine,
            token: AdminToken::new(settings.token.as_deref()),
            environment: settings.environment,
        }
    }
}
