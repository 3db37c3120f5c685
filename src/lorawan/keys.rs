//! LoRaWAN root key handling
//!
//! The AppKey is supplied by the operator (config or environment); it is
//! never generated here. OTAA session keys are derived from it on the join
//! server, so it only passes through this process on its way to TTN.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root application key bound on the application and join servers
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppKey(String);

impl AppKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key material, for request bodies only
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AppKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AppKey(***)")
    }
}
