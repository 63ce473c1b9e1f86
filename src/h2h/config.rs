//! Provider configuration

use serde::{Deserialize, Serialize};

use super::transport::TransportConfig;

/// All five provider sections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct H2hConfig {
    pub linksaja: TokenProviderConfig,
    pub payda: ApiKeyProviderConfig,
    pub topin: ApiKeyProviderConfig,
    pub dompet: ApiKeyProviderConfig,
    pub isik: BasicAuthProviderConfig,
}

/// Provider authenticated with a cached bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenProviderConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Upper bound for the cached token lifetime
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    #[serde(default)]
    pub transport: TransportConfig,
}

fn default_token_ttl_secs() -> u64 {
    3_000
}

/// Provider authenticated with a static API key header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyProviderConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Provider authenticated with HTTP basic auth
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicAuthProviderConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub transport: TransportConfig,
}
