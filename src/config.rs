use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Wardsim";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "wardsim=info,tower_http=warn"
}

/// How often the assistant gateway polls an in-flight turn.
pub const ASSISTANT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Hard deadline for one assistant turn, submission to reply.
pub const ASSISTANT_TURN_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum chat message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Top-level server configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub assistant: AssistantConfig,
}

/// Connection settings for the remote assistant API.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub base_url: String,
    pub api_key: String,
    /// Persona id used for emergency-department scenarios.
    pub emergency_persona: String,
    /// Persona id used for clinical-instructor scenarios.
    pub clinical_persona: String,
    pub poll_interval: Duration,
    pub turn_timeout: Duration,
}

impl ServerConfig {
    /// Read configuration from `WARDSIM_*` environment variables,
    /// falling back to local-development defaults.
    pub fn from_env() -> Result<Self, String> {
        let bind_addr = env_or("WARDSIM_BIND_ADDR", "127.0.0.1:8090")
            .parse::<SocketAddr>()
            .map_err(|e| format!("Invalid WARDSIM_BIND_ADDR: {e}"))?;

        Ok(Self {
            bind_addr,
            database_path: PathBuf::from(env_or("WARDSIM_DB_PATH", "wardsim.db")),
            assistant: AssistantConfig::from_env(),
        })
    }
}

impl AssistantConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_or("WARDSIM_ASSISTANT_BASE_URL", "https://api.openai.com/v1"),
            api_key: env_or("WARDSIM_ASSISTANT_API_KEY", ""),
            emergency_persona: env_or("WARDSIM_EMERGENCY_PERSONA", ""),
            clinical_persona: env_or("WARDSIM_CLINICAL_PERSONA", ""),
            poll_interval: ASSISTANT_POLL_INTERVAL,
            turn_timeout: ASSISTANT_TURN_TIMEOUT,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_name_is_wardsim() {
        assert_eq!(APP_NAME, "Wardsim");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn turn_timeout_exceeds_poll_interval() {
        assert!(ASSISTANT_TURN_TIMEOUT > ASSISTANT_POLL_INTERVAL);
    }

    #[test]
    fn env_or_falls_back_to_default() {
        assert_eq!(env_or("WARDSIM_DOES_NOT_EXIST", "fallback"), "fallback");
    }
}
