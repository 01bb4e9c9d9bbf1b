use crate::services::KnowledgeBaseRef;
use secrecy::SecretString;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

/// Answer persisted and returned when the generation service fails.
pub const DEFAULT_FALLBACK_ANSWER: &str = "⚠️ Bedrock failed to respond";

/// Placeholder identity used by the prompt endpoint when no claims are present.
pub const DEFAULT_ANONYMOUS_USER_ID: &str = "TEST_USER";

const DEFAULT_GENERATION_ENDPOINT: &str = "https://bedrock-agent-runtime.us-east-1.amazonaws.com";
const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub common: core_config::Config,
    pub store: StoreConfig,
    pub knowledge_base: KnowledgeBaseConfig,
    pub auth: AuthConfig,
    /// Login is only served when a user pool client is configured.
    pub cognito: Option<CognitoConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    MongoDb,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(StoreBackend::MongoDb),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "unknown CHAT_STORE_BACKEND '{}', expected 'mongodb' or 'memory'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Required when `backend` is MongoDB.
    pub mongodb_uri: Option<String>,
    pub database: String,
    pub sessions_collection: String,
    pub messages_collection: String,
}

/// Fixed knowledge-base reference sent with every generation call.
#[derive(Debug, Clone)]
pub struct KnowledgeBaseConfig {
    pub knowledge_base_id: String,
    pub model_arn: String,
    pub endpoint: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
    pub fallback_answer: String,
}

impl KnowledgeBaseConfig {
    pub fn reference(&self) -> KnowledgeBaseRef {
        KnowledgeBaseRef {
            knowledge_base_id: self.knowledge_base_id.clone(),
            model_arn: self.model_arn.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TokenVerification {
    /// HS256 with a shared secret.
    SharedSecret(SecretString),
    /// RS256 with a PEM public key read from disk.
    PublicKeyPath(String),
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub verification: TokenVerification,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub anonymous_user_id: String,
    pub enforce_session_ownership: bool,
}

#[derive(Debug, Clone)]
pub struct CognitoConfig {
    pub region: String,
    pub client_id: String,
}

impl ChatConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let backend: StoreBackend =
            get_env("CHAT_STORE_BACKEND", Some("mongodb"), is_prod)?.parse()?;
        let mongodb_uri = match backend {
            StoreBackend::MongoDb => Some(get_env("MONGODB_URI", None, is_prod)?),
            StoreBackend::Memory => get_optional_env("MONGODB_URI"),
        };

        let verification = match (
            get_optional_env("JWT_SECRET"),
            get_optional_env("JWT_PUBLIC_KEY_PATH"),
        ) {
            (_, Some(path)) => TokenVerification::PublicKeyPath(path),
            (Some(secret), None) => TokenVerification::SharedSecret(SecretString::new(secret)),
            (None, None) => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "either JWT_SECRET or JWT_PUBLIC_KEY_PATH must be set"
                )))
            }
        };

        let cognito = get_optional_env("COGNITO_CLIENT_ID")
            .map(|client_id| -> Result<CognitoConfig, AppError> {
                Ok(CognitoConfig {
                    region: get_env("COGNITO_REGION", Some("us-east-1"), is_prod)?,
                    client_id,
                })
            })
            .transpose()?;

        Ok(ChatConfig {
            common: common_config,
            store: StoreConfig {
                backend,
                mongodb_uri,
                database: get_env("MONGODB_DATABASE", Some("chat_db"), is_prod)?,
                sessions_collection: get_env("CHAT_SESSIONS_TABLE", Some("ChatSessions"), false)?,
                messages_collection: get_env("CHAT_MESSAGES_TABLE", Some("ChatMessages"), false)?,
            },
            knowledge_base: KnowledgeBaseConfig {
                knowledge_base_id: get_env("KNOWLEDGE_BASE_ID", None, is_prod)?,
                model_arn: get_env("MODEL_ARN", None, is_prod)?,
                endpoint: get_env(
                    "GENERATION_ENDPOINT",
                    Some(DEFAULT_GENERATION_ENDPOINT),
                    is_prod,
                )?,
                api_key: get_optional_env("GENERATION_API_KEY").map(SecretString::new),
                timeout_secs: parse_timeout_secs(&get_env(
                    "GENERATION_TIMEOUT_SECS",
                    Some(&DEFAULT_GENERATION_TIMEOUT_SECS.to_string()),
                    false,
                )?)?,
                fallback_answer: get_env(
                    "GENERATION_FALLBACK_ANSWER",
                    Some(DEFAULT_FALLBACK_ANSWER),
                    false,
                )?,
            },
            auth: AuthConfig {
                verification,
                issuer: get_optional_env("JWT_ISSUER"),
                audience: get_optional_env("JWT_AUDIENCE"),
                anonymous_user_id: get_env(
                    "ANONYMOUS_USER_ID",
                    Some(DEFAULT_ANONYMOUS_USER_ID),
                    false,
                )?,
                enforce_session_ownership: parse_bool(&get_env(
                    "ENFORCE_SESSION_OWNERSHIP",
                    Some("true"),
                    false,
                )?)?,
            },
            cognito,
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::ConfigError(anyhow::anyhow!(
            "expected a boolean, got '{}'",
            other
        ))),
    }
}

fn parse_timeout_secs(value: &str) -> Result<u64, AppError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(AppError::ConfigError(anyhow::anyhow!(
            "GENERATION_TIMEOUT_SECS must be a positive number of seconds, got '{}'",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_backend_parses_known_names() {
        assert_eq!("mongodb".parse::<StoreBackend>().unwrap(), StoreBackend::MongoDb);
        assert_eq!(" Memory ".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("dynamodb".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("TRUE").unwrap());
        assert!(parse_bool("1").unwrap());
        assert!(!parse_bool("off").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn timeout_must_be_positive_integer() {
        assert_eq!(parse_timeout_secs("60").unwrap(), 60);
        assert_eq!(parse_timeout_secs(" 5 ").unwrap(), 5);
        assert!(parse_timeout_secs("sixty").is_err());
        assert!(parse_timeout_secs("0").is_err());
        assert!(parse_timeout_secs("-1").is_err());
    }

    #[test]
    fn get_env_falls_back_to_default_outside_prod() {
        let value = get_env("CHAT_SERVICE_TEST_UNSET_KEY", Some("fallback"), false).unwrap();
        assert_eq!(value, "fallback");
    }

    #[test]
    fn get_env_requires_value_in_prod() {
        assert!(get_env("CHAT_SERVICE_TEST_UNSET_KEY", Some("fallback"), true).is_err());
        assert!(get_env("CHAT_SERVICE_TEST_UNSET_KEY", None, false).is_err());
    }
}
