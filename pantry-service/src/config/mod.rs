use axum::http::HeaderValue;
use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

const DEFAULT_MODEL_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL_NAME: &str = "openai/gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct PantryConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreConfig,
    pub model: ModelConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
    pub pantry: PantryPolicyConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" | "test" => Ok(Environment::Dev),
            "prod" | "production" => Ok(Environment::Prod),
            other => Err(format!("Unknown ENVIRONMENT '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub table: String,
    pub timeout_secs: u64,
    /// Hosted project credentials; present whenever the REST backend or
    /// delegated auth is in use.
    pub hosted: Option<HostedStoreConfig>,
}

#[derive(Debug, Clone)]
pub struct HostedStoreConfig {
    /// Project base URL, e.g. `https://<ref>.supabase.co`.
    pub url: String,
    pub key: Secret<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Rest,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rest" => Ok(StoreBackend::Rest),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("Unknown STORE_BACKEND '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api_key: Secret<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Upper bound on recipes requested per suggestion.
    pub recipe_count: u32,
    pub timeout_secs: u64,
    /// Whether the raw upstream body is echoed back on model failures.
    pub expose_upstream_errors: bool,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub strategy: AuthStrategy,
    pub static_user_id: Option<String>,
    pub jwt_secret: Option<Secret<String>>,
    pub jwt_audience: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Every request acts as one fixed user.
    Static,
    /// Bearer token is checked by the hosted auth provider.
    Delegated,
    /// Bearer token is an HS256 JWT verified with a shared secret.
    Jwt,
}

impl FromStr for AuthStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "static" => Ok(AuthStrategy::Static),
            "delegated" => Ok(AuthStrategy::Delegated),
            "jwt" => Ok(AuthStrategy::Jwt),
            other => Err(format!("Unknown AUTH_STRATEGY '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: AllowedOrigins,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl FromStr for AllowedOrigins {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let origins: Vec<String> = s
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            return Ok(AllowedOrigins::Any);
        }

        for origin in &origins {
            origin
                .parse::<HeaderValue>()
                .map_err(|e| format!("Invalid CORS origin '{}': {}", origin, e))?;
        }

        Ok(AllowedOrigins::List(origins))
    }
}

#[derive(Debug, Clone)]
pub struct PantryPolicyConfig {
    pub zero_quantity_policy: ZeroQuantityPolicy,
}

/// What updating an item's quantity to zero does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroQuantityPolicy {
    /// Remove the row.
    Delete,
    /// Keep the row with quantity 0.
    Store,
}

impl FromStr for ZeroQuantityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "delete" => Ok(ZeroQuantityPolicy::Delete),
            "store" => Ok(ZeroQuantityPolicy::Store),
            other => Err(format!("Unknown PANTRY_ZERO_QUANTITY_POLICY '{}'", other)),
        }
    }
}

impl PantryConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment: Environment = lookup("ENVIRONMENT")
            .unwrap_or_else(|| "dev".to_string())
            .parse()
            .map_err(config_error)?;

        let vars = Vars {
            lookup,
            is_prod: environment == Environment::Prod,
        };

        let auth_strategy: AuthStrategy = vars.parse("AUTH_STRATEGY", "jwt")?;
        let store_backend: StoreBackend = vars.parse("STORE_BACKEND", "rest")?;

        let hosted = if store_backend == StoreBackend::Rest
            || auth_strategy == AuthStrategy::Delegated
        {
            Some(HostedStoreConfig {
                url: vars
                    .required("STORE_URL")?
                    .trim_end_matches('/')
                    .to_string(),
                key: Secret::new(vars.required("STORE_KEY")?),
            })
        } else {
            None
        };

        let auth = AuthConfig {
            strategy: auth_strategy,
            static_user_id: match auth_strategy {
                AuthStrategy::Static => Some(vars.required("AUTH_STATIC_USER_ID")?),
                _ => None,
            },
            jwt_secret: match auth_strategy {
                AuthStrategy::Jwt => Some(Secret::new(vars.required("AUTH_JWT_SECRET")?)),
                _ => None,
            },
            jwt_audience: vars.optional("AUTH_JWT_AUDIENCE"),
        };

        let model = ModelConfig {
            api_key: Secret::new(vars.required("MODEL_API_KEY")?),
            base_url: vars
                .get("MODEL_BASE_URL", Some(DEFAULT_MODEL_BASE_URL))?
                .trim_end_matches('/')
                .to_string(),
            model: vars.get("MODEL_NAME", Some(DEFAULT_MODEL_NAME))?,
            temperature: vars.parse("MODEL_TEMPERATURE", "0.7")?,
            max_tokens: vars.parse("MODEL_MAX_TOKENS", "800")?,
            recipe_count: vars.parse("MODEL_RECIPE_COUNT", "3")?,
            timeout_secs: vars.parse("MODEL_TIMEOUT_SECS", "60")?,
            expose_upstream_errors: vars.parse("MODEL_EXPOSE_UPSTREAM_ERRORS", "true")?,
        };

        if model.recipe_count == 0 {
            return Err(config_error("MODEL_RECIPE_COUNT must be at least 1"));
        }

        Ok(PantryConfig {
            common,
            environment,
            service_name: vars.get("SERVICE_NAME", Some("pantry-service"))?,
            log_level: vars.get("LOG_LEVEL", Some("info"))?,
            otlp_endpoint: vars.optional("OTLP_ENDPOINT"),
            store: StoreConfig {
                backend: store_backend,
                table: vars.get("STORE_TABLE", Some("pantry"))?,
                timeout_secs: vars.parse("STORE_TIMEOUT_SECS", "10")?,
                hosted,
            },
            model,
            auth,
            cors: CorsConfig {
                allowed_origins: vars.parse("CORS_ALLOWED_ORIGINS", "*")?,
            },
            pantry: PantryPolicyConfig {
                zero_quantity_policy: vars.parse("PANTRY_ZERO_QUANTITY_POLICY", "delete")?,
            },
        })
    }
}

fn config_error(msg: impl Display) -> AppError {
    AppError::Config(anyhow::anyhow!("{}", msg))
}

struct Vars<F> {
    lookup: F,
    is_prod: bool,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn lookup(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    /// In production every setting must be explicit; elsewhere `default` applies.
    fn get(&self, key: &str, default: Option<&str>) -> Result<String, AppError> {
        match self.lookup(key) {
            Some(val) => Ok(val),
            None if self.is_prod => Err(config_error(format!(
                "{} is required in production but not set",
                key
            ))),
            None => default
                .map(|d| d.to_string())
                .ok_or_else(|| config_error(format!("{} is required but not set", key))),
        }
    }

    fn required(&self, key: &str) -> Result<String, AppError> {
        self.get(key, None)
    }

    fn optional(&self, key: &str) -> Option<String> {
        self.lookup(key)
    }

    fn parse<T>(&self, key: &str, default: &str) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key, Some(default))?
            .trim()
            .parse()
            .map_err(|e| config_error(format!("Invalid value for {}: {}", key, e)))
    }
}
