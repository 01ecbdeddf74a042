use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub store: StoreBackend,
    pub database: DatabaseConfig,
    pub identity: IdentityConfig,
    pub api: ApiConfig,
    pub abuse: AbuseConfig,
    pub security: SecurityConfig,
    pub plans: PlansConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    /// Upper bound for a single store call
    pub call_timeout_ms: u64,
    /// Retry idempotent reads once after a timeout or connection failure
    pub retry_reads: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub base_url: String,
    pub api_key: String,
    /// Secret the provider signs access tokens with
    pub jwt_secret: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_rate_limiting: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbuseConfig {
    pub failed_login_threshold: u32,
    pub failed_login_horizon_secs: u64,
    pub sweep_interval_secs: u64,
    /// Maximum entries evicted per lock acquisition during a sweep
    pub sweep_batch: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    /// Take the client IP from `X-Forwarded-For` (behind a trusted proxy)
    pub trust_forwarded_for: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlanLimits {
    pub credits: i64,
    pub canvases: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlansConfig {
    pub free: PlanLimits,
    pub premium: PlanLimits,
}

impl PlansConfig {
    pub fn limits_for(&self, tier: crate::types::SubscriptionTier) -> PlanLimits {
        match tier {
            crate::types::SubscriptionTier::Free => self.free,
            crate::types::SubscriptionTier::Premium => self.premium,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("CONSOLE_BIND") {
            self.server.bind = v;
        }
        if let Ok(v) = env::var("CONSOLE_PORT").or_else(|_| env::var("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("CONSOLE_STORE") {
            self.store = match v.as_str() {
                "memory" => StoreBackend::Memory,
                _ => StoreBackend::Postgres,
            };
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_CALL_TIMEOUT_MS") {
            self.database.call_timeout_ms = v.parse().unwrap_or(self.database.call_timeout_ms);
        }
        if let Ok(v) = env::var("DATABASE_RETRY_READS") {
            self.database.retry_reads = v.parse().unwrap_or(self.database.retry_reads);
        }

        // Identity provider overrides
        if let Ok(v) = env::var("IDENTITY_BASE_URL") {
            self.identity.base_url = v;
        }
        if let Ok(v) = env::var("IDENTITY_API_KEY") {
            self.identity.api_key = v;
        }
        if let Ok(v) = env::var("IDENTITY_JWT_SECRET") {
            self.identity.jwt_secret = v;
        }
        if let Ok(v) = env::var("IDENTITY_REQUEST_TIMEOUT_MS") {
            self.identity.request_timeout_ms = v.parse().unwrap_or(self.identity.request_timeout_ms);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_REQUESTS") {
            self.api.rate_limit_requests = v.parse().unwrap_or(self.api.rate_limit_requests);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_WINDOW_SECS") {
            self.api.rate_limit_window_secs = v.parse().unwrap_or(self.api.rate_limit_window_secs);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Abuse guard overrides
        if let Ok(v) = env::var("ABUSE_FAILED_LOGIN_THRESHOLD") {
            self.abuse.failed_login_threshold = v.parse().unwrap_or(self.abuse.failed_login_threshold);
        }
        if let Ok(v) = env::var("ABUSE_FAILED_LOGIN_HORIZON_SECS") {
            self.abuse.failed_login_horizon_secs = v.parse().unwrap_or(self.abuse.failed_login_horizon_secs);
        }
        if let Ok(v) = env::var("ABUSE_SWEEP_INTERVAL_SECS") {
            self.abuse.sweep_interval_secs = v.parse().unwrap_or(self.abuse.sweep_interval_secs);
        }
        if let Ok(v) = env::var("ABUSE_SWEEP_BATCH") {
            self.abuse.sweep_batch = v.parse().unwrap_or(self.abuse.sweep_batch);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ALLOWED_ORIGINS") {
            self.security.allowed_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(v) = env::var("SECURITY_TRUST_FORWARDED_FOR") {
            self.security.trust_forwarded_for = v.parse().unwrap_or(self.security.trust_forwarded_for);
        }

        // Plan limit overrides
        if let Ok(v) = env::var("PLAN_FREE_CREDITS") {
            self.plans.free.credits = v.parse().unwrap_or(self.plans.free.credits);
        }
        if let Ok(v) = env::var("PLAN_FREE_CANVASES") {
            self.plans.free.canvases = v.parse().unwrap_or(self.plans.free.canvases);
        }
        if let Ok(v) = env::var("PLAN_PREMIUM_CREDITS") {
            self.plans.premium.credits = v.parse().unwrap_or(self.plans.premium.credits);
        }
        if let Ok(v) = env::var("PLAN_PREMIUM_CANVASES") {
            self.plans.premium.canvases = v.parse().unwrap_or(self.plans.premium.canvases);
        }

        self
    }

    fn base(environment: Environment) -> Self {
        Self {
            environment,
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: 3000,
            },
            store: StoreBackend::Postgres,
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                call_timeout_ms: 10_000,
                retry_reads: true,
            },
            identity: IdentityConfig {
                base_url: "http://localhost:9999".to_string(),
                api_key: String::new(),
                jwt_secret: String::new(),
                request_timeout_ms: 10_000,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 100,
                rate_limit_window_secs: 60,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            abuse: AbuseConfig {
                failed_login_threshold: 10,
                failed_login_horizon_secs: 15 * 60,
                sweep_interval_secs: 60,
                sweep_batch: 256,
            },
            security: SecurityConfig {
                allowed_origins: vec![],
                trust_forwarded_for: false,
            },
            plans: PlansConfig {
                free: PlanLimits { credits: 100, canvases: 3 },
                premium: PlanLimits { credits: 5000, canvases: 100 },
            },
        }
    }

    pub fn development() -> Self {
        let mut config = Self::base(Environment::Development);
        config.api.enable_rate_limiting = false;
        config.api.rate_limit_requests = 1000;
        config.security.allowed_origins = vec![
            "http://localhost:3000".to_string(),
            "http://localhost:5173".to_string(),
        ];
        config
    }

    fn staging() -> Self {
        let mut config = Self::base(Environment::Staging);
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.security.allowed_origins = vec!["https://staging.example.com".to_string()];
        config
    }

    fn production() -> Self {
        let mut config = Self::base(Environment::Production);
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.database.call_timeout_ms = 5_000;
        config.identity.request_timeout_ms = 5_000;
        config.security.allowed_origins = vec!["https://app.example.com".to_string()];
        config.security.trust_forwarded_for = true;
        config
    }

    /// Configuration used by tests: in-memory store, fixed secret, rate limiting on,
    /// client IP taken from `X-Forwarded-For`.
    pub fn for_tests() -> Self {
        let mut config = Self::base(Environment::Development);
        config.store = StoreBackend::Memory;
        config.identity.jwt_secret = "test-secret".to_string();
        config.security.allowed_origins = vec!["https://console.example.com".to_string()];
        config.security.trust_forwarded_for = true;
        config
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
