/// Board API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Secret used to sign and verify access-token JWTs (HS256).
    pub jwt_secret: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Email domains allowed to register, comma-separated in the env var.
    pub allowed_email_domains: Vec<String>,
    /// Maximum number of broadcast payloads retained for late joiners.
    pub chat_history_cap: usize,
    /// Worker ID for snowflake generation (multi-process deployments).
    pub worker_id: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_var("DATABASE_URL"),
            jwt_secret: required_var("JWT_SECRET"),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),
            allowed_email_domains: std::env::var("ALLOWED_EMAIL_DOMAINS")
                .ok()
                .filter(|s| !s.is_empty())
                .map(|s| s.split(',').map(|d| d.trim().to_lowercase()).collect())
                .unwrap_or_else(|| {
                    vec![
                        "live.unilag.edu.ng".to_string(),
                        "unilag.edu.ng".to_string(),
                        "college.edu".to_string(),
                    ]
                }),
            chat_history_cap: std::env::var("CHAT_HISTORY_CAP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(crate::gateway::history::DEFAULT_HISTORY_CAP),
            worker_id: std::env::var("WORKER_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}
