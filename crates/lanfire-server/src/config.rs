use serde::Deserialize;

/// Top-level server configuration, loaded from `lanfire.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Directory served for every path that is not an API route.
    pub web_root: String,
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            web_root: "public".to_string(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Inbound frames per second per connection (token bucket refill rate
    /// and burst size).
    pub ws_rate_limit_per_sec: f64,
    /// Outbound frames buffered per connection before new ones are dropped.
    pub player_message_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 64,
            ws_rate_limit_per_sec: 120.0,
            player_message_buffer: 256,
        }
    }
}

impl ServerConfig {
    /// Check the config, returning a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "listen_addr {:?} is not a valid socket address",
                self.listen_addr
            ));
        }
        if self.limits.max_ws_connections == 0 {
            return Err("limits.max_ws_connections must be > 0".to_string());
        }
        let rate = self.limits.ws_rate_limit_per_sec;
        if !rate.is_finite() || rate <= 0.0 {
            return Err("limits.ws_rate_limit_per_sec must be > 0".to_string());
        }
        if self.limits.player_message_buffer == 0 {
            return Err("limits.player_message_buffer must be > 0".to_string());
        }
        if !std::path::Path::new(&self.web_root).is_dir() {
            tracing::warn!(web_root = %self.web_root, "web_root does not exist, static files will 404");
        }
        Ok(())
    }

    /// Load config from `lanfire.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("lanfire.toml") {
            Ok(content) => Self::from_toml(&content),
            Err(_) => {
                tracing::info!("No lanfire.toml found, using defaults");
                ServerConfig::default()
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn from_toml(content: &str) -> Self {
        match toml::from_str::<ServerConfig>(content) {
            Ok(cfg) => {
                tracing::info!("Loaded configuration from lanfire.toml");
                cfg
            },
            Err(e) => {
                tracing::warn!("Failed to parse lanfire.toml: {e}, using defaults");
                ServerConfig::default()
            },
        }
    }

    /// Apply overrides from a variable lookup. Empty or unparsable values are
    /// ignored.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = var("LANFIRE_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        } else if let Some(port) = var("PORT")
            && let Ok(port) = port.parse::<u16>()
        {
            let host = self
                .listen_addr
                .rsplit_once(':')
                .map_or("0.0.0.0", |(host, _)| host);
            self.listen_addr = format!("{host}:{port}");
        }
        if let Some(root) = var("LANFIRE_WEB_ROOT")
            && !root.is_empty()
        {
            self.web_root = root;
        }
        if let Some(val) = var("LANFIRE_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_ws_connections = n;
        }
        if let Some(val) = var("LANFIRE_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            self.limits.ws_rate_limit_per_sec = n;
        }
    }
}
