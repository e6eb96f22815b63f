use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Browserless rendering service
    pub browserless_url: String,
    pub browserless_token: Option<String>,

    // Browsing-agent runner service
    pub agent_url: String,
    pub agent_token: Option<String>,

    // Web server
    pub api_host: String,
    pub api_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            browserless_url: required_env("BROWSERLESS_URL"),
            browserless_token: env::var("BROWSERLESS_TOKEN").ok(),
            agent_url: required_env("AGENT_URL"),
            agent_token: env::var("AGENT_TOKEN").ok(),
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "8002".to_string())
                .parse()
                .expect("API_PORT must be a number"),
        }
    }
}

/// Strategy identifiers, in the order the orchestrator runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Direct,
    Search,
    Agent,
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Ok(StrategyKind::Direct),
            "search" => Ok(StrategyKind::Search),
            "agent" => Ok(StrategyKind::Agent),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

/// Operational tuning. The scraping targets' rate-limiting behavior is a
/// tuning concern, so every retry/backoff/delay literal lives here as a
/// named field with its default.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// Max age of a persisted link before re-discovery.
    pub freshness_ttl: Duration,
    /// Strategy priority order per target.
    pub strategy_order: Vec<StrategyKind>,
    /// Page navigation timeout.
    pub navigation_timeout: Duration,
    /// Post-load settle delay for client-side rendering.
    pub settle_delay: Duration,
    /// Retry budget per search query variant.
    pub search_max_retries: u32,
    /// Randomized per-domain delay bounds before each search request.
    pub rate_limit_min: Duration,
    pub rate_limit_max: Duration,
    /// Stop scanning further selector sources once this many candidate
    /// links have been collected.
    pub search_min_links: usize,
    /// Cap on candidate links returned by the search strategy.
    pub search_max_links: usize,
    /// Agent step budget.
    pub agent_max_steps: u32,
    /// Randomized pause bounds between targets.
    pub inter_target_min: Duration,
    pub inter_target_max: Duration,
    /// Extra pause between locality groups.
    pub locality_pause: Duration,
    /// Sleep between full cycles.
    pub cycle_interval: Duration,
    /// Cooldown after a cycle-level failure.
    pub failure_cooldown: Duration,
    /// Cap on localities enumerated per cycle (0 = unlimited).
    pub max_localities_per_cycle: usize,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            freshness_ttl: Duration::from_secs(24 * 3600),
            strategy_order: vec![
                StrategyKind::Direct,
                StrategyKind::Search,
                StrategyKind::Agent,
            ],
            navigation_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(3),
            search_max_retries: 3,
            rate_limit_min: Duration::from_secs(2),
            rate_limit_max: Duration::from_secs(4),
            search_min_links: 5,
            search_max_links: 20,
            agent_max_steps: 40,
            inter_target_min: Duration::from_secs(10),
            inter_target_max: Duration::from_secs(30),
            locality_pause: Duration::from_secs(30),
            cycle_interval: Duration::from_secs(12 * 3600),
            failure_cooldown: Duration::from_secs(300),
            max_localities_per_cycle: 0,
        }
    }
}

impl Tuning {
    /// Apply environment overrides on top of the defaults.
    pub fn from_env() -> Self {
        let mut tuning = Self::default();
        if let Some(hours) = parse_env::<u64>("FRESHNESS_TTL_HOURS") {
            tuning.freshness_ttl = Duration::from_secs(hours * 3600);
        }
        if let Ok(order) = env::var("STRATEGY_ORDER") {
            let parsed: Result<Vec<StrategyKind>, _> =
                order.split(',').map(str::parse).collect();
            match parsed {
                Ok(kinds) if !kinds.is_empty() => tuning.strategy_order = kinds,
                _ => panic!("STRATEGY_ORDER must be a comma list of direct|search|agent"),
            }
        }
        if let Some(secs) = parse_env::<u64>("INTER_TARGET_MIN_SECS") {
            tuning.inter_target_min = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_env::<u64>("INTER_TARGET_MAX_SECS") {
            tuning.inter_target_max = Duration::from_secs(secs);
        }
        if let Some(hours) = parse_env::<u64>("CYCLE_INTERVAL_HOURS") {
            tuning.cycle_interval = Duration::from_secs(hours * 3600);
        }
        if let Some(steps) = parse_env::<u32>("AGENT_MAX_STEPS") {
            tuning.agent_max_steps = steps;
        }
        if let Some(cap) = parse_env::<usize>("MAX_LOCALITIES_PER_CYCLE") {
            tuning.max_localities_per_cycle = cap;
        }
        tuning
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key)
        .ok()
        .map(|v| v.parse().unwrap_or_else(|_| panic!("{key} must be a valid number")))
}
