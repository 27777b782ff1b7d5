use dotenvy::dotenv;
use once_cell::sync::Lazy;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub static CONFIG: Lazy<Config> = Lazy::new(|| {
    dotenv().ok(); // Load .env file if present
    Config {
        mongo_uri: get_env("MONGO_URI"),
        mongo_db_name: get_env_or_default("MONGO_DB_NAME", "clinic_ops"),
        openai_api_key: get_env("OPENAI_API_KEY"),
        openai_base_url: get_env_or_default("OPENAI_BASE_URL", "https://api.openai.com/v1"),
        llm_model: get_env_or_default("LLM_MODEL", "gpt-4o-mini"),
        llm_timeout: Duration::from_secs(get_parsed_or_default("LLM_TIMEOUT_SECS", 60)),
        search_row_limit: get_parsed_or_default("SEARCH_ROW_LIMIT", 10),
        bind_addr: get_env_or_default("BIND_ADDR", "0.0.0.0:3000"),
        static_dir: get_env_or_default("STATIC_DIR", "static"),
    }
});

pub struct Config {
    pub mongo_uri: String,
    pub mongo_db_name: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub llm_model: String,
    pub llm_timeout: Duration,
    pub search_row_limit: i64,
    pub bind_addr: String,
    pub static_dir: String,
}

fn get_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("Missing required environment variable: {key}"))
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_parsed_or_default<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("Invalid value for environment variable {key}: {raw}")),
        Err(_) => default,
    }
}
