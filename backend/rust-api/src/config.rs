use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    /// Numeric identity of the operator; the only identity allowed to run
    /// privileged commands, and always treated as whitelisted.
    pub admin_id: i64,
    /// Base URL of the messenger gateway that delivers outbound renders.
    pub gateway_url: String,
    /// Contact handle shown to users without access.
    pub payment_contact: String,
    /// Hours of day (local to the deployment) at which the reminder sweep fires.
    pub reminder_hours: Vec<u32>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017/tablebot".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "tablebot".to_string());

        let admin_id = settings
            .get_string("bot.admin_id")
            .or_else(|_| env::var("ADMIN_ID"))
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or_else(|| {
                if env == "prod" {
                    panic!("FATAL: ADMIN_ID must be set in production!");
                }
                eprintln!("WARNING: Using ADMIN_ID=0 (dev mode only!)");
                0
            });

        let gateway_url = settings
            .get_string("gateway.url")
            .or_else(|_| env::var("GATEWAY_URL"))
            .unwrap_or_else(|_| "http://localhost:8090".to_string());

        let payment_contact = settings
            .get_string("bot.payment_contact")
            .or_else(|_| env::var("PAYMENT_CONTACT"))
            .unwrap_or_else(|_| "@tablebot_admin".to_string());

        let reminder_hours = settings
            .get_string("bot.reminder_hours")
            .or_else(|_| env::var("REMINDER_HOURS"))
            .map(|raw| parse_hours(&raw))
            .unwrap_or_else(|_| vec![9, 14, 19]);

        Ok(Config {
            mongo_uri,
            mongo_database,
            admin_id,
            gateway_url,
            payment_contact,
            reminder_hours,
        })
    }
}

/// Parse a comma-separated hour list, silently skipping junk entries and
/// anything outside 0..=23.
fn parse_hours(raw: &str) -> Vec<u32> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .filter(|hour| *hour < 24)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn parse_hours_accepts_valid_entries() {
        assert_eq!(parse_hours("9,14,19"), vec![9, 14, 19]);
        assert_eq!(parse_hours(" 8 , 20 "), vec![8, 20]);
    }

    #[test]
    fn parse_hours_drops_junk_and_out_of_range() {
        assert_eq!(parse_hours("7,25,abc,23"), vec![7, 23]);
        assert!(parse_hours("").is_empty());
    }

    #[test]
    #[serial]
    fn load_reads_env_overrides() {
        env::set_var("SKIP_ROOT_ENV", "1");
        env::set_var("ADMIN_ID", "42");
        env::set_var("REMINDER_HOURS", "10,21");

        let config = Config::load().expect("config should load from env");
        assert_eq!(config.admin_id, 42);
        assert_eq!(config.reminder_hours, vec![10, 21]);

        env::remove_var("SKIP_ROOT_ENV");
        env::remove_var("ADMIN_ID");
        env::remove_var("REMINDER_HOURS");
    }
}
