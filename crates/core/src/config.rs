use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aliases::{AliasRule, AliasTable};
use crate::domain::order::PaymentMethod;

static INTERPOLATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]*)\}").expect("interpolation pattern compiles")
});

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub intake: IntakeConfig,
    /// Configured alias rules; empty means the built-in table is used.
    pub aliases: Vec<AliasRule>,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Defaults the intake pipeline falls back to when a report line leaves a value open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntakeConfig {
    pub default_category: String,
    pub default_cost_ratio: Decimal,
    pub default_payment_method: PaymentMethod,
    /// Largest |line sum - reported total| still considered balanced.
    pub balance_tolerance: Decimal,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            default_category: "Cafe".to_string(),
            default_cost_ratio: Decimal::new(40, 2),
            default_payment_method: PaymentMethod::BankTransfer,
            balance_tolerance: Decimal::ONE,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub database_max_connections: Option<u32>,
    pub log_level: Option<String>,
    pub default_category: Option<String>,
    pub default_payment_method: Option<PaymentMethod>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://tallyline.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            intake: IntakeConfig::default(),
            aliases: Vec::new(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("tallyline.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Alias table the intake pipeline should use.
    pub fn alias_table(&self) -> AliasTable {
        if self.aliases.is_empty() {
            AliasTable::builtin()
        } else {
            AliasTable::new(self.aliases.clone())
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(intake) = patch.intake {
            if let Some(default_category) = intake.default_category {
                self.intake.default_category = default_category;
            }
            if let Some(default_cost_ratio) = intake.default_cost_ratio {
                self.intake.default_cost_ratio = default_cost_ratio;
            }
            if let Some(default_payment_method) = intake.default_payment_method {
                self.intake.default_payment_method = default_payment_method;
            }
            if let Some(balance_tolerance) = intake.balance_tolerance {
                self.intake.balance_tolerance = balance_tolerance;
            }
        }

        if let Some(aliases) = patch.aliases {
            self.aliases = aliases
                .into_iter()
                .map(|alias| AliasRule::new(alias.keyword, alias.product_id, alias.category))
                .collect();
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TALLYLINE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TALLYLINE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("TALLYLINE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TALLYLINE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("TALLYLINE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TALLYLINE_INTAKE_DEFAULT_CATEGORY") {
            self.intake.default_category = value;
        }
        if let Some(value) = read_env("TALLYLINE_INTAKE_DEFAULT_COST_RATIO") {
            self.intake.default_cost_ratio =
                parse_env("TALLYLINE_INTAKE_DEFAULT_COST_RATIO", &value)?;
        }
        if let Some(value) = read_env("TALLYLINE_INTAKE_DEFAULT_PAYMENT_METHOD") {
            self.intake.default_payment_method =
                parse_env("TALLYLINE_INTAKE_DEFAULT_PAYMENT_METHOD", &value)?;
        }
        if let Some(value) = read_env("TALLYLINE_INTAKE_BALANCE_TOLERANCE") {
            self.intake.balance_tolerance =
                parse_env("TALLYLINE_INTAKE_BALANCE_TOLERANCE", &value)?;
        }

        let log_level =
            read_env("TALLYLINE_LOGGING_LEVEL").or_else(|| read_env("TALLYLINE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TALLYLINE_LOGGING_FORMAT").or_else(|| read_env("TALLYLINE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(max_connections) = overrides.database_max_connections {
            self.database.max_connections = max_connections;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(default_category) = overrides.default_category {
            self.intake.default_category = default_category;
        }
        if let Some(default_payment_method) = overrides.default_payment_method {
            self.intake.default_payment_method = default_payment_method;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_intake(&self.intake)?;
        validate_aliases(&self.aliases)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("tallyline.toml"), PathBuf::from("config/tallyline.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replaces every `${VAR}` in the raw file text with the variable's value.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut last = 0;

    for captures in INTERPOLATION.captures_iter(input) {
        let (Some(whole), Some(var)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let value = env::var(var.as_str())
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.as_str().to_string() })?;
        output.push_str(&input[last..whole.start()]);
        output.push_str(&value);
        last = whole.end();
    }

    let rest = &input[last..];
    if rest.contains("${") {
        return Err(ConfigError::UnterminatedInterpolation);
    }
    output.push_str(rest);
    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_intake(intake: &IntakeConfig) -> Result<(), ConfigError> {
    if intake.default_category.trim().is_empty() {
        return Err(ConfigError::Validation(
            "intake.default_category must not be empty".to_string(),
        ));
    }

    if intake.default_cost_ratio < Decimal::ZERO || intake.default_cost_ratio > Decimal::ONE {
        return Err(ConfigError::Validation(
            "intake.default_cost_ratio must be in range 0..=1".to_string(),
        ));
    }

    if intake.balance_tolerance < Decimal::ZERO {
        return Err(ConfigError::Validation(
            "intake.balance_tolerance must not be negative".to_string(),
        ));
    }

    Ok(())
}

fn validate_aliases(aliases: &[AliasRule]) -> Result<(), ConfigError> {
    for (index, alias) in aliases.iter().enumerate() {
        if alias.keyword.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "aliases[{index}].keyword must not be empty"
            )));
        }
        if alias.product_id.as_str().trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "aliases[{index}].product_id must not be empty (keyword `{}`)",
                alias.keyword
            )));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    intake: Option<IntakePatch>,
    aliases: Option<Vec<AliasPatch>>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct IntakePatch {
    default_category: Option<String>,
    default_cost_ratio: Option<Decimal>,
    default_payment_method: Option<PaymentMethod>,
    balance_tolerance: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct AliasPatch {
    keyword: String,
    product_id: String,
    category: String,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use rust_decimal::Decimal;
    use tempfile::TempDir;

    use super::{
        interpolate_env_vars, AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat,
    };
    use crate::domain::order::PaymentMethod;
    use crate::domain::product::ProductId;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_cafe_conventions() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.intake.default_category == "Cafe", "default category should be Cafe")?;
        ensure(
            config.intake.default_cost_ratio == Decimal::new(40, 2),
            "default cost ratio should be 0.40",
        )?;
        ensure(
            config.intake.default_payment_method == PaymentMethod::BankTransfer,
            "default payment method should be bank transfer",
        )?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )?;
        ensure(!config.alias_table().is_empty(), "built-in alias table should be used")
    }

    #[test]
    fn file_load_supports_env_interpolation_and_aliases() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_TALLYLINE_DB", "sqlite://interpolated.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("tallyline.toml");
            fs::write(
                &path,
                r#"
[database]
url = "${TEST_TALLYLINE_DB}"

[intake]
default_category = "Packaged"
default_cost_ratio = 0.5
default_payment_method = "cash"

[[aliases]]
keyword = "Cold Brew"
product_id = "p09"
category = "Cafe"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://interpolated.db",
                "database url should be interpolated from the environment",
            )?;
            ensure(config.intake.default_category == "Packaged", "category should come from file")?;
            ensure(
                config.intake.default_cost_ratio == Decimal::new(5, 1),
                "cost ratio should come from file",
            )?;
            ensure(
                config.intake.default_payment_method == PaymentMethod::Cash,
                "payment method should come from file",
            )?;

            let table = config.alias_table();
            let rule = table.best_match("one cold brew").ok_or("configured alias should match")?;
            ensure(rule.product_id == ProductId::new("p09"), "alias should target p09")
        })();

        clear_vars(&["TEST_TALLYLINE_DB"]);
        result
    }

    #[test]
    fn interpolation_reports_missing_and_unterminated_variables() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["TEST_TALLYLINE_ABSENT"]);

        let plain = interpolate_env_vars("plain = 1").map_err(|err| err.to_string())?;
        ensure(plain == "plain = 1", "text without placeholders should pass through")?;
        ensure(
            matches!(
                interpolate_env_vars("url = \"${TEST_TALLYLINE_ABSENT}\""),
                Err(ConfigError::MissingEnvInterpolation { ref var })
                    if var == "TEST_TALLYLINE_ABSENT"
            ),
            "missing variable should be named",
        )?;
        ensure(
            matches!(
                interpolate_env_vars("url = \"${OPEN"),
                Err(ConfigError::UnterminatedInterpolation)
            ),
            "unterminated placeholder should be rejected",
        )
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TALLYLINE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("TALLYLINE_INTAKE_DEFAULT_PAYMENT_METHOD", "pos");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("tallyline.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[intake]
default_payment_method = "opay"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.intake.default_payment_method == PaymentMethod::Pos,
                "env payment method should win over file and defaults",
            )
        })();

        clear_vars(&["TALLYLINE_DATABASE_URL", "TALLYLINE_INTAKE_DEFAULT_PAYMENT_METHOD"]);
        result
    }

    #[test]
    fn cost_ratio_outside_unit_range_fails_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TALLYLINE_INTAKE_DEFAULT_COST_RATIO", "1.5");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("default_cost_ratio")
            );
            ensure(has_message, "validation failure should mention default_cost_ratio")
        })();

        clear_vars(&["TALLYLINE_INTAKE_DEFAULT_COST_RATIO"]);
        result
    }

    #[test]
    fn malformed_env_override_is_reported_with_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TALLYLINE_INTAKE_DEFAULT_PAYMENT_METHOD", "cheque");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "TALLYLINE_INTAKE_DEFAULT_PAYMENT_METHOD"
                ),
                "error should name the offending variable",
            )
        })();

        clear_vars(&["TALLYLINE_INTAKE_DEFAULT_PAYMENT_METHOD"]);
        result
    }
}
