use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tallyline_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", &["TALLYLINE_DATABASE_URL"]),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", &["TALLYLINE_DATABASE_MAX_CONNECTIONS"]),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", &["TALLYLINE_DATABASE_TIMEOUT_SECS"]),
    ));

    lines.push(render_line(
        "intake.default_category",
        &config.intake.default_category,
        source("intake.default_category", &["TALLYLINE_INTAKE_DEFAULT_CATEGORY"]),
    ));
    lines.push(render_line(
        "intake.default_cost_ratio",
        &config.intake.default_cost_ratio.to_string(),
        source("intake.default_cost_ratio", &["TALLYLINE_INTAKE_DEFAULT_COST_RATIO"]),
    ));
    lines.push(render_line(
        "intake.default_payment_method",
        config.intake.default_payment_method.label(),
        source("intake.default_payment_method", &["TALLYLINE_INTAKE_DEFAULT_PAYMENT_METHOD"]),
    ));
    lines.push(render_line(
        "intake.balance_tolerance",
        &config.intake.balance_tolerance.to_string(),
        source("intake.balance_tolerance", &["TALLYLINE_INTAKE_BALANCE_TOLERANCE"]),
    ));

    let aliases = if config.aliases.is_empty() {
        format!("built-in table ({} rules)", config.alias_table().rules().len())
    } else {
        format!("{} configured rules", config.aliases.len())
    };
    lines.push(render_line("aliases", &aliases, source("aliases", &[])));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["TALLYLINE_LOGGING_LEVEL", "TALLYLINE_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["TALLYLINE_LOGGING_FORMAT", "TALLYLINE_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("tallyline.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/tallyline.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().copied().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use toml::Value;

    use super::{contains_path, field_source, render_line};

    #[test]
    fn contains_path_walks_nested_tables() {
        let doc: Value = "[intake]\nbalance_tolerance = 2\n\n[[aliases]]\nkeyword = \"zobo\""
            .parse()
            .expect("valid toml");

        assert!(contains_path(&doc, "intake.balance_tolerance"));
        assert!(contains_path(&doc, "aliases"));
        assert!(!contains_path(&doc, "intake.default_category"));
        assert!(!contains_path(&doc, "database.url"));
    }

    #[test]
    fn file_source_names_the_config_path() {
        let doc: Value = "[database]\nurl = \"sqlite://shop.db\"".parse().expect("valid toml");
        let source = field_source(
            "database.url",
            &[],
            Some(&doc),
            Some(Path::new("config/tallyline.toml")),
        );

        assert_eq!(source, "file (config/tallyline.toml)");
        assert_eq!(
            render_line("database.url", "sqlite://shop.db", source),
            "- database.url = sqlite://shop.db (source: file (config/tallyline.toml))"
        );
    }

    #[test]
    fn unset_field_falls_back_to_default() {
        assert_eq!(field_source("logging.format", &[], None, None), "default");
    }
}
