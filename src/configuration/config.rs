#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path;

use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::IntoEnumIterator;
use tokio::fs;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Eq, PartialEq, EnumIter, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    ApiKey,
    ConfigFile,
    GatewayUrl,
    ImageModel,
    ImageTemperature,
    InterpreterModel,
    MaxIterations,
    OutputDir,
    ReviewModel,
    ServerHost,
    ServerPort,
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn default(key: ConfigKey) -> String {
        #[cfg(not(target_os = "macos"))]
        let config_path = dirs::cache_dir().unwrap().join("easel/config.toml");
        #[cfg(target_os = "macos")]
        let config_path = path::PathBuf::from(std::env::var("HOME").unwrap())
            .join(".config/easel/config.toml");

        let res = match key {
            ConfigKey::ApiKey => "",
            ConfigKey::GatewayUrl => "https://openrouter.ai/api",
            ConfigKey::ImageModel => "google/gemini-3-pro-image-preview",
            ConfigKey::ImageTemperature => "0.7",
            ConfigKey::InterpreterModel => "anthropic/claude-opus-4.5",
            ConfigKey::MaxIterations => "2",
            ConfigKey::OutputDir => "./figures",
            ConfigKey::ReviewModel => "anthropic/claude-opus-4.5",
            ConfigKey::ServerHost => "127.0.0.1",
            ConfigKey::ServerPort => "8080",

            // Special
            ConfigKey::ConfigFile => return config_path.to_string_lossy().to_string(),
        };

        return res.to_string();
    }

    pub async fn load(clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key))
        }

        let mut config_file = Config::default(ConfigKey::ConfigFile);
        for matches in clap_arg_matches.as_slice() {
            if let Ok(Some(arg_config_file)) =
                matches.try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }

        let config_path = path::PathBuf::from(config_file);
        if config_path.exists() {
            let toml_str = fs::read_to_string(config_path).await?;
            let doc = toml_str.parse::<toml_edit::Document>()?;

            for key in ConfigKey::iter() {
                if let Some(val) = doc.get(&key.to_string()) {
                    if let Some(val_int) = val.as_integer() {
                        Config::set(key, &val_int.to_string());
                    } else if let Some(val_float) = val.as_float() {
                        Config::set(key, &val_float.to_string());
                    } else if let Some(val_str) = val.as_str() {
                        if val_str.is_empty() {
                            continue;
                        }
                        Config::set(key, val_str);
                    }
                }
            }
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches.as_slice() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    Config::set(key, val)
                }
            }
        }

        tracing::debug!(
            gateway_url = Config::get(ConfigKey::GatewayUrl),
            interpreter_model = Config::get(ConfigKey::InterpreterModel),
            image_model = Config::get(ConfigKey::ImageModel),
            review_model = Config::get(ConfigKey::ReviewModel),
            max_iterations = Config::get(ConfigKey::MaxIterations),
            "config"
        );

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::ConfigFile {
                    return None;
                }

                if key == ConfigKey::ApiKey {
                    return Some(
                        "# Your OpenRouter credential. Prefer the OPENROUTER_API_KEY environment variable over this file.\n# api-key = \"\""
                            .to_string(),
                    );
                }

                let arg = cmd
                    .get_arguments()
                    .find(|e| return e.get_long().unwrap_or_default() == key.to_string())?;

                let mut description = arg.get_help().unwrap().to_string();
                description = description
                    .split("[default:")
                    .next()
                    .unwrap()
                    .trim()
                    .to_string();

                let default = Config::default(key);
                return Some(format!("# {description}\n{key} = \"{default}\""));
            })
            .collect::<Vec<String>>()
            .join("\n\n");

        return toml_str;
    }

    /// Numeric accessors parse leniently and fall back to defaults, bad
    /// values in a config file should not panic the process.
    pub fn image_temperature() -> f64 {
        return Config::get(ConfigKey::ImageTemperature)
            .parse::<f64>()
            .unwrap_or(0.7)
            .clamp(0.0, 1.0);
    }

    pub fn max_iterations() -> usize {
        return Config::get(ConfigKey::MaxIterations)
            .parse::<usize>()
            .unwrap_or(2);
    }

    pub fn server_port() -> u16 {
        return Config::get(ConfigKey::ServerPort)
            .parse::<u16>()
            .unwrap_or(8080);
    }
}
