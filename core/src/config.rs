//! Config/Profile Store (spec §6): loads `$WRITEFLOW_CONFIG_DIR/config.json`
//! (default `$HOME/.writeflow`), validating that every model pointer
//! resolves to a declared profile before the rest of the runtime trusts it.

use std::env;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use writeflow_protocol::Config;
use writeflow_protocol::ErrorKind;
use writeflow_protocol::RuntimeError;

pub const CONFIG_DIR_ENV: &str = "WRITEFLOW_CONFIG_DIR";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// `$WRITEFLOW_CONFIG_DIR` if set, else `$HOME/.writeflow`.
pub fn config_dir() -> Result<PathBuf, RuntimeError> {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".writeflow"))
        .ok_or_else(|| RuntimeError::new(ErrorKind::Bug, "could not resolve $HOME to locate the default config directory"))
}

/// Loads and validates `dir/config.json`. A missing file is not an error —
/// first-run callers get `Config::default()`.
pub fn load(dir: &Path) -> Result<Config, RuntimeError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        debug!(path = %path.display(), "no config file found, using defaults");
        return Ok(Config::default());
    }

    let raw = std::fs::read_to_string(&path)
        .map_err(|err| RuntimeError::new(ErrorKind::ParseError, format!("reading {}: {err}", path.display())))?;
    let config: Config = serde_json::from_str(&raw)
        .map_err(|err| RuntimeError::new(ErrorKind::ParseError, format!("parsing {}: {err}", path.display())))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<(), RuntimeError> {
    let pointers = [
        ("main", &config.model_pointers.main),
        ("task", &config.model_pointers.task),
        ("reasoning", &config.model_pointers.reasoning),
        ("quick", &config.model_pointers.quick),
    ];
    for (label, pointer) in pointers {
        let Some(name) = pointer else { continue };
        if !config.model_profiles.iter().any(|p| &p.name == name) {
            return Err(RuntimeError::new(
                ErrorKind::InvalidInput,
                format!("modelPointers.{label} references unknown profile '{name}'"),
            ));
        }
    }
    Ok(())
}

/// Maps a provider name to the environment variable holding its API key
/// (spec §6), used when a profile's `apiKey` field is left blank.
pub fn env_var_for_provider(provider: &str) -> Option<&'static str> {
    match provider {
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "deepseek" => Some("DEEPSEEK_API_KEY"),
        "kimi" => Some("KIMI_API_KEY"),
        _ => None,
    }
}
