//! Optional config file loading. Search order: ./ranobelib.toml, then
//! $XDG_CONFIG_HOME/ranobelib/config.toml (or ~/.config/ranobelib/config.toml).

use serde::Deserialize;
use std::path::PathBuf;

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// API base URL, ending with `/`.
    pub api_base: Option<String>,
    /// Site URL used for reader links.
    pub site_base: Option<String>,
    /// HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Token store file. Default is {data_dir}/ranobelib/storage.json.
    pub storage_path: Option<PathBuf>,
    /// Default output directory for `download` when -o is not set.
    pub output_dir: Option<PathBuf>,
}

/// Search order: (1) ./ranobelib.toml, (2) $XDG_CONFIG_HOME/ranobelib/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("ranobelib.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("ranobelib").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config: Config = toml::from_str(&s)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
            tracing::debug!("loaded config from {}", path.display());
            return Ok(Some(config));
        }
    }
    Ok(None)
}
