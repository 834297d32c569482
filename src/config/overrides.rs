use crate::config::types::Config;
use crate::ConfigError;
use std::str::FromStr;

/// Applies `MAX_URLS`, `MAX_DEPTH`, ... from the process environment
pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    apply_overrides(config, |name| std::env::var(name).ok())
}

/// Applies overrides resolved by `lookup`
///
/// Keys that `lookup` does not know are left untouched. A value that does
/// not parse is a configuration error rather than being silently ignored.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    override_value(&lookup, "MAX_URLS", &mut config.crawler.max_urls)?;
    override_value(&lookup, "MAX_DEPTH", &mut config.crawler.max_depth)?;
    override_value(&lookup, "MAX_PER_DEPTH", &mut config.crawler.max_per_depth)?;
    override_value(&lookup, "PAGE_LOAD_WAIT", &mut config.crawler.page_load_wait)?;
    override_value(&lookup, "TIMEOUT", &mut config.crawler.timeout)?;
    override_flag(&lookup, "HEADLESS", &mut config.browser.headless)?;
    override_flag(&lookup, "BEAUTIFY_SCRIPTS", &mut config.output.beautify_scripts)?;
    override_flag(
        &lookup,
        "USE_STATE_SCRIPTS",
        &mut config.browser.use_state_scripts,
    )?;
    Ok(())
}

fn override_value<F, T>(lookup: &F, name: &str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(name) {
        *slot = raw.trim().parse().map_err(|_| ConfigError::InvalidOverride {
            name: name.to_string(),
            value: raw.clone(),
        })?;
    }
    Ok(())
}

fn override_flag<F>(lookup: &F, name: &str, slot: &mut bool) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(name) {
        *slot = match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                return Err(ConfigError::InvalidOverride {
                    name: name.to_string(),
                    value: raw,
                })
            }
        };
    }
    Ok(())
}
