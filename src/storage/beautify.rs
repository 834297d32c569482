use std::panic;

/// Pretty-prints a script
///
/// Returns `None` when the formatter fails, in which case the caller keeps
/// the raw bytes. The formatter panics on some malformed input, so it runs
/// under `catch_unwind`.
pub fn beautify_js(source: &str) -> Option<String> {
    if source.trim().is_empty() {
        return None;
    }

    let owned = source.to_string();
    let result = panic::catch_unwind(move || prettify_js::prettyprint(&owned));

    match result {
        Ok((pretty, _map)) if !pretty.trim().is_empty() => Some(pretty),
        Ok(_) => None,
        Err(_) => {
            tracing::debug!("Script formatter panicked; keeping raw script");
            None
        }
    }
}

/// Beautifies `source` if enabled, falling back to the raw text
pub fn format_script(source: &str, enabled: bool) -> String {
    if enabled {
        if let Some(pretty) = beautify_js(source) {
            return pretty;
        }
    }
    source.to_string()
}
