use std::sync::OnceLock;

/// Host name reported when the local name cannot be determined.
pub const UNKNOWN_HOST: &str = "unknown";

static HOSTNAME: OnceLock<String> = OnceLock::new();

/// Local host name, resolved on first use and cached for the lifetime of
/// the process.
pub fn hostname() -> &'static str {
    HOSTNAME.get_or_init(resolve)
}

fn resolve() -> String {
    match hostname::get() {
        Ok(name) => match name.into_string() {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => {
                tracing::warn!(fallback = UNKNOWN_HOST, "local hostname is empty");
                UNKNOWN_HOST.to_string()
            }
            Err(raw) => raw.to_string_lossy().into_owned(),
        },
        Err(error) => {
            tracing::warn!(%error, fallback = UNKNOWN_HOST, "failed to resolve local hostname");
            UNKNOWN_HOST.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_is_cached_and_non_empty() {
        let first = hostname();
        assert!(!first.is_empty());
        assert!(std::ptr::eq(first, hostname()));
    }
}
