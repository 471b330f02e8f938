use tracing_subscriber::EnvFilter;

use crate::env;

const QUIET_DIRECTIVES: [&str; 3] = ["sqlx=warn", "hyper=info", "warp=info"];

/// `RUST_LOG` wins when set; otherwise `LOGGING_LEVEL` picks the level.
pub fn setup_logger() {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_from(env::var_opt("LOGGING_LEVEL"))));

    for directive in QUIET_DIRECTIVES {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_ansi(true)
        .compact()
        .with_env_filter(filter)
        .init();
}

fn level_from(raw: Option<String>) -> &'static str {
    match raw.as_deref().map(str::to_ascii_uppercase).as_deref() {
        Some("DEBUG") => "debug",
        Some("WARNING") | Some("WARN") => "warn",
        Some("ERROR") | Some("CRITICAL") => "error",
        Some("TRACE") => "trace",
        _ => "info",
    }
}
