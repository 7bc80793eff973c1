use serde_derive::Deserialize;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::{fmt::Subscriber, EnvFilter};

#[derive(Clone, Debug, Deserialize)]
pub struct Log {
    pub level: String,
    #[serde(default)]
    pub structured: bool,
}

/// setup log from an optional environment filter and the config file
///
/// if the environment filter is present, then the config is not used
pub fn setup(
    env_filter: Result<EnvFilter, tracing_subscriber::filter::FromEnvError>,
    config: Option<&Log>,
) -> Result<(), SetGlobalDefaultError> {
    let (env_filter, structured) = match (env_filter, config) {
        (Ok(env_filter), config) => (env_filter, config.map_or(false, |log| log.structured)),
        (Err(_), Some(log)) => (EnvFilter::new(&log.level), log.structured),
        (Err(_), None) => return Ok(()),
    };

    let sbuilder = Subscriber::builder()
        .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc3339())
        .with_level(true)
        .with_env_filter(env_filter);
    if structured {
        tracing::subscriber::set_global_default(sbuilder.json().finish())
    } else {
        tracing::subscriber::set_global_default(sbuilder.with_ansi(true).finish())
    }
}
