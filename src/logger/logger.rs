use crate::settings::Log;
use anyhow::{Result, anyhow};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

/// Read before settings are available.
const LOG_ENV: &str = "TOKENWARD_LOG";

/// Client libraries that are chatty at debug level. Applied unless the
/// configured filter names them.
const QUIET_DEPENDENCIES: &[(&str, &str)] =
    &[("rdkafka", "warn"), ("sqlx", "warn"), ("redis", "warn")];

pub struct LogConfig {
    pub filter: String,
}

impl From<&Log> for LogConfig {
    fn from(log: &Log) -> Self {
        LogConfig {
            filter: log.filter.clone(),
        }
    }
}

impl LogConfig {
    pub fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::try_new(&self.filter).map_err(|e| anyhow!(e))?;
        for (target, level) in QUIET_DEPENDENCIES {
            if self.filter.contains(target) {
                continue;
            }
            filter = filter.add_directive(format!("{target}={level}").parse::<Directive>()?);
        }
        Ok(filter)
    }
}

/// Global subscriber whose filter is swapped once settings are loaded.
pub struct Logger {
    reload_handle: reload::Handle<EnvFilter, Registry>,
}

impl Logger {
    /// Starts with `TOKENWARD_LOG` when set, `info` otherwise.
    pub fn new_bootstrap() -> Self {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        let (filter, reload_handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();

        Self { reload_handle }
    }

    pub fn reload_from_config(&self, config: &LogConfig) -> Result<()> {
        let filter = config.env_filter()?;
        self.reload_handle.reload(filter).map_err(|e| anyhow!(e))?;
        tracing::debug!(filter = %config.filter, "log filter reloaded");
        Ok(())
    }
}
