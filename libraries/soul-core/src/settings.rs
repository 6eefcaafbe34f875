/// Layered settings loading (file, then environment)
use crate::error::Result;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Load settings of type `T`
///
/// Sources, later ones overriding earlier ones:
/// 1. serde defaults on `T`
/// 2. `path`, when given and present on disk (format from the extension)
/// 3. environment variables `<PREFIX>__<FIELD>`, e.g. `SOUL_OFFLOAD__CARD_NAME`
pub fn load<T: DeserializeOwned>(path: Option<&Path>, env_prefix: &str) -> Result<T> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        if path.exists() {
            tracing::debug!(path = %path.display(), "loading settings file");
            builder = builder.add_source(config::File::from(path));
        } else {
            tracing::warn!(path = %path.display(), "settings file not found, using defaults");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix(env_prefix)
            .separator("__")
            .try_parsing(true),
    );

    let settings = builder.build()?.try_deserialize()?;
    Ok(settings)
}
