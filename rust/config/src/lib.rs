pub mod helpers;
pub mod registry;

use async_trait::async_trait;
use figment::providers::{Env, Format, Yaml};
use serde::de::DeserializeOwned;
use tessera_error::TesseraError;

/// Builds a component from its deserialized config plus the capabilities
/// registered in a [`registry::Registry`].
#[async_trait]
pub trait Configurable<T> {
    async fn try_from_config(
        config: &T,
        registry: &registry::Registry,
    ) -> Result<Self, Box<dyn TesseraError>>
    where
        Self: Sized;
}

/// Loads `T` from a YAML file merged with environment variables.
///
/// Variables are matched after stripping `env_prefix`; a double underscore
/// separates nesting levels, so `TESSERA_INDEXER__DIM=768` sets
/// `indexer.dim`. Environment values win over the file. A missing file is not
/// an error: the environment alone (plus serde defaults) must then be enough.
pub fn load_from_path<T: DeserializeOwned>(path: &str, env_prefix: &str) -> Result<T, figment::Error> {
    // figment cannot tell a nesting underscore from a field name underscore,
    // so nesting is spelled `__` and mapped to `.` here.
    let mut f = figment::Figment::from(
        Env::prefixed(env_prefix).map(|k| k.as_str().replace("__", ".").into()),
    );
    if std::path::Path::new(path).exists() {
        f = figment::Figment::from(Yaml::file(path)).merge(f);
    }
    f.extract()
}
