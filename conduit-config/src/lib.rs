// Configuration for Conduit: the mapping from API name to endpoint and authorization

pub mod api;
pub mod error;
pub mod loader;
pub mod validation;

pub use api::{ApiConfiguration, ApiPluginConfiguration, AuthorizationType, EndpointType};
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};

use std::path::Path;

/// Load the API mapping from a JSON or TOML file, picking the format from the extension
pub fn load(path: impl AsRef<Path>) -> Result<ApiPluginConfiguration> {
    let path = path.as_ref();
    ConfigLoader::auto(path)?.load_file(path)
}
