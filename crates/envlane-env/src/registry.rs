//! Environment registry.
//!
//! Maps an environment id (and optional registry namespace) to a concrete
//! constructor. Only the built-in namespace is compiled into this binary;
//! requesting anything else fails the `make` with a descriptive error.

use serde_json::{Map, Value};

use crate::demo::DemoEnv;
use crate::env::{EnvError, Environment};
use crate::faulty::FaultyEnv;

/// Namespace served by the built-in registry.
pub const BUILTIN_NAMESPACE: &str = "builtin";

/// Construct an environment by id.
pub fn build_env(
    env_id: &str,
    env_type: Option<&str>,
    kwargs: &Map<String, Value>,
) -> Result<Box<dyn Environment>, EnvError> {
    if let Some(namespace) = env_type {
        if namespace != BUILTIN_NAMESPACE {
            return Err(EnvError::UnknownEnvType(namespace.to_string()));
        }
    }

    match env_id {
        "demo-env" => Ok(Box::new(DemoEnv::from_kwargs(kwargs)?)),
        "faulty-env" => Ok(Box::new(FaultyEnv::from_kwargs(kwargs)?)),
        other => Err(EnvError::UnknownEnvId(other.to_string())),
    }
}
