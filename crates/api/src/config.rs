//! Types for use when configuring keygrid modules.

use crate::*;
use std::sync::Mutex;

/// Denotes a type used to configure a specific keygrid module.
///
/// Note, the types defined in this struct are specifically for configuration
/// that cannot be changed at runtime, the likes of which might be found
/// in a configuration file.
///
/// Module configs follow the pattern of an inner parameter struct plus a
/// `*ModConfig` wrapper naming it, so multiple module configs can be merged
/// into one [Config] map without colliding.
///
/// It is highly recommended that you expose this struct in your module
/// docs to help devs using your module understand how to configure it.
pub trait ModConfig:
    'static
    + Sized
    + Default
    + std::fmt::Debug
    + serde::Serialize
    + serde::de::DeserializeOwned
    + Send
    + Sync
{
}

impl<T> ModConfig for T where
    T: 'static
        + Sized
        + Default
        + std::fmt::Debug
        + serde::Serialize
        + serde::de::DeserializeOwned
        + Send
        + Sync
{
}

/// Keygrid configuration.
///
/// A json map of per-module configuration, merged from module factory
/// defaults and any overrides loaded from disk. Interior mutability lets
/// factories register defaults through a shared [builder::Builder].
#[derive(Debug, Default)]
pub struct Config(Mutex<serde_json::Map<String, serde_json::Value>>);

impl Config {
    /// Merge a module config's top-level entries into this config.
    ///
    /// Called by module factories to register defaults, and by users to
    /// override parameters before modules are constructed. Later calls
    /// overwrite earlier entries key by key.
    pub fn set_module_config<M: ModConfig>(&self, m: &M) -> KgResult<()> {
        let v = serde_json::to_value(m)
            .map_err(|e| KgError::other_src("encode module config", e))?;
        let map = match v {
            serde_json::Value::Object(map) => map,
            _ => {
                return Err(KgError::other(
                    "module config must serialize to a json object",
                ))
            }
        };
        let mut lock = self.0.lock().unwrap();
        for (k, v) in map {
            lock.insert(k, v);
        }
        Ok(())
    }

    /// Extract a module config from this config map.
    ///
    /// Note that this config can be loaded from disk and edited by humans,
    /// so the serialization on the module config should be tolerant to
    /// missing properties, setting sane defaults. Extraneous properties
    /// belonging to other modules are ignored.
    pub fn get_module_config<M: ModConfig>(&self) -> KgResult<M> {
        let v = serde_json::Value::Object(self.0.lock().unwrap().clone());
        serde_json::from_value(v)
            .map_err(|e| KgError::other_src("decode module config", e))
    }

    /// Load overrides from a json string, merging over current entries.
    pub fn load_from_json(&self, json: &str) -> KgResult<()> {
        let v: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(json)
                .map_err(|e| KgError::other_src("parse config json", e))?;
        let mut lock = self.0.lock().unwrap();
        for (k, v) in v {
            lock.insert(k, v);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(
        Debug, Default, serde::Serialize, serde::Deserialize, PartialEq,
    )]
    #[serde(rename_all = "camelCase")]
    struct Mod1Config {
        #[serde(default)]
        p_a: u32,
        #[serde(default)]
        p_b: String,
    }

    #[derive(
        Debug, Default, serde::Serialize, serde::Deserialize, PartialEq,
    )]
    #[serde(rename_all = "camelCase", default)]
    struct Mod1ModConfig {
        mod1: Mod1Config,
    }

    #[test]
    fn config_usage_example() {
        let config = Config::default();
        config
            .set_module_config(&Mod1ModConfig::default())
            .unwrap();

        // unknown entries from other modules are tolerated
        config
            .load_from_json(
                r#"{
                  "modOther": { "foo": "bar" },
                  "mod1": { "pB": "test-p_b" }
                }"#,
            )
            .unwrap();

        assert_eq!(
            Mod1ModConfig {
                mod1: Mod1Config {
                    p_a: 0,
                    p_b: "test-p_b".to_string(),
                },
            },
            config.get_module_config().unwrap(),
        );
    }

    #[test]
    fn unset_module_gets_default() {
        let config = Config::default();
        assert_eq!(
            Mod1ModConfig::default(),
            config.get_module_config().unwrap(),
        );
    }
}
