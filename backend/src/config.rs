use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use log::warn;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub model_path: PathBuf,
    pub recommendations_path: PathBuf,
    pub static_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: num_cpus::get(),
            model_path: PathBuf::from("models/mobilenet_wrinkle_model.onnx"),
            recommendations_path: PathBuf::from("skincare_recommendations.csv"),
            static_dir: PathBuf::from("static"),
            upload_dir: PathBuf::from("static/uploads"),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Construit la configuration à partir d'une source de variables quelconque.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();

        ServerConfig {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", lookup("PORT"), defaults.port),
            workers: parse_or("WORKERS", lookup("WORKERS"), defaults.workers),
            model_path: lookup("MODEL_PATH").map(PathBuf::from).unwrap_or(defaults.model_path),
            recommendations_path: lookup("RECOMMENDATIONS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.recommendations_path),
            static_dir: lookup("STATIC_DIR").map(PathBuf::from).unwrap_or(defaults.static_dir),
            upload_dir: lookup("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            max_upload_bytes: parse_or(
                "MAX_UPLOAD_BYTES",
                lookup("MAX_UPLOAD_BYTES"),
                defaults.max_upload_bytes,
            ),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => value.parse().unwrap_or_else(|_| {
            warn!("{}={} invalide, valeur par défaut utilisée", key, value);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.model_path, PathBuf::from("models/mobilenet_wrinkle_model.onnx"));
        assert!(config.workers >= 1);
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let config = config_from(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "not-a-port"),
            ("WORKERS", "3"),
            ("RECOMMENDATIONS_PATH", "/data/recs.csv"),
        ]);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.workers, 3);
        assert_eq!(config.recommendations_path, PathBuf::from("/data/recs.csv"));
    }
}
