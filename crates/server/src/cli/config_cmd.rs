use anyhow::Context;
use gemma_core::EngineConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::config::AppConfig;

pub async fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    let mut cfg = AppConfig::load_or_default()?;
    match args.action {
        ConfigAction::Show => println!("{}", serde_json::to_string_pretty(&cfg)?),
        ConfigAction::Set { key, value } => {
            apply(&mut cfg, &key, &value)?;
            cfg.save()?;
            println!("Set {key}.");
        }
    }
    Ok(())
}

/// Update one key. `model.*` keys edit the default engine configuration,
/// creating it on first use; `model` set to `none` removes it.
fn apply(cfg: &mut AppConfig, key: &str, value: &str) -> anyhow::Result<()> {
    if let Some(field) = key.strip_prefix("model.") {
        let model = cfg
            .model
            .get_or_insert_with(|| EngineConfig::new("", "", "", ""));
        match field {
            "tokenizer_path" => model.tokenizer_path = value.into(),
            "weights_path" => model.weights_path = value.into(),
            "model_type" => model.model_type = value.to_string(),
            "weight_type" => model.weight_type = value.to_string(),
            "max_length" => {
                model.max_length = match value {
                    "none" => None,
                    v => Some(v.parse().with_context(|| format!("invalid {key}: {v}"))?),
                }
            }
            _ => anyhow::bail!("Unknown config key: {key}"),
        }
        return Ok(());
    }

    match key {
        "host" => cfg.host = value.to_string(),
        "port" => cfg.port = value.parse().with_context(|| format!("invalid port: {value}"))?,
        "library_path" => {
            cfg.library_path = (value != "none").then(|| value.into());
        }
        "default_max_length" | "max_request_length" => {
            let n: usize = value
                .parse()
                .with_context(|| format!("invalid {key}: {value}"))?;
            if n == 0 {
                anyhow::bail!("{key} must be positive");
            }
            if key == "default_max_length" {
                cfg.default_max_length = n;
            } else {
                cfg.max_request_length = n;
            }
        }
        "model" if value == "none" => cfg.model = None,
        _ => anyhow::bail!("Unknown config key: {key}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn model_keys_build_engine_config() {
        let mut cfg = AppConfig::default();
        apply(&mut cfg, "model.tokenizer_path", "/m/tokenizer.spm").unwrap();
        apply(&mut cfg, "model.model_type", "2b-it").unwrap();
        apply(&mut cfg, "model.max_length", "1024").unwrap();

        let model = cfg.model.as_ref().unwrap();
        assert_eq!(model.tokenizer_path, PathBuf::from("/m/tokenizer.spm"));
        assert_eq!(model.model_type, "2b-it");
        assert_eq!(model.max_length, Some(1024));
        assert!(model.weight_type.is_empty());

        apply(&mut cfg, "model.max_length", "none").unwrap();
        assert_eq!(cfg.model.as_ref().unwrap().max_length, None);
        apply(&mut cfg, "model", "none").unwrap();
        assert!(cfg.model.is_none());
    }

    #[test]
    fn rejects_unknown_and_malformed_values() {
        let mut cfg = AppConfig::default();
        assert!(apply(&mut cfg, "colour", "blue").is_err());
        assert!(apply(&mut cfg, "model.colour", "blue").is_err());
        assert!(apply(&mut cfg, "port", "eighty").is_err());
        assert!(apply(&mut cfg, "max_request_length", "0").is_err());

        apply(&mut cfg, "library_path", "/opt/libgemma.so").unwrap();
        assert_eq!(cfg.library_path, Some(PathBuf::from("/opt/libgemma.so")));
        apply(&mut cfg, "library_path", "none").unwrap();
        assert!(cfg.library_path.is_none());
    }
}
