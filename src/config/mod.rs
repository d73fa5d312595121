// src/config/mod.rs
pub mod labels;

pub use labels::{frontend_spec, port_index, FrontendSpec, LabelError};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Load a topology file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<TopologyConfig> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .context("Failed to read topology file")?;

    let config: TopologyConfig = if path.extension().and_then(|s| s.to_str()) == Some("yaml")
        || path.extension().and_then(|s| s.to_str()) == Some("yml")
    {
        serde_yaml::from_str(&contents).context("Failed to parse YAML topology")?
    } else {
        serde_json::from_str(&contents).context("Failed to parse JSON topology")?
    };

    config.validate()?;
    Ok(config)
}

/// Static topology consumed by the bundled static provider: the apps to
/// balance and the backend instances currently serving them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    pub apps: Vec<AppConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub id: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub backends: Vec<BackendInstance>,
}

/// One running instance of an app. `ports` lists every port the instance
/// exposes; the label `lb.portIndex` selects which one is balanced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendInstance {
    pub host: String,
    pub ports: Vec<u16>,
}

impl TopologyConfig {
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for app in &self.apps {
            if !seen.insert(app.id.as_str()) {
                bail!("Duplicate app id in topology: {}", app.id);
            }
            for backend in &app.backends {
                if backend.ports.is_empty() {
                    bail!("Backend {} of app {} exposes no ports", backend.host, app.id);
                }
            }
        }
        Ok(())
    }
}
