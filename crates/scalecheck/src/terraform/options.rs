use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory (inside the Terraform directory) where data shared between test stages is stored.
const TEST_DATA_DIR: &str = ".test-data";

const OPTIONS_FILE_NAME: &str = "TerraformOptions.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerraformOptions {
    pub binary: PathBuf,
    pub terraform_dir: PathBuf,
    /// Values passed with `-var`, ordered by name.
    pub vars: BTreeMap<String, serde_json::Value>,
    pub no_color: bool,
}

impl TerraformOptions {
    pub fn new(binary: PathBuf, terraform_dir: PathBuf) -> Self {
        Self {
            binary,
            terraform_dir,
            vars: Default::default(),
            no_color: true,
        }
    }

    pub fn var(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.vars.insert(name.to_string(), value.into());
        self
    }

    /// `-var name=value` arguments.
    pub fn var_args(&self) -> Vec<String> {
        self.vars
            .iter()
            .flat_map(|(name, value)| ["-var".to_string(), format!("{name}={}", format_var(value))])
            .collect()
    }
}

fn format_var(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(value) => value.clone(),
        value => value.to_string(),
    }
}

pub fn options_path(terraform_dir: &Path) -> PathBuf {
    terraform_dir.join(TEST_DATA_DIR).join(OPTIONS_FILE_NAME)
}

/// Stores the options so that later stages (possibly in another process) can load them.
pub fn save_options(options: &TerraformOptions) -> crate::Result<PathBuf> {
    let path = options_path(&options.terraform_dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, serde_json::to_vec_pretty(options)?)?;
    log::debug!("Terraform options stored in {}", path.display());
    Ok(path)
}

pub fn load_options(terraform_dir: &Path) -> crate::Result<TerraformOptions> {
    let path = options_path(terraform_dir);
    let data = std::fs::read(&path).map_err(|e| {
        crate::Error::ConfigError(format!(
            "Cannot load Terraform options from {} (was the setup stage run?): {e}",
            path.display()
        ))
    })?;
    Ok(serde_json::from_slice(&data)?)
}
