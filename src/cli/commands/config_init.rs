use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::config::BidflowConfig;

pub struct ConfigInitCommand {
    pub path: PathBuf,
    pub force: bool,
}

impl ConfigInitCommand {
    pub fn new(path: String, force: bool) -> Self {
        Self {
            path: PathBuf::from(path),
            force,
        }
    }

    pub async fn execute(&self) -> Result<()> {
        if self.path.exists() && !self.force {
            println!("⚠️  {} already exists", self.path.display());
            println!("   💡 Use --force to overwrite it");
            bail!("refusing to overwrite {}", self.path.display());
        }

        BidflowConfig::default()
            .save_to_file(&self.path)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        println!("✅ Wrote default configuration to {}", self.path.display());
        println!("   🔑 Set BIDFLOW_API_TOKEN (or api.token) before talking to the API");
        Ok(())
    }
}
