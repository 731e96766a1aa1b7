//! Domain registry.
//!
//! Holds every domain config a run can be generated from. The registry is
//! an explicit value handed to callers; nothing is registered globally.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::domain::{BenchError, DomainConfig, Result, ToleranceMode};

/// Named collection of validated domain configs.
#[derive(Debug, Clone, Default)]
pub struct DomainRegistry {
    domains: BTreeMap<String, DomainConfig>,
}

impl DomainRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in domains.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(crop_yield());
        registry.register(revenue_growth());
        registry
    }

    /// Add or replace a domain. Returns the config it replaced, if any.
    pub fn register(&mut self, config: DomainConfig) -> Option<DomainConfig> {
        debug!(domain_id = %config.id, "registering domain");
        self.domains.insert(config.id.clone(), config)
    }

    pub fn get(&self, id: &str) -> Result<&DomainConfig> {
        self.domains
            .get(id)
            .ok_or_else(|| BenchError::DomainNotFound(id.to_string()))
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        self.domains.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DomainConfig> {
        self.domains.values()
    }

    /// Load a domain file and register it.
    ///
    /// Files ending in `.toml` are parsed as TOML, anything else as JSON.
    /// Returns the id of the loaded domain.
    pub fn load_file(&mut self, path: &Path) -> Result<String> {
        let raw = std::fs::read_to_string(path)?;
        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let config = if is_toml {
            DomainConfig::from_toml_str(&raw)?
        } else {
            DomainConfig::from_json_str(&raw)?
        };
        let id = config.id.clone();
        self.register(config);
        Ok(id)
    }

    /// Load every `.toml` and `.json` file in `dir`, in file-name order.
    pub fn load_dir(&mut self, dir: &Path) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let known = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| matches!(ext, "toml" | "json"));
            if path.is_file() && known {
                paths.push(path);
            }
        }
        paths.sort();
        paths.iter().map(|p| self.load_file(p)).collect()
    }
}

fn crop_yield() -> DomainConfig {
    DomainConfig::new("crop_yield", "Crop yield (bushels per acre)")
        .with_anchor("corn_iowa", 180.0, "Average Iowa corn yield (bu/acre)")
        .with_anchor("soybean_illinois", 55.0, "Average Illinois soybean yield (bu/acre)")
        .with_anchor("wheat_kansas", 45.0, "Average Kansas winter wheat yield (bu/acre)")
        .with_additive("nitrogen_boost", 12.0, "Extra nitrogen fertilizer")
        .with_additive("late_planting", -8.0, "Planting three weeks late")
        .with_additive("irrigation", 15.0, "Supplemental irrigation")
        .with_multiplicative("drought", 0.75, "Moderate summer drought")
        .with_multiplicative("ideal_rain", 1.1, "Ideal growing-season rainfall")
        .with_multiplicative("pest_outbreak", 0.85, "Rootworm outbreak")
        .with_distractor("The farmer recently repainted the barn red.")
        .with_distractor("Corn futures closed higher on Tuesday.")
        .with_distractor("The county fair is scheduled for August.")
        .with_tolerance(ToleranceMode::Fixed, 5.0)
}

fn revenue_growth() -> DomainConfig {
    DomainConfig::new("revenue_growth", "Revenue growth (percent year over year)")
        .with_anchor("saas_midmarket", 25.0, "Mid-market SaaS revenue growth (%)")
        .with_anchor("retail_chain", 4.0, "Regional retail chain revenue growth (%)")
        .with_additive("price_increase", 3.0, "Across-the-board 5% price increase")
        .with_additive("lost_key_account", -6.0, "Loss of the largest customer")
        .with_additive("new_region", 5.0, "Launch in a new sales region")
        .with_multiplicative("recession", 0.6, "Broad economic recession")
        .with_multiplicative("viral_product", 1.3, "A product launch goes viral")
        .with_distractor("The CFO was featured in a trade magazine.")
        .with_distractor("The company moved its headquarters across town.")
        .with_tolerance(ToleranceMode::Percentage, 10.0)
}
