//! Registry of statistics type descriptors for one experiment.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Aggregator, Descriptor, PlotType, StatisticsType};

/// Per-type overrides from the experiment file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatisticsSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Aggregator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<Vec<Aggregator>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot_type: Option<PlotType>,
}

fn default_enabled() -> bool {
    true
}

impl Default for StatisticsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            source: None,
            runs: None,
            plot: None,
            plot_type: None,
        }
    }
}

/// Read-only descriptor lookup shared by every run of an experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsCatalog {
    descriptors: BTreeMap<StatisticsType, Descriptor>,
}

impl Default for StatisticsCatalog {
    /// Every statistics type active with its built-in descriptor.
    fn default() -> Self {
        Self {
            descriptors: StatisticsType::all()
                .map(|ty| (ty, ty.default_descriptor()))
                .collect(),
        }
    }
}

impl StatisticsCatalog {
    /// Build the catalog from experiment settings.
    ///
    /// With no settings every type is active. Once any type is listed, only
    /// listed types with `enabled: true` are recorded.
    pub fn from_settings(settings: &BTreeMap<String, StatisticsSettings>) -> Result<Self, String> {
        let mut catalog = Self::default();
        if settings.is_empty() {
            return Ok(catalog);
        }

        for descriptor in catalog.descriptors.values_mut() {
            descriptor.activated = false;
        }

        for (name, entry) in settings {
            let ty: StatisticsType = name.parse()?;
            let descriptor = catalog
                .descriptors
                .get_mut(&ty)
                .ok_or_else(|| format!("no descriptor for '{}'", ty))?;
            descriptor.activated = entry.enabled;
            if let Some(source) = entry.source {
                descriptor.source_aggregator = source;
            }
            if let Some(runs) = &entry.runs {
                descriptor.run_aggregators = runs.clone();
            }
            if let Some(plot) = &entry.plot {
                descriptor.destination_plot = plot.clone();
            }
            if let Some(plot_type) = entry.plot_type {
                descriptor.plot_type = plot_type;
            }
            descriptor.validate(ty)?;
        }

        Ok(catalog)
    }

    pub fn descriptor(&self, ty: StatisticsType) -> Option<&Descriptor> {
        self.descriptors.get(&ty)
    }

    pub fn is_active(&self, ty: StatisticsType) -> bool {
        self.descriptors.get(&ty).is_some_and(|d| d.activated)
    }

    /// Active types in a stable order.
    pub fn active_types(&self) -> impl Iterator<Item = StatisticsType> + '_ {
        self.descriptors
            .iter()
            .filter(|(_, d)| d.activated)
            .map(|(ty, _)| *ty)
    }
}
