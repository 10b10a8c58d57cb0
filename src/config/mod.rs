//! Configuration for `allure_store`.
//!
//! Two shapes:
//! - [`StoreConfig`]: what a [`DefaultAllureStore`](crate::store::DefaultAllureStore)
//!   is constructed from. Matchers are trait objects, so programmatic
//!   callers can route results with arbitrary code.
//! - [`ReportConfig`]: the declarative YAML/JSON file. Matchers are label
//!   patterns compiled to regexes by [`ReportConfig::into_store_config`].
//!
//! Layering (highest wins):
//! 1. Later files passed to [`ReportConfig::merge_layers`]
//! 2. Earlier files
//! 3. Defaults

use regex::Regex;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::model::{HistoryDataPoint, KnownTestFailure, Label, label_values};
use crate::tree::{Category, CategoryMatcher, default_categories};
use crate::util::id::IdConfig;

/// Decides whether a test result belongs to an environment.
///
/// Matchers run in configuration order; the first one returning `true`
/// claims the result. An `Err` aborts ingestion of that result.
pub trait EnvironmentMatcher: Send + Sync {
    /// # Errors
    ///
    /// Implementations fail when they cannot decide.
    fn matches(&self, labels: &[Label]) -> anyhow::Result<bool>;
}

impl<F> EnvironmentMatcher for F
where
    F: Fn(&[Label]) -> anyhow::Result<bool> + Send + Sync,
{
    fn matches(&self, labels: &[Label]) -> anyhow::Result<bool> {
        self(labels)
    }
}

/// Matches when every listed label has a value fully matching its pattern.
///
/// A matcher with no patterns matches everything.
#[derive(Debug, Clone)]
pub struct LabelMatcher {
    patterns: Vec<(String, Regex)>,
}

impl LabelMatcher {
    /// Compile `label name -> pattern` pairs. Patterns are anchored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Regex` if a pattern does not compile.
    pub fn new<'a, I>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let patterns = patterns
            .into_iter()
            .map(|(name, pattern)| {
                Regex::new(&format!("^(?:{pattern})$")).map(|re| (name.to_string(), re))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Exact-value matcher for a single label.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the value is escaped before compiling.
    pub fn label_equals(name: &str, value: &str) -> Result<Self> {
        let escaped = regex::escape(value);
        Self::new([(name, escaped.as_str())])
    }
}

impl EnvironmentMatcher for LabelMatcher {
    fn matches(&self, labels: &[Label]) -> anyhow::Result<bool> {
        Ok(self.patterns.iter().all(|(name, re)| {
            label_values(labels, name)
                .into_iter()
                .any(|value| re.is_match(value))
        }))
    }
}

/// One configured environment.
pub struct EnvironmentConfig {
    pub name: String,
    pub matcher: Box<dyn EnvironmentMatcher>,
    pub variables: BTreeMap<String, String>,
}

impl EnvironmentConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, matcher: impl EnvironmentMatcher + 'static) -> Self {
        Self {
            name: name.into(),
            matcher: Box::new(matcher),
            variables: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for EnvironmentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentConfig")
            .field("name", &self.name)
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

/// Construction-time inputs of a store. Never re-read afterwards.
#[derive(Debug, Default)]
pub struct StoreConfig {
    /// Prior report runs, any order.
    pub history: Vec<HistoryDataPoint>,
    /// Known failures.
    pub known: Vec<KnownTestFailure>,
    /// Labels added to results that lack them, in insertion order.
    pub default_labels: Vec<(String, Vec<String>)>,
    /// Environments, in matching order.
    pub environments: Vec<EnvironmentConfig>,
    /// Report-level variables.
    pub variables: BTreeMap<String, String>,
    /// Ids minted for records that arrive without one.
    pub ids: IdConfig,
}

impl StoreConfig {
    #[must_use]
    pub fn with_history(mut self, history: Vec<HistoryDataPoint>) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn with_known(mut self, known: Vec<KnownTestFailure>) -> Self {
        self.known = known;
        self
    }

    /// Add (or replace) a default label.
    #[must_use]
    pub fn with_default_label<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if let Some(slot) = self.default_labels.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = values;
        } else {
            self.default_labels.push((name, values));
        }
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: EnvironmentConfig) -> Self {
        self.environments.push(environment);
        self
    }

    #[must_use]
    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

/// A default label's value: a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultLabelValue {
    One(String),
    Many(Vec<String>),
}

impl DefaultLabelValue {
    #[must_use]
    pub fn into_values(self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

/// Declarative label matcher: `labels: { env: "foo|bar" }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherSpec {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// One environment in a report config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentEntry {
    #[serde(default)]
    pub matcher: MatcherSpec,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

/// Report configuration file.
///
/// ```yaml
/// defaultLabels:
///   severity: normal
///   tag: [smoke, nightly]
/// environments:
///   linux:
///     matcher:
///       labels: { os: "linux.*" }
///     variables: { browser: firefox }
/// variables:
///   branch: main
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfig {
    #[serde(default, alias = "default_labels")]
    pub default_labels: BTreeMap<String, DefaultLabelValue>,
    /// Kept in file order: matching is first-wins.
    #[serde(default, deserialize_with = "ordered_map")]
    pub environments: Vec<(String, EnvironmentEntry)>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl ReportConfig {
    /// Load from a YAML or JSON file (by extension). Missing files return
    /// an empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Report config not found, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|e| StoreError::ConfigUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&contents)?
        } else {
            Self::from_yaml_str(&contents)?
        };
        debug!(
            path = %path.display(),
            environments = config.environments.len(),
            default_labels = config.default_labels.len(),
            "Loaded report config"
        );
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns `StoreError::Yaml` on malformed input.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// # Errors
    ///
    /// Returns `StoreError::Json` on malformed input.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Merge another config on top of this one (`other` wins).
    ///
    /// Environments with the same name are replaced in place; new ones are
    /// appended.
    pub fn merge_from(&mut self, other: &Self) {
        for (name, value) in &other.default_labels {
            self.default_labels.insert(name.clone(), value.clone());
        }
        for (name, entry) in &other.environments {
            if let Some(slot) = self.environments.iter_mut().find(|(n, _)| n == name) {
                slot.1 = entry.clone();
            } else {
                self.environments.push((name.clone(), entry.clone()));
            }
        }
        for (key, value) in &other.variables {
            self.variables.insert(key.clone(), value.clone());
        }
        if !other.categories.is_empty() {
            self.categories.clone_from(&other.categories);
        }
    }

    /// Merge layers in precedence order (lowest to highest).
    #[must_use]
    pub fn merge_layers(layers: &[Self]) -> Self {
        let mut merged = Self::default();
        for layer in layers {
            merged.merge_from(layer);
        }
        merged
    }

    /// Compiled categories, or the default defect categories when none are
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Regex` if a category pattern does not compile.
    pub fn category_matchers(&self) -> Result<Vec<CategoryMatcher>> {
        if self.categories.is_empty() {
            CategoryMatcher::compile_all(&default_categories())
        } else {
            CategoryMatcher::compile_all(&self.categories)
        }
    }

    /// Compile into a [`StoreConfig`].
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Config` naming the environment whose label
    /// pattern does not compile.
    pub fn into_store_config(
        self,
        history: Vec<HistoryDataPoint>,
        known: Vec<KnownTestFailure>,
    ) -> Result<StoreConfig> {
        let mut environments = Vec::with_capacity(self.environments.len());
        for (name, entry) in self.environments {
            let matcher = LabelMatcher::new(
                entry
                    .matcher
                    .labels
                    .iter()
                    .map(|(label, pattern)| (label.as_str(), pattern.as_str())),
            )
            .map_err(|e| StoreError::Config(format!("environment '{name}': {e}")))?;
            environments.push(EnvironmentConfig {
                name,
                matcher: Box::new(matcher),
                variables: entry.variables,
            });
        }

        Ok(StoreConfig {
            history,
            known,
            default_labels: self
                .default_labels
                .into_iter()
                .map(|(name, value)| (name, value.into_values()))
                .collect(),
            environments,
            variables: self.variables,
            ids: IdConfig::default(),
        })
    }
}

fn ordered_map<'de, D, V>(deserializer: D) -> std::result::Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct OrderedVisitor<V>(std::marker::PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of environment names to environment entries")
        }

        fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(
            self,
            mut map: A,
        ) -> std::result::Result<Self::Value, A::Error> {
            let mut entries: Vec<(String, V)> = Vec::new();
            while let Some((key, value)) = map.next_entry::<String, V>()? {
                if let Some(slot) = entries.iter_mut().find(|(k, _)| *k == key) {
                    slot.1 = value;
                } else {
                    entries.push((key, value));
                }
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedVisitor(std::marker::PhantomData))
}
