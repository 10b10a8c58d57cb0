//! In-memory [`AllureStore`] implementation.
//!
//! All state lives in the store instance: primary maps, secondary indexes
//! maintained on every visit, and the construction-time inputs from
//! [`StoreConfig`]. Attachment links form an arena keyed by attachment id.
//! Steps hold only the id, so updating a link here updates it for every
//! step that references it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use super::events::{EventBus, StoreEvent};
use super::{AllureStore, AttachmentFilter, ResultFilter, ResultsVisitor};
use crate::config::{EnvironmentConfig, StoreConfig};
use crate::convert::{
    ConversionState, convert_labels, test_fixture_result_raw_to_state, test_result_raw_to_state,
};
use crate::error::{Result, StoreError};
use crate::model::{
    AttachmentId, AttachmentLink, DEFAULT_ENVIRONMENT, HistoryDataPoint, HistoryTestResult,
    KnownTestFailure, Label, RawFixtureResult, RawMetadata, RawTestResult, ReaderContext,
    ResultFile, Status, TestCase, TestEnvGroup, TestFixtureResult, TestResult,
};
use crate::stats::{Statistic, increment_statistic};
use crate::util::compare::{compare_by, nulls_last, ordinal, reverse};
use crate::util::hash::attachment_id;
use crate::util::id::IdGenerator;
use crate::validation::RawResultValidator;

/// Key of the latest-result index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HistoryKey {
    pub environment: String,
    pub history_id: String,
}

impl HistoryKey {
    #[must_use]
    pub fn new(environment: impl Into<String>, history_id: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            history_id: history_id.into(),
        }
    }
}

/// The in-memory result store.
pub struct DefaultAllureStore {
    // Primary maps.
    test_results: HashMap<String, TestResult>,
    result_order: Vec<String>,
    attachments: HashMap<AttachmentId, AttachmentLink>,
    attachment_contents: HashMap<AttachmentId, Arc<dyn ResultFile>>,
    test_cases: HashMap<String, TestCase>,
    fixtures: HashMap<String, TestFixtureResult>,
    metadata: RawMetadata,

    // Secondary indexes.
    results_by_tc_id: HashMap<String, Vec<String>>,
    results_by_history_id: HashMap<String, Vec<String>>,
    attachments_by_tr_id: HashMap<String, Vec<AttachmentId>>,
    fixtures_by_tr_id: HashMap<String, Vec<String>>,
    known_by_history_id: HashMap<String, Vec<usize>>,
    latest_by_history: HashMap<HistoryKey, String>,

    // Construction-time inputs.
    history: Vec<HistoryDataPoint>,
    known: Vec<KnownTestFailure>,
    default_labels: Vec<(String, Vec<String>)>,
    environments: Vec<EnvironmentConfig>,
    variables: BTreeMap<String, String>,

    ids: IdGenerator,
    events: EventBus,
}

impl Default for DefaultAllureStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl fmt::Debug for DefaultAllureStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultAllureStore")
            .field("test_results", &self.test_results.len())
            .field("attachments", &self.attachments.len())
            .field("fixtures", &self.fixtures.len())
            .field("test_cases", &self.test_cases.len())
            .field("history", &self.history.len())
            .field("known", &self.known.len())
            .field("environments", &self.environments.len())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl DefaultAllureStore {
    /// Build a store. History is sorted newest first; known failures are
    /// indexed by history id.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        let StoreConfig {
            mut history,
            known,
            default_labels,
            environments,
            variables,
            ids,
        } = config;

        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let mut known_by_history_id: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, failure) in known.iter().enumerate() {
            known_by_history_id
                .entry(failure.history_id.clone())
                .or_default()
                .push(index);
        }

        debug!(
            history_points = history.len(),
            known_failures = known.len(),
            environments = environments.len(),
            "Created result store"
        );

        Self {
            test_results: HashMap::new(),
            result_order: Vec::new(),
            attachments: HashMap::new(),
            attachment_contents: HashMap::new(),
            test_cases: HashMap::new(),
            fixtures: HashMap::new(),
            metadata: RawMetadata::new(),
            results_by_tc_id: HashMap::new(),
            results_by_history_id: HashMap::new(),
            attachments_by_tr_id: HashMap::new(),
            fixtures_by_tr_id: HashMap::new(),
            known_by_history_id,
            latest_by_history: HashMap::new(),
            history,
            known,
            default_labels,
            environments,
            variables,
            ids: IdGenerator::new(ids),
            events: EventBus::default(),
        }
    }

    /// Register an event subscriber.
    pub fn subscribe(&mut self, subscriber: impl Fn(&StoreEvent) + Send + Sync + 'static) {
        self.events.subscribe(subscriber);
    }

    /// Known failures recorded for a history id.
    #[must_use]
    pub fn known_issues_by_history_id(&self, history_id: &str) -> Vec<&KnownTestFailure> {
        self.known_by_history_id
            .get(history_id)
            .map(|indexes| indexes.iter().filter_map(|&i| self.known.get(i)).collect())
            .unwrap_or_default()
    }

    /// Id of the visible result for `(environment, history_id)`.
    #[must_use]
    pub fn latest_result_id(&self, key: &HistoryKey) -> Option<&str> {
        self.latest_by_history.get(key).map(String::as_str)
    }

    fn apply_default_labels(&self, labels: &mut Vec<Label>) {
        for (name, values) in &self.default_labels {
            if labels.iter().any(|label| label.name == *name) {
                continue;
            }
            for value in values {
                labels.push(Label::new(name.clone(), value.clone()));
            }
        }
    }

    fn resolve_environment(&self, labels: &[Label]) -> Result<String> {
        for environment in &self.environments {
            let matched = environment.matcher.matches(labels).map_err(|source| {
                StoreError::EnvironmentMatcher {
                    environment: environment.name.clone(),
                    source,
                }
            })?;
            if matched {
                return Ok(environment.name.clone());
            }
        }
        Ok(DEFAULT_ENVIRONMENT.to_string())
    }

    /// Retry tie-break. Decides whether `tr` becomes the visible result for
    /// its key; returns the id of the result it supersedes, if any.
    fn resolve_retry(&mut self, tr: &mut TestResult) -> Option<String> {
        let history_id = tr.history_id.clone()?;
        let key = HistoryKey::new(tr.environment.clone(), history_id);

        let Some(current_id) = self.latest_by_history.get(&key).cloned() else {
            self.latest_by_history.insert(key, tr.id.clone());
            return None;
        };
        if current_id == tr.id {
            return None;
        }
        let Some(current) = self.test_results.get(&current_id) else {
            self.latest_by_history.insert(key, tr.id.clone());
            return None;
        };

        let new_wins = match (tr.start, current.start) {
            (Some(new_start), Some(current_start)) => new_start >= current_start,
            _ => true,
        };

        if new_wins {
            trace!(
                winner = %tr.id,
                hidden = %current_id,
                history_id = %key.history_id,
                "Retry supersedes previous result"
            );
            self.latest_by_history.insert(key, tr.id.clone());
            Some(current_id)
        } else {
            trace!(
                winner = %current_id,
                hidden = %tr.id,
                history_id = %key.history_id,
                "Older retry ingested late"
            );
            tr.hidden = true;
            None
        }
    }

    fn index_attachments(&mut self, tr_id: &str, attachment_ids: Vec<AttachmentId>) {
        if attachment_ids.is_empty() {
            return;
        }
        let entry = self.attachments_by_tr_id.entry(tr_id.to_string()).or_default();
        for id in attachment_ids {
            if !entry.contains(&id) {
                entry.push(id);
            }
        }
    }

    fn visible(&self, filter: ResultFilter) -> impl Iterator<Item = &TestResult> {
        self.result_order
            .iter()
            .filter_map(|id| self.test_results.get(id))
            .filter(move |tr| filter.include_hidden || !tr.hidden)
    }

    fn results_for(&self, ids: Option<&Vec<String>>) -> Vec<&TestResult> {
        ids.map(|ids| ids.iter().filter_map(|id| self.test_results.get(id)).collect())
            .unwrap_or_default()
    }
}

fn push_unique(index: &mut HashMap<String, Vec<String>>, key: &str, value: &str) {
    let entry = index.entry(key.to_string()).or_default();
    if !entry.iter().any(|v| v == value) {
        entry.push(value.to_string());
    }
}

fn sorted_by_id<'a, T>(values: impl Iterator<Item = &'a T>, id: impl Fn(&T) -> &str) -> Vec<&'a T> {
    let mut out: Vec<&T> = values.collect();
    out.sort_by(|a, b| id(a).cmp(id(b)));
    out
}

impl ResultsVisitor for DefaultAllureStore {
    fn visit_test_result(&mut self, raw: &RawTestResult, context: &ReaderContext) -> Result<()> {
        // Nothing is written until the environment matchers have run.
        RawResultValidator::validate(raw).map_err(StoreError::from_validation_errors)?;
        let mut labels = convert_labels(&raw.labels);
        self.apply_default_labels(&mut labels);
        let environment = self.resolve_environment(&labels)?;

        let results = &self.test_results;
        let taken = |id: &str| results.contains_key(id);
        let mut state = ConversionState {
            attachments: &mut self.attachments,
            test_cases: &mut self.test_cases,
            ids: &mut self.ids,
            id_taken: &taken,
        };
        let mut tr = test_result_raw_to_state(&mut state, raw, context)?;
        tr.labels = labels;
        tr.environment = environment;

        let superseded = self.resolve_retry(&mut tr);
        if let Some(id) = superseded.as_deref() {
            if let Some(previous) = self.test_results.get_mut(id) {
                previous.hidden = true;
            }
        }

        let id = tr.id.clone();
        if let Some(tc) = tr.test_case.as_ref() {
            push_unique(&mut self.results_by_tc_id, &tc.id, &id);
        }
        if let Some(history_id) = tr.history_id.as_deref() {
            push_unique(&mut self.results_by_history_id, history_id, &id);
        }
        let attachment_ids = tr.attachment_ids();

        debug!(
            id = %id,
            status = %tr.status,
            environment = %tr.environment,
            history_id = ?tr.history_id,
            hidden = tr.hidden,
            "Ingested test result"
        );

        if self.test_results.insert(id.clone(), tr).is_none() {
            self.result_order.push(id.clone());
        }
        self.index_attachments(&id, attachment_ids);
        self.events.emit(&StoreEvent::TestResult(id));
        Ok(())
    }

    fn visit_test_fixture_result(
        &mut self,
        raw: &RawFixtureResult,
        context: &ReaderContext,
    ) -> Result<()> {
        let fixtures = &self.fixtures;
        let taken = |id: &str| fixtures.contains_key(id);
        let mut state = ConversionState {
            attachments: &mut self.attachments,
            test_cases: &mut self.test_cases,
            ids: &mut self.ids,
            id_taken: &taken,
        };
        let fixture = test_fixture_result_raw_to_state(&mut state, raw, context)?;

        let id = fixture.id.clone();
        let attachment_ids = fixture.attachment_ids();
        for tr_id in &fixture.test_result_ids {
            push_unique(&mut self.fixtures_by_tr_id, tr_id, &id);
            self.index_attachments(tr_id, attachment_ids.clone());
        }

        debug!(
            id = %id,
            fixture_type = %fixture.fixture_type,
            wraps = fixture.test_result_ids.len(),
            "Ingested fixture"
        );

        self.fixtures.insert(id.clone(), fixture);
        self.events.emit(&StoreEvent::Fixture(id));
        Ok(())
    }

    fn visit_attachment_file(
        &mut self,
        file: Arc<dyn ResultFile>,
        _context: &ReaderContext,
    ) -> Result<()> {
        let id = attachment_id(file.original_file_name());
        let content_length = file.content_length();

        if let Some(link) = self.attachments.get_mut(&id) {
            link.missed = false;
            if link.ext.is_empty() {
                link.ext = file.extension().unwrap_or_default();
            }
            if link.content_type.is_none() {
                link.content_type = file.content_type();
            }
            link.content_length = Some(content_length);
        } else {
            self.attachments.insert(
                id.clone(),
                AttachmentLink {
                    id: id.clone(),
                    name: None,
                    original_file_name: file.original_file_name().to_string(),
                    ext: file.extension().unwrap_or_default(),
                    content_type: file.content_type(),
                    content_length: Some(content_length),
                    used: false,
                    missed: false,
                },
            );
        }

        debug!(
            id = %id,
            file = file.original_file_name(),
            bytes = content_length,
            "Ingested attachment file"
        );

        self.attachment_contents.insert(id.clone(), file);
        self.events.emit(&StoreEvent::AttachmentFile(id));
        Ok(())
    }

    fn visit_metadata(&mut self, record: RawMetadata) {
        trace!(keys = record.len(), "Merging reader metadata");
        self.metadata.extend(record);
    }
}

impl AllureStore for DefaultAllureStore {
    fn all_test_cases(&self) -> Vec<&TestCase> {
        sorted_by_id(self.test_cases.values(), |tc| &tc.id)
    }

    fn all_attachments(&self, filter: AttachmentFilter) -> Vec<&AttachmentLink> {
        sorted_by_id(
            self.attachments.values().filter(|link| {
                (filter.include_missed || !link.missed) && (filter.include_unused || link.used)
            }),
            |link| &link.id,
        )
    }

    fn all_metadata(&self) -> &RawMetadata {
        &self.metadata
    }

    fn all_fixtures(&self) -> Vec<&TestFixtureResult> {
        sorted_by_id(self.fixtures.values(), |fixture| &fixture.id)
    }

    fn all_history_data_points(&self) -> &[HistoryDataPoint] {
        &self.history
    }

    fn all_known_issues(&self) -> &[KnownTestFailure] {
        &self.known
    }

    fn all_test_results(&self, filter: ResultFilter) -> Vec<&TestResult> {
        self.visible(filter).collect()
    }

    fn test_case_by_id(&self, tc_id: &str) -> Option<&TestCase> {
        self.test_cases.get(tc_id)
    }

    fn test_result_by_id(&self, tr_id: &str) -> Option<&TestResult> {
        self.test_results.get(tr_id)
    }

    fn attachment_by_id(&self, attachment_id: &str) -> Option<&AttachmentLink> {
        self.attachments.get(attachment_id)
    }

    fn attachment_content_by_id(&self, attachment_id: &str) -> Option<Arc<dyn ResultFile>> {
        self.attachment_contents.get(attachment_id).cloned()
    }

    fn metadata_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    fn test_results_by_tc_id(&self, tc_id: &str) -> Vec<&TestResult> {
        self.results_for(self.results_by_tc_id.get(tc_id))
    }

    fn attachments_by_tr_id(&self, tr_id: &str) -> Vec<&AttachmentLink> {
        self.attachments_by_tr_id
            .get(tr_id)
            .map(|ids| ids.iter().filter_map(|id| self.attachments.get(id)).collect())
            .unwrap_or_default()
    }

    fn fixtures_by_tr_id(&self, tr_id: &str) -> Vec<&TestFixtureResult> {
        self.fixtures_by_tr_id
            .get(tr_id)
            .map(|ids| ids.iter().filter_map(|id| self.fixtures.get(id)).collect())
            .unwrap_or_default()
    }

    fn retries_by_tr_id(&self, tr_id: &str) -> Vec<&TestResult> {
        let Some(tr) = self.test_results.get(tr_id) else {
            return Vec::new();
        };
        if tr.hidden {
            return Vec::new();
        }
        let Some(history_id) = tr.history_id.as_deref() else {
            return Vec::new();
        };

        let mut retries: Vec<&TestResult> = self
            .results_for(self.results_by_history_id.get(history_id))
            .into_iter()
            .filter(|other| other.id != tr.id && other.hidden)
            .collect();
        retries.sort_by(compare_by(
            |r: &&TestResult| r.start,
            nulls_last(reverse(ordinal::<i64>())),
        ));
        retries
    }

    fn history_by_tr_id(&self, tr_id: &str) -> Vec<HistoryTestResult> {
        let Some(history_id) = self
            .test_results
            .get(tr_id)
            .and_then(|tr| tr.history_id.as_deref())
        else {
            return Vec::new();
        };
        self.history
            .iter()
            .filter_map(|point| point.test_results.get(history_id).cloned())
            .collect()
    }

    fn failed_test_results(&self) -> Vec<&TestResult> {
        self.visible(ResultFilter::default())
            .filter(|tr| tr.status.is_failure())
            .collect()
    }

    fn unknown_failed_test_results(&self) -> Vec<&TestResult> {
        self.visible(ResultFilter::default())
            .filter(|tr| tr.status.is_failure())
            .filter(|tr| {
                tr.history_id
                    .as_deref()
                    .is_none_or(|history_id| !self.known_by_history_id.contains_key(history_id))
            })
            .collect()
    }

    fn test_results_by_label(&self, label_name: &str) -> BTreeMap<String, Vec<&TestResult>> {
        let mut by_value: BTreeMap<String, Vec<&TestResult>> = BTreeMap::new();
        for tr in self.visible(ResultFilter::default()) {
            let mut values: Vec<&str> = Vec::new();
            for value in tr.label_values(label_name) {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
            if values.is_empty() {
                by_value.entry("_".to_string()).or_default().push(tr);
                continue;
            }
            for value in values {
                by_value.entry(value.to_string()).or_default().push(tr);
            }
        }
        by_value
    }

    fn tests_statistic(&self, filter: Option<&dyn Fn(&TestResult) -> bool>) -> Statistic {
        let mut statistic = Statistic::default();
        for tr in self.visible(ResultFilter::with_hidden()) {
            if !filter.is_none_or(|f| f(tr)) {
                continue;
            }
            if tr.hidden {
                statistic.retries += 1;
            } else {
                increment_statistic(&mut statistic, tr, 1);
            }
        }
        statistic
    }

    fn all_environments(&self) -> Vec<String> {
        let mut environments = vec![DEFAULT_ENVIRONMENT.to_string()];
        for environment in &self.environments {
            if !environments.contains(&environment.name) {
                environments.push(environment.name.clone());
            }
        }
        environments
    }

    fn test_results_by_environment(
        &self,
        environment: &str,
        filter: ResultFilter,
    ) -> Vec<&TestResult> {
        self.visible(filter)
            .filter(|tr| tr.environment == environment)
            .collect()
    }

    fn all_test_env_groups(&self) -> Vec<TestEnvGroup> {
        let mut groups: BTreeMap<&str, TestEnvGroup> = BTreeMap::new();
        for tr in self.visible(ResultFilter::with_hidden()) {
            let Some(tc) = tr.test_case.as_ref() else {
                continue;
            };
            let group = groups.entry(tc.id.as_str()).or_insert_with(|| TestEnvGroup {
                id: tc.id.clone(),
                name: tc.name.clone(),
                full_name: tc.full_name.clone(),
                status: tr.status,
                test_results_by_env: BTreeMap::new(),
            });
            group.status = Status::worst([group.status, tr.status]).unwrap_or(tr.status);
            group
                .test_results_by_env
                .insert(tr.environment.clone(), tr.id.clone());
        }
        debug!(groups = groups.len(), "Built environment groups");
        groups.into_values().collect()
    }

    fn all_variables(&self) -> BTreeMap<String, String> {
        self.variables.clone()
    }

    fn env_variables(&self, environment: &str) -> BTreeMap<String, String> {
        let mut variables = self.variables.clone();
        if let Some(config) = self.environments.iter().find(|e| e.name == environment) {
            variables.extend(config.variables.clone());
        }
        variables
    }
}
