//! Expanding nodes against a record source
//!
//! Heavily connected records are not expanded in one go: the caller gets an
//! [`ExpansionPlan`] listing the pending edges, toggles the ones to skip, and
//! applies it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::graph::state::{EdgeCandidate, GraphState, ProcessSummary};
use crate::graph::types::{Position, position_init};

/// Errors raised while fetching records
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read record dump {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse record dump: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid record dump: {0}")]
    InvalidDump(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

/// Somewhere full records can be fetched from by id
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch a record with its edges and their endpoints populated
    async fn get_record(&self, rid: &str) -> Result<Value, SourceError>;
}

/// Records held in memory, keyed by `@rid`
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: HashMap<String, Value>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a dump: an array of records, or an object keyed by id
    pub fn from_json(dump: Value) -> Result<Self, SourceError> {
        let records: Vec<Value> = match dump {
            Value::Array(records) => records,
            Value::Object(map) if map.contains_key("@rid") => vec![Value::Object(map)],
            Value::Object(map) => map.into_iter().map(|(_, record)| record).collect(),
            other => {
                return Err(SourceError::InvalidDump(format!(
                    "expected an array or object, got {other}"
                )));
            }
        };
        let mut source = Self::new();
        for record in records {
            source.insert(record)?;
        }
        Ok(source)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let source = Self::from_json(serde_json::from_str(&content)?)?;
        info!(path = %path.display(), records = source.len(), "loaded record dump");
        Ok(source)
    }

    pub fn insert(&mut self, record: Value) -> Result<(), SourceError> {
        let rid = record
            .get("@rid")
            .and_then(Value::as_str)
            .ok_or_else(|| SourceError::InvalidDump("record without @rid".to_string()))?
            .to_string();
        self.records.insert(rid, record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn get_record(&self, rid: &str) -> Result<Value, SourceError> {
        self.records
            .get(rid)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(rid.to_string()))
    }
}

/// Result of asking the state whether a record may be expanded directly
#[derive(Debug, Clone, PartialEq)]
pub enum ExpansionDecision {
    Expand,
    Confirm(ExpansionPlan),
}

/// One pending edge and whether it will be expanded
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    pub edge: EdgeCandidate,
    pub include: bool,
}

/// The edges a heavily connected record would pull in
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionPlan {
    rid: String,
    entries: Vec<PlanEntry>,
}

impl ExpansionPlan {
    /// Every edge starts out included
    pub fn new(rid: impl Into<String>, edges: Vec<EdgeCandidate>) -> Self {
        Self {
            rid: rid.into(),
            entries: edges
                .into_iter()
                .map(|edge| PlanEntry { edge, include: true })
                .collect(),
        }
    }

    /// Id of the record being expanded
    pub fn rid(&self) -> &str {
        &self.rid
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn included(&self) -> usize {
        self.entries.iter().filter(|entry| entry.include).count()
    }

    /// Entries grouped by edge class
    pub fn by_class(&self) -> BTreeMap<&str, Vec<&PlanEntry>> {
        let mut groups: BTreeMap<&str, Vec<&PlanEntry>> = BTreeMap::new();
        for entry in &self.entries {
            groups.entry(entry.edge.class.as_str()).or_default().push(entry);
        }
        groups
    }

    /// Flip a single edge; false when the plan has no such edge
    pub fn toggle(&mut self, edge_id: &str) -> bool {
        let mut found = false;
        for entry in self.entries.iter_mut().filter(|entry| entry.edge.id == edge_id) {
            entry.include = !entry.include;
            found = true;
        }
        found
    }

    /// Include or exclude every edge of a class
    pub fn set_class(&mut self, class: &str, include: bool) {
        for entry in self.entries.iter_mut().filter(|entry| entry.edge.class == class) {
            entry.include = include;
        }
    }

    pub fn set_all(&mut self, include: bool) {
        for entry in &mut self.entries {
            entry.include = include;
        }
    }

    /// Ids of the edges the expansion must skip
    pub fn exclusions(&self) -> HashSet<String> {
        self.entries
            .iter()
            .filter(|entry| !entry.include)
            .map(|entry| entry.edge.id.clone())
            .collect()
    }
}

/// How to treat records above the connection threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpansionPolicy {
    /// Stop and hand back a plan
    #[default]
    Confirm,
    /// Expand everything regardless
    Force,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpansionOutcome {
    Expanded(ProcessSummary),
    NeedsConfirmation(ExpansionPlan),
}

/// Fetch a record and expand it, or return a plan when it needs review
pub async fn expand_node<S: RecordSource + ?Sized>(
    state: &mut GraphState<'_>,
    source: &S,
    rid: &str,
    policy: ExpansionPolicy,
) -> Result<ExpansionOutcome, SourceError> {
    let record = source.get_record(rid).await?;
    match state.request_expansion(&record) {
        ExpansionDecision::Confirm(plan) if policy == ExpansionPolicy::Confirm => {
            info!(node = %rid, edges = plan.len(), "expansion needs confirmation");
            Ok(ExpansionOutcome::NeedsConfirmation(plan))
        }
        _ => {
            let summary = state.expand(&record, &HashSet::new());
            debug!(
                node = %rid,
                nodes = summary.nodes_added.len(),
                links = summary.links_added.len(),
                "expanded node"
            );
            Ok(ExpansionOutcome::Expanded(summary))
        }
    }
}

/// Expand the plan's record, skipping the edges it excludes
pub async fn apply_plan<S: RecordSource + ?Sized>(
    state: &mut GraphState<'_>,
    source: &S,
    plan: &ExpansionPlan,
) -> Result<ProcessSummary, SourceError> {
    let record = source.get_record(plan.rid()).await?;
    Ok(state.expand(&record, &plan.exclusions()))
}

/// Load the initial records around the origin without expanding them
pub async fn load_seeds<S: RecordSource + ?Sized>(
    state: &mut GraphState<'_>,
    source: &S,
    rids: &[String],
) -> Result<ProcessSummary, SourceError> {
    let mut summary = ProcessSummary::default();
    for (i, rid) in rids.iter().enumerate() {
        let record = source.get_record(rid).await?;
        let position = position_init(Position::default(), i, rids.len());
        summary.extend(state.process_data(&record, position, false, &HashSet::new()));
    }
    info!(seeds = rids.len(), nodes = state.nodes().len(), "loaded seed records");
    Ok(summary)
}
