//! In-memory cloud used by the scenario tests
//!
//! Resources live in a map keyed by kind and name. Job states are served
//! from a script, and every call is counted so tests can assert on exactly
//! which remote calls happened.

#![allow(dead_code)]

use datalake_common::{JobState, ResourceKind};
use datalake_provisioner::aws::AwsError;
use datalake_provisioner::{RemoteId, ResourceClient, ResourceSpec, StartOutcome};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub find: usize,
    pub create: usize,
    pub start: usize,
    pub status: usize,
}

#[derive(Default)]
struct State {
    resources: HashMap<(ResourceKind, String), RemoteId>,
    statuses: VecDeque<JobState>,
    job_running: bool,
    failing_creates: HashMap<ResourceKind, AwsError>,
    calls: CallCounts,
    created: Vec<ResourceSpec>,
}

#[derive(Default)]
pub struct FakeCloud {
    state: Mutex<State>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource as already present
    pub fn with_resource(self, kind: ResourceKind, name: &str) -> Self {
        let id = remote_id(kind, name);
        self.state
            .lock()
            .unwrap()
            .resources
            .insert((kind, name.to_string()), id);
        self
    }

    /// States returned by successive `get_status` calls
    pub fn with_statuses(self, statuses: impl IntoIterator<Item = JobState>) -> Self {
        self.state.lock().unwrap().statuses = statuses.into_iter().collect();
        self
    }

    /// Make `start_job` answer that the job is already running
    pub fn with_running_job(self) -> Self {
        self.state.lock().unwrap().job_running = true;
        self
    }

    /// Make `create` fail for every resource of `kind`
    pub fn failing_create(self, kind: ResourceKind, error: AwsError) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_creates
            .insert(kind, error);
        self
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().unwrap().calls
    }

    /// Specs passed to successful `create` calls, in order
    pub fn created(&self) -> Vec<ResourceSpec> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn contains(&self, kind: ResourceKind, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .resources
            .contains_key(&(kind, name.to_string()))
    }
}

pub fn role_arn(name: &str) -> String {
    format!("arn:aws:iam::123456789012:role/{name}")
}

fn remote_id(kind: ResourceKind, name: &str) -> RemoteId {
    match kind {
        ResourceKind::Role => RemoteId::new(role_arn(name)),
        _ => RemoteId::new(name),
    }
}

fn take_error(error: &AwsError) -> AwsError {
    match error {
        AwsError::AlreadyExists(m) => AwsError::AlreadyExists(m.clone()),
        AwsError::Validation(m) => AwsError::Validation(m.clone()),
        other => AwsError::Sdk {
            code: other.code().map(str::to_string),
            message: other.to_string(),
        },
    }
}

impl ResourceClient for FakeCloud {
    async fn find(&self, spec: &ResourceSpec) -> Result<Option<RemoteId>, AwsError> {
        let mut state = self.state.lock().unwrap();
        state.calls.find += 1;
        Ok(state
            .resources
            .get(&(spec.kind(), spec.name().to_string()))
            .cloned())
    }

    async fn create(&self, spec: &ResourceSpec) -> Result<RemoteId, AwsError> {
        let mut state = self.state.lock().unwrap();
        state.calls.create += 1;
        if let Some(error) = state.failing_creates.get(&spec.kind()) {
            return Err(take_error(error));
        }
        let key = (spec.kind(), spec.name().to_string());
        if state.resources.contains_key(&key) {
            return Err(AwsError::AlreadyExists(spec.name().to_string()));
        }
        let id = remote_id(spec.kind(), spec.name());
        state.resources.insert(key, id.clone());
        state.created.push(spec.clone());
        Ok(id)
    }

    async fn start_job(&self, _job_name: &str) -> Result<StartOutcome, AwsError> {
        let mut state = self.state.lock().unwrap();
        state.calls.start += 1;
        if state.job_running {
            Ok(StartOutcome::AlreadyRunning)
        } else {
            state.job_running = true;
            Ok(StartOutcome::Started)
        }
    }

    async fn get_status(&self, job_name: &str) -> Result<JobState, AwsError> {
        let mut state = self.state.lock().unwrap();
        state.calls.status += 1;
        state
            .statuses
            .pop_front()
            .ok_or_else(|| AwsError::Unexpected(format!("no scripted status left for '{job_name}'")))
    }
}
