//! Deterministic collaborator doubles for tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::pipeline::error::PipelineError;
use crate::pipeline::ports::{CourseCandidateSource, GenerativeStepPort, Step};
use crate::pipeline::session::{decode, encode, SessionStore};
use crate::pipeline::state::{CourseRecord, SessionRecord};
use crate::quiz::progress::{Progress, ProgressStore};

/// Generative port that replays scripted outputs per step.
///
/// The last scripted result for a step repeats once the queue is down to one.
#[derive(Default)]
pub struct ScriptedPort {
    responses: Mutex<HashMap<Step, VecDeque<Result<Value, PipelineError>>>>,
    calls: Mutex<Vec<(Step, Value)>>,
    delay: Option<Duration>,
}

impl ScriptedPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, step: Step, output: Value) -> Self {
        self.push(step, Ok(output))
    }

    pub fn fail(self, step: Step, error: PipelineError) -> Self {
        self.push(step, Err(error))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(self, step: Step, result: Result<Value, PipelineError>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry(step)
            .or_default()
            .push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<(Step, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, step: Step) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == step)
            .count()
    }
}

#[async_trait]
impl GenerativeStepPort for ScriptedPort {
    async fn invoke(&self, step: Step, input: Value) -> Result<Value, PipelineError> {
        self.calls.lock().unwrap().push((step, input));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut responses = self.responses.lock().unwrap();
        let queue = responses.get_mut(&step).ok_or_else(|| {
            PipelineError::GenerationFailure(format!("no scripted response for {step}"))
        })?;
        match queue.len() {
            0 => Err(PipelineError::GenerationFailure(format!(
                "no scripted response for {step}"
            ))),
            1 => queue[0].clone(),
            _ => queue.pop_front().unwrap_or_else(|| {
                Err(PipelineError::GenerationFailure("empty script".to_string()))
            }),
        }
    }
}

/// Candidate source over a fixed list; honours `top_k` unless told otherwise.
pub struct StaticSource {
    records: Vec<CourseRecord>,
    honour_top_k: bool,
    queries: Mutex<Vec<(Vec<String>, usize)>>,
}

impl StaticSource {
    pub fn with_records(records: Vec<CourseRecord>) -> Self {
        Self {
            records,
            honour_top_k: true,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::with_records(vec![])
    }

    pub fn ignoring_top_k(mut self) -> Self {
        self.honour_top_k = false;
        self
    }

    pub fn queries(&self) -> Vec<(Vec<String>, usize)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn record(course: &str, module: &str, skills: &[&str]) -> CourseRecord {
        CourseRecord {
            course_title: course.to_string(),
            module_title: module.to_string(),
            module_description: format!("{module} in depth"),
            subtopics: vec!["Basics".to_string(), "Advanced".to_string()],
            skills: skills.iter().map(|s| s.to_string()).collect(),
            price: None,
        }
    }
}

#[async_trait]
impl CourseCandidateSource for StaticSource {
    async fn retrieve(
        &self,
        query_skills: &[String],
        top_k: usize,
    ) -> Result<Vec<CourseRecord>, PipelineError> {
        self.queries
            .lock()
            .unwrap()
            .push((query_skills.to_vec(), top_k));
        let mut records = self.records.clone();
        if self.honour_top_k {
            records.truncate(top_k);
        }
        Ok(records)
    }
}

/// Process-local session store. Records are kept serialized so every load is a real round trip.
#[derive(Default)]
pub struct InMemorySessionStore {
    records: Mutex<HashMap<String, String>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, PipelineError> {
        let records = self.records.lock().unwrap();
        records
            .get(session_id)
            .map(|raw| decode(session_id, raw))
            .transpose()
    }

    async fn save(&self, session_id: &str, record: &SessionRecord) -> Result<(), PipelineError> {
        let payload = encode(record)?;
        self.records
            .lock()
            .unwrap()
            .insert(session_id.to_string(), payload);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryProgressStore {
    users: Mutex<HashMap<String, (i64, BTreeSet<String>)>>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn get(&self, user_id: &str) -> anyhow::Result<Progress> {
        let users = self.users.lock().unwrap();
        Ok(users
            .get(user_id)
            .map(|(xp, badges)| Progress {
                xp: *xp,
                badges: badges.iter().cloned().collect(),
            })
            .unwrap_or_default())
    }

    async fn increment_xp(&self, user_id: &str, delta: i64) -> anyhow::Result<i64> {
        let mut users = self.users.lock().unwrap();
        let entry = users.entry(user_id.to_string()).or_default();
        entry.0 += delta;
        Ok(entry.0)
    }

    async fn award_badge(&self, user_id: &str, badge: &str) -> anyhow::Result<()> {
        self.users
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .1
            .insert(badge.to_string());
        Ok(())
    }
}
