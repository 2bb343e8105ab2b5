//! Course catalog loaded from JSON and ranked by skill overlap.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::pipeline::error::PipelineError;
use crate::pipeline::ports::CourseCandidateSource;
use crate::pipeline::state::CourseRecord;

#[derive(Debug, Clone, Deserialize)]
struct CatalogCourse {
    title: String,
    #[serde(default)]
    skills: Vec<String>,
    modules: Vec<CatalogModule>,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogModule {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    subtopics: Vec<String>,
    #[serde(default)]
    price: Option<u32>,
}

/// Flattened catalog, one record per module, in file order.
#[derive(Debug, Clone, Default)]
pub struct CatalogCandidateSource {
    records: Vec<CourseRecord>,
}

impl CatalogCandidateSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read course catalog at {}", path.display()))?;
        let source = Self::from_json(&raw)
            .with_context(|| format!("Invalid course catalog at {}", path.display()))?;
        info!(
            "Loaded course catalog from {} ({} modules)",
            path.display(),
            source.len()
        );
        Ok(source)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let courses: Vec<CatalogCourse> = serde_json::from_str(raw)?;
        let records = courses
            .into_iter()
            .flat_map(|course| {
                let CatalogCourse {
                    title,
                    skills,
                    modules,
                } = course;
                modules.into_iter().map(move |module| CourseRecord {
                    course_title: title.clone(),
                    module_title: module.title,
                    module_description: module.description,
                    subtopics: module.subtopics,
                    skills: skills.clone(),
                    // A zero price is treated as "not priced".
                    price: module.price.filter(|p| *p > 0),
                })
            })
            .collect();
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records matching at least one query skill, best match first.
    pub fn rank(&self, query_skills: &[String], top_k: usize) -> Vec<CourseRecord> {
        let query: Vec<String> = query_skills
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if query.is_empty() || top_k == 0 {
            return vec![];
        }

        let mut scored: Vec<(usize, &CourseRecord)> = self
            .records
            .iter()
            .map(|record| (overlap(record, &query), record))
            .filter(|(score, _)| *score > 0)
            .collect();
        // Stable sort keeps catalog order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        scored
            .into_iter()
            .take(top_k)
            .map(|(_, record)| record.clone())
            .collect()
    }
}

/// Number of query skills named by the module's skills, subtopics or title.
fn overlap(record: &CourseRecord, query: &[String]) -> usize {
    let haystack: Vec<String> = record
        .skills
        .iter()
        .chain(record.subtopics.iter())
        .map(|s| s.trim().to_lowercase())
        .collect();
    let title = record.module_title.to_lowercase();

    query
        .iter()
        .filter(|skill| haystack.iter().any(|h| h == *skill) || title.contains(skill.as_str()))
        .count()
}

#[async_trait]
impl CourseCandidateSource for CatalogCandidateSource {
    async fn retrieve(
        &self,
        query_skills: &[String],
        top_k: usize,
    ) -> Result<Vec<CourseRecord>, PipelineError> {
        let records = self.rank(query_skills, top_k);
        debug!(
            "Catalog matched {} modules for {:?}",
            records.len(),
            query_skills
        );
        Ok(records)
    }
}
