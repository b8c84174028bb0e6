use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::knowledge::classifier::DomainClassifier;
use crate::knowledge::sections::{identify_sections, split_entries};
use crate::knowledge::store::ResumeStore;
use crate::knowledge::summary::ResumeSummarizer;
use crate::knowledge::text::extract_text;
use crate::llm_client::{with_timeout, Embedder, TextGenerator};
use crate::models::domain::Domain;
use crate::models::resume::ResumeRecord;
use crate::retrieval::{ResumeChunk, VectorIndex};

#[derive(Debug, Serialize)]
pub struct IngestOutcome {
    pub resume: ResumeRecord,
    /// True when an identical upload already existed and nothing was reprocessed.
    pub reused: bool,
}

/// Turns an uploaded resume into classified, embedded chunks plus a candidate summary.
pub struct ResumeIngestor {
    classifier: DomainClassifier,
    summarizer: ResumeSummarizer,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    resumes: Arc<dyn ResumeStore>,
    stage_timeout: Duration,
}

impl ResumeIngestor {
    pub fn new(
        llm: Arc<dyn TextGenerator>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        resumes: Arc<dyn ResumeStore>,
        stage_timeout: Duration,
    ) -> Self {
        Self {
            classifier: DomainClassifier::new(llm.clone(), stage_timeout),
            summarizer: ResumeSummarizer::new(llm, stage_timeout),
            embedder,
            index,
            resumes,
            stage_timeout,
        }
    }

    pub async fn ingest(
        &self,
        user_id: Uuid,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<IngestOutcome, AppError> {
        let file_hash = content_hash(bytes);
        if let Some(resume) = self.resumes.find_by_hash(user_id, &file_hash).await? {
            info!(
                "Resume {} already processed for user {user_id}; reusing",
                resume.id
            );
            return Ok(IngestOutcome {
                resume,
                reused: true,
            });
        }

        let text = extract_text(file_name, bytes)?;
        let resume_id = Uuid::new_v4();
        let mut chunks = self.build_chunks(resume_id, &text).await;
        info!("Resume {resume_id}: {} chunks classified", chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = with_timeout(self.stage_timeout, self.embedder.embed_batch(&texts))
            .await
            .map_err(|e| AppError::Llm(format!("Chunk embedding failed: {e}")))?;
        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }

        let summary = self.summarizer.summarize(&text).await;

        let record = ResumeRecord {
            id: resume_id,
            user_id,
            file_name: file_name.to_string(),
            file_hash,
            summary,
            num_chunks: chunks.len() as i32,
            matched_domains: matched_domains(&chunks),
            created_at: Utc::now(),
        };

        let (resume, created) = self.resumes.insert_if_absent(&record).await?;
        if created {
            self.index.upsert(&chunks).await?;
            info!("Resume {resume_id} indexed for user {user_id}");
        } else {
            debug!("Concurrent upload stored resume {} first", resume.id);
        }

        Ok(IngestOutcome {
            resume,
            reused: !created,
        })
    }

    async fn build_chunks(&self, resume_id: Uuid, text: &str) -> Vec<ResumeChunk> {
        let mut chunks = Vec::new();
        for section in identify_sections(text) {
            for (entry_index, entry) in split_entries(section.section, &section.content)
                .into_iter()
                .enumerate()
            {
                let domains = self.classifier.classify(&entry).await;
                chunks.push(ResumeChunk {
                    id: Uuid::new_v4(),
                    resume_id,
                    chunk_index: chunks.len() as i32,
                    text: entry,
                    parent_section: section.section.as_str().to_string(),
                    entry_index: entry_index as i32,
                    primary_domain: domains.first().copied(),
                    domains,
                    embedding: vec![],
                });
            }
        }
        chunks
    }
}

/// Hex-encoded SHA-256 of the uploaded bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Domains across all chunks, most frequent first.
fn matched_domains(chunks: &[ResumeChunk]) -> Vec<Domain> {
    let mut counts: HashMap<Domain, usize> = HashMap::new();
    for domain in chunks.iter().flat_map(|c| c.domains.iter()) {
        *counts.entry(*domain).or_default() += 1;
    }
    let mut ranked: Vec<(Domain, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().map(|(d, _)| d).collect()
}
