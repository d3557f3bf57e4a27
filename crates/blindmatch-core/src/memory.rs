//! In-memory record store

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{CoreError, CoreResult};
use crate::records::{EncryptedPaper, EncryptedReviewer, PaperCiphertexts, ReviewerCiphertexts};
use crate::store::RecordStore;
use crate::types::{PaperId, ReviewerId};

/// In-memory record store
///
/// Records live in vectors indexed by `id - 1`, which keeps id assignment
/// and lookup trivially consistent. Not persistent: data is lost on drop.
#[derive(Default)]
pub struct InMemoryRecordStore {
    papers: RwLock<Vec<EncryptedPaper>>,
    reviewers: RwLock<Vec<EncryptedReviewer>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> CoreResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| CoreError::Storage("record store lock poisoned".into()))
}

fn write<T>(lock: &RwLock<T>) -> CoreResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| CoreError::Storage("record store lock poisoned".into()))
}

/// Position of a 1-based id in the backing vector
fn slot(id: u64) -> Option<usize> {
    id.checked_sub(1).and_then(|i| usize::try_from(i).ok())
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn submit_paper(
        &self,
        ciphertexts: PaperCiphertexts,
        submitted_at: u64,
    ) -> CoreResult<EncryptedPaper> {
        let mut papers = write(&self.papers)?;
        let paper = EncryptedPaper {
            id: PaperId(papers.len() as u64 + 1),
            ciphertexts,
            submitted_at,
        };
        papers.push(paper.clone());
        Ok(paper)
    }

    async fn add_reviewer(
        &self,
        ciphertexts: ReviewerCiphertexts,
        added_at: u64,
    ) -> CoreResult<EncryptedReviewer> {
        let mut reviewers = write(&self.reviewers)?;
        let reviewer = EncryptedReviewer {
            id: ReviewerId(reviewers.len() as u64 + 1),
            ciphertexts,
            added_at,
        };
        reviewers.push(reviewer.clone());
        Ok(reviewer)
    }

    async fn paper(&self, id: PaperId) -> CoreResult<Option<EncryptedPaper>> {
        let papers = read(&self.papers)?;
        Ok(slot(id.0).and_then(|i| papers.get(i)).cloned())
    }

    async fn reviewer(&self, id: ReviewerId) -> CoreResult<Option<EncryptedReviewer>> {
        let reviewers = read(&self.reviewers)?;
        Ok(slot(id.0).and_then(|i| reviewers.get(i)).cloned())
    }

    async fn reviewers(&self) -> CoreResult<Vec<EncryptedReviewer>> {
        Ok(read(&self.reviewers)?.clone())
    }

    async fn paper_count(&self) -> CoreResult<u64> {
        Ok(read(&self.papers)?.len() as u64)
    }

    async fn reviewer_count(&self) -> CoreResult<u64> {
        Ok(read(&self.reviewers)?.len() as u64)
    }
}
