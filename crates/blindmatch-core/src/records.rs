//! Encrypted records and match results

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::oracle::DecryptedValues;
use crate::types::{CiphertextHandle, PaperId, ReviewerId};

/// The four encrypted fields of a manuscript
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperCiphertexts {
    pub title: CiphertextHandle,
    #[serde(rename = "abstract")]
    pub abstract_text: CiphertextHandle,
    pub keywords: CiphertextHandle,
    pub discipline: CiphertextHandle,
}

impl PaperCiphertexts {
    /// Handles in the order they are sent to the oracle
    pub fn handles(&self) -> [CiphertextHandle; 4] {
        [self.title, self.abstract_text, self.keywords, self.discipline]
    }
}

/// The four encrypted fields of a reviewer profile
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerCiphertexts {
    pub expertise: CiphertextHandle,
    pub affiliation: CiphertextHandle,
    pub publication_count: CiphertextHandle,
    pub review_count: CiphertextHandle,
}

/// A submitted manuscript
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPaper {
    pub id: PaperId,
    pub ciphertexts: PaperCiphertexts,
    /// Unix seconds
    pub submitted_at: u64,
}

/// A registered reviewer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedReviewer {
    pub id: ReviewerId,
    pub ciphertexts: ReviewerCiphertexts,
    /// Unix seconds
    pub added_at: u64,
}

/// The current match for a paper
///
/// Holds the reviewer in the clear, so it never leaves the service as is.
/// Use [`MatchResult::view`] for anything published.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchResult {
    pub paper_id: PaperId,
    pub reviewer_id: ReviewerId,
    /// Encrypted match score
    pub score: CiphertextHandle,
    /// Set once by a verified reveal, never cleared
    pub revealed: bool,
    /// Set when the matched reviewer consents to disclosure
    pub acknowledged: bool,
    pub computed_at: u64,
    pub revealed_at: Option<u64>,
    /// Decrypted score bytes, present only after reveal
    pub disclosed_score: Option<Vec<u8>>,
}

impl MatchResult {
    pub fn new(
        paper_id: PaperId,
        reviewer_id: ReviewerId,
        score: CiphertextHandle,
        now: u64,
    ) -> Self {
        Self {
            paper_id,
            reviewer_id,
            score,
            revealed: false,
            acknowledged: false,
            computed_at: now,
            revealed_at: None,
            disclosed_score: None,
        }
    }

    /// The publishable form of this match
    pub fn view(&self) -> MatchView {
        MatchView {
            paper_id: self.paper_id,
            reviewer_id: self.revealed.then_some(self.reviewer_id),
            score: self.score,
            revealed: self.revealed,
            acknowledged: self.acknowledged,
            computed_at: self.computed_at,
            revealed_at: self.revealed_at,
            disclosed_score: self
                .disclosed_score
                .clone()
                .filter(|_| self.revealed),
        }
    }
}

/// A match as seen from outside the service
///
/// `reviewer_id` stays `None` until the reveal has been verified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MatchView {
    pub paper_id: PaperId,
    pub reviewer_id: Option<ReviewerId>,
    pub score: CiphertextHandle,
    pub revealed: bool,
    pub acknowledged: bool,
    pub computed_at: u64,
    pub revealed_at: Option<u64>,
    pub disclosed_score: Option<Vec<u8>>,
}

/// Decrypted matching payload for one paper
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaperDescriptors {
    pub title: Vec<u8>,
    pub abstract_text: Vec<u8>,
    pub keywords: Vec<u8>,
    pub discipline: Vec<u8>,
}

impl PaperDescriptors {
    /// Decode oracle cleartext for a matching request
    ///
    /// The oracle answers in request order, so the four values line up with
    /// [`PaperCiphertexts::handles`].
    pub fn decode(cleartext: &[u8]) -> CoreResult<Self> {
        let DecryptedValues(values) = DecryptedValues::decode(cleartext)?;
        let [title, abstract_text, keywords, discipline]: [Vec<u8>; 4] =
            values.try_into().map_err(|values: Vec<Vec<u8>>| {
                CoreError::MalformedCleartext(format!(
                    "expected 4 paper descriptors, got {}",
                    values.len()
                ))
            })?;

        Ok(Self {
            title,
            abstract_text,
            keywords,
            discipline,
        })
    }

    /// Blake3 digest over all four descriptors
    pub fn digest(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        for field in [&self.title, &self.abstract_text, &self.keywords, &self.discipline] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        hasher.finalize()
    }
}
