// Per-term accounting of generated example sentences.

use thiserror::Error;

/// Maximum number of sentences that may be generated for one term.
pub const PHRASE_QUOTA: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuotaError {
    /// `record_generation` was called with nothing left. Callers are
    /// required to check `remaining` first, so this is a logic fault.
    #[error("phrase quota exhausted for term {term_id}")]
    Exhausted { term_id: i64 },
}

/// Tracks how many sentences have been generated for the current term.
///
/// The count belongs to a term id. Asking about (or recording against) a
/// different id starts over from zero, so a term change always reads as a
/// full quota.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhraseQuota {
    term_id: Option<i64>,
    generated: u32,
}

impl PhraseQuota {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the current term entirely.
    pub fn clear(&mut self) {
        self.term_id = None;
        self.generated = 0;
    }

    /// `max(0, PHRASE_QUOTA - generated(term_id))`.
    pub fn remaining(&self, term_id: i64) -> u32 {
        if self.term_id == Some(term_id) {
            PHRASE_QUOTA.saturating_sub(self.generated)
        } else {
            PHRASE_QUOTA
        }
    }

    /// Count one generated sentence. Returns the remaining quota.
    #[must_use = "an exhausted quota is a caller bug and must be handled"]
    pub fn record_generation(&mut self, term_id: i64) -> Result<u32, QuotaError> {
        self.switch_to(term_id);
        if self.generated >= PHRASE_QUOTA {
            return Err(QuotaError::Exhausted { term_id });
        }
        self.generated += 1;
        Ok(self.remaining(term_id))
    }

    /// Adopt the server's remaining count as the truth for `term_id`.
    pub fn reconcile(&mut self, term_id: i64, server_remaining: u32) {
        self.switch_to(term_id);
        self.generated = PHRASE_QUOTA - server_remaining.min(PHRASE_QUOTA);
    }

    fn switch_to(&mut self, term_id: i64) {
        if self.term_id != Some(term_id) {
            self.term_id = Some(term_id);
            self.generated = 0;
        }
    }
}
