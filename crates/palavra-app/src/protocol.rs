// Shared message types: backend wire payloads, domain types, front-end
// commands/updates, and the completion events that flow back into the
// session event loop.

use serde::{Deserialize, Serialize};

use crate::quota::PHRASE_QUOTA;
use crate::transport::TransportError;

/// Term id meaning "no real term loaded".
pub const NO_TERM_ID: i64 = -1;

// ---------------------------------------------------------------------------
// Backend wire payloads (Portuguese field names are the backend's contract)
// ---------------------------------------------------------------------------

/// `GET /palavra-aleatoria` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermPayload {
    pub id: i64,
    #[serde(default)]
    pub termo: String,
    #[serde(default)]
    pub categoria: String,
    #[serde(default)]
    pub definicao: String,
    #[serde(default)]
    pub frases: Vec<String>,
    #[serde(default)]
    pub dificuldade: Option<f64>,
}

/// `POST /verificar` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyRequest {
    #[serde(rename = "palavra")]
    pub term: String,
    #[serde(rename = "resposta")]
    pub answer: String,
}

/// `POST /verificar` response body. `feedback` is optional in practice:
/// older backends omit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyPayload {
    pub acerto: bool,
    #[serde(default)]
    pub similaridade: f64,
    #[serde(default)]
    pub definicao_correta: Option<String>,
    #[serde(default)]
    pub feedback: String,
}

/// `POST /gerar-frase` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseRequest {
    #[serde(rename = "palavra_id")]
    pub term_id: i64,
    #[serde(rename = "palavra")]
    pub term: String,
    #[serde(rename = "definicao")]
    pub definition: String,
    #[serde(rename = "categoria")]
    pub category: String,
}

impl PhraseRequest {
    pub fn for_term(term: &Term) -> Self {
        PhraseRequest {
            term_id: term.id,
            term: term.text.clone(),
            definition: term.definition.clone(),
            category: term.category.clone(),
        }
    }
}

/// `POST /gerar-frase` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhrasePayload {
    pub frase: String,
    pub frases_restantes: i64,
}

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// The vocabulary term currently being quizzed.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub id: i64,
    pub text: String,
    pub category: String,
    pub definition: String,
    /// Fetched sentences followed by any generated ones, in arrival order.
    pub example_sentences: Vec<String>,
    pub difficulty: Option<f64>,
}

impl TryFrom<TermPayload> for Term {
    type Error = TransportError;

    /// A term is only usable when both its text and definition are present.
    fn try_from(payload: TermPayload) -> Result<Self, Self::Error> {
        if payload.termo.trim().is_empty() {
            return Err(TransportError::InvalidPayload("term text is empty".into()));
        }
        if payload.definicao.trim().is_empty() {
            return Err(TransportError::InvalidPayload(
                "term definition is empty".into(),
            ));
        }
        Ok(Term {
            id: payload.id,
            text: payload.termo,
            category: payload.categoria,
            definition: payload.definicao,
            example_sentences: payload.frases,
            difficulty: payload.dificuldade,
        })
    }
}

/// Outcome of scoring one answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub correct: bool,
    pub similarity: f64,
    pub correct_definition: Option<String>,
    pub message: String,
}

impl From<VerifyPayload> for Verdict {
    fn from(payload: VerifyPayload) -> Self {
        Verdict {
            correct: payload.acerto,
            similarity: payload.similaridade,
            correct_definition: payload.definicao_correta,
            message: payload.feedback,
        }
    }
}

/// A freshly generated example sentence plus the server's remaining quota.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPhrase {
    pub phrase: String,
    pub remaining: u32,
}

impl TryFrom<PhrasePayload> for GeneratedPhrase {
    type Error = TransportError;

    fn try_from(payload: PhrasePayload) -> Result<Self, Self::Error> {
        if payload.frase.trim().is_empty() {
            return Err(TransportError::InvalidPayload(
                "generated phrase is empty".into(),
            ));
        }
        let remaining = payload.frases_restantes.clamp(0, i64::from(PHRASE_QUOTA)) as u32;
        Ok(GeneratedPhrase {
            phrase: payload.frase,
            remaining,
        })
    }
}

// ---------------------------------------------------------------------------
// Presentation-facing types
// ---------------------------------------------------------------------------

/// Where the session state machine currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    LoadingTerm,
    Ready,
    Submitting,
    GeneratingPhrase,
    Error,
}

/// Correctness or error message shown under the term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feedback {
    pub visible: bool,
    pub correct: bool,
    pub message: String,
    pub correct_definition: Option<String>,
    pub similarity: Option<f64>,
}

impl Feedback {
    /// A visible, non-correct message with no scoring detail.
    pub fn error(message: impl Into<String>) -> Self {
        Feedback {
            visible: true,
            correct: false,
            message: message.into(),
            correct_definition: None,
            similarity: None,
        }
    }
}

/// Read-only copy of the session state handed to the front end.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub term: Option<Term>,
    pub score: u32,
    pub total_attempts: u32,
    /// `score / total_attempts` as a percentage; 0 before the first attempt.
    pub accuracy_percent: f64,
    pub feedback: Feedback,
    /// Last phrase-generation notice (failure or quota exhausted).
    pub phrase_notice: Option<String>,
    pub loading: bool,
    pub submitting: bool,
    pub generating_phrase: bool,
    pub quota_remaining: u32,
    pub dark_mode: bool,
}

/// Intents forwarded by the front end.
#[derive(Debug, Clone, PartialEq)]
pub enum UserCommand {
    LoadNextTerm,
    SubmitAnswer(String),
    GeneratePhrase,
    TogglePreference,
    Quit,
}

/// Messages pushed from the session loop to the front end.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    Snapshot(Box<SessionSnapshot>),
}

// ---------------------------------------------------------------------------
// Completion events
// ---------------------------------------------------------------------------

/// Results from spawned network tasks (and the auto-advance timer), tagged
/// with the epoch that was current when the work was issued.
#[derive(Debug)]
pub enum SessionEvent {
    TermLoaded {
        epoch: u64,
        result: Result<Term, TransportError>,
    },
    AnswerVerified {
        epoch: u64,
        result: Result<Verdict, TransportError>,
    },
    PhraseGenerated {
        epoch: u64,
        result: Result<GeneratedPhrase, TransportError>,
    },
    AutoAdvance {
        epoch: u64,
    },
}

impl SessionEvent {
    pub fn epoch(&self) -> u64 {
        match self {
            SessionEvent::TermLoaded { epoch, .. }
            | SessionEvent::AnswerVerified { epoch, .. }
            | SessionEvent::PhraseGenerated { epoch, .. }
            | SessionEvent::AutoAdvance { epoch } => *epoch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(termo: &str, definicao: &str) -> TermPayload {
        TermPayload {
            id: 7,
            termo: termo.into(),
            categoria: "adj".into(),
            definicao: definicao.into(),
            frases: vec![],
            dificuldade: None,
        }
    }

    #[test]
    fn term_payload_decodes_without_optional_fields() {
        let json = r#"{"id": 7, "termo": "Ephemeral", "categoria": "adj", "definicao": "short-lived"}"#;
        let parsed: TermPayload = serde_json::from_str(json).unwrap();
        assert!(parsed.frases.is_empty());
        assert!(parsed.dificuldade.is_none());
    }

    #[test]
    fn term_rejects_blank_text() {
        let err = Term::try_from(payload("  ", "short-lived")).unwrap_err();
        assert!(matches!(err, TransportError::InvalidPayload(_)));
    }

    #[test]
    fn term_rejects_missing_definition() {
        let json = r#"{"id": 7, "termo": "Ephemeral"}"#;
        let parsed: TermPayload = serde_json::from_str(json).unwrap();
        assert!(matches!(
            Term::try_from(parsed),
            Err(TransportError::InvalidPayload(_))
        ));
    }

    #[test]
    fn term_maps_fields() {
        let mut p = payload("Ephemeral", "short-lived");
        p.frases = vec!["a".into(), "b".into()];
        p.dificuldade = Some(2.5);
        let term = Term::try_from(p).unwrap();
        assert_eq!(term.id, 7);
        assert_eq!(term.text, "Ephemeral");
        assert_eq!(term.category, "adj");
        assert_eq!(term.example_sentences, vec!["a", "b"]);
        assert_eq!(term.difficulty, Some(2.5));
    }

    #[test]
    fn verify_request_uses_backend_field_names() {
        let body = serde_json::to_value(VerifyRequest {
            term: "Ephemeral".into(),
            answer: "temporary".into(),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"palavra": "Ephemeral", "resposta": "temporary"})
        );
    }

    #[test]
    fn verify_payload_tolerates_missing_feedback() {
        let json = r#"{"acerto": false, "similaridade": 0.2, "definicao_correta": "short-lived"}"#;
        let verdict = Verdict::from(serde_json::from_str::<VerifyPayload>(json).unwrap());
        assert!(!verdict.correct);
        assert_eq!(verdict.message, "");
        assert_eq!(verdict.correct_definition.as_deref(), Some("short-lived"));
    }

    #[test]
    fn phrase_request_uses_backend_field_names() {
        let body = serde_json::to_value(PhraseRequest {
            term_id: 7,
            term: "Ephemeral".into(),
            definition: "short-lived".into(),
            category: "adj".into(),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "palavra_id": 7,
                "palavra": "Ephemeral",
                "definicao": "short-lived",
                "categoria": "adj"
            })
        );
    }

    #[test]
    fn generated_phrase_clamps_remaining() {
        let over = GeneratedPhrase::try_from(PhrasePayload {
            frase: "x".into(),
            frases_restantes: 9,
        })
        .unwrap();
        assert_eq!(over.remaining, PHRASE_QUOTA);

        let under = GeneratedPhrase::try_from(PhrasePayload {
            frase: "x".into(),
            frases_restantes: -4,
        })
        .unwrap();
        assert_eq!(under.remaining, 0);
    }

    #[test]
    fn generated_phrase_rejects_empty_sentence() {
        assert!(GeneratedPhrase::try_from(PhrasePayload {
            frase: " ".into(),
            frases_restantes: 2,
        })
        .is_err());
    }
}
