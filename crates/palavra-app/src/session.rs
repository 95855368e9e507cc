// Session orchestrator: the state machine behind one quiz session.
//
// `Session` owns all mutable quiz state. Intents from the front end may start
// a network call, which runs in a spawned task and reports back over the
// `SessionEvent` channel tagged with the epoch current at issue time. The
// `run` loop is the only place either kind of input is applied, so state is
// never touched concurrently.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::db::DisplayPreference;
use crate::protocol::{
    Feedback, Phase, PhraseRequest, SessionEvent, SessionSnapshot, Term, UiUpdate, UserCommand,
    Verdict, NO_TERM_ID,
};
use crate::quota::{PhraseQuota, PHRASE_QUOTA};
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Delay between a correct answer and the automatic load of the next term.
pub const AUTO_ADVANCE_DELAY: Duration = Duration::from_secs(2);

const CORRECT_FALLBACK: &str = "✅ Correct!";
const INCORRECT_FALLBACK: &str = "❌ Not quite. Try again.";

// ---------------------------------------------------------------------------
// In-flight tokens
// ---------------------------------------------------------------------------

/// The three kinds of suspendable operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    LoadTerm,
    Submit,
    GeneratePhrase,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OperationKind::LoadTerm => "term load",
            OperationKind::Submit => "answer submission",
            OperationKind::GeneratePhrase => "phrase generation",
        };
        f.write_str(label)
    }
}

/// One slot per operation kind. A slot is taken before the task is spawned
/// and given back when its completion event is handled, stale or not.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    load_term: bool,
    submit: bool,
    generate_phrase: bool,
}

impl InFlight {
    fn slot_mut(&mut self, kind: OperationKind) -> &mut bool {
        match kind {
            OperationKind::LoadTerm => &mut self.load_term,
            OperationKind::Submit => &mut self.submit,
            OperationKind::GeneratePhrase => &mut self.generate_phrase,
        }
    }

    /// Take the slot for `kind`. Returns `false` if it is already held.
    pub fn try_acquire(&mut self, kind: OperationKind) -> bool {
        let slot = self.slot_mut(kind);
        if *slot {
            return false;
        }
        *slot = true;
        true
    }

    pub fn release(&mut self, kind: OperationKind) {
        *self.slot_mut(kind) = false;
    }

    pub fn is_active(&self, kind: OperationKind) -> bool {
        match kind {
            OperationKind::LoadTerm => self.load_term,
            OperationKind::Submit => self.submit,
            OperationKind::GeneratePhrase => self.generate_phrase,
        }
    }
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Why an intent was refused without touching the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentRejected {
    #[error("Please type an answer before submitting.")]
    EmptyAnswer,

    #[error("No word is loaded yet.")]
    NoTermLoaded,

    #[error("No more example sentences for this word.")]
    QuotaExhausted,

    #[error("Example sentences are not available for this word.")]
    InvalidTerm,

    #[error("A {0} is already in progress.")]
    AlreadyInFlight(OperationKind),
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The complete session state plus the handles needed to start work.
pub struct Session {
    transport: Arc<dyn Transport>,
    /// Spawned tasks send their results through clones of this sender.
    events_tx: mpsc::Sender<SessionEvent>,
    preference: DisplayPreference,

    term: Option<Term>,
    score: u32,
    total_attempts: u32,
    feedback: Feedback,
    phrase_notice: Option<String>,
    quota: PhraseQuota,
    in_flight: InFlight,
    /// Set when the last term load or submission failed.
    failed: bool,
    /// Bumped every time a term load starts. Completions carrying an older
    /// value belong to a superseded term and are discarded.
    epoch: u64,
    pending_advance: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(
        transport: Arc<dyn Transport>,
        preference: DisplayPreference,
        events_tx: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Session {
            transport,
            events_tx,
            preference,
            term: None,
            score: 0,
            total_attempts: 0,
            feedback: Feedback::default(),
            phrase_notice: None,
            quota: PhraseQuota::new(),
            in_flight: InFlight::default(),
            failed: false,
            epoch: 0,
            pending_advance: None,
        }
    }

    // --- Accessors ---------------------------------------------------------

    pub fn term(&self) -> Option<&Term> {
        self.term.as_ref()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn total_attempts(&self) -> u32 {
        self.total_attempts
    }

    pub fn feedback(&self) -> &Feedback {
        &self.feedback
    }

    pub fn phrase_notice(&self) -> Option<&str> {
        self.phrase_notice.as_deref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_in_flight(&self, kind: OperationKind) -> bool {
        self.in_flight.is_active(kind)
    }

    pub fn auto_advance_pending(&self) -> bool {
        self.pending_advance.is_some()
    }

    pub fn dark_mode(&self) -> bool {
        self.preference.dark_mode()
    }

    /// Sentences still available for the current term; full when no term
    /// is loaded.
    pub fn quota_remaining(&self) -> u32 {
        match &self.term {
            Some(term) => self.quota.remaining(term.id),
            None => PHRASE_QUOTA,
        }
    }

    /// Derived from what is outstanding, whether the last operation failed,
    /// and whether a term is present, in that order of precedence.
    pub fn phase(&self) -> Phase {
        if self.in_flight.is_active(OperationKind::LoadTerm) {
            Phase::LoadingTerm
        } else if self.in_flight.is_active(OperationKind::Submit) {
            Phase::Submitting
        } else if self.in_flight.is_active(OperationKind::GeneratePhrase) {
            Phase::GeneratingPhrase
        } else if self.failed {
            Phase::Error
        } else if self.term.is_some() {
            Phase::Ready
        } else {
            Phase::Idle
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let accuracy_percent = if self.total_attempts > 0 {
            f64::from(self.score) / f64::from(self.total_attempts) * 100.0
        } else {
            0.0
        };
        SessionSnapshot {
            phase: self.phase(),
            term: self.term.clone(),
            score: self.score,
            total_attempts: self.total_attempts,
            accuracy_percent,
            feedback: self.feedback.clone(),
            phrase_notice: self.phrase_notice.clone(),
            loading: self.in_flight.is_active(OperationKind::LoadTerm),
            submitting: self.in_flight.is_active(OperationKind::Submit),
            generating_phrase: self.in_flight.is_active(OperationKind::GeneratePhrase),
            quota_remaining: self.quota_remaining(),
            dark_mode: self.preference.dark_mode(),
        }
    }

    // --- Intents -----------------------------------------------------------

    /// Dispatch a front-end command. Rejections are logged; the ones the
    /// user needs to see have already been written into the state.
    pub fn handle_command(&mut self, cmd: UserCommand) {
        let outcome = match cmd {
            UserCommand::LoadNextTerm => self.load_next_term(),
            UserCommand::SubmitAnswer(answer) => self.submit_answer(&answer),
            UserCommand::GeneratePhrase => self.generate_phrase(),
            UserCommand::TogglePreference => {
                self.toggle_preference();
                Ok(())
            }
            UserCommand::Quit => Ok(()),
        };
        if let Err(rejected) = outcome {
            debug!("Intent rejected: {}", rejected);
        }
    }

    /// Drop the current term and fetch a new one.
    ///
    /// Cancels any scheduled auto-advance, clears feedback and resets the
    /// phrase quota before the request is issued.
    pub fn load_next_term(&mut self) -> Result<(), IntentRejected> {
        if !self.in_flight.try_acquire(OperationKind::LoadTerm) {
            return Err(IntentRejected::AlreadyInFlight(OperationKind::LoadTerm));
        }

        self.cancel_auto_advance();
        self.epoch += 1;
        self.term = None;
        self.quota.clear();
        self.feedback = Feedback::default();
        self.phrase_notice = None;
        self.failed = false;

        let epoch = self.epoch;
        let transport = Arc::clone(&self.transport);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = transport.fetch_random_term().await;
            if tx.send(SessionEvent::TermLoaded { epoch, result }).await.is_err() {
                debug!("Session loop closed before term load completed");
            }
        });

        info!("Loading next term (epoch {})", epoch);
        Ok(())
    }

    /// Send `answer` for scoring against the current term.
    ///
    /// A blank answer is refused locally with a validation message and never
    /// reaches the scorer.
    pub fn submit_answer(&mut self, answer: &str) -> Result<(), IntentRejected> {
        let Some(term) = &self.term else {
            return Err(IntentRejected::NoTermLoaded);
        };
        if self.in_flight.is_active(OperationKind::Submit) {
            return Err(IntentRejected::AlreadyInFlight(OperationKind::Submit));
        }

        let answer = answer.trim();
        if answer.is_empty() {
            let rejected = IntentRejected::EmptyAnswer;
            self.feedback = Feedback::error(rejected.to_string());
            return Err(rejected);
        }

        let term_text = term.text.clone();
        let answer = answer.to_string();
        if !self.in_flight.try_acquire(OperationKind::Submit) {
            return Err(IntentRejected::AlreadyInFlight(OperationKind::Submit));
        }
        self.failed = false;

        let epoch = self.epoch;
        let transport = Arc::clone(&self.transport);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = transport.verify(&term_text, &answer).await;
            if tx
                .send(SessionEvent::AnswerVerified { epoch, result })
                .await
                .is_err()
            {
                debug!("Session loop closed before verification completed");
            }
        });

        info!("Submitted answer (epoch {})", epoch);
        Ok(())
    }

    /// Request one more example sentence for the current term.
    pub fn generate_phrase(&mut self) -> Result<(), IntentRejected> {
        let Some(term) = &self.term else {
            return Err(IntentRejected::NoTermLoaded);
        };
        if term.id == NO_TERM_ID {
            return Err(IntentRejected::InvalidTerm);
        }
        if self.quota.remaining(term.id) == 0 {
            let rejected = IntentRejected::QuotaExhausted;
            self.phrase_notice = Some(rejected.to_string());
            return Err(rejected);
        }

        let request = PhraseRequest::for_term(term);
        if !self.in_flight.try_acquire(OperationKind::GeneratePhrase) {
            return Err(IntentRejected::AlreadyInFlight(OperationKind::GeneratePhrase));
        }
        self.phrase_notice = None;

        let epoch = self.epoch;
        let transport = Arc::clone(&self.transport);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = transport.generate_phrase(&request).await;
            if tx
                .send(SessionEvent::PhraseGenerated { epoch, result })
                .await
                .is_err()
            {
                debug!("Session loop closed before phrase generation completed");
            }
        });

        info!("Requested example sentence (epoch {})", epoch);
        Ok(())
    }

    /// Flip dark/light mode. Returns the new value.
    pub fn toggle_preference(&mut self) -> bool {
        let dark_mode = self.preference.toggle();
        info!("Display preference set to {}", if dark_mode { "dark" } else { "light" });
        dark_mode
    }

    // --- Completions -------------------------------------------------------

    /// Apply a completion event. The matching flight slot is always released;
    /// the payload is only applied if its epoch is still current.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match &event {
            SessionEvent::TermLoaded { .. } => self.in_flight.release(OperationKind::LoadTerm),
            SessionEvent::AnswerVerified { .. } => self.in_flight.release(OperationKind::Submit),
            SessionEvent::PhraseGenerated { .. } => {
                self.in_flight.release(OperationKind::GeneratePhrase)
            }
            SessionEvent::AutoAdvance { .. } => {}
        }

        if event.epoch() != self.epoch {
            debug!(
                "Discarding stale session event (event epoch: {}, current epoch: {})",
                event.epoch(),
                self.epoch
            );
            return;
        }

        match event {
            SessionEvent::TermLoaded { result: Ok(term), .. } => {
                info!("Loaded term {} ({:?})", term.id, term.text);
                self.quota.clear();
                self.term = Some(term);
                self.failed = false;
            }
            SessionEvent::TermLoaded { result: Err(err), .. } => {
                warn!("Term load failed: {}", err);
                self.term = None;
                self.feedback = Feedback::error(err.to_string());
                self.failed = true;
            }
            SessionEvent::AnswerVerified { result: Ok(verdict), .. } => {
                self.apply_verdict(verdict);
            }
            SessionEvent::AnswerVerified { result: Err(err), .. } => {
                warn!("Answer verification failed: {}", err);
                self.feedback = Feedback::error(err.to_string());
                self.failed = true;
            }
            SessionEvent::PhraseGenerated { result: Ok(generated), .. } => {
                let Some(term) = self.term.as_mut() else {
                    debug!("Generated phrase arrived with no term loaded, discarding");
                    return;
                };
                term.example_sentences.push(generated.phrase);
                if let Err(e) = self.quota.record_generation(term.id) {
                    error!("Phrase recorded past quota: {}", e);
                }
                self.quota.reconcile(term.id, generated.remaining);
                self.phrase_notice = None;
                info!(
                    "Added example sentence for term {} ({} remaining)",
                    term.id, generated.remaining
                );
            }
            SessionEvent::PhraseGenerated { result: Err(err), .. } => {
                warn!("Phrase generation failed: {}", err);
                self.phrase_notice = Some(format!("Could not generate a sentence: {err}"));
            }
            SessionEvent::AutoAdvance { .. } => {
                self.pending_advance = None;
                if let Err(rejected) = self.load_next_term() {
                    debug!("Auto-advance skipped: {}", rejected);
                }
            }
        }
    }

    fn apply_verdict(&mut self, verdict: Verdict) {
        self.total_attempts += 1;
        if verdict.correct {
            self.score += 1;
        }
        self.failed = false;

        let message = if verdict.message.trim().is_empty() {
            if verdict.correct {
                CORRECT_FALLBACK
            } else {
                INCORRECT_FALLBACK
            }
            .to_string()
        } else {
            verdict.message
        };
        self.feedback = Feedback {
            visible: true,
            correct: verdict.correct,
            message,
            correct_definition: verdict.correct_definition,
            similarity: Some(verdict.similarity),
        };

        info!(
            "Answer scored: correct={} similarity={:.2} ({}/{})",
            verdict.correct, verdict.similarity, self.score, self.total_attempts
        );

        if verdict.correct {
            self.schedule_auto_advance();
        }
    }

    // --- Auto-advance ------------------------------------------------------

    /// Arrange for the next term to load after [`AUTO_ADVANCE_DELAY`]. The
    /// timer carries the current epoch, so a manual load in the meantime
    /// turns it into a no-op even if it has already fired.
    fn schedule_auto_advance(&mut self) {
        self.cancel_auto_advance();

        let epoch = self.epoch;
        let tx = self.events_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(AUTO_ADVANCE_DELAY).await;
            let _ = tx.send(SessionEvent::AutoAdvance { epoch }).await;
        });
        self.pending_advance = Some(handle);
        debug!("Auto-advance scheduled (epoch {})", epoch);
    }

    /// Abort the pending auto-advance timer, if any.
    pub fn cancel_auto_advance(&mut self) {
        if let Some(handle) = self.pending_advance.take() {
            handle.abort();
            debug!("Cancelled pending auto-advance");
        }
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the session event loop.
///
/// Starts the first term load, then listens on:
/// 1. User commands from the front end
/// 2. Completion events from spawned network tasks and the timer
///
/// After each handled input a fresh snapshot is pushed through `ui_tx`.
/// Returns on `UserCommand::Quit` or when the command channel closes.
pub async fn run(
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    mut events_rx: mpsc::Receiver<SessionEvent>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut session: Session,
) -> anyhow::Result<()> {
    info!("Session event loop started");

    if let Err(rejected) = session.load_next_term() {
        warn!("Initial term load not started: {}", rejected);
    }
    publish(&session, &ui_tx).await;

    // The session holds a sender, so this only closes if every clone is
    // dropped; stop polling rather than spin if it does.
    let mut events_open = true;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => session.handle_command(cmd),
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }

            event = events_rx.recv(), if events_open => {
                match event {
                    Some(event) => session.handle_event(event),
                    None => {
                        info!("Session event channel closed");
                        events_open = false;
                        continue;
                    }
                }
            }
        }

        publish(&session, &ui_tx).await;
    }

    session.cancel_auto_advance();
    info!("Session event loop exiting");
    Ok(())
}

async fn publish(session: &Session, ui_tx: &mpsc::Sender<UiUpdate>) {
    let _ = ui_tx
        .send(UiUpdate::Snapshot(Box::new(session.snapshot())))
        .await;
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
