// Snapshot rendering: turns a SessionSnapshot into the text block printed
// above the prompt.

use std::fmt::Write;

use palavra_app::protocol::{Phase, SessionSnapshot};
use palavra_app::quota::PHRASE_QUOTA;

pub const HELP_TEXT: &str = "\
Commands:
  <text>        submit <text> as the meaning of the current word
  :next, :n     skip to the next word
  :phrase, :p   generate another example sentence
  :theme, :t    toggle dark/light colors
  :help         show this list
  :quit, :q     exit
";

pub const PROMPT: &str = "> ";

/// ANSI escape sequences for one color scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub heading: &'static str,
    pub success: &'static str,
    pub failure: &'static str,
    pub muted: &'static str,
    pub reset: &'static str,
}

pub const DARK: Palette = Palette {
    heading: "\x1b[1;96m",
    success: "\x1b[92m",
    failure: "\x1b[91m",
    muted: "\x1b[37m",
    reset: "\x1b[0m",
};

pub const LIGHT: Palette = Palette {
    heading: "\x1b[1;34m",
    success: "\x1b[32m",
    failure: "\x1b[31m",
    muted: "\x1b[90m",
    reset: "\x1b[0m",
};

pub fn palette(dark_mode: bool) -> Palette {
    if dark_mode {
        DARK
    } else {
        LIGHT
    }
}

/// Render the whole screen for `snapshot`, without the trailing prompt.
pub fn render_snapshot(snapshot: &SessionSnapshot) -> String {
    let p = palette(snapshot.dark_mode);
    let mut out = String::new();

    // Score line
    let _ = writeln!(
        out,
        "{}Score {}/{} ({:.0}%){}",
        p.muted, snapshot.score, snapshot.total_attempts, snapshot.accuracy_percent, p.reset
    );

    // Term
    match &snapshot.term {
        Some(term) => {
            let _ = write!(out, "{}{}{}", p.heading, term.text, p.reset);
            if !term.category.is_empty() {
                let _ = write!(out, "  {}[{}]{}", p.muted, term.category, p.reset);
            }
            if let Some(difficulty) = term.difficulty {
                let _ = write!(out, "  {}difficulty {:.1}{}", p.muted, difficulty, p.reset);
            }
            out.push('\n');

            for sentence in &term.example_sentences {
                let _ = writeln!(out, "  • {}", sentence);
            }
        }
        None if snapshot.loading => {
            let _ = writeln!(out, "{}Loading a word...{}", p.muted, p.reset);
        }
        None => {
            let _ = writeln!(out, "{}No word loaded. Type :next to try again.{}", p.muted, p.reset);
        }
    }

    // Activity
    match snapshot.phase {
        Phase::Submitting => {
            let _ = writeln!(out, "{}Checking your answer...{}", p.muted, p.reset);
        }
        Phase::GeneratingPhrase => {
            let _ = writeln!(out, "{}Generating an example sentence...{}", p.muted, p.reset);
        }
        _ => {}
    }
    if snapshot.generating_phrase && snapshot.phase != Phase::GeneratingPhrase {
        let _ = writeln!(out, "{}(example sentence on the way){}", p.muted, p.reset);
    }

    // Feedback
    let feedback = &snapshot.feedback;
    if feedback.visible {
        let color = if feedback.correct { p.success } else { p.failure };
        let _ = writeln!(out, "{}{}{}", color, feedback.message, p.reset);
        if let Some(definition) = &feedback.correct_definition {
            let _ = writeln!(out, "Definition: {}", definition);
        }
        if let Some(similarity) = feedback.similarity {
            let _ = writeln!(
                out,
                "{}Similarity: {:.0}%{}",
                p.muted,
                similarity * 100.0,
                p.reset
            );
        }
    }

    // Quota
    if snapshot.term.is_some() {
        let _ = writeln!(
            out,
            "{}Example sentences left: {}/{}{}",
            p.muted, snapshot.quota_remaining, PHRASE_QUOTA, p.reset
        );
    }
    if let Some(notice) = &snapshot.phrase_notice {
        let _ = writeln!(out, "{}{}{}", p.failure, notice, p.reset);
    }

    out
}
