//! Text summary builder for CLI output.
//!
//! Formats outcomes and sessions as human-readable lines for the console and
//! short sentences for spoken feedback.

use crate::model::{Outcome, ProcessRecord, Session};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// `verb` is the past tense shown to the user ("Closed", "Restored").
pub(crate) fn build_text_summary(verb: &str, outcome: &Outcome) -> TextSummary {
    let mut lines = vec![format!("{verb} {} application(s)", outcome.total)];
    if !outcome.succeeded.is_empty() {
        lines.push(format!("  ok:     {}", outcome.succeeded.join(", ")));
    }
    for failure in &outcome.failed {
        lines.push(format!("  failed: {failure}"));
    }
    TextSummary { lines }
}

/// One sentence for text-to-speech.
pub(crate) fn spoken_summary(verb: &str, outcome: &Outcome) -> String {
    match outcome.failed.len() {
        0 => format!("{verb} {} applications", outcome.total),
        n => format!("{verb} {} applications, {n} failed", outcome.total),
    }
}

pub(crate) fn build_session_summary(session: &Session) -> TextSummary {
    let mut lines = vec![format!(
        "Session {} ({}), {} app(s)",
        session.name,
        if session.timestamp.is_empty() {
            "no timestamp"
        } else {
            session.timestamp.as_str()
        },
        session.apps.len()
    )];
    lines.extend(session.apps.iter().map(app_line));
    TextSummary { lines }
}

pub(crate) fn app_line(app: &ProcessRecord) -> String {
    let exe = app
        .executable_path
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".into());
    format!("  {:>7}  {:<24} {exe}", app.pid, app.name)
}
