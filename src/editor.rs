//! Line-oriented text editor on standard input.
//!
//! Lines are collected into a draft. A line holding a single `.` publishes
//! the draft as the new display text and starts a fresh one. End of input
//! discards any unpublished draft and closes the update channel.
//!
//! ```text
//! Shopping
//!  - milk
//!  - eggs
//! .
//! ```

use std::io::BufRead;

use crate::display::{UpdateClosed, UpdatePublisher};

/// Line that publishes the current draft.
pub const PUBLISH_MARKER: &str = ".";

/// Read drafts from `input` until it ends, publishing each completed one.
///
/// Blocks the calling thread; run it on a dedicated thread, not inside the
/// async runtime. Returns the number of texts published.
pub fn run_line_editor<R: BufRead>(
    input: R,
    publisher: UpdatePublisher,
) -> Result<usize, UpdateClosed> {
    let mut draft: Vec<String> = Vec::new();
    let mut published = 0;

    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Stopped reading editor input");
                break;
            }
        };

        if line.trim_end() == PUBLISH_MARKER {
            let text = draft.join("\n");
            draft.clear();
            publisher.blocking_publish(text)?;
            published += 1;
            tracing::debug!(published, "Published text from editor");
        } else {
            draft.push(line);
        }
    }

    if !draft.is_empty() {
        tracing::info!(lines = draft.len(), "Discarding unpublished draft");
    }
    Ok(published)
}
