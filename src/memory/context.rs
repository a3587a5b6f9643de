use std::collections::VecDeque;

use tracing::debug;

use super::store::MemoryStore;
use crate::constants::{CONTEXT_FOOTER, CONTEXT_HEADER};

impl MemoryStore {
    /// Render the channel's history as a delimited context block for the LLM
    /// prompt, at most `max_chars` characters long.
    ///
    /// Entries are selected newest-to-oldest while header + footer + lines
    /// fit the budget, then rendered oldest-first. An empty string means "no
    /// context" and the caller sends the bare prompt; this function has no
    /// failure path because a lost context must never block a request.
    pub(crate) fn format_context(&self, channel_id: &str, max_chars: usize) -> String {
        let history = self.get_history(channel_id);
        if history.is_empty() {
            return String::new();
        }

        let header = format!("{CONTEXT_HEADER}\n");
        let footer = format!("{CONTEXT_FOOTER}\n\n");
        let mut total = header.chars().count() + footer.chars().count();
        if total > max_chars {
            return String::new();
        }

        let mut lines: VecDeque<String> = VecDeque::new();
        for entry in history.iter().rev() {
            if entry.author_name.is_empty() || entry.content.is_empty() {
                continue;
            }
            let line = format!("{} ({}): {}\n", entry.author_name, entry.role, entry.content);
            let line_chars = line.chars().count();
            if total + line_chars > max_chars {
                break;
            }
            lines.push_front(line);
            total += line_chars;
        }

        if lines.is_empty() {
            return String::new();
        }

        let mut context = header;
        for line in &lines {
            context.push_str(line);
        }
        context.push_str(&footer);
        debug!(
            channel = %channel_id,
            chars = total,
            entries = lines.len(),
            "Built memory context"
        );
        context
    }
}
