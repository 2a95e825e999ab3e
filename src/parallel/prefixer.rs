//! Line-buffered `[name]`-prefixed stream interleaving for the Parallel
//! Runner (spec §4.7): each sub-movement's text output is tagged with its
//! name, padded to the longest name in the batch, and colored by a
//! round-robin ANSI palette. Only complete lines are flushed; a sub's
//! trailing partial text stays buffered until its next newline (or until
//! `flush_remaining` at join time). Non-text events bypass the prefixer
//! entirely — they pass straight through to the parent stream sink.

use std::collections::HashMap;

use crate::agent::StreamEvent;

const PALETTE: [u8; 6] = [31, 32, 33, 34, 35, 36];

pub struct LinePrefixer {
    width: usize,
    colors: HashMap<String, u8>,
    buffers: HashMap<String, String>,
    next_color: usize,
}

impl LinePrefixer {
    pub fn new(names: &[String]) -> Self {
        Self {
            width: names.iter().map(|n| n.chars().count()).max().unwrap_or(0),
            colors: HashMap::new(),
            buffers: HashMap::new(),
            next_color: 0,
        }
    }

    fn color_for(&mut self, name: &str) -> u8 {
        if let Some(&c) = self.colors.get(name) {
            return c;
        }
        let c = PALETTE[self.next_color % PALETTE.len()];
        self.next_color += 1;
        self.colors.insert(name.to_string(), c);
        c
    }

    fn prefixed(&mut self, name: &str, line: &str) -> String {
        let color = self.color_for(name);
        format!("\x1b[{color}m[{name:>width$}]\x1b[0m {line}", width = self.width)
    }

    /// Feed one stream event for `name`. Returns zero or more complete,
    /// already-prefixed lines ready to flush. Non-text events return empty
    /// and are the caller's responsibility to forward unprefixed.
    pub fn feed(&mut self, name: &str, event: &StreamEvent) -> Vec<String> {
        let text = match event {
            StreamEvent::Text(s) | StreamEvent::Thinking(s) | StreamEvent::ToolOutput(s) => s,
            StreamEvent::Init | StreamEvent::ToolUse { .. } | StreamEvent::ToolResult { .. } | StreamEvent::Result(_) | StreamEvent::Error(_) => {
                return Vec::new();
            }
        };

        let buf = self.buffers.entry(name.to_string()).or_default();
        buf.push_str(text);

        let mut out = Vec::new();
        while let Some(pos) = buf.find('\n') {
            let line: String = buf.drain(..=pos).collect();
            out.push(self.prefixed(name, line.trim_end_matches('\n')));
        }
        out
    }

    /// Flush every sub's remaining partial line, called once after the
    /// whole batch has joined.
    pub fn flush_remaining(&mut self) -> Vec<String> {
        let names: Vec<String> = self.buffers.iter().filter(|(_, buf)| !buf.is_empty()).map(|(n, _)| n.clone()).collect();
        names.into_iter().map(|name| {
            let remaining = self.buffers.remove(&name).unwrap_or_default();
            self.prefixed(&name, &remaining)
        }).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_ansi(s: &str) -> String {
        let mut out = String::new();
        let mut in_escape = false;
        for c in s.chars() {
            if c == '\x1b' {
                in_escape = true;
                continue;
            }
            if in_escape {
                if c == 'm' {
                    in_escape = false;
                }
                continue;
            }
            out.push(c);
        }
        out
    }

    #[test]
    fn pads_prefix_to_longest_name() {
        let mut prefixer = LinePrefixer::new(&["arch-review".to_string(), "qa".to_string()]);
        let lines = prefixer.feed("qa", &StreamEvent::Text("looks good\n".to_string()));
        assert_eq!(lines.len(), 1);
        assert_eq!(strip_ansi(&lines[0]), "[         qa] looks good");
    }

    #[test]
    fn buffers_partial_lines_until_newline() {
        let mut prefixer = LinePrefixer::new(&["qa".to_string()]);
        assert!(prefixer.feed("qa", &StreamEvent::Text("partial ".to_string())).is_empty());
        let lines = prefixer.feed("qa", &StreamEvent::Text("line\n".to_string()));
        assert_eq!(strip_ansi(&lines[0]), "[qa] partial line");
    }

    #[test]
    fn flush_remaining_emits_unfinished_trailing_text() {
        let mut prefixer = LinePrefixer::new(&["qa".to_string()]);
        prefixer.feed("qa", &StreamEvent::Text("no trailing newline".to_string()));
        let flushed = prefixer.flush_remaining();
        assert_eq!(flushed.len(), 1);
        assert_eq!(strip_ansi(&flushed[0]), "[qa] no trailing newline");
    }

    #[test]
    fn non_text_events_bypass_the_prefixer() {
        let mut prefixer = LinePrefixer::new(&["qa".to_string()]);
        assert!(prefixer.feed("qa", &StreamEvent::Init).is_empty());
        assert!(prefixer.feed("qa", &StreamEvent::Error("boom".to_string())).is_empty());
    }

    #[test]
    fn assigns_distinct_round_robin_colors() {
        let mut prefixer = LinePrefixer::new(&["a".to_string(), "b".to_string()]);
        let first = prefixer.color_for("a");
        let second = prefixer.color_for("b");
        assert_ne!(first, second);
        assert_eq!(prefixer.color_for("a"), first);
    }
}
