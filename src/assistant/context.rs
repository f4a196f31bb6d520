use std::collections::VecDeque;

use crate::query::{describe_filters, FilterSpec};

const MAX_CONTEXT_ENTRIES: usize = 20;
const MAX_HISTORY_TURNS: usize = 50;
/// Most earlier questions ever rendered into a router prompt.
pub const MAX_CONTEXT_WINDOW: usize = 3;

/// One routed question, kept so follow-ups can refer back to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    pub question: String,
    pub table_name: String,
    pub filters: FilterSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Per-session state handed to and updated by the assistant.
#[derive(Debug, Default)]
pub struct Conversation {
    entries: VecDeque<ContextEntry>,
    history: VecDeque<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: ContextEntry) {
        if self.entries.len() == MAX_CONTEXT_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn push_turn(&mut self, role: Role, content: impl Into<String>) {
        if self.history.len() == MAX_HISTORY_TURNS {
            self.history.pop_front();
        }
        self.history.push_back(Turn {
            role,
            content: content.into(),
        });
    }

    /// The last `n` routed questions, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &ContextEntry> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    pub fn history(&self) -> impl Iterator<Item = &Turn> {
        self.history.iter()
    }

    /// Routed questions remembered, excluding unroutable ones.
    pub fn query_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.history.is_empty()
    }

    /// Prompt block describing the last `n` questions (at most
    /// `MAX_CONTEXT_WINDOW`), or `None` if there are none.
    pub fn render_recent(&self, n: usize) -> Option<String> {
        let n = n.min(MAX_CONTEXT_WINDOW);
        if n == 0 || self.entries.is_empty() {
            return None;
        }
        let lines: Vec<String> = self
            .recent(n)
            .map(|e| {
                format!(
                    "- Pregunta: \"{}\" → fuente: {} | filtros: {}",
                    e.question,
                    e.table_name,
                    describe_filters(&e.filters)
                )
            })
            .collect();
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FilterClause, Operator};

    fn entry(i: usize) -> ContextEntry {
        ContextEntry {
            question: format!("pregunta {}", i),
            table_name: "tickets".to_string(),
            filters: vec![FilterClause::new("Estado", Operator::Equals, "Abierto")],
        }
    }

    #[test]
    fn test_recent_returns_last_entries_in_order() {
        let mut conv = Conversation::new();
        for i in 0..5 {
            conv.record(entry(i));
        }
        let recent: Vec<&str> = conv.recent(3).map(|e| e.question.as_str()).collect();
        assert_eq!(recent, vec!["pregunta 2", "pregunta 3", "pregunta 4"]);
    }

    #[test]
    fn test_entries_are_capped() {
        let mut conv = Conversation::new();
        for i in 0..(MAX_CONTEXT_ENTRIES + 5) {
            conv.record(entry(i));
        }
        assert_eq!(conv.query_count(), MAX_CONTEXT_ENTRIES);
        assert_eq!(
            conv.recent(1).next().unwrap().question,
            format!("pregunta {}", MAX_CONTEXT_ENTRIES + 4)
        );
    }

    #[test]
    fn test_history_is_capped() {
        let mut conv = Conversation::new();
        for i in 0..(MAX_HISTORY_TURNS + 1) {
            conv.push_turn(Role::User, format!("m{}", i));
        }
        assert_eq!(conv.history().count(), MAX_HISTORY_TURNS);
        assert_eq!(conv.history().next().unwrap().content, "m1");
    }

    #[test]
    fn test_render_recent() {
        let mut conv = Conversation::new();
        assert!(conv.render_recent(3).is_none());
        conv.record(entry(1));
        let block = conv.render_recent(3).unwrap();
        assert!(block.contains("pregunta 1"));
        assert!(block.contains(r#"Estado = "Abierto""#));
    }

    #[test]
    fn test_render_recent_never_exceeds_window() {
        let mut conv = Conversation::new();
        for i in 0..8 {
            conv.record(entry(i));
        }
        let block = conv.render_recent(10).unwrap();
        assert_eq!(block.lines().count(), MAX_CONTEXT_WINDOW);
        assert!(block.contains("pregunta 7"));
        assert!(!block.contains("pregunta 4"));
    }
}
