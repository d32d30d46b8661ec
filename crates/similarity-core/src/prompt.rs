//! Greedy, word-budgeted prompt assembly.
//!
//! The assembler starts from a fixed introduction plus the rendered question
//! and appends fragments, in ranked order, as delimited "prompt sections"
//! until the next section would push the whole prompt past the budget.
//!
//! # Token counting
//!
//! Tokens are approximated by whitespace-delimited words
//! ([`count_tokens`]). The section delimiters and the `Question:` label
//! count as words too.
//!
//! # Layout
//!
//! ```text
//! {introduction}
//!
//! Prompt section:
//! """
//! {fragment text}
//! """
//!
//! Question: {query}
//! ```

use crate::models::Fragment;

/// Introduction used when none is configured.
pub const DEFAULT_INTRODUCTION: &str = "Use the below sample data to answer the subsequent question. If the answer cannot be found in the data source, write \"I could not find an answer.\"";

/// Word budget used when none is configured.
pub const DEFAULT_TOKEN_BUDGET: usize = 1000;

/// Approximate token count: the number of whitespace-delimited words.
pub fn count_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Packs ranked fragments into a prompt bounded by a word budget.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    introduction: String,
    token_budget: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_BUDGET)
    }
}

impl ContextAssembler {
    pub fn new(token_budget: usize) -> Self {
        Self {
            introduction: DEFAULT_INTRODUCTION.to_string(),
            token_budget,
        }
    }

    pub fn with_introduction(mut self, introduction: impl Into<String>) -> Self {
        self.introduction = introduction.into();
        self
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    pub fn introduction(&self) -> &str {
        &self.introduction
    }

    /// Build the prompt for `query` from `fragments`.
    ///
    /// - No fragments: the raw query is returned unchanged.
    /// - Otherwise sections are appended while the full prompt (introduction,
    ///   sections, question) stays within the budget. The first section that
    ///   would overflow stops the loop; nothing already appended is removed.
    ///   If no section fits, the result is introduction + question.
    pub fn assemble(&self, query: &str, fragments: &[Fragment]) -> String {
        if fragments.is_empty() {
            return query.to_string();
        }

        let question = format!("\n\nQuestion: {}", query);
        let question_tokens = count_tokens(&question);

        let mut message = self.introduction.clone();
        let mut used = count_tokens(&message) + question_tokens;

        for fragment in fragments {
            let section = prompt_section(&fragment.text);
            let section_tokens = count_tokens(&section);
            if used + section_tokens > self.token_budget {
                break;
            }
            message.push_str(&section);
            used += section_tokens;
        }

        message.push_str(&question);
        message
    }
}

fn prompt_section(text: &str) -> String {
    format!("\n\nPrompt section:\n\"\"\"\n{}\n\"\"\"", text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(text: &str) -> Fragment {
        Fragment::new("id", text)
    }

    #[test]
    fn test_count_tokens() {
        assert_eq!(count_tokens(""), 0);
        assert_eq!(count_tokens("  one\ttwo\n\nthree  "), 3);
        assert_eq!(count_tokens("\"\"\"\nabc\n\"\"\""), 3);
    }

    #[test]
    fn test_empty_fragments_forward_raw_query() {
        let assembler = ContextAssembler::new(10);
        assert_eq!(
            assembler.assemble("plat nomor B1207KDZ?", &[]),
            "plat nomor B1207KDZ?"
        );
    }

    #[test]
    fn test_stops_before_overflow() {
        // Baseline: "Use data." (2) + "Question: Q?" (2) = 4 words.
        // A section costs 4 delimiter words plus its text.
        let assembler = ContextAssembler::new(10).with_introduction("Use data.");
        let fragments = vec![fragment("two words"), fragment("x")];

        let prompt = assembler.assemble("Q?", &fragments);

        assert_eq!(
            prompt,
            "Use data.\n\nPrompt section:\n\"\"\"\ntwo words\n\"\"\"\n\nQuestion: Q?"
        );
        assert_eq!(count_tokens(&prompt), 10);
    }

    #[test]
    fn test_later_fragments_are_not_considered_after_stop() {
        let assembler = ContextAssembler::new(12).with_introduction("Use data.");
        // The second fragment overflows; the third would fit on its own but
        // packing stops at the first overflow.
        let fragments = vec![
            fragment("a"),
            fragment("far too many words for the rest"),
            fragment("b"),
        ];
        let prompt = assembler.assemble("Q?", &fragments);
        assert!(prompt.contains("\na\n"));
        assert!(!prompt.contains("\nb\n"));
        assert!(!prompt.contains("far too many"));
    }

    #[test]
    fn test_zero_fragments_fit() {
        let assembler = ContextAssembler::new(5).with_introduction("Use data.");
        let prompt = assembler.assemble("Q?", &[fragment("one two three")]);
        assert_eq!(prompt, "Use data.\n\nQuestion: Q?");
    }

    #[test]
    fn test_budget_five_counts_delimiters_and_question_label() {
        // "Use data." and "Question: Q?" take 4 words; the section for
        // "two words" is 6 ("Prompt section:", two quote fences, the text).
        let assembler = ContextAssembler::new(5).with_introduction("Use data.");
        let prompt = assembler.assemble("Q?", &[fragment("two words")]);
        assert_eq!(prompt, "Use data.\n\nQuestion: Q?");
    }

    #[test]
    fn test_never_exceeds_budget_when_sections_added() {
        let texts = [
            "stock_no: BA00001323K14; plat_no: B1207KDZ",
            "a b c d e f g",
            "single",
            "lorem ipsum dolor sit amet consectetur",
        ];
        let fragments: Vec<Fragment> = texts.iter().map(|t| fragment(t)).collect();
        for budget in 0..60 {
            let assembler = ContextAssembler::new(budget);
            let prompt = assembler.assemble("what plate?", &fragments);
            if prompt.contains("Prompt section:") {
                assert!(
                    count_tokens(&prompt) <= budget,
                    "budget {} exceeded: {}",
                    budget,
                    count_tokens(&prompt)
                );
            }
        }
    }

    #[test]
    fn test_default_introduction() {
        let assembler = ContextAssembler::default();
        assert_eq!(assembler.token_budget(), DEFAULT_TOKEN_BUDGET);
        let prompt = assembler.assemble("q", &[fragment("data")]);
        assert!(prompt.starts_with(DEFAULT_INTRODUCTION));
        assert!(prompt.ends_with("\n\nQuestion: q"));
    }
}
