//! # Moderation
//!
//! The content moderation collaborator consulted before a post is stored.
//!
//! The engines only depend on the contract: given raw text, return allow or
//! reject plus optional alternative phrasings. A reject is a hard block.

/// The result of reviewing a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Reject {
        /// Alternative phrasings the author may use instead, possibly empty.
        suggestions: Vec<String>,
    },
}

/// A content moderation service.
///
/// # Extension Point
///
/// Implementations may call out to any service; they must be `Send + Sync`
/// so one moderator can be shared by concurrent request handlers.
pub trait Moderator: Send + Sync {
    /// Review `text` before it is published.
    fn review(&self, text: &str) -> Verdict;
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Moderator for AllowAll {
    fn review(&self, _text: &str) -> Verdict {
        Verdict::Allow
    }
}

/// Rejects text containing any blocked term (case-insensitive).
///
/// A rejection suggests the same text with every blocked term masked, when
/// anything is left after masking.
#[derive(Debug, Clone, Default)]
pub struct BlocklistModerator {
    terms: Vec<String>,
}

impl BlocklistModerator {
    /// Create a moderator from a list of blocked terms. Blank terms are ignored.
    #[must_use]
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Replace every blocked term occurrence with asterisks.
    fn mask(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for term in &self.terms {
            let mut lower = masked.to_lowercase();
            // Lowercasing may change byte lengths; only mask when offsets line up.
            if lower.len() != masked.len() {
                continue;
            }
            while let Some(pos) = lower.find(term.as_str()) {
                let stars = "*".repeat(term.chars().count());
                masked.replace_range(pos..pos + term.len(), &stars);
                lower.replace_range(pos..pos + term.len(), &stars);
            }
        }
        masked
    }
}

impl Moderator for BlocklistModerator {
    fn review(&self, text: &str) -> Verdict {
        let lower = text.to_lowercase();
        if !self.terms.iter().any(|t| lower.contains(t.as_str())) {
            return Verdict::Allow;
        }

        let masked = self.mask(text);
        let suggestions = if masked.trim().is_empty() || masked == text {
            Vec::new()
        } else {
            vec![masked]
        };
        tracing::debug!(suggestions = suggestions.len(), "moderation rejected text");
        Verdict::Reject { suggestions }
    }
}
