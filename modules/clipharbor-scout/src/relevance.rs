//! Topical relevance filter.
//!
//! Single-keyword matching over broad communities produces mostly false
//! positives ("AI" in a comment thread about anything), so general sources
//! must satisfy a conjunction: a primary topic term AND a co-occurrence
//! term AND a structural generation pattern, all with word-boundary
//! semantics. Trusted sources are pre-declared topically pure and skip the
//! conjunction. Exclusion terms veto any candidate, trusted or not.

use regex::Regex;

/// Primary topic terms. At least one must appear as a whole word.
pub const PRIMARY_TERMS: &[&str] = &[
    "ai",
    "artificial intelligence",
    "sora",
    "veo",
    "midjourney",
    "runway",
    "kling",
    "pika",
    "stable diffusion",
    "text to video",
];

/// Co-occurrence terms that anchor the topic to video content.
pub const SECONDARY_TERMS: &[&str] = &[
    "video",
    "clip",
    "animation",
    "render",
    "footage",
    "timelapse",
    "short film",
    "cinematic",
];

/// Structural generation patterns: topic term adjacent to a generation verb.
pub const GENERATION_PATTERNS: &[&str] = &[
    r"(?i)\b(ai|sora|veo|runway|midjourney|kling|pika)[\s-]+(generated|created|made|powered|rendered)\b",
    r"(?i)\b(generated|created|made|rendered)[\s-]+(with|using|by|in)[\s-]+(ai|sora|veo|runway|midjourney|kling|pika)\b",
    r"(?i)\btext[\s-]+to[\s-]+video\b",
];

/// Any of these anywhere rejects the candidate outright.
pub const EXCLUSION_TERMS: &[&str] = &[
    "giveaway",
    "promo code",
    "looking for work",
    "hiring",
    "for sale",
];

pub struct RelevanceFilter {
    primary: Vec<Regex>,
    secondary: Vec<Regex>,
    patterns: Vec<Regex>,
    exclusions: Vec<Regex>,
}

impl RelevanceFilter {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            primary: compile_terms(PRIMARY_TERMS)?,
            secondary: compile_terms(SECONDARY_TERMS)?,
            patterns: GENERATION_PATTERNS
                .iter()
                .map(|p| Regex::new(p))
                .collect::<Result<_, _>>()?,
            exclusions: compile_terms(EXCLUSION_TERMS)?,
        })
    }

    /// Decide whether candidate text is in scope.
    pub fn is_relevant(&self, text: &str, source_is_trusted: bool) -> bool {
        if self.exclusions.iter().any(|re| re.is_match(text)) {
            return false;
        }
        if source_is_trusted {
            return true;
        }
        self.primary.iter().any(|re| re.is_match(text))
            && self.secondary.iter().any(|re| re.is_match(text))
            && self.patterns.iter().any(|re| re.is_match(text))
    }
}

/// Compile a term into a case-insensitive whole-word matcher. Multi-word
/// terms tolerate hyphens or whitespace between words.
fn compile_terms(terms: &[&str]) -> Result<Vec<Regex>, regex::Error> {
    terms
        .iter()
        .map(|term| {
            let words: Vec<String> = term.split_whitespace().map(regex::escape).collect();
            Regex::new(&format!(r"(?i)\b{}\b", words.join(r"[\s-]+")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> RelevanceFilter {
        RelevanceFilter::new().unwrap()
    }

    #[test]
    fn accepts_full_conjunction() {
        assert!(filter().is_relevant("AI generated video of a sunset over the bay", false));
    }

    #[test]
    fn word_boundary_rejects_air() {
        // "air" contains "ai" as a substring but not as a word.
        assert!(!filter().is_relevant("fresh air video generated daily", false));
    }

    #[test]
    fn primary_alone_is_not_enough() {
        assert!(!filter().is_relevant("I asked an AI about dinner", false));
    }

    #[test]
    fn primary_and_secondary_without_pattern_rejected() {
        assert!(!filter().is_relevant("an AI discussed this video", false));
    }

    #[test]
    fn hyphenated_pattern_matches() {
        assert!(filter().is_relevant("AI-generated clip, rendered last night", false));
    }

    #[test]
    fn trusted_sources_skip_the_conjunction() {
        assert!(filter().is_relevant("sunset timelapse, no keywords at all", true));
    }

    #[test]
    fn exclusion_vetoes_even_trusted_sources() {
        assert!(!filter().is_relevant("AI generated video GIVEAWAY inside", true));
        assert!(!filter().is_relevant("AI generated video giveaway inside", false));
    }

    #[test]
    fn made_with_pattern_matches() {
        assert!(filter().is_relevant("short film made with Sora, amazing clip", false));
    }
}
