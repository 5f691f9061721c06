//! Source configuration: which communities to harvest and how far to trust
//! them. Trusted sources are topically pure (everything they post is
//! in-scope); general sources go through the full relevance conjunction.

pub struct SourceProfile {
    /// Subreddit name without the `r/` prefix.
    pub name: &'static str,
    pub trusted: bool,
    /// Extra search-by-term listing calls for this source.
    pub search_terms: &'static [&'static str],
}

/// Terms used for search listings on broad communities where plain
/// new/hot/top would be overwhelmingly off-topic.
const BROAD_SEARCH_TERMS: &[&str] = &["ai generated video", "sora", "text to video"];

pub fn default_sources() -> Vec<SourceProfile> {
    vec![
        SourceProfile { name: "aivideo", trusted: true, search_terms: &[] },
        SourceProfile { name: "SoraAi", trusted: true, search_terms: &[] },
        SourceProfile { name: "MediaSynthesis", trusted: true, search_terms: &[] },
        SourceProfile { name: "StableDiffusion", trusted: false, search_terms: BROAD_SEARCH_TERMS },
        SourceProfile { name: "singularity", trusted: false, search_terms: BROAD_SEARCH_TERMS },
        SourceProfile { name: "artificial", trusted: false, search_terms: BROAD_SEARCH_TERMS },
        SourceProfile { name: "videos", trusted: false, search_terms: BROAD_SEARCH_TERMS },
        SourceProfile { name: "Damnthatsinteresting", trusted: false, search_terms: BROAD_SEARCH_TERMS },
    ]
}
