//! Language collaborator. Only ever populates a catalog metadata field;
//! a None result never blocks ingestion.

pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Option<String>;
}

/// Script-range heuristic detector. Good enough to tag the dominant script
/// of a title; anything predominantly Latin is reported as English.
pub struct ScriptLanguageDetector;

impl LanguageDetector for ScriptLanguageDetector {
    fn detect(&self, text: &str) -> Option<String> {
        let mut latin = 0u32;
        let mut counts: [(u32, &str); 7] = [
            (0, "zh"),
            (0, "ja"),
            (0, "ko"),
            (0, "ru"),
            (0, "ar"),
            (0, "hi"),
            (0, "he"),
        ];

        for ch in text.chars().filter(|c| c.is_alphabetic()) {
            match ch {
                '\u{4E00}'..='\u{9FFF}' => counts[0].0 += 1,
                '\u{3040}'..='\u{30FF}' => counts[1].0 += 1,
                '\u{AC00}'..='\u{D7AF}' => counts[2].0 += 1,
                '\u{0400}'..='\u{04FF}' => counts[3].0 += 1,
                '\u{0600}'..='\u{06FF}' => counts[4].0 += 1,
                '\u{0900}'..='\u{097F}' => counts[5].0 += 1,
                '\u{0590}'..='\u{05FF}' => counts[6].0 += 1,
                c if c.is_ascii_alphabetic() => latin += 1,
                _ => {}
            }
        }

        let (best_count, best_code) = counts.into_iter().max_by_key(|(n, _)| *n)?;
        if best_count == 0 && latin == 0 {
            return None;
        }
        if best_count > latin {
            Some(best_code.to_string())
        } else {
            Some("en".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_dominant_script() {
        let d = ScriptLanguageDetector;
        assert_eq!(d.detect("AI generated sunset timelapse").as_deref(), Some("en"));
        assert_eq!(d.detect("искусственный интеллект видео").as_deref(), Some("ru"));
        assert_eq!(d.detect("人工知能が作った動画です").as_deref(), Some("ja"));
    }

    #[test]
    fn empty_or_symbolic_text_is_unknown() {
        let d = ScriptLanguageDetector;
        assert_eq!(d.detect(""), None);
        assert_eq!(d.detect("1234 !!!"), None);
    }
}
