//! Keyword bucketing of a video into a [`VideoCategory`].

use ytintel_core::VideoCategory;

use crate::keywords::WORD_RE;

/// Checked in order; the first category with a matching word wins.
const RULES: &[(VideoCategory, &[&str])] = &[
    (
        VideoCategory::Education,
        &[
            "tutorial", "tutorials", "learn", "learning", "lesson", "lessons", "education",
            "educational", "course", "courses", "lecture", "explained",
        ],
    ),
    (
        VideoCategory::Technology,
        &[
            "tech", "technology", "programming", "software", "coding", "developer", "ai",
            "computer", "gadget", "gadgets",
        ],
    ),
    (
        VideoCategory::Gaming,
        &[
            "game", "games", "gaming", "gameplay", "gamer", "playthrough", "walkthrough",
            "speedrun", "esports",
        ],
    ),
    (
        VideoCategory::Music,
        &["music", "song", "songs", "album", "lyrics", "concert", "remix"],
    ),
    (
        VideoCategory::News,
        &["news", "breaking", "report", "headlines", "election", "politics"],
    ),
    (
        VideoCategory::Sports,
        &[
            "sport", "sports", "football", "basketball", "soccer", "tennis", "cricket", "nba",
            "nfl",
        ],
    ),
    (
        VideoCategory::Entertainment,
        &["comedy", "vlog", "prank", "movie", "trailer", "reaction", "sketch"],
    ),
];

/// Bucket a video by whole-word matches in its title and description.
///
/// Matching is on whole words, so "ai" does not fire on "again" and "game"
/// does not fire on "endgame".
#[must_use]
pub fn categorize(title: &str, description: &str) -> VideoCategory {
    let text = format!("{title} {description}").to_lowercase();
    let words: Vec<&str> = WORD_RE.find_iter(&text).map(|m| m.as_str()).collect();

    RULES
        .iter()
        .find(|(_, keywords)| words.iter().any(|w| keywords.contains(w)))
        .map_or(VideoCategory::Other, |(category, _)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_category_from_title_or_description() {
        assert_eq!(
            categorize("Rust programming in 10 minutes", ""),
            VideoCategory::Technology
        );
        assert_eq!(
            categorize("Saturday highlights", "Premier League football recap"),
            VideoCategory::Sports
        );
        assert_eq!(categorize("New album out now", ""), VideoCategory::Music);
    }

    #[test]
    fn earlier_rules_win() {
        assert_eq!(
            categorize("Learn game development", "A course for beginners"),
            VideoCategory::Education
        );
    }

    #[test]
    fn matches_whole_words_only() {
        assert_eq!(
            categorize("Baking again", "Endgame of my sourdough saga"),
            VideoCategory::Other
        );
    }

    #[test]
    fn empty_text_is_other() {
        assert_eq!(categorize("", ""), VideoCategory::Other);
    }
}
