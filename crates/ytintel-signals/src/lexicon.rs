//! General-purpose polarity/subjectivity lexicon scorer.

/// Word weights as `(word, polarity, subjectivity)`.
///
/// Polarity is in `[-1.0, 1.0]`, subjectivity in `[0.0, 1.0]`. Keys are
/// lowercase single words.
pub(crate) const LEXICON: &[(&str, f64, f64)] = &[
    // Positive
    ("amazing", 0.6, 0.9),
    ("awesome", 1.0, 1.0),
    ("beautiful", 0.85, 1.0),
    ("best", 1.0, 0.3),
    ("brilliant", 0.9, 1.0),
    ("clear", 0.1, 0.38),
    ("cool", 0.35, 0.65),
    ("easy", 0.43, 0.83),
    ("enjoy", 0.4, 0.5),
    ("enjoyed", 0.4, 0.5),
    ("excellent", 1.0, 1.0),
    ("fantastic", 0.4, 0.9),
    ("favorite", 0.5, 1.0),
    ("fun", 0.3, 0.2),
    ("funny", 0.25, 1.0),
    ("glad", 0.5, 1.0),
    ("good", 0.7, 0.6),
    ("great", 0.8, 0.75),
    ("happy", 0.8, 1.0),
    ("helpful", 0.5, 0.6),
    ("incredible", 0.9, 0.9),
    ("informative", 0.5, 0.5),
    ("interesting", 0.5, 0.5),
    ("love", 0.5, 0.6),
    ("loved", 0.7, 0.8),
    ("nice", 0.6, 1.0),
    ("perfect", 1.0, 1.0),
    ("recommend", 0.4, 0.5),
    ("thanks", 0.2, 0.2),
    ("useful", 0.3, 0.0),
    ("well", 0.2, 0.3),
    ("wonderful", 1.0, 1.0),
    ("worth", 0.3, 0.1),
    // Negative
    ("annoying", -0.8, 0.9),
    ("awful", -1.0, 1.0),
    ("bad", -0.7, 0.67),
    ("boring", -1.0, 1.0),
    ("broken", -0.4, 0.4),
    ("clickbait", -0.6, 0.8),
    ("confusing", -0.3, 0.6),
    ("disappointed", -0.75, 0.75),
    ("disappointing", -0.6, 0.7),
    ("dislike", -0.5, 0.7),
    ("fake", -0.5, 1.0),
    ("hate", -0.8, 0.9),
    ("horrible", -1.0, 1.0),
    ("misleading", -0.6, 0.7),
    ("poor", -0.4, 0.6),
    ("sad", -0.5, 1.0),
    ("scam", -0.8, 0.8),
    ("stupid", -0.8, 1.0),
    ("terrible", -1.0, 1.0),
    ("useless", -0.5, 0.2),
    ("waste", -0.2, 0.1),
    ("worse", -0.4, 0.6),
    ("worst", -1.0, 1.0),
    ("wrong", -0.5, 0.9),
];

/// Words that flip the polarity of a lexicon word within two tokens after them.
const NEGATORS: &[&str] = &[
    "not", "no", "never", "nothing", "nobody", "neither", "nor", "cannot", "without",
];

/// Words that amplify the polarity of the lexicon word directly after them.
const INTENSIFIERS: &[&str] = &[
    "very",
    "really",
    "extremely",
    "super",
    "so",
    "totally",
    "absolutely",
    "incredibly",
    "highly",
];

const NEGATION_FACTOR: f64 = -0.5;
const INTENSIFIER_FACTOR: f64 = 1.3;
const NEGATION_WINDOW: usize = 2;

/// Polarity and subjectivity of one piece of text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextScore {
    pub polarity: f64,
    pub subjectivity: f64,
    /// Number of lexicon words that contributed.
    pub matched: usize,
}

impl TextScore {
    const NEUTRAL: TextScore = TextScore {
        polarity: 0.0,
        subjectivity: 0.0,
        matched: 0,
    };
}

fn lookup(word: &str) -> Option<(f64, f64)> {
    LEXICON
        .iter()
        .find(|(w, _, _)| *w == word)
        .map(|&(_, p, s)| (p, s))
}

fn is_negator(word: &str) -> bool {
    NEGATORS.contains(&word) || word.ends_with("n't")
}

fn normalize(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphabetic() && c != '\'')
        .trim_matches('\'')
        .replace('’', "'")
        .to_lowercase()
}

/// Score a text using the built-in lexicon.
///
/// The score is the mean over matched words. A negator within the two
/// preceding tokens scales a word's polarity by `-0.5`; an intensifier
/// directly before it scales by `1.3`. Text with no lexicon words scores
/// `(0.0, 0.0)`.
#[must_use]
pub fn score_text(text: &str) -> TextScore {
    let tokens: Vec<String> = text
        .split_whitespace()
        .map(normalize)
        .filter(|t| !t.is_empty())
        .collect();

    let mut polarity_sum = 0.0_f64;
    let mut subjectivity_sum = 0.0_f64;
    let mut matched = 0usize;

    for (i, token) in tokens.iter().enumerate() {
        let Some((mut polarity, subjectivity)) = lookup(token) else {
            continue;
        };

        if i > 0 && INTENSIFIERS.contains(&tokens[i - 1].as_str()) {
            polarity *= INTENSIFIER_FACTOR;
        }

        let window_start = i.saturating_sub(NEGATION_WINDOW);
        if tokens[window_start..i].iter().any(|t| is_negator(t)) {
            polarity *= NEGATION_FACTOR;
        }

        polarity_sum += polarity.clamp(-1.0, 1.0);
        subjectivity_sum += subjectivity;
        matched += 1;
    }

    if matched == 0 {
        return TextScore::NEUTRAL;
    }

    #[allow(clippy::cast_precision_loss)]
    let denom = matched as f64;
    TextScore {
        polarity: (polarity_sum / denom).clamp(-1.0, 1.0),
        subjectivity: (subjectivity_sum / denom).clamp(0.0, 1.0),
        matched,
    }
}
