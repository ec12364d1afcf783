//! Keyword-based topic extraction (Tier 3 write path and query biasing).
//!
//! Matching works on word tokens, never raw substrings, so "art" cannot
//! fire inside "cartography". A keyword also matches its simple plural
//! ("movie" → "movies"). Multi-word keywords match contiguous tokens.

use recollect_core::text::tokenize;

/// Weight of a single-word keyword hit.
const WORD_WEIGHT: f32 = 1.0;
/// Weight of a multi-word phrase hit.
const PHRASE_WEIGHT: f32 = 2.0;

type Catalog = &'static [(&'static str, &'static [&'static str])];

/// The main topic catalog, in tie-break order.
pub const TOPIC_CATALOG: Catalog = &[
    (
        "work",
        &[
            "job", "work", "career", "company", "boss", "office", "colleague", "coworker",
            "project", "deadline", "meeting", "interview", "promotion", "salary", "profession",
        ],
    ),
    (
        "health",
        &[
            "health", "sick", "illness", "disease", "doctor", "hospital", "symptom", "medicine",
            "pain", "injury", "exercise", "diet", "sleep", "stress", "anxiety", "depression",
        ],
    ),
    (
        "family",
        &[
            "family", "parent", "father", "mother", "dad", "mom", "brother", "sister", "sibling",
            "child", "children", "kids", "son", "daughter", "grandparent", "grandmother",
            "grandfather", "aunt", "uncle", "cousin", "niece", "nephew",
        ],
    ),
    (
        "relationships",
        &[
            "relationship", "friend", "girlfriend", "boyfriend", "partner", "spouse", "husband",
            "wife", "date", "dating", "marriage", "wedding", "divorce", "love", "breakup",
        ],
    ),
    (
        "hobbies",
        &[
            "hobby", "interest", "game", "sport", "book", "movie", "music", "art", "travel",
            "cook", "cooking", "photography", "garden", "gardening", "fishing", "hiking",
            "camping", "painting", "drawing", "craft", "guitar",
        ],
    ),
    (
        "education",
        &[
            "school", "college", "university", "class", "course", "degree", "study", "student",
            "professor", "teacher", "exam", "test", "grade", "education", "learn", "learning",
            "homework", "assignment",
        ],
    ),
    (
        "technology",
        &[
            "technology", "computer", "phone", "laptop", "app", "software", "hardware",
            "internet", "website", "code", "programming", "data", "tech", "digital", "device",
            "gadget",
        ],
    ),
    (
        "finance",
        &[
            "money", "finance", "financial", "bank", "invest", "investment", "save", "savings",
            "spend", "spending", "budget", "debt", "loan", "mortgage", "rent", "tax", "taxes",
            "income", "expense", "expenses",
        ],
    ),
    (
        "travel",
        &[
            "travel", "trip", "vacation", "holiday", "flight", "hotel", "city", "country",
            "destination", "tour", "tourist", "passport", "journey", "visit", "beach",
            "mountain", "hiking", "car", "road trip",
        ],
    ),
    (
        "food",
        &[
            "food", "eat", "eating", "restaurant", "meal", "breakfast", "lunch", "dinner",
            "snack", "cook", "cooking", "recipe", "ingredient", "dish", "taste", "flavor",
            "cuisine", "diet", "pizza",
        ],
    ),
    (
        "housing",
        &[
            "house", "home", "apartment", "flat", "rent", "mortgage", "room", "living", "move",
            "moving", "roommate", "neighbor", "neighborhood", "furniture", "decorate",
            "decoration", "renovation",
        ],
    ),
    (
        "entertainment",
        &[
            "movie", "film", "tv", "television", "show", "series", "book", "novel", "read",
            "reading", "music", "song", "concert", "game", "gaming", "video game", "play",
            "stream", "streaming",
        ],
    ),
    (
        "personal",
        &[
            "feel", "feeling", "emotion", "happy", "sad", "angry", "excited", "worried",
            "stress", "stressed", "anxious", "depressed", "lonely", "tired", "exhausted",
            "overwhelmed", "confident", "proud", "guilty", "shame",
        ],
    ),
    (
        "future",
        &[
            "future", "plan", "planning", "goal", "dream", "aspiration", "hope", "change",
            "decision", "choice", "opportunity", "challenge", "obstacle", "problem", "solution",
        ],
    ),
];

/// Secondary catalog consulted only when a query matches nothing in
/// [`TOPIC_CATALOG`].
pub const FALLBACK_CATALOG: Catalog = &[
    (
        "family",
        &[
            "family", "parent", "father", "mother", "dad", "mom", "brother", "sister", "sibling",
            "child", "son", "daughter", "wife", "husband", "spouse", "partner",
        ],
    ),
    (
        "work",
        &[
            "job", "work", "career", "company", "boss", "office", "colleague", "business",
        ],
    ),
    (
        "health",
        &["health", "sick", "doctor", "hospital", "medicine", "pain", "sleep"],
    ),
    (
        "hobbies",
        &[
            "hobby", "interest", "game", "sport", "book", "movie", "music", "reading",
            "writing", "painting",
        ],
    ),
    (
        "education",
        &["school", "college", "university", "degree", "class", "course", "teacher", "exam"],
    ),
    (
        "location",
        &[
            "home", "house", "apartment", "city", "town", "state", "country", "address",
            "neighborhood", "street", "location", "place", "area", "region", "live",
        ],
    ),
];

/// A scored topic category.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicHit {
    pub topic: &'static str,
    pub score: f32,
}

/// Stateless extractor over the static catalogs.
pub struct TopicExtractor;

impl TopicExtractor {
    /// Topic names ranked by score, at most `top_n`.
    pub fn extract_topics(text: &str, top_n: usize) -> Vec<String> {
        Self::extract_scored(text)
            .into_iter()
            .take(top_n)
            .map(|h| h.topic.to_string())
            .collect()
    }

    /// Every matching topic with its score, best first. Ties keep catalog
    /// order.
    pub fn extract_scored(text: &str) -> Vec<TopicHit> {
        score_catalog(TOPIC_CATALOG, text)
    }

    /// Whether any keyword of `topic` occurs in `text`. Unknown topics are
    /// never matched.
    pub fn is_about_topic(text: &str, topic: &str) -> bool {
        let Some((_, keywords)) = TOPIC_CATALOG
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(topic.trim()))
        else {
            return false;
        };
        let tokens = tokenize(text);
        keywords.iter().any(|k| keyword_matches(k, &tokens))
    }

    /// Topics for a query: the main catalog first, the fallback catalog
    /// when the main one finds nothing.
    pub fn extract_topics_from_query(text: &str, top_n: usize) -> Vec<String> {
        let primary = Self::extract_topics(text, top_n);
        if !primary.is_empty() {
            return primary;
        }
        score_catalog(FALLBACK_CATALOG, text)
            .into_iter()
            .take(top_n)
            .map(|h| h.topic.to_string())
            .collect()
    }

    /// Names of every category in the main catalog.
    pub fn catalog_topics() -> impl Iterator<Item = &'static str> {
        TOPIC_CATALOG.iter().map(|(name, _)| *name)
    }
}

fn score_catalog(catalog: Catalog, text: &str) -> Vec<TopicHit> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<TopicHit> = catalog
        .iter()
        .filter_map(|(topic, keywords)| {
            let score: f32 = keywords
                .iter()
                .filter(|k| keyword_matches(k, &tokens))
                .map(|k| if k.contains(' ') { PHRASE_WEIGHT } else { WORD_WEIGHT })
                .sum();
            (score > 0.0).then_some(TopicHit { topic: *topic, score })
        })
        .collect();

    // Stable sort keeps catalog order among equal scores.
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits
}

fn keyword_matches(keyword: &str, tokens: &[String]) -> bool {
    let parts: Vec<&str> = keyword.split(' ').collect();
    if parts.len() == 1 {
        return tokens.iter().any(|t| token_matches(t, keyword));
    }
    tokens
        .windows(parts.len())
        .any(|w| w.iter().zip(&parts).all(|(t, p)| token_matches(t, p)))
}

fn token_matches(token: &str, keyword: &str) -> bool {
    token == keyword
        || token
            .strip_prefix(keyword)
            .is_some_and(|rest| rest == "s" || rest == "es")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_match_whole_words_only() {
        assert!(TopicExtractor::extract_topics("I love cartography", 5)
            .iter()
            .all(|t| t != "hobbies" && t != "travel"));
        assert!(!TopicExtractor::is_about_topic("cartography", "hobbies"));
        assert!(!TopicExtractor::is_about_topic("cartography", "travel"));
        assert!(TopicExtractor::is_about_topic("I bought a car", "travel"));
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(
            TopicExtractor::extract_topics("My BOSS moved the DEADLINE", 1),
            vec!["work"]
        );
    }

    #[test]
    fn distinct_hits_ranked() {
        let hits = TopicExtractor::extract_scored(
            "My job as a software engineer keeps me busy, the project deadline is close",
        );
        assert_eq!(hits[0].topic, "work");
        assert_eq!(hits[0].score, 3.0);
        assert!(hits.iter().any(|h| h.topic == "technology"));
    }

    #[test]
    fn repeated_keyword_counts_once() {
        let hits = TopicExtractor::extract_scored("job job job");
        assert_eq!(hits, vec![TopicHit { topic: "work", score: 1.0 }]);
    }

    #[test]
    fn ties_follow_catalog_order() {
        // "cooking" scores 1.0 in both hobbies and food; hobbies is declared first.
        let topics = TopicExtractor::extract_topics("cooking", 5);
        assert_eq!(topics, vec!["hobbies", "food"]);
    }

    #[test]
    fn phrases_outweigh_words() {
        let hits = TopicExtractor::extract_scored("we played a video game");
        let ent = hits.iter().find(|h| h.topic == "entertainment").unwrap();
        // "video game" (2.0) + "game" (1.0)
        assert_eq!(ent.score, 3.0);
        assert_eq!(hits[0].topic, "entertainment");
    }

    #[test]
    fn plurals_match() {
        assert!(TopicExtractor::is_about_topic("we watched two movies", "entertainment"));
    }

    #[test]
    fn top_n_and_empty() {
        assert!(TopicExtractor::extract_topics("", 3).is_empty());
        assert!(TopicExtractor::extract_topics("   ", 3).is_empty());
        let topics = TopicExtractor::extract_topics(
            "my boss, my doctor, my mom, my friend and my laptop",
            2,
        );
        assert_eq!(topics.len(), 2);
    }

    #[test]
    fn query_fallback_catalog() {
        // "town" is only known to the fallback catalog.
        assert_eq!(
            TopicExtractor::extract_topics_from_query("What do you remember about my town?", 3),
            vec!["location"]
        );
        assert_eq!(
            TopicExtractor::extract_topics_from_query("What do you know about my job?", 3),
            vec!["work"]
        );
        assert!(TopicExtractor::extract_topics_from_query("Tell me a joke.", 3).is_empty());
    }

    #[test]
    fn unknown_topic_is_never_matched() {
        assert!(!TopicExtractor::is_about_topic("my job", "astrology"));
    }
}
