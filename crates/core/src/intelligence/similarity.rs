//! Query normalization and fuzzy matching.

use strsim::normalized_levenshtein;

use crate::model::Book;

/// Lowercase, trim and collapse internal whitespace.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" ")
}

/// Levenshtein ratio of the normalized inputs, in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(&normalize(a), &normalize(b))
}

/// Best ratio of `query` against any window of `candidate` with the query's length.
///
/// Tolerates typos inside a longer title: "harry poter" scores high against
/// "harry potter and the chamber of secrets".
pub fn partial_similarity(query: &str, candidate: &str) -> f64 {
    let query = normalize(query);
    let candidate = normalize(candidate);
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    let chars: Vec<char> = candidate.chars().collect();
    let width = query.chars().count();
    if width >= chars.len() {
        return normalized_levenshtein(&query, &candidate);
    }

    chars
        .windows(width)
        .map(|window| normalized_levenshtein(&query, &window.iter().collect::<String>()))
        .fold(0.0, f64::max)
}

/// How well `book` matches `query`: title, authors, or both together.
pub fn book_score(query: &str, book: &Book) -> f64 {
    let authors = book.authors().join(" ");
    let combined = format!("{} {}", book.title(), authors);
    [book.title(), authors.as_str(), combined.as_str()]
        .into_iter()
        .filter(|field| !field.trim().is_empty())
        .map(|field| partial_similarity(query, field))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(title: &str, author: &str) -> Book {
        Book::new(title.to_lowercase(), title, "test").with_authors([author])
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Harry   Potter \t"), "harry potter");
        assert_eq!(normalize("DUNE"), "dune");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("Dune", "dune "), 1.0);
        assert!(similarity("dune", "xyzw") < 0.3);
        assert!(similarity("harry poter", "harry potter") > 0.9);
    }

    #[test]
    fn test_partial_similarity_finds_substring() {
        let score = partial_similarity("harry poter", "Harry Potter and the Chamber of Secrets");
        assert!(score > 0.8, "score was {score}");
        assert_eq!(partial_similarity("", "anything"), 0.0);
    }

    #[test]
    fn test_book_score_uses_authors() {
        let b = book("Foundation", "Isaac Asimov");
        assert!(book_score("asimov", &b) > 0.9);
        assert!(book_score("tolkien", &b) < 0.6);
    }
}
