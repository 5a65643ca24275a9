//! FTS5 MATCH expressions built from user query terms.
//!
//! Every word is wrapped in double quotes so FTS5 never parses user input as
//! query syntax (`OR`, `NEAR`, `-`, column filters).

/// Whitespace-separated words of the query with quotes stripped. Words with
/// no letters or digits are dropped since FTS5 would index nothing for them.
pub fn query_words<S: AsRef<str>>(terms: &[S]) -> Vec<String> {
    terms
        .iter()
        .flat_map(|t| t.as_ref().split_whitespace())
        .map(|word| word.replace('"', ""))
        .filter(|word| word.chars().any(char::is_alphanumeric))
        .collect()
}

pub fn quote(word: &str) -> String {
    format!("\"{word}\"")
}

/// Documents containing at least one word.
pub fn any_of(words: &[String]) -> String {
    words.iter().map(|w| quote(w)).collect::<Vec<_>>().join(" OR ")
}

/// Documents containing every word (FTS5 implicit AND).
pub fn all_of(words: &[String]) -> String {
    words.iter().map(|w| quote(w)).collect::<Vec<_>>().join(" ")
}

/// Documents containing the words contiguously and in order.
pub fn phrase(words: &[String]) -> String {
    quote(&words.join(" "))
}

/// Restrict an expression to the title column.
pub fn in_title(expr: &str) -> String {
    format!("title : ({expr})")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(terms: &[&str]) -> Vec<String> {
        query_words(terms)
    }

    #[test]
    fn words_split_on_whitespace_and_lose_quotes() {
        assert_eq!(words(&["daemon log", "\"quoted\""]), vec!["daemon", "log", "quoted"]);
        assert!(words(&["  --  ", "\"\""]).is_empty());
    }

    #[test]
    fn expressions_per_mode() {
        let w = words(&["daemon", "log"]);
        assert_eq!(any_of(&w), "\"daemon\" OR \"log\"");
        assert_eq!(all_of(&w), "\"daemon\" \"log\"");
        assert_eq!(phrase(&w), "\"daemon log\"");
        assert_eq!(in_title(&quote("daemon")), "title : (\"daemon\")");
    }

    #[test]
    fn query_syntax_is_neutralized() {
        let w = words(&["NOT", "title:x", "a*"]);
        assert_eq!(all_of(&w), "\"NOT\" \"title:x\" \"a*\"");
    }
}
