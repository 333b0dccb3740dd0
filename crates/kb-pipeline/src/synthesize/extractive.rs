//! Local extractive summarization: pick the context sentences that share the
//! most words with the query.

use std::collections::HashSet;

/// Split text into sentences. Blank lines always end a sentence; otherwise a
/// run of `.`, `!` or `?` (plus closing quotes/brackets) followed by
/// whitespace or end of text does. Sentences keep their punctuation.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    for paragraph in text.split("\n\n") {
        let chars: Vec<(usize, char)> = paragraph.char_indices().collect();
        let mut start = 0;
        let mut i = 0;
        while i < chars.len() {
            if !matches!(chars[i].1, '.' | '!' | '?') {
                i += 1;
                continue;
            }
            let mut j = i + 1;
            while j < chars.len() && matches!(chars[j].1, '.' | '!' | '?' | '"' | '\'' | ')' | '\u{201d}' | '\u{2019}') {
                j += 1;
            }
            if j == chars.len() || chars[j].1.is_whitespace() {
                let end = chars.get(j).map_or(paragraph.len(), |(idx, _)| *idx);
                let sentence = paragraph[start..end].trim();
                if !sentence.is_empty() { sentences.push(sentence); }
                start = end;
            }
            i = j;
        }
        let tail = paragraph[start..].trim();
        if !tail.is_empty() { sentences.push(tail); }
    }
    sentences
}

fn word_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Up to `max_sentences` sentences with a positive query-word overlap, in
/// their original order. With no overlap at all, the first `max_sentences`
/// sentences are returned instead, so non-empty context always yields text.
pub fn summarize(query: &str, context: &str, max_sentences: usize) -> String {
    let sentences = split_sentences(context);
    let query_words = word_set(query);

    let mut scored: Vec<(usize, usize)> = sentences
        .iter()
        .enumerate()
        .map(|(idx, s)| (idx, word_set(s).intersection(&query_words).count()))
        .filter(|(_, score)| *score > 0)
        .collect();

    if scored.is_empty() {
        return sentences.into_iter().take(max_sentences).collect::<Vec<_>>().join(" ");
    }

    // Highest overlap first; earlier sentences win ties.
    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(max_sentences);
    scored.sort_by_key(|(idx, _)| *idx);
    scored.into_iter().map(|(idx, _)| sentences[idx]).collect::<Vec<_>>().join(" ")
}
