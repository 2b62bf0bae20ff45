//! Inline paralinguistic tags such as `[cough]` or `[laugh]`.

use lazy_static::lazy_static;
use regex::Regex;

/// Tags the model can render as non-speech vocalizations.
pub const EVENT_TAGS: [&str; 9] = [
    "[clear throat]",
    "[sigh]",
    "[shush]",
    "[cough]",
    "[groan]",
    "[sniff]",
    "[gasp]",
    "[chuckle]",
    "[laugh]",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    Text(&'a str),
    Event(&'a str),
}

lazy_static! {
    static ref TAG_REGEX: Regex = Regex::new(r"\[[^\[\]]+\]").unwrap();
}

pub fn is_event_tag(tag: &str) -> bool {
    EVENT_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

/// Split text into plain runs and recognised event tags. Unknown bracketed
/// text stays part of the surrounding text.
pub fn tokenize(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut last_end = 0;

    for m in TAG_REGEX.find_iter(input) {
        if !is_event_tag(m.as_str()) {
            continue;
        }
        if m.start() > last_end {
            tokens.push(Token::Text(&input[last_end..m.start()]));
        }
        tokens.push(Token::Event(m.as_str()));
        last_end = m.end();
    }

    if last_end < input.len() {
        tokens.push(Token::Text(&input[last_end..]));
    }

    tokens
}

/// Replace event tags with a spoken pause for models that cannot vocalize them.
pub fn events_to_pauses(input: &str) -> String {
    tokenize(input)
        .into_iter()
        .map(|token| match token {
            Token::Text(s) => s,
            Token::Event(_) => "...",
        })
        .collect()
}
