//! Full-text query expressions.
//!
//! User text is parsed into a [`MatchExpression`] and rendered to FTS5 syntax
//! with every term quoted, so operator characters in the input never reach
//! the FTS5 parser unescaped. The rendered string is always bound as a
//! statement parameter.

use super::format::canonical_code_term;
use crate::config::MatchMode;

/// One required unit: a single word or an adjacent-word phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    pub words: Vec<String>,
    /// Match the final word as a prefix.
    pub prefix: bool,
}

impl Term {
    fn new(words: Vec<String>) -> Option<Self> {
        if words.is_empty() {
            None
        } else {
            Some(Self {
                words,
                prefix: false,
            })
        }
    }

    fn render(&self) -> String {
        let mut out = String::from("\"");
        out.push_str(&self.words.join(" ").replace('"', "\"\""));
        out.push('"');
        if self.prefix {
            out.push('*');
        }
        out
    }
}

/// Alternatives of ANDed terms, minus excluded terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchExpression {
    pub alternatives: Vec<Vec<Term>>,
    pub excluded: Vec<Term>,
}

enum Token {
    Word { text: String, negated: bool },
    Phrase { text: String, negated: bool },
}

impl MatchExpression {
    /// Parse `raw` for the given mode. `None` for substring mode or when
    /// nothing searchable is left.
    pub fn parse(raw: &str, mode: MatchMode, prefix_last_term: bool) -> Option<Self> {
        match mode {
            MatchMode::Substring => None,
            MatchMode::Prefix => Self::prefix(raw),
            MatchMode::WebSearch => Self::web_search(raw, prefix_last_term),
        }
    }

    /// Strict prefix syntax: every word required, the last one as a prefix.
    ///
    /// - "cholera vibrio" → `"cholera" AND "vibrio"*`
    /// - "A10.0" → `"a100"*`
    pub fn prefix(raw: &str) -> Option<Self> {
        let mut terms: Vec<Term> = raw
            .split_whitespace()
            .flat_map(normalize_words)
            .filter_map(|word| Term::new(vec![word]))
            .collect();

        let last = terms.last_mut()?;
        last.prefix = true;

        Some(Self {
            alternatives: vec![terms],
            excluded: Vec::new(),
        })
    }

    /// Web search syntax.
    ///
    /// - bare words are all required
    /// - `"quoted text"` matches as a phrase
    /// - `or` between terms separates alternatives
    /// - `-term` excludes
    ///
    /// With `prefix_last_term`, a bare word at the very end of the input is
    /// matched as a prefix.
    pub fn web_search(raw: &str, prefix_last_term: bool) -> Option<Self> {
        let tokens = tokenize(raw);

        let mut alternatives: Vec<Vec<Term>> = vec![Vec::new()];
        let mut excluded = Vec::new();
        let mut pending_or = false;
        let mut last_bare_word: Option<(usize, usize)> = None;

        for (i, token) in tokens.iter().enumerate() {
            let is_last = i + 1 == tokens.len();

            let (term, negated, bare) = match token {
                Token::Word { text, negated } => {
                    if !negated && text.eq_ignore_ascii_case("or") {
                        if alternatives.last().is_some_and(|group| !group.is_empty()) {
                            pending_or = true;
                        }
                        continue;
                    }
                    let words = normalize_words(text);
                    // "e-coli" becomes the phrase "e coli"
                    (Term::new(words), *negated, true)
                }
                Token::Phrase { text, negated } => {
                    let words = text.split_whitespace().flat_map(normalize_words).collect();
                    (Term::new(words), *negated, false)
                }
            };

            let Some(term) = term else {
                continue;
            };

            if negated {
                excluded.push(term);
                continue;
            }

            if pending_or {
                alternatives.push(Vec::new());
                pending_or = false;
            }
            let group_index = alternatives.len() - 1;
            let group = &mut alternatives[group_index];
            group.push(term);

            last_bare_word = (bare && is_last).then(|| (group_index, group.len() - 1));
        }

        alternatives.retain(|group| !group.is_empty());
        if alternatives.is_empty() {
            return None;
        }

        if prefix_last_term {
            if let Some((group, term)) = last_bare_word {
                alternatives[group][term].prefix = true;
            }
        }

        Some(Self {
            alternatives,
            excluded,
        })
    }

    /// Render to an FTS5 query string.
    pub fn render(&self) -> String {
        let group = |terms: &[Term]| -> String {
            terms.iter().map(Term::render).collect::<Vec<_>>().join(" AND ")
        };

        let positive = if self.alternatives.len() == 1 {
            group(&self.alternatives[0])
        } else {
            self.alternatives
                .iter()
                .map(|terms| {
                    if terms.len() > 1 {
                        format!("({})", group(terms))
                    } else {
                        group(terms)
                    }
                })
                .collect::<Vec<_>>()
                .join(" OR ")
        };

        if self.excluded.is_empty() {
            positive
        } else {
            let excluded: Vec<String> = self.excluded.iter().map(Term::render).collect();
            format!("({}) NOT {}", positive, excluded.join(" NOT "))
        }
    }
}

/// Split raw web search input into words and quoted phrases.
fn tokenize(raw: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut negated = false;
        if c == '-' {
            chars.next();
            match chars.peek() {
                Some(next) if !next.is_whitespace() => negated = true,
                _ => continue,
            }
        }

        if chars.peek() == Some(&'"') {
            chars.next();
            // Unterminated quotes run to the end of input
            let text: String = chars.by_ref().take_while(|&c| c != '"').collect();
            tokens.push(Token::Phrase { text, negated });
        } else {
            let mut text = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == '"' {
                    break;
                }
                text.push(c);
                chars.next();
            }
            tokens.push(Token::Word { text, negated });
        }
    }

    tokens
}

/// Lowercase alphanumeric words of a token, with dotted codes made canonical.
fn normalize_words(token: &str) -> Vec<String> {
    if let Some(code) = canonical_code_term(token) {
        return vec![code.to_lowercase()];
    }

    token
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Case-folded needle for a contains match against `casefold(column)`.
pub fn substring_needle(raw: &str) -> String {
    raw.to_lowercase()
}

/// Needle for the canonical form of `raw`, if it looks like a dotted code.
pub fn code_needle(raw: &str) -> Option<String> {
    canonical_code_term(raw.trim()).map(|code| code.to_lowercase())
}
