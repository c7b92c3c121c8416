use itertools::Itertools;
use memchr::memmem;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// How a rule's string patterns combine. `Any` fires per occurrence of any
/// sub-pattern; `All` fires once per region holding every sub-pattern.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    #[default]
    Any,
    All,
}

/// One string pattern as written in a ruleset file. Exactly one of
/// `pattern` (hex tokens, `??` wildcards) or `text` (literal bytes) must
/// be present.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StringPatternSpec {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RuleSpec {
    pub name: String,
    pub strings: Vec<StringPatternSpec>,
    #[serde(default)]
    pub condition: Condition,
}

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid pattern token '{token}'")]
    InvalidToken { token: String },

    #[error("empty pattern in rule '{rule}', string '{string}'")]
    EmptyPattern { rule: String, string: String },

    #[error("rule '{rule}', string '{string}' must set exactly one of pattern/text")]
    AmbiguousPattern { rule: String, string: String },

    #[error("rule '{rule}', string '{string}' has no literal bytes to anchor on")]
    NoLiteralBytes { rule: String, string: String },

    #[error("rule '{rule}' declares no strings")]
    NoStrings { rule: String },

    #[error("ruleset declares no rules")]
    NoRules,

    #[error("failed to read ruleset: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse ruleset: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parses hex-token pattern text ("48 8D ?? 0D") into bytes with
/// wildcards.
pub fn parse_pattern(pattern: &str) -> Result<Vec<Option<u8>>, SignatureError> {
    let mut bytes = Vec::new();
    for token in pattern.split_whitespace() {
        if token == "??" || token == "?" {
            bytes.push(None);
            continue;
        }
        let value =
            u8::from_str_radix(token, 16).map_err(|_| SignatureError::InvalidToken {
                token: token.to_string(),
            })?;
        bytes.push(Some(value));
    }
    Ok(bytes)
}

/// One compiled string pattern: the wildcard byte template plus a
/// precomputed substring finder over its longest literal run.
pub struct BytePattern {
    id: String,
    bytes: Vec<Option<u8>>,
    anchor_offset: usize,
    finder: memmem::Finder<'static>,
}

impl BytePattern {
    fn compile(rule: &str, spec: &StringPatternSpec) -> Result<Self, SignatureError> {
        let bytes = match (&spec.pattern, &spec.text) {
            (Some(pattern), None) => parse_pattern(pattern)?,
            (None, Some(text)) => text.bytes().map(Some).collect(),
            _ => {
                return Err(SignatureError::AmbiguousPattern {
                    rule: rule.to_string(),
                    string: spec.id.clone(),
                })
            }
        };
        if bytes.is_empty() {
            return Err(SignatureError::EmptyPattern {
                rule: rule.to_string(),
                string: spec.id.clone(),
            });
        }

        let (anchor_offset, literal) =
            longest_literal_run(&bytes).ok_or_else(|| SignatureError::NoLiteralBytes {
                rule: rule.to_string(),
                string: spec.id.clone(),
            })?;

        Ok(BytePattern {
            id: spec.id.clone(),
            bytes,
            anchor_offset,
            finder: memmem::Finder::new(&literal).into_owned(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn matches_at(&self, window: &[u8]) -> bool {
        self.bytes
            .iter()
            .zip(window)
            .all(|(pattern, byte)| pattern.map_or(true, |p| p == *byte))
    }

    /// All start offsets in `hay` where the pattern matches, ascending.
    pub fn find_in(&self, hay: &[u8]) -> Vec<usize> {
        let len = self.bytes.len();
        if hay.len() < len {
            return Vec::new();
        }

        // Occurrences may overlap, so the next search resumes one byte
        // past the previous anchor rather than past its end.
        let mut starts = Vec::new();
        let mut search_from = 0usize;
        while let Some(found) = self.finder.find(&hay[search_from..]) {
            let anchor_pos = search_from + found;
            search_from = anchor_pos + 1;

            let Some(start) = anchor_pos.checked_sub(self.anchor_offset) else {
                continue;
            };
            if start + len > hay.len() {
                continue;
            }
            if self.matches_at(&hay[start..start + len]) {
                starts.push(start);
            }
        }
        starts
    }
}

fn longest_literal_run(bytes: &[Option<u8>]) -> Option<(usize, Vec<u8>)> {
    bytes
        .iter()
        .enumerate()
        .chunk_by(|(_, byte)| byte.is_some())
        .into_iter()
        .filter(|(is_literal, _)| *is_literal)
        .map(|(_, group)| {
            let items: Vec<(usize, u8)> = group.map(|(i, byte)| (i, byte.unwrap())).collect();
            (items[0].0, items.into_iter().map(|(_, b)| b).collect())
        })
        .max_by_key(|(_, literal): &(usize, Vec<u8>)| literal.len())
}

pub struct CompiledRule {
    name: String,
    condition: Condition,
    strings: Vec<BytePattern>,
}

impl CompiledRule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn condition(&self) -> Condition {
        self.condition
    }

    pub fn strings(&self) -> &[BytePattern] {
        &self.strings
    }
}

/// A ruleset compiled once per request and shared read-only across every
/// per-process scan.
pub struct SignatureSet {
    rules: Vec<CompiledRule>,
    max_pattern_len: usize,
}

impl SignatureSet {
    pub fn compile(specs: Vec<RuleSpec>) -> Result<Self, SignatureError> {
        if specs.is_empty() {
            return Err(SignatureError::NoRules);
        }

        let mut rules = Vec::with_capacity(specs.len());
        let mut max_pattern_len = 0usize;
        for spec in &specs {
            if spec.strings.is_empty() {
                return Err(SignatureError::NoStrings {
                    rule: spec.name.clone(),
                });
            }
            let strings = spec
                .strings
                .iter()
                .map(|s| BytePattern::compile(&spec.name, s))
                .collect::<Result<Vec<_>, _>>()?;
            max_pattern_len = max_pattern_len.max(strings.iter().map(BytePattern::len).max().unwrap_or(0));
            rules.push(CompiledRule {
                name: spec.name.clone(),
                condition: spec.condition,
                strings,
            });
        }

        Ok(SignatureSet {
            rules,
            max_pattern_len,
        })
    }

    pub fn from_json(json: &str) -> Result<Self, SignatureError> {
        let specs: Vec<RuleSpec> = serde_json::from_str(json)?;
        Self::compile(specs)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SignatureError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Longest pattern across the set; scans carry this many bytes minus
    /// one between read chunks so straddling matches are still found.
    pub fn max_pattern_len(&self) -> usize {
        self.max_pattern_len
    }
}
