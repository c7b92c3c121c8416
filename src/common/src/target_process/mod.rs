use serde::{Deserialize, Serialize};

/// Anchored, case-sensitive process-name pattern: a process matches when
/// its name starts with the configured prefix.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NamePattern {
    prefix: String,
}

impl NamePattern {
    pub fn new(prefix: impl Into<String>) -> Self {
        NamePattern {
            prefix: prefix.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.prefix
    }

    pub fn matches(&self, process_name: &str) -> bool {
        process_name.starts_with(&self.prefix)
    }
}

impl std::fmt::Display for NamePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "^{}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_is_anchored_at_the_start() {
        let pattern = NamePattern::new("memscan");
        assert!(pattern.matches("memscan"));
        assert!(pattern.matches("memscand"));
        assert!(pattern.matches("memscan-worker"));
        assert!(!pattern.matches("a-memscand"));
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let pattern = NamePattern::new("Memscan");
        assert!(pattern.matches("MemscanService"));
        assert!(!pattern.matches("memscanservice"));
    }

    #[test]
    fn test_empty_prefix_matches_everything() {
        let pattern = NamePattern::new("");
        assert!(pattern.matches("anything"));
    }
}
