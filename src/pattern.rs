use globset::{GlobBuilder, GlobMatcher};

/// Glob pattern applied to entry names. An empty pattern matches everything.
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    matcher: Option<GlobMatcher>,
}

impl NamePattern {
    /// Matching is case-insensitive; `*` never crosses a `/`.
    pub fn new(pattern: &str) -> Self {
        let source = pattern.trim().to_string();
        if source.is_empty() {
            return Self::any();
        }

        let matcher = match GlobBuilder::new(&source)
            .case_insensitive(true)
            .literal_separator(true)
            .build()
        {
            Ok(glob) => Some(glob.compile_matcher()),
            Err(e) => {
                // Fall back to a plain substring match for unparsable globs like "[abc"
                log::debug!("Invalid glob {:?}, matching literally: {}", source, e);
                None
            }
        };
        Self { source, matcher }
    }

    pub fn any() -> Self {
        Self {
            source: String::new(),
            matcher: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches_all(&self) -> bool {
        self.source.is_empty()
    }

    pub fn is_match(&self, name: &str) -> bool {
        if self.source.is_empty() {
            return true;
        }
        match &self.matcher {
            Some(matcher) => matcher.is_match(name),
            None => name.to_lowercase().contains(&self.source.to_lowercase()),
        }
    }
}

impl Default for NamePattern {
    fn default() -> Self {
        Self::any()
    }
}

impl PartialEq for NamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}
