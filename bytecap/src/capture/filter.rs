//! Reserved-namespace filter for class names

/// Namespaces that belong to the platform runtime and are never captured
pub const DEFAULT_SKIP_PREFIXES: &[&str] = &["java", "android"];

/// Cheap predicate deciding which classes are not worth looking at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFilter {
    prefixes: Vec<String>,
}

impl CaptureFilter {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// True for a missing name or one starting with a reserved prefix
    ///
    /// Plain case-sensitive `starts_with`: `"javax.Foo"` and `"javafoo.Bar"`
    /// both match `"java"`.
    pub fn should_skip(&self, class_name: Option<&str>) -> bool {
        match class_name {
            None => true,
            Some(name) => self.prefixes.iter().any(|p| name.starts_with(p.as_str())),
        }
    }
}

impl Default for CaptureFilter {
    fn default() -> Self {
        Self::new(DEFAULT_SKIP_PREFIXES.iter().copied())
    }
}
