//! Shell-style wildcard matching for method names.
//!
//! `*` matches any run of characters (including none) and `?` matches exactly
//! one character. Everything else is literal, and a pattern must match the
//! whole name: `users.*` matches `users.get` but not `admin.users.get`.

use regex::Regex;

use crate::error::PatternError;

/// A single compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct Glob {
  pattern: String,
  regex: Regex,
}

impl Glob {
  /// Compile a wildcard pattern.
  pub fn new(pattern: impl Into<String>) -> Result<Self, PatternError> {
    let pattern = pattern.into();
    // `.` must also match `\n`, or `*` and `?` would stop at line breaks.
    let mut source = String::with_capacity(pattern.len() + 12);
    source.push_str("(?s)^");
    let mut literal = [0u8; 4];
    for c in pattern.chars() {
      match c {
        '*' => source.push_str(".*"),
        '?' => source.push('.'),
        _ => source.push_str(&regex::escape(c.encode_utf8(&mut literal))),
      }
    }
    source.push('$');

    let regex = Regex::new(&source).map_err(|source| PatternError {
      pattern: pattern.clone(),
      source,
    })?;
    Ok(Self { pattern, regex })
  }

  /// The pattern as written.
  pub fn as_str(&self) -> &str {
    &self.pattern
  }

  /// Whether the full name matches this pattern.
  pub fn is_match(&self, name: &str) -> bool {
    self.regex.is_match(name)
  }
}

/// A set of patterns; a name matches the set if it matches any member.
///
/// An empty set never matches. Whether "empty" means "no restriction" is a
/// policy decision made by the caller.
#[derive(Debug, Clone, Default)]
pub struct GlobSet {
  globs: Vec<Glob>,
}

impl GlobSet {
  /// Compile every pattern, failing on the first invalid one.
  pub fn new<I, S>(patterns: I) -> Result<Self, PatternError>
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let globs = patterns
      .into_iter()
      .map(Glob::new)
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self { globs })
  }

  pub fn is_empty(&self) -> bool {
    self.globs.is_empty()
  }

  pub fn len(&self) -> usize {
    self.globs.len()
  }

  /// Whether `name` matches any pattern in the set.
  pub fn matches(&self, name: &str) -> bool {
    self.globs.iter().any(|glob| glob.is_match(name))
  }

  /// Iterate the compiled patterns.
  pub fn iter(&self) -> impl Iterator<Item = &Glob> {
    self.globs.iter()
  }
}
