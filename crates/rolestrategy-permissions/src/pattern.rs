//! Anchored regular-expression matching for resource names

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;

/// Default number of compiled patterns kept by a [`PatternCache`]
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// A compiled role pattern.
///
/// Patterns always match the whole candidate name, so `A` matches the folder
/// `A` but neither `AB` nor `A/job`. A role without a pattern matches nothing.
#[derive(Clone)]
pub enum PatternMatcher {
    /// Matches no name at all
    Nothing,
    /// Full-string regular expression
    Anchored { source: String, regex: Arc<Regex> },
}

impl PatternMatcher {
    /// Check a resource name against this pattern
    pub fn matches(&self, name: &str) -> bool {
        match self {
            PatternMatcher::Nothing => false,
            PatternMatcher::Anchored { regex, .. } => regex.is_match(name),
        }
    }

    /// The pattern text as configured, `None` for the empty pattern
    pub fn source(&self) -> Option<&str> {
        match self {
            PatternMatcher::Nothing => None,
            PatternMatcher::Anchored { source, .. } => Some(source),
        }
    }

    /// Whether this is the empty pattern
    pub fn is_empty(&self) -> bool {
        matches!(self, PatternMatcher::Nothing)
    }
}

impl PartialEq for PatternMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.source() == other.source()
    }
}

impl Eq for PatternMatcher {}

impl fmt::Debug for PatternMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source() {
            Some(source) => write!(f, "PatternMatcher({:?})", source),
            None => write!(f, "PatternMatcher(<none>)"),
        }
    }
}

/// Bounded, thread-safe cache of compiled patterns keyed by pattern text.
///
/// Role maps share one cache so that the same pattern string, which recurs
/// across many roles and reloads, is compiled once.
pub struct PatternCache {
    compiled: Mutex<LruCache<String, Arc<Regex>>>,
}

impl PatternCache {
    /// Create a cache with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `capacity` compiled patterns
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            compiled: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Compile a pattern, reusing a cached compilation when available.
    ///
    /// `None` and blank patterns compile to [`PatternMatcher::Nothing`].
    /// Catch-all roles must spell out `.*`.
    pub fn compile(&self, pattern: Option<&str>) -> Result<PatternMatcher, regex::Error> {
        let source = match pattern {
            Some(p) if !p.trim().is_empty() => p,
            _ => return Ok(PatternMatcher::Nothing),
        };

        if let Some(regex) = self.compiled.lock().get(source) {
            tracing::trace!(pattern = %source, "pattern cache hit");
            return Ok(PatternMatcher::Anchored {
                source: source.to_string(),
                regex: Arc::clone(regex),
            });
        }

        tracing::trace!(pattern = %source, "pattern cache miss");
        // The bare pattern must be valid on its own, otherwise wrapping could
        // turn an unbalanced group into an unanchored alternation.
        Regex::new(source)?;
        let regex = Arc::new(Regex::new(&format!("^(?:{})$", source))?);

        self.compiled
            .lock()
            .put(source.to_string(), Arc::clone(&regex));

        Ok(PatternMatcher::Anchored {
            source: source.to_string(),
            regex,
        })
    }

    /// Number of compiled patterns currently cached
    pub fn len(&self) -> usize {
        self.compiled.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached compilation
    pub fn clear(&self) {
        self.compiled.lock().clear();
    }
}

impl Default for PatternCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PatternCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternCache")
            .field("len", &self.len())
            .finish()
    }
}
