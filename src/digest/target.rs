//! The digest that selects which layer leaves the export.

use std::fmt;

const SHA256_PREFIX: &str = "sha256:";

/// Hex encoded SHA-256 of the layer to extract.
///
/// Fixed when the pipeline is built. The runtime reports layer ids as
/// `sha256:<hex>`; the algorithm prefix is dropped and the hex lower-cased,
/// no other checks are made on the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetDigest(String);

impl TargetDigest {
    /// Creates a new [`TargetDigest`].
    ///
    /// ```rust
    /// use siphon::TargetDigest;
    ///
    /// let a = TargetDigest::new("sha256:ABCDEF");
    /// let b = TargetDigest::new("abcdef");
    /// assert_eq!(a, b);
    /// assert_eq!(a.as_str(), "abcdef");
    /// ```
    pub fn new(digest: impl AsRef<str>) -> Self {
        let digest = digest.as_ref().trim();
        let hex = digest.strip_prefix(SHA256_PREFIX).unwrap_or(digest);
        Self(hex.to_ascii_lowercase())
    }

    /// Select the topmost layer of an image's root filesystem.
    ///
    /// Returns `None` when the image has no layers.
    ///
    /// ```rust
    /// use siphon::TargetDigest;
    ///
    /// let layers = vec!["sha256:aaa".to_string(), "sha256:bbb".to_string()];
    /// assert_eq!(TargetDigest::last_layer(&layers), Some(TargetDigest::new("bbb")));
    /// assert_eq!(TargetDigest::last_layer::<&str>(&[]), None);
    /// ```
    pub fn last_layer<S: AsRef<str>>(layers: &[S]) -> Option<Self> {
        layers.last().map(Self::new)
    }

    /// Hex form without any algorithm prefix.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a finished hex digest.
    pub fn matches(&self, hex_digest: &str) -> bool {
        self.0.eq_ignore_ascii_case(hex_digest)
    }
}

impl fmt::Display for TargetDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", SHA256_PREFIX, self.0)
    }
}

impl From<&str> for TargetDigest {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TargetDigest {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
