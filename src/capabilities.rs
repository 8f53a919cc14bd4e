//! Capability set exchanged in `<hello>`.

use std::fmt;

/// `base:1.0`: end-of-message framing.
pub const BASE_1_0: &str = "urn:ietf:params:netconf:base:1.0";

/// `base:1.1`: chunked framing.
pub const BASE_1_1: &str = "urn:ietf:params:netconf:base:1.1";

/// Ordered, duplicate-free set of capability URIs.
///
/// # Examples
///
/// ```
/// use netconf_async::capabilities::{BASE_1_0, BASE_1_1, Capabilities};
///
/// let caps: Capabilities = [BASE_1_0, BASE_1_1, BASE_1_0].into_iter().collect();
/// assert_eq!(caps.len(), 2);
/// assert!(caps.supports_chunked_framing());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    uris: Vec<String>,
}

impl Capabilities {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Add `uri`, keeping first-seen order. Returns `false` if already present.
    pub fn insert(&mut self, uri: impl Into<String>) -> bool {
        let uri = uri.into();
        if self.contains(&uri) {
            return false;
        }
        self.uris.push(uri);
        true
    }

    /// Whether `uri` is present. Parameters after `?` are ignored.
    #[must_use]
    pub fn contains(&self, uri: &str) -> bool {
        let wanted = strip_parameters(uri);
        self.uris.iter().any(|have| strip_parameters(have) == wanted)
    }

    /// Whether both peers may switch to chunked framing.
    #[must_use]
    pub fn supports_chunked_framing(&self) -> bool { self.contains(BASE_1_1) }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> { self.uris.iter().map(String::as_str) }

    /// Number of capabilities.
    #[must_use]
    pub fn len(&self) -> usize { self.uris.len() }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.uris.is_empty() }
}

fn strip_parameters(uri: &str) -> &str { uri.split_once('?').map_or(uri, |(base, _)| base) }

impl<S: Into<String>> FromIterator<S> for Capabilities {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut caps = Self::new();
        for uri in iter {
            caps.insert(uri);
        }
        caps
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, uri) in self.uris.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            f.write_str(uri)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(&[BASE_1_0], false)]
    #[case(&[BASE_1_0, BASE_1_1], true)]
    #[case(&["urn:ietf:params:netconf:base:1.1?extra=1"], true)]
    #[case(&["urn:ietf:params:netconf:base:1.10"], false)]
    fn chunked_framing_needs_base_1_1(#[case] uris: &[&str], #[case] chunked: bool) {
        let caps: Capabilities = uris.iter().copied().collect();
        assert_eq!(caps.supports_chunked_framing(), chunked);
    }

    #[test]
    fn insertion_order_is_kept() {
        let mut caps = Capabilities::new();
        assert!(caps.insert(BASE_1_1));
        assert!(caps.insert(BASE_1_0));
        assert!(!caps.insert(BASE_1_1));
        assert_eq!(caps.iter().collect::<Vec<_>>(), vec![BASE_1_1, BASE_1_0]);
        assert_eq!(caps.to_string(), format!("{BASE_1_1}, {BASE_1_0}"));
    }
}
