//! Hierarchical endpoint addresses
//!
//! An address is an ordered sequence of non-empty segments. Its wire form is
//! the segments joined with [`ADDRESS_SEPARATOR`], independent of the host
//! operating system. Both the registering side and the calling side build
//! addresses independently, so the serialized form must agree bit-for-bit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Separator used in the serialized form of an address
pub const ADDRESS_SEPARATOR: char = '/';

/// Host path separators that may never appear inside a segment.
///
/// `\` is reserved alongside `/` so that a Windows-style joined path cannot
/// leak into the wire format as part of a single segment.
const RESERVED_SEPARATORS: [char; 2] = [ADDRESS_SEPARATOR, '\\'];

/// Error raised when address segments are malformed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidAddressError {
    /// No segments were supplied
    #[error("endpoint address must contain at least one segment")]
    Empty,

    /// A segment was the empty string
    #[error("segment {index} of endpoint address is empty")]
    EmptySegment { index: usize },

    /// A segment contained a reserved separator character
    #[error("segment {index} (`{segment}`) contains reserved separator `{separator}`")]
    ContainsSeparator {
        index: usize,
        segment: String,
        separator: char,
    },
}

/// Address of a registered procedure
///
/// Two addresses are equal iff their segment sequences are equal. Because
/// segments cannot contain the separator, this is the same as comparing the
/// serialized strings, which is what the derived impls do.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointAddress {
    path: String,
}

impl EndpointAddress {
    /// Builds an address from an ordered sequence of segments
    ///
    /// Fails with [`InvalidAddressError`] when the sequence is empty, when any
    /// segment is empty, or when a segment contains a reserved separator.
    pub fn new<I, S>(segments: I) -> Result<Self, InvalidAddressError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = String::new();
        for (index, segment) in segments.into_iter().enumerate() {
            let segment = segment.as_ref();
            validate_segment(index, segment)?;
            if index > 0 {
                path.push(ADDRESS_SEPARATOR);
            }
            path.push_str(segment);
        }
        if path.is_empty() {
            return Err(InvalidAddressError::Empty);
        }
        Ok(Self { path })
    }

    /// Parses the canonical `/`-separated form
    ///
    /// This is strict: leading, trailing or doubled separators produce an
    /// empty segment and are rejected.
    pub fn parse(path: &str) -> Result<Self, InvalidAddressError> {
        if path.is_empty() {
            return Err(InvalidAddressError::Empty);
        }
        Self::new(path.split(ADDRESS_SEPARATOR))
    }

    /// Normalizes a host-style path into an address
    ///
    /// Accepts either `/` or `\` between segments, as produced by joining
    /// paths on different operating systems, and ignores empty segments left
    /// by leading, trailing or repeated separators.
    pub fn normalize(path: &str) -> Result<Self, InvalidAddressError> {
        Self::new(
            path.split(|c: char| RESERVED_SEPARATORS.contains(&c))
                .filter(|segment| !segment.is_empty()),
        )
    }

    /// Returns a new address with one more trailing segment
    pub fn join(&self, segment: &str) -> Result<Self, InvalidAddressError> {
        validate_segment(self.depth(), segment)?;
        let mut path = self.path.clone();
        path.push(ADDRESS_SEPARATOR);
        path.push_str(segment);
        Ok(Self { path })
    }

    /// Returns `self` followed by every segment of `other`
    pub fn concat(&self, other: &EndpointAddress) -> Self {
        let mut path = String::with_capacity(self.path.len() + 1 + other.path.len());
        path.push_str(&self.path);
        path.push(ADDRESS_SEPARATOR);
        path.push_str(&other.path);
        Self { path }
    }

    /// Iterates over the segments in order
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split(ADDRESS_SEPARATOR)
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Last segment (the procedure name)
    pub fn leaf(&self) -> &str {
        match self.path.rfind(ADDRESS_SEPARATOR) {
            Some(index) => &self.path[index + 1..],
            None => self.path.as_str(),
        }
    }

    /// Everything but the last segment, if any
    pub fn namespace(&self) -> Option<EndpointAddress> {
        self.path.rfind(ADDRESS_SEPARATOR).map(|index| Self {
            path: self.path[..index].to_string(),
        })
    }

    /// Checks whether `prefix` is a segment-wise prefix of this address
    pub fn starts_with(&self, prefix: &EndpointAddress) -> bool {
        let mut own = self.segments();
        prefix.segments().all(|segment| own.next() == Some(segment))
    }

    /// Returns the serialized form
    pub fn as_str(&self) -> &str {
        &self.path
    }
}

/// Builds an address from segments.
///
/// Shorthand for [`EndpointAddress::new`].
pub fn build_address<I, S>(segments: I) -> Result<EndpointAddress, InvalidAddressError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    EndpointAddress::new(segments)
}

fn validate_segment(index: usize, segment: &str) -> Result<(), InvalidAddressError> {
    if segment.is_empty() {
        return Err(InvalidAddressError::EmptySegment { index });
    }
    if let Some(separator) = segment.chars().find(|c| RESERVED_SEPARATORS.contains(c)) {
        return Err(InvalidAddressError::ContainsSeparator {
            index,
            segment: segment.to_string(),
            separator,
        });
    }
    Ok(())
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl FromStr for EndpointAddress {
    type Err = InvalidAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EndpointAddress {
    type Error = InvalidAddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for EndpointAddress {
    type Error = InvalidAddressError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<EndpointAddress> for String {
    fn from(address: EndpointAddress) -> Self {
        address.path
    }
}

impl AsRef<str> for EndpointAddress {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_address_joins_segments() {
        let address = build_address(["vortex", "nexus", "getModInfo"]).unwrap();
        assert_eq!(address.as_str(), "vortex/nexus/getModInfo");
        assert_eq!(address.depth(), 3);
    }

    #[test]
    fn test_build_address_is_deterministic() {
        let segments = vec!["ns".to_string(), "double".to_string()];
        let a = EndpointAddress::new(&segments).unwrap();
        let b = EndpointAddress::new(&segments).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str().as_bytes(), b.as_str().as_bytes());
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let result = EndpointAddress::new(Vec::<&str>::new());
        assert_eq!(result, Err(InvalidAddressError::Empty));
    }

    #[test]
    fn test_empty_segment_rejected() {
        let result = build_address(["ns", "", "leaf"]);
        assert_eq!(result, Err(InvalidAddressError::EmptySegment { index: 1 }));
    }

    #[test]
    fn test_separator_in_segment_rejected() {
        let result = build_address(["ns", "a/b"]);
        assert_eq!(
            result,
            Err(InvalidAddressError::ContainsSeparator {
                index: 1,
                segment: "a/b".to_string(),
                separator: '/',
            })
        );
    }

    #[test]
    fn test_backslash_in_segment_rejected() {
        let result = build_address(["vortex\\nexus"]);
        assert!(matches!(
            result,
            Err(InvalidAddressError::ContainsSeparator { separator: '\\', .. })
        ));
    }

    #[test]
    fn test_parse_roundtrips_display() {
        let address = EndpointAddress::parse("math/sqrt").unwrap();
        assert_eq!(address.to_string(), "math/sqrt");
        assert_eq!(address.segments().collect::<Vec<_>>(), vec!["math", "sqrt"]);
    }

    #[test]
    fn test_parse_is_strict() {
        assert!(EndpointAddress::parse("").is_err());
        assert!(EndpointAddress::parse("/math").is_err());
        assert!(EndpointAddress::parse("math//sqrt").is_err());
        assert!(EndpointAddress::parse("math/").is_err());
    }

    #[test]
    fn test_normalize_accepts_host_separators() {
        let windows = EndpointAddress::normalize("vortex\\subnauticaSupport\\enableMod").unwrap();
        let posix = EndpointAddress::normalize("/vortex/subnauticaSupport//enableMod/").unwrap();
        assert_eq!(windows, posix);
        assert_eq!(windows.as_str(), "vortex/subnauticaSupport/enableMod");
    }

    #[test]
    fn test_normalize_of_separators_only_is_empty() {
        assert_eq!(
            EndpointAddress::normalize("\\/"),
            Err(InvalidAddressError::Empty)
        );
    }

    #[test]
    fn test_join_and_concat() {
        let ns = EndpointAddress::parse("vortex").unwrap();
        let leaf = ns.join("getMods").unwrap();
        assert_eq!(leaf.as_str(), "vortex/getMods");

        let path = EndpointAddress::parse("nexus/getGames").unwrap();
        assert_eq!(ns.concat(&path).as_str(), "vortex/nexus/getGames");

        assert_eq!(
            ns.join("a/b"),
            Err(InvalidAddressError::ContainsSeparator {
                index: 1,
                segment: "a/b".to_string(),
                separator: '/',
            })
        );
    }

    #[test]
    fn test_leaf_and_namespace() {
        let address = EndpointAddress::parse("vortex/nexus/trackMod").unwrap();
        assert_eq!(address.leaf(), "trackMod");
        assert_eq!(
            address.namespace(),
            Some(EndpointAddress::parse("vortex/nexus").unwrap())
        );

        let single = EndpointAddress::parse("ping").unwrap();
        assert_eq!(single.leaf(), "ping");
        assert_eq!(single.namespace(), None);
    }

    #[test]
    fn test_starts_with_is_segment_wise() {
        let address = EndpointAddress::parse("vortex/nexus/trackMod").unwrap();
        assert!(address.starts_with(&EndpointAddress::parse("vortex").unwrap()));
        assert!(address.starts_with(&EndpointAddress::parse("vortex/nexus").unwrap()));
        assert!(!address.starts_with(&EndpointAddress::parse("vort").unwrap()));
        assert!(!address.starts_with(&EndpointAddress::parse("vortex/nexus/trackMod/x").unwrap()));
    }

    #[test]
    fn test_serde_uses_string_form() {
        let address = EndpointAddress::parse("ns/double").unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"ns/double\"");

        let decoded: EndpointAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, address);

        let invalid: Result<EndpointAddress, _> = serde_json::from_str("\"ns//double\"");
        assert!(invalid.is_err());
    }
}
