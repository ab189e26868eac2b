//! Structural paths into a serialization tree.
//!
//! A path is a `/`-separated list of property names; `[i]` selects a list
//! element. The root is `/`. Examples: `/Count`, `/items[2]/peer`,
//! `/matrix/rows[0][1]`.

use std::fmt;
use std::str::FromStr;

use crate::error::{TreeError, TreeResult};

/// One step of a [`NodePath`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Child of an object node, by property name.
    Name(String),
    /// Element of a list node, by position.
    Index(usize),
}

/// Location of a node relative to the tree root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NodePath {
    segments: Vec<Segment>,
}

impl NodePath {
    /// The root path, `/`.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// A new path one property deeper.
    pub fn child(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.segments.push(Segment::Name(name.to_string()));
        next
    }

    /// A new path one list element deeper.
    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.segments.push(Segment::Index(index));
        next
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    pub fn pop(&mut self) -> Option<Segment> {
        self.segments.pop()
    }

    /// Parse a path string. A leading `/` is optional.
    pub fn parse(input: &str) -> TreeResult<Self> {
        let invalid = |reason: &str| TreeError::InvalidPath {
            path: input.to_string(),
            reason: reason.to_string(),
        };

        let mut path = Self::root();
        let trimmed = input.strip_prefix('/').unwrap_or(input);
        if trimmed.is_empty() {
            return Ok(path);
        }

        for part in trimmed.split('/') {
            if part.is_empty() {
                return Err(invalid("empty segment"));
            }
            let (name, mut rest) = match part.find('[') {
                Some(at) => (&part[..at], &part[at..]),
                None => (part, ""),
            };
            if !name.is_empty() {
                path.push(Segment::Name(name.to_string()));
            }
            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(|| invalid("unclosed '['"))?;
                if !rest.starts_with('[') {
                    return Err(invalid("unexpected text after ']'"));
                }
                let index = rest[1..close]
                    .parse::<usize>()
                    .map_err(|_| invalid("list index must be a non-negative integer"))?;
                path.push(Segment::Index(index));
                rest = &rest[close + 1..];
            }
        }
        Ok(path)
    }
}

impl FromStr for NodePath {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Name(name) => write!(f, "/{name}")?,
                Segment::Index(i) => write!(f, "[{i}]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::strategy::Strategy;

    use super::*;

    #[test]
    fn root_displays_as_slash() {
        assert_eq!(NodePath::root().to_string(), "/");
        assert!(NodePath::parse("/").unwrap().is_root());
        assert!(NodePath::parse("").unwrap().is_root());
    }

    #[test]
    fn parse_names_and_indices() {
        let path = NodePath::parse("/items[2]/peer").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Name("items".into()),
                Segment::Index(2),
                Segment::Name("peer".into()),
            ]
        );
        assert_eq!(path.to_string(), "/items[2]/peer");
    }

    #[test]
    fn parse_without_leading_slash() {
        let path: NodePath = "Count".parse().unwrap();
        assert_eq!(path, NodePath::root().child("Count"));
    }

    #[test]
    fn consecutive_indices() {
        let path = NodePath::parse("/grid[1][3]").unwrap();
        assert_eq!(path, NodePath::root().child("grid").index(1).index(3));
        assert_eq!(path.to_string(), "/grid[1][3]");
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(NodePath::parse("/a//b").is_err());
        assert!(NodePath::parse("/a[1").is_err());
        assert!(NodePath::parse("/a[x]").is_err());
        assert!(NodePath::parse("/a[1]b").is_err());
    }

    proptest::proptest! {
        #[test]
        fn display_then_parse_is_identity(
            steps in proptest::collection::vec(
                proptest::prop_oneof![
                    "[A-Za-z_][A-Za-z0-9_]{0,8}".prop_map(Segment::Name),
                    (0usize..1000).prop_map(Segment::Index),
                ],
                0..8,
            )
        ) {
            let mut path = NodePath::root();
            for step in steps {
                path.push(step);
            }
            let parsed = NodePath::parse(&path.to_string()).unwrap();
            proptest::prop_assert_eq!(parsed, path);
        }
    }
}
