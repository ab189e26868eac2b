//! Issues collected during a restore session.
//!
//! Type mismatches and unresolved references do not abort a restore: the
//! affected property keeps its previous value, siblings still restore, and
//! the issue is recorded here. The report is surfaced when the session ends.

use std::fmt;

use keepsake_tree::{ErrorKind, NodePath, RefKey};

/// One non-fatal problem found while restoring.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionIssue {
    /// The stream node's kind disagrees with the live property's kind.
    TypeMismatch {
        path: NodePath,
        expected: String,
        found: String,
    },
    /// A reference node never matched a live registration.
    UnresolvedReference { path: NodePath, key: RefKey },
}

impl SessionIssue {
    pub fn path(&self) -> &NodePath {
        match self {
            Self::TypeMismatch { path, .. } | Self::UnresolvedReference { path, .. } => path,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Self::UnresolvedReference { .. } => ErrorKind::UnresolvedReference,
        }
    }
}

impl fmt::Display for SessionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch {
                path,
                expected,
                found,
            } => write!(f, "{path}: type mismatch, expected {expected}, found {found}"),
            Self::UnresolvedReference { path, key } => {
                write!(f, "{path}: unresolved reference {key}")
            }
        }
    }
}

/// Ordered list of issues from one session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionReport {
    issues: Vec<SessionIssue>,
}

impl SessionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: SessionIssue) {
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[SessionIssue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn type_mismatches(&self) -> impl Iterator<Item = &SessionIssue> {
        self.issues
            .iter()
            .filter(|i| matches!(i, SessionIssue::TypeMismatch { .. }))
    }

    /// Keys of every unresolved reference, in report order.
    pub fn unresolved(&self) -> impl Iterator<Item = &RefKey> {
        self.issues.iter().filter_map(|i| match i {
            SessionIssue::UnresolvedReference { key, .. } => Some(key),
            _ => None,
        })
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.issues.len() == 1 { "issue" } else { "issues" };
        write!(f, "{} {noun}", self.issues.len())?;
        for issue in &self.issues {
            write!(f, "; {issue}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_filters_by_kind() {
        let mut report = SessionReport::new();
        report.push(SessionIssue::TypeMismatch {
            path: NodePath::root().child("Count"),
            expected: "u32".into(),
            found: "text".into(),
        });
        report.push(SessionIssue::UnresolvedReference {
            path: NodePath::root().child("peer"),
            key: RefKey::new("T", 2),
        });

        assert_eq!(report.len(), 2);
        assert_eq!(report.type_mismatches().count(), 1);
        assert_eq!(report.unresolved().collect::<Vec<_>>(), [&RefKey::new("T", 2)]);
        assert_eq!(report.issues()[1].kind(), ErrorKind::UnresolvedReference);
        assert_eq!(
            report.to_string(),
            "2 issues; /Count: type mismatch, expected u32, found text; /peer: unresolved reference (T, 2)"
        );
    }
}
