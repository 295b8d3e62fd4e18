//! Non-fatal annotations attached to a decompiled method.

use std::fmt;

/// A note rendered above a decompiled method.
///
/// Comments describe heuristics that fired or recognition that failed. They never abort the
/// method; the structured result is still produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DecompilerComment {
    /// Residual jumps remain in the structured output.
    UnableToStructure,
    /// A parameter slot is overwritten with a value of a different stack type.
    ParameterCorruption,
    /// A back jump from a try body to its handler was removed.
    TryBackEdgeRemoved,
    /// Synchronized catch-all handlers were removed.
    PrunedExceptions,
    /// Unpaired monitor instructions are rendered as comments.
    CommentedMonitors,
    /// A join merges values of different stack types.
    TypeClashes,
}

impl DecompilerComment {
    /// Text of the comment as rendered above the method.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::UnableToStructure => "Unable to fully structure code",
            Self::ParameterCorruption => "WARNING - Possible parameter corruption",
            Self::TryBackEdgeRemoved => {
                "WARNING - Removed back jump from a try to a catch block - possible behaviour change."
            }
            Self::PrunedExceptions => "Enabled unnecessary exception pruning",
            Self::CommentedMonitors => "Converted monitor instructions to comments",
            Self::TypeClashes => "Could not resolve type clashes",
        }
    }

    /// Returns `true` for comments warning about a possible behaviour change.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::ParameterCorruption | Self::TryBackEdgeRemoved)
    }
}

impl fmt::Display for DecompilerComment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// De-duplicating, insertion-ordered set of comments for one method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecompilerComments {
    comments: Vec<DecompilerComment>,
}

impl DecompilerComments {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `comment` unless it is already present. Returns `true` if it was added.
    pub fn add(&mut self, comment: DecompilerComment) -> bool {
        if self.comments.contains(&comment) {
            return false;
        }
        self.comments.push(comment);
        true
    }

    /// Returns `true` if `comment` is present.
    #[must_use]
    pub fn contains(&self, comment: DecompilerComment) -> bool {
        self.comments.contains(&comment)
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = DecompilerComment> + '_ {
        self.comments.iter().copied()
    }

    /// Number of comments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.comments.len()
    }

    /// Returns `true` if there are no comments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Consumes the set into a vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<DecompilerComment> {
        self.comments
    }
}

impl Extend<DecompilerComment> for DecompilerComments {
    fn extend<T: IntoIterator<Item = DecompilerComment>>(&mut self, iter: T) {
        for comment in iter {
            self.add(comment);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_are_deduplicated() {
        let mut comments = DecompilerComments::new();
        assert!(comments.add(DecompilerComment::TypeClashes));
        assert!(!comments.add(DecompilerComment::TypeClashes));
        comments.extend([
            DecompilerComment::CommentedMonitors,
            DecompilerComment::TypeClashes,
        ]);
        assert_eq!(comments.len(), 2);
        assert_eq!(
            comments.into_vec(),
            vec![
                DecompilerComment::TypeClashes,
                DecompilerComment::CommentedMonitors
            ]
        );
    }

    #[test]
    fn messages() {
        assert_eq!(
            DecompilerComment::UnableToStructure.to_string(),
            "Unable to fully structure code"
        );
        assert_eq!(
            DecompilerComment::TryBackEdgeRemoved.message(),
            "WARNING - Removed back jump from a try to a catch block - possible behaviour change."
        );
        assert!(DecompilerComment::ParameterCorruption.is_warning());
        assert!(!DecompilerComment::PrunedExceptions.is_warning());
    }
}
