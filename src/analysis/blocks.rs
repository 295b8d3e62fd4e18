//! Block identifiers delimiting structured regions.

use std::fmt;

use strum::Display;

/// The kind of region a [`BlockIdentifier`] delimits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum BlockKind {
    /// Protected range of a try statement.
    #[strum(to_string = "try")]
    TryBlock,
    /// Body of a catch handler.
    #[strum(to_string = "catch")]
    Catch,
    /// Body of a while or for loop.
    #[strum(to_string = "loop")]
    Loop,
    /// Body of a do/while loop.
    #[strum(to_string = "doloop")]
    DoLoop,
    /// Body of a switch.
    #[strum(to_string = "switch")]
    Switch,
    /// Body of one switch case.
    #[strum(to_string = "case")]
    Case,
    /// Then-branch of an if.
    #[strum(to_string = "if")]
    Conditional,
    /// Else-branch of an if.
    #[strum(to_string = "else")]
    Else,
    /// Body of a synchronized block.
    #[strum(to_string = "sync")]
    Synchronized,
}

impl BlockKind {
    /// Returns `true` if `break` can leave a block of this kind without a label.
    #[must_use]
    pub fn is_breakable(&self) -> bool {
        matches!(self, Self::Loop | Self::DoLoop | Self::Switch)
    }

    /// Returns `true` for loop kinds.
    #[must_use]
    pub fn is_loop(&self) -> bool {
        matches!(self, Self::Loop | Self::DoLoop)
    }
}

/// An opaque token naming one structured region of a method.
///
/// Identifiers are minted by a per-method [`BlockFactory`] and compared by value. Ordering follows
/// the mint order, so identifiers created for outer regions sort before inner ones created later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockIdentifier {
    index: usize,
    kind: BlockKind,
}

impl BlockIdentifier {
    /// Dense index within the method.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// The region kind.
    #[must_use]
    pub const fn kind(&self) -> BlockKind {
        self.kind
    }

    /// Label used for labelled `break`/`continue`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("block{}", self.index)
    }
}

impl fmt::Display for BlockIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.index)
    }
}

/// Mints [`BlockIdentifier`]s for one method.
#[derive(Debug, Clone, Default)]
pub struct BlockFactory {
    next: usize,
}

impl BlockFactory {
    /// Creates a factory starting at index 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a fresh identifier of `kind`.
    pub fn mint(&mut self, kind: BlockKind) -> BlockIdentifier {
        let index = self.next;
        self.next += 1;
        BlockIdentifier { index, kind }
    }

    /// Number of identifiers minted so far.
    #[must_use]
    pub fn minted(&self) -> usize {
        self.next
    }
}
