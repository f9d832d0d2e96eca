use core::fmt;

/// A type-erased callable bound to a node or to a plan hook.
///
/// The call convention is fixed when the value is built and never changes:
/// - `Action` runs to completion and returns nothing,
/// - `Branch` returns the index of the single successor edge to follow,
/// - `Predicate` answers whether a plan should run another round.
///
/// Rebinding means replacing the value; the previous callable is dropped
/// first. Invoking with a convention other than the bound one is a
/// programmer error and panics.
pub enum Executable {
    /// Fire-and-forget work.
    Action(Box<dyn Fn() + Send + Sync>),
    /// Work that selects one outgoing edge by index.
    Branch(Box<dyn Fn() -> usize + Send + Sync>),
    /// Continuation test evaluated at the end of a round.
    Predicate(Box<dyn Fn() -> bool + Send + Sync>),
}

impl Executable {
    /// Binds a fire-and-forget callable.
    pub fn action(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self::Action(Box::new(f))
    }

    /// Binds an index-returning callable.
    pub fn branch(f: impl Fn() -> usize + Send + Sync + 'static) -> Self {
        Self::Branch(Box::new(f))
    }

    /// Binds a boolean-returning callable.
    pub fn predicate(f: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Box::new(f))
    }

    /// Runs an `Action`.
    ///
    /// # Panics
    /// If a different convention was bound.
    pub fn invoke_action(&self) {
        match self {
            Self::Action(f) => f(),
            other => other.convention_mismatch("action"),
        }
    }

    /// Runs a `Branch` and returns the selected edge index.
    ///
    /// # Panics
    /// If a different convention was bound.
    #[must_use]
    pub fn invoke_branch(&self) -> usize {
        match self {
            Self::Branch(f) => f(),
            other => other.convention_mismatch("branch"),
        }
    }

    /// Runs a `Predicate`.
    ///
    /// # Panics
    /// If a different convention was bound.
    #[must_use]
    pub fn invoke_predicate(&self) -> bool {
        match self {
            Self::Predicate(f) => f(),
            other => other.convention_mismatch("predicate"),
        }
    }

    fn convention(&self) -> &'static str {
        match self {
            Self::Action(_) => "action",
            Self::Branch(_) => "branch",
            Self::Predicate(_) => "predicate",
        }
    }

    #[track_caller]
    fn convention_mismatch(&self, expected: &str) -> ! {
        panic!(
            "Executable bound as {} was invoked as {expected}",
            self.convention()
        )
    }
}

impl fmt::Debug for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Executable::{}", self.convention())
    }
}

/// Marker for callables returning `()`, bound as action nodes.
#[derive(Debug)]
pub enum AsAction {}

/// Marker for callables returning `usize`, bound as branch nodes.
#[derive(Debug)]
pub enum AsBranch {}

/// Something that can be bound to a node.
///
/// Implemented for closures: `Fn()` becomes an action node, `Fn() -> usize`
/// becomes a branch node whose return value indexes the node's successor
/// table. The `Marker` parameter only exists to let both blanket impls
/// coexist and is always inferred.
pub trait Task<Marker>: Send + Sync + 'static {
    /// Erases the callable into an [`Executable`] with the matching
    /// convention.
    fn into_executable(self) -> Executable;
}

impl<F> Task<AsAction> for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn into_executable(self) -> Executable {
        Executable::action(self)
    }
}

impl<F> Task<AsBranch> for F
where
    F: Fn() -> usize + Send + Sync + 'static,
{
    fn into_executable(self) -> Executable {
        Executable::branch(self)
    }
}
