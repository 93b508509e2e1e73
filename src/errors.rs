mod container;
mod dependency_resolver;
mod graph;
mod instantiate;

pub use container::{BlueprintErrorKind, ContextErrorKind};
pub use dependency_resolver::ResolveErrorKind;
pub use graph::{CompileErrors, GraphErrorKind};
pub use instantiate::InstantiateErrorKind;

use core::fmt::{self, Display, Formatter};

/// Displays a slice with a separator, for diagnostics listing several items.
pub(crate) struct Joined<'a, T>(pub(crate) &'a [T], pub(crate) &'static str);

impl<T: Display> Display for Joined<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut iter = self.0.iter();
        if let Some(first) = iter.next() {
            write!(f, "{first}")?;
            for item in iter {
                write!(f, "{}{item}", self.1)?;
            }
        }
        Ok(())
    }
}
