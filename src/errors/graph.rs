use alloc::{string::String, vec::Vec};
use core::fmt::{self, Display, Formatter};

use super::Joined;
use crate::key::{ComponentId, DependencyKey, ModuleId, ScopeId, TypeName};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphErrorKind {
    #[error("`{declaration}` contributes to `{component}`, which is not a known component")]
    UnresolvedScopeReference { declaration: String, component: ComponentId },
    #[error("Could not find host component for `{declaration}`")]
    OrphanDeclaration { declaration: String },
    #[error("Entry point `{entry_point}` is not a declared component")]
    UnknownEntryPoint { entry_point: ComponentId },
    #[error("No root component found for entry point `{entry_point}`")]
    NoRoot { entry_point: ComponentId },
    #[error("Multiple root components reachable from the entry point: {}", Joined(roots, ", "))]
    MultipleRoots { roots: Vec<ComponentId> },
    #[error("Subcomponent `{component}` is contributed to several parents: {}", Joined(parents, ", "))]
    MultipleParents {
        component: ComponentId,
        parents: Vec<ComponentId>,
    },
    #[error("Components form a parent cycle and never reach the root: {}", Joined(components, ", "))]
    CyclicHierarchy { components: Vec<ComponentId> },
    #[error("Scope `{scope}` of `{component}` is already declared by its ancestor `{ancestor}`")]
    AmbiguousScope {
        scope: ScopeId,
        component: ComponentId,
        ancestor: ComponentId,
    },
    #[error("`{implementation}` is bound to `{interface}`, which is not one of its supertypes")]
    InvalidBindTarget { implementation: TypeName, interface: TypeName },
    #[error("Binds function `{declaration}` must have exactly one parameter, found {arity}")]
    InvalidBindsArity { declaration: String, arity: usize },
    #[error("Binds function `{declaration}` must be abstract")]
    NonAbstractBinds { declaration: String },
    #[error("`{declaration}` belongs to `{module}`, which is not a declared module")]
    UnknownModule { declaration: String, module: ModuleId },
    #[error("`{declaration}` has assisted parameters but no factory contract")]
    MissingAssistedFactory { declaration: TypeName },
    #[error("Provides function `{declaration}` can't take assisted parameters, only an injectable with a factory can")]
    AssistedProvides { declaration: String },
    #[error("Factory `{factory}` of `{declaration}` doesn't match its assisted parameters: {reason}")]
    AssistedFactoryMismatch {
        declaration: TypeName,
        factory: TypeName,
        reason: &'static str,
    },
    #[error("`{required_by}` depends on `{key}` directly, which has assisted parameters. Depend on its factory instead")]
    DirectAssistedDependency { key: DependencyKey, required_by: DependencyKey },
    #[error("`{declaration}` declares more than one runtime context parameter")]
    MultipleRuntimeContexts { declaration: String },
    #[error("Unresolved type `{raw}` in `{declaration}`")]
    UnresolvedType { declaration: String, raw: String },
    #[error("`{key}` is declared more than once in `{component}`")]
    DuplicateBinding { key: DependencyKey, component: ComponentId },
    #[error("`{key}` declared in `{component}` shadows the one hosted by its ancestor `{ancestor}`")]
    ShadowedBinding {
        key: DependencyKey,
        component: ComponentId,
        ancestor: ComponentId,
    },
    #[error("Unsatisfied dependency `{key}` required by `{required_by}` in `{component}`")]
    UnsatisfiedDependency {
        key: DependencyKey,
        required_by: DependencyKey,
        component: ComponentId,
    },
    #[error("{}", CyclePath(cycle))]
    CyclicDependency { cycle: Vec<DependencyKey> },
}

struct CyclePath<'a>(&'a [DependencyKey]);

impl Display for CyclePath<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Cyclic dependency detected: ")?;
        for key in self.0 {
            write!(f, "{key} -> ")?;
        }
        match self.0.first() {
            Some(first) => write!(f, "{first}"),
            None => Ok(()),
        }
    }
}

/// Every diagnostic of a failed compilation, in a deterministic order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileErrors(pub Vec<GraphErrorKind>);

impl Display for CompileErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Joined(&self.0, "\n"))
    }
}

impl core::error::Error for CompileErrors {}

impl CompileErrors {
    #[inline]
    #[must_use]
    pub fn errors(&self) -> &[GraphErrorKind] {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Cycles found by the cycle detector, each in discovery order.
    pub fn cycles(&self) -> impl Iterator<Item = &[DependencyKey]> {
        self.0.iter().filter_map(|err| match err {
            GraphErrorKind::CyclicDependency { cycle } => Some(cycle.as_slice()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloc::{string::ToString as _, vec};

    use super::{CompileErrors, GraphErrorKind};
    use crate::key::{ComponentId, DependencyKey};

    #[test]
    fn test_cycle_display() {
        let err = GraphErrorKind::CyclicDependency {
            cycle: vec![DependencyKey::unqualified("A"), DependencyKey::unqualified("B")],
        };
        assert_eq!(err.to_string(), "Cyclic dependency detected: A -> B -> A");
    }

    #[test]
    fn test_compile_errors_display() {
        let errors = CompileErrors(vec![
            GraphErrorKind::NoRoot {
                entry_point: ComponentId::from("App"),
            },
            GraphErrorKind::MultipleRoots {
                roots: vec![ComponentId::from("A"), ComponentId::from("B")],
            },
        ]);
        assert_eq!(
            errors.to_string(),
            "No root component found for entry point `App`\nMultiple root components reachable from the entry point: A, B"
        );
    }
}
