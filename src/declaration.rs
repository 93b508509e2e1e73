//! Declaration model consumed by the compiler.
//!
//! Symbol discovery lowers source annotations into these plain values; nothing here
//! is inspected reflectively afterwards. Builders are provided for every declaration
//! so that discovery (and tests) can describe a program tersely:
//!
//! ```rust
//! use staticwire::{ComponentDecl, Injectable, Manifest, Parameter};
//!
//! let manifest = Manifest::new("app::AppComponent")
//!     .component(ComponentDecl::new("app::AppComponent").scope("Singleton"))
//!     .declaration(
//!         Injectable::new("app::Greeter")
//!             .param(Parameter::new("name", "String"))
//!             .contributes_to("app::AppComponent"),
//!     );
//! assert_eq!(manifest.declarations.len(), 1);
//! ```

use alloc::{string::String, vec::Vec};

use crate::key::{ComponentId, DependencyKey, ModuleId, Qualifier, ScopeId, TypeName};

/// A type as reported by symbol discovery. Unresolved types are kept so the
/// compiler can report them instead of guessing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Resolved(TypeName),
    Unresolved(String),
}

impl TypeRef {
    #[inline]
    #[must_use]
    pub fn resolved(&self) -> Option<&TypeName> {
        match self {
            TypeRef::Resolved(type_name) => Some(type_name),
            TypeRef::Unresolved(_) => None,
        }
    }
}

impl From<&str> for TypeRef {
    #[inline]
    fn from(name: &str) -> Self {
        TypeRef::Resolved(TypeName::from(name))
    }
}

impl From<TypeName> for TypeRef {
    #[inline]
    fn from(type_name: TypeName) -> Self {
        TypeRef::Resolved(type_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamKind {
    /// Resolved from the graph.
    #[default]
    Regular,
    /// Supplied by the caller through the assisted factory.
    Assisted,
    /// Supplied by the platform at the injection site (e.g. a saved-state handle).
    RuntimeContext,
}

/// How a regular parameter asks for its dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Request {
    /// The instance itself. Creates a construction edge.
    #[default]
    Instance,
    /// A provider of the instance. Deferred, so it never participates in a cycle.
    Provider,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeRef,
    pub qualifier: Option<Qualifier>,
    pub kind: ParamKind,
    pub request: Request,
}

impl Parameter {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            qualifier: None,
            kind: ParamKind::Regular,
            request: Request::Instance,
        }
    }

    #[must_use]
    pub fn assisted(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            kind: ParamKind::Assisted,
            ..Self::new(name, ty)
        }
    }

    #[must_use]
    pub fn runtime_context(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            kind: ParamKind::RuntimeContext,
            ..Self::new(name, ty)
        }
    }

    #[must_use]
    pub fn qualified(mut self, qualifier: impl Into<Qualifier>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    #[must_use]
    pub fn as_provider(mut self) -> Self {
        self.request = Request::Provider;
        self
    }

    /// Key of the dependency this parameter refers to, if its type is resolved.
    #[must_use]
    pub fn key(&self) -> Option<DependencyKey> {
        self.ty
            .resolved()
            .map(|type_name| DependencyKey::new(type_name.clone(), self.qualifier.clone()))
    }
}

/// Nested factory contract of an injectable with assisted parameters:
/// `fn create(assisted...) -> Target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryContract {
    pub ty: TypeName,
    pub params: Vec<Parameter>,
    pub returns: TypeRef,
}

impl FactoryContract {
    #[must_use]
    pub fn new(ty: impl Into<TypeName>, returns: impl Into<TypeRef>) -> Self {
        Self {
            ty: ty.into(),
            params: Vec::new(),
            returns: returns.into(),
        }
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        self.params.push(Parameter::new(name, ty));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injectable {
    pub ty: TypeRef,
    pub qualifier: Option<Qualifier>,
    pub scope: Option<ScopeId>,
    pub params: Vec<Parameter>,
    /// Supertypes reported by discovery, used to validate `binds_to`.
    pub supertypes: Vec<TypeName>,
    pub binds_to: Vec<TypeRef>,
    pub factory: Option<FactoryContract>,
    /// Identity is managed by the injection site's own host (view-model style objects).
    pub runtime_scoped: bool,
    pub contributes_to: Vec<ComponentId>,
}

impl Injectable {
    #[must_use]
    pub fn new(ty: impl Into<TypeRef>) -> Self {
        Self {
            ty: ty.into(),
            qualifier: None,
            scope: None,
            params: Vec::new(),
            supertypes: Vec::new(),
            binds_to: Vec::new(),
            factory: None,
            runtime_scoped: false,
            contributes_to: Vec::new(),
        }
    }

    #[must_use]
    pub fn qualified(mut self, qualifier: impl Into<Qualifier>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: impl Into<ScopeId>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    #[must_use]
    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn supertype(mut self, supertype: impl Into<TypeName>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    /// Declares an interface this type is bound to. It must also be one of [`Self::supertype`].
    #[must_use]
    pub fn binds_to(mut self, interface: impl Into<TypeRef>) -> Self {
        self.binds_to.push(interface.into());
        self
    }

    #[must_use]
    pub fn factory(mut self, factory: FactoryContract) -> Self {
        self.factory = Some(factory);
        self
    }

    #[must_use]
    pub fn runtime_scoped(mut self) -> Self {
        self.runtime_scoped = true;
        self
    }

    #[must_use]
    pub fn contributes_to(mut self, component: impl Into<ComponentId>) -> Self {
        self.contributes_to.push(component.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvidesFn {
    pub module: ModuleId,
    pub name: String,
    pub returns: TypeRef,
    pub qualifier: Option<Qualifier>,
    pub scope: Option<ScopeId>,
    pub params: Vec<Parameter>,
    pub runtime_scoped: bool,
}

impl ProvidesFn {
    #[must_use]
    pub fn new(module: impl Into<ModuleId>, name: impl Into<String>, returns: impl Into<TypeRef>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            returns: returns.into(),
            qualifier: None,
            scope: None,
            params: Vec::new(),
            runtime_scoped: false,
        }
    }

    #[must_use]
    pub fn qualified(mut self, qualifier: impl Into<Qualifier>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: impl Into<ScopeId>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    #[must_use]
    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    #[must_use]
    pub fn runtime_scoped(mut self) -> Self {
        self.runtime_scoped = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindsFn {
    pub module: ModuleId,
    pub name: String,
    pub returns: TypeRef,
    pub qualifier: Option<Qualifier>,
    pub params: Vec<Parameter>,
    pub is_abstract: bool,
}

impl BindsFn {
    /// Abstract binding `fn name(implementation: Impl) -> Interface`.
    #[must_use]
    pub fn new(
        module: impl Into<ModuleId>,
        name: impl Into<String>,
        implementation: impl Into<TypeRef>,
        returns: impl Into<TypeRef>,
    ) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
            returns: returns.into(),
            qualifier: None,
            params: alloc::vec![Parameter::new("implementation", implementation)],
            is_abstract: true,
        }
    }

    #[must_use]
    pub fn qualified(mut self, qualifier: impl Into<Qualifier>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Replaces the parameter list, e.g. to describe a malformed binding.
    #[must_use]
    pub fn with_params(mut self, params: Vec<Parameter>) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn concrete(mut self) -> Self {
        self.is_abstract = false;
        self
    }
}

/// Closed set of graph-participating declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Injectable(Injectable),
    Provides(ProvidesFn),
    Binds(BindsFn),
}

impl Declaration {
    /// Human readable name used in diagnostics.
    #[must_use]
    pub fn display_name(&self) -> String {
        use alloc::format;

        match self {
            Declaration::Injectable(Injectable { ty, .. }) => match ty {
                TypeRef::Resolved(type_name) => type_name.as_str().into(),
                TypeRef::Unresolved(raw) => raw.clone(),
            },
            Declaration::Provides(ProvidesFn { module, name, .. }) | Declaration::Binds(BindsFn { module, name, .. }) => {
                format!("{module}::{name}")
            }
        }
    }

    /// Module a function-level declaration belongs to.
    #[inline]
    #[must_use]
    pub fn enclosing_module(&self) -> Option<&ModuleId> {
        match self {
            Declaration::Injectable(_) => None,
            Declaration::Provides(ProvidesFn { module, .. }) | Declaration::Binds(BindsFn { module, .. }) => Some(module),
        }
    }
}

impl From<Injectable> for Declaration {
    fn from(value: Injectable) -> Self {
        Declaration::Injectable(value)
    }
}

impl From<ProvidesFn> for Declaration {
    fn from(value: ProvidesFn) -> Self {
        Declaration::Provides(value)
    }
}

impl From<BindsFn> for Declaration {
    fn from(value: BindsFn) -> Self {
        Declaration::Binds(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComponentKind {
    #[default]
    Component,
    Subcomponent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDecl {
    pub id: ComponentId,
    pub scope: Option<ScopeId>,
    pub kind: ComponentKind,
    pub contributes_to: Vec<ComponentId>,
}

impl ComponentDecl {
    #[must_use]
    pub fn new(id: impl Into<ComponentId>) -> Self {
        Self {
            id: id.into(),
            scope: None,
            kind: ComponentKind::Component,
            contributes_to: Vec::new(),
        }
    }

    /// Subcomponent contributed to (and therefore a child of) `parent`.
    #[must_use]
    pub fn subcomponent(id: impl Into<ComponentId>, parent: impl Into<ComponentId>) -> Self {
        Self {
            kind: ComponentKind::Subcomponent,
            contributes_to: alloc::vec![parent.into()],
            ..Self::new(id)
        }
    }

    #[must_use]
    pub fn scope(mut self, scope: impl Into<ScopeId>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    #[must_use]
    pub fn contributes_to(mut self, component: impl Into<ComponentId>) -> Self {
        self.contributes_to.push(component.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn is_subcomponent(&self) -> bool {
        self.kind == ComponentKind::Subcomponent
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDecl {
    pub id: ModuleId,
    pub contributes_to: Vec<ComponentId>,
}

impl ModuleDecl {
    #[must_use]
    pub fn new(id: impl Into<ModuleId>) -> Self {
        Self {
            id: id.into(),
            contributes_to: Vec::new(),
        }
    }

    #[must_use]
    pub fn contributes_to(mut self, component: impl Into<ComponentId>) -> Self {
        self.contributes_to.push(component.into());
        self
    }
}

/// Everything symbol discovery found in one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub entry_point: ComponentId,
    pub components: Vec<ComponentDecl>,
    pub modules: Vec<ModuleDecl>,
    pub declarations: Vec<Declaration>,
}

impl Manifest {
    #[must_use]
    pub fn new(entry_point: impl Into<ComponentId>) -> Self {
        Self {
            entry_point: entry_point.into(),
            components: Vec::new(),
            modules: Vec::new(),
            declarations: Vec::new(),
        }
    }

    #[must_use]
    pub fn component(mut self, component: ComponentDecl) -> Self {
        self.components.push(component);
        self
    }

    #[must_use]
    pub fn module(mut self, module: ModuleDecl) -> Self {
        self.modules.push(module);
        self
    }

    #[must_use]
    pub fn declaration(mut self, declaration: impl Into<Declaration>) -> Self {
        self.declarations.push(declaration.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn get_component(&self, id: &ComponentId) -> Option<&ComponentDecl> {
        self.components.iter().find(|component| &component.id == id)
    }

    #[inline]
    #[must_use]
    pub fn get_module(&self, id: &ModuleId) -> Option<&ModuleDecl> {
        self.modules.iter().find(|module| &module.id == id)
    }
}
