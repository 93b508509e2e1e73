#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub(crate) mod compiler;
pub(crate) mod config;
pub(crate) mod contribution;
pub(crate) mod declaration;
pub(crate) mod errors;
pub(crate) mod graph;
pub(crate) mod hierarchy;
pub(crate) mod key;
pub(crate) mod plan;
pub(crate) mod runtime;

pub use compiler::{compile, Compilation};
pub use config::{Config, ShadowingPolicy};
pub use contribution::{ContributionIndex, ContributionUnit};
pub use declaration::{
    BindsFn, ComponentDecl, ComponentKind, Declaration, FactoryContract, Injectable, Manifest, ModuleDecl, ParamKind,
    Parameter, ProvidesFn, Request, TypeRef,
};
pub use errors::{
    BlueprintErrorKind, CompileErrors, ContextErrorKind, GraphErrorKind, InstantiateErrorKind, ResolveErrorKind,
};
pub use graph::{DependencyNode, Graph};
pub use hierarchy::Hierarchy;
pub use key::{ComponentId, DependencyKey, ModuleId, Qualifier, ScopeId, TypeName};
pub use plan::{ComponentPlan, EmissionPlan, ProviderEntry, ProviderKind};
pub use runtime::{
    inject, inject_with, AssistedFactory, Blueprint, Component, Context, ContextSlot, Injector, Provider, Resolver,
    Runtime, ScopeContext, ScopedProvider, SharedProvider, UnscopedProvider,
};
