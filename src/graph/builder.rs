use alloc::{string::String, vec::Vec};
use tracing::{debug, error, warn};

use super::{DependencyNode, Graph};
use crate::{
    config::{Config, ShadowingPolicy},
    contribution::{ContributionIndex, ContributionUnit},
    declaration::{BindsFn, Declaration, Injectable, ParamKind, Parameter, ProvidesFn, Request, TypeRef},
    errors::GraphErrorKind,
    hierarchy::Hierarchy,
    key::{ComponentId, DependencyKey, TypeName},
};

/// Parameters of a declaration split by how they are supplied.
#[derive(Default)]
struct Params {
    dependencies: Vec<DependencyKey>,
    deferred: Vec<DependencyKey>,
    assisted: Vec<(String, TypeRef)>,
    runtime_context: Option<(String, TypeName)>,
}

struct Builder<'a, 'i> {
    index: &'i ContributionIndex<'a>,
    config: &'i Config,
    graph: Graph,
    errors: &'i mut Vec<GraphErrorKind>,
}

/// Converts every contributed declaration into graph nodes hosted by its component.
///
/// Errors are accumulated per declaration, a failing declaration contributes no node
/// and the pass continues with the next one.
pub(crate) fn build(
    index: &ContributionIndex<'_>,
    hierarchy: Hierarchy,
    config: &Config,
    errors: &mut Vec<GraphErrorKind>,
) -> Graph {
    let mut builder = Builder {
        index,
        config,
        graph: Graph::new(hierarchy),
        errors,
    };

    let components: Vec<_> = builder.graph.hierarchy().components().cloned().collect();
    for component in &components {
        for &unit in index.contributions(component) {
            if index.host_of(unit) != Some(component) {
                continue;
            }
            match unit {
                ContributionUnit::Injectable(position) => builder.declaration(position, component),
                ContributionUnit::Module(module) => {
                    for &position in index.members(module) {
                        builder.declaration(position, component);
                    }
                }
                ContributionUnit::Component(_) => {}
            }
        }
    }

    builder.report_orphans();
    builder.check_shadowing();
    builder.check_dependencies();

    debug!(nodes = builder.graph.len(), "Graph built");
    builder.graph
}

impl Builder<'_, '_> {
    fn push(&mut self, err: GraphErrorKind) {
        error!("{}", err);
        self.errors.push(err);
    }

    fn declaration(&mut self, position: usize, component: &ComponentId) {
        let manifest = self.index.manifest();
        match &manifest.declarations[position] {
            Declaration::Injectable(injectable) => self.injectable(position, injectable, component),
            Declaration::Provides(provides) => self.provides(position, provides, component),
            Declaration::Binds(binds) => self.binds(position, binds, component),
        }
    }

    fn injectable(&mut self, position: usize, injectable: &Injectable, component: &ComponentId) {
        let index = self.index;
        let name = || index.manifest().declarations[position].display_name();

        let Some(ty) = self.resolved(&injectable.ty, name) else {
            return;
        };
        let Some(params) = self.params(&injectable.params, name) else {
            return;
        };

        let mut node = DependencyNode::new(
            DependencyKey::new(ty.clone(), injectable.qualifier.clone()),
            position,
            component.clone(),
        );
        node.scope = injectable
            .scope
            .clone()
            .or_else(|| self.graph.hierarchy().scope(component).cloned());
        node.is_runtime_scoped = injectable.runtime_scoped || params.runtime_context.is_some();

        for interface in &injectable.binds_to {
            let Some(interface) = self.resolved(interface, name) else {
                continue;
            };
            if !injectable.supertypes.contains(interface) {
                self.push(GraphErrorKind::InvalidBindTarget {
                    implementation: ty.clone(),
                    interface: interface.clone(),
                });
                continue;
            }
            node.binding_targets
                .push(DependencyKey::new(interface.clone(), injectable.qualifier.clone()));
        }

        let factory = if params.assisted.is_empty() {
            None
        } else {
            self.factory(position, injectable, ty, &params, component)
        };

        node.dependencies = params.dependencies;
        node.deferred = params.deferred;
        node.assisted_parameters = params.assisted;
        node.runtime_context = params.runtime_context;

        let aliases: Vec<_> = node
            .binding_targets
            .iter()
            .map(|interface| alias(interface.clone(), &node))
            .collect();

        debug!(
            key = %node.key,
            component = %component,
            aliases = aliases.len(),
            assisted = node.assisted_parameters.len(),
            "Injectable classified"
        );
        self.insert(node);
        if let Some(factory) = factory {
            self.insert(factory);
        }
        for alias in aliases {
            self.insert(alias);
        }
    }

    /// Synthesizes the factory node of an injectable with assisted parameters.
    fn factory(
        &mut self,
        position: usize,
        injectable: &Injectable,
        ty: &TypeName,
        params: &Params,
        component: &ComponentId,
    ) -> Option<DependencyNode> {
        let Some(contract) = &injectable.factory else {
            self.push(GraphErrorKind::MissingAssistedFactory { declaration: ty.clone() });
            return None;
        };

        let mismatch = |reason: &'static str| GraphErrorKind::AssistedFactoryMismatch {
            declaration: ty.clone(),
            factory: contract.ty.clone(),
            reason,
        };
        if contract.params.len() != params.assisted.len()
            || contract
                .params
                .iter()
                .zip(&params.assisted)
                .any(|(param, (_, assisted))| &param.ty != assisted)
        {
            self.push(mismatch("parameter types differ from the assisted parameters"));
            return None;
        }
        if contract.returns.resolved() != Some(ty) {
            self.push(mismatch("it doesn't return the assisted type"));
            return None;
        }

        let mut factory = DependencyNode::new(DependencyKey::unqualified(contract.ty.clone()), position, component.clone());
        factory.dependencies = params.dependencies.clone();
        factory.deferred = params.deferred.clone();
        factory.runtime_context = params.runtime_context.clone();
        factory.is_factory = true;
        Some(factory)
    }

    fn provides(&mut self, position: usize, provides: &ProvidesFn, component: &ComponentId) {
        let index = self.index;
        let name = || index.manifest().declarations[position].display_name();

        let Some(ty) = self.resolved(&provides.returns, name) else {
            return;
        };
        let Some(params) = self.params(&provides.params, name) else {
            return;
        };
        if !params.assisted.is_empty() {
            self.push(GraphErrorKind::AssistedProvides { declaration: name() });
            return;
        }

        let mut node = DependencyNode::new(
            DependencyKey::new(ty.clone(), provides.qualifier.clone()),
            position,
            component.clone(),
        );
        node.scope = provides
            .scope
            .clone()
            .or_else(|| self.graph.hierarchy().scope(component).cloned());
        node.dependencies = params.dependencies;
        node.deferred = params.deferred;
        node.is_runtime_scoped = provides.runtime_scoped || params.runtime_context.is_some();
        node.runtime_context = params.runtime_context;

        debug!(key = %node.key, component = %component, "Provides function classified");
        self.insert(node);
    }

    fn binds(&mut self, position: usize, binds: &BindsFn, component: &ComponentId) {
        let index = self.index;
        let name = || index.manifest().declarations[position].display_name();

        if !binds.is_abstract {
            self.push(GraphErrorKind::NonAbstractBinds { declaration: name() });
            return;
        }
        let [implementation] = binds.params.as_slice() else {
            self.push(GraphErrorKind::InvalidBindsArity {
                declaration: name(),
                arity: binds.params.len(),
            });
            return;
        };
        let Some(interface) = self.resolved(&binds.returns, name) else {
            return;
        };
        let Some(implementation) = self.resolved(&implementation.ty, name).map(|ty| {
            DependencyKey::new(ty.clone(), implementation.qualifier.clone())
        }) else {
            return;
        };

        let mut node = DependencyNode::new(
            DependencyKey::new(interface.clone(), binds.qualifier.clone()),
            position,
            component.clone(),
        );
        node.scope = self.graph.hierarchy().scope(component).cloned();
        node.dependencies.push(implementation);
        node.is_alias = true;

        debug!(key = %node.key, component = %component, "Binds function classified");
        self.insert(node);
    }

    fn resolved<'t>(&mut self, ty: &'t TypeRef, name: impl Fn() -> String) -> Option<&'t TypeName> {
        match ty {
            TypeRef::Resolved(type_name) => Some(type_name),
            TypeRef::Unresolved(raw) => {
                self.push(GraphErrorKind::UnresolvedType {
                    declaration: name(),
                    raw: raw.clone(),
                });
                None
            }
        }
    }

    fn params(&mut self, params: &[Parameter], name: impl Fn() -> String) -> Option<Params> {
        let mut split = Params::default();
        let mut failed = false;

        for param in params {
            let Some(ty) = self.resolved(&param.ty, &name) else {
                failed = true;
                continue;
            };
            match param.kind {
                ParamKind::Regular => {
                    let key = DependencyKey::new(ty.clone(), param.qualifier.clone());
                    match param.request {
                        Request::Instance => split.dependencies.push(key),
                        Request::Provider => split.deferred.push(key),
                    }
                }
                ParamKind::Assisted => split.assisted.push((param.name.clone(), param.ty.clone())),
                ParamKind::RuntimeContext => {
                    if split.runtime_context.is_some() {
                        self.push(GraphErrorKind::MultipleRuntimeContexts { declaration: name() });
                        failed = true;
                        continue;
                    }
                    split.runtime_context = Some((param.name.clone(), ty.clone()));
                }
            }
        }

        if failed {
            None
        } else {
            Some(split)
        }
    }

    fn insert(&mut self, node: DependencyNode) {
        if let Err(node) = self.graph.insert(node) {
            self.push(GraphErrorKind::DuplicateBinding {
                key: node.key,
                component: node.host_component,
            });
        }
    }

    /// Declarations that never reached the graph because nothing hosts them.
    ///
    /// Declarations naming unknown components or modules were already reported while indexing.
    fn report_orphans(&mut self) {
        let manifest = self.index.manifest();
        for (position, declaration) in manifest.declarations.iter().enumerate() {
            if self.index.find_host(position).is_some() {
                continue;
            }
            let declares_targets = match declaration {
                Declaration::Injectable(injectable) => !injectable.contributes_to.is_empty(),
                Declaration::Provides(_) | Declaration::Binds(_) => declaration
                    .enclosing_module()
                    .and_then(|module| manifest.get_module(module))
                    .map_or(true, |module| !module.contributes_to.is_empty()),
            };
            if !declares_targets {
                self.push(GraphErrorKind::OrphanDeclaration {
                    declaration: declaration.display_name(),
                });
            }
        }
    }

    fn check_shadowing(&mut self) {
        if self.config.shadowing == ShadowingPolicy::Allow {
            return;
        }

        let mut shadowed = Vec::new();
        for component in self.graph.hierarchy().components() {
            for node in self.graph.nodes(component) {
                let ancestor = self
                    .graph
                    .hierarchy()
                    .ancestors(component)
                    .find(|ancestor| self.graph.local(ancestor, &node.key).is_some());
                if let Some(ancestor) = ancestor {
                    shadowed.push(GraphErrorKind::ShadowedBinding {
                        key: node.key.clone(),
                        component: component.clone(),
                        ancestor: ancestor.clone(),
                    });
                }
            }
        }

        for err in shadowed {
            match self.config.shadowing {
                ShadowingPolicy::Deny => self.push(err),
                ShadowingPolicy::Warn | ShadowingPolicy::Allow => warn!("{}", err),
            }
        }
    }

    /// Every dependency must be visible from the node's host, and never be a type that
    /// can only be built through its assisted factory.
    fn check_dependencies(&mut self) {
        let mut found = Vec::new();
        for node in self.graph.iter() {
            for dependency in node.dependencies.iter().chain(&node.deferred) {
                match self.graph.resolve(&node.host_component, dependency) {
                    Some(target) if target.is_assisted() => found.push(GraphErrorKind::DirectAssistedDependency {
                        key: dependency.clone(),
                        required_by: node.key.clone(),
                    }),
                    Some(_) => {}
                    None if self.config.validate_dependencies => found.push(GraphErrorKind::UnsatisfiedDependency {
                        key: dependency.clone(),
                        required_by: node.key.clone(),
                        component: node.host_component.clone(),
                    }),
                    None => {}
                }
            }
        }

        for err in found {
            self.push(err);
        }
    }
}

/// Alias node forwarding `interface` to `target`'s provider.
fn alias(interface: DependencyKey, target: &DependencyNode) -> DependencyNode {
    let mut node = DependencyNode::new(interface, target.source, target.host_component.clone());
    node.scope = target.scope.clone();
    node.dependencies.push(target.key.clone());
    node.is_alias = true;
    node
}

#[cfg(test)]
mod tests {
    use alloc::{string::String, vec::Vec};
    use tracing_test::traced_test;

    use crate::{
        config::{Config, ShadowingPolicy},
        contribution::ContributionIndex,
        declaration::{
            BindsFn, ComponentDecl, FactoryContract, Injectable, Manifest, ModuleDecl, Parameter, ProvidesFn, TypeRef,
        },
        errors::GraphErrorKind,
        graph::Graph,
        hierarchy::Hierarchy,
        key::{ComponentId, DependencyKey, TypeName},
    };

    fn base() -> Manifest {
        Manifest::new("App")
            .component(ComponentDecl::new("App").scope("Singleton"))
            .component(ComponentDecl::subcomponent("User", "App").scope("UserScope"))
            .module(ModuleDecl::new("AppModule").contributes_to("App"))
    }

    fn build(manifest: &Manifest, config: &Config) -> (Graph, Vec<GraphErrorKind>) {
        let mut errors = Vec::new();
        let index = ContributionIndex::index(manifest, &mut errors);
        let hierarchy = Hierarchy::resolve(&index, config, &mut errors).unwrap();
        let graph = super::build(&index, hierarchy, config, &mut errors);
        (graph, errors)
    }

    #[test]
    #[traced_test]
    fn test_scope_inheritance() {
        let manifest = base()
            .declaration(Injectable::new("Api").contributes_to("App"))
            .declaration(Injectable::new("Session").scope("UserScope").contributes_to("App"))
            .declaration(ProvidesFn::new("AppModule", "provide_db", "Db"));
        let (graph, errors) = build(&manifest, &Config::default());
        assert!(errors.is_empty(), "{errors:?}");

        let app = ComponentId::from("App");
        let api = graph.local(&app, &DependencyKey::unqualified("Api")).unwrap();
        assert_eq!(api.scope.as_ref().map(|scope| scope.as_str()), Some("Singleton"));
        assert!(graph.is_scoped(api));

        let session = graph.local(&app, &DependencyKey::unqualified("Session")).unwrap();
        assert_eq!(session.scope.as_ref().map(|scope| scope.as_str()), Some("UserScope"));
        assert!(!graph.is_scoped(session));

        assert!(graph.local(&app, &DependencyKey::unqualified("Db")).is_some());
    }

    #[test]
    #[traced_test]
    fn test_binding_targets_and_qualifiers() {
        let manifest = base()
            .declaration(Injectable::new("GuestRepo").qualified("Guest").supertype("Repo").binds_to("Repo").contributes_to("App"))
            .declaration(Injectable::new("PremiumRepo").qualified("Premium").supertype("Repo").binds_to("Repo").contributes_to("App"))
            .declaration(Injectable::new("Fake").binds_to("Repo").contributes_to("App"));
        let (graph, errors) = build(&manifest, &Config::default());

        assert_eq!(
            errors,
            [GraphErrorKind::InvalidBindTarget {
                implementation: "Fake".into(),
                interface: "Repo".into(),
            }]
        );

        let app = ComponentId::from("App");
        let guest = graph.local(&app, &DependencyKey::qualified("Repo", "Guest")).unwrap();
        let premium = graph.local(&app, &DependencyKey::qualified("Repo", "Premium")).unwrap();
        assert!(guest.is_alias && premium.is_alias);
        assert_eq!(guest.alias_target(), Some(&DependencyKey::qualified("GuestRepo", "Guest")));
        assert_eq!(premium.alias_target(), Some(&DependencyKey::qualified("PremiumRepo", "Premium")));
        assert!(graph.local(&app, &DependencyKey::unqualified("Repo")).is_none());
    }

    #[test]
    #[traced_test]
    fn test_binds_validation() {
        let manifest = base()
            .declaration(Injectable::new("RepoImpl").contributes_to("App"))
            .declaration(BindsFn::new("AppModule", "bind_repo", "RepoImpl", "Repo"))
            .declaration(BindsFn::new("AppModule", "bind_none", "RepoImpl", "Other").with_params(Vec::new()))
            .declaration(BindsFn::new("AppModule", "bind_concrete", "RepoImpl", "Third").concrete());
        let (graph, errors) = build(&manifest, &Config::default());

        assert_eq!(errors.len(), 2);
        assert!(matches!(&errors[0], GraphErrorKind::InvalidBindsArity { arity: 0, .. }));
        assert!(matches!(&errors[1], GraphErrorKind::NonAbstractBinds { declaration } if declaration == "AppModule::bind_concrete"));

        let repo = graph
            .local(&ComponentId::from("App"), &DependencyKey::unqualified("Repo"))
            .unwrap();
        assert_eq!(repo.alias_target(), Some(&DependencyKey::unqualified("RepoImpl")));
        assert_eq!(repo.scope.as_ref().map(|scope| scope.as_str()), Some("Singleton"));
    }

    #[test]
    #[traced_test]
    fn test_assisted_factory() {
        let manifest = base()
            .declaration(Injectable::new("Service").contributes_to("App"))
            .declaration(
                Injectable::new("Formatter")
                    .param(Parameter::new("service", "Service"))
                    .param(Parameter::assisted("prefix", "String"))
                    .param(Parameter::assisted("id", "i32"))
                    .factory(FactoryContract::new("FormatterFactory", "Formatter").param("prefix", "String").param("id", "i32"))
                    .contributes_to("App"),
            );
        let (graph, errors) = build(&manifest, &Config::default());
        assert!(errors.is_empty(), "{errors:?}");

        let app = ComponentId::from("App");
        let formatter = graph.local(&app, &DependencyKey::unqualified("Formatter")).unwrap();
        assert!(formatter.is_assisted());
        assert_eq!(
            formatter.assisted_parameters,
            [
                (String::from("prefix"), TypeRef::from("String")),
                (String::from("id"), TypeRef::from("i32"))
            ]
        );

        let factory = graph.local(&app, &DependencyKey::unqualified("FormatterFactory")).unwrap();
        assert!(factory.is_factory);
        assert!(factory.assisted_parameters.is_empty());
        assert_eq!(factory.dependencies, [DependencyKey::unqualified("Service")]);
    }

    #[test]
    #[traced_test]
    fn test_assisted_errors() {
        let manifest = base()
            .declaration(Injectable::new("Lonely").param(Parameter::assisted("id", "i32")).contributes_to("App"))
            .declaration(
                Injectable::new("Wrong")
                    .param(Parameter::assisted("id", "i32"))
                    .factory(FactoryContract::new("WrongFactory", "Wrong").param("id", "String"))
                    .contributes_to("App"),
            )
            .declaration(Injectable::new("Consumer").param(Parameter::new("lonely", "Lonely")).contributes_to("App"));
        let (_, errors) = build(&manifest, &Config::default());

        assert_eq!(errors.len(), 3);
        assert!(matches!(&errors[0], GraphErrorKind::MissingAssistedFactory { declaration } if declaration.as_str() == "Lonely"));
        assert!(matches!(&errors[1], GraphErrorKind::AssistedFactoryMismatch { .. }));
        assert!(matches!(
            &errors[2],
            GraphErrorKind::DirectAssistedDependency { key, required_by }
                if key.type_name.as_str() == "Lonely" && required_by.type_name.as_str() == "Consumer"
        ));
    }

    #[test]
    #[traced_test]
    fn test_unresolved_and_orphans() {
        let manifest = base()
            .declaration(Injectable::new("Broken").param(Parameter::new("dep", TypeRef::Unresolved("<error>".into()))).contributes_to("App"))
            .declaration(Injectable::new("Orphan"))
            .declaration(Injectable::new("Needy").param(Parameter::new("missing", "Missing")).contributes_to("App"));
        let (_, errors) = build(&manifest, &Config::default());

        assert_eq!(errors.len(), 3);
        assert!(matches!(&errors[0], GraphErrorKind::UnresolvedType { declaration, raw } if declaration == "Broken" && raw == "<error>"));
        assert!(matches!(&errors[1], GraphErrorKind::OrphanDeclaration { declaration } if declaration == "Orphan"));
        assert!(matches!(&errors[2], GraphErrorKind::UnsatisfiedDependency { key, .. } if key.type_name.as_str() == "Missing"));

        let config = Config {
            validate_dependencies: false,
            ..Config::default()
        };
        let (_, errors) = build(&manifest, &config);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    #[traced_test]
    fn test_runtime_context_and_provider_requests() {
        let manifest = base()
            .declaration(Injectable::new("Api").contributes_to("App"))
            .declaration(
                Injectable::new("Screen")
                    .param(Parameter::new("api", "Api").as_provider())
                    .param(Parameter::runtime_context("handle", "Handle"))
                    .runtime_scoped()
                    .contributes_to("App"),
            )
            .declaration(
                Injectable::new("Twice")
                    .param(Parameter::runtime_context("first", "Handle"))
                    .param(Parameter::runtime_context("second", "Handle"))
                    .contributes_to("App"),
            );
        let (graph, errors) = build(&manifest, &Config::default());
        assert!(matches!(errors.as_slice(), [GraphErrorKind::MultipleRuntimeContexts { declaration }] if declaration == "Twice"));

        let screen = graph
            .local(&ComponentId::from("App"), &DependencyKey::unqualified("Screen"))
            .unwrap();
        assert!(screen.dependencies.is_empty());
        assert_eq!(screen.deferred, [DependencyKey::unqualified("Api")]);
        assert_eq!(screen.runtime_context, Some((String::from("handle"), TypeName::from("Handle"))));
        assert!(!graph.is_scoped(screen));
    }

    #[test]
    #[traced_test]
    fn test_runtime_context_nodes_are_never_cached() {
        let manifest = base()
            .declaration(
                Injectable::new("Screen")
                    .scope("Singleton")
                    .param(Parameter::runtime_context("handle", "Handle"))
                    .contributes_to("App"),
            )
            .declaration(ProvidesFn::new("AppModule", "provide_view", "View").param(Parameter::runtime_context("handle", "Handle")))
            .declaration(ProvidesFn::new("AppModule", "provide_row", "Row").param(Parameter::assisted("id", "i32")));
        let (graph, errors) = build(&manifest, &Config::default());
        assert!(matches!(
            errors.as_slice(),
            [GraphErrorKind::AssistedProvides { declaration }] if declaration == "AppModule::provide_row"
        ));

        let app = ComponentId::from("App");
        let screen = graph.local(&app, &DependencyKey::unqualified("Screen")).unwrap();
        assert!(screen.is_runtime_scoped);
        assert!(!graph.is_scoped(screen));
        let view = graph.local(&app, &DependencyKey::unqualified("View")).unwrap();
        assert_eq!(view.scope.as_ref().map(|scope| scope.as_str()), Some("Singleton"));
        assert!(!graph.is_scoped(view));
        assert!(graph.local(&app, &DependencyKey::unqualified("Row")).is_none());
    }

    #[test]
    #[traced_test]
    fn test_duplicates_and_shadowing() {
        let manifest = base()
            .declaration(Injectable::new("Api").contributes_to("App"))
            .declaration(ProvidesFn::new("AppModule", "provide_api", "Api"))
            .declaration(Injectable::new("Repo").contributes_to("App"))
            .declaration(Injectable::new("Repo").contributes_to("User"));

        let (graph, errors) = build(&manifest, &Config::default());
        assert!(matches!(
            errors.as_slice(),
            [GraphErrorKind::DuplicateBinding { key, component }]
                if key.type_name.as_str() == "Api" && component.as_str() == "App"
        ));
        assert!(logs_contain("shadows the one hosted by its ancestor"));
        let user = ComponentId::from("User");
        assert_eq!(
            graph.resolve(&user, &DependencyKey::unqualified("Repo")).unwrap().host_component,
            user
        );

        let config = Config {
            shadowing: ShadowingPolicy::Deny,
            ..Config::default()
        };
        let (_, errors) = build(&manifest, &config);
        assert!(matches!(errors.last(), Some(GraphErrorKind::ShadowedBinding { component, .. }) if component.as_str() == "User"));
    }
}
