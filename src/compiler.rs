use alloc::vec::Vec;
use tracing::{debug, info_span};

use crate::{
    config::Config,
    contribution::ContributionIndex,
    declaration::{Declaration, Manifest},
    errors::CompileErrors,
    graph::{self, DependencyNode, Graph},
    hierarchy::Hierarchy,
    plan::EmissionPlan,
};

/// Output of a successful compilation: the frozen graph and its emission plan.
#[derive(Debug, Clone)]
pub struct Compilation {
    manifest: Manifest,
    graph: Graph,
    plan: EmissionPlan,
}

impl Compilation {
    #[inline]
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    #[inline]
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    #[inline]
    #[must_use]
    pub fn hierarchy(&self) -> &Hierarchy {
        self.graph.hierarchy()
    }

    #[inline]
    #[must_use]
    pub fn plan(&self) -> &EmissionPlan {
        &self.plan
    }

    /// Declaration a node was derived from.
    #[inline]
    #[must_use]
    pub fn source(&self, node: &DependencyNode) -> Option<&Declaration> {
        self.manifest.declarations.get(node.source)
    }
}

/// Runs the whole pass: contribution index, hierarchy, graph, validation and cycle detection.
///
/// # Errors
/// Returns every diagnostic found, in a deterministic order, if any stage failed.
/// No graph is produced in that case.
pub fn compile(manifest: &Manifest, config: &Config) -> Result<Compilation, CompileErrors> {
    let span = info_span!("compile", entry_point = %manifest.entry_point);
    let _guard = span.enter();

    let mut errors = Vec::new();

    let index = {
        let _guard = info_span!("index").entered();
        ContributionIndex::index(manifest, &mut errors)
    };

    let hierarchy = {
        let _guard = info_span!("hierarchy").entered();
        Hierarchy::resolve(&index, config, &mut errors)
    };
    let Some(hierarchy) = hierarchy else {
        return Err(CompileErrors(errors));
    };

    let graph = {
        let _guard = info_span!("graph").entered();
        graph::build(&index, hierarchy, config, &mut errors)
    };

    {
        let _guard = info_span!("cycles").entered();
        graph::detect_cycles(&graph, &mut errors);
    }

    if !errors.is_empty() {
        return Err(CompileErrors(errors));
    }

    let plan = EmissionPlan::new(&graph);
    debug!(nodes = graph.len(), "Compiled");
    Ok(Compilation {
        manifest: manifest.clone(),
        graph,
        plan,
    })
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString as _;
    use tracing_test::traced_test;

    use super::compile;
    use crate::{
        config::Config,
        declaration::{ComponentDecl, Injectable, Manifest, Parameter},
        errors::GraphErrorKind,
        key::DependencyKey,
    };

    #[test]
    #[traced_test]
    fn test_compile() {
        let manifest = Manifest::new("App")
            .component(ComponentDecl::new("App").scope("Singleton"))
            .declaration(Injectable::new("Api").contributes_to("App"))
            .declaration(Injectable::new("Repo").param(Parameter::new("api", "Api")).contributes_to("App"));
        let compilation = compile(&manifest, &Config::default()).unwrap();

        assert_eq!(compilation.graph().len(), 2);
        let repo = compilation.graph().iter().find(|node| node.key == DependencyKey::unqualified("Repo")).unwrap();
        assert_eq!(compilation.source(repo), manifest.declarations.get(1));
    }

    #[test]
    #[traced_test]
    fn test_errors_accumulate() {
        let manifest = Manifest::new("App")
            .component(ComponentDecl::new("App"))
            .declaration(Injectable::new("A").param(Parameter::new("b", "B")).contributes_to("App"))
            .declaration(Injectable::new("B").param(Parameter::new("a", "A")).contributes_to("App"))
            .declaration(Injectable::new("Lost").contributes_to("Nowhere"));
        let errors = compile(&manifest, &Config::default()).unwrap_err();

        assert_eq!(errors.len(), 2);
        assert!(matches!(errors.errors()[0], GraphErrorKind::UnresolvedScopeReference { .. }));
        assert_eq!(errors.cycles().count(), 1);
        assert!(errors.to_string().ends_with("Cyclic dependency detected: A -> B -> A"));
    }

    #[test]
    #[traced_test]
    fn test_no_root() {
        let manifest = Manifest::new("App")
            .component(ComponentDecl::subcomponent("App", "Session"))
            .component(ComponentDecl::subcomponent("Session", "App"))
            .declaration(Injectable::new("Api").contributes_to("App"));
        let errors = compile(&manifest, &Config::default()).unwrap_err();

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors.errors()[0], GraphErrorKind::NoRoot { .. }));
    }
}
