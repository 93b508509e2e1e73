use alloc::{collections::BTreeMap, string::String, vec::Vec};
use tracing::{debug, error, warn};

use crate::{
    declaration::{ComponentDecl, Declaration, Injectable, Manifest, ModuleDecl},
    errors::GraphErrorKind,
    key::{ComponentId, ModuleId},
};

/// The unit a "contributes to" fact is attached to.
///
/// Function-level declarations never carry the fact themselves, they are contributed
/// through their enclosing module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContributionUnit<'a> {
    /// Index of an injectable in [`Manifest::declarations`].
    Injectable(usize),
    Module(&'a ModuleId),
    Component(&'a ComponentId),
}

impl ContributionUnit<'_> {
    /// Contribution unit of the declaration at `index`.
    #[must_use]
    pub fn of(declarations: &[Declaration], index: usize) -> Option<ContributionUnit<'_>> {
        match declarations.get(index)? {
            Declaration::Injectable(_) => Some(ContributionUnit::Injectable(index)),
            declaration => declaration.enclosing_module().map(ContributionUnit::Module),
        }
    }
}

/// `component -> [contribution]`, plus the reverse lookup used to find a declaration's host.
pub struct ContributionIndex<'a> {
    manifest: &'a Manifest,
    components: BTreeMap<&'a ComponentId, &'a ComponentDecl>,
    modules: BTreeMap<&'a ModuleId, &'a ModuleDecl>,
    contributions: BTreeMap<&'a ComponentId, Vec<ContributionUnit<'a>>>,
    hosts: BTreeMap<ContributionUnit<'a>, Vec<&'a ComponentId>>,
    members: BTreeMap<&'a ModuleId, Vec<usize>>,
}

impl<'a> ContributionIndex<'a> {
    /// Groups every contribution of the manifest by the component it targets.
    ///
    /// Errors are accumulated:
    /// - [`GraphErrorKind::UnresolvedScopeReference`] for a contribution naming an unknown component
    /// - [`GraphErrorKind::UnknownModule`] for a module function whose module isn't declared
    pub fn index(manifest: &'a Manifest, errors: &mut Vec<GraphErrorKind>) -> Self {
        let components: BTreeMap<_, _> = manifest.components.iter().map(|component| (&component.id, component)).collect();
        let modules: BTreeMap<_, _> = manifest.modules.iter().map(|module| (&module.id, module)).collect();

        let mut index = Self {
            manifest,
            contributions: components.keys().map(|id| (*id, Vec::new())).collect(),
            components,
            modules,
            hosts: BTreeMap::new(),
            members: BTreeMap::new(),
        };

        for component in &manifest.components {
            index.contribute(
                ContributionUnit::Component(&component.id),
                &component.contributes_to,
                || component.id.as_str().into(),
                errors,
            );
        }
        for module in &manifest.modules {
            index.contribute(
                ContributionUnit::Module(&module.id),
                &module.contributes_to,
                || module.id.as_str().into(),
                errors,
            );
        }
        for (position, declaration) in manifest.declarations.iter().enumerate() {
            match declaration {
                Declaration::Injectable(Injectable { contributes_to, .. }) => {
                    index.contribute(
                        ContributionUnit::Injectable(position),
                        contributes_to,
                        || declaration.display_name(),
                        errors,
                    );
                }
                Declaration::Provides(_) | Declaration::Binds(_) => {
                    let Some(module) = declaration.enclosing_module() else {
                        continue;
                    };
                    match index.modules.get_key_value(module) {
                        Some((module, _)) => index.members.entry(*module).or_default().push(position),
                        None => {
                            let err = GraphErrorKind::UnknownModule {
                                declaration: declaration.display_name(),
                                module: module.clone(),
                            };
                            error!("{}", err);
                            errors.push(err);
                        }
                    }
                }
            }
        }

        debug!(components = index.contributions.len(), "Contributions indexed");
        index
    }

    fn contribute(
        &mut self,
        unit: ContributionUnit<'a>,
        targets: &'a [ComponentId],
        name: impl Fn() -> String,
        errors: &mut Vec<GraphErrorKind>,
    ) {
        for target in targets {
            let Some(contributions) = self.contributions.get_mut(target) else {
                let err = GraphErrorKind::UnresolvedScopeReference {
                    declaration: name(),
                    component: target.clone(),
                };
                error!("{}", err);
                errors.push(err);
                continue;
            };
            contributions.push(unit);

            let hosts = self.hosts.entry(unit).or_default();
            if !hosts.is_empty() {
                warn!(
                    declaration = %name(),
                    host = %hosts[0],
                    ignored = %target,
                    "Contributed to several components, the first one hosts it"
                );
            }
            hosts.push(target);
        }
    }

    /// Host of a declaration: the first component its contribution unit was contributed to.
    /// `None` means the declaration is orphaned.
    #[must_use]
    pub fn find_host(&self, declaration: usize) -> Option<&'a ComponentId> {
        let unit = ContributionUnit::of(&self.manifest.declarations, declaration)?;
        self.host_of(unit)
    }

    #[inline]
    #[must_use]
    pub fn host_of(&self, unit: ContributionUnit<'a>) -> Option<&'a ComponentId> {
        self.hosts.get(&unit).and_then(|hosts| hosts.first().copied())
    }

    /// Every component a unit was contributed to, in declaration order.
    #[must_use]
    pub fn targets_of(&self, unit: ContributionUnit<'a>) -> &[&'a ComponentId] {
        self.hosts.get(&unit).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a ComponentId, &[ContributionUnit<'a>])> {
        self.contributions
            .iter()
            .map(|(component, contributions)| (*component, contributions.as_slice()))
    }

    #[must_use]
    pub fn contributions(&self, component: &ComponentId) -> &[ContributionUnit<'a>] {
        self.contributions.get(component).map(Vec::as_slice).unwrap_or(&[])
    }

    #[inline]
    #[must_use]
    pub fn component(&self, id: &ComponentId) -> Option<&'a ComponentDecl> {
        self.components.get(id).copied()
    }

    pub fn components(&self) -> impl Iterator<Item = &'a ComponentDecl> + '_ {
        self.components.values().copied()
    }

    /// Functions of a module, in declaration order, as indexes into [`Manifest::declarations`].
    #[must_use]
    pub fn members(&self, module: &ModuleId) -> &[usize] {
        self.members.get(module).map(Vec::as_slice).unwrap_or(&[])
    }

    #[inline]
    #[must_use]
    pub fn manifest(&self) -> &'a Manifest {
        self.manifest
    }
}
