use alloc::{
    collections::BTreeMap,
    sync::{Arc, Weak},
};
use tracing::{debug, error, warn};

use super::{
    component::{instantiate_error, CastFn, Component, ComponentInner, Entry, ErasedProvider, Injector},
    context::Context,
    factory::{AssistedFactory, Create},
    provider::{CastProvider, ScopedProvider, SharedProvider, UnscopedProvider},
    Runtime,
};
use crate::{
    compiler::Compilation,
    errors::{BlueprintErrorKind, InstantiateErrorKind},
    key::{ComponentId, DependencyKey},
    plan::{EmissionPlan, ProviderEntry, ProviderKind},
};

/// What a registration needs to know about the provider entry it builds.
pub(crate) struct Seed<'a> {
    component: &'a Weak<ComponentInner>,
    id: &'a ComponentId,
    key: &'a DependencyKey,
    scoped: bool,
}

type MakeProvider = Arc<dyn Fn(Seed<'_>) -> ErasedProvider + Send + Sync>;

enum Registration {
    Construct(MakeProvider),
    Factory(MakeProvider),
    Alias(CastFn),
}

/// Emission plan plus the constructors checked against it, shared by every component instance.
pub(crate) struct Wiring {
    pub(crate) plan: EmissionPlan,
    registrations: BTreeMap<DependencyKey, Registration>,
}

impl Wiring {
    pub(crate) fn entry(&self, entry: &ProviderEntry, component: &Weak<ComponentInner>, id: &ComponentId) -> Entry {
        let registration = self.registrations.get(&entry.key);
        match entry.kind {
            ProviderKind::Scoped | ProviderKind::Unscoped | ProviderKind::Factory => match registration {
                Some(Registration::Construct(make) | Registration::Factory(make)) => Entry::Provider(make(Seed {
                    component,
                    id,
                    key: &entry.key,
                    scoped: entry.kind == ProviderKind::Scoped,
                })),
                _ => Entry::Missing,
            },
            ProviderKind::Alias => match (entry.target(), registration) {
                (Some(target), Some(Registration::Alias(cast))) => Entry::Alias {
                    target: target.clone(),
                    cast: Some(cast.clone()),
                },
                (Some(target), _) => Entry::Alias {
                    target: target.clone(),
                    cast: None,
                },
                (None, _) => Entry::Missing,
            },
            ProviderKind::AssistedOnly => Entry::AssistedOnly,
        }
    }
}

/// Constructors of every hosted key, the runtime counterpart of emitted wiring.
///
/// A constructor is registered per key and shared by every component hosting that key.
/// Aliases need no registration unless the interface is a different Rust type than its target,
/// see [`Self::alias`].
///
/// ```rust
/// use std::sync::Arc;
///
/// use staticwire::{compile, Blueprint, ComponentDecl, Config, DependencyKey, Injectable, Manifest, TypeName};
///
/// struct Greeter;
///
/// let manifest = Manifest::new("App")
///     .component(ComponentDecl::new("App").scope("Singleton"))
///     .declaration(Injectable::new(TypeName::of::<Arc<Greeter>>()).contributes_to("App"));
/// let compilation = compile(&manifest, &Config::default()).unwrap();
///
/// let runtime = Blueprint::new()
///     .provide(DependencyKey::of::<Arc<Greeter>>(), |_| Ok(Arc::new(Greeter)))
///     .build(&compilation)
///     .unwrap();
///
/// let first: Arc<Greeter> = runtime.get(&DependencyKey::of::<Arc<Greeter>>()).unwrap();
/// let second: Arc<Greeter> = runtime.get(&DependencyKey::of::<Arc<Greeter>>()).unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
/// ```
#[derive(Default)]
pub struct Blueprint {
    registrations: BTreeMap<DependencyKey, Registration>,
}

impl Blueprint {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn register(mut self, key: DependencyKey, registration: Registration) -> Self {
        if self.registrations.insert(key.clone(), registration).is_some() {
            warn!(key = %key, "Constructor registered twice, the last one wins");
        }
        self
    }

    /// Registers the constructor of a scoped or unscoped node.
    #[must_use]
    pub fn provide<T, F>(self, key: DependencyKey, constructor: F) -> Self
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&Injector<'_>) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        let constructor = Arc::new(constructor);
        let make: MakeProvider = Arc::new(move |seed: Seed<'_>| {
            let constructor = constructor.clone();
            let component = seed.component.clone();
            let id = seed.id.clone();
            let key = seed.key.clone();

            let provider: SharedProvider<T> = Arc::new(UnscopedProvider::new(move |context: &Context| {
                let component = Component::upgrade(&component, &id)?;
                let injector = Injector::new(&component, &key, context);
                constructor(&injector).map_err(|err| instantiate_error(&key, err))
            }));
            let provider = if seed.scoped {
                Arc::new(ScopedProvider::new(provider)) as SharedProvider<T>
            } else {
                provider
            };
            Arc::new(provider) as ErasedProvider
        });
        self.register(key, Registration::Construct(make))
    }

    /// Registers the constructor of a node with a runtime context parameter of type `C`.
    /// The value is taken from the context supplied at the injection site.
    #[must_use]
    pub fn provide_with_context<C, T, F>(self, key: DependencyKey, constructor: F) -> Self
    where
        C: Send + Sync + 'static,
        T: Clone + Send + Sync + 'static,
        F: Fn(&Injector<'_>, Arc<C>) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.provide(key, move |injector| {
            let context = injector.runtime_context::<C>()?;
            constructor(injector, context)
        })
    }

    /// Registers the constructor behind a factory node. Requesting the factory key yields an
    /// [`AssistedFactory<Args, T>`].
    #[must_use]
    pub fn factory<Args, T, F>(self, key: DependencyKey, constructor: F) -> Self
    where
        Args: 'static,
        T: 'static,
        F: Fn(&Injector<'_>, Args) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        let create: Create<Args, T> = Arc::new(constructor);
        let make: MakeProvider = Arc::new(move |seed: Seed<'_>| {
            let create = create.clone();
            let component = seed.component.clone();
            let id = seed.id.clone();
            let key = seed.key.clone();

            let provider: SharedProvider<AssistedFactory<Args, T>> = Arc::new(UnscopedProvider::new(move |context: &Context| {
                Component::upgrade(&component, &id)?;
                Ok(AssistedFactory::new(component.clone(), id.clone(), key.clone(), context.clone(), create.clone()))
            }));
            Arc::new(provider) as ErasedProvider
        });
        self.register(key, Registration::Factory(make))
    }

    /// Registers the conversion of an alias whose interface type `T` differs from its target's type `U`.
    /// The alias still shares the target's provider, so its scoping is the target's.
    #[must_use]
    pub fn alias<U, T>(self, key: DependencyKey, cast: fn(U) -> T) -> Self
    where
        U: 'static,
        T: 'static,
    {
        let cast: CastFn = Arc::new(move |component: &Component, target: &DependencyKey| {
            let inner = component.provider::<U>(target)?;
            let provider: SharedProvider<T> = Arc::new(CastProvider { inner, cast });
            Ok(Arc::new(provider) as ErasedProvider)
        });
        self.register(key, Registration::Alias(cast))
    }

    /// Checks the registrations against the emission plan and builds the runtime.
    ///
    /// # Errors
    /// - Returns [`BlueprintErrorKind::UnknownKey`] for a registration of a key that isn't in the graph
    /// - Returns [`BlueprintErrorKind::MissingConstructor`] for a hosted key that needs a constructor but has none
    /// - Returns [`BlueprintErrorKind::KindMismatch`] for a registration that doesn't fit its node
    pub fn build(self, compilation: &Compilation) -> Result<Runtime, BlueprintErrorKind> {
        let plan = compilation.plan();

        if let Some(key) = self.registrations.keys().find(|key| !plan.dispatch().contains_key(*key)) {
            let err = BlueprintErrorKind::UnknownKey { key: key.clone() };
            error!("{}", err);
            return Err(err);
        }

        for component in plan.components() {
            for entry in &component.providers {
                let registration = self.registrations.get(&entry.key);
                let fits = match (entry.kind, registration) {
                    (ProviderKind::Scoped | ProviderKind::Unscoped | ProviderKind::Factory, None) => {
                        let err = BlueprintErrorKind::MissingConstructor {
                            key: entry.key.clone(),
                            component: component.id.clone(),
                        };
                        error!("{}", err);
                        return Err(err);
                    }
                    (ProviderKind::Scoped | ProviderKind::Unscoped, Some(Registration::Construct(_)))
                    | (ProviderKind::Factory, Some(Registration::Factory(_)))
                    | (ProviderKind::Alias, None | Some(Registration::Alias(_)))
                    | (ProviderKind::AssistedOnly, None) => true,
                    _ => false,
                };
                if !fits {
                    let err = BlueprintErrorKind::KindMismatch {
                        key: entry.key.clone(),
                        expected: entry.kind,
                    };
                    error!("{}", err);
                    return Err(err);
                }
            }
        }

        debug!(registrations = self.registrations.len(), "Blueprint checked");
        Ok(Runtime::new(Wiring {
            plan: plan.clone(),
            registrations: self.registrations,
        }))
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use tracing_test::traced_test;

    use super::Blueprint;
    use crate::{
        compiler::{compile, Compilation},
        config::Config,
        declaration::{ComponentDecl, FactoryContract, Injectable, Manifest, Parameter},
        errors::BlueprintErrorKind,
        key::{DependencyKey, TypeName},
        plan::ProviderKind,
        runtime::AssistedFactory,
    };

    struct Api;
    struct Formatter(i32);

    type FormatterFactory = AssistedFactory<i32, Formatter>;

    fn compilation() -> Compilation {
        let manifest = Manifest::new("App")
            .component(ComponentDecl::new("App").scope("Singleton"))
            .declaration(Injectable::new(TypeName::of::<Arc<Api>>()).contributes_to("App"))
            .declaration(
                Injectable::new(TypeName::of::<Formatter>())
                    .param(Parameter::new("api", TypeName::of::<Arc<Api>>()))
                    .param(Parameter::assisted("id", TypeName::of::<i32>()))
                    .factory(
                        FactoryContract::new(TypeName::of::<FormatterFactory>(), TypeName::of::<Formatter>())
                            .param("id", TypeName::of::<i32>()),
                    )
                    .contributes_to("App"),
            );
        compile(&manifest, &Config::default()).unwrap()
    }

    fn api(blueprint: Blueprint) -> Blueprint {
        blueprint.provide(DependencyKey::of::<Arc<Api>>(), |_| Ok(Arc::new(Api)))
    }

    fn formatter(blueprint: Blueprint) -> Blueprint {
        blueprint.factory(DependencyKey::of::<FormatterFactory>(), |injector, id: i32| {
            let _api: Arc<Api> = injector.inject()?;
            Ok(Formatter(id))
        })
    }

    #[test]
    #[traced_test]
    fn test_build_checks_totality() {
        let compilation = compilation();

        let err = api(Blueprint::new()).build(&compilation).err().unwrap();
        assert_eq!(
            err,
            BlueprintErrorKind::MissingConstructor {
                key: DependencyKey::of::<FormatterFactory>(),
                component: "App".into(),
            }
        );

        let err = formatter(api(Blueprint::new()))
            .provide(DependencyKey::unqualified("Unknown"), |_| Ok(()))
            .build(&compilation)
            .err()
            .unwrap();
        assert!(matches!(err, BlueprintErrorKind::UnknownKey { .. }));

        let err = formatter(Blueprint::new())
            .factory(DependencyKey::of::<Arc<Api>>(), |_, (): ()| Ok(()))
            .build(&compilation)
            .err()
            .unwrap();
        assert_eq!(
            err,
            BlueprintErrorKind::KindMismatch {
                key: DependencyKey::of::<Arc<Api>>(),
                expected: ProviderKind::Scoped,
            }
        );

        assert!(formatter(api(Blueprint::new())).build(&compilation).is_ok());
    }

    #[test]
    #[traced_test]
    fn test_factory_creates_with_args() {
        let runtime = formatter(api(Blueprint::new())).build(&compilation()).unwrap();

        let factory: FormatterFactory = runtime.get(&DependencyKey::of::<FormatterFactory>()).unwrap();
        assert_eq!(factory.create(7).unwrap().0, 7);
        assert_eq!(factory.create(8).unwrap().0, 8);
        assert!(runtime.get::<Formatter>(&DependencyKey::of::<Formatter>()).is_err());
    }
}
