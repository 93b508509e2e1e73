use alloc::{string::String, sync::Arc};
use core::{
    any::type_name,
    fmt::{self, Display, Formatter},
};

macro_rules! identity {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(Arc<str>);

        impl $name {
            #[inline]
            #[must_use]
            pub fn new(name: impl Into<Arc<str>>) -> Self {
                Self(name.into())
            }

            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Last path segment without generic arguments, e.g. `Repo` for `app::data::Repo<T>`.
            #[must_use]
            pub fn short_name(&self) -> &str {
                let raw = self.0.split_once('<').map_or(&*self.0, |(raw, _)| raw);
                raw.rsplit_once("::").map_or(raw, |(_, name)| name)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(name: &str) -> Self {
                Self::new(name)
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(name: String) -> Self {
                Self::new(name)
            }
        }
    };
}

identity! {
    /// Fully resolved type identity, as reported by symbol discovery.
    TypeName
}

identity! {
    /// Qualifier tag disambiguating several providers of the same type.
    Qualifier
}

identity! {
    /// Scope annotation identity (e.g. `Singleton`, `UserScope`).
    ScopeId
}

identity! {
    ComponentId
}

identity! {
    ModuleId
}

impl TypeName {
    /// Type identity of a Rust type, used by the runtime to address the graph with real types.
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(type_name::<T>())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DependencyKey {
    pub type_name: TypeName,
    pub qualifier: Option<Qualifier>,
}

impl DependencyKey {
    #[inline]
    #[must_use]
    pub const fn new(type_name: TypeName, qualifier: Option<Qualifier>) -> Self {
        Self { type_name, qualifier }
    }

    #[inline]
    #[must_use]
    pub fn unqualified(type_name: impl Into<TypeName>) -> Self {
        Self::new(type_name.into(), None)
    }

    #[inline]
    #[must_use]
    pub fn qualified(type_name: impl Into<TypeName>, qualifier: impl Into<Qualifier>) -> Self {
        Self::new(type_name.into(), Some(qualifier.into()))
    }

    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(TypeName::of::<T>(), None)
    }

    #[inline]
    #[must_use]
    pub fn of_qualified<T: ?Sized + 'static>(qualifier: impl Into<Qualifier>) -> Self {
        Self::new(TypeName::of::<T>(), Some(qualifier.into()))
    }

    /// Property-style name of the provider emitted for this key,
    /// e.g. `(Repo, Premium)` -> `repoPremiumProvider`.
    #[must_use]
    pub fn provider_name(&self) -> String {
        let mut name = String::new();
        push_cased(&mut name, self.type_name.short_name(), false);
        if let Some(qualifier) = &self.qualifier {
            push_cased(&mut name, qualifier.short_name(), true);
        }
        name.push_str("Provider");
        name
    }
}

fn push_cased(buf: &mut String, value: &str, upper_first: bool) {
    let mut chars = value.chars();
    if let Some(first) = chars.next() {
        if upper_first {
            buf.extend(first.to_uppercase());
        } else {
            buf.extend(first.to_lowercase());
        }
        buf.extend(chars);
    }
}

impl Display for DependencyKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{} @{}", self.type_name, qualifier),
            None => write!(f, "{}", self.type_name),
        }
    }
}
