/// What to do when a component declares a key that one of its ancestors also hosts.
///
/// The directly declared node always wins for the declaring component's own graph;
/// the policy only decides how loudly that is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowingPolicy {
    Allow,
    #[default]
    Warn,
    Deny,
}

/// Config for a compilation
/// ## Fields
/// - `shadowing`:
///   Reporting policy for keys that a child component redeclares, see [`ShadowingPolicy`].
///
/// - `reject_ambiguous_scopes`:
///   If `true`, two components of one lineage declaring the same scope identity is an error.
///
/// - `validate_dependencies`:
///   If `true`, every dependency of every node must be visible from its host component
///   (locally or through an ancestor). Disabling it leaves the check to code emission.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub shadowing: ShadowingPolicy,
    pub reject_ambiguous_scopes: bool,
    pub validate_dependencies: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shadowing: ShadowingPolicy::default(),
            reject_ambiguous_scopes: true,
            validate_dependencies: true,
        }
    }
}
