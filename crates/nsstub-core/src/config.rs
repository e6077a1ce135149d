//! Isolation mode configuration.
//!
//! Namespace isolation is opt-in through the `NSSTUB_ISOLATE_NAMESPACE`
//! environment variable:
//! - `1`: load the target into a fresh `dlmopen` namespace, falling back to
//!   flat loading if any setup step fails.
//! - anything else, including unset or empty: flat `dlopen` loading.
//!
//! Only the literal `1` enables isolation. `dlmopen` namespaces are fragile on
//! several glibc releases, so values like `true` or `yes` deliberately do not
//! count.

/// Environment variable consulted on the first load request.
pub const ISOLATION_ENV: &str = "NSSTUB_ISOLATE_NAMESPACE";

/// The only toggle value that enables isolation.
const ENABLE_VALUE: &str = "1";

/// How the target library is loaded.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsolationMode {
    /// Ordinary `dlopen` into the main namespace.
    #[default]
    Flat,
    /// `dlmopen` into a namespace created for the target.
    Namespace,
}

impl IsolationMode {
    /// Interpret a raw toggle value. `None` means the variable is unset.
    #[must_use]
    pub fn from_env_value(raw: Option<&str>) -> Self {
        match raw {
            Some(ENABLE_VALUE) => Self::Namespace,
            _ => Self::Flat,
        }
    }

    /// Returns true if namespace setup should be attempted.
    #[must_use]
    pub const fn wants_isolation(self) -> bool {
        matches!(self, Self::Namespace)
    }
}

/// Read the isolation toggle from the process environment.
///
/// A value that is not valid UTF-8 cannot be the literal `1` and selects
/// [`IsolationMode::Flat`].
#[must_use]
pub fn isolation_mode_from_env() -> IsolationMode {
    let raw = std::env::var(ISOLATION_ENV).ok();
    IsolationMode::from_env_value(raw.as_deref())
}

/// Where the loader takes its isolation mode from.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum IsolationPolicy {
    /// Read [`ISOLATION_ENV`] once, on the first load request.
    #[default]
    FromEnv,
    /// Use a fixed mode and ignore the environment.
    Fixed(IsolationMode),
}

impl IsolationPolicy {
    /// Resolve the policy to a concrete mode.
    #[must_use]
    pub fn resolve(self) -> IsolationMode {
        match self {
            Self::FromEnv => isolation_mode_from_env(),
            Self::Fixed(mode) => mode,
        }
    }
}
