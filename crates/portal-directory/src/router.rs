use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use portal_types::{InstanceId, RequestKind, UserContext};
use tracing::{debug, warn};

use crate::error::{RoutingError, RoutingResult};

type RuleFn = dyn Fn(&UserContext) -> Option<InstanceId> + Send + Sync;

/// How a request kind picks its single target instance.
///
/// Every rule is a pure function of the caller's [`UserContext`].
#[derive(Clone)]
pub enum RoutingRule {
    /// The user's primary instance, if it is accessible.
    Primary,
    /// The instance the user has currently selected.
    Active,
    /// A fixed instance, if the user can access it.
    Fixed(InstanceId),
    /// Any other pure selection function.
    Custom(Arc<RuleFn>),
}

impl RoutingRule {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&UserContext) -> Option<InstanceId> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    /// Apply the rule. `None` means no accessible target exists.
    pub fn select(&self, ctx: &UserContext) -> Option<InstanceId> {
        match self {
            Self::Primary => ctx.primary().map(|i| i.id.clone()),
            Self::Active => ctx.active_instance().cloned(),
            Self::Fixed(id) => ctx.can_access(id).then(|| id.clone()),
            // Custom rules may only ever land on an accessible instance.
            Self::Custom(f) => f(ctx).filter(|id| ctx.can_access(id)),
        }
    }
}

impl fmt::Debug for RoutingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("Primary"),
            Self::Active => f.write_str("Active"),
            Self::Fixed(id) => write!(f, "Fixed({id})"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Resolves a request kind to exactly one target instance.
#[derive(Clone, Debug, Default)]
pub struct InstanceRouter {
    rules: HashMap<RequestKind, RoutingRule>,
}

impl InstanceRouter {
    /// A router with no rules. Every kind must be configured explicitly.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard table: every request kind routes to the primary instance.
    pub fn with_default_rules() -> Self {
        let mut router = Self::new();
        for kind in RequestKind::ALL {
            router.set_rule(kind, RoutingRule::Primary);
        }
        router
    }

    /// Install or replace the rule for `kind`.
    pub fn set_rule(&mut self, kind: RequestKind, rule: RoutingRule) {
        self.rules.insert(kind, rule);
    }

    pub fn rule(&self, kind: RequestKind) -> Option<&RoutingRule> {
        self.rules.get(&kind)
    }

    /// Pick the target instance for `kind` on behalf of `ctx.user_id`.
    pub fn resolve(&self, kind: RequestKind, ctx: &UserContext) -> RoutingResult<InstanceId> {
        let rule = self.rules.get(&kind).ok_or(RoutingError::NoRule(kind))?;
        match rule.select(ctx) {
            Some(instance) => {
                debug!(user = %ctx.user_id, %kind, %instance, "request routed");
                Ok(instance)
            }
            None => {
                warn!(user = %ctx.user_id, %kind, ?rule, "no accessible instance for request");
                Err(RoutingError::NoAccessibleInstance {
                    user: ctx.user_id.clone(),
                    kind,
                })
            }
        }
    }

    /// Resolve a request kind given by its wire name (e.g. `getPersonalInfo`).
    pub fn resolve_named(&self, kind: &str, ctx: &UserContext) -> RoutingResult<InstanceId> {
        let kind: RequestKind = kind
            .parse()
            .map_err(|_| RoutingError::UnknownRequestKind(kind.to_string()))?;
        self.resolve(kind, ctx)
    }
}
