use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::{InstanceId, UserId};

/// One backend record system as seen by a particular user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    #[serde(rename = "instanceId")]
    pub id: InstanceId,
    #[serde(rename = "instanceName")]
    pub name: String,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default = "default_access")]
    pub has_access: bool,
}

fn default_access() -> bool {
    true
}

impl Instance {
    pub fn new(id: impl Into<InstanceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_primary: false,
            has_access: true,
        }
    }

    /// Mark this instance as the user's primary.
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    /// Mark this instance as currently unreachable for the user.
    pub fn without_access(mut self) -> Self {
        self.has_access = false;
        self
    }
}

/// An authenticated portal user. Immutable for the duration of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "userId")]
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Instances the user belongs to, in login order.
    pub instances: Vec<InstanceId>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Explicit user and instance context passed into every core call.
///
/// `accessible_instances` only ever contains instances with `has_access`.
/// The active instance, when present, is always a member of that set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: UserId,
    accessible_instances: Vec<Instance>,
    active_instance: Option<InstanceId>,
}

impl UserContext {
    /// Build a context from the user's directory entry.
    ///
    /// The active instance defaults to the accessible primary, falling back
    /// to the first accessible instance.
    pub fn new(user_id: UserId, instances: Vec<Instance>) -> Self {
        let accessible: Vec<Instance> = instances.into_iter().filter(|i| i.has_access).collect();
        let active = accessible
            .iter()
            .find(|i| i.is_primary)
            .or_else(|| accessible.first())
            .map(|i| i.id.clone());
        Self {
            user_id,
            accessible_instances: accessible,
            active_instance: active,
        }
    }

    pub fn accessible_instances(&self) -> &[Instance] {
        &self.accessible_instances
    }

    pub fn accessible_ids(&self) -> Vec<InstanceId> {
        self.accessible_instances.iter().map(|i| i.id.clone()).collect()
    }

    pub fn active_instance(&self) -> Option<&InstanceId> {
        self.active_instance.as_ref()
    }

    /// The accessible primary instance, if any.
    pub fn primary(&self) -> Option<&Instance> {
        self.accessible_instances.iter().find(|i| i.is_primary)
    }

    pub fn can_access(&self, instance: &InstanceId) -> bool {
        self.accessible_instances.iter().any(|i| &i.id == instance)
    }

    /// Switch the active instance. Only accessible instances may be selected.
    pub fn set_active_instance(&mut self, instance: InstanceId) -> Result<(), TypeError> {
        if !self.can_access(&instance) {
            return Err(TypeError::InstanceNotAccessible {
                user: self.user_id.to_string(),
                instance: instance.to_string(),
            });
        }
        self.active_instance = Some(instance);
        Ok(())
    }

    /// `true` when the user can reach more than one instance.
    pub fn is_multi_instance(&self) -> bool {
        self.accessible_instances.len() > 1
    }
}
