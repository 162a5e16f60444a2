use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role of a lab user.
///
/// Roles are opaque strings loaded from configuration; the two the lab UI
/// knows about have constructors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const CENTRAL_ADMIN: &'static str = "CENTRAL_ADMIN";
    pub const PLANT_ADMIN: &'static str = "PLANT_ADMIN";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn central_admin() -> Self {
        Self(Cow::Borrowed(Self::CENTRAL_ADMIN))
    }

    pub fn plant_admin() -> Self {
        Self(Cow::Borrowed(Self::PLANT_ADMIN))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
