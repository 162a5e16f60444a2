use serde::{Deserialize, Serialize};

use crate::Role;

/// An authenticated lab user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub role: Role,
    pub site: String,
}
