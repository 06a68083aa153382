use crate::domain::user::Role;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LandingRoute {
    SignIn,
    AdminArea,
    OrganizationHome,
    VolunteerDashboard,
}

impl LandingRoute {
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::SignIn => "/login",
            Self::AdminArea => "/admin",
            Self::OrganizationHome => "/organization",
            Self::VolunteerDashboard => "/volunteer/dashboard",
        }
    }

    #[must_use]
    pub const fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Self::AdminArea,
            Role::Organization => Self::OrganizationHome,
            Role::Volunteer => Self::VolunteerDashboard,
        }
    }
}

impl Serialize for LandingRoute {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.path())
    }
}

impl fmt::Display for LandingRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Terminal outcome of resolving the session on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "role", rename_all = "snake_case")]
pub enum SessionState {
    Unauthenticated,
    Authenticated(Role),
}

impl SessionState {
    #[must_use]
    pub const fn landing_route(self) -> LandingRoute {
        match self {
            Self::Unauthenticated => LandingRoute::SignIn,
            Self::Authenticated(role) => LandingRoute::for_role(role),
        }
    }
}
