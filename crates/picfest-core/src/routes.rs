use std::fmt;

use picfest_types::models::Role;

/// Client-side pages served by the browser shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    Register,
    GuestUpload { slug: String },
    Live { slug: String },
    /// `rest` is the sub-path below `/dashboard`, without a leading slash.
    Dashboard { rest: String },
    Admin { rest: String },
}

/// Who is looking at a route. A signed-in user may not have a profile row yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    Authenticated(Option<Role>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow,
    Redirect(Route),
}

impl Route {
    /// Parse a hash path such as `#/live/AB12CD` or `/dashboard/events`.
    /// Query strings are ignored. Unknown paths yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let path = raw.trim().trim_start_matches('#');
        let path = path.split(['?', '#']).next().unwrap_or("");
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Some(Self::Landing),
            ["login"] => Some(Self::Login),
            ["register"] => Some(Self::Register),
            ["evento", slug] => Some(Self::GuestUpload {
                slug: (*slug).to_string(),
            }),
            ["live", slug] => Some(Self::Live {
                slug: (*slug).to_string(),
            }),
            ["dashboard", rest @ ..] => Some(Self::Dashboard { rest: rest.join("/") }),
            ["admin", rest @ ..] => Some(Self::Admin { rest: rest.join("/") }),
            _ => None,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Self::Landing => "/".to_string(),
            Self::Login => "/login".to_string(),
            Self::Register => "/register".to_string(),
            Self::GuestUpload { slug } => format!("/evento/{}", slug),
            Self::Live { slug } => format!("/live/{}", slug),
            Self::Dashboard { rest } if rest.is_empty() => "/dashboard".to_string(),
            Self::Dashboard { rest } => format!("/dashboard/{}", rest),
            Self::Admin { rest } if rest.is_empty() => "/admin".to_string(),
            Self::Admin { rest } => format!("/admin/{}", rest),
        }
    }

    pub fn required_role(&self) -> Option<Role> {
        match self {
            Self::Dashboard { .. } => Some(Role::Organizer),
            Self::Admin { .. } => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Landing page for a role after sign-in or a refused navigation.
pub fn home_for(role: Option<Role>) -> Route {
    match role {
        Some(Role::Admin) => Route::Admin {
            rest: String::new(),
        },
        Some(Role::Organizer) => Route::Dashboard {
            rest: String::new(),
        },
        _ => Route::Landing,
    }
}

pub fn guard(route: &Route, viewer: Viewer) -> Access {
    let Some(required) = route.required_role() else {
        return Access::Allow;
    };
    match viewer {
        Viewer::Anonymous => Access::Redirect(Route::Login),
        Viewer::Authenticated(Some(role)) if role == required => Access::Allow,
        Viewer::Authenticated(role) => Access::Redirect(home_for(role)),
    }
}
