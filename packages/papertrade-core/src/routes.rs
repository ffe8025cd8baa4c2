//! Views the client can navigate to and who may see them.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Dashboard,
    Trade,
    Portfolio,
    Transactions,
    Leaderboard,
    Profile,
    Admin,
}

impl Route {
    /// Landing view after login or registration.
    pub const AUTHENTICATED_LANDING: Route = Route::Dashboard;
    /// Landing view after logout.
    pub const ANONYMOUS_LANDING: Route = Route::Login;

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Dashboard => "/dashboard",
            Route::Trade => "/trade",
            Route::Portfolio => "/portfolio",
            Route::Transactions => "/transactions",
            Route::Leaderboard => "/leaderboard",
            Route::Profile => "/profile",
            Route::Admin => "/admin",
        }
    }

    pub fn requires_auth(&self) -> bool {
        !matches!(self, Route::Login | Route::Register)
    }

    pub fn requires_admin(&self) -> bool {
        matches!(self, Route::Admin)
    }

    /// The view actually shown when navigating here.
    pub fn guard(self, authenticated: bool, admin: bool) -> Route {
        if self.requires_auth() && !authenticated {
            return Route::ANONYMOUS_LANDING;
        }
        if !self.requires_auth() && authenticated {
            return Route::AUTHENTICATED_LANDING;
        }
        if self.requires_admin() && !admin {
            return Route::AUTHENTICATED_LANDING;
        }
        self
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
