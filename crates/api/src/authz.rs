//! Route authorization.
//!
//! Token validation happens at the external gateway, which forwards the
//! caller's role in the `x-user-role` header. Here each request is matched
//! once against [`ROUTE_POLICIES`], a table of (method, path prefix) to the
//! capability the route needs, and the role's capability set decides.

use std::str::FromStr;

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;

pub const ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    PlaceOrder,
    ReadOrders,
    CancelOrder,
    /// Drive payment and fulfilment status directly.
    ManageOrders,
    ReadSagas,
    Pay,
    ManageStock,
    ManageCarts,
    Reconcile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
    /// Other backend services.
    Service,
}

impl Role {
    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Role::Customer => &[PlaceOrder, ReadOrders, CancelOrder, Pay],
            Role::Admin => &[
                PlaceOrder,
                ReadOrders,
                CancelOrder,
                ManageOrders,
                ReadSagas,
                Pay,
                ManageStock,
                ManageCarts,
                Reconcile,
            ],
            Role::Service => &[
                ReadOrders,
                ManageOrders,
                ReadSagas,
                ManageStock,
                ManageCarts,
                Reconcile,
            ],
        }
    }

    pub fn grants(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "ROLE_CUSTOMER" => Ok(Role::Customer),
            "ROLE_ADMIN" => Ok(Role::Admin),
            "ROLE_SERVICE" => Ok(Role::Service),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodFilter {
    Any,
    Get,
    Post,
    Put,
}

impl MethodFilter {
    fn matches(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Get => *method == Method::GET,
            MethodFilter::Post => *method == Method::POST,
            MethodFilter::Put => *method == Method::PUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Any recognised role.
    Authenticated,
    Requires(Capability),
}

#[derive(Debug, Clone, Copy)]
pub struct RoutePolicy {
    pub method: MethodFilter,
    pub prefix: &'static str,
    pub access: Access,
}

const fn policy(method: MethodFilter, prefix: &'static str, access: Access) -> RoutePolicy {
    RoutePolicy {
        method,
        prefix,
        access,
    }
}

/// First match wins, so narrower prefixes come first.
pub static ROUTE_POLICIES: &[RoutePolicy] = &[
    policy(MethodFilter::Get, "/health", Access::Public),
    policy(MethodFilter::Get, "/metrics", Access::Public),
    policy(
        MethodFilter::Post,
        "/api/orders/place",
        Access::Requires(Capability::PlaceOrder),
    ),
    policy(
        MethodFilter::Put,
        "/api/orders/cancel",
        Access::Requires(Capability::CancelOrder),
    ),
    policy(
        MethodFilter::Get,
        "/api/orders/sagas",
        Access::Requires(Capability::ReadSagas),
    ),
    policy(
        MethodFilter::Put,
        "/api/orders",
        Access::Requires(Capability::ManageOrders),
    ),
    policy(
        MethodFilter::Get,
        "/api/orders",
        Access::Requires(Capability::ReadOrders),
    ),
    policy(
        MethodFilter::Post,
        "/api/payment",
        Access::Requires(Capability::Pay),
    ),
    policy(
        MethodFilter::Post,
        "/internal/reconcile",
        Access::Requires(Capability::Reconcile),
    ),
    policy(
        MethodFilter::Any,
        "/internal/carts",
        Access::Requires(Capability::ManageCarts),
    ),
    policy(
        MethodFilter::Any,
        "/internal/products",
        Access::Requires(Capability::ManageStock),
    ),
];

/// `prefix` matches whole path segments only.
fn path_matches(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Access rule for a request. Routes outside the table need a role.
pub fn required_access(method: &Method, path: &str) -> Access {
    ROUTE_POLICIES
        .iter()
        .find(|p| p.method.matches(method) && path_matches(p.prefix, path))
        .map(|p| p.access)
        .unwrap_or(Access::Authenticated)
}

pub fn check(method: &Method, path: &str, role: Option<&str>) -> Result<(), ApiError> {
    let access = required_access(method, path);
    if access == Access::Public {
        return Ok(());
    }

    let role: Role = role
        .ok_or(ApiError::Unauthorized)?
        .parse()
        .map_err(ApiError::Forbidden)?;

    match access {
        Access::Requires(capability) if !role.grants(capability) => Err(ApiError::Forbidden(
            format!("{role:?} may not {method} {path}"),
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AuthzConfig {
    pub enabled: bool,
}

/// Middleware evaluating [`check`] once per request.
pub async fn authorize(
    State(config): State<AuthzConfig>,
    request: Request,
    next: Next,
) -> Response {
    if config.enabled {
        let role = request
            .headers()
            .get(ROLE_HEADER)
            .and_then(|v| v.to_str().ok());
        if let Err(err) = check(request.method(), request.uri().path(), role) {
            return err.into_response();
        }
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_routes() {
        assert!(check(&Method::GET, "/health", None).is_ok());
        assert!(check(&Method::GET, "/metrics", None).is_ok());
        assert!(matches!(
            check(&Method::GET, "/healthz", None),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn test_customer_capabilities() {
        let customer = Some("ROLE_CUSTOMER");
        assert!(check(&Method::POST, "/api/orders/place/1", customer).is_ok());
        assert!(check(&Method::GET, "/api/orders/user/1", customer).is_ok());
        assert!(check(&Method::PUT, "/api/orders/cancel/x", customer).is_ok());
        assert!(check(&Method::POST, "/api/payment/verify", customer).is_ok());

        assert!(matches!(
            check(&Method::PUT, "/api/orders/x/payment-status", customer),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            check(&Method::POST, "/internal/reconcile", customer),
            Err(ApiError::Forbidden(_))
        ));
        assert!(check(&Method::GET, "/api/orders/sagas/x", customer).is_err());
    }

    #[test]
    fn test_service_and_admin() {
        let service = Some("ROLE_SERVICE");
        assert!(check(&Method::PUT, "/api/orders/x/status", service).is_ok());
        assert!(check(&Method::POST, "/internal/products/10/reserve", service).is_ok());
        assert!(check(&Method::POST, "/api/orders/place/1", service).is_err());

        for (method, path) in [
            (Method::POST, "/api/orders/place/1"),
            (Method::PUT, "/api/orders/x/payment-status"),
            (Method::POST, "/internal/reconcile"),
        ] {
            assert!(check(&method, path, Some("ROLE_ADMIN")).is_ok());
        }
    }

    #[test]
    fn test_missing_and_unknown_roles() {
        assert!(matches!(
            check(&Method::GET, "/api/orders/x", None),
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            check(&Method::GET, "/api/orders/x", Some("ROLE_GUEST")),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_narrow_prefix_wins() {
        assert_eq!(
            required_access(&Method::PUT, "/api/orders/cancel/x"),
            Access::Requires(Capability::CancelOrder)
        );
        assert_eq!(
            required_access(&Method::PUT, "/api/orders/x/status"),
            Access::Requires(Capability::ManageOrders)
        );
    }
}
