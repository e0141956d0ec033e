//! API constants

/// Versioned prefix every document and scanner route is nested under.
pub const API_PREFIX: &str = "/api/v0";

/// Trusted gateway header carrying the authenticated actor id.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Trusted gateway header carrying the authenticated actor role.
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
