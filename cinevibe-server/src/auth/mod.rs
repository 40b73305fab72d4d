//! Authentication: password hashing, bearer tokens and role guards

pub mod bootstrap;
pub mod extract;
pub mod jwt;
pub mod password;

pub use bootstrap::{ensure_admin, AdminSeed};
pub use extract::{identity_middleware, AdminUser, AuthUser, CriticUser, ValidatedJson};
pub use jwt::{Claims, JwtKeys};
pub use password::{hash_password, verify_password};
