// Security primitives
// Password hashing and token signing, each behind a trait so handlers
// can be given test doubles.

pub mod jwt;
pub mod password;

pub use jwt::{Claims, JwtIssuer, TokenIssuer};
pub use password::{Argon2Hasher, PasswordHasher};
