/// Authentication utilities
///
/// - `password`: Argon2id password hashing and strength validation
/// - `jwt`: JWT creation and validation (access + refresh tokens)

pub mod jwt;
pub mod password;
