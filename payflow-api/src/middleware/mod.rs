/// Cross-cutting HTTP middleware
///
/// - `security`: response security headers

pub mod security;
