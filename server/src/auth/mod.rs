//! HTTP Basic authentication against an htpasswd credential file.

pub mod htpasswd;
pub mod middleware;
