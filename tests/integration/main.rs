//! Integration tests against a mocked whoami endpoint.

mod session_lifecycle;
mod whoami_fetch;
