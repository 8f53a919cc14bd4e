//! Assertion macros shared by integration tests.

/// Await a session future and panic with contextual diagnostics on failure.
#[macro_export]
macro_rules! rpc_expect {
    ($fut:expr) => {{
        $fut.await
            .expect(concat!("session operation failed at ", file!(), ":", line!()))
    }};
    ($fut:expr, $msg:expr) => {{
        let m = ::std::format!("{msg} at {}:{}", file!(), line!(), msg = $msg);
        $fut.await.expect(&m)
    }};
}

/// Await a session future that must fail and return its error.
#[macro_export]
macro_rules! rpc_expect_err {
    ($fut:expr) => {{
        $fut.await
            .expect_err(concat!("session operation succeeded at ", file!(), ":", line!()))
    }};
}

pub use crate::{rpc_expect, rpc_expect_err};
