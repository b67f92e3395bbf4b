//! Utility macros shared by the value objects of this crate.

/// A macro for early returns with an error if a condition is not met.
///
/// This is similar to the `assert!` macro, but returns an error instead of panicking.
/// Every validator in this crate is written with it, so a violation fails at the
/// point where it is detected.
///
/// # Example
///
/// ```ignore
/// ensure!(!name.is_empty(), MessageError::invalid_header_name(name));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
