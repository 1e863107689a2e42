//! Internal helper macros.

/// Early-return with an error when a condition does not hold.
///
/// Like `assert!`, but produces an `Err` instead of panicking, which keeps
/// validation checks in the codecs on one line.
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;
