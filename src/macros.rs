/// Returns early with an error of the given kind, formatting the message.
macro_rules! fail {
    ($kind:ident: $fmt:expr) => (
        return Err($crate::error::Error::$kind(format!($fmt)))
    );
    ($kind:ident: $fmt:expr, $($arg:tt)*) => (
        return Err($crate::error::Error::$kind(format!($fmt, $($arg)*)))
    );
}

/// Returns early with an error of the given kind unless `$expr` holds.
macro_rules! ensure {
    ($expr:expr, $kind:ident: $fmt:expr) => (
        if !($expr) {
            fail!($kind: $fmt);
        }
    );
    ($expr:expr, $kind:ident: $fmt:expr, $($arg:tt)*) => (
        if !($expr) {
            fail!($kind: $fmt, $($arg)*);
        }
    );
}

/// Run an unsafe expression in a closure synchronized by the library-wide reentrant mutex.
macro_rules! h5lock {
    ($expr:expr) => {{
        #[allow(clippy::redundant_closure_call, unused_unsafe)]
        hdf5::sync::sync(|| unsafe { $expr })
    }};
}

/// Run a raw HDF5 call under the library lock; a failing return code is turned into an
/// `hdf5::Error` carrying the library's error stack.
macro_rules! h5call {
    ($expr:expr) => {
        h5lock!(hdf5::h5check($expr))
    };
}
