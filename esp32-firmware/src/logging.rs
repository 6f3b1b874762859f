//! Wrappers around the `log` macros that prefix `[file:line]`, so firmware
//! output on the serial console points straight at its source.
//!
//! ```
//! info!("portal started");
//! // [src/portal.rs:42] portal started
//! ```

#[macro_export]
macro_rules! located {
    ($level:ident, $($arg:tt)*) => {
        ::log::$level!("[{}:{}] {}", file!(), line!(), format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => { $crate::located!(info, $($arg)*) };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => { $crate::located!(warn, $($arg)*) };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => { $crate::located!(error, $($arg)*) };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => { $crate::located!(debug, $($arg)*) };
}
