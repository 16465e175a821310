//! Working with C strings.

/// Convenient macro for creating a literal C string.
///
/// This macro automatically appends the terminating nul.
#[macro_export]
macro_rules! cstr
{
    ($lit:expr) => {
        ::std::ffi::CStr::from_bytes_with_nul(
            ::std::concat!($lit, "\0").as_bytes()
        ).unwrap()
    };
}
