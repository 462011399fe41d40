//! Path validation
//!
//! Name classification shared by the resolver and the existence checks.

/// Whether `name` is used verbatim instead of under the persistent root:
/// a leading separator, or a drive letter followed by a colon.
pub fn is_absolute_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    match bytes {
        [b'/' | b'\\', ..] => true,
        [drive, b':', ..] => drive.is_ascii_alphabetic(),
        _ => false,
    }
}

/// Reject names the layer can never resolve
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('\0')
}
