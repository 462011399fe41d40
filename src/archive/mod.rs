//! Bundled archive support
//!
//! Parses the archive-mounted streaming path form and exposes the index and
//! the lock-bracketed reader.

pub mod index;
pub mod reader;

pub use index::{ArchiveEntry, ArchiveIndex};
pub use reader::MountedArchive;

/// Scheme marking a streaming path as `<scheme><archive>!/<filter>`
pub const ARCHIVE_SCHEME: &str = "jar:file://";

const FILTER_SEPARATOR: &str = "!/";

/// Split an archive-mounted streaming path into archive path and inner
/// filter. Returns `None` for a plain directory path.
pub fn parse_archive_path(streaming_path: &str) -> Option<(&str, &str)> {
    let rest = streaming_path.strip_prefix(ARCHIVE_SCHEME)?;
    let split = rest.rfind(FILTER_SEPARATOR)?;
    Some((&rest[..split], &rest[split + FILTER_SEPARATOR.len()..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_archive_path() {
        assert_eq!(
            parse_archive_path("jar:file://r.zip!/assets/"),
            Some(("r.zip", "assets/"))
        );
        assert_eq!(
            parse_archive_path("jar:file:///data/app/base.apk!/assets"),
            Some(("/data/app/base.apk", "assets"))
        );
        assert_eq!(parse_archive_path("jar:file://a!/b.zip!/x/"), Some(("a!/b.zip", "x/")));
        assert_eq!(parse_archive_path("jar:file://r.zip!/"), Some(("r.zip", "")));
    }

    #[test]
    fn test_plain_directory_is_not_an_archive() {
        assert_eq!(parse_archive_path("/var/mobile/app/Data/Raw/"), None);
        assert_eq!(parse_archive_path("jar:file://no-separator.zip"), None);
        assert_eq!(parse_archive_path(""), None);
    }
}
