//! Well-known fact categories and stage names shared across crates.

/// Category written by the metadata stage: distro name, version, like-distro.
pub const CATEGORY_ANALYZER_META: &str = "analyzer_meta";

/// Category holding the Dockerfile supplied by the materializer, if any.
pub const CATEGORY_DOCKERFILE: &str = "dockerfile";

/// Category holding installed Ruby gems keyed by gemspec path.
pub const CATEGORY_GEMS: &str = "pkgs.gems";

/// Category holding setuid files keyed by path.
pub const CATEGORY_SUIDS: &str = "files.suids";

/// Keys inside `analyzer_meta`.
pub const META_DISTRO: &str = "DISTRO";
pub const META_DISTRO_VERSION: &str = "DISTROVERS";
pub const META_LIKE_DISTRO: &str = "LIKEDISTRO";

/// Placeholder used when the distro cannot be detected.
pub const UNKNOWN_DISTRO: &str = "Unknown";
pub const UNKNOWN_DISTRO_VERSION: &str = "0";

/// Length of a full image identifier in hex characters.
pub const IMAGE_ID_LEN: usize = 64;

/// Length of the short identifier shown in listings.
pub const SHORT_ID_LEN: usize = 12;
