//! Pure, deterministic filename → resource metadata mapping.
//! `spec.md` §3/§4.1.

use std::path::Path;

/// Metadata derived purely from a filename: `name.prop1.prop2...ext`
/// splits into `resource_name = name`, `resource_type = ext`,
/// `properties = [prop1, prop2, ...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePathMetadata {
    pub resource_name: String,
    pub resource_type: String,
    pub properties: Vec<String>,
}

/// Parses the basename of `path` into [`ResourcePathMetadata`].
///
/// The split is on the first and last `.` in the basename: everything
/// before the first dot is `resource_name`, everything after the last
/// dot is `resource_type`, and the dot-separated segments in between are
/// `properties`. A basename with exactly one dot yields
/// `properties = [""]` (a single empty string), and a basename with no
/// dot at all yields an empty `resource_type` and no properties.
pub fn parse(path: &str) -> ResourcePathMetadata {
    let basename = Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path);

    let first_dot = basename.find('.');
    let Some(first_dot) = first_dot else {
        return ResourcePathMetadata {
            resource_name: basename.to_owned(),
            resource_type: String::new(),
            properties: vec![],
        };
    };
    let last_dot = basename.rfind('.').unwrap();

    let resource_name = basename[..first_dot].to_owned();
    let resource_type = basename[last_dot + 1..].to_owned();

    let properties = if first_dot == last_dot {
        vec![String::new()]
    } else {
        basename[first_dot + 1..last_dot]
            .split('.')
            .map(str::to_owned)
            .collect()
    };

    ResourcePathMetadata {
        resource_name,
        resource_type,
        properties,
    }
}

/// The reserved platform name used when a resource carries no platform
/// property, or when a target's platform segment is absent on disk.
pub const GENERIC_PLATFORM: &str = "generic";

/// Scans `properties` for a match against any of `known_platforms`,
/// returning [`GENERIC_PLATFORM`] if none match.
pub fn derive_platform<'a>(properties: &[String], known_platforms: &[&'a str]) -> String {
    for property in properties {
        if known_platforms.iter().any(|p| p == property) {
            return (*property).to_owned();
        }
    }
    GENERIC_PLATFORM.to_owned()
}
