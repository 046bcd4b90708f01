/// The Image Studio version.
///
/// In development builds, this defaults to the workspace Cargo package version. Release builds
/// may inject a tag version through the `IMAGE_STUDIO_VERSION` environment variable at build
/// time.
pub const IMAGE_STUDIO_VERSION: &str = match option_env!("IMAGE_STUDIO_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};
