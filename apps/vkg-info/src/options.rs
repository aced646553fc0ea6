//! Command line options.

use std::path::PathBuf;
use vkg_loader::vk;

/// Options parsed from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Explicit loader library; `None` uses the environment or the defaults.
    pub library: Option<PathBuf>,
    /// Requested instance API version.
    pub api_version: u32,
    /// Report device API versions clamped to what the instance got.
    pub effective_version: bool,
    /// Enable the validation layer.
    pub validation: bool,
    /// Skip device creation and the fence check.
    pub skip_device: bool,
    /// Timeout for the unsignaled fence wait, in milliseconds.
    pub fence_timeout_ms: u64,
    pub help: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            library: None,
            api_version: vk::API_VERSION_1_3,
            effective_version: false,
            validation: false,
            skip_device: false,
            fence_timeout_ms: 10,
            help: false,
        }
    }
}

/// Parses `major.minor` into a packed API version.
pub fn parse_api_version(value: &str) -> Option<u32> {
    let (major, minor) = value.split_once('.')?;
    Some(vk::make_api_version(0, major.parse().ok()?, minor.parse().ok()?, 0))
}

impl Options {
    /// Parse options from the process arguments.
    pub fn from_args() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    /// Parse options from `args` (without the program name).
    ///
    /// Unknown flags and unparsable values are reported and ignored.
    pub fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut options = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => options.help = true,
                "-l" | "--library" => {
                    if let Some(path) = args.next() {
                        options.library = Some(PathBuf::from(path));
                    }
                }
                "-a" | "--api-version" => match args.next().as_deref().and_then(parse_api_version) {
                    Some(version) => options.api_version = version,
                    None => tracing::warn!("--api-version expects MAJOR.MINOR"),
                },
                "-e" | "--effective-version" => options.effective_version = true,
                "--validation" => options.validation = true,
                "--no-device" => options.skip_device = true,
                "-t" | "--fence-timeout-ms" => match args.next().map(|v| v.parse()) {
                    Some(Ok(ms)) => options.fence_timeout_ms = ms,
                    _ => tracing::warn!("--fence-timeout-ms expects a number of milliseconds"),
                },
                other => tracing::warn!("Ignoring unknown argument {}", other),
            }
        }

        options
    }
}
