//! Native result codes: names, classification and success checks.

use ash::vk;

/// Result of a call that reports failure as the bare native code.
///
/// This is the non-allocating convention: nothing on the error path touches
/// the heap, so it is usable from `Drop` and other teardown paths.
pub type VkResult<T> = std::result::Result<T, vk::Result>;

/// Identifier returned by [`result_to_str`] for codes it does not know.
pub const UNKNOWN_RESULT: &str = "VK_UNKNOWN_RESULT_CODE";

/// Broad category of a failure code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Host, device or pool memory exhausted.
    Resource,
    /// Driver, layer, extension, feature or format not available.
    Capability,
    /// The device stopped responding.
    Timing,
    /// Surface or swapchain state changed underneath the caller.
    Presentation,
    /// Invalid usage or a call made in the wrong lifecycle state.
    Validity,
    /// A code this crate has no specific knowledge of.
    Unrecognized,
}

macro_rules! result_codes {
    (
        non_errors {
            $( $ok:ident => $ok_name:literal, )*
        }
        errors {
            $( $kind:ident($code:ident) => $name:literal, $class:ident; )*
        }
    ) => {
        /// Returns the canonical `VK_*` identifier of `code`.
        ///
        /// Total over `i32`: codes added by later API versions map to
        /// [`UNKNOWN_RESULT`].
        pub fn result_to_str(code: vk::Result) -> &'static str {
            match code {
                $( vk::Result::$ok => $ok_name, )*
                $( vk::Result::$code => $name, )*
                _ => UNKNOWN_RESULT,
            }
        }

        /// Every code [`result_to_str`] has a name for.
        pub const KNOWN_RESULTS: &[vk::Result] = &[
            $( vk::Result::$ok, )*
            $( vk::Result::$code, )*
        ];

        /// Concrete kind of a failed call, one per native error code.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ErrorKind {
            $( $kind, )*
            /// Any code without a dedicated kind, carrying the raw value.
            Unrecognized(i32),
        }

        impl ErrorKind {
            /// Every dedicated kind, in declaration order.
            pub const ALL: &'static [ErrorKind] = &[ $( ErrorKind::$kind, )* ];

            /// Maps a code to its kind.
            ///
            /// Non-error codes have no kind of their own and land in
            /// [`ErrorKind::Unrecognized`] like any unknown value.
            pub fn from_code(code: vk::Result) -> Self {
                match code {
                    $( vk::Result::$code => Self::$kind, )*
                    other => Self::Unrecognized(other.as_raw()),
                }
            }

            /// The native code this kind stands for.
            pub fn code(self) -> vk::Result {
                match self {
                    $( Self::$kind => vk::Result::$code, )*
                    Self::Unrecognized(raw) => vk::Result::from_raw(raw),
                }
            }

            pub fn class(self) -> FailureClass {
                match self {
                    $( Self::$kind => FailureClass::$class, )*
                    Self::Unrecognized(_) => FailureClass::Unrecognized,
                }
            }
        }
    };
}

result_codes! {
    non_errors {
        SUCCESS => "VK_SUCCESS",
        NOT_READY => "VK_NOT_READY",
        TIMEOUT => "VK_TIMEOUT",
        EVENT_SET => "VK_EVENT_SET",
        EVENT_RESET => "VK_EVENT_RESET",
        INCOMPLETE => "VK_INCOMPLETE",
        SUBOPTIMAL_KHR => "VK_SUBOPTIMAL_KHR",
        THREAD_IDLE_KHR => "VK_THREAD_IDLE_KHR",
        THREAD_DONE_KHR => "VK_THREAD_DONE_KHR",
        OPERATION_DEFERRED_KHR => "VK_OPERATION_DEFERRED_KHR",
        OPERATION_NOT_DEFERRED_KHR => "VK_OPERATION_NOT_DEFERRED_KHR",
        PIPELINE_COMPILE_REQUIRED => "VK_PIPELINE_COMPILE_REQUIRED",
        INCOMPATIBLE_SHADER_BINARY_EXT => "VK_INCOMPATIBLE_SHADER_BINARY_EXT",
    }
    errors {
        OutOfHostMemory(ERROR_OUT_OF_HOST_MEMORY) => "VK_ERROR_OUT_OF_HOST_MEMORY", Resource;
        OutOfDeviceMemory(ERROR_OUT_OF_DEVICE_MEMORY) => "VK_ERROR_OUT_OF_DEVICE_MEMORY", Resource;
        InitializationFailed(ERROR_INITIALIZATION_FAILED) => "VK_ERROR_INITIALIZATION_FAILED", Validity;
        DeviceLost(ERROR_DEVICE_LOST) => "VK_ERROR_DEVICE_LOST", Timing;
        MemoryMapFailed(ERROR_MEMORY_MAP_FAILED) => "VK_ERROR_MEMORY_MAP_FAILED", Resource;
        LayerNotPresent(ERROR_LAYER_NOT_PRESENT) => "VK_ERROR_LAYER_NOT_PRESENT", Capability;
        ExtensionNotPresent(ERROR_EXTENSION_NOT_PRESENT) => "VK_ERROR_EXTENSION_NOT_PRESENT", Capability;
        FeatureNotPresent(ERROR_FEATURE_NOT_PRESENT) => "VK_ERROR_FEATURE_NOT_PRESENT", Capability;
        IncompatibleDriver(ERROR_INCOMPATIBLE_DRIVER) => "VK_ERROR_INCOMPATIBLE_DRIVER", Capability;
        TooManyObjects(ERROR_TOO_MANY_OBJECTS) => "VK_ERROR_TOO_MANY_OBJECTS", Resource;
        FormatNotSupported(ERROR_FORMAT_NOT_SUPPORTED) => "VK_ERROR_FORMAT_NOT_SUPPORTED", Capability;
        FragmentedPool(ERROR_FRAGMENTED_POOL) => "VK_ERROR_FRAGMENTED_POOL", Resource;
        Unknown(ERROR_UNKNOWN) => "VK_ERROR_UNKNOWN", Unrecognized;
        OutOfPoolMemory(ERROR_OUT_OF_POOL_MEMORY) => "VK_ERROR_OUT_OF_POOL_MEMORY", Resource;
        InvalidExternalHandle(ERROR_INVALID_EXTERNAL_HANDLE) => "VK_ERROR_INVALID_EXTERNAL_HANDLE", Validity;
        Fragmentation(ERROR_FRAGMENTATION) => "VK_ERROR_FRAGMENTATION", Resource;
        InvalidOpaqueCaptureAddress(ERROR_INVALID_OPAQUE_CAPTURE_ADDRESS) => "VK_ERROR_INVALID_OPAQUE_CAPTURE_ADDRESS", Validity;
        SurfaceLost(ERROR_SURFACE_LOST_KHR) => "VK_ERROR_SURFACE_LOST_KHR", Presentation;
        NativeWindowInUse(ERROR_NATIVE_WINDOW_IN_USE_KHR) => "VK_ERROR_NATIVE_WINDOW_IN_USE_KHR", Presentation;
        OutOfDate(ERROR_OUT_OF_DATE_KHR) => "VK_ERROR_OUT_OF_DATE_KHR", Presentation;
        IncompatibleDisplay(ERROR_INCOMPATIBLE_DISPLAY_KHR) => "VK_ERROR_INCOMPATIBLE_DISPLAY_KHR", Presentation;
        ValidationFailed(ERROR_VALIDATION_FAILED_EXT) => "VK_ERROR_VALIDATION_FAILED_EXT", Validity;
        InvalidShader(ERROR_INVALID_SHADER_NV) => "VK_ERROR_INVALID_SHADER_NV", Validity;
        ImageUsageNotSupported(ERROR_IMAGE_USAGE_NOT_SUPPORTED_KHR) => "VK_ERROR_IMAGE_USAGE_NOT_SUPPORTED_KHR", Capability;
        VideoPictureLayoutNotSupported(ERROR_VIDEO_PICTURE_LAYOUT_NOT_SUPPORTED_KHR) => "VK_ERROR_VIDEO_PICTURE_LAYOUT_NOT_SUPPORTED_KHR", Capability;
        VideoProfileOperationNotSupported(ERROR_VIDEO_PROFILE_OPERATION_NOT_SUPPORTED_KHR) => "VK_ERROR_VIDEO_PROFILE_OPERATION_NOT_SUPPORTED_KHR", Capability;
        VideoProfileFormatNotSupported(ERROR_VIDEO_PROFILE_FORMAT_NOT_SUPPORTED_KHR) => "VK_ERROR_VIDEO_PROFILE_FORMAT_NOT_SUPPORTED_KHR", Capability;
        VideoProfileCodecNotSupported(ERROR_VIDEO_PROFILE_CODEC_NOT_SUPPORTED_KHR) => "VK_ERROR_VIDEO_PROFILE_CODEC_NOT_SUPPORTED_KHR", Capability;
        VideoStdVersionNotSupported(ERROR_VIDEO_STD_VERSION_NOT_SUPPORTED_KHR) => "VK_ERROR_VIDEO_STD_VERSION_NOT_SUPPORTED_KHR", Capability;
        InvalidDrmFormatModifierPlaneLayout(ERROR_INVALID_DRM_FORMAT_MODIFIER_PLANE_LAYOUT_EXT) => "VK_ERROR_INVALID_DRM_FORMAT_MODIFIER_PLANE_LAYOUT_EXT", Validity;
        NotPermitted(ERROR_NOT_PERMITTED_KHR) => "VK_ERROR_NOT_PERMITTED_KHR", Capability;
        FullScreenExclusiveModeLost(ERROR_FULL_SCREEN_EXCLUSIVE_MODE_LOST_EXT) => "VK_ERROR_FULL_SCREEN_EXCLUSIVE_MODE_LOST_EXT", Presentation;
        InvalidVideoStdParameters(ERROR_INVALID_VIDEO_STD_PARAMETERS_KHR) => "VK_ERROR_INVALID_VIDEO_STD_PARAMETERS_KHR", Validity;
        CompressionExhausted(ERROR_COMPRESSION_EXHAUSTED_EXT) => "VK_ERROR_COMPRESSION_EXHAUSTED_EXT", Resource;
    }
}

/// Three-way view of a native code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Exactly `VK_SUCCESS`.
    Success,
    /// Non-negative but not `VK_SUCCESS` (timeout, incomplete, not ready, ...).
    /// Callers have to branch on it.
    Informational(vk::Result),
    /// Negative code.
    Failure(ErrorKind),
}

/// Classifies a native code.
pub fn classify(code: vk::Result) -> Status {
    match code.as_raw() {
        0 => Status::Success,
        raw if raw > 0 => Status::Informational(code),
        _ => Status::Failure(ErrorKind::from_code(code)),
    }
}

/// Returns true for success and informational codes.
#[inline]
pub fn is_non_negative(code: vk::Result) -> bool {
    code.as_raw() >= 0
}

/// Accepts only `VK_SUCCESS`.
#[inline]
pub fn check_success(code: vk::Result) -> VkResult<()> {
    if code == vk::Result::SUCCESS {
        Ok(())
    } else {
        Err(code)
    }
}

/// Accepts any non-negative code and hands it back for the caller to inspect.
///
/// Used where informational results such as `VK_TIMEOUT` or `VK_INCOMPLETE`
/// are legitimate outcomes rather than failures.
#[inline]
pub fn check_non_negative(code: vk::Result) -> VkResult<vk::Result> {
    if is_non_negative(code) {
        Ok(code)
    } else {
        Err(code)
    }
}

/// Formats a packed API version as `major.minor.patch`.
pub fn version_to_string(version: u32) -> String {
    format!(
        "{}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    )
}
