//! vkg-info
//!
//! Loads the Vulkan library, creates an instance and reports what the
//! runtime exposes: instance version, layers, extensions, physical devices
//! and their queue families. Unless told otherwise it also creates a device
//! on the first GPU and checks that waiting on an unsignaled fence times out.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p vkg-info -- [OPTIONS]
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)
//! - `VKG_VULKAN_LIBRARY`: Vulkan library to load when `--library` is not given

mod options;

use anyhow::{bail, Context};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use vkg_loader::{
    result_to_str, timeout_ns, version_to_string, vk, ApiVersionReport, ApplicationConfig,
    DeviceConfig, DeviceInfo, InstanceConfig, Vkg,
};

use crate::options::Options;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let options = Options::from_args();
    if options.help {
        print_help();
        return Ok(());
    }

    let mut vkg = Vkg::new();
    unsafe { vkg.load(options.library.as_deref()) }.context("Failed to load Vulkan")?;

    if let Some(library) = vkg.library() {
        println!("Library:          {}", library.origin());
    }
    println!(
        "Instance version: {}",
        version_to_string(vkg.enumerate_instance_version()?)
    );

    print_layers(&vkg)?;
    print_instance_extensions(&vkg)?;

    let application = ApplicationConfig::new("vkg-info").with_api_version(options.api_version);
    let instance_config = InstanceConfig::new(application).with_validation(options.validation);
    let downgraded = vkg
        .init_instance_with_fallback_from(&instance_config)
        .context("Failed to create a Vulkan instance")?;
    if downgraded {
        println!(
            "Requested Vulkan {} was rejected, running with 1.0",
            version_to_string(options.api_version)
        );
    }

    let report = if options.effective_version {
        ApiVersionReport::Effective
    } else {
        ApiVersionReport::Driver
    };

    let physical_devices = vkg.enumerate_physical_devices()?;
    if physical_devices.is_empty() {
        bail!("No Vulkan physical devices found");
    }

    let mut devices = Vec::with_capacity(physical_devices.len());
    for (index, &physical_device) in physical_devices.iter().enumerate() {
        let info = unsafe { DeviceInfo::query(&vkg, physical_device, report) }?;
        print_device(index, &info);
        devices.push(info);
    }

    if !options.skip_device {
        check_fence_timeout(&mut vkg, &devices[0], options.fence_timeout_ms)?;
    }

    vkg.clean_up();
    Ok(())
}

fn print_layers(vkg: &Vkg) -> anyhow::Result<()> {
    let layers = vkg.enumerate_instance_layer_properties()?;
    println!("Layers ({}):", layers.len());
    for layer in &layers {
        let name = layer.layer_name_as_c_str().unwrap_or_default();
        println!(
            "    {} (Vulkan {})",
            name.to_string_lossy(),
            version_to_string(layer.spec_version)
        );
    }
    Ok(())
}

fn print_instance_extensions(vkg: &Vkg) -> anyhow::Result<()> {
    let extensions = vkg.enumerate_instance_extension_properties(None)?;
    println!("Instance extensions ({}):", extensions.len());
    for extension in &extensions {
        let name = extension.extension_name_as_c_str().unwrap_or_default();
        println!("    {} v{}", name.to_string_lossy(), extension.spec_version);
    }
    Ok(())
}

fn print_device(index: usize, info: &DeviceInfo) {
    println!("GPU {index}: {}", info.summary());
    println!("    Driver version: {:#x}", info.driver_version);
    println!("    Queue families ({}):", info.queue_families.len());
    for (family_index, family) in info.queue_families.iter().enumerate() {
        println!(
            "        {family_index}: {:?} x{}",
            family.queue_flags, family.queue_count
        );
    }

    let mut extensions: Vec<_> = info.extensions.iter().collect();
    extensions.sort();
    println!("    Device extensions ({}):", extensions.len());
    for extension in extensions {
        println!("        {extension}");
    }
}

fn check_fence_timeout(vkg: &mut Vkg, info: &DeviceInfo, timeout_ms: u64) -> anyhow::Result<()> {
    let family = info
        .find_queue_family(vk::QueueFlags::COMPUTE)
        .or_else(|| info.find_queue_family(vk::QueueFlags::TRANSFER))
        .context("GPU has no compute or transfer queue")?;

    let config = DeviceConfig::new().with_queue(family, 1);
    unsafe { vkg.init_device_from(info.physical_device, &config) }
        .with_context(|| format!("Failed to create a device on {}", info.device_name))?;

    let fence = vkg.create_fence(false)?;
    let timeout = Duration::from_millis(timeout_ms);
    let start = Instant::now();
    let result = unsafe { vkg.wait_for_fences(&[fence.get()], true, timeout_ns(timeout)) }?;
    println!(
        "Fence wait on {}: {} after {:?}",
        info.device_name,
        result_to_str(result),
        start.elapsed()
    );

    drop(fence);
    vkg.destroy_device();
    Ok(())
}

fn print_help() {
    eprintln!(
        "vkg-info: report what the Vulkan runtime exposes

USAGE:
    cargo run -p vkg-info -- [OPTIONS]

OPTIONS:
    -l, --library <PATH>         Vulkan library to load
                                 Default: $VKG_VULKAN_LIBRARY, then the platform loader
    -a, --api-version <M.N>      Requested instance API version (default: 1.3)
    -e, --effective-version      Report device API versions clamped to the
                                 version the instance was created with
    --validation                 Enable VK_LAYER_KHRONOS_validation
    --no-device                  Skip device creation and the fence check
    -t, --fence-timeout-ms <MS>  Timeout of the unsignaled fence wait (default: 10)
    -h, --help                   Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                     Set log level (e.g., info, debug, trace)
    VKG_VULKAN_LIBRARY           Vulkan library to load"
    );
}
