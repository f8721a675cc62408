use candle_core::Device;
use tracing::info;

/// Metal when built with the `metal` feature and a GPU is present, else CPU.
/// `APP_FORCE_CPU=1` skips accelerator probing, which keeps embeddings
/// bit-identical across machines sharing one cache.
pub fn select_device() -> Device {
    if force_cpu() {
        info!("APP_FORCE_CPU set, running models on CPU");
        return Device::Cpu;
    }
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(dev) => { info!("model device: Metal"); return dev; }
            Err(e) => tracing::warn!(error = %e, "Metal unavailable, falling back to CPU"),
        }
    }
    info!("model device: CPU");
    Device::Cpu
}

fn force_cpu() -> bool {
    std::env::var("APP_FORCE_CPU").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}
