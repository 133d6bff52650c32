//! Host probes used by parameter defaults.

use std::path::Path;

pub const IS_WIN32: bool = cfg!(target_os = "windows");
pub const IS_32BITS: bool = cfg!(target_pointer_width = "32");

/// Default worker count: logical CPUs, at least one.
pub fn default_num_threads() -> i64 {
    num_cpus::get().max(1) as i64
}

/// Whether the process was started under a profiler that announces itself
/// through `VS_PROFILER`.
pub fn running_under_profiler() -> bool {
    std::env::var_os("VS_PROFILER").is_some()
}

/// Whether the OS supports AVX, regardless of the CPU.
///
/// A CPU may advertise AVX while an old kernel cannot save the extended
/// register state, so on x86 Linux `/proc/cpuinfo` is the authority. Other
/// platforms, or a missing `/proc`, count as supported.
pub fn os_supports_avx() -> bool {
    if !(cfg!(target_os = "linux") && cfg!(any(target_arch = "x86", target_arch = "x86_64"))) {
        return true;
    }
    match std::fs::read_to_string(Path::new("/proc/cpuinfo")) {
        Ok(cpuinfo) => cpuinfo_has_avx(&cpuinfo),
        Err(_) => true,
    }
}

fn cpuinfo_has_avx(cpuinfo: &str) -> bool {
    cpuinfo.lines().any(|line| {
        let (head, body) = line.split_once(':').unwrap_or((line, ""));
        head.trim() == "flags" && body.split_whitespace().any(|flag| flag == "avx")
    })
}

/// Whether the host CPU itself reports AVX.
pub fn cpu_has_avx() -> bool {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        std::arch::is_x86_feature_detected!("avx")
    }
    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    {
        false
    }
}

/// Default for `ENABLE_AVX`.
pub fn default_enable_avx() -> bool {
    os_supports_avx() && cpu_has_avx()
}
