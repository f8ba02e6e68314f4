fn main() {
    // Resolve the M-profile architecture from the target triple, the same way
    // the capture routine's build-time profile is fixed once per binary.
    //
    //   thumbv6m-*        -> armv6m
    //   thumbv7m-*        -> armv7m
    //   thumbv7em-*       -> armv7m   (DSP/FPU variants share the fault model)
    //   thumbv8m.base-*   -> armv8m_base
    //   thumbv8m.main-*   -> armv8m_main (promoted to 8.1-M by `armv8_1m`)
    //   anything else     -> armv7m   (host builds model a Cortex-M4/M7,
    //                                     or a Cortex-M33 when TrustZone or
    //                                     8.1-M features are requested)
    let target = std::env::var("TARGET").unwrap_or_default();
    let wants_v8 = std::env::var_os("CARGO_FEATURE_TRUSTZONE").is_some()
        || std::env::var_os("CARGO_FEATURE_ARMV8_1M").is_some();

    let arch = if target.starts_with("thumbv6m") {
        "armv6m"
    } else if target.starts_with("thumbv8m.base") {
        "armv8m_base"
    } else if target.starts_with("thumbv8m.main") {
        "armv8m_main"
    } else if !target.starts_with("thumb") && wants_v8 {
        "armv8m_main"
    } else {
        "armv7m"
    };

    println!("cargo:rustc-check-cfg=cfg(fault_arch, values(\"armv6m\", \"armv7m\", \"armv8m_base\", \"armv8m_main\"))");
    println!("cargo:rustc-cfg=fault_arch=\"{arch}\"");
    println!("cargo:rerun-if-changed=build.rs");
}
