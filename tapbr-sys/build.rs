use std::path::PathBuf;

fn main() {
    // Rebuild if wrapper files change
    println!("cargo:rerun-if-changed=include/wrapper.h");
    println!("cargo:rerun-if-changed=src/wrapper.c");
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");
    println!("cargo::rustc-check-cfg=cfg(tapbr_dpdk)");

    // Use pkg-config to find DPDK. Without it only the declarations are
    // built; anything calling into them fails at link time.
    let lib = match pkg_config::Config::new()
        .atleast_version("22.11.0")
        .probe("libdpdk")
    {
        Ok(lib) => lib,
        Err(e) => {
            println!("cargo:warning=libdpdk not found via pkg-config, DPDK shim not built: {e}");
            return;
        }
    };

    compile_wrapper(&lib.include_paths);
    println!("cargo:rustc-cfg=tapbr_dpdk");
}

fn compile_wrapper(include_dirs: &[PathBuf]) {
    // Compile wrapper.c with cc
    let mut cc_builder = cc::Build::new();
    cc_builder.file("src/wrapper.c");
    cc_builder.include("include"); // For wrapper.h
    for path in include_dirs {
        cc_builder.include(path);
    }
    // Use corei7/Nehalem for QEMU software emulation compatibility
    // This matches DPDK's cpu_instruction_set=generic setting
    cc_builder.flag_if_supported("-march=corei7");
    cc_builder.compile("dpdk_wrapper");
}
