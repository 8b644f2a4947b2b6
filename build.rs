use std::env;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rustc-check-cfg=cfg(h5_have_parallel)");
    println!("cargo:rustc-check-cfg=cfg(hdf5_1_12_0)");
    println!("cargo:rustc-check-cfg=cfg(hdf5_1_14_0)");
    println!("cargo:rustc-check-cfg=cfg(hdf5_1_10_2)");
    for (key, _) in env::vars() {
        let key = match key.as_str() {
            "DEP_HDF5_HAVE_PARALLEL" => "h5_have_parallel".into(),
            key if key.starts_with("DEP_HDF5_VERSION_") => {
                let version = key.trim_start_matches("DEP_HDF5_VERSION_");
                format!("hdf5_{}", version)
            }
            _ => continue,
        };
        println!("cargo:rustc-cfg={}", key);
    }
}
