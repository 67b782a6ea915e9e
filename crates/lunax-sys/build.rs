use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=LUNAX_LUA_LIB_DIR");
    println!("cargo:rerun-if-env-changed=LUNAX_LUA_LIB_NAME");

    if env::var_os("CARGO_FEATURE_SYSTEM_LUA").is_some() {
        configure_system();
    } else {
        configure_vendored();
    }
}

fn configure_vendored() {
    let artifacts = lua_src::Build::new().build(lua_src::Lua51);
    artifacts.print_cargo_metadata();
}

fn configure_system() {
    if let Ok(dir) = env::var("LUNAX_LUA_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", dir);
    }

    // Debian and Fedora ship 5.1 as liblua5.1, other distributions as liblua
    let name = env::var("LUNAX_LUA_LIB_NAME").unwrap_or_else(|_| "lua5.1".to_string());
    println!("cargo:rustc-link-lib={}", name);

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os == "linux" {
        println!("cargo:rustc-link-lib=m");
        println!("cargo:rustc-link-lib=dl");
    }
}
