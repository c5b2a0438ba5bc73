fn main() {
    println!("cargo:rerun-if-env-changed=SPRAYER_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=SPRAYER_WIFI_PASSWORD");
    println!("cargo:rerun-if-env-changed=SPRAYER_IOT_HOST");
    println!("cargo:rerun-if-env-changed=SPRAYER_DEVICE_ID");
    println!("cargo:rerun-if-env-changed=SPRAYER_SAS_TOKEN");

    // ESP-IDF link arguments only matter when cross-compiling for the device.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}
