fn main() {
    #[cfg(windows)]
    {
        use std::env;
        use std::path::PathBuf;

        let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_default();
        let ico_path = PathBuf::from(&manifest_dir)
            .join("resources")
            .join("Icon1.ico");
        println!("cargo:rerun-if-changed={}", ico_path.display());

        // 아이콘이 있을 때만 리소스에 포함
        if ico_path.exists() {
            let mut res = winres::WindowsResource::new();
            res.set_icon(&ico_path.to_string_lossy());

            if let Err(e) = res.compile() {
                println!("cargo:warning=Failed to compile resources: {}", e);
            }
        } else {
            println!(
                "cargo:warning=Icon not found at {}, building without one",
                ico_path.display()
            );
        }
    }
}
