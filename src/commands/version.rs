pub fn run() -> anyhow::Result<()> {
    println!("krr {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
