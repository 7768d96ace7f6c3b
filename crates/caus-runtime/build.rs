fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Client stubs only; the engine serves these RPCs
    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_protos(&["proto/causal.proto"], &["proto"])?;
    Ok(())
}
