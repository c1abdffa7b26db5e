use super::EngineArgs;

/// Validate the configuration and print the resolved form as JSON.
pub fn check_config(engine: &EngineArgs) -> anyhow::Result<()> {
    let config = engine.load()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    eprintln!("✓ configuration is valid");
    Ok(())
}
