use anyhow::Result;

// Print the generated OpenAPI document for CI artifacts and client codegen.
fn main() -> Result<()> {
    let spec = blockbustre::api::openapi().to_pretty_json()?;
    println!("{spec}");
    Ok(())
}
