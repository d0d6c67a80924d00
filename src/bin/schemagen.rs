//! # Schema Generator
//!
//! Prints the JSON Schema of the service configuration file, for editor
//! completion and CI validation of `service.yaml`.
//!
//! ```bash
//! cargo run --bin schemagen > schema/service.schema.json
//! ```

use fastly_service_controller::model::ServiceConfig;

fn main() -> anyhow::Result<()> {
    let schema = schemars::schema_for!(ServiceConfig);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
