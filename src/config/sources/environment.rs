//! Environment source: ARTIFACT_FORGE__SECTION__KEY

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("ARTIFACT_FORGE")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    )
}
