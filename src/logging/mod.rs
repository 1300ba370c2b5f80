//! Tracing filter construction
//!
//! The subscriber itself is installed by the CLI (`cli::init_tracing`); this
//! module turns a [`LoggingConfig`](crate::config::LoggingConfig) into filter
//! directives.

/// Build filter directives string from LoggingConfig
///
/// Returns the base level followed by one `pulse::<component>=<level>`
/// directive per configured component, sorted by component name.
///
/// # Examples
///
/// ```
/// use pulse::config::{LogFormat, LoggingConfig};
/// use pulse::logging::build_filter_directives;
/// use std::collections::HashMap;
///
/// let mut component_levels = HashMap::new();
/// component_levels.insert("hub".to_string(), "debug".to_string());
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Pretty,
///     component_levels: Some(component_levels),
/// };
///
/// assert_eq!(build_filter_directives(&config), "info,pulse::hub=debug");
/// ```
pub fn build_filter_directives(config: &crate::config::LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    if let Some(component_levels) = &config.component_levels {
        let mut components: Vec<_> = component_levels.iter().collect();
        components.sort();
        for (component, level) in components {
            filter_str.push_str(&format!(",pulse::{}={}", component, level));
        }
    }

    filter_str
}
