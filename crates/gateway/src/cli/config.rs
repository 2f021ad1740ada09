use ta_domain::config::{Config, ConfigSeverity};

/// Print the config's validation issues.
///
/// Returns `true` when there are no errors (warnings are allowed).
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();

    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }

    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");

    error_count == 0
}

/// Dump the resolved config (with all defaults filled in) as TOML.
/// Inline API keys are masked.
pub fn show(config: &Config) -> anyhow::Result<()> {
    print!("{}", render(config)?);
    Ok(())
}

fn render(config: &Config) -> anyhow::Result<String> {
    let mut masked = config.clone();
    for provider in &mut masked.llm.providers {
        if provider.auth.key.is_some() {
            provider.auth.key = Some("********".into());
        }
    }
    Ok(toml::to_string_pretty(&masked)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_masks_inline_keys() {
        let mut config = Config::default();
        config.llm.providers[0].auth.key = Some("gsk_secret".into());
        let out = render(&config).unwrap();
        assert!(!out.contains("gsk_secret"));
        assert!(out.contains("********"));
    }

    #[test]
    fn default_config_validates() {
        assert!(validate(&Config::default(), "config.toml"));
    }
}
