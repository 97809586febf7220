use ansi_term::Colour;

use super::Severity;

const BRIGHT_RED: Colour = Colour::Fixed(9);
const BRIGHT_YELLOW: Colour = Colour::Fixed(11);
const BRIGHT_BLUE: Colour = Colour::Fixed(12);

/// Console prefix per severity, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStyle {
    prefixes: [String; 5],
}

impl LogStyle {
    pub fn new(prefixes: [String; 5]) -> Self {
        Self { prefixes }
    }

    pub fn prefix(&self, severity: Severity) -> &str {
        &self.prefixes[severity as usize]
    }
}

/// Coloured emoji badge used when the config file does not override it.
pub fn default_prefix(severity: Severity) -> String {
    match severity {
        Severity::Debug => BRIGHT_BLUE.paint("{🔧🐛[+]🐛🔧}").to_string(),
        Severity::Info => BRIGHT_YELLOW.paint("{🌀🌵[+]🌵🌀}").to_string(),
        Severity::Warning => BRIGHT_YELLOW.paint("{⚡⚡[+]⚡⚡}").to_string(),
        Severity::Error => BRIGHT_RED.paint("{🔥💀[+]💀🔥}").to_string(),
        Severity::Critical => BRIGHT_RED.paint("{🚨🔥[+]🔥🚨}").to_string(),
    }
}
