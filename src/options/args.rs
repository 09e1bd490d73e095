//! Command-line assembly.
//!
//! Purely mechanical: no compatibility checks between flags, goodbyedpi
//! itself decides what a combination means.

use super::{OptionKind, OptionSet, OptionValue, Preset};

/// Build the argv for goodbyedpi, executable first.
///
/// A selected preset wins outright and is passed alone. Otherwise the set
/// options are emitted by kind (flags, then integers, then strings), each
/// kind in declaration order.
pub fn build_args(executable: &str, preset: Option<&Preset>, options: &OptionSet) -> Vec<String> {
    let mut argv = vec![executable.to_string()];

    if let Some(preset) = preset {
        argv.push(preset.id.to_string());
        return argv;
    }

    for kind in [OptionKind::Flag, OptionKind::Integer, OptionKind::Text] {
        for (spec, value) in options.iter().filter(|(s, _)| s.kind == kind) {
            match value {
                OptionValue::Flag(true) => argv.push(spec.flag.to_string()),
                OptionValue::Integer(n) if *n > 0 => {
                    argv.push(spec.flag.to_string());
                    argv.push(n.to_string());
                }
                OptionValue::Text(s) => {
                    let s = s.trim();
                    if !s.is_empty() {
                        argv.push(spec.flag.to_string());
                        argv.push(s.to_string());
                    }
                }
                _ => {}
            }
        }
    }

    argv
}

/// The argv as it is echoed to the output sink.
pub fn display_command(argv: &[String]) -> String {
    argv.join(" ")
}
