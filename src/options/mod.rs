//! Option registry and preset modes
//!
//! Every command-line option goodbyedpi understands is declared once in
//! [`OPTIONS`]. The declaration order is the order in which options are
//! emitted on the command line, and an option's kind never changes.
//!
//! Presets ("modesets") are immutable bundles of option values. Applying one
//! wipes every individually-set option first.

pub mod args;

pub use args::{build_args, display_command};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptionError {
    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("option '{flag}' expects a {expected} value")]
    KindMismatch { flag: String, expected: OptionKind },

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
}

/// Value kind of an option. Fixed per flag for the lifetime of the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Flag,
    Integer,
    Text,
}

impl fmt::Display for OptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag => f.write_str("boolean"),
            Self::Integer => f.write_str("integer"),
            Self::Text => f.write_str("string"),
        }
    }
}

/// Section of the settings form an option belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionGroup {
    Basic,
    HttpFragmentation,
    Https,
    Dns,
    FakeRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub flag: &'static str,
    pub kind: OptionKind,
    pub group: OptionGroup,
    pub help: &'static str,
    /// Inclusive bounds of an integer option; `None` for the other kinds
    pub range: Option<(i64, i64)>,
}

/// Bounds of every integer option, as the settings spin boxes allow.
pub const INTEGER_RANGE: (i64, i64) = (0, 9999);

const fn flag(flag: &'static str, group: OptionGroup, help: &'static str) -> OptionSpec {
    OptionSpec { flag, kind: OptionKind::Flag, group, help, range: None }
}

const fn int(flag: &'static str, group: OptionGroup, help: &'static str) -> OptionSpec {
    OptionSpec { flag, kind: OptionKind::Integer, group, help, range: Some(INTEGER_RANGE) }
}

const fn text(flag: &'static str, group: OptionGroup, help: &'static str) -> OptionSpec {
    OptionSpec { flag, kind: OptionKind::Text, group, help, range: None }
}

use OptionGroup::{Basic, Dns, FakeRequest, HttpFragmentation, Https};

/// All options in declaration order.
pub static OPTIONS: &[OptionSpec] = &[
    // ── boolean flags ─────────────────────────────────────────
    flag("-p", Basic, "block passive DPI"),
    flag("-q", Basic, "block QUIC/HTTP3"),
    flag("-r", Basic, "replace Host with hoSt"),
    flag("-s", Basic, "remove space between host header and its value"),
    flag("-m", Basic, "mix Host header case (test.com -> tEsT.cOm)"),
    flag("-n", HttpFragmentation, "do not wait for first segment ACK when -k is enabled"),
    flag("-a", HttpFragmentation, "additional space between Method and Request-URI (enables -s, may break sites)"),
    flag("-w", HttpFragmentation, "try to find and parse HTTP traffic on all processed ports (not only on port 80)"),
    flag("--frag-by-sni", Https, "if SNI is detected in TLS packet, fragment the packet right before SNI value"),
    flag("--native-frag", Https, "fragment packets by sending them in smaller packets, without shrinking the Window Size"),
    flag("--reverse-frag", Https, "fragment packets just as --native-frag, but send them in the reversed order"),
    flag("--dns-verb", Dns, "print verbose DNS redirection messages"),
    flag("--wrong-chksum", FakeRequest, "activate Fake Request Mode and send it with incorrect TCP checksum"),
    flag("--wrong-seq", FakeRequest, "activate Fake Request Mode and send it with TCP SEQ/ACK in the past"),
    // ── integer parameters ────────────────────────────────────
    int("-f", HttpFragmentation, "set HTTP fragmentation to value"),
    int("-k", HttpFragmentation, "enable HTTP persistent (keep-alive) fragmentation and set it to value"),
    int("-e", Https, "set HTTPS fragmentation to value"),
    int("--min-ttl", Https, "minimum TTL distance (128/64 - TTL) for which to send Fake Request"),
    int("--max-payload", Https, "packets with TCP payload data larger than value won't be processed"),
    int("--dns-port", Dns, "redirect UDP DNS requests to the supplied port (53 by default)"),
    int("--dnsv6-port", Dns, "redirect UDPv6 DNS requests to the supplied port (53 by default)"),
    int("--fake-gen", FakeRequest, "generate random-filled fake packets for Fake Request Mode (up to 30)"),
    int("--fake-resend", FakeRequest, "send each fake packet value number of times"),
    // ── string parameters ─────────────────────────────────────
    text("--port", Https, "additional TCP port to perform fragmentation on (and HTTP tricks with -w)"),
    text("--ip-id", Https, "handle additional IP ID (decimal, drop redirects and TCP RSTs with this ID)"),
    text("--set-ttl", Https, "activate Fake Request Mode and send it with supplied TTL value"),
    text("--auto-ttl", Https, "activate Fake Request Mode, automatically detect TTL and decrease it (a1-a2-m)"),
    text("--blacklist", Https, "perform circumvention tricks only to host names from the supplied text file"),
    text("--dns-addr", Dns, "redirect UDP DNS requests to the supplied IP address"),
    text("--dnsv6-addr", Dns, "redirect UDPv6 DNS requests to the supplied IPv6 address"),
    text("--fake-from-hex", FakeRequest, "load fake packets for Fake Request Mode from HEX values"),
    text("--fake-with-sni", FakeRequest, "generate fake packets for Fake Request Mode with given SNI domain name"),
];

/// Look up an option by its flag.
pub fn spec(flag: &str) -> Option<&'static OptionSpec> {
    OPTIONS.iter().find(|s| s.flag == flag)
}

fn index_of(flag: &str) -> Option<usize> {
    OPTIONS.iter().position(|s| s.flag == flag)
}

// ─── Values ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Flag(bool),
    Integer(i64),
    Text(String),
}

impl OptionValue {
    pub fn kind(&self) -> OptionKind {
        match self {
            Self::Flag(_) => OptionKind::Flag,
            Self::Integer(_) => OptionKind::Integer,
            Self::Text(_) => OptionKind::Text,
        }
    }

    /// The "unset" value of a kind: false, 0 or "".
    pub fn empty(kind: OptionKind) -> Self {
        match kind {
            OptionKind::Flag => Self::Flag(false),
            OptionKind::Integer => Self::Integer(0),
            OptionKind::Text => Self::Text(String::new()),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{}", b),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

// ─── Option Set ──────────────────────────────────────────────

/// Current value of every registered option, kept in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSet {
    values: Vec<OptionValue>,
}

impl Default for OptionSet {
    fn default() -> Self {
        Self {
            values: OPTIONS.iter().map(|s| OptionValue::empty(s.kind)).collect(),
        }
    }
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option. The value's kind must match the registered kind;
    /// integers are clamped into the option's range.
    pub fn set(&mut self, flag: &str, value: impl Into<OptionValue>) -> Result<(), OptionError> {
        let idx = index_of(flag).ok_or_else(|| OptionError::UnknownOption(flag.to_string()))?;
        let spec = &OPTIONS[idx];
        let value = match (value.into(), spec.range) {
            (OptionValue::Integer(n), Some((min, max))) => OptionValue::Integer(n.clamp(min, max)),
            (value, _) => value,
        };
        if value.kind() != spec.kind {
            return Err(OptionError::KindMismatch { flag: flag.to_string(), expected: spec.kind });
        }
        self.values[idx] = value;
        Ok(())
    }

    pub fn get(&self, flag: &str) -> Option<&OptionValue> {
        index_of(flag).map(|idx| &self.values[idx])
    }

    /// Reset every option to its empty value.
    pub fn reset(&mut self) {
        for (value, spec) in self.values.iter_mut().zip(OPTIONS) {
            *value = OptionValue::empty(spec.kind);
        }
    }

    /// Reset everything, then write the preset's values.
    /// `None` only resets (the blank modeset entry).
    pub fn apply_preset(&mut self, preset: Option<&Preset>) {
        self.reset();
        let Some(preset) = preset else { return };
        for (flag, value) in preset.values {
            if let Err(e) = self.set(flag, value.to_option_value()) {
                tracing::warn!("Preset '{}' carries an invalid entry: {}", preset.id, e);
            }
        }
    }

    /// Iterate `(spec, value)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static OptionSpec, &OptionValue)> {
        OPTIONS.iter().zip(self.values.iter())
    }
}

// ─── Selection ───────────────────────────────────────────────

/// What the user picked: an optional preset plus the individual options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub preset: Option<&'static Preset>,
    pub options: OptionSet,
}

impl Selection {
    /// Select a preset (or none) and reset the options to its values.
    pub fn select_preset(&mut self, preset: Option<&'static Preset>) {
        self.preset = preset;
        self.options.apply_preset(preset);
    }

    pub fn argv(&self, executable: &str) -> Vec<String> {
        build_args(executable, self.preset, &self.options)
    }
}

// ─── Presets ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetValue {
    Flag(bool),
    Integer(i64),
    Text(&'static str),
}

impl PresetValue {
    pub fn to_option_value(&self) -> OptionValue {
        match *self {
            Self::Flag(b) => OptionValue::Flag(b),
            Self::Integer(n) => OptionValue::Integer(n),
            Self::Text(s) => OptionValue::Text(s.to_string()),
        }
    }
}

/// A legacy modeset. Its id (e.g. `-5`) is passed to goodbyedpi as-is.
#[derive(Debug, PartialEq, Eq)]
pub struct Preset {
    pub id: &'static str,
    pub values: &'static [(&'static str, PresetValue)],
}

use PresetValue::{Flag as On, Integer as N, Text as S};

pub static PRESETS: &[Preset] = &[
    Preset {
        id: "-1",
        values: &[("-p", On(true)), ("-r", On(true)), ("-s", On(true)), ("-f", N(2)), ("-k", N(2)), ("-n", On(true)), ("-e", N(2))],
    },
    Preset {
        id: "-2",
        values: &[("-p", On(true)), ("-r", On(true)), ("-s", On(true)), ("-f", N(2)), ("-k", N(2)), ("-n", On(true)), ("-e", N(40))],
    },
    Preset {
        id: "-3",
        values: &[("-p", On(true)), ("-r", On(true)), ("-s", On(true)), ("-e", N(40))],
    },
    Preset {
        id: "-4",
        values: &[("-p", On(true)), ("-r", On(true)), ("-s", On(true))],
    },
    Preset {
        id: "-5",
        values: &[("-f", N(2)), ("-e", N(2)), ("--auto-ttl", S("1-4-10")), ("--reverse-frag", On(true)), ("--max-payload", N(1200))],
    },
    Preset {
        id: "-6",
        values: &[("-f", N(2)), ("-e", N(2)), ("--wrong-seq", On(true)), ("--reverse-frag", On(true)), ("--max-payload", N(1200))],
    },
];

impl Preset {
    /// Find a preset by id. The blank id means "no preset".
    pub fn lookup(id: &str) -> Option<&'static Preset> {
        PRESETS.iter().find(|p| p.id == id)
    }

    /// Resolve a user-supplied id, rejecting anything that isn't registered.
    pub fn resolve(id: &str) -> Result<Option<&'static Preset>, OptionError> {
        if id.trim().is_empty() {
            return Ok(None);
        }
        Self::lookup(id)
            .map(Some)
            .ok_or_else(|| OptionError::UnknownPreset(id.to_string()))
    }

    /// Human-readable summary shown next to the modeset selector.
    pub fn describe(&self) -> String {
        let mut out = String::from("Command details:");
        for (flag, value) in self.values {
            out.push('\n');
            out.push_str(&format!("{}: {}", flag, value.to_option_value()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn registry_flags_are_unique() {
        let mut seen = HashSet::new();
        for spec in OPTIONS {
            assert!(seen.insert(spec.flag), "duplicate flag {}", spec.flag);
        }
    }

    #[test]
    fn every_preset_entry_matches_registry_kind() {
        for preset in PRESETS {
            for (flag, value) in preset.values {
                let spec = spec(flag).unwrap_or_else(|| panic!("{} not registered", flag));
                assert_eq!(spec.kind, value.to_option_value().kind(), "{} in {}", flag, preset.id);
            }
        }
    }

    #[test]
    fn set_rejects_kind_mismatch() {
        let mut opts = OptionSet::new();
        let err = opts.set("-p", 3).unwrap_err();
        assert_eq!(
            err,
            OptionError::KindMismatch { flag: "-p".into(), expected: OptionKind::Flag }
        );
        assert_eq!(opts.get("-p"), Some(&OptionValue::Flag(false)));
    }

    #[test]
    fn integers_are_clamped_into_range() {
        let mut opts = OptionSet::new();
        opts.set("--max-payload", 12000).unwrap();
        opts.set("-k", -3).unwrap();
        opts.set("-e", 40).unwrap();

        assert_eq!(opts.get("--max-payload"), Some(&OptionValue::Integer(9999)));
        assert_eq!(opts.get("-k"), Some(&OptionValue::Integer(0)));
        assert_eq!(opts.get("-e"), Some(&OptionValue::Integer(40)));
        assert!(OPTIONS
            .iter()
            .all(|s| (s.kind == OptionKind::Integer) == s.range.is_some()));
    }

    #[test]
    fn set_rejects_unknown_flag() {
        let mut opts = OptionSet::new();
        assert!(matches!(opts.set("--nope", true), Err(OptionError::UnknownOption(_))));
    }

    #[test]
    fn apply_preset_overrides_manual_values() {
        let mut opts = OptionSet::new();
        opts.set("-q", true).unwrap();
        opts.set("-k", 9).unwrap();
        opts.set("--port", "8080").unwrap();

        opts.apply_preset(Preset::lookup("-5"));

        assert_eq!(opts.get("-q"), Some(&OptionValue::Flag(false)));
        assert_eq!(opts.get("-k"), Some(&OptionValue::Integer(0)));
        assert_eq!(opts.get("--port"), Some(&OptionValue::Text(String::new())));
        assert_eq!(opts.get("--auto-ttl"), Some(&OptionValue::Text("1-4-10".into())));
        assert_eq!(opts.get("--max-payload"), Some(&OptionValue::Integer(1200)));
        assert_eq!(opts.get("--reverse-frag"), Some(&OptionValue::Flag(true)));
    }

    #[test]
    fn apply_none_resets() {
        let mut opts = OptionSet::new();
        opts.set("-p", true).unwrap();
        opts.apply_preset(None);
        assert_eq!(opts, OptionSet::new());
    }

    #[test]
    fn resolve_blank_and_unknown() {
        assert_eq!(Preset::resolve("").unwrap(), None);
        assert_eq!(Preset::resolve("-3").unwrap().map(|p| p.id), Some("-3"));
        assert!(Preset::resolve("-9").is_err());
    }

    #[test]
    fn describe_lists_entries() {
        let text = Preset::lookup("-4").unwrap().describe();
        assert_eq!(text, "Command details:\n-p: true\n-r: true\n-s: true");
    }
}
