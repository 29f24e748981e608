//! Session options
//!
//! A fixed table of typed settings read and changed with the `opt`
//! command. Each entry knows its name, its help text and how to reach
//! its field in [`Options`].

use std::fmt;

use super::{expr::evaluate, symbols::SymbolTable, Address};
use crate::prelude::{Error, FdResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionValue {
    Boolean(bool),
    Numeric(Address),
}

impl OptionValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Boolean(_) => "boolean",
            OptionValue::Numeric(_) => "numeric",
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Boolean(value) => write!(f, "{}", value),
            OptionValue::Numeric(value) => write!(f, "0x{:x} ({})", value, value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Style headings and diagnostics on the console
    pub color: bool,
    /// Leave out the reports of bulk commands
    pub quiet: bool,
    /// Minimum number of hex digits when printing an address
    pub width: Address,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            color: true,
            quiet: false,
            width: 5,
        }
    }
}

pub struct OptionDef {
    pub name: &'static str,
    pub help: &'static str,
    get: fn(&Options) -> OptionValue,
    set: fn(&mut Options, OptionValue),
}

impl OptionDef {
    pub fn type_name(&self) -> &'static str {
        (self.get)(&Options::default()).type_name()
    }
}

fn get_color(options: &Options) -> OptionValue {
    OptionValue::Boolean(options.color)
}

fn set_color(options: &mut Options, value: OptionValue) {
    if let OptionValue::Boolean(color) = value {
        options.color = color;
    }
}

fn get_quiet(options: &Options) -> OptionValue {
    OptionValue::Boolean(options.quiet)
}

fn set_quiet(options: &mut Options, value: OptionValue) {
    if let OptionValue::Boolean(quiet) = value {
        options.quiet = quiet;
    }
}

fn get_width(options: &Options) -> OptionValue {
    OptionValue::Numeric(options.width)
}

fn set_width(options: &mut Options, value: OptionValue) {
    if let OptionValue::Numeric(width) = value {
        options.width = width;
    }
}

pub const OPTIONS: &[OptionDef] = &[
    OptionDef {
        name: "color",
        help: "Use bold and colored text on the console.",
        get: get_color,
        set: set_color,
    },
    OptionDef {
        name: "quiet",
        help: "Do not report what import, export and rename did.",
        get: get_quiet,
        set: set_quiet,
    },
    OptionDef {
        name: "width",
        help: "Minimum number of hex digits shown for an evaluated address.",
        get: get_width,
        set: set_width,
    },
];

pub fn find_option(name: &str) -> FdResult<&'static OptionDef> {
    OPTIONS
        .iter()
        .find(|def| def.name == name)
        .ok_or_else(|| Error::UnknownOption(name.into()))
}

/// `1`, `on`, and words starting with `t` or `y` are true.
/// `0`, `off`, and words starting with `f` or `n` are false.
fn parse_bool(text: &str) -> Option<bool> {
    let lower = text.to_ascii_lowercase();
    match lower.chars().next()? {
        c if c.is_ascii_digit() => lower.parse::<u64>().ok().map(|n| n > 0),
        't' | 'y' => Some(true),
        'f' | 'n' => Some(false),
        _ if lower == "on" => Some(true),
        _ if lower == "off" => Some(false),
        _ => None,
    }
}

impl Options {
    pub fn get(&self, name: &str) -> FdResult<OptionValue> {
        Ok((find_option(name)?.get)(self))
    }

    /// Parse `text` as the type of option `name` and store it.
    /// Numeric options accept any address expression.
    pub fn set(&mut self, name: &str, text: &str, stab: &SymbolTable) -> FdResult<OptionValue> {
        let def = find_option(name)?;
        let bad = |reason: String| Error::BadOption(name.into(), reason);

        let value = match (def.get)(self) {
            OptionValue::Boolean(_) => OptionValue::Boolean(
                parse_bool(text).ok_or_else(|| bad(format!("not a boolean: {}", text)))?,
            ),
            OptionValue::Numeric(_) => {
                OptionValue::Numeric(evaluate(stab, text).map_err(|err| bad(err.to_string()))?)
            }
        };

        (def.set)(self, value);
        log::debug!("opt: {} = {}", name, value);
        Ok(value)
    }

    /// Every option with its current value, in table order
    pub fn values(&self) -> impl Iterator<Item = (&'static str, OptionValue)> + '_ {
        OPTIONS.iter().map(move |def| (def.name, (def.get)(self)))
    }
}
