//! A small parser for flags with a short and a long alias, in the style of
//! argparse: `-n 1000`, `--num_ops=1000`, `-sd` or `-sd true`.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;

pub trait FlagType: Clone + Sized + 'static {
    fn parse(s: &str) -> Result<Self>;
    fn to_string(&self) -> String;
    fn is_zero_value(&self) -> bool {
        false
    }
    fn is_bool_flag() -> bool {
        false
    }
    fn metavar() -> &'static str {
        "VALUE"
    }
}

impl FlagType for bool {
    fn parse(s: &str) -> Result<Self> {
        super::strconv::parse_bool(s)
    }

    fn to_string(&self) -> String {
        format!("{self}")
    }

    fn is_zero_value(&self) -> bool {
        !*self
    }

    fn is_bool_flag() -> bool {
        true
    }

    fn metavar() -> &'static str {
        "[BOOL]"
    }
}

impl FlagType for u64 {
    fn parse(s: &str) -> Result<Self> {
        super::strconv::parse_u64(s)
    }

    fn to_string(&self) -> String {
        format!("{self}")
    }

    fn metavar() -> &'static str {
        "N"
    }
}

impl FlagType for String {
    fn parse(s: &str) -> Result<Self> {
        Ok(s.to_string())
    }

    fn to_string(&self) -> String {
        format!("{self:?}")
    }

    fn is_zero_value(&self) -> bool {
        self.is_empty()
    }

    fn metavar() -> &'static str {
        "STRING"
    }
}

impl FlagType for Duration {
    fn parse(s: &str) -> Result<Self> {
        super::strconv::parse_duration(s)
    }

    fn to_string(&self) -> String {
        super::strconv::format_duration(*self)
    }

    fn metavar() -> &'static str {
        "DURATION"
    }
}

trait GenericFlagCell {
    fn parse(&self, s: &str) -> Result<()>;
}

struct FlagCell<T> {
    value: RefCell<T>,
}

impl<T: FlagType> GenericFlagCell for FlagCell<T> {
    fn parse(&self, s: &str) -> Result<()> {
        *self.value.borrow_mut() = T::parse(s)?;
        Ok(())
    }
}

struct Flag {
    names: Vec<&'static str>,
    desc: &'static str,
    default: Option<String>,
    is_bool_flag: bool,
    metavar: &'static str,
    cell: Rc<dyn GenericFlagCell>,
}

/// A handle to a value which is filled in by the Parser.
pub struct FlagValue<T> {
    cell: Rc<FlagCell<T>>,
}

impl<T: FlagType> FlagValue<T> {
    /// Returns the parsed value, or the default one if the flag
    /// was not given.
    pub fn get(&self) -> T {
        self.cell.value.borrow().clone()
    }
}

/// Accumulates flag definitions and builds a parser and a flag set
/// description out of them.
pub struct ParserBuilder {
    flags: Vec<Flag>,
    by_name: HashMap<&'static str, usize>,
}

impl ParserBuilder {
    pub fn new() -> Self {
        Self {
            flags: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn build(self) -> (Parser, FlagSetDescription) {
        let flags = Rc::new(self.flags);
        let parser = Parser {
            flags: Rc::clone(&flags),
            by_name: self.by_name,
        };
        (parser, FlagSetDescription { flags })
    }

    pub fn bool_var(
        &mut self,
        names: &[&'static str],
        default: bool,
        desc: &'static str,
    ) -> FlagValue<bool> {
        self.add_flag(names, default, desc)
    }

    pub fn string_var(
        &mut self,
        names: &[&'static str],
        default: impl ToString,
        desc: &'static str,
    ) -> FlagValue<String> {
        self.add_flag(names, default.to_string(), desc)
    }

    pub fn u64_var(
        &mut self,
        names: &[&'static str],
        default: u64,
        desc: &'static str,
    ) -> FlagValue<u64> {
        self.add_flag(names, default, desc)
    }

    pub fn duration_var(
        &mut self,
        names: &[&'static str],
        default: Duration,
        desc: &'static str,
    ) -> FlagValue<Duration> {
        self.add_flag(names, default, desc)
    }

    /// Defines a flag with a custom type.
    pub fn var<T: FlagType>(
        &mut self,
        names: &[&'static str],
        default: T,
        desc: &'static str,
    ) -> FlagValue<T> {
        self.add_flag(names, default, desc)
    }

    fn add_flag<T: FlagType>(
        &mut self,
        names: &[&'static str],
        default: T,
        desc: &'static str,
    ) -> FlagValue<T> {
        if names.is_empty() {
            panic!("Flag must have at least one name");
        }

        let index = self.flags.len();
        for &name in names {
            if name.is_empty() || name.starts_with('-') || name.contains('=') {
                panic!("Invalid flag name: {name:?}");
            }
            if self.by_name.insert(name, index).is_some() {
                panic!("Flag {name} was defined more than once");
            }
        }

        let default_s = (!default.is_zero_value()).then(|| default.to_string());
        let cell = Rc::new(FlagCell {
            value: RefCell::new(default),
        });

        self.flags.push(Flag {
            names: names.to_vec(),
            desc,
            default: default_s,
            is_bool_flag: T::is_bool_flag(),
            metavar: T::metavar(),
            cell: Rc::clone(&cell) as Rc<dyn GenericFlagCell>,
        });

        FlagValue { cell }
    }
}

pub struct Parser {
    flags: Rc<Vec<Flag>>,
    by_name: HashMap<&'static str, usize>,
}

impl Parser {
    /// Parses the configured flags.
    ///
    /// Each flag must have one of the following forms:
    /// -name=value
    /// -name value
    /// -name        (boolean flags only, sets the flag to true)
    ///
    /// A flag may start with one or two dashes, and may be referred to
    /// by any of its names. A boolean flag consumes the next argument
    /// only if it is a boolean literal.
    ///
    /// A double dash ("--") in non-value position terminates the parsing.
    pub fn parse_args<I, S>(self, args: I) -> Result<()>
    where
        I: Iterator<Item = S>,
        S: AsRef<str>,
    {
        let mut args = args.peekable();
        let mut parsed_flags = HashSet::new();

        while let Some(arg) = args.next() {
            let arg = arg.as_ref();
            if arg == "--" {
                break;
            }

            let stripped = arg
                .strip_prefix("--")
                .or_else(|| arg.strip_prefix('-'))
                .ok_or_else(|| anyhow::anyhow!("Expected an option, but got {arg}"))?;
            anyhow::ensure!(
                !stripped.is_empty() && !stripped.starts_with('-') && !stripped.starts_with('='),
                "Invalid flag parameter: {arg}",
            );

            let (name, value_after_eq) = match stripped.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (stripped, None),
            };

            let index = *self
                .by_name
                .get(name)
                .ok_or_else(|| anyhow::anyhow!("Unknown flag: {name}"))?;
            let flag = &self.flags[index];
            anyhow::ensure!(
                parsed_flags.insert(index),
                "The flag {} was provided more than once",
                flag.names.join("/"),
            );

            match value_after_eq {
                Some(value) => flag.cell.parse(value)?,
                None if flag.is_bool_flag => {
                    let explicit = args
                        .peek()
                        .is_some_and(|next| super::strconv::parse_bool(next.as_ref()).is_ok());
                    match args.next_if(|_| explicit) {
                        Some(value) => flag.cell.parse(value.as_ref())?,
                        None => flag.cell.parse("true")?,
                    }
                }
                None => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("Value is missing for flag {name}"))?;
                    flag.cell.parse(value.as_ref())?
                }
            }
        }

        Ok(())
    }
}

pub struct FlagSetDescription {
    flags: Rc<Vec<Flag>>,
}

impl FlagSetDescription {
    /// Prints the flags in the order they were defined.
    pub fn print_help(&self, write: &mut impl Write, program_name: &str) -> Result<()> {
        writeln!(write, "Usage of {program_name}:")?;

        for flag in self.flags.iter() {
            let mut s = String::from("  ");
            for (i, name) in flag.names.iter().enumerate() {
                if i > 0 {
                    s.push_str(", ");
                }
                // Single letter and abbreviated names get a single dash
                s.push_str(if i == 0 { "-" } else { "--" });
                s.push_str(name);
            }
            s.push(' ');
            s.push_str(flag.metavar);

            s.push_str("\n    \t");
            s.push_str(&flag.desc.replace('\n', "\n    \t"));

            if let Some(default) = &flag.default {
                s.push_str(" (default ");
                s.push_str(default);
                s.push(')');
            }

            writeln!(write, "{s}")?;
        }

        Ok(())
    }
}
