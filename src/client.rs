//! Command-line argument handling shared by the `edgestore` binary and its tests.

use crate::errors::StoreError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLineConfig {
    pub database: String,
    pub command: String,
    pub command_args: Vec<String>,
    pub verbose: bool,
}

impl CommandLineConfig {
    pub fn from_args(args: &[&str]) -> Result<Self, String> {
        let mut database = String::from("memory");
        let mut command = String::from("status");
        let mut command_args = Vec::new();
        let mut command_set = false;
        let mut verbose = false;
        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            if command_set {
                command_args.push(arg.to_string());
                continue;
            }
            match *arg {
                "--db" | "--database" => {
                    database = iter
                        .next()
                        .ok_or_else(|| "--db requires a value".to_string())?
                        .to_string();
                }
                "--command" => {
                    command = iter
                        .next()
                        .ok_or_else(|| "--command requires a value".to_string())?
                        .to_string();
                    command_set = true;
                }
                "--verbose" | "-v" => verbose = true,
                other if other.starts_with('-') => {
                    return Err(format!("unknown flag {other}"));
                }
                _ => {
                    command = arg.to_string();
                    command_set = true;
                }
            }
        }
        Ok(Self {
            database,
            command,
            command_args,
            verbose,
        })
    }

    pub fn is_in_memory(&self) -> bool {
        self.database == "memory"
    }

    pub fn help() -> &'static str {
        "Usage: edgestore [--db memory|PATH] [--verbose] [--command] COMMAND [ARGS]\n\
         \n\
         Commands:\n\
         \x20 status\n\
         \x20 migrate [--dry-run]\n\
         \x20 import --input FILE [--strict] [--fail-fast]\n\
         \x20 export --output FILE [--exploded]\n\
         \x20 explode --input FILE --output FILE [--fail-fast]\n\
         \x20 implode --input FILE --output FILE\n\
         \x20 decode --value TEXT\n\
         \x20 query --property P --dataset Q [--columns a,b] [--country ids] [--admin1 ids]\n\
         \x20       [--admin2 ids] [--admin3 ids] [--limit N]\n\
         \x20 delete --dataset Q --property P[,P...]\n\
         \x20 check\n"
    }
}

/// Value following `flag` in `args`.
pub fn flag_value<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>, StoreError> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == flag {
            return iter
                .next()
                .map(|value| Some(value.as_str()))
                .ok_or_else(|| StoreError::invalid_input(format!("missing value for {flag}")));
        }
    }
    Ok(None)
}

pub fn required_flag_value<'a>(args: &'a [String], flag: &str) -> Result<&'a str, StoreError> {
    flag_value(args, flag)?
        .ok_or_else(|| StoreError::invalid_input(format!("{flag} is required")))
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|arg| arg == flag)
}

/// Comma-separated list after `flag`; empty when the flag is absent.
pub fn list_flag_value(args: &[String], flag: &str) -> Result<Vec<String>, StoreError> {
    Ok(flag_value(args, flag)?
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}
