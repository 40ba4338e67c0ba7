//! netrc credential file parsing

use crate::error::{CacheFsError, CacheFsResult};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Credentials for one machine entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Machine {
    pub login: Option<String>,
    pub password: Option<String>,
    pub account: Option<String>,
}

/// Parsed netrc file
#[derive(Debug, Clone, Default)]
pub struct Netrc {
    machines: HashMap<String, Machine>,
    default: Option<Machine>,
}

impl Netrc {
    /// Parse netrc content
    pub fn parse(content: &str) -> CacheFsResult<Self> {
        Self::parse_from(content, "inline netrc")
    }

    /// Read and parse a netrc file
    pub fn from_file(path: &Path) -> CacheFsResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CacheFsError::io(format!("reading netrc {}", path.display()), e))?;
        Self::parse_from(&content, &path.display().to_string())
    }

    /// `origin` names the content in errors
    fn parse_from(content: &str, origin: &str) -> CacheFsResult<Self> {
        let mut netrc = Netrc::default();
        // `None` while no machine/default block is open
        let mut current: Option<(Option<String>, Machine)> = None;

        let mut lines = content.lines();
        while let Some(line) = lines.next() {
            if line.trim_start().starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();

            while let Some(token) = tokens.next() {
                match token {
                    "machine" => {
                        netrc.close(current.take());
                        let name = value(&mut tokens, "machine", origin)?;
                        current = Some((Some(name), Machine::default()));
                    }
                    "default" => {
                        netrc.close(current.take());
                        current = Some((None, Machine::default()));
                    }
                    "login" | "password" | "account" => {
                        let v = value(&mut tokens, token, origin)?;
                        let (_, machine) = current.as_mut().ok_or_else(|| {
                            CacheFsError::credentials(
                                origin,
                                format!("'{}' outside a machine entry", token),
                            )
                        })?;
                        match token {
                            "login" => machine.login = Some(v),
                            "password" => machine.password = Some(v),
                            _ => machine.account = Some(v),
                        }
                    }
                    "macdef" => {
                        // Macro bodies run until the next blank line
                        for body in lines.by_ref() {
                            if body.trim().is_empty() {
                                break;
                            }
                        }
                        break;
                    }
                    other => {
                        return Err(CacheFsError::credentials(
                            origin,
                            format!("unexpected token '{}'", other),
                        ));
                    }
                }
            }
        }
        netrc.close(current);

        debug!("Parsed netrc with {} machine entries", netrc.machines.len());
        Ok(netrc)
    }

    /// Credentials for a hostname, falling back to the `default` entry
    pub fn machine(&self, host: &str) -> Option<&Machine> {
        self.machines.get(host).or(self.default.as_ref())
    }

    fn close(&mut self, entry: Option<(Option<String>, Machine)>) {
        match entry {
            Some((Some(name), machine)) => {
                // first entry for a host wins
                self.machines.entry(name).or_insert(machine);
            }
            Some((None, machine)) => self.default = Some(machine),
            None => {}
        }
    }
}

fn value<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    key: &str,
    origin: &str,
) -> CacheFsResult<String> {
    tokens
        .next()
        .map(str::to_string)
        .ok_or_else(|| CacheFsError::credentials(origin, format!("'{}' without a value", key)))
}
