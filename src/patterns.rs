//! Shared regular expressions for recognizing commands and resources.

use once_cell::sync::Lazy;
use regex::Regex;

/// An `ssh` invocation that targets `user@host` (either side may be a `$VAR`).
pub static SSH_COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(^|\s)\bssh\b\s+([^\s]+\s+)*(?P<username>[a-zA-Z0-9_-]+|\$[A-Z_0-9]+)@(?P<host>[a-zA-Z0-9.-]+|\$[A-Z_0-9]+)",
    )
    .unwrap_or_else(|_| unreachable!("ssh pattern is valid"))
});

/// An Azure CLI command group and subcommand, e.g. `az group create`.
pub static AZ_COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"az\s+([a-z]+)\s+([a-z]+)").unwrap_or_else(|_| unreachable!("az pattern is valid"))
});

/// Resource group deletion.
pub static AZ_GROUP_DELETE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"az\s+group\s+delete").unwrap_or_else(|_| unreachable!("delete pattern is valid"))
});

/// A resource id inside `az` JSON output.
pub static AZ_RESOURCE_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""id":\s*"(/subscriptions/[^"]+)""#)
        .unwrap_or_else(|_| unreachable!("resource uri pattern is valid"))
});

/// The resource group segment of a resource id.
pub static AZ_RESOURCE_GROUP_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"resourceGroups/([^"\\/ ]+)"#)
        .unwrap_or_else(|_| unreachable!("resource group pattern is valid"))
});

/// Whether the command opens a remote login session.
pub fn is_ssh_command(command: &str) -> bool {
    SSH_COMMAND.is_match(command)
}

/// Whether the command invokes the Azure CLI.
pub fn is_az_command(command: &str) -> bool {
    AZ_COMMAND.is_match(command)
}
