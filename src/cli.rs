// ABOUTME: Command-line flags for the relay and its administrative one-shots
// ABOUTME: Flags override values from the config file and environment

use crate::admin::AdminAction;
use chatty_core::config::Config;
use clap::Parser;
use std::path::PathBuf;

/// Exit status used when required flags are missing
pub const USAGE_EXIT_CODE: i32 = 2;

/// Relay one-to-one XMPP messages to a fixed group under persistent aliases
#[derive(Parser, Debug)]
#[command(name = "chatty", version)]
pub struct Cli {
    /// XMPP server address
    #[arg(long, value_name = "HOST:PORT")]
    pub server: Option<String>,

    /// Account the relay logs in as
    #[arg(long, value_name = "JID")]
    pub username: Option<String>,

    /// Account password
    #[arg(long)]
    pub password: Option<String>,

    /// Register a participant and exit
    #[arg(long, value_name = "IDENTITY", conflicts_with_all = ["rmuser", "list"])]
    pub adduser: Option<String>,

    /// Remove a participant and exit
    #[arg(long, value_name = "IDENTITY", conflicts_with = "list")]
    pub rmuser: Option<String>,

    /// Print registered participants and exit
    #[arg(long)]
    pub list: bool,

    /// Config file to use instead of the default search path
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the identity store
    #[arg(long, value_name = "DIR")]
    pub store: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// The administrative one-shot requested, if any
    pub fn admin_action(&self) -> Option<AdminAction> {
        if let Some(identity) = &self.adduser {
            return Some(AdminAction::Add(identity.clone()));
        }
        if let Some(identity) = &self.rmuser {
            return Some(AdminAction::Remove(identity.clone()));
        }
        if self.list {
            return Some(AdminAction::List);
        }
        None
    }

    /// Overlay explicitly given flags onto a loaded config
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(server) = &self.server {
            config.xmpp.server = server.clone();
        }
        if let Some(username) = &self.username {
            config.xmpp.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.xmpp.password = Some(password.clone());
        }
        if let Some(store) = &self.store {
            config.store.path = store.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_admin_actions() {
        let cli = Cli::parse_from(["chatty", "--adduser", "a@example.com"]);
        assert_eq!(
            cli.admin_action(),
            Some(AdminAction::Add("a@example.com".to_string()))
        );

        let cli = Cli::parse_from(["chatty", "--rmuser", "a@example.com"]);
        assert_eq!(
            cli.admin_action(),
            Some(AdminAction::Remove("a@example.com".to_string()))
        );

        let cli = Cli::parse_from(["chatty", "--list"]);
        assert_eq!(cli.admin_action(), Some(AdminAction::List));

        let cli = Cli::parse_from(["chatty", "--username", "relay@example.com"]);
        assert_eq!(cli.admin_action(), None);
    }

    #[test]
    fn test_conflicting_admin_flags_rejected() {
        let result = Cli::try_parse_from(["chatty", "--adduser", "a", "--rmuser", "b"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::default();
        config.xmpp.username = "from-file@example.com".to_string();

        let cli = Cli::parse_from([
            "chatty",
            "--server",
            "chat.example.com:5222",
            "--password",
            "secret",
            "--store",
            "/tmp/users",
        ]);
        cli.apply_to(&mut config);

        assert_eq!(config.xmpp.server, "chat.example.com:5222");
        assert_eq!(config.xmpp.username, "from-file@example.com");
        assert_eq!(config.xmpp.password.as_deref(), Some("secret"));
        assert_eq!(config.store.path, "/tmp/users");
        assert!(config.has_credentials());
    }
}
