// ABOUTME: Message router: resolves senders, applies directives, fans out replies
// ABOUTME: Owns the roster and persists alias changes through the identity store

use crate::{
    commands::{parse_message, Directive, ParseResult},
    identity::{identity_from_address, IdentityStore},
    metrics,
    roster::Roster,
    traits::OutboundMessage,
};
use anyhow::Result;

/// Who receives a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Audience {
    /// Deliver to the sender
    pub sender: bool,
    /// Deliver to every other member
    pub others: bool,
}

impl Audience {
    pub const SENDER_ONLY: Audience = Audience {
        sender: true,
        others: false,
    };
    pub const EVERYONE: Audience = Audience {
        sender: true,
        others: true,
    };
}

/// Result of handling a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteResult {
    /// Sender is a member; these messages should be sent
    Relayed(Vec<OutboundMessage>),
    /// Sender is not in the roster; nothing is sent
    Rejected { identity: String },
}

impl RouteResult {
    /// Outbound messages (empty when rejected)
    pub fn messages(&self) -> &[OutboundMessage] {
        match self {
            RouteResult::Relayed(msgs) => msgs,
            RouteResult::Rejected { .. } => &[],
        }
    }

    pub fn into_messages(self) -> Vec<OutboundMessage> {
        match self {
            RouteResult::Relayed(msgs) => msgs,
            RouteResult::Rejected { .. } => Vec::new(),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, RouteResult::Rejected { .. })
    }
}

/// Routes inbound chat text to roster members.
///
/// Handling is strictly sequential: `handle` takes `&mut self`, so a roster
/// mutation and its store save complete before the next message is looked at.
#[derive(Debug)]
pub struct Router {
    roster: Roster,
    store: IdentityStore,
}

impl Router {
    pub fn new(roster: Roster, store: IdentityStore) -> Self {
        Self { roster, store }
    }

    /// Build a router from whatever the store currently holds
    pub fn load(store: IdentityStore) -> Self {
        let report = store.load_all();
        if !report.is_complete() {
            tracing::warn!(
                missing = ?report.missing,
                "Some registered users could not be loaded and are not in the roster"
            );
        }
        Self::new(report.roster, store)
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Handle one inbound chat message.
    ///
    /// Returns an error only when an alias change could not be persisted; in
    /// that case the in-memory alias is rolled back and nothing is sent.
    pub fn handle(&mut self, sender_address: &str, text: &str) -> Result<RouteResult> {
        let sender = identity_from_address(sender_address);

        let Some(alias) = self.roster.alias_of(sender) else {
            tracing::info!(sender = %sender, "User not found in roster, dropping message");
            metrics::record_rejected();
            return Ok(RouteResult::Rejected {
                identity: sender.to_string(),
            });
        };
        let alias = alias.to_string();

        let (response, audience) = match parse_message(text) {
            ParseResult::Message(body) => (format!("[{}] {}", alias, body), Audience::EVERYONE),
            ParseResult::Directive(directive) => {
                metrics::record_directive(directive.name());
                tracing::debug!(sender = %sender, directive = directive.name(), "Directive received");
                self.apply_directive(sender, &alias, directive)?
            }
        };

        let outbound = self.fan_out(sender, &response, audience);
        metrics::record_relayed(outbound.len());
        Ok(RouteResult::Relayed(outbound))
    }

    fn apply_directive(
        &mut self,
        sender: &str,
        alias: &str,
        directive: Directive,
    ) -> Result<(String, Audience)> {
        match directive {
            Directive::Whois { alias: wanted } => {
                let response = match self.roster.find_by_alias(&wanted) {
                    Some((identity, found)) => format!("{} is known as [{}]", identity, found),
                    None => format!("{} not found", wanted),
                };
                Ok((response, Audience::SENDER_ONLY))
            }
            Directive::Whoami => Ok((
                format!("{} is known as [{}]", sender, alias),
                Audience::SENDER_ONLY,
            )),
            Directive::Alias { alias: new_alias } => {
                self.roster.set_alias(sender, &new_alias);
                if let Err(e) = self.store.save_all(&self.roster) {
                    self.roster.set_alias(sender, alias);
                    return Err(e.context(format!("Alias change for {} was not saved", sender)));
                }
                tracing::info!(sender = %sender, old = %alias, new = %new_alias, "Alias changed");
                metrics::record_alias_change();
                Ok((
                    format!("[{}] is now known as [{}]", alias, new_alias),
                    Audience::EVERYONE,
                ))
            }
        }
    }

    /// One message per member selected by `audience`, in roster order
    fn fan_out(&self, sender: &str, text: &str, audience: Audience) -> Vec<OutboundMessage> {
        self.roster
            .identities()
            .filter(|id| {
                let is_sender = *id == sender;
                (is_sender && audience.sender) || (!is_sender && audience.others)
            })
            .map(|id| OutboundMessage::new(id, text))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn router(members: &[(&str, &str)]) -> Router {
        let store = IdentityStore::new(Arc::new(MemoryStore::new()));
        Router::new(members.iter().copied().collect(), store)
    }

    #[test]
    fn test_fan_out_audiences() {
        let r = router(&[("a", "Bob"), ("b", "Ann"), ("c", "Cy")]);

        let to: Vec<String> = r
            .fan_out("b", "x", Audience::EVERYONE)
            .into_iter()
            .map(|m| m.to)
            .collect();
        assert_eq!(to, vec!["a", "b", "c"]);

        let to: Vec<String> = r
            .fan_out("b", "x", Audience::SENDER_ONLY)
            .into_iter()
            .map(|m| m.to)
            .collect();
        assert_eq!(to, vec!["b"]);

        let others_only = Audience {
            sender: false,
            others: true,
        };
        let to: Vec<String> = r
            .fan_out("b", "x", others_only)
            .into_iter()
            .map(|m| m.to)
            .collect();
        assert_eq!(to, vec!["a", "c"]);
    }

    #[test]
    fn test_resource_is_stripped_from_sender() {
        let mut r = router(&[("a@example.com", "Bob")]);
        let result = r.handle("a@example.com/phone", "/whoami").unwrap();
        assert_eq!(
            result.messages(),
            &[OutboundMessage::new(
                "a@example.com",
                "a@example.com is known as [Bob]"
            )]
        );
    }

    #[test]
    fn test_rejected_sender_has_no_messages() {
        let mut r = router(&[("a", "Bob")]);
        let result = r.handle("mallory/x", "hi").unwrap();
        assert!(result.is_rejected());
        assert!(result.messages().is_empty());
        assert_eq!(
            result,
            RouteResult::Rejected {
                identity: "mallory".to_string()
            }
        );
    }
}
