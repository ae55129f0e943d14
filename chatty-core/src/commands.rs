// ABOUTME: Directive parsing for relayed chat messages
// ABOUTME: Recognizes /whois, /whoami and /alias; everything else is plain chat

/// Prefix that marks a message as a directive candidate
pub const DIRECTIVE_PREFIX: char = '/';

/// A directive recognized by the router
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `/whois <alias>`: reveal which identity uses an alias
    Whois { alias: String },
    /// `/whoami`: show the sender's identity and alias
    Whoami,
    /// `/alias <new>`: change the sender's alias
    Alias { alias: String },
}

impl Directive {
    /// Directive name for logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Self::Whois { .. } => "whois",
            Self::Whoami => "whoami",
            Self::Alias { .. } => "alias",
        }
    }
}

/// Result of parsing a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    /// A recognized directive
    Directive(Directive),
    /// Plain chat text to relay. Unrecognized `/word` text lands here too.
    Message(String),
}

impl ParseResult {
    pub fn is_directive(&self) -> bool {
        matches!(self, ParseResult::Directive(_))
    }

    pub fn as_directive(&self) -> Option<&Directive> {
        match self {
            ParseResult::Directive(d) => Some(d),
            _ => None,
        }
    }
}

/// Split text on the first space into `(command, arg)`.
///
/// `arg` is empty when there is no space. No trimming is applied, so
/// `"/alias  Bob"` yields the argument `" Bob"`.
pub fn split_command(text: &str) -> (&str, &str) {
    text.split_once(' ').unwrap_or((text, ""))
}

/// Parse a chat message body.
///
/// Only the exact literals `/whois`, `/whoami` and `/alias` act as
/// directives. Anything else, including empty text and unknown `/word`
/// commands, is relayed verbatim as a plain message.
pub fn parse_message(text: &str) -> ParseResult {
    let (command, arg) = split_command(text);

    if !command.starts_with(DIRECTIVE_PREFIX) {
        return ParseResult::Message(text.to_string());
    }

    // Unknown `/word` commands fall through and are broadcast as chat.
    match command {
        "/whois" => ParseResult::Directive(Directive::Whois {
            alias: arg.to_string(),
        }),
        "/whoami" => ParseResult::Directive(Directive::Whoami),
        "/alias" => ParseResult::Directive(Directive::Alias {
            alias: arg.to_string(),
        }),
        _ => ParseResult::Message(text.to_string()),
    }
}
