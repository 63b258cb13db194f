//! Canned POP3 responses
//!
//! Commands are keyed by their first four bytes, uppercased. Every
//! match answers with a fixed string; some also carry a [`Handler`]
//! that runs after the response has been sent.

/// Greeting sent as soon as a connection is accepted.
pub const BANNER: &str = "+OK POP3 PROXY server ready blackhole.smtp.localhost\r\n";

/// Reply to any command without a table entry.
pub const ACK: &str = "+OK\r\n";

/// Final reply to every `AUTH` exchange.
pub const AUTH_READY: &str = "+OK Maildrop locked and ready\r\n";

/// SASL continuation prompt.
pub const AUTH_CONTINUE: &str = "+\r\n";

/// Length of the dispatch key.
pub const PREFIX_LEN: usize = 4;

/// Follow-up action attached to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Nothing beyond the canned response.
    None,
    /// Run the SASL sub-negotiation.
    Auth,
    /// Swap the session stream for a TLS one.
    StartTls,
}

/// Canned response plus follow-up for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub response: &'static str,
    pub handler: Handler,
}

impl CommandEntry {
    const fn canned(response: &'static str) -> Self {
        Self {
            response,
            handler: Handler::None,
        }
    }
}

// AUTH writes nothing up front; the negotiator sends everything.
const AUTH: CommandEntry = CommandEntry {
    response: "",
    handler: Handler::Auth,
};

const STAT: CommandEntry = CommandEntry::canned("+OK 0 0\r\n");

const USER: CommandEntry = CommandEntry::canned("+OK Password required\r\n");

const STANDARD: [(&[u8; PREFIX_LEN], CommandEntry); 4] = [
    (
        b"CAPA",
        CommandEntry::canned("+OK Capability list follows\r\nSASL PLAIN\r\n.\r\n"),
    ),
    (b"AUTH", AUTH),
    (b"STAT", STAT),
    (b"USER", USER),
];

const WITH_STARTTLS: [(&[u8; PREFIX_LEN], CommandEntry); 5] = [
    (
        b"CAPA",
        CommandEntry::canned("+OK Capability list follows\r\nSASL PLAIN\r\nSTLS\r\n.\r\n"),
    ),
    (b"AUTH", AUTH),
    (b"STAT", STAT),
    (b"USER", USER),
    (
        b"STLS",
        CommandEntry {
            response: "+OK Begin TLS negotiation\r\n",
            handler: Handler::StartTls,
        },
    ),
];

/// Immutable command table
///
/// Both variants are `'static` arrays, so the table is `Copy` and
/// can be read from any number of sessions at once.
#[derive(Debug, Clone, Copy)]
pub struct ResponseTable {
    entries: &'static [(&'static [u8; PREFIX_LEN], CommandEntry)],
}

impl ResponseTable {
    /// `CAPA`, `AUTH`, `STAT` and `USER`.
    #[must_use]
    pub const fn standard() -> Self {
        Self { entries: &STANDARD }
    }

    /// The standard table plus `STLS`, advertised in `CAPA`.
    #[must_use]
    pub const fn with_starttls() -> Self {
        Self {
            entries: &WITH_STARTTLS,
        }
    }

    /// Look up the entry for a raw client line.
    ///
    /// Only the first [`PREFIX_LEN`] bytes are compared, ignoring
    /// ASCII case. Input shorter than that never matches.
    #[must_use]
    pub fn lookup(&self, line: &[u8]) -> Option<&'static CommandEntry> {
        let prefix = line.get(..PREFIX_LEN)?;
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(prefix))
            .map(|(_, entry)| entry)
    }

    /// Response text for a raw client line, falling back to [`ACK`].
    #[must_use]
    pub fn response_for(&self, line: &[u8]) -> &'static str {
        self.lookup(line).map_or(ACK, |entry| entry.response)
    }
}

impl Default for ResponseTable {
    fn default() -> Self {
        Self::standard()
    }
}
