use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::address::{classify_address, AddressClass};
use crate::record::ResolvedEvent;

const CLEARTEXT_ADMIN_PORTS: &[u16] = &[23, 513, 514];
const FTP_PORTS: &[u16] = &[20, 21];
const SNMP_PORTS: &[u16] = &[161, 162];
const SMB_PORT: u16 = 445;
const DATABASE_PORTS: &[u16] = &[1433, 1521, 3306];

static BASIC_AUTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)authorization:\s*basic\s+[A-Za-z0-9+/]+=*").unwrap()
});

// substring match: `new_password=` and `user_pwd=` are assignments too
static PASSWORD_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(password|passwd|pwd|login)=").unwrap()
});

static HTTP_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"HTTP/1\.[01]").unwrap()
});

// bare TLSv1 only: "TLSv1.1", "TLSv1.2" carry a minor separator
static OUTDATED_TLS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"SSLv2|SSLv3|TLSv1(?:[^.]|$)").unwrap()
});

/// The fixed battery of weak-practice rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    CleartextAdmin,
    Telnet,
    Ftp,
    BasicAuth,
    PlainHttpPw,
    SnmpPublic,
    SmbExternal,
    DbExposed,
    OutdatedTls,
}

impl Rule {
    pub const ALL: [Rule; 9] = [
        Rule::CleartextAdmin,
        Rule::Telnet,
        Rule::Ftp,
        Rule::BasicAuth,
        Rule::PlainHttpPw,
        Rule::SnmpPublic,
        Rule::SmbExternal,
        Rule::DbExposed,
        Rule::OutdatedTls,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Rule::CleartextAdmin => "cleartext_admin",
            Rule::Telnet => "telnet",
            Rule::Ftp => "ftp",
            Rule::BasicAuth => "basic_auth",
            Rule::PlainHttpPw => "plain_http_pw",
            Rule::SnmpPublic => "snmp_public",
            Rule::SmbExternal => "smb_external",
            Rule::DbExposed => "db_exposed",
            Rule::OutdatedTls => "outdated_tls",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Rule::CleartextAdmin => "cleartext administrative protocol (telnet/rlogin/rsh, ports 23/513/514)",
            Rule::Telnet => "telnet session (port 23)",
            Rule::Ftp => "FTP control or data channel (ports 20/21)",
            Rule::BasicAuth => "HTTP Basic authorization header",
            Rule::PlainHttpPw => "password-like parameter submitted over plain HTTP/1.x",
            Rule::SnmpPublic => "SNMP with the default 'public' community",
            Rule::SmbExternal => "SMB (445) crossing the private address boundary",
            Rule::DbExposed => "internal host reaching an external database port",
            Rule::OutdatedTls => "SSLv2/SSLv3/TLSv1.0 indicator in payload",
        }
    }

    pub fn matches(self, ev: &ResolvedEvent<'_>) -> bool {
        match self {
            Rule::CleartextAdmin => port_in(ev.destination_port, CLEARTEXT_ADMIN_PORTS),
            Rule::Telnet => ev.destination_port == Some(23),
            Rule::Ftp => port_in(ev.destination_port, FTP_PORTS),
            Rule::BasicAuth => BASIC_AUTH_RE.is_match(ev.payload),
            Rule::PlainHttpPw => plain_http_password(ev.payload),
            Rule::SnmpPublic => port_in(ev.destination_port, SNMP_PORTS) && snmp_default_community(ev.payload),
            Rule::SmbExternal => ev.destination_port == Some(SMB_PORT) && smb_crosses_boundary(ev),
            Rule::DbExposed => port_in(ev.destination_port, DATABASE_PORTS) && database_exposed(ev),
            Rule::OutdatedTls => OUTDATED_TLS_RE.is_match(ev.payload),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every rule that fires for one record, each at most once.
pub fn evaluate<'a>(ev: &'a ResolvedEvent<'a>) -> impl Iterator<Item = Rule> + 'a {
    Rule::ALL.into_iter().filter(move |rule| rule.matches(ev))
}

fn port_in(port: Option<u16>, set: &[u16]) -> bool {
    port.is_some_and(|p| set.contains(&p))
}

fn plain_http_password(payload: &str) -> bool {
    if payload.is_empty() {
        return false;
    }
    let lower = payload.to_ascii_lowercase();
    PASSWORD_PARAM_RE.is_match(payload)
        && HTTP_VERSION_RE.is_match(payload)
        && !lower.contains("tls")
        && !lower.contains("ssl")
}

fn snmp_default_community(payload: &str) -> bool {
    let lower = payload.to_ascii_lowercase();
    lower.contains("public") && lower.contains("community")
}

fn smb_crosses_boundary(ev: &ResolvedEvent<'_>) -> bool {
    let src = classify_address(ev.source_address);
    let dst = classify_address(ev.destination_address);
    src.is_known() && dst.is_known() && !(src == AddressClass::Private && dst == AddressClass::Private)
}

fn database_exposed(ev: &ResolvedEvent<'_>) -> bool {
    classify_address(ev.source_address) == AddressClass::Private
        && classify_address(ev.destination_address) == AddressClass::Public
}

// ---------------------------------------------------------------------------
// Counters
// ---------------------------------------------------------------------------

/// One non-negative count per rule, zeros included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCounters {
    pub cleartext_admin: u64,
    pub telnet: u64,
    pub ftp: u64,
    pub basic_auth: u64,
    pub plain_http_pw: u64,
    pub snmp_public: u64,
    pub smb_external: u64,
    pub db_exposed: u64,
    pub outdated_tls: u64,
}

impl RuleCounters {
    fn slot(&mut self, rule: Rule) -> &mut u64 {
        match rule {
            Rule::CleartextAdmin => &mut self.cleartext_admin,
            Rule::Telnet => &mut self.telnet,
            Rule::Ftp => &mut self.ftp,
            Rule::BasicAuth => &mut self.basic_auth,
            Rule::PlainHttpPw => &mut self.plain_http_pw,
            Rule::SnmpPublic => &mut self.snmp_public,
            Rule::SmbExternal => &mut self.smb_external,
            Rule::DbExposed => &mut self.db_exposed,
            Rule::OutdatedTls => &mut self.outdated_tls,
        }
    }

    pub fn get(&self, rule: Rule) -> u64 {
        match rule {
            Rule::CleartextAdmin => self.cleartext_admin,
            Rule::Telnet => self.telnet,
            Rule::Ftp => self.ftp,
            Rule::BasicAuth => self.basic_auth,
            Rule::PlainHttpPw => self.plain_http_pw,
            Rule::SnmpPublic => self.snmp_public,
            Rule::SmbExternal => self.smb_external,
            Rule::DbExposed => self.db_exposed,
            Rule::OutdatedTls => self.outdated_tls,
        }
    }

    pub fn increment(&mut self, rule: Rule) {
        *self.slot(rule) += 1;
    }

    pub fn merge(&mut self, other: &RuleCounters) {
        for rule in Rule::ALL {
            *self.slot(rule) += other.get(rule);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Rule, u64)> + '_ {
        Rule::ALL.into_iter().map(|rule| (rule, self.get(rule)))
    }

    pub fn total(&self) -> u64 {
        self.iter().map(|(_, n)| n).sum()
    }

    pub fn is_clear(&self) -> bool {
        self.total() == 0
    }
}
