//! The share-table configuration grammar (`spec.md` §4.4): one directive
//! per line, `#` introduces a comment.
//!
//! ```text
//! share  "<local-path>"  as  "<share-name>"
//! set    "<share-name>"  read-write
//! grant  read[,write] on "<share-name>" to       "<user>"
//! grant  read[,write] on "<share-name>" to group "<group>"
//! authenticate with "<auth-server-host>"
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::lookup_host;

use crate::auth::DEFAULT_AUTH_PORT;
use crate::share::{AclEntry, AuthClass, Rights, Share, SharesSnapshot};

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Syntax { line: usize, message: String },
    DuplicateShare(String),
    UnknownPath(PathBuf),
    UnknownShare(String),
    UnresolvedHost(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Syntax { line, message } => write!(f, "line {line}: {message}"),
            ConfigError::DuplicateShare(name) => write!(f, "duplicate share name: {name}"),
            ConfigError::UnknownPath(path) => write!(f, "share path does not exist: {}", path.display()),
            ConfigError::UnknownShare(name) => write!(f, "grant/set references unknown share: {name}"),
            ConfigError::UnresolvedHost(host) => write!(f, "could not resolve auth host: {host}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// One tokenized, validated line — not yet applied to a [`SharesSnapshot`].
enum Directive {
    Share { path: PathBuf, name: String },
    SetReadWrite { name: String },
    Grant { rights: Rights, share: String, principal: String, is_group: bool },
    AuthenticateWith { host: String },
}

/// Tokenizes and parses every line, stopping at the first error
/// (`spec.md` §4.4). Validation that depends on prior lines (duplicate
/// names, `grant`/`set` referencing an existing share) happens here too,
/// since it needs no I/O.
fn parse_directives(source: &str) -> Result<Vec<Directive>, ConfigError> {
    let mut directives = Vec::new();
    let mut share_names: Vec<String> = Vec::new();

    for (line_no, raw_line) in source.lines().enumerate() {
        let line_no = line_no + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let tokens = tokenize(line, line_no)?;
        let keyword = tokens[0].to_ascii_lowercase();

        let directive = match keyword.as_str() {
            "share" => {
                let (path, name) = parse_share(&tokens, line_no)?;
                if share_names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                    return Err(ConfigError::DuplicateShare(name));
                }
                share_names.push(name.clone());
                Directive::Share { path: PathBuf::from(path), name }
            }
            "set" => {
                let name = parse_set(&tokens, line_no)?;
                require_known_share(&share_names, &name)?;
                Directive::SetReadWrite { name }
            }
            "grant" => {
                let (rights, share, principal, is_group) = parse_grant(&tokens, line_no)?;
                require_known_share(&share_names, &share)?;
                Directive::Grant { rights, share, principal, is_group }
            }
            "authenticate" => {
                let host = parse_authenticate(&tokens, line_no)?;
                Directive::AuthenticateWith { host }
            }
            "printer" => {
                // Print-spool config is a Non-goal (`spec.md` §1); reject
                // rather than silently accept so a reload surfaces the gap.
                return Err(ConfigError::Syntax {
                    line: line_no,
                    message: "printer shares are not supported".to_string(),
                });
            }
            other => {
                return Err(ConfigError::Syntax {
                    line: line_no,
                    message: format!("unknown directive: {other}"),
                })
            }
        };
        directives.push(directive);
    }

    Ok(directives)
}

fn require_known_share(known: &[String], name: &str) -> Result<(), ConfigError> {
    if known.iter().any(|n| n.eq_ignore_ascii_case(name)) {
        Ok(())
    } else {
        Err(ConfigError::UnknownShare(name.to_string()))
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Whitespace-separated words; a `"..."` run is a single token.
fn tokenize(line: &str, line_no: usize) -> Result<Vec<String>, ConfigError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut buf = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '"' {
                    closed = true;
                    break;
                }
                buf.push(c);
            }
            if !closed {
                return Err(ConfigError::Syntax {
                    line: line_no,
                    message: "unterminated quoted string".to_string(),
                });
            }
            tokens.push(buf);
        } else {
            let mut buf = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                buf.push(c);
                chars.next();
            }
            tokens.push(buf);
        }
    }

    if tokens.is_empty() {
        return Err(ConfigError::Syntax { line: line_no, message: "empty directive".to_string() });
    }
    Ok(tokens)
}

fn expect_keyword(tokens: &[String], index: usize, keyword: &str, line_no: usize) -> Result<(), ConfigError> {
    match tokens.get(index) {
        Some(tok) if tok.eq_ignore_ascii_case(keyword) => Ok(()),
        _ => Err(ConfigError::Syntax {
            line: line_no,
            message: format!("expected `{keyword}` at position {index}"),
        }),
    }
}

fn parse_share(tokens: &[String], line_no: usize) -> Result<(String, String), ConfigError> {
    if tokens.len() != 4 {
        return Err(ConfigError::Syntax { line: line_no, message: "share: expected 4 tokens".to_string() });
    }
    expect_keyword(tokens, 2, "as", line_no)?;
    Ok((tokens[1].clone(), tokens[3].clone()))
}

fn parse_set(tokens: &[String], line_no: usize) -> Result<String, ConfigError> {
    if tokens.len() != 3 || !tokens[2].eq_ignore_ascii_case("read-write") {
        return Err(ConfigError::Syntax {
            line: line_no,
            message: "set: expected `set \"<name>\" read-write`".to_string(),
        });
    }
    Ok(tokens[1].clone())
}

fn parse_grant(tokens: &[String], line_no: usize) -> Result<(Rights, String, String, bool), ConfigError> {
    if tokens.len() < 5 {
        return Err(ConfigError::Syntax { line: line_no, message: "grant: too few tokens".to_string() });
    }
    let mut rights = Rights::NONE;
    for word in tokens[1].split(',') {
        match word.to_ascii_lowercase().as_str() {
            "read" => rights = rights | Rights::READ,
            "write" => rights = rights | Rights::WRITE,
            other => {
                return Err(ConfigError::Syntax {
                    line: line_no,
                    message: format!("grant: unknown right `{other}`"),
                })
            }
        }
    }
    expect_keyword(tokens, 2, "on", line_no)?;
    let share = tokens[3].clone();
    expect_keyword(tokens, 4, "to", line_no)?;

    let (principal, is_group) = if tokens.get(5).map(|t| t.eq_ignore_ascii_case("group")).unwrap_or(false) {
        let name = tokens.get(6).ok_or(ConfigError::Syntax {
            line: line_no,
            message: "grant: missing group name".to_string(),
        })?;
        (name.clone(), true)
    } else {
        let name = tokens.get(5).ok_or(ConfigError::Syntax {
            line: line_no,
            message: "grant: missing user name".to_string(),
        })?;
        (name.clone(), false)
    };

    Ok((rights, share, principal, is_group))
}

fn parse_authenticate(tokens: &[String], line_no: usize) -> Result<String, ConfigError> {
    if tokens.len() != 3 {
        return Err(ConfigError::Syntax {
            line: line_no,
            message: "authenticate: expected `authenticate with \"<host>\"`".to_string(),
        });
    }
    expect_keyword(tokens, 1, "with", line_no)?;
    Ok(tokens[2].clone())
}

/// Applies parsed directives in order, building the [`SharesSnapshot`].
/// Resolves the `authenticate with` host via DNS; on success every share's
/// auth class flips to `External` (`spec.md` §4.4).
pub async fn load(source: &str, auth_port: u16) -> Result<SharesSnapshot, ConfigError> {
    let directives = parse_directives(source)?;

    let mut shares: Vec<Share> = Vec::new();
    let mut auth_server = None;

    for directive in directives {
        match directive {
            Directive::Share { path, name } => {
                if !crate::share::root_exists(&path) {
                    return Err(ConfigError::UnknownPath(path));
                }
                shares.push(Share {
                    name,
                    local_path: path,
                    read_only: true,
                    auth_class: AuthClass::None,
                    acl: Vec::new(),
                });
            }
            Directive::SetReadWrite { name } => {
                find_share_mut(&mut shares, &name)?.read_only = false;
            }
            Directive::Grant { rights, share, principal, is_group } => {
                find_share_mut(&mut shares, &share)?.acl.push(AclEntry { principal, rights, is_group });
            }
            Directive::AuthenticateWith { host } => {
                let addr = resolve_auth_host(&host, auth_port).await?;
                auth_server = Some(addr);
                for share in &mut shares {
                    share.auth_class = AuthClass::External;
                }
            }
        }
    }

    Ok(SharesSnapshot { shares, auth_server })
}

fn find_share_mut<'a>(shares: &'a mut [Share], name: &str) -> Result<&'a mut Share, ConfigError> {
    shares
        .iter_mut()
        .find(|s| s.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| ConfigError::UnknownShare(name.to_string()))
}

async fn resolve_auth_host(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    lookup_host((host, port))
        .await
        .ok()
        .and_then(|mut it| it.next())
        .ok_or_else(|| ConfigError::UnresolvedHost(host.to_string()))
}
