use crate::{client::PushDirective, error::Error};

/// `fetch <sha> <name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchDirective {
    pub sha: String,
    pub name: String,
}

/// One line of the remote-helper protocol, decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Blank line: batch terminator, or end of session when nothing is pending
    Blank,
    Capabilities,
    Option { name: String, value: String },
    List { for_push: bool },
    Fetch(Option<FetchDirective>),
    /// Malformed directives decode to `Err` and are dropped by the engine
    Push(Result<PushDirective, String>),
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Blank;
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        match name {
            "capabilities" => Command::Capabilities,
            "option" => {
                let (name, value) = rest.split_once(' ').unwrap_or((rest, ""));
                Command::Option {
                    name: name.to_string(),
                    value: value.trim().to_string(),
                }
            }
            "list" => Command::List {
                for_push: rest == "for-push",
            },
            "fetch" => {
                let mut parts = rest.split_whitespace();
                Command::Fetch(parts.next().map(|sha| FetchDirective {
                    sha: sha.to_string(),
                    name: parts.next().unwrap_or_default().to_string(),
                }))
            }
            "push" => Command::Push(parse_push(rest).map_err(|e| e.to_string())),
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Parse `<src> <dst>` or `<src>:<dst>`; a leading `+` on either side forces.
pub fn parse_push(spec: &str) -> Result<PushDirective, Error> {
    let tokens: Vec<&str> = spec.split_whitespace().collect();
    let (src, dst) = match tokens.as_slice() {
        [single] => single
            .split_once(':')
            .ok_or_else(|| Error::Directive(format!("missing ':' in '{}'", single)))?,
        [src, dst, ..] => (*src, *dst),
        [] => return Err(Error::Directive("empty push directive".to_string())),
    };

    let (src, src_forced) = strip_force(src);
    let (dst, dst_forced) = strip_force(dst);
    Ok(PushDirective {
        src: src.to_string(),
        dst: dst.to_string(),
        force: src_forced || dst_forced,
    })
}

fn strip_force(field: &str) -> (&str, bool) {
    match field.strip_prefix('+') {
        Some(stripped) => (stripped, true),
        None => (field, false),
    }
}
