use std::{fmt, net::SocketAddr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

pub const QLAB_TCP_PORT: u16 = 53000;
pub const PROTOCOL_VERSION: &str = "4.6";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "error")]
    NotOk,
}

/// JSON body of every reply and push.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Envelope {
    pub address: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            log::error!("Failed to encode envelope for '{}': {}", self.address, e);
            String::new()
        })
    }
}

/// Transport identity of a remote controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub SocketAddr);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0.ip(), self.0.port())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Argument {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Argument::Bool(b) => Some(*b),
            Argument::Int(i) => Some(*i != 0),
            Argument::Float(f) => Some(*f != 0.0),
            Argument::Str(s) => match s.as_str() {
                "1" | "true" | "yes" => Some(true),
                "0" | "false" | "no" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Argument::Str(s) => s.clone(),
            Argument::Int(i) => i.to_string(),
            Argument::Float(f) => f.to_string(),
            Argument::Bool(b) => (*b as u8).to_string(),
        }
    }
}

/// One decoded inbound message.
#[derive(Debug, Clone)]
pub struct Request {
    pub path: String,
    pub args: Vec<Argument>,
    pub sender: ClientId,
    pub reply_tx: mpsc::UnboundedSender<Outbound>,
}

/// One message on its way to a client: the OSC path it is sent to plus its body.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub path: String,
    pub envelope: Envelope,
}

impl Outbound {
    pub fn reply(envelope: Envelope) -> Self {
        Self {
            path: format!("/reply{}", envelope.address),
            envelope,
        }
    }

    pub fn push(workspace_id: &str, suffix: &[&str], data: Option<Value>) -> Self {
        let mut tokens = vec!["update", "workspace", workspace_id];
        tokens.extend_from_slice(suffix);
        let address = tokens.join("/");
        Self {
            path: format!("/{}", address),
            envelope: Envelope {
                address,
                status: Status::Ok,
                workspace_id: Some(workspace_id.to_string()),
                data,
            },
        }
    }
}

pub fn split_path(path: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = path.split('/').collect();
    if tokens.first() == Some(&"") {
        tokens.remove(0);
    }
    tokens
}

pub fn join_path<S: AsRef<str>>(tokens: &[S]) -> String {
    tokens.iter().fold(String::new(), |mut path, token| {
        path.push('/');
        path.push_str(token.as_ref());
        path
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_join() {
        assert_eq!(split_path("/cue/3/name"), vec!["cue", "3", "name"]);
        assert_eq!(split_path("cue/3"), vec!["cue", "3"]);
        assert_eq!(join_path(&["cue", "3", "name"]), "/cue/3/name");
        assert_eq!(join_path::<&str>(&[]), "");
    }

    #[test]
    fn envelope_omits_missing_fields() {
        let envelope = Envelope {
            address: "/go".to_string(),
            status: Status::NotOk,
            workspace_id: None,
            data: None,
        };
        assert_eq!(envelope.encode(), r#"{"address":"/go","status":"error"}"#);
    }

    #[test]
    fn push_address_is_workspace_scoped() {
        let push = Outbound::push("abc", &["cue_id", "xyz"], None);
        assert_eq!(push.path, "/update/workspace/abc/cue_id/xyz");
        assert_eq!(push.envelope.address, "update/workspace/abc/cue_id/xyz");
        assert_eq!(push.envelope.workspace_id.as_deref(), Some("abc"));
    }

    #[test]
    fn argument_truthiness() {
        assert_eq!(Argument::Int(1).as_bool(), Some(true));
        assert_eq!(Argument::Str("0".to_string()).as_bool(), Some(false));
        assert_eq!(Argument::Str("maybe".to_string()).as_bool(), None);
        assert_eq!(Argument::Bool(true).as_text(), "1");
    }
}
