//! DS publisher (spec 4.J): transfers a zone's current key-signing-key
//! set to the parent, either by notifying an operator or, for the
//! `gandi.net` provider, driving the registrar's XML-RPC API directly.
//!
//! The XML-RPC codec here is a minimal hand-rolled one over `ureq` (a
//! small synchronous HTTP client, already in the dependency stack for
//! exactly this reason — see DESIGN.md): the DS-publisher calls are
//! blocking, request/response, low-volume, and happen from a dedicated
//! blocking task, so pulling in a full XML crate or the async HTTP stack
//! the teacher otherwise uses for its zone-transfer clients would be
//! disproportionate to what four RPC methods need.

use std::fmt;
use std::time::Duration;

use crate::config::DsProvider;

#[derive(Debug)]
pub enum DsPubError {
    Http(String),
    Fault { code: i32, message: String },
    Parse(String),
}

impl fmt::Display for DsPubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DsPubError::Http(msg) => write!(f, "DS publisher HTTP error: {msg}"),
            DsPubError::Fault { code, message } => {
                write!(f, "DS publisher XML-RPC fault {code}: {message}")
            }
            DsPubError::Parse(msg) => write!(f, "DS publisher could not parse response: {msg}"),
        }
    }
}

impl std::error::Error for DsPubError {}

/// How long each DS-publisher API call pauses afterward (spec.md §4.J:
/// "Each API call is followed by a 2-second pause"). Injectable so tests
/// don't have to wait out real time.
pub trait Pause: Send + Sync {
    fn pause(&self);
}

pub struct RealPause;

impl Pause for RealPause {
    fn pause(&self) {
        std::thread::sleep(Duration::from_secs(2));
    }
}

pub struct NoPause;

impl Pause for NoPause {
    fn pause(&self) {}
}

/// Publishes (or simulates publishing) the DS set for `zonename`, whose
/// locally-known keytags are `local_keytags` (all keys from
/// `zskcur`∪`zskpub`∪`kskcur`∪`kskpub`, per spec.md §4.J — in practice
/// only the KSK sets carry DS-eligible keys, but the union is what the
/// spec's diff step names). Returns `true` on success.
pub fn publish(
    provider: &DsProvider,
    api_key: Option<&str>,
    zonename: &str,
    local_keytags: &[u32],
    pause: &dyn Pause,
) -> Result<bool, DsPubError> {
    match provider {
        DsProvider::Dummy => {
            pause.pause();
            Ok(true)
        }
        DsProvider::Gandi => {
            let api_key = api_key.ok_or_else(|| {
                DsPubError::Parse("gandi.net provider configured without roll_provider_key".to_string())
            })?;
            gandi::publish(api_key, zonename, local_keytags, pause)
        }
    }
}

mod gandi {
    use super::{xmlrpc, DsPubError, Pause};

    const ENDPOINT: &str = "https://rpc.gandi.net/xmlrpc/";
    /// The registrar accepts at most this many DS records per call
    /// (spec.md §4.J: "limiting the registrar to at most 4 keys at a
    /// time").
    const MAX_KEYS_PER_CALL: usize = 4;

    pub fn publish(
        api_key: &str,
        zonename: &str,
        local_keytags: &[u32],
        pause: &dyn Pause,
    ) -> Result<bool, DsPubError> {
        let domains = xmlrpc::call(ENDPOINT, "domain.list", &[xmlrpc::Value::String(api_key.to_string())])?;
        pause.pause();
        if !domain_is_owned(&domains, zonename) {
            return Err(DsPubError::Parse(format!("{zonename} not found in domain.list")));
        }

        let remote = xmlrpc::call(
            ENDPOINT,
            "domain.dnssec.list",
            &[
                xmlrpc::Value::String(api_key.to_string()),
                xmlrpc::Value::String(zonename.to_string()),
            ],
        )?;
        pause.pause();
        let remote_keytags = remote_keytags(&remote);

        let to_delete: Vec<u32> = remote_keytags
            .iter()
            .copied()
            .filter(|tag| !local_keytags.contains(tag))
            .collect();
        let to_add: Vec<u32> = local_keytags
            .iter()
            .copied()
            .filter(|tag| !remote_keytags.contains(tag))
            .take(MAX_KEYS_PER_CALL)
            .collect();

        for tag in &to_delete {
            xmlrpc::call(
                ENDPOINT,
                "domain.dnssec.delete",
                &[
                    xmlrpc::Value::String(api_key.to_string()),
                    xmlrpc::Value::String(zonename.to_string()),
                    xmlrpc::Value::Int(*tag as i32),
                ],
            )?;
            pause.pause();
        }

        for tag in &to_add {
            xmlrpc::call(
                ENDPOINT,
                "domain.dnssec.add",
                &[
                    xmlrpc::Value::String(api_key.to_string()),
                    xmlrpc::Value::String(zonename.to_string()),
                    xmlrpc::Value::Int(*tag as i32),
                ],
            )?;
            pause.pause();
        }

        Ok(true)
    }

    fn domain_is_owned(response: &xmlrpc::Value, zonename: &str) -> bool {
        match response {
            xmlrpc::Value::Array(items) => items.iter().any(|item| match item {
                xmlrpc::Value::Struct(members) => members
                    .iter()
                    .any(|(k, v)| k == "fqdn" && matches!(v, xmlrpc::Value::String(s) if s == zonename)),
                xmlrpc::Value::String(s) => s == zonename,
                _ => false,
            }),
            _ => false,
        }
    }

    fn remote_keytags(response: &xmlrpc::Value) -> Vec<u32> {
        match response {
            xmlrpc::Value::Array(items) => items
                .iter()
                .filter_map(|item| match item {
                    xmlrpc::Value::Struct(members) => members.iter().find_map(|(k, v)| {
                        if k == "keytag" {
                            match v {
                                xmlrpc::Value::Int(n) => Some(*n as u32),
                                xmlrpc::Value::String(s) => s.parse().ok(),
                                _ => None,
                            }
                        } else {
                            None
                        }
                    }),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// A minimal XML-RPC request/response codec: enough to call the four
/// Gandi DNSSEC methods the DS publisher needs and parse their replies.
/// Not a general-purpose XML-RPC library.
mod xmlrpc {
    use super::DsPubError;

    #[derive(Debug, Clone)]
    pub enum Value {
        Int(i32),
        String(String),
        Array(Vec<Value>),
        Struct(Vec<(String, Value)>),
    }

    pub fn call(endpoint: &str, method: &str, params: &[Value]) -> Result<Value, DsPubError> {
        let body = encode_request(method, params);
        let response = ureq::post(endpoint)
            .set("Content-Type", "text/xml")
            .send_string(&body)
            .map_err(|e| DsPubError::Http(e.to_string()))?
            .into_string()
            .map_err(|e| DsPubError::Http(e.to_string()))?;
        decode_response(&response)
    }

    fn encode_request(method: &str, params: &[Value]) -> String {
        let mut body = format!("<?xml version=\"1.0\"?>\n<methodCall>\n<methodName>{method}</methodName>\n<params>\n");
        for param in params {
            body.push_str("<param><value>");
            encode_value(param, &mut body);
            body.push_str("</value></param>\n");
        }
        body.push_str("</params>\n</methodCall>\n");
        body
    }

    fn encode_value(value: &Value, out: &mut String) {
        match value {
            Value::Int(n) => out.push_str(&format!("<int>{n}</int>")),
            Value::String(s) => out.push_str(&format!("<string>{}</string>", escape(s))),
            Value::Array(items) => {
                out.push_str("<array><data>");
                for item in items {
                    out.push_str("<value>");
                    encode_value(item, out);
                    out.push_str("</value>");
                }
                out.push_str("</data></array>");
            }
            Value::Struct(members) => {
                out.push_str("<struct>");
                for (name, v) in members {
                    out.push_str(&format!("<member><name>{name}</name><value>"));
                    encode_value(v, out);
                    out.push_str("</value></member>");
                }
                out.push_str("</struct>");
            }
        }
    }

    fn escape(s: &str) -> String {
        s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
    }

    /// Extracts the first `<methodResponse><params>...` value, or raises
    /// a [`DsPubError::Fault`] for a `<fault>` response.
    fn decode_response(xml: &str) -> Result<Value, DsPubError> {
        if let Some(fault_body) = between(xml, "<fault>", "</fault>") {
            let value = parse_value(fault_body)
                .ok_or_else(|| DsPubError::Parse("malformed fault struct".to_string()))?;
            let Value::Struct(members) = value else {
                return Err(DsPubError::Parse("fault was not a struct".to_string()));
            };
            let code = members
                .iter()
                .find(|(k, _)| k == "faultCode")
                .and_then(|(_, v)| if let Value::Int(n) = v { Some(*n) } else { None })
                .unwrap_or(-1);
            let message = members
                .iter()
                .find(|(k, _)| k == "faultString")
                .and_then(|(_, v)| if let Value::String(s) = v { Some(s.clone()) } else { None })
                .unwrap_or_default();
            return Err(DsPubError::Fault { code, message });
        }

        let params = between(xml, "<params>", "</params>")
            .ok_or_else(|| DsPubError::Parse("no <params> in response".to_string()))?;
        let value_body = between(params, "<value>", "</value>")
            .ok_or_else(|| DsPubError::Parse("no <value> in response".to_string()))?;
        parse_value(value_body).ok_or_else(|| DsPubError::Parse("malformed response value".to_string()))
    }

    /// Parses one `<value>`'s inner XML into a [`Value`]. Values without
    /// a type tag default to string, per the XML-RPC spec.
    fn parse_value(body: &str) -> Option<Value> {
        let body = body.trim();
        if let Some(inner) = between(body, "<int>", "</int>").or_else(|| between(body, "<i4>", "</i4>")) {
            return inner.trim().parse().ok().map(Value::Int);
        }
        if let Some(inner) = between(body, "<string>", "</string>") {
            return Some(Value::String(unescape(inner)));
        }
        if let Some(inner) = between(body, "<array>", "</array>") {
            let data = between(inner, "<data>", "</data>").unwrap_or(inner);
            return Some(Value::Array(parse_values(data)));
        }
        if let Some(inner) = between(body, "<struct>", "</struct>") {
            return Some(Value::Struct(parse_members(inner)));
        }
        // No recognized type tag: treat the whole body as a bare string.
        Some(Value::String(unescape(body)))
    }

    fn parse_values(data: &str) -> Vec<Value> {
        let mut values = Vec::new();
        let mut rest = data;
        while let Some(start) = rest.find("<value>") {
            let after = &rest[start + "<value>".len()..];
            let Some(end) = after.find("</value>") else { break };
            if let Some(v) = parse_value(&after[..end]) {
                values.push(v);
            }
            rest = &after[end + "</value>".len()..];
        }
        values
    }

    fn parse_members(body: &str) -> Vec<(String, Value)> {
        let mut members = Vec::new();
        let mut rest = body;
        while let Some(start) = rest.find("<member>") {
            let after = &rest[start + "<member>".len()..];
            let Some(end) = after.find("</member>") else { break };
            let member_body = &after[..end];
            if let (Some(name), Some(value_body)) = (
                between(member_body, "<name>", "</name>"),
                between(member_body, "<value>", "</value>"),
            ) {
                if let Some(v) = parse_value(value_body) {
                    members.push((name.trim().to_string(), v));
                }
            }
            rest = &after[end + "</member>".len()..];
        }
        members
    }

    fn between<'a>(haystack: &'a str, open: &str, close: &str) -> Option<&'a str> {
        let start = haystack.find(open)? + open.len();
        let end = haystack[start..].find(close)? + start;
        Some(&haystack[start..end])
    }

    fn unescape(s: &str) -> String {
        s.replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn encodes_a_simple_request() {
            let body = encode_request("domain.list", &[Value::String("key123".to_string())]);
            assert!(body.contains("<methodName>domain.list</methodName>"));
            assert!(body.contains("<string>key123</string>"));
        }

        #[test]
        fn decodes_an_array_of_structs() {
            let xml = r#"<?xml version="1.0"?>
<methodResponse><params><param><value><array><data>
<value><struct><member><name>keytag</name><value><int>12345</int></value></member></struct></value>
</data></array></value></param></params></methodResponse>"#;
            let value = decode_response(xml).unwrap();
            let Value::Array(items) = value else { panic!("expected array") };
            assert_eq!(items.len(), 1);
            let Value::Struct(members) = &items[0] else { panic!("expected struct") };
            assert!(matches!(members[0], (ref k, Value::Int(12345)) if k == "keytag"));
        }

        #[test]
        fn decodes_a_fault() {
            let xml = r#"<methodResponse><fault><value><struct>
<member><name>faultCode</name><value><int>4</int></value></member>
<member><name>faultString</name><value><string>bad key</string></value></member>
</struct></value></fault></methodResponse>"#;
            let err = decode_response(xml).unwrap_err();
            assert!(matches!(err, DsPubError::Fault { code: 4, .. }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_provider_always_succeeds() {
        let ok = publish(&DsProvider::Dummy, None, "example.com", &[1, 2, 3], &NoPause).unwrap();
        assert!(ok);
    }
}
