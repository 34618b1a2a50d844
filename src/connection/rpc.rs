//! RPC call and reply model shared by the module and the device session.
//!
//! An [`RpcCall`] is what `junos_rpc` asks the device to run; an [`RpcReply`]
//! is what comes back, shaped by the requested [`OutputFormat`]. XML handling
//! is string based: replies are only ever sliced into elements, stripped to
//! text, or written back out with the envelope's namespace prefixes
//! redeclared on the payload root.

use crate::connection::{ConnectionError, ConnectionResult};
use crate::modules::network::kwargs::{KwargValue, KwargsMap};
use crate::modules::ModuleError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// `xmlns:prefix="uri"` attribute inside a start tag
static NAMESPACE_DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bxmlns:([\w.-]+)\s*=\s*("[^"]*"|'[^']*')"#)
        .expect("Invalid namespace declaration regex")
});

/// RPC name that maps to Junos `<get-configuration>`
pub const GET_CONFIG_RPC: &str = "get-config";

/// Junos element the `get-config` RPC is rendered as
const GET_CONFIGURATION_TAG: &str = "get-configuration";

// ============================================================================
// Output Format
// ============================================================================

/// Reply format requested from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable CLI output wrapped in `<output>`
    Text,
    /// Native XML (default)
    #[default]
    Xml,
    /// JSON (Junos 14.2+)
    Json,
}

impl OutputFormat {
    /// Value sent in the RPC `format` attribute
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Xml => "xml",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = ModuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "xml" => Ok(OutputFormat::Xml),
            "json" => Ok(OutputFormat::Json),
            _ => Err(ModuleError::InvalidParameter(format!(
                "Invalid format '{}'. Valid formats: text, xml, json",
                s
            ))),
        }
    }
}

// ============================================================================
// RPC Call
// ============================================================================

/// A single RPC invocation.
///
/// `options` become attributes of the RPC element, `kwargs` become child
/// elements, and `filter_xml` is embedded as a `<configuration>` subtree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RpcCall {
    /// Normalized (hyphenated) RPC name
    pub name: String,
    /// Options rendered as attributes; always carries `format`
    pub options: KwargsMap,
    /// Keyword arguments rendered as child elements
    pub kwargs: KwargsMap,
    /// Configuration filter document (`get-config` only)
    pub filter_xml: Option<String>,
}

impl RpcCall {
    /// Create a call with no options or arguments
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize_rpc_name(name),
            ..Default::default()
        }
    }

    /// Whether this is the configuration-retrieval RPC
    pub fn is_get_config(&self) -> bool {
        self.name == GET_CONFIG_RPC
    }

    /// Requested reply format; XML unless the options say otherwise
    pub fn format(&self) -> OutputFormat {
        self.options
            .get("format")
            .and_then(KwargValue::as_str)
            .and_then(|f| f.parse().ok())
            .unwrap_or_default()
    }

    /// Element name used on the wire
    pub fn tag(&self) -> &str {
        if self.is_get_config() {
            GET_CONFIGURATION_TAG
        } else {
            &self.name
        }
    }

    /// Render the call as the body of a NETCONF `<rpc>` element
    pub fn to_xml(&self) -> String {
        let tag = self.tag();
        let mut xml = format!("<{}", tag);

        for (name, value) in &self.options {
            match value {
                KwargValue::Str(s) => xml.push_str(&format!(" {}=\"{}\"", name, escape_xml(s))),
                KwargValue::Bool(true) => xml.push_str(&format!(" {}=\"{}\"", name, name)),
                KwargValue::Bool(false) => {}
            }
        }

        let mut body = String::new();
        for (name, value) in &self.kwargs {
            let element = name.replace('_', "-");
            match value {
                KwargValue::Str(s) => {
                    body.push_str(&format!("<{0}>{1}</{0}>", element, escape_xml(s)))
                }
                KwargValue::Bool(true) => body.push_str(&format!("<{}/>", element)),
                KwargValue::Bool(false) => {}
            }
        }

        if let Some(ref filter) = self.filter_xml {
            let filter = strip_xml_declaration(filter);
            if !filter.is_empty() {
                if root_tag(filter) == Some("configuration") {
                    body.push_str(filter);
                } else {
                    body.push_str(&format!("<configuration>{}</configuration>", filter));
                }
            }
        }

        if body.is_empty() {
            xml.push_str("/>");
        } else {
            xml.push('>');
            xml.push_str(&body);
            xml.push_str(&format!("</{}>", tag));
        }
        xml
    }
}

/// Trim an RPC name and turn `snake_case` spelling into Junos hyphens
pub fn normalize_rpc_name(name: &str) -> String {
    name.trim().replace('_', "-")
}

// ============================================================================
// RPC Reply
// ============================================================================

/// Reply to an [`RpcCall`]
#[derive(Debug, Clone, PartialEq)]
pub enum RpcReply {
    /// An XML element (xml and text formats)
    Document(XmlDocument),
    /// Plain text with no enclosing element
    Text(String),
    /// Parsed JSON (json format)
    Data(serde_json::Value),
}

impl RpcReply {
    /// Decode the raw `<rpc-reply>` message for the given format.
    ///
    /// Any `<rpc-error>` whose severity is not `warning` turns the whole
    /// reply into [`ConnectionError::RpcFailed`].
    pub fn decode(raw: &str, format: OutputFormat) -> ConnectionResult<Self> {
        let errors: Vec<RpcError> = RpcError::parse_all(raw)
            .into_iter()
            .filter(|e| !e.is_warning())
            .collect();
        if !errors.is_empty() {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ConnectionError::RpcFailed(message));
        }

        let content = reply_content(raw).trim();
        if content.is_empty() {
            return Ok(RpcReply::Text(String::new()));
        }
        let namespaces = envelope_namespaces(raw);
        let document = |xml: &str| {
            RpcReply::Document(XmlDocument::new(redeclare_namespaces(xml, &namespaces)))
        };

        match format {
            OutputFormat::Json => {
                let data = serde_json::from_str(content)
                    .or_else(|_| serde_json::from_str(&unescape_xml(content)))
                    .map_err(|e| {
                        ConnectionError::RpcFailed(format!("Invalid JSON in RPC reply: {}", e))
                    })?;
                Ok(RpcReply::Data(data))
            }
            OutputFormat::Text => {
                let output = find_element(content, "output")
                    .or_else(|| first_payload_element(content))
                    .map(document);
                Ok(output.unwrap_or_else(|| RpcReply::Text(unescape_xml(content))))
            }
            OutputFormat::Xml => Ok(first_payload_element(content)
                .map(document)
                .unwrap_or_else(|| RpcReply::Text(unescape_xml(content)))),
        }
    }
}

/// A single XML element, kept as its serialized text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    xml: String,
}

impl XmlDocument {
    pub fn new(xml: impl Into<String>) -> Self {
        Self { xml: xml.into() }
    }

    /// Name of the root element, if the document has one
    pub fn root_tag(&self) -> Option<&str> {
        root_tag(&self.xml)
    }

    /// Serialized document
    pub fn as_str(&self) -> &str {
        &self.xml
    }

    /// Concatenated character data with tags, comments and CDATA markers
    /// removed and entities decoded
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        let mut rest = self.xml.as_str();

        while let Some(lt) = rest.find('<') {
            out.push_str(&unescape_xml(&rest[..lt]));
            let tail = &rest[lt..];

            if let Some(body) = tail.strip_prefix("<![CDATA[") {
                match body.find("]]>") {
                    Some(end) => {
                        out.push_str(&body[..end]);
                        rest = &body[end + 3..];
                    }
                    None => {
                        out.push_str(body);
                        rest = "";
                    }
                }
            } else if let Some(body) = tail.strip_prefix("<!--") {
                rest = body.find("-->").map_or("", |end| &body[end + 3..]);
            } else {
                rest = tail.find('>').map_or("", |end| &tail[end + 1..]);
            }
        }

        out.push_str(&unescape_xml(rest));
        out
    }
}

impl fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.xml)
    }
}

// ============================================================================
// RPC Errors
// ============================================================================

/// A NETCONF `<rpc-error>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    /// Error type (protocol, application, etc.)
    pub error_type: String,
    /// Error tag (e.g., invalid-value, operation-failed)
    pub error_tag: String,
    /// Error severity (error, warning)
    pub error_severity: String,
    /// Error message
    pub error_message: Option<String>,
    /// Error path
    pub error_path: Option<String>,
}

impl RpcError {
    /// Collect every `<rpc-error>` in a reply
    pub fn parse_all(reply: &str) -> Vec<Self> {
        let mut errors = Vec::new();
        let mut search_start = 0;

        while let Some(xml) = find_element(&reply[search_start..], "rpc-error") {
            errors.push(Self::parse(xml));
            let offset = reply[search_start..].find(xml).unwrap_or(0);
            search_start += offset + xml.len();
        }

        errors
    }

    fn parse(xml: &str) -> Self {
        RpcError {
            error_type: element_text(xml, "error-type").unwrap_or_default(),
            error_tag: element_text(xml, "error-tag").unwrap_or_default(),
            error_severity: element_text(xml, "error-severity")
                .unwrap_or_else(|| "error".to_string()),
            error_message: element_text(xml, "error-message"),
            error_path: element_text(xml, "error-path"),
        }
    }

    pub fn is_warning(&self) -> bool {
        self.error_severity.eq_ignore_ascii_case("warning")
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.error_tag,
            self.error_message.as_deref().unwrap_or("Unknown error")
        )?;
        if let Some(ref path) = self.error_path {
            write!(f, " at {}", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// XML Helpers
// ============================================================================

/// Escape special XML characters in text content
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Decode the predefined XML entities and numeric character references.
/// Unknown entities are left as they are.
pub fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let decoded = tail.find(';').and_then(|semi| {
            let entity = &tail[1..semi];
            let ch = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi))
        });

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// `xml` trimmed, without a leading `<?...?>` declaration
fn strip_xml_declaration(xml: &str) -> &str {
    let xml = xml.trim();
    xml.strip_prefix("<?")
        .and_then(|rest| rest.find("?>").map(|end| rest[end + 2..].trim_start()))
        .unwrap_or(xml)
}

/// Name of the first element in `xml`, skipping declarations and comments
fn root_tag(xml: &str) -> Option<&str> {
    let start = first_element_start(xml)?;
    Some(tag_name_at(xml, start))
}

/// Name of the element whose `<` is at `start`
fn tag_name_at(xml: &str, start: usize) -> &str {
    let after = &xml[start + 1..];
    let end = after
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(after.len());
    &after[..end]
}

/// Offset of the first start tag, skipping `<?...?>` and `<!...>` nodes
fn first_element_start(xml: &str) -> Option<usize> {
    let mut pos = 0;
    while let Some(lt) = xml[pos..].find('<') {
        let abs = pos + lt;
        let tail = &xml[abs..];
        if tail.starts_with("<?") {
            pos = abs + tail.find("?>")? + 2;
        } else if tail.starts_with("<!--") {
            pos = abs + tail.find("-->")? + 3;
        } else if tail.starts_with("<!") || tail.starts_with("</") {
            pos = abs + tail.find('>')? + 1;
        } else {
            return Some(abs);
        }
    }
    None
}

/// Slice out the element starting at `start`, matching nested elements of
/// the same name
fn element_at(xml: &str, start: usize) -> Option<&str> {
    let name = tag_name_at(xml, start);
    if name.is_empty() {
        return None;
    }

    let open_end = start + xml[start..].find('>')?;
    if xml[..open_end].ends_with('/') {
        return Some(&xml[start..=open_end]);
    }

    let open = format!("<{}", name);
    let close = format!("</{}>", name);
    let mut depth = 1;
    let mut pos = open_end + 1;

    while depth > 0 {
        let next_close = pos + xml[pos..].find(&close)?;
        let mut scan = pos;
        while let Some(found) = xml[scan..next_close].find(&open) {
            let abs = scan + found;
            let boundary = xml[abs + open.len()..].chars().next();
            if matches!(boundary, Some(c) if c.is_whitespace() || c == '>' || c == '/') {
                let tag_end = abs + xml[abs..].find('>')?;
                if !xml[..tag_end].ends_with('/') {
                    depth += 1;
                }
            }
            scan = abs + open.len();
        }
        depth -= 1;
        pos = next_close + close.len();
    }

    Some(&xml[start..pos])
}

/// First top-level element that is not an `<rpc-error>`
fn first_payload_element(xml: &str) -> Option<&str> {
    let mut pos = 0;
    loop {
        let start = pos + first_element_start(&xml[pos..])?;
        let element = element_at(xml, start)?;
        if tag_name_at(xml, start) != "rpc-error" {
            return Some(element);
        }
        pos = start + element.len();
    }
}

/// First element named `tag` anywhere in `xml`
fn find_element<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}", tag);
    let mut pos = 0;
    while let Some(found) = xml[pos..].find(&open) {
        let abs = pos + found;
        let boundary = xml[abs + open.len()..].chars().next();
        if matches!(boundary, Some(c) if c.is_whitespace() || c == '>' || c == '/') {
            return element_at(xml, abs);
        }
        pos = abs + open.len();
    }
    None
}

/// Trimmed, unescaped text of the first element named `tag`
fn element_text(xml: &str, tag: &str) -> Option<String> {
    find_element(xml, tag).map(|el| XmlDocument::new(el).text_content().trim().to_string())
}

/// Prefixed namespace declarations on the `<rpc-reply>` start tag, as
/// `(prefix, quoted uri)` pairs
fn envelope_namespaces(raw: &str) -> Vec<(&str, &str)> {
    let Some(start) = raw.find("<rpc-reply") else {
        return Vec::new();
    };
    let Some(end) = raw[start..].find('>').map(|i| start + i) else {
        return Vec::new();
    };
    NAMESPACE_DECL_RE
        .captures_iter(&raw[start..end])
        .filter_map(|caps| {
            let prefix = caps.get(1)?.as_str();
            let uri = caps.get(2)?.as_str();
            Some((prefix, uri))
        })
        .collect()
}

/// Copy of `element` whose root start tag declares every prefix in
/// `namespaces` it does not already declare itself
fn redeclare_namespaces(element: &str, namespaces: &[(&str, &str)]) -> String {
    let Some(start) = first_element_start(element) else {
        return element.to_string();
    };
    let Some(open_end) = element[start..].find('>').map(|i| start + i) else {
        return element.to_string();
    };
    let insert_at = if element[..open_end].ends_with('/') {
        open_end - 1
    } else {
        open_end
    };

    let start_tag = &element[start..open_end];
    let declared: Vec<&str> = NAMESPACE_DECL_RE
        .captures_iter(start_tag)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();

    let mut extra = String::new();
    for (prefix, uri) in namespaces {
        if !declared.contains(prefix) {
            extra.push_str(&format!(" xmlns:{}={}", prefix, uri));
        }
    }
    if extra.is_empty() {
        return element.to_string();
    }

    let mut out = String::with_capacity(element.len() + extra.len());
    out.push_str(element[..insert_at].trim_end());
    out.push_str(&extra);
    out.push_str(&element[insert_at..]);
    out
}

/// Content between `<rpc-reply ...>` and `</rpc-reply>`, or the whole
/// message when there is no envelope
fn reply_content(raw: &str) -> &str {
    let Some(start) = raw.find("<rpc-reply") else {
        return raw;
    };
    let Some(open_end) = raw[start..].find('>').map(|i| start + i) else {
        return raw;
    };
    if raw[..open_end].ends_with('/') {
        return "";
    }
    let end = raw.rfind("</rpc-reply>").unwrap_or(raw.len());
    if end <= open_end {
        return "";
    }
    &raw[open_end + 1..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("XML".parse::<OutputFormat>().unwrap(), OutputFormat::Xml);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default(), OutputFormat::Xml);
    }

    #[test]
    fn test_normalize_rpc_name() {
        assert_eq!(
            normalize_rpc_name(" get_interface_information "),
            "get-interface-information"
        );
        assert_eq!(normalize_rpc_name("get-config"), "get-config");
    }

    #[test]
    fn test_call_to_xml_with_kwargs() {
        let mut call = RpcCall::new("get_interface_information");
        call.options.insert("format".into(), KwargValue::from("text"));
        call.kwargs.insert("interface_name".into(), KwargValue::from("em0"));
        call.kwargs.insert("media".into(), KwargValue::Bool(true));
        call.kwargs.insert("terse".into(), KwargValue::Bool(false));

        assert_eq!(
            call.to_xml(),
            "<get-interface-information format=\"text\">\
             <interface-name>em0</interface-name><media/>\
             </get-interface-information>"
        );
    }

    #[test]
    fn test_call_to_xml_without_body_is_self_closing() {
        let mut call = RpcCall::new("get-software-information");
        call.options.insert("format".into(), KwargValue::from("xml"));
        assert_eq!(call.to_xml(), "<get-software-information format=\"xml\"/>");
    }

    #[test]
    fn test_get_config_wraps_filter() {
        let mut call = RpcCall::new("get_config");
        assert!(call.is_get_config());
        call.options.insert("format".into(), KwargValue::from("xml"));
        call.filter_xml = Some("<system><services/></system>".into());

        assert_eq!(
            call.to_xml(),
            "<get-configuration format=\"xml\">\
             <configuration><system><services/></system></configuration>\
             </get-configuration>"
        );
    }

    #[test]
    fn test_get_config_keeps_configuration_root() {
        let mut call = RpcCall::new("get-config");
        call.filter_xml = Some("<configuration><interfaces/></configuration>".into());
        assert_eq!(
            call.to_xml(),
            "<get-configuration><configuration><interfaces/></configuration></get-configuration>"
        );
    }

    #[test]
    fn test_get_config_drops_filter_declaration() {
        let mut call = RpcCall::new("get-config");
        call.filter_xml = Some(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<configuration><system/></configuration>"
                .into(),
        );
        assert_eq!(
            call.to_xml(),
            "<get-configuration><configuration><system/></configuration></get-configuration>"
        );

        call.filter_xml = Some("<?xml version=\"1.0\"?>".into());
        assert_eq!(call.to_xml(), "<get-configuration/>");
    }

    #[test]
    fn test_call_escapes_values() {
        let mut call = RpcCall::new("get-route-information");
        call.kwargs.insert("destination".into(), KwargValue::from("a<b&c"));
        assert!(call.to_xml().contains("<destination>a&lt;b&amp;c</destination>"));
    }

    #[test]
    fn test_call_format_defaults_to_xml() {
        let call = RpcCall::new("get-chassis-inventory");
        assert_eq!(call.format(), OutputFormat::Xml);
    }

    #[test]
    fn test_decode_xml_redeclares_envelope_prefixes() {
        let raw = r#"<rpc-reply xmlns="urn:ietf:params:xml:ns:netconf:base:1.0" xmlns:junos="http://xml.juniper.net/junos/21.4R0/junos">
<interface-information junos:style="terse"><name>em0</name></interface-information>
</rpc-reply>"#;
        match RpcReply::decode(raw, OutputFormat::Xml).unwrap() {
            RpcReply::Document(doc) => assert_eq!(
                doc.as_str(),
                r#"<interface-information junos:style="terse" xmlns:junos="http://xml.juniper.net/junos/21.4R0/junos"><name>em0</name></interface-information>"#
            ),
            other => panic!("expected a document, got {:?}", other),
        }
    }

    #[test]
    fn test_redeclare_namespaces_keeps_own_declarations() {
        let namespaces = [("junos", "\"urn:envelope\""), ("ns0", "'urn:other'")];
        assert_eq!(
            redeclare_namespaces(r#"<a xmlns:junos="urn:own"/>"#, &namespaces),
            r#"<a xmlns:junos="urn:own" xmlns:ns0='urn:other'/>"#
        );
        assert_eq!(redeclare_namespaces("<a>x</a>", &[]), "<a>x</a>");
    }

    #[test]
    fn test_decode_xml_reply() {
        let raw = r#"<rpc-reply xmlns:junos="http://xml.juniper.net/junos/15.1R1/junos" message-id="2">
<software-information>
<host-name>vsrx</host-name>
</software-information>
</rpc-reply>"#;
        let reply = RpcReply::decode(raw, OutputFormat::Xml).unwrap();
        match reply {
            RpcReply::Document(doc) => {
                assert_eq!(doc.root_tag(), Some("software-information"));
                assert!(doc.as_str().ends_with("</software-information>"));
                assert_eq!(doc.text_content().trim(), "vsrx");
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_decode_text_reply() {
        let raw = "<rpc-reply><output>\nPhysical interface: em0, Enabled\n  MTU &gt; 1500\n</output></rpc-reply>";
        let reply = RpcReply::decode(raw, OutputFormat::Text).unwrap();
        match reply {
            RpcReply::Document(doc) => {
                assert_eq!(doc.root_tag(), Some("output"));
                assert_eq!(
                    doc.text_content(),
                    "\nPhysical interface: em0, Enabled\n  MTU > 1500\n"
                );
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_decode_json_reply() {
        let raw = r#"<rpc-reply message-id="3">
{"software-information": [{"host-name": [{"data": "vsrx"}]}]}
</rpc-reply>"#;
        let reply = RpcReply::decode(raw, OutputFormat::Json).unwrap();
        assert_eq!(
            reply,
            RpcReply::Data(serde_json::json!({
                "software-information": [{"host-name": [{"data": "vsrx"}]}]
            }))
        );
    }

    #[test]
    fn test_decode_invalid_json_fails() {
        let raw = "<rpc-reply>{not json</rpc-reply>";
        assert!(matches!(
            RpcReply::decode(raw, OutputFormat::Json),
            Err(ConnectionError::RpcFailed(_))
        ));
    }

    #[test]
    fn test_decode_rpc_error() {
        let raw = r#"<rpc-reply>
<rpc-error>
<error-type>protocol</error-type>
<error-tag>operation-failed</error-tag>
<error-severity>error</error-severity>
<error-message>syntax error, expecting &lt;command&gt;</error-message>
</rpc-error>
</rpc-reply>"#;
        let err = RpcReply::decode(raw, OutputFormat::Xml).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("operation-failed"));
        assert!(message.contains("syntax error, expecting <command>"));
    }

    #[test]
    fn test_decode_ignores_warnings() {
        let raw = r#"<rpc-reply>
<rpc-error><error-severity>warning</error-severity><error-message>minor</error-message></rpc-error>
<route-information/>
</rpc-reply>"#;
        match RpcReply::decode(raw, OutputFormat::Xml).unwrap() {
            RpcReply::Document(doc) => assert_eq!(doc.root_tag(), Some("route-information")),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_decode_empty_reply() {
        assert_eq!(
            RpcReply::decode("<rpc-reply/>", OutputFormat::Xml).unwrap(),
            RpcReply::Text(String::new())
        );
    }

    #[test]
    fn test_element_at_handles_nesting() {
        let xml = "<a><a>inner</a><b/></a><c/>";
        assert_eq!(first_payload_element(xml), Some("<a><a>inner</a><b/></a>"));
        assert_eq!(element_at(xml, 3), Some("<a>inner</a>"));
    }

    #[test]
    fn test_text_content_cdata_and_comments() {
        let doc = XmlDocument::new("<output><!-- note --><![CDATA[a < b]]> &amp; c</output>");
        assert_eq!(doc.text_content(), "a < b & c");
    }

    #[test]
    fn test_unescape_xml() {
        assert_eq!(unescape_xml("a &lt;b&gt; &amp;amp;"), "a <b> &amp;");
        assert_eq!(unescape_xml("&#65;&#x42;"), "AB");
        assert_eq!(unescape_xml("&unknown; & done"), "&unknown; & done");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("test"), "test");
        assert_eq!(escape_xml("<test>"), "&lt;test&gt;");
        assert_eq!(escape_xml("a & b"), "a &amp; b");
        assert_eq!(escape_xml("\"quoted\""), "&quot;quoted&quot;");
    }

    #[test]
    fn test_rpc_error_display() {
        let error = RpcError {
            error_type: "application".to_string(),
            error_tag: "invalid-value".to_string(),
            error_severity: "error".to_string(),
            error_message: Some("Invalid interface name".to_string()),
            error_path: Some("/configuration/interfaces".to_string()),
        };

        let display = format!("{}", error);
        assert!(display.contains("invalid-value"));
        assert!(display.contains("Invalid interface name"));
        assert!(display.contains("/configuration/interfaces"));
    }
}
