//! PROPFIND: `207 Multi-Status` bodies describing a resource and, at depth 1, its children.

use std::borrow::Cow;
use std::fmt::Write as _;

use dbfs::{Provider, Resource};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Depth {
    Zero,
    One,
}

impl Depth {
    /// Absent and `infinity` are served as depth 1; listings never recurse.
    pub(super) fn parse(value: Option<&str>) -> Option<Depth> {
        match value.map(str::trim) {
            None => Some(Depth::One),
            Some("0") => Some(Depth::Zero),
            Some("1") => Some(Depth::One),
            Some(other) if other.eq_ignore_ascii_case("infinity") => Some(Depth::One),
            Some(_) => None,
        }
    }
}

#[derive(Debug)]
struct PropEntry {
    href: String,
    display_name: String,
    collection: bool,
    content_type: Option<&'static str>,
    content_length: Option<u64>,
}

/// Returns the multistatus body and how many resources it describes.
pub(super) fn propfind(
    provider: &Provider,
    path: &str,
    depth: Depth,
) -> dbfs::Result<(String, usize)> {
    let resource = provider.resolve(path)?;
    let mut entries = vec![describe(&resource)];
    if depth == Depth::One
        && let Some(collection) = resource.as_collection()
    {
        for child in collection.children()? {
            entries.push(describe(&child));
        }
    }
    Ok((render_multistatus(&entries), entries.len()))
}

fn describe(resource: &Resource) -> PropEntry {
    let display_name = match resource.name() {
        "" => "/".to_string(),
        name => name.to_string(),
    };
    match resource {
        Resource::Collection(collection) => PropEntry {
            href: href(collection.path(), true),
            display_name,
            collection: true,
            content_type: None,
            content_length: None,
        },
        Resource::Artifact(artifact) => {
            let content_length = match artifact.known_length() {
                Ok(length) => length,
                Err(err) => {
                    tracing::warn!(path = %artifact.path(), err = %err, "content length unavailable");
                    None
                }
            };
            PropEntry {
                href: href(artifact.path(), false),
                display_name,
                collection: false,
                content_type: Some(artifact.content_type()),
                content_length,
            }
        }
    }
}

fn href(path: &str, collection: bool) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for byte in path.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~/".contains(&byte) {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    if collection && !out.ends_with('/') {
        out.push('/');
    }
    out
}

fn xml_escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 8);
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            ch => out.push(ch),
        }
    }
    Cow::Owned(out)
}

fn render_multistatus(entries: &[PropEntry]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<D:multistatus xmlns:D=\"DAV:\">\n",
    );
    for entry in entries {
        out.push_str("<D:response>\n");
        let _ = writeln!(out, "<D:href>{}</D:href>", xml_escape(&entry.href));
        out.push_str("<D:propstat>\n<D:prop>\n");
        let _ = writeln!(
            out,
            "<D:displayname>{}</D:displayname>",
            xml_escape(&entry.display_name)
        );
        if entry.collection {
            out.push_str("<D:resourcetype><D:collection/></D:resourcetype>\n");
        } else {
            out.push_str("<D:resourcetype/>\n");
        }
        if let Some(content_type) = entry.content_type {
            let _ = writeln!(
                out,
                "<D:getcontenttype>{}</D:getcontenttype>",
                xml_escape(content_type)
            );
        }
        if let Some(length) = entry.content_length {
            let _ = writeln!(out, "<D:getcontentlength>{length}</D:getcontentlength>");
        }
        out.push_str("</D:prop>\n<D:status>HTTP/1.1 200 OK</D:status>\n</D:propstat>\n");
        out.push_str("</D:response>\n");
    }
    out.push_str("</D:multistatus>\n");
    out
}
