// src/pipeline/svg.rs

//! Minimal SVG document model: parse, minify, prefix ids, serialize.
//!
//! Text and attribute values are kept verbatim (entities are not decoded),
//! so serializing a parsed document reproduces its markup.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    /// CDATA section, kept verbatim including its delimiters.
    CData(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| k != name);
    }

    /// `viewBox`, or one derived from plain numeric `width`/`height`.
    pub fn view_box(&self) -> Option<String> {
        if let Some(vb) = self.attr("viewBox") {
            return Some(vb.to_string());
        }
        let num = |v: &str| v.trim_end_matches("px").parse::<f64>().ok();
        let w = num(self.attr("width")?)?;
        let h = num(self.attr("height")?)?;
        Some(format!("0 0 {w} {h}"))
    }

    fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Element)) {
        f(self);
        for child in &mut self.children {
            if let Node::Element(el) = child {
                el.walk_mut(f);
            }
        }
    }

    fn walk(&self, f: &mut dyn FnMut(&Element)) {
        f(self);
        for child in &self.children {
            if let Node::Element(el) = child {
                el.walk(f);
            }
        }
    }
}

/// Parse the root element of an SVG document. Prolog, doctype and
/// comments are dropped.
pub fn parse(src: &str) -> Result<Element, String> {
    let mut parser = Parser { src, pos: 0 };
    let mut root = None;

    while parser.pos < src.len() {
        parser.skip_misc()?;
        if parser.pos >= src.len() {
            break;
        }
        if parser.rest().starts_with('<') {
            if root.is_some() {
                return Err(parser.err("more than one root element"));
            }
            root = Some(parser.element()?);
        } else {
            let text_end = parser.rest().find('<').map_or(src.len(), |i| parser.pos + i);
            if !src[parser.pos..text_end].trim().is_empty() {
                return Err(parser.err("text outside the root element"));
            }
            parser.pos = text_end;
        }
    }

    let root = root.ok_or_else(|| "no root element".to_string())?;
    if root.name != "svg" {
        return Err(format!("root element is <{}>, expected <svg>", root.name));
    }
    Ok(root)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn err(&self, message: &str) -> String {
        let line = self.src[..self.pos].matches('\n').count() + 1;
        format!("line {line}: {message}")
    }

    fn skip_until(&mut self, terminator: &str, what: &str) -> Result<(), String> {
        match self.rest().find(terminator) {
            Some(i) => {
                self.pos += i + terminator.len();
                Ok(())
            }
            None => Err(self.err(&format!("unterminated {what}"))),
        }
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    /// Skip whitespace, `<?...?>`, `<!DOCTYPE ...>` and comments.
    fn skip_misc(&mut self) -> Result<(), String> {
        loop {
            self.skip_ws();
            let rest = self.rest();
            if rest.starts_with("<?") {
                self.skip_until("?>", "processing instruction")?;
            } else if rest.starts_with("<!--") {
                self.skip_until("-->", "comment")?;
            } else if rest.starts_with("<!") && !rest.starts_with("<![CDATA[") {
                self.skip_until(">", "declaration")?;
            } else {
                return Ok(());
            }
        }
    }

    fn name(&mut self) -> Result<String, String> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '/' | '>' | '='))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.err("expected a name"));
        }
        self.pos += len;
        Ok(rest[..len].to_string())
    }

    fn element(&mut self) -> Result<Element, String> {
        self.pos += 1; // '<'
        let mut el = Element::new(self.name()?);

        loop {
            self.skip_ws();
            let rest = self.rest();
            if rest.starts_with("/>") {
                self.pos += 2;
                return Ok(el);
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            if rest.is_empty() {
                return Err(self.err(&format!("unterminated <{}> tag", el.name)));
            }
            let key = self.name()?;
            self.skip_ws();
            if !self.rest().starts_with('=') {
                return Err(self.err(&format!("attribute '{key}' has no value")));
            }
            self.pos += 1;
            self.skip_ws();
            let quote = self
                .rest()
                .chars()
                .next()
                .filter(|c| *c == '"' || *c == '\'')
                .ok_or_else(|| self.err(&format!("attribute '{key}' is not quoted")))?;
            self.pos += 1;
            let end = self
                .rest()
                .find(quote)
                .ok_or_else(|| self.err(&format!("unterminated value of '{key}'")))?;
            let value = self.rest()[..end].to_string();
            self.pos += end + 1;
            el.attrs.push((key, value));
        }

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.err(&format!("<{}> is never closed", el.name)));
            }
            if rest.starts_with("</") {
                self.pos += 2;
                let closing = self.name()?;
                if closing != el.name {
                    return Err(self.err(&format!(
                        "expected </{}>, found </{closing}>",
                        el.name
                    )));
                }
                self.skip_ws();
                if !self.rest().starts_with('>') {
                    return Err(self.err("malformed closing tag"));
                }
                self.pos += 1;
                return Ok(el);
            }
            if rest.starts_with("<![CDATA[") {
                let start = self.pos;
                self.skip_until("]]>", "CDATA section")?;
                el.children.push(Node::CData(self.src[start..self.pos].to_string()));
            } else if rest.starts_with("<!--") {
                self.skip_until("-->", "comment")?;
            } else if rest.starts_with('<') {
                el.children.push(Node::Element(self.element()?));
            } else {
                let len = rest.find('<').unwrap_or(rest.len());
                el.children.push(Node::Text(rest[..len].to_string()));
                self.pos += len;
            }
        }
    }
}

/// Serialize without any added whitespace.
pub fn to_string(el: &Element) -> String {
    let mut out = String::new();
    write_element(&mut out, el);
    out
}

fn write_element(out: &mut String, el: &Element) {
    out.push('<');
    out.push_str(&el.name);
    for (k, v) in &el.attrs {
        let quote = if v.contains('"') { '\'' } else { '"' };
        out.push(' ');
        out.push_str(k);
        out.push('=');
        out.push(quote);
        out.push_str(v);
        out.push(quote);
    }
    if el.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &el.children {
        match child {
            Node::Element(c) => write_element(out, c),
            Node::Text(t) | Node::CData(t) => out.push_str(t),
        }
    }
    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

const EDITOR_PREFIXES: &[&str] = &["sketch:", "inkscape:", "sodipodi:", "xmlns:sketch", "xmlns:inkscape", "xmlns:sodipodi"];
const DROPPED_ELEMENTS: &[&str] = &["metadata", "title", "desc"];

fn is_editor_name(name: &str) -> bool {
    EDITOR_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Remove editor cruft, metadata and insignificant whitespace.
/// `viewBox` is always kept.
pub fn minify(root: &mut Element) {
    minify_element(root);
}

fn minify_element(el: &mut Element) {
    el.attrs.retain(|(k, _)| !is_editor_name(k) && k != "xml:space");
    for (_, v) in &mut el.attrs {
        let collapsed = v.split_whitespace().collect::<Vec<_>>().join(" ");
        *v = collapsed;
    }

    let keeps_text = matches!(el.name.as_str(), "text" | "tspan" | "textPath" | "style" | "script");
    el.children.retain_mut(|child| match child {
        Node::Element(c) => {
            if DROPPED_ELEMENTS.contains(&c.name.as_str()) || is_editor_name(&c.name) {
                return false;
            }
            minify_element(c);
            !(matches!(c.name.as_str(), "g" | "defs") && c.attrs.is_empty() && c.children.is_empty())
        }
        Node::Text(t) => keeps_text || !t.trim().is_empty(),
        Node::CData(_) => true,
    });
}

static URL_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"url\(\s*#([^)\s]+)\s*\)").expect("valid regex"));
static STYLE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z_][\w-]*)").expect("valid regex"));

/// Prefix every `id` with `<prefix>-` and rewrite references to it.
pub fn prefix_ids(root: &mut Element, prefix: &str) {
    let mut ids = HashSet::new();
    root.walk(&mut |el| {
        if let Some(id) = el.attr("id") {
            ids.insert(id.to_string());
        }
    });
    if ids.is_empty() {
        return;
    }

    let rename = |id: &str| format!("{prefix}-{id}");
    let rewrite_urls = |value: &str| -> String {
        URL_REF
            .replace_all(value, |caps: &Captures<'_>| {
                if ids.contains(&caps[1]) {
                    format!("url(#{})", rename(&caps[1]))
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned()
    };

    root.walk_mut(&mut |el| {
        for (key, value) in &mut el.attrs {
            if key == "id" {
                *value = rename(value);
            } else if key == "href" || key == "xlink:href" {
                if let Some(target) = value.strip_prefix('#') {
                    if ids.contains(target) {
                        *value = format!("#{}", rename(target));
                    }
                }
            } else if value.contains("url(") {
                *value = rewrite_urls(value);
            }
        }

        if el.name == "style" {
            for child in &mut el.children {
                if let Node::Text(t) | Node::CData(t) = child {
                    let replaced = STYLE_ID.replace_all(t, |caps: &Captures<'_>| {
                        if ids.contains(&caps[1]) {
                            format!("#{}", rename(&caps[1]))
                        } else {
                            caps[0].to_string()
                        }
                    });
                    *t = replaced.into_owned();
                }
            }
        }
    });
}

/// Whether any attribute in the tree uses the `xlink:` namespace.
pub fn uses_xlink(root: &Element) -> bool {
    let mut found = false;
    root.walk(&mut |el| {
        found |= el.attrs.iter().any(|(k, _)| k.starts_with("xlink:"));
    });
    found
}
