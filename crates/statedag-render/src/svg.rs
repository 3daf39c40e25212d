//! Owned SVG element tree and XML serializer.
//!
//! Elements carry ordered attributes and mixed children. `Clone` is a deep copy; the
//! exporter rewrites such a copy before rasterizing it.

mod diagram;

pub use diagram::render_diagram;

use std::fmt::Write as _;

pub const SVG_NS: &str = "http://www.w3.org/2000/svg";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

#[derive(Debug, Clone, PartialEq)]
pub enum SvgNode {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<SvgNode>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`Element::set_attr`].
    pub fn attr(mut self, name: &str, value: impl ToString) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Replaces an existing attribute in place, otherwise appends it.
    pub fn set_attr(&mut self, name: &str, value: impl ToString) {
        let value = value.to_string();
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value;
        } else {
            self.attrs.push((name.to_string(), value));
        }
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(mut self, child: Element) -> Self {
        self.push(child);
        self
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(SvgNode::Element(child));
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(SvgNode::Text(text.into()));
        self
    }

    pub fn prepend(&mut self, child: Element) {
        self.children.insert(0, SvgNode::Element(child));
    }

    /// Direct element children, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            SvgNode::Element(e) => Some(e),
            SvgNode::Text(_) => None,
        })
    }

    /// Removes every descendant element named `name` (with its subtree). Returns how many
    /// were removed.
    pub fn remove_descendants(&mut self, name: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|c| !matches!(c, SvgNode::Element(e) if e.name == name));
        let mut removed = before - self.children.len();
        for c in &mut self.children {
            if let SvgNode::Element(e) = c {
                removed += e.remove_descendants(name);
            }
        }
        removed
    }

    pub fn count_descendants(&self, name: &str) -> usize {
        self.elements()
            .map(|e| usize::from(e.name == name) + e.count_descendants(name))
            .sum()
    }

    pub fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (k, v) in &self.attrs {
            let _ = write!(out, r#" {k}="{}""#, escape_attr(v));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for c in &self.children {
            match c {
                SvgNode::Element(e) => e.write_xml(out),
                SvgNode::Text(t) => out.push_str(&escape_text(t)),
            }
        }
        let _ = write!(out, "</{}>", self.name);
    }
}

/// A rendered diagram: the root `<svg>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgDocument {
    pub root: Element,
}

impl SvgDocument {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// `(width, height)` from the `viewBox` attribute, when present and positive.
    pub fn view_box(&self) -> Option<(f64, f64)> {
        let raw = self.root.get_attr("viewBox")?;
        let parts: Vec<f64> = raw
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [_, _, w, h] if *w > 0.0 && *h > 0.0 => Some((*w, *h)),
            _ => None,
        }
    }

    /// `(width, height)` from plain numeric `width`/`height` attributes (`px` tolerated).
    pub fn declared_size(&self) -> Option<(f64, f64)> {
        let parse = |name: &str| -> Option<f64> {
            let raw = self.root.get_attr(name)?.trim();
            let v: f64 = raw.strip_suffix("px").unwrap_or(raw).trim().parse().ok()?;
            (v > 0.0).then_some(v)
        };
        Some((parse("width")?, parse("height")?))
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(16 * 1024);
        self.root.write_xml(&mut out);
        out
    }
}

pub fn escape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attr(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Formats a coordinate with at most three decimals and no trailing zeros.
pub fn fmt(v: f64) -> String {
    if !v.is_finite() {
        return "0".to_string();
    }
    let mut s = format!("{:.3}", v);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" { "0".to_string() } else { s }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_drop_trailing_zeros() {
        assert_eq!(fmt(12.0), "12");
        assert_eq!(fmt(-0.0001), "0");
        assert_eq!(fmt(3.25), "3.25");
        assert_eq!(fmt(1.0 / 3.0), "0.333");
    }

    #[test]
    fn attributes_and_text_are_escaped() {
        let el = Element::new("text")
            .attr("data-label", r#"a "b" & <c>"#)
            .text("x < y & z");
        let mut out = String::new();
        el.write_xml(&mut out);
        assert_eq!(
            out,
            r#"<text data-label="a &quot;b&quot; &amp; &lt;c&gt;">x &lt; y &amp; z</text>"#
        );
    }

    #[test]
    fn set_attr_replaces_in_place() {
        let mut el = Element::new("svg").attr("width", 1).attr("height", 2);
        el.set_attr("width", 10);
        assert_eq!(el.attrs[0], ("width".to_string(), "10".to_string()));
        assert_eq!(el.attrs.len(), 2);
    }

    #[test]
    fn nested_elements_can_be_removed() {
        let mut root = Element::new("svg")
            .child(Element::new("g").child(Element::new("foreignObject").child(Element::new("div"))))
            .child(Element::new("foreignObject"));
        assert_eq!(root.count_descendants("foreignObject"), 2);
        assert_eq!(root.remove_descendants("foreignObject"), 2);
        assert_eq!(root.count_descendants("foreignObject"), 0);
        assert_eq!(root.count_descendants("g"), 1);
    }

    #[test]
    fn size_is_read_from_view_box_or_attributes() {
        let doc = SvgDocument::new(Element::new("svg").attr("viewBox", "0 0 800 600"));
        assert_eq!(doc.view_box(), Some((800.0, 600.0)));
        let doc = SvgDocument::new(Element::new("svg").attr("width", "300px").attr("height", "200"));
        assert_eq!(doc.view_box(), None);
        assert_eq!(doc.declared_size(), Some((300.0, 200.0)));
        let doc = SvgDocument::new(Element::new("svg").attr("viewBox", "0 0 0 0"));
        assert_eq!(doc.view_box(), None);
    }
}
