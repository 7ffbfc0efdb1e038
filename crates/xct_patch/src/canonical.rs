//! Markup canonicalization before diffing.
//!
//! External editors reformat markup freely: re-indenting, re-wrapping
//! attributes and sprinkling their own bookkeeping attributes. Running both
//! sides of a diff through [`canonicalize_markup`] removes that noise so the
//! patch only carries real changes.

use crate::error::{Error, Result};

/// What the canonicalizer strips and how it indents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalOptions {
    /// Attribute and element name prefixes to remove, e.g. `editor:`.
    /// A matching `xmlns:` declaration is removed too.
    pub strip_prefixes: Vec<String>,
    /// Spaces per nesting level.
    pub indent: usize,
}

impl Default for CanonicalOptions {
    fn default() -> Self {
        Self {
            strip_prefixes: vec!["editor:".to_string()],
            indent: 2,
        }
    }
}

impl CanonicalOptions {
    fn strips(&self, name: &str) -> bool {
        let declared = name.strip_prefix("xmlns:").map(|ns| format!("{}:", ns));
        self.strip_prefixes.iter().any(|prefix| {
            name.starts_with(prefix.as_str()) || declared.as_deref() == Some(prefix.as_str())
        })
    }
}

#[derive(Debug, PartialEq)]
enum Token<'a> {
    /// `<?...?>`, `<!--...-->`, `<!DOCTYPE ...>` and CDATA, kept verbatim.
    Verbatim(&'a str),
    Open {
        name: &'a str,
        attrs: Vec<(&'a str, &'a str)>,
        empty: bool,
    },
    Close(&'a str),
    Text(&'a str),
}

struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn malformed(&self, offset: usize, reason: impl Into<String>) -> Error {
        Error::MalformedMarkup {
            offset,
            reason: reason.into(),
        }
    }

    /// Consume up to and including `terminator`, returning the consumed slice.
    fn take_through(&mut self, terminator: &str) -> Result<&'a str> {
        let src = self.src;
        let start = self.pos;
        let end = src[start..]
            .find(terminator)
            .map(|i| start + i + terminator.len())
            .ok_or_else(|| self.malformed(start, format!("missing {:?}", terminator)))?;
        self.pos = end;
        Ok(&src[start..end])
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>> {
        let src = self.src;
        let rest = &src[self.pos..];
        if rest.is_empty() {
            return Ok(None);
        }
        if !rest.starts_with('<') {
            let len = rest.find('<').unwrap_or(rest.len());
            self.pos += len;
            return Ok(Some(Token::Text(&rest[..len])));
        }

        if rest.starts_with("<?") {
            return self.take_through("?>").map(|t| Some(Token::Verbatim(t)));
        }
        if rest.starts_with("<!--") {
            return self.take_through("-->").map(|t| Some(Token::Verbatim(t)));
        }
        if rest.starts_with("<![CDATA[") {
            return self.take_through("]]>").map(|t| Some(Token::Verbatim(t)));
        }
        if rest.starts_with("<!") {
            return self.take_through(">").map(|t| Some(Token::Verbatim(t)));
        }

        let start = self.pos;
        let tag = self.take_tag()?;
        if let Some(name) = tag.strip_prefix('/') {
            let name = name.trim();
            if name.is_empty() {
                return Err(self.malformed(start, "empty closing tag"));
            }
            return Ok(Some(Token::Close(name)));
        }

        let (tag, empty) = match tag.strip_suffix('/') {
            Some(inner) => (inner, true),
            None => (tag, false),
        };
        let name_end = tag
            .find(|c: char| c.is_whitespace())
            .unwrap_or(tag.len());
        let name = &tag[..name_end];
        if name.is_empty() {
            return Err(self.malformed(start, "missing element name"));
        }
        let attrs = parse_attributes(&tag[name_end..])
            .map_err(|reason| self.malformed(start, reason))?;
        Ok(Some(Token::Open { name, attrs, empty }))
    }

    /// Consume `<...>` honoring quoted attribute values, returning the inside.
    fn take_tag(&mut self) -> Result<&'a str> {
        let src = self.src;
        let start = self.pos;
        let mut quote: Option<char> = None;
        for (i, c) in src[start + 1..].char_indices() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '"') | (None, '\'') => quote = Some(c),
                (None, '>') => {
                    let inner = &src[start + 1..start + 1 + i];
                    self.pos = start + 1 + i + 1;
                    return Ok(inner.trim());
                }
                (None, '<') => return Err(self.malformed(start + 1 + i, "'<' inside tag")),
                _ => {}
            }
        }
        Err(self.malformed(start, "unterminated tag"))
    }
}

fn parse_attributes(mut s: &str) -> std::result::Result<Vec<(&str, &str)>, String> {
    let mut attrs = Vec::new();
    loop {
        s = s.trim_start();
        if s.is_empty() {
            return Ok(attrs);
        }
        let eq = s
            .find('=')
            .ok_or_else(|| format!("attribute without value: {:?}", s))?;
        let name = s[..eq].trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(format!("bad attribute name: {:?}", &s[..eq]));
        }
        let after = s[eq + 1..].trim_start();
        let quote = after
            .chars()
            .next()
            .filter(|c| *c == '"' || *c == '\'')
            .ok_or_else(|| format!("unquoted value for attribute {:?}", name))?;
        let close = after[1..]
            .find(quote)
            .ok_or_else(|| format!("unterminated value for attribute {:?}", name))?;
        attrs.push((name, &after[1..1 + close]));
        s = &after[1 + close + 1..];
    }
}

/// Re-emit markup one node per line with uniform indentation.
///
/// Whitespace-only text between elements is dropped. Any other text is kept
/// verbatim and stays on the line of the tag before it, so `<t id="1"> A</t>`
/// comes out unchanged; whitespace inside such a run is kept as well.
/// Elements and attributes matching [`CanonicalOptions::strip_prefixes`] are
/// removed along with their content. Comments, declarations and CDATA are
/// kept verbatim.
pub fn canonicalize_markup(text: &str, options: &CanonicalOptions) -> Result<String> {
    let mut tokenizer = Tokenizer::new(text);
    let mut out = String::with_capacity(text.len());
    let mut open: Vec<&str> = Vec::new();
    // Depth inside a stripped element; 0 when emitting.
    let mut skipping = 0usize;
    // Depth of the element holding the current text run, if any.
    let mut run: Option<usize> = None;

    let begin = |out: &mut String, depth: usize, run: Option<usize>| {
        if run.is_some() {
            return;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&" ".repeat(depth * options.indent));
    };

    loop {
        let offset = tokenizer.pos;
        let Some(token) = tokenizer.next_token()? else {
            break;
        };
        match token {
            Token::Open { name, attrs, empty } => {
                if skipping > 0 || options.strips(name) {
                    if !empty {
                        skipping += 1;
                        open.push(name);
                    }
                    continue;
                }
                begin(&mut out, open.len(), run);
                out.push('<');
                out.push_str(name);
                for (attr, value) in attrs.iter().filter(|(attr, _)| !options.strips(attr)) {
                    let quote = if value.contains('"') { '\'' } else { '"' };
                    out.push_str(&format!(" {}={}{}{}", attr, quote, value, quote));
                }
                out.push_str(if empty { "/>" } else { ">" });
                if !empty {
                    open.push(name);
                }
            }
            Token::Close(name) => {
                match open.pop() {
                    Some(expected) if expected == name => {}
                    Some(expected) => {
                        return Err(Error::MalformedMarkup {
                            offset,
                            reason: format!("expected </{}>, found </{}>", expected, name),
                        })
                    }
                    None => {
                        return Err(Error::MalformedMarkup {
                            offset,
                            reason: format!("unmatched </{}>", name),
                        })
                    }
                }
                if skipping > 0 {
                    skipping -= 1;
                    continue;
                }
                begin(&mut out, open.len(), run);
                out.push_str("</");
                out.push_str(name);
                out.push('>');
                if run.is_some_and(|depth| open.len() < depth) {
                    run = None;
                }
            }
            Token::Text(body) => {
                if skipping > 0 || (run.is_none() && body.trim().is_empty()) {
                    continue;
                }
                out.push_str(body);
                run.get_or_insert(open.len());
            }
            Token::Verbatim(body) => {
                if skipping == 0 {
                    begin(&mut out, open.len(), run);
                    out.push_str(body);
                }
            }
        }
    }

    if let Some(unclosed) = open.last() {
        return Err(Error::MalformedMarkup {
            offset: text.len(),
            reason: format!("unclosed <{}>", unclosed),
        });
    }
    if !out.is_empty() {
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reindents_and_drops_whitespace() {
        let input = "<?xml version=\"1.0\"?>\n<language id=\"44\">\n\t<page id=\"1\">  <t id=\"1\">Hello</t></page>\n</language>";
        let out = canonicalize_markup(input, &CanonicalOptions::default()).unwrap();
        assert_eq!(
            out,
            "<?xml version=\"1.0\"?>\n<language id=\"44\">\n  <page id=\"1\">\n    <t id=\"1\">Hello</t>\n  </page>\n</language>\n"
        );
    }

    #[test]
    fn test_text_only_element_survives_unchanged() {
        let options = CanonicalOptions::default();
        let line = "<t id=\"1\"> Laser  </t>\n";
        assert_eq!(canonicalize_markup(line, &options).unwrap(), line);

        let nested = "<page id=\"1\">\n  <t id=\"1\">\tTwin  laser\n</t>\n</page>\n";
        assert_eq!(canonicalize_markup(nested, &options).unwrap(), nested);
    }

    #[test]
    fn test_mixed_content_keeps_inner_whitespace() {
        let input = "<p>\n  <t>Fire <b>now</b> </t>\n</p>";
        let out = canonicalize_markup(input, &CanonicalOptions::default()).unwrap();
        assert_eq!(out, "<p>\n  <t>Fire <b>now</b> </t>\n</p>\n");
    }

    #[test]
    fn test_cosmetic_variants_converge() {
        let a = "<root><a x='1'  y=\"2\"/>\n</root>";
        let b = "<root>\n    <a x=\"1\" y=\"2\" />\n</root>\n";
        let options = CanonicalOptions::default();
        assert_eq!(
            canonicalize_markup(a, &options).unwrap(),
            canonicalize_markup(b, &options).unwrap()
        );
    }

    #[test]
    fn test_strips_editor_namespace() {
        let input = "<root xmlns:editor=\"urn:ed\" editor:seen=\"1\" id=\"r\"><editor:view><x/></editor:view><b/></root>";
        let out = canonicalize_markup(input, &CanonicalOptions::default()).unwrap();
        assert_eq!(out, "<root id=\"r\">\n  <b/>\n</root>\n");
    }

    #[test]
    fn test_quoted_gt_in_attribute() {
        let out = canonicalize_markup("<a cond=\"x > 1\"/>", &CanonicalOptions::default()).unwrap();
        assert_eq!(out, "<a cond=\"x > 1\"/>\n");
    }

    #[test]
    fn test_mismatched_close_tag() {
        let err = canonicalize_markup("<a><b></a>", &CanonicalOptions::default());
        assert!(matches!(err, Err(Error::MalformedMarkup { .. })));
        let err = canonicalize_markup("<a>", &CanonicalOptions::default());
        assert!(matches!(err, Err(Error::MalformedMarkup { .. })));
    }

    #[test]
    fn test_custom_indent() {
        let options = CanonicalOptions {
            strip_prefixes: Vec::new(),
            indent: 4,
        };
        let out = canonicalize_markup("<a><b/></a>", &options).unwrap();
        assert_eq!(out, "<a>\n    <b/>\n</a>\n");
    }
}
