//! Literal/placeholder message templates.
//!
//! A template is parsed once into segments, and rendering walks the segments
//! in a single pass. Substituted values are never re-scanned, so a value that
//! itself contains `{name}` text is emitted verbatim.
//!
//! Placeholders are `{name}` where `name` is `[A-Za-z0-9_]+`; any other
//! brace is literal text.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::with_capacity(source.len());
        let mut rest = source;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            let name_len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());

            if name_len > 0 && after[name_len..].starts_with('}') {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Placeholder(after[..name_len].to_string()));
                rest = &after[name_len + 1..];
            } else {
                // Not a placeholder, keep the brace
                literal.push('{');
                rest = after;
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self { segments }
    }

    /// Placeholder names in order of appearance.
    #[cfg(test)]
    fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Renders with the given variables. A placeholder without a matching
    /// variable renders as the empty string.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = String::new();
        self.render_into(&mut out, vars);
        out
    }

    /// Like [`Template::render`], appending to `out`.
    pub fn render_into(&self, out: &mut String, vars: &[(&str, &str)]) {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    if let Some((_, value)) = vars.iter().find(|(key, _)| *key == name.as_str()) {
                        out.push_str(value);
                    }
                }
            }
        }
    }
}
