//! Response templates
//!
//! A response is plain text with named placeholders written as `%(name)s`.
//! `%%` renders a single `%`. Any other `%` is kept as-is.

/// One piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Parsed response template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse template text. Parsing never fails; malformed placeholders stay literal.
    pub fn parse(source: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(pos) = rest.find('%') {
            literal.push_str(&rest[..pos]);
            let tail = &rest[pos..];

            if tail.starts_with("%%") {
                literal.push('%');
                rest = &tail[2..];
                continue;
            }

            match parse_placeholder(tail) {
                Some((name, consumed)) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name.to_string()));
                    rest = &tail[consumed..];
                },
                None => {
                    literal.push('%');
                    rest = &tail[1..];
                },
            }
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            source: source.to_string(),
            segments,
        }
    }

    /// Template text as written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render the template.
    ///
    /// `resolve` returns the value for a placeholder name, or `None` if the
    /// name is unknown. Any unknown name makes the whole render fail.
    pub fn render<'a, F>(&self, mut resolve: F) -> Option<String>
    where
        F: FnMut(&str) -> Option<&'a str>,
    {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => out.push_str(resolve(name)?),
            }
        }
        Some(out)
    }
}

/// Parse `%(name)s` at the start of `text`; returns the name and bytes consumed
fn parse_placeholder(text: &str) -> Option<(&str, usize)> {
    let body = text.strip_prefix("%(")?;
    let close = body.find(')')?;
    let name = &body[..close];
    if name.is_empty() || !body[close + 1..].starts_with('s') {
        return None;
    }
    // "%(" + name + ")s"
    Some((name, 2 + close + 2))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn render_with(template: &str, values: &[(&str, &'static str)]) -> Option<String> {
        let map: HashMap<&str, &'static str> = values.iter().copied().collect();
        Template::parse(template).render(|name| map.get(name).copied())
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(render_with("pong", &[]), Some("pong".to_string()));
        assert_eq!(render_with("", &[]), Some(String::new()));
    }

    #[test]
    fn test_named_placeholders() {
        let out = render_with(
            "hello %(who)s, %(who)s again",
            &[("who", "world")],
        );
        assert_eq!(out.as_deref(), Some("hello world, world again"));
        assert_eq!(
            render_with("%(a)s-%(b)s", &[("a", "1"), ("b", "2")]).as_deref(),
            Some("1-2")
        );
    }

    #[test]
    fn test_unknown_placeholder_fails_render() {
        assert_eq!(render_with("hi %(missing)s", &[("who", "x")]), None);
    }

    #[test]
    fn test_percent_handling() {
        assert_eq!(render_with("100%% sure", &[]).as_deref(), Some("100% sure"));
        assert_eq!(render_with("50% off", &[]).as_deref(), Some("50% off"));
        assert_eq!(render_with("%(x)d", &[]).as_deref(), Some("%(x)d"));
        assert_eq!(render_with("%(unclosed", &[]).as_deref(), Some("%(unclosed"));
        assert_eq!(render_with("trailing %", &[]).as_deref(), Some("trailing %"));
    }

    #[test]
    fn test_source_preserved() {
        let template = Template::parse("/me waves at %(nick)s");
        assert_eq!(template.source(), "/me waves at %(nick)s");
    }
}
