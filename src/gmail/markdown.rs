//! Markdown to email-safe HTML conversion.
//!
//! Two engines behind one contract: markup string in, HTML document out,
//! never an error. Engine selection is a build-time decision (the
//! `enhanced-markdown` feature), observable through the skill's status
//! resource — callers can always tell which engine produced a body.
//!
//! - **Enhanced**: `pulldown-cmark` event stream rendered to HTML.
//!   Headings, emphasis, lists, links, block quotes, inline and fenced
//!   code, tables.
//! - **Fallback**: line/pattern substitution with no parser dependency.
//!   Covers the common subset: headings, bold/italic, links, ordered and
//!   unordered lists, inline code, block quotes, horizontal rules.
//!
//! Both bodies are wrapped in the same email-client envelope: DOCTYPE,
//! a `<style>` block with bounded width, and tags mail clients render
//! consistently.

/// The converter engine compiled into this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    /// `pulldown-cmark` based conversion.
    Enhanced,
    /// Built-in pattern substitution.
    Fallback,
}

impl Engine {
    /// Returns the engine active in this build.
    #[must_use]
    pub const fn active() -> Self {
        #[cfg(feature = "enhanced-markdown")]
        {
            Self::Enhanced
        }
        #[cfg(not(feature = "enhanced-markdown"))]
        {
            Self::Fallback
        }
    }

    /// Returns the engine name reported in the status resource.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Enhanced => "enhanced",
            Self::Fallback => "fallback",
        }
    }
}

/// Converts a Markdown document to a complete email-safe HTML document
/// using the active engine.
///
/// Never fails: input that no engine can make sense of is still emitted
/// as escaped text inside the envelope.
#[must_use]
pub fn to_html(markup: &str) -> String {
    wrap_email_html(&render_body(markup))
}

fn render_body(markup: &str) -> String {
    match Engine::active() {
        #[cfg(feature = "enhanced-markdown")]
        Engine::Enhanced => enhanced::render(markup),
        _ => fallback::render(markup),
    }
}

/// Wraps a rendered body in the email envelope: inline-safe CSS,
/// bounded width, client-compatible tags.
#[must_use]
pub fn wrap_email_html(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n\
         body {{ font-family: -apple-system, 'Segoe UI', Helvetica, Arial, sans-serif; \
         font-size: 14px; line-height: 1.6; color: #24292e; margin: 0; padding: 0; }}\n\
         .container {{ max-width: 600px; margin: 0 auto; padding: 16px; }}\n\
         h1, h2, h3, h4 {{ margin-top: 24px; margin-bottom: 12px; line-height: 1.25; }}\n\
         h1 {{ font-size: 22px; border-bottom: 1px solid #eaecef; padding-bottom: 6px; }}\n\
         h2 {{ font-size: 18px; }}\n\
         code {{ background-color: #f6f8fa; padding: 2px 4px; border-radius: 3px; \
         font-family: SFMono-Regular, Consolas, Menlo, monospace; font-size: 85%; }}\n\
         pre {{ background-color: #f6f8fa; padding: 12px; border-radius: 3px; overflow: auto; }}\n\
         pre code {{ background-color: transparent; padding: 0; }}\n\
         blockquote {{ border-left: 4px solid #dfe2e5; color: #6a737d; \
         padding-left: 16px; margin-left: 0; }}\n\
         a {{ color: #0366d6; text-decoration: none; }}\n\
         table {{ border-collapse: collapse; }}\n\
         th, td {{ border: 1px solid #dfe2e5; padding: 6px 13px; }}\n\
         hr {{ border: 0; border-top: 1px solid #eaecef; margin: 24px 0; }}\n\
         </style>\n</head>\n<body>\n<div class=\"container\">\n{body}\n</div>\n</body>\n</html>\n"
    )
}

/// Escapes HTML metacharacters.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(feature = "enhanced-markdown")]
mod enhanced {
    use pulldown_cmark::{html, Options, Parser};

    /// Renders Markdown through the general-purpose parser.
    pub fn render(markup: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let parser = Parser::new_ext(markup, options);
        let mut body = String::with_capacity(markup.len() * 2);
        html::push_html(&mut body, parser);
        body
    }
}

pub(crate) mod fallback {
    //! Deterministic line/pattern substitution engine. No parser
    //! dependency; sufficient for the common Markdown subset.

    use std::sync::OnceLock;

    use regex::Regex;

    use super::escape_html;

    fn inline_code() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"`([^`]+)`").expect("inline code pattern is valid"))
    }

    fn bold() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"\*\*([^*]+)\*\*").expect("bold pattern is valid"))
    }

    fn italic() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"\*([^*]+)\*").expect("italic pattern is valid"))
    }

    fn link() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("link pattern is valid"))
    }

    fn ordered_item() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"^\d+\.\s+(.*)$").expect("ordered item pattern is valid"))
    }

    /// Applies inline substitutions to one escaped line.
    fn render_inline(line: &str) -> String {
        let line = inline_code().replace_all(line, "<code>$1</code>");
        let line = bold().replace_all(&line, "<strong>$1</strong>");
        let line = italic().replace_all(&line, "<em>$1</em>");
        link().replace_all(&line, "<a href=\"$2\">$1</a>").into_owned()
    }

    /// Block context carried across lines.
    #[derive(PartialEq, Eq)]
    enum Block {
        None,
        UnorderedList,
        OrderedList,
        Quote,
    }

    impl Block {
        fn close(&self, out: &mut String) {
            match self {
                Self::None => {}
                Self::UnorderedList => out.push_str("</ul>\n"),
                Self::OrderedList => out.push_str("</ol>\n"),
                Self::Quote => out.push_str("</blockquote>\n"),
            }
        }
    }

    /// Renders Markdown through pattern substitution.
    pub fn render(markup: &str) -> String {
        let mut out = String::with_capacity(markup.len() * 2);
        let mut block = Block::None;

        for raw_line in markup.lines() {
            let line = escape_html(raw_line.trim_end());
            let trimmed = line.trim_start();

            // Heading: count leading '#'.
            let hashes = trimmed.chars().take_while(|&c| c == '#').count();
            if (1..=6).contains(&hashes) && trimmed[hashes..].starts_with(' ') {
                block.close(&mut out);
                block = Block::None;
                let text = render_inline(trimmed[hashes + 1..].trim());
                out.push_str(&format!("<h{hashes}>{text}</h{hashes}>\n"));
                continue;
            }

            // Horizontal rule.
            if trimmed == "---" || trimmed == "***" {
                block.close(&mut out);
                block = Block::None;
                out.push_str("<hr>\n");
                continue;
            }

            // Unordered list item.
            if let Some(rest) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
                if block != Block::UnorderedList {
                    block.close(&mut out);
                    out.push_str("<ul>\n");
                    block = Block::UnorderedList;
                }
                out.push_str(&format!("<li>{}</li>\n", render_inline(rest)));
                continue;
            }

            // Ordered list item.
            if let Some(captures) = ordered_item().captures(trimmed) {
                if block != Block::OrderedList {
                    block.close(&mut out);
                    out.push_str("<ol>\n");
                    block = Block::OrderedList;
                }
                out.push_str(&format!("<li>{}</li>\n", render_inline(&captures[1])));
                continue;
            }

            // Block quote. '>' was escaped above.
            if let Some(rest) = trimmed.strip_prefix("&gt; ").or_else(|| {
                (trimmed == "&gt;").then_some("")
            }) {
                if block != Block::Quote {
                    block.close(&mut out);
                    out.push_str("<blockquote>\n");
                    block = Block::Quote;
                }
                out.push_str(&format!("{}<br>\n", render_inline(rest)));
                continue;
            }

            // Blank line closes any open block.
            if trimmed.is_empty() {
                block.close(&mut out);
                block = Block::None;
                continue;
            }

            // Plain paragraph line.
            block.close(&mut out);
            block = Block::None;
            out.push_str(&format!("<p>{}</p>\n", render_inline(&line)));
        }

        block.close(&mut out);
        out
    }
}
