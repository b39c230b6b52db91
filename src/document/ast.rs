//! A flat block-level view of a markdown document.

use pulldown_cmark::{CodeBlockKind, Event, MetadataBlockKind, Options, Parser, Tag, TagEnd};

/// A block-level markdown element, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Heading { level: u8, text: String },
    Paragraph { text: String },
    /// Raw HTML block, including comments
    Html { content: String },
    /// Fenced code block; `language` is the first word of the info string
    FencedCode { language: String, content: String },
}

/// A parsed markdown document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    /// Raw YAML front matter, without the `---` fences
    pub metadata: Option<String>,
    pub nodes: Vec<Node>,
}

/// Text being collected for the block currently open.
enum Open {
    Heading(u8, String),
    Paragraph(String),
    Html(String),
    Code(String, String),
    Metadata(String),
}

impl Document {
    /// Parse markdown source. Parsing never fails; unrecognized blocks are skipped.
    pub fn parse(source: &str) -> Self {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS;

        let mut document = Self::default();
        let mut open: Option<Open> = None;

        for event in Parser::new_ext(source, options) {
            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    open = Some(Open::Heading(level as u8, String::new()));
                }
                Event::Start(Tag::Paragraph) if open.is_none() => {
                    open = Some(Open::Paragraph(String::new()));
                }
                Event::Start(Tag::HtmlBlock) => open = Some(Open::Html(String::new())),
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                    let language = info.split_whitespace().next().unwrap_or_default().to_string();
                    open = Some(Open::Code(language, String::new()));
                }
                Event::Start(Tag::MetadataBlock(MetadataBlockKind::YamlStyle)) => {
                    open = Some(Open::Metadata(String::new()));
                }
                Event::Text(text) | Event::Code(text) | Event::Html(text) | Event::InlineHtml(text) => {
                    match open.as_mut() {
                        Some(
                            Open::Heading(_, buf)
                            | Open::Paragraph(buf)
                            | Open::Html(buf)
                            | Open::Code(_, buf)
                            | Open::Metadata(buf),
                        ) => buf.push_str(&text),
                        None => {}
                    }
                }
                Event::SoftBreak | Event::HardBreak => {
                    if let Some(Open::Heading(_, buf) | Open::Paragraph(buf)) = open.as_mut() {
                        buf.push('\n');
                    }
                }
                Event::End(
                    TagEnd::Heading(_)
                    | TagEnd::Paragraph
                    | TagEnd::HtmlBlock
                    | TagEnd::CodeBlock
                    | TagEnd::MetadataBlock(_),
                ) => {
                    if let Some(block) = open.take() {
                        document.close(block);
                    }
                }
                _ => {}
            }
        }

        document
    }

    fn close(&mut self, block: Open) {
        let node = match block {
            Open::Heading(level, text) => Node::Heading { level, text },
            Open::Paragraph(text) => Node::Paragraph { text },
            Open::Html(content) => Node::Html { content },
            Open::Code(language, content) => Node::FencedCode { language, content },
            Open::Metadata(raw) => {
                self.metadata = Some(raw);
                return;
            }
        };
        self.nodes.push(node);
    }
}
