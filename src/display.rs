//! Narrative markdown to typed display blocks.
//!
//! Raw HTML in the narrative is dropped, never passed through. Betting
//! phrases worth calling out ("sharp money", "(currently -3.5)") come back as
//! highlight spans so a front end can style them without injecting markup.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::sync::LazyLock;

static HIGHLIGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?P<sharp>sharp money)|(?P<square>square money)|(?P<current>\(currently [^)\n]*\))")
        .expect("highlight regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading(u8, Vec<Span>),
    Paragraph(Vec<Span>),
    ListItem(Vec<Span>),
    Rule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Text(String),
    Strong(String),
    Emphasis(String),
    Code(String),
    LineBreak,
    Highlight { kind: HighlightKind, text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightKind {
    SharpMoney,
    SquareMoney,
    CurrentLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Plain,
    Strong,
    Emphasis,
    Code,
}

#[derive(Debug, Clone, Copy)]
enum Open {
    Heading(u8),
    Paragraph,
    ListItem,
}

#[derive(Default)]
struct Builder {
    blocks: Vec<Block>,
    open: Option<Open>,
    spans: Vec<Span>,
    pending: String,
    pending_style: Option<Style>,
    strong: usize,
    emphasis: usize,
    item_depth: usize,
}

impl Builder {
    fn style(&self) -> Style {
        if self.strong > 0 {
            Style::Strong
        } else if self.emphasis > 0 {
            Style::Emphasis
        } else {
            Style::Plain
        }
    }

    fn text(&mut self, text: &str, style: Style) {
        if self.open.is_none() {
            self.open = Some(Open::Paragraph);
        }
        if self.pending_style != Some(style) {
            self.flush_text();
            self.pending_style = Some(style);
        }
        self.pending.push_str(text);
    }

    fn flush_text(&mut self) {
        let Some(style) = self.pending_style.take() else {
            return;
        };
        let text = std::mem::take(&mut self.pending);
        if text.is_empty() {
            return;
        }
        if style == Style::Code {
            self.spans.push(Span::Code(text));
            return;
        }

        let mut last = 0;
        for caps in HIGHLIGHT.captures_iter(&text) {
            let Some(m) = caps.get(0) else { continue };
            if m.start() > last {
                self.spans.push(styled(style, &text[last..m.start()]));
            }
            let kind = if caps.name("sharp").is_some() {
                HighlightKind::SharpMoney
            } else if caps.name("square").is_some() {
                HighlightKind::SquareMoney
            } else {
                HighlightKind::CurrentLine
            };
            self.spans.push(Span::Highlight {
                kind,
                text: m.as_str().to_string(),
            });
            last = m.end();
        }
        if last < text.len() {
            self.spans.push(styled(style, &text[last..]));
        }
    }

    fn line_break(&mut self) {
        self.flush_text();
        if self.open.is_some() {
            self.spans.push(Span::LineBreak);
        }
    }

    fn start(&mut self, open: Open) {
        self.close();
        self.open = Some(open);
    }

    /// Finish the open block; empty blocks are dropped.
    fn close(&mut self) {
        self.flush_text();
        while self.spans.last() == Some(&Span::LineBreak) {
            self.spans.pop();
        }
        let spans = std::mem::take(&mut self.spans);
        let Some(open) = self.open.take() else {
            return;
        };
        if spans.is_empty() {
            return;
        }
        self.blocks.push(match open {
            Open::Heading(level) => Block::Heading(level, spans),
            Open::Paragraph => Block::Paragraph(spans),
            Open::ListItem => Block::ListItem(spans),
        });
    }
}

fn styled(style: Style, text: &str) -> Span {
    let text = text.to_string();
    match style {
        Style::Plain => Span::Text(text),
        Style::Strong => Span::Strong(text),
        Style::Emphasis => Span::Emphasis(text),
        Style::Code => Span::Code(text),
    }
}

pub fn render_blocks(markdown: &str) -> Vec<Block> {
    let mut b = Builder::default();
    let mut in_code_block = false;

    for event in Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => b.start(Open::Heading(level as u8)),
            Event::End(TagEnd::Heading(_)) => b.close(),
            Event::Start(Tag::Paragraph) => {
                if b.item_depth == 0 {
                    b.start(Open::Paragraph);
                }
            }
            Event::End(TagEnd::Paragraph) => {
                if b.item_depth == 0 {
                    b.close();
                } else {
                    b.line_break();
                }
            }
            Event::Start(Tag::Item) => {
                b.item_depth += 1;
                b.start(Open::ListItem);
            }
            Event::End(TagEnd::Item) => {
                b.item_depth = b.item_depth.saturating_sub(1);
                b.close();
                if b.item_depth > 0 {
                    b.open = Some(Open::ListItem);
                }
            }
            Event::Start(Tag::CodeBlock(_)) => {
                in_code_block = true;
                b.start(Open::Paragraph);
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                b.close();
            }
            Event::Start(Tag::Strong) => {
                b.flush_text();
                b.strong += 1;
            }
            Event::End(TagEnd::Strong) => {
                b.flush_text();
                b.strong = b.strong.saturating_sub(1);
            }
            Event::Start(Tag::Emphasis) => {
                b.flush_text();
                b.emphasis += 1;
            }
            Event::End(TagEnd::Emphasis) => {
                b.flush_text();
                b.emphasis = b.emphasis.saturating_sub(1);
            }
            Event::Text(text) => {
                let style = if in_code_block { Style::Code } else { b.style() };
                b.text(&text, style);
            }
            Event::Code(code) => b.text(&code, Style::Code),
            Event::SoftBreak | Event::HardBreak => b.line_break(),
            Event::Rule => {
                b.close();
                b.blocks.push(Block::Rule);
            }
            Event::Html(_) | Event::InlineHtml(_) => {}
            _ => {}
        }
    }
    b.close();
    b.blocks
}

fn spans_plain(spans: &[Span]) -> String {
    spans
        .iter()
        .map(|span| match span {
            Span::Text(t) | Span::Strong(t) | Span::Emphasis(t) | Span::Code(t) => t.as_str(),
            Span::Highlight { text, .. } => text.as_str(),
            Span::LineBreak => "\n",
        })
        .collect()
}

/// Terminal-friendly text: list items as bullets, blank lines between blocks.
pub fn render_plain(blocks: &[Block]) -> String {
    let mut out = String::new();
    let mut prev_item = false;
    for block in blocks {
        let is_item = matches!(block, Block::ListItem(_));
        if !out.is_empty() {
            out.push_str(if is_item && prev_item { "\n" } else { "\n\n" });
        }
        match block {
            Block::Heading(_, spans) | Block::Paragraph(spans) => out.push_str(&spans_plain(spans)),
            Block::ListItem(spans) => {
                out.push_str("\u{2022} ");
                out.push_str(&spans_plain(spans));
            }
            Block::Rule => out.push_str("---"),
        }
        prev_item = is_item;
    }
    out
}
