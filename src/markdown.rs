//! Markdown rendering for terminal output.
//!
//! Answers are re-parsed from scratch on every live update, so the renderer has to accept
//! any prefix of a markdown document: an unterminated fence, a dangling `**` or a list cut
//! off mid-item all render as best they can and never fail.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, LinkType, Options, Parser, Tag};

const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_DIM: &str = "\x1b[2m";
const ANSI_ITALIC: &str = "\x1b[3m";
const ANSI_UNDERLINE: &str = "\x1b[4m";
const ANSI_STRIKE: &str = "\x1b[9m";
const ANSI_RESET: &str = "\x1b[0m";
const ANSI_CYAN: &str = "\x1b[36m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_BLUE: &str = "\x1b[34m";

const CODE_INDENT: &str = "    ";
const RULE_WIDTH: usize = 40;

/// Render markdown text for the terminal.
///
/// With `use_color` the output carries ANSI styling; without it the output is plain text
/// that keeps enough markup (heading markers, backticks) to stay readable.
pub fn render(text: &str, use_color: bool) -> String {
    let mut writer = Writer::new(use_color);
    for event in Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH) {
        writer.event(event);
    }
    writer.finish()
}

struct Writer {
    out: String,
    use_color: bool,
    line_start: bool,
    styles: Vec<&'static str>,
    lists: Vec<Option<u64>>,
    links: Vec<(LinkType, String)>,
    quote_depth: usize,
    in_code_block: bool,
}

impl Writer {
    fn new(use_color: bool) -> Self {
        Self {
            out: String::new(),
            use_color,
            line_start: true,
            styles: Vec::new(),
            lists: Vec::new(),
            links: Vec::new(),
            quote_depth: 0,
            in_code_block: false,
        }
    }

    fn finish(mut self) -> String {
        if self.use_color && !self.styles.is_empty() {
            self.out.push_str(ANSI_RESET);
        }
        let len = self.out.trim_end().len();
        self.out.truncate(len);
        self.out
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                if self.use_color {
                    self.push_style(ANSI_YELLOW);
                    self.text(&code);
                    self.pop_style();
                } else {
                    self.text(&format!("`{code}`"));
                }
            }
            Event::Html(html) => self.text(&html),
            Event::FootnoteReference(name) => self.text(&format!("[^{name}]")),
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.newline(),
            Event::Rule => {
                self.block_start();
                let rule = "─".repeat(RULE_WIDTH);
                if self.use_color {
                    self.push_style(ANSI_DIM);
                    self.text(&rule);
                    self.pop_style();
                } else {
                    self.text(&rule);
                }
                self.newline();
            }
            Event::TaskListMarker(checked) => {
                self.text(if checked { "[x] " } else { "[ ] " });
            }
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.block_start(),
            Tag::Heading(level, _, _) => {
                self.block_start();
                if self.use_color {
                    self.push_style(ANSI_BOLD);
                    if level == HeadingLevel::H1 {
                        self.push_style(ANSI_UNDERLINE);
                    }
                } else {
                    self.text(&format!("{} ", "#".repeat(level as usize)));
                }
            }
            Tag::BlockQuote => {
                self.block_start();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(kind) => {
                self.block_start();
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        if self.use_color {
                            self.push_style(ANSI_DIM);
                            self.text(&lang);
                            self.pop_style();
                        } else {
                            self.text(&format!("[{lang}]"));
                        }
                        self.newline();
                    }
                }
                self.in_code_block = true;
                if self.use_color {
                    self.push_style(ANSI_CYAN);
                }
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.block_start();
                } else {
                    self.ensure_newline();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.ensure_newline();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{indent}{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => format!("{indent}• "),
                };
                self.text(&marker);
            }
            Tag::FootnoteDefinition(name) => {
                self.block_start();
                self.text(&format!("[^{name}]: "));
            }
            Tag::Emphasis => self.push_style(ANSI_ITALIC),
            Tag::Strong => self.push_style(ANSI_BOLD),
            Tag::Strikethrough => self.push_style(ANSI_STRIKE),
            Tag::Link(link_type, dest, _) | Tag::Image(link_type, dest, _) => {
                self.links.push((link_type, dest.to_string()));
                self.push_style(ANSI_UNDERLINE);
                self.push_style(ANSI_BLUE);
            }
            Tag::Table(_) | Tag::TableHead | Tag::TableRow | Tag::TableCell => {}
        }
    }

    fn end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.newline(),
            Tag::Heading(level, _, _) => {
                if self.use_color {
                    self.pop_style();
                    if level == HeadingLevel::H1 {
                        self.pop_style();
                    }
                }
                self.newline();
            }
            Tag::BlockQuote => {
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.ensure_newline();
            }
            Tag::CodeBlock(_) => {
                if self.use_color {
                    self.pop_style();
                }
                self.in_code_block = false;
                self.ensure_newline();
            }
            Tag::List(_) => {
                self.lists.pop();
                self.ensure_newline();
            }
            Tag::Item | Tag::FootnoteDefinition(_) => self.ensure_newline(),
            Tag::Emphasis | Tag::Strong | Tag::Strikethrough => self.pop_style(),
            Tag::Link(..) | Tag::Image(..) => {
                self.pop_style();
                self.pop_style();
                if let Some((link_type, dest)) = self.links.pop() {
                    let autolink = matches!(link_type, LinkType::Autolink | LinkType::Email);
                    if !autolink && !dest.is_empty() {
                        self.text(&format!(" ({dest})"));
                    }
                }
            }
            Tag::TableCell => self.text(" "),
            Tag::TableHead | Tag::TableRow => self.newline(),
            Tag::Table(_) => self.ensure_newline(),
        }
    }

    fn text(&mut self, text: &str) {
        for piece in text.split_inclusive('\n') {
            if self.line_start {
                self.line_prefix();
            }
            self.out.push_str(piece);
            self.line_start = piece.ends_with('\n');
        }
    }

    fn line_prefix(&mut self) {
        for _ in 0..self.quote_depth {
            self.out.push_str("│ ");
        }
        if self.in_code_block {
            self.out.push_str(CODE_INDENT);
        }
    }

    fn newline(&mut self) {
        self.out.push('\n');
        self.line_start = true;
    }

    fn ensure_newline(&mut self) {
        if !self.line_start {
            self.newline();
        }
    }

    /// Separate a new block from the previous one by a blank line.
    fn block_start(&mut self) {
        if self.out.is_empty() || !self.lists.is_empty() {
            self.ensure_newline();
            return;
        }
        self.ensure_newline();
        if !self.out.ends_with("\n\n") {
            self.newline();
        }
    }

    fn push_style(&mut self, style: &'static str) {
        self.styles.push(style);
        if self.use_color {
            self.out.push_str(style);
        }
    }

    fn pop_style(&mut self) {
        if self.styles.pop().is_some() && self.use_color {
            self.out.push_str(ANSI_RESET);
            for style in &self.styles {
                self.out.push_str(style);
            }
        }
    }
}
