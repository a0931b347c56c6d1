//! Output rendering for chat responses.
//!
//! This module provides the renderer trait the dispatcher reports progress through and a
//! plain-text implementation for the terminal.

use std::io::{self, Write};

use crossterm::cursor::{MoveToColumn, MoveUp};
use crossterm::queue;
use crossterm::terminal::{self, Clear, ClearType};
use unicode_width::UnicodeWidthStr;

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for dim text (used for notices).
const ANSI_DIM: &str = "\x1b[2m";

/// Trait for rendering response output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling and live markdown repaint
/// - Plain text without styling (for piping/redirecting)
/// - Recording renderers in tests
pub trait Renderer: Send {
    /// Called before the first fragment of a response.
    fn start_response(&mut self) {}

    /// Print a chunk of raw response text.
    ///
    /// This is called incrementally as fragments are streamed from the API.
    fn print_text(&mut self, text: &str);

    /// Replace the previous live frame with a freshly rendered one.
    ///
    /// `rendered` is always the rendering of the entire answer so far.
    fn update_live(&mut self, rendered: &str);

    /// Called when a response is complete.
    ///
    /// Used to ensure proper newlines and cleanup after streaming.
    fn finish_response(&mut self);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when a response is interrupted by the user.
    fn print_interrupted(&mut self) {}
}

/// Plain text renderer with optional ANSI styling.
///
/// With color enabled, live frames are repainted in place by moving the cursor back over the
/// rows the previous frame occupied, soft wraps included.  A frame taller than the terminal
/// cannot be repainted; from then on only the last frame is written, when the response
/// finishes.  Without color, no cursor control is emitted and only the last frame is written.
pub struct PlainTextRenderer {
    out: Box<dyn Write + Send>,
    use_color: bool,
    line_start: bool,
    live_rows: usize,
    overflowed: bool,
    pending_frame: Option<String>,
    terminal_size: Option<(u16, u16)>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(Box::new(io::stdout()), use_color)
    }

    /// Creates a renderer that writes to an arbitrary sink.
    pub fn with_writer(out: Box<dyn Write + Send>, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            line_start: true,
            live_rows: 0,
            overflowed: false,
            pending_frame: None,
            terminal_size: None,
        }
    }

    /// Use a fixed terminal geometry of `columns` by `rows` instead of querying the terminal.
    pub fn with_terminal_size(mut self, columns: u16, rows: u16) -> Self {
        self.terminal_size = Some((columns, rows));
        self
    }

    fn terminal_size(&self) -> Option<(u16, u16)> {
        self.terminal_size.or_else(|| terminal::size().ok())
    }

    /// Returns true if ANSI styling is emitted.
    pub fn use_color(&self) -> bool {
        self.use_color
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.out.write_all(text.as_bytes());
        let _ = self.out.flush();
        self.line_start = text.ends_with('\n');
    }

    /// Move the cursor to the first column of the previous live frame and clear below it.
    fn erase_live_frame(&mut self) {
        if self.live_rows == 0 {
            return;
        }
        let _ = erase_rows(&mut self.out, self.live_rows);
        self.live_rows = 0;
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn start_response(&mut self) {
        self.live_rows = 0;
        self.overflowed = false;
        self.pending_frame = None;
    }

    fn print_text(&mut self, text: &str) {
        self.write(text);
    }

    fn update_live(&mut self, rendered: &str) {
        if !self.use_color || self.overflowed {
            self.pending_frame = Some(rendered.to_string());
            return;
        }
        let size = self.terminal_size();
        let rows = match size {
            Some((columns, _)) => frame_rows(rendered, columns),
            None => rendered.split('\n').count(),
        };
        self.erase_live_frame();
        if size.is_some_and(|(_, height)| rows >= usize::from(height)) {
            self.overflowed = true;
            self.pending_frame = Some(rendered.to_string());
            return;
        }
        self.write(rendered);
        self.live_rows = rows;
    }

    fn finish_response(&mut self) {
        if let Some(frame) = self.pending_frame.take() {
            self.write(&frame);
        }
        if !self.line_start {
            self.write("\n");
        }
        self.live_rows = 0;
        self.overflowed = false;
    }

    fn print_error(&mut self, error: &str) {
        if !self.line_start {
            self.write("\n");
        }
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        if !self.line_start {
            self.write("\n");
        }
        self.write(&format!("{info}\n"));
    }

    fn print_interrupted(&mut self) {
        self.pending_frame = None;
        self.live_rows = 0;
        self.overflowed = false;
        let message = if self.use_color {
            format!("\n{ANSI_DIM}[interrupted]{ANSI_RESET}\n")
        } else {
            "\n[interrupted]\n".to_string()
        };
        self.write(&message);
    }
}

/// Queue the cursor movement that returns to the top of a `rows` tall frame and clears it.
fn erase_rows(out: &mut impl Write, rows: usize) -> io::Result<()> {
    queue!(out, MoveToColumn(0))?;
    if rows > 1 {
        let up = u16::try_from(rows - 1).unwrap_or(u16::MAX);
        queue!(out, MoveUp(up))?;
    }
    queue!(out, Clear(ClearType::FromCursorDown))
}

/// Rows `frame` occupies on a terminal `columns` wide.
fn frame_rows(frame: &str, columns: u16) -> usize {
    let columns = usize::from(columns.max(1));
    frame
        .split('\n')
        .map(|line| display_width(line).div_ceil(columns).max(1))
        .sum()
}

/// Display width of `line`, ignoring ANSI escape sequences.
fn display_width(line: &str) -> usize {
    let mut visible = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            visible.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) {
                    break;
                }
            }
        }
    }
    visible.width()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Sink {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color());
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color());
    }

    #[test]
    fn text_is_terminated_on_finish() {
        let sink = Sink::default();
        let mut renderer = PlainTextRenderer::with_writer(Box::new(sink.clone()), false);
        renderer.start_response();
        renderer.print_text("ab");
        renderer.print_text("cd");
        renderer.finish_response();
        assert_eq!(sink.contents(), "abcd\n");
    }

    #[test]
    fn plain_live_frames_only_show_the_last() {
        let sink = Sink::default();
        let mut renderer = PlainTextRenderer::with_writer(Box::new(sink.clone()), false);
        renderer.start_response();
        renderer.update_live("a");
        renderer.update_live("ab\ncd");
        renderer.finish_response();
        assert_eq!(sink.contents(), "ab\ncd\n");
    }

    fn erased(rows: usize) -> String {
        let mut out = Vec::new();
        erase_rows(&mut out, rows).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn color_live_frames_repaint_in_place() {
        let sink = Sink::default();
        let mut renderer = PlainTextRenderer::with_writer(Box::new(sink.clone()), true)
            .with_terminal_size(80, 24);
        renderer.start_response();
        renderer.update_live("one\ntwo");
        renderer.update_live("one\ntwo\nthree");
        renderer.finish_response();
        assert_eq!(
            sink.contents(),
            format!("one\ntwo{}one\ntwo\nthree\n", erased(2))
        );
    }

    #[test]
    fn wrapped_lines_are_erased_too() {
        let sink = Sink::default();
        let mut renderer = PlainTextRenderer::with_writer(Box::new(sink.clone()), true)
            .with_terminal_size(10, 24);
        let wide = "x".repeat(25);
        renderer.start_response();
        renderer.update_live(&wide);
        renderer.update_live("done");
        renderer.finish_response();
        // 25 columns on a 10 column terminal take three rows
        assert_eq!(sink.contents(), format!("{wide}{}done\n", erased(3)));
    }

    #[test]
    fn frames_taller_than_the_terminal_are_written_once() {
        let sink = Sink::default();
        let mut renderer = PlainTextRenderer::with_writer(Box::new(sink.clone()), true)
            .with_terminal_size(10, 4);
        renderer.start_response();
        renderer.update_live("a\nb");
        renderer.update_live("a\nb\nc\nd\ne");
        renderer.update_live("a\nb\nc\nd\ne\nf");
        renderer.finish_response();
        assert_eq!(sink.contents(), format!("a\nb{}a\nb\nc\nd\ne\nf\n", erased(2)));
    }

    #[test]
    fn row_count_ignores_escapes_and_counts_wide_characters() {
        assert_eq!(display_width("\x1b[1m\x1b[4mTitle\x1b[0m"), 5);
        assert_eq!(display_width("你好"), 4);
        assert_eq!(frame_rows("你好你好你好", 10), 2);
        assert_eq!(frame_rows("\n\n", 10), 3);
        assert_eq!(frame_rows("abc", 0), 3);
    }

    #[test]
    fn interrupt_drops_pending_frame() {
        let sink = Sink::default();
        let mut renderer = PlainTextRenderer::with_writer(Box::new(sink.clone()), false);
        renderer.start_response();
        renderer.update_live("partial");
        renderer.print_interrupted();
        assert_eq!(sink.contents(), "\n[interrupted]\n");
    }
}
