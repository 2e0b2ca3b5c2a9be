//! Colored terminal output for build commands.

use crate::pipeline::{ProgressEvent, Stage};
use std::io::Write;
use termcolor::{Buffer, BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Output manager for consistent colored terminal output
#[derive(Debug)]
pub struct OutputManager {
    bufwtr: BufferWriter,
    verbose: bool,
    quiet: bool,
}

impl Clone for OutputManager {
    fn clone(&self) -> Self {
        Self::new(self.verbose, self.quiet)
    }
}

fn spec(color: Color, bold: bool) -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(color)).set_bold(bold);
    spec
}

/// Write `glyph message`, coloring the glyph and optionally the message.
fn glyph_line(
    buffer: &mut Buffer,
    glyph: &str,
    glyph_spec: &ColorSpec,
    message: &str,
    message_spec: Option<&ColorSpec>,
) -> std::io::Result<()> {
    buffer.set_color(glyph_spec)?;
    write!(buffer, "{glyph}")?;
    buffer.reset()?;
    if let Some(s) = message_spec {
        buffer.set_color(s)?;
    }
    writeln!(buffer, " {message}")?;
    buffer.reset()
}

impl OutputManager {
    /// Create a new output manager
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            bufwtr: BufferWriter::stdout(ColorChoice::Auto),
            verbose,
            quiet,
        }
    }

    fn emit(
        &self,
        glyph: &str,
        glyph_spec: ColorSpec,
        message: &str,
        message_spec: Option<ColorSpec>,
    ) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut buffer = self.bufwtr.buffer();
        glyph_line(&mut buffer, glyph, &glyph_spec, message, message_spec.as_ref())?;
        self.bufwtr.print(&buffer)
    }

    /// Print an info message
    pub fn info(&self, message: &str) -> std::io::Result<()> {
        self.emit("ℹ", spec(Color::Cyan, false), message, None)
    }

    /// Print a success message
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.emit("✓", spec(Color::Green, true), message, None)
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.emit(
            "⚠",
            spec(Color::Yellow, true),
            message,
            Some(spec(Color::Yellow, false)),
        )
    }

    /// Print a progress message
    pub fn progress(&self, message: &str) -> std::io::Result<()> {
        self.emit("⋯", spec(Color::Magenta, false), message, None)
    }

    /// Print a verbose message (only in verbose mode)
    pub fn verbose(&self, message: &str) -> std::io::Result<()> {
        if !self.verbose {
            return Ok(());
        }
        self.emit(
            "→",
            spec(Color::Blue, false),
            message,
            Some(spec(Color::White, false)),
        )
    }

    /// Print an error message to stderr (always shown)
    pub fn error(&self, message: &str) {
        let bufwtr = BufferWriter::stderr(ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let printed = glyph_line(
            &mut buffer,
            "✗",
            &spec(Color::Red, true),
            message,
            Some(&spec(Color::Red, false)),
        )
        .and_then(|()| bufwtr.print(&buffer));
        if printed.is_err() {
            // Stderr failed - fallback to stdout as last resort
            println!("[STDERR ERROR] ✗ {}", message);
        }
    }

    /// Print the start of a pipeline stage
    pub fn stage(&self, event: &ProgressEvent) -> std::io::Result<()> {
        let message = match event.stage {
            Stage::Prepare => format!("Extracting template into {}", event.workspace.display()),
            Stage::Configure => "Staging scripts".to_string(),
            Stage::Build => "Finalizing resources".to_string(),
            Stage::Sign => format!("Signing {}", event.output.display()),
            Stage::Clean => "Cleaning workspace".to_string(),
        };
        self.progress(&message)
    }

    /// Print `label: value` aligned under a section
    pub fn field(&self, label: &str, value: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut buffer = self.bufwtr.buffer();
        buffer.set_color(&spec(Color::Cyan, false))?;
        write!(buffer, "    {label:<12}")?;
        buffer.reset()?;
        writeln!(buffer, " {value}")?;
        self.bufwtr.print(&buffer)
    }

    /// Print indented text (for sub-items)
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut buffer = self.bufwtr.buffer();
        writeln!(buffer, "    {message}")?;
        self.bufwtr.print(&buffer)
    }

    /// Print a plain message (respects quiet mode)
    pub fn println(&self, message: &str) -> std::io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut buffer = self.bufwtr.buffer();
        writeln!(buffer, "{message}")?;
        self.bufwtr.print(&buffer)
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}
