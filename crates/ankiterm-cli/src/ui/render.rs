//! Rendering primitives for CLI output.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::{ASCII_MARKDOWN, NOTHING, UTF8_FULL};
use comfy_table::{Attribute, Cell, ContentArrangement, Table as ComfyTable};

use serde_json::json;

use super::context::UiContext;
use super::format::single_line;
use super::mode::OutputMode;
use super::theme::{styled, styles, Badge};

/// Render a header line for a command.
///
/// Pretty mode: "Ankiterm · command" with the archive path on a second line.
/// Plain mode: "ankiterm command"
pub fn header(ctx: &UiContext, command: &str, path: Option<&str>) -> String {
    match ctx.mode {
        OutputMode::Pretty => {
            let title = styled("Ankiterm", styles::bold(), ctx.color);
            let mut out = format!("{} \u{00B7} {}", title, command);
            if let Some(p) = path {
                out.push_str(&format!("\n{}", kv(ctx, "Archive", &shorten_path(p, 50))));
            }
            out
        }
        OutputMode::Plain => format!("ankiterm {}", command),
        OutputMode::Json => String::new(),
    }
}

/// Keep the tail of a long path, since the file name is what matters.
fn shorten_path(path: &str, max: usize) -> String {
    let count = path.chars().count();
    if count <= max {
        return path.to_string();
    }
    let tail: String = path.chars().skip(count - (max - 3)).collect();
    format!("...{}", tail)
}

/// Render a badge with optional message.
pub fn badge(ctx: &UiContext, kind: Badge, message: &str) -> String {
    let colored_badge = styled(kind.display(ctx.unicode), kind.style(), ctx.color);
    if message.is_empty() {
        colored_badge
    } else {
        format!("{} {}", colored_badge, message)
    }
}

/// Render a key-value pair.
///
/// Pretty mode: "Key: value" with dim key
/// Plain mode: "key=value"
pub fn kv(ctx: &UiContext, key: &str, value: &str) -> String {
    if ctx.mode.is_pretty() {
        let styled_key = styled(&format!("{}:", key), styles::dim(), ctx.color);
        format!("{} {}", styled_key, value)
    } else {
        format!("{}={}", key.to_lowercase().replace(' ', "_"), value)
    }
}

/// Render a hint line.
pub fn hint(ctx: &UiContext, text: &str) -> String {
    if ctx.mode.is_pretty() {
        let label = styled("Hint:", styles::dim(), ctx.color);
        format!("{} {}", label, text)
    } else {
        format!("hint={}", text)
    }
}

/// Render a receipt (summary block after an action).
///
/// Pretty mode: badge + indented key-value pairs
/// Plain mode: status line + key=value lines
pub fn receipt(ctx: &UiContext, kind: Badge, title: &str, items: &[(&str, String)]) -> String {
    let mut lines = Vec::new();

    if ctx.mode.is_pretty() {
        lines.push(badge(ctx, kind, title));
        for (key, value) in items {
            lines.push(format!("  {}", kv(ctx, key, value)));
        }
    } else {
        let status = match kind {
            Badge::Ok | Badge::Info => "ok",
            Badge::Warn => "partial",
            Badge::Err => "error",
        };
        lines.push(format!("status={}", status));
        lines.push(kv(ctx, "Message", title));
        for (key, value) in items {
            lines.push(kv(ctx, key, value));
        }
    }

    lines.join("\n")
}

/// Column definition for table rendering.
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
}

impl Column {
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }
}

/// Render a bordered table.
///
/// Pretty mode: comfy-table with rounded borders
/// Plain mode: tab-separated values, header first
pub fn table(ctx: &UiContext, columns: &[Column], rows: &[Vec<String>]) -> String {
    if ctx.mode.is_pretty() {
        let mut table = ComfyTable::new();
        if ctx.unicode {
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS);
        } else {
            table.load_preset(ASCII_MARKDOWN);
        }
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_width(ctx.width.min(u16::MAX as usize) as u16);
        table.set_header(columns.iter().map(|c| c.header.as_str()));
        for row in rows {
            table.add_row(row);
        }
        table.to_string()
    } else {
        plain_rows(columns, rows)
    }
}

/// Render a borderless table with dim headers.
pub fn simple_table(ctx: &UiContext, columns: &[Column], rows: &[Vec<String>]) -> String {
    if ctx.mode.is_pretty() {
        let mut table = ComfyTable::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);

        let header_cells: Vec<Cell> = columns
            .iter()
            .map(|c| {
                let cell = Cell::new(&c.header);
                if ctx.color {
                    cell.add_attribute(Attribute::Dim)
                } else {
                    cell
                }
            })
            .collect();
        table.set_header(header_cells);

        for i in 0..columns.len() {
            if let Some(column) = table.column_mut(i) {
                column.set_padding((0, 2));
            }
        }
        for row in rows {
            table.add_row(row);
        }
        table.to_string()
    } else {
        plain_rows(columns, rows)
    }
}

/// One record per line, tab-separated. Field values may hold tabs and
/// newlines, so cells are flattened first.
fn plain_rows(columns: &[Column], rows: &[Vec<String>]) -> String {
    let header = columns.iter().map(|c| c.header.to_lowercase().replace(' ', "_"));
    std::iter::once(header.collect::<Vec<_>>().join("\t"))
        .chain(rows.iter().map(|row| {
            row.iter()
                .map(|cell| single_line(cell).replace('\t', " "))
                .collect::<Vec<_>>()
                .join("\t")
        }))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print a message to stdout unless in JSON mode.
pub fn print(ctx: &UiContext, message: &str) {
    if !ctx.mode.is_json() && !message.is_empty() {
        println!("{}", message);
    }
}

/// Print an empty line (only in pretty mode).
pub fn blank_line(ctx: &UiContext) {
    if ctx.mode.is_pretty() {
        println!();
    }
}

/// Format an error for stderr. JSON mode gets an `{"error", "hint"}`
/// object so scripts can parse failures the same way as results.
pub fn error_message(ctx: &UiContext, message: &str, error_hint: Option<&str>) -> String {
    match ctx.mode {
        OutputMode::Json => json!({ "error": message, "hint": error_hint }).to_string(),
        OutputMode::Pretty => {
            let mut out = badge(ctx, Badge::Err, message);
            if let Some(h) = error_hint {
                out.push('\n');
                out.push_str(&hint(ctx, h));
            }
            out
        }
        OutputMode::Plain => match error_hint {
            Some(h) => format!("error={}\nhint={}", message, h),
            None => format!("error={}", message),
        },
    }
}

/// Print an error message to stderr with optional hint.
pub fn print_error(ctx: &UiContext, message: &str, error_hint: Option<&str>) {
    eprintln!("{}", error_message(ctx, message, error_hint));
}
