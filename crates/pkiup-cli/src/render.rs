use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn current_output_style() -> OutputStyle {
    if !std::io::stdout().is_terminal() {
        return OutputStyle::Plain;
    }
    if std::env::var_os("NO_COLOR").is_some() {
        return OutputStyle::Plain;
    }
    if matches!(std::env::var("TERM").as_deref(), Ok("dumb")) {
        return OutputStyle::Plain;
    }
    OutputStyle::Rich
}

pub fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => format!("[{status}] {message}"),
        OutputStyle::Rich => format!(
            "{} {message}",
            colorize(status_style(status), &format!("[{status}]"))
        ),
    }
}

pub fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

fn status_style(status: &str) -> Style {
    match status {
        "done" | "ok" => Style::new()
            .fg_color(Some(AnsiColor::BrightGreen.into()))
            .effects(Effects::BOLD),
        "fail" => Style::new()
            .fg_color(Some(AnsiColor::BrightRed.into()))
            .effects(Effects::BOLD),
        "skip" => Style::new().fg_color(Some(AnsiColor::BrightBlack.into())),
        _ => Style::new()
            .fg_color(Some(AnsiColor::BrightBlue.into()))
            .effects(Effects::BOLD),
    }
}

fn progress_label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn progress_bar_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::BrightBlue.into()))
}

pub struct StageProgress {
    style: OutputStyle,
    label: String,
    total: u64,
    current: u64,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

impl StageProgress {
    pub fn start(style: OutputStyle, label: &str, total: u64) -> Self {
        let progress_bar = if style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new(total.max(1));
            if let Ok(template) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<10} [{bar:20.cyan/blue}] {pos:>3}/{len:3} {elapsed_precise}",
            ) {
                progress_bar.set_style(template.tick_chars("-=~* ").progress_chars("=>-"));
            }
            progress_bar.set_message(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        Self {
            style,
            label: label.to_string(),
            total,
            current: 0,
            progress_bar,
            started_at: Instant::now(),
        }
    }

    pub fn advance(&mut self, steps: u64) {
        let current = self.current.saturating_add(steps);
        self.set(current);
    }

    pub fn set(&mut self, current: u64) {
        self.current = current.min(self.total);

        let Some(progress_bar) = &self.progress_bar else {
            return;
        };

        let safe_total = self.total.max(1);
        progress_bar.set_length(safe_total);
        progress_bar.set_position(self.current.min(safe_total));
    }

    /// Prints above the live bar so step banners stay readable.
    pub fn println(&self, text: &str) {
        match &self.progress_bar {
            Some(progress_bar) => progress_bar.println(text),
            None => println!("{text}"),
        }
    }

    pub fn finish_success(mut self) {
        let Some(progress_bar) = self.progress_bar.take() else {
            return;
        };

        progress_bar.finish_and_clear();
        if let Some(line) = render_progress_line(
            self.style,
            &self.label,
            self.current,
            self.total,
            Some(self.started_at.elapsed()),
        ) {
            println!("{line}");
        }
    }

    pub fn finish_abandon(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

pub fn render_progress_line(
    style: OutputStyle,
    label: &str,
    current: u64,
    total: u64,
    elapsed: Option<Duration>,
) -> Option<String> {
    if style == OutputStyle::Plain {
        return None;
    }

    let width = 18_usize;
    let safe_total = total.max(1);
    let bounded_current = current.min(safe_total);
    let filled = ((bounded_current as usize) * width) / (safe_total as usize);
    let bar = format!(
        "{}{}",
        "=".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    let percent = (bounded_current * 100) / safe_total;
    let counts = format!("{current}/{total}");
    let suffix = elapsed
        .map(|value| format!(" complete in {}", format_elapsed(value)))
        .unwrap_or_default();

    Some(format!(
        "{} [{}] {:>3}% {}{}",
        colorize(progress_label_style(), label),
        colorize(progress_bar_style(), &bar),
        percent,
        counts,
        suffix
    ))
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}
