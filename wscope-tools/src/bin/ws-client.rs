// ws-client
//
// Full screen connection log for one WebSocket.
//
// Build: cargo run --release --bin ws-client -- <ws-url> [options]
// Keys:  arrows/PgUp/PgDn/Home/End scroll, i compose, o open, x close,
//        c clear, r reload settings, +/- font size
// Quit:  q / Esc / Ctrl-C

use chrono::{DateTime, Local};
use clap::Parser;
use crossbeam::channel;
use crossterm::style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::{cursor, event, style, terminal, ExecutableCommand, QueueableCommand};
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info};
use wscope::event::FrameType;
use wscope::format::{display_line, highlight_json, Token};
use wscope::log::{ConnectionLog, FrameLayout, GlyphBox, Measure, Placed, Trigger, Viewport};
use wscope::settings::Settings;
use wscope::socket::{close_codes, Client, Delivery, ReadyState, Status};
use wscope_tools::{logging, WsOpts};

#[derive(Parser, Debug)]
#[command(name = "ws-client", version, about = "Interactive WebSocket connection log")]
struct Cli {
    #[command(flatten)]
    ws: WsOpts,

    /// UI refresh rate
    #[arg(long = "fps", default_value_t = 30)]
    fps: u64,
}

/// Rows taken by the header and footer lines.
const CHROME_ROWS: u16 = 2;

/// Frames are laid out in terminal cells: a header row above the body, and
/// the body indented by two columns.
const TERMINAL_LAYOUT: FrameLayout = FrameLayout {
    min_height: 2,
    vertical_padding: 1,
    width_padding: 2,
};

struct TerminalMeasure;

impl Measure for TerminalMeasure {
    fn glyph(&self) -> GlyphBox {
        GlyphBox {
            width: 1,
            height: 1,
        }
    }

    fn available_width(&self) -> u32 {
        terminal::size().map(|(w, _)| w as u32).unwrap_or(80)
    }
}

fn log_height(rows: u16) -> u32 {
    rows.saturating_sub(CHROME_ROWS).max(1) as u32
}

enum Mode {
    Browse,
    Compose(String),
}

struct App {
    opts: WsOpts,
    settings: Settings,
    client: Client,
    log: ConnectionLog,
    viewport: Viewport,
    mode: Mode,
    next_id: u64,
    notice: String,
    dirty: bool,
}

impl App {
    fn on_delivery(&mut self, delivery: Delivery) {
        let now = Instant::now();
        match delivery {
            Delivery::Frames(batch) => {
                self.log.on_frame_batch(batch, now, &mut self.viewport);
            }
            Delivery::Status(status) => {
                self.notice = match status {
                    Status::Open { url, .. } => format!("connected to {}", url),
                    Status::Closed { code, reason } => {
                        format!("closed {} ({}) {}", code, close_codes::describe(code), reason)
                    }
                    Status::Error { error } => format!("error: {}", error),
                    Status::SendSuccess { id, .. } => format!("message #{} sent", id),
                    Status::SendError { id, error, .. } => {
                        format!("message #{} failed: {}", id, error)
                    }
                };
            }
        }
        self.dirty = true;
    }

    /// Returns false when the user asked to quit.
    fn on_key(&mut self, key: event::KeyEvent) -> bool {
        use event::{KeyCode, KeyModifiers};

        if key.kind == event::KeyEventKind::Release {
            return true;
        }
        if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
            return false;
        }
        self.dirty = true;

        if let Mode::Compose(text) = &mut self.mode {
            match key.code {
                KeyCode::Enter => {
                    let message = std::mem::take(text);
                    self.mode = Mode::Browse;
                    self.send(message);
                }
                KeyCode::Esc => self.mode = Mode::Browse,
                KeyCode::Backspace => {
                    text.pop();
                }
                KeyCode::Char(c) => text.push(c),
                _ => {}
            }
            return true;
        }

        let page = self.viewport.viewport_height as i64;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Up => self.scroll(|v| v.scroll_by(-1)),
            KeyCode::Down => self.scroll(|v| v.scroll_by(1)),
            KeyCode::PageUp => self.scroll(|v| v.scroll_by(-page)),
            KeyCode::PageDown => self.scroll(|v| v.scroll_by(page)),
            KeyCode::Home => self.scroll(Viewport::scroll_to_top),
            KeyCode::End => self.scroll(Viewport::scroll_to_bottom),
            KeyCode::Char('i') => self.mode = Mode::Compose(String::new()),
            KeyCode::Char('o') => {
                if let Err(e) = self.client.open(&self.opts.url) {
                    self.notice = e.to_string();
                }
            }
            KeyCode::Char('x') => {
                if let Err(e) = self
                    .client
                    .close(close_codes::NORMAL, "Close requested by user")
                {
                    self.notice = e.to_string();
                }
            }
            KeyCode::Char('c') => {
                self.log.clear(Instant::now(), &mut self.viewport);
            }
            KeyCode::Char('r') => match self.opts.load_settings() {
                Ok(settings) => self.apply_settings(settings),
                Err(e) => {
                    error!("{}", e);
                    self.notice = e.to_string();
                }
            },
            KeyCode::Char('+') => self.change_font_size(1),
            KeyCode::Char('-') => self.change_font_size(-1),
            _ => {}
        }
        true
    }

    fn scroll(&mut self, f: impl FnOnce(&mut Viewport)) {
        f(&mut self.viewport);
        self.log
            .request_redraw(Trigger::Scroll, Instant::now(), &mut self.viewport);
    }

    fn send(&mut self, message: String) {
        if message.is_empty() {
            return;
        }
        let id = self.next_id;
        match self.client.send(id, message) {
            Ok(()) => self.next_id += 1,
            Err(e) => self.notice = format!("message #{} failed: {}", id, e),
        }
    }

    fn change_font_size(&mut self, delta: i32) {
        let size = self.settings.output_font_size.saturating_add_signed(delta).max(6);
        let settings = Settings {
            output_font_size: size,
            ..self.settings.clone()
        };
        self.apply_settings(settings);
    }

    fn apply_settings(&mut self, settings: Settings) {
        let changes = Settings::changes(&self.settings, &settings);
        if changes.is_empty() {
            self.notice = "settings unchanged".to_string();
            return;
        }
        let keys: Vec<&str> = changes.iter().map(|c| c.key()).collect();
        info!("settings changed: {}", keys.join(", "));
        self.log
            .on_config_changed(&settings, Instant::now(), &mut self.viewport);
        self.client.apply_settings(&settings);
        self.settings = settings;
        self.notice = format!("updated {}", keys.join(", "));
    }

    fn on_resize(&mut self, rows: u16) {
        self.viewport.viewport_height = log_height(rows);
        self.log
            .request_redraw(Trigger::Resize, Instant::now(), &mut self.viewport);
        self.dirty = true;
    }

    fn tick(&mut self) {
        if self.log.poll(Instant::now(), &mut self.viewport) {
            self.dirty = true;
        }
    }
}

type Row = Vec<(Color, String)>;

fn kind_color(kind: FrameType) -> Color {
    match kind {
        FrameType::MessageIn => Color::Green,
        FrameType::MessageOut => Color::Cyan,
        FrameType::SocketError | FrameType::UnexpectedResponse => Color::Red,
        FrameType::SocketClose => Color::Yellow,
        _ => Color::DarkGrey,
    }
}

fn token_color(token: Token) -> Color {
    match token {
        Token::Key => Color::Blue,
        Token::String => Color::Green,
        Token::Number => Color::Magenta,
        Token::Literal => Color::Yellow,
        Token::Punctuation => Color::DarkGrey,
        Token::Plain => Color::Reset,
    }
}

fn header_row(placed: &Placed) -> Row {
    let node = &placed.node;
    let time = DateTime::from_timestamp_millis(node.time)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S%.3f").to_string())
        .unwrap_or_default();
    let arrow = match node.kind {
        FrameType::MessageIn => "<<",
        FrameType::MessageOut => ">>",
        _ => "--",
    };
    let mut label = node.kind.to_string();
    if node.is_json {
        label.push_str(" json");
    }
    if node.is_binary {
        label.push_str(" binary");
    }
    vec![
        (Color::DarkGrey, format!("{} ", time)),
        (kind_color(node.kind), format!("{} {}", arrow, label)),
    ]
}

/// Splits a colored line into rows of at most `columns` characters.
fn wrap(spans: Vec<(Color, String)>, columns: usize) -> Vec<Row> {
    let mut rows = Vec::new();
    let mut row: Row = Vec::new();
    let mut width = 0;
    for (color, text) in spans {
        for c in text.chars() {
            if width == columns {
                rows.push(std::mem::take(&mut row));
                width = 0;
            }
            match row.last_mut() {
                Some((last, s)) if *last == color => s.push(c),
                _ => row.push((color, c.to_string())),
            }
            width += 1;
        }
    }
    rows.push(row);
    rows
}

/// Every row of a frame, header first. Always exactly `placed.height` rows.
fn frame_rows(placed: &Placed, columns: usize, highlight: bool) -> Vec<Row> {
    let node = &placed.node;
    let mut rows = vec![header_row(placed)];
    let body_color = kind_color(node.kind);

    if node.kind.is_message() && !node.is_binary {
        for line in &node.lines {
            let spans: Row = if node.is_json && highlight {
                highlight_json(line)
                    .into_iter()
                    .map(|s| (token_color(s.token), s.text.to_string()))
                    .collect()
            } else {
                vec![(Color::Reset, line.clone())]
            };
            rows.extend(wrap(spans, columns.max(1)));
        }
    } else {
        let gutter = node.gutter.as_deref().unwrap_or(&[]);
        for (i, line) in node.lines.iter().enumerate() {
            let mut row = Vec::new();
            if let Some(offset) = gutter.get(i) {
                row.push((Color::DarkGrey, format!("{}  ", offset)));
            }
            row.push((body_color, line.clone()));
            rows.push(row);
        }
    }

    rows.resize_with(placed.height as usize, Vec::new);
    rows
}

struct Tui {
    stdout: io::Stdout,
}

impl Tui {
    fn setup() -> io::Result<Self> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        stdout.execute(terminal::EnterAlternateScreen)?;
        stdout.execute(cursor::Hide)?;
        Ok(Self { stdout })
    }

    fn teardown(&mut self) {
        let _ = self.stdout.execute(cursor::Show);
        let _ = self.stdout.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
        let _ = self.stdout.flush();
    }

    fn print_row(&mut self, y: u16, row: &[(Color, String)], indent: u16, width: u16) -> io::Result<()> {
        self.stdout.queue(cursor::MoveTo(indent, y))?;
        let mut left = width.saturating_sub(indent) as usize;
        for (color, text) in row {
            if left == 0 {
                break;
            }
            let shown: String = text.chars().take(left).collect();
            left -= shown.chars().count();
            self.stdout.queue(SetForegroundColor(*color))?;
            self.stdout.queue(style::Print(shown))?;
        }
        self.stdout.queue(ResetColor)?;
        Ok(())
    }

    fn draw(&mut self, app: &App) -> io::Result<()> {
        let (width, height) = terminal::size()?;
        self.stdout.queue(terminal::Clear(terminal::ClearType::All))?;

        // Header
        let state = match app.client.ready_state() {
            ReadyState::Connecting => "connecting",
            ReadyState::Open => "open",
            ReadyState::Closing => "closing",
            ReadyState::Closed => "closed",
        };
        let window = match app.log.render_window() {
            Some(w) => format!("{}..{}", w.start_index, w.stop_index),
            None => "-".to_string(),
        };
        let header = format!(
            "ws-client  {}  [{}]  frames={} window={} font={}px",
            app.opts.url,
            state,
            app.log.len(),
            window,
            app.settings.output_font_size
        );
        self.stdout.queue(cursor::MoveTo(0, 0))?;
        self.stdout.queue(SetAttribute(Attribute::Bold))?;
        self.stdout
            .queue(style::Print(header.chars().take(width as usize).collect::<String>()))?;
        self.stdout.queue(SetAttribute(Attribute::Reset))?;

        // Log
        let columns = app.log.metrics().columns() as usize;
        let first = app.viewport.scroll_top;
        let last = first + app.viewport.viewport_height as u64;
        for placed in app.log.placed() {
            let bottom = placed.top + placed.height as u64;
            if bottom <= first || placed.top >= last {
                continue;
            }
            let rows = frame_rows(&placed, columns, app.settings.highlight_messages);
            for (i, row) in rows.iter().enumerate() {
                let y = placed.top + i as u64;
                if y < first || y >= last {
                    continue;
                }
                let screen_y = 1 + (y - first) as u16;
                let indent = if i == 0 { 0 } else { TERMINAL_LAYOUT.width_padding as u16 };
                self.print_row(screen_y, row, indent, width)?;
            }
        }

        // Footer
        let footer = match &app.mode {
            Mode::Compose(text) => format!("send> {}", text),
            Mode::Browse if !app.notice.is_empty() => display_line(&app.notice),
            Mode::Browse => {
                "i compose  o open  x close  c clear  r reload  +/- font  q quit".to_string()
            }
        };
        self.stdout.queue(cursor::MoveTo(0, height.saturating_sub(1)))?;
        self.stdout.queue(SetAttribute(Attribute::Reverse))?;
        self.stdout.queue(style::Print(format!(
            "{:<width$}",
            footer.chars().take(width as usize).collect::<String>(),
            width = width as usize
        )))?;
        self.stdout.queue(SetAttribute(Attribute::Reset))?;
        self.stdout.flush()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The terminal belongs to the UI, so only log when asked to log to a file.
    if cli.ws.log_file.is_some() {
        if let Err(e) = logging::init(&cli.ws.log_config()) {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    }

    let settings = match cli.ws.load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let (mut client, deliveries) = Client::new(&settings);
    if let Err(e) = client.open(&cli.ws.url) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    let rows = terminal::size().map(|(_, h)| h).unwrap_or(24);
    let log = ConnectionLog::new(Box::new(TerminalMeasure), TERMINAL_LAYOUT, &settings);
    let mut app = App {
        opts: cli.ws.clone(),
        settings,
        client,
        log,
        viewport: Viewport::new(log_height(rows)),
        mode: Mode::Browse,
        next_id: 1,
        notice: String::new(),
        dirty: true,
    };

    let mut tui = match Tui::setup() {
        Ok(tui) => tui,
        Err(e) => {
            eprintln!("TUI setup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let mut t = Tui {
            stdout: io::stdout(),
        };
        t.teardown();
        original_hook(panic_info);
    }));

    // Keyboard handler
    let (key_tx, key_rx) = channel::unbounded();
    std::thread::spawn(move || loop {
        match event::read() {
            Ok(ev) => {
                if key_tx.send(ev).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });

    // UI loop
    let tick = channel::tick(Duration::from_millis(1000 / cli.fps.max(1)));
    let mut result = ExitCode::SUCCESS;
    'main: loop {
        crossbeam::select! {
            recv(deliveries) -> delivery => {
                if let Ok(delivery) = delivery {
                    app.on_delivery(delivery);
                }
            }

            recv(key_rx) -> ev => {
                match ev {
                    Ok(event::Event::Key(k)) => {
                        if !app.on_key(k) {
                            break 'main;
                        }
                    }
                    Ok(event::Event::Resize(_, rows)) => app.on_resize(rows),
                    Ok(_) => {}
                    Err(_) => break 'main,
                }
            }

            recv(tick) -> _ => {
                app.tick();
                if app.dirty {
                    app.dirty = false;
                    if let Err(e) = tui.draw(&app) {
                        error!("draw failed: {}", e);
                        result = ExitCode::FAILURE;
                        break 'main;
                    }
                }
            }
        }
    }

    app.client.shutdown();
    tui.teardown();
    result
}
