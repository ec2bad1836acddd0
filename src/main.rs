use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use protspace_tui::app::{App, Focus};
use protspace_tui::config::ViewerConfig;
use protspace_tui::data::{generate_demo_dataset, load_dataset, Dataset};
use protspace_tui::plot::interaction::{Modifiers, PointerButton, PointerEvent};
use protspace_tui::ui;
use ratatui::DefaultTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "protspace-tui")]
#[command(about = "Explore protein embedding projections in the terminal")]
#[command(version)]
struct Cli {
    /// Dataset JSON file; a generated demo dataset is shown when omitted
    dataset: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Projection to show first
    #[arg(short, long)]
    projection: Option<String>,

    /// Feature to color by
    #[arg(short, long)]
    feature: Option<String>,

    /// Legend rows shown before labels fold into Other
    #[arg(long)]
    max_visible: Option<usize>,

    /// Show every label as its own legend row
    #[arg(long)]
    no_other: bool,

    /// Protein ids to highlight
    #[arg(long, num_args = 1..)]
    highlight: Vec<String>,

    /// Log destination; the terminal belongs to the UI
    #[arg(long, default_value = "protspace-tui.log")]
    log_file: PathBuf,

    /// Size of the generated demo dataset
    #[arg(long, default_value = "20000")]
    demo_points: usize,
}

fn init_logging(path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_file)?;

    let mut config = match &cli.config {
        Some(path) => ViewerConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ViewerConfig::default(),
    };
    if let Some(max_visible) = cli.max_visible {
        config.legend.max_visible = max_visible.max(1);
    }
    if cli.no_other {
        config.legend.include_other = false;
    }

    let dataset = match &cli.dataset {
        Some(path) => load_dataset(path).with_context(|| format!("loading {}", path.display()))?,
        None => {
            log::info!("no dataset given, generating {} demo points", cli.demo_points);
            generate_demo_dataset(cli.demo_points)
        }
    };

    // Initialize terminal
    let mut terminal = ratatui::init();
    terminal.clear()?;
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = start(&mut terminal, &cli, dataset, config);

    // Disable mouse capture and restore terminal
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

fn start(terminal: &mut DefaultTerminal, cli: &Cli, dataset: Dataset, config: ViewerConfig) -> Result<()> {
    let size = terminal.size()?;
    let mut app = App::new(dataset, config, size.width, size.height);

    if let Some(name) = &cli.projection {
        if !app.select_projection(name) {
            log::warn!("unknown projection '{}'", name);
        }
    }
    if let Some(name) = &cli.feature {
        if !app.select_feature(name) {
            log::warn!("unknown feature '{}'", name);
        }
    }
    if !cli.highlight.is_empty() {
        app.set_highlighted(cli.highlight.iter().map(|id| Arc::from(id.as_str())));
    }

    run(terminal, app)
}

fn modifiers(m: KeyModifiers) -> Modifiers {
    Modifiers {
        additive: m.intersects(KeyModifiers::CONTROL | KeyModifiers::SHIFT | KeyModifiers::SUPER),
        alt: m.contains(KeyModifiers::ALT),
    }
}

/// Translate terminal mouse events into plot pointer events
fn handle_mouse(app: &mut App, mouse: MouseEvent, now: Instant) {
    let pos = app.cell_to_dots(mouse.column, mouse.row);
    let inside = app.in_plot(mouse.column, mouse.row);
    let modifiers = modifiers(mouse.modifiers);

    let event = match mouse.kind {
        MouseEventKind::ScrollUp if inside => PointerEvent::Wheel { pos, notches: 1.0 },
        MouseEventKind::ScrollDown if inside => PointerEvent::Wheel { pos, notches: -1.0 },
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => return app.pan(2.0, 0.0),
        MouseEventKind::ScrollRight => return app.pan(-2.0, 0.0),
        MouseEventKind::Down(MouseButton::Left) if inside => PointerEvent::Down {
            pos,
            button: PointerButton::Primary,
            modifiers,
        },
        MouseEventKind::Down(MouseButton::Left) => {
            if let Some(row) = app.legend_row_at(mouse.column, mouse.row) {
                app.legend_click(row, now);
            }
            return;
        }
        MouseEventKind::Down(MouseButton::Right) if inside => PointerEvent::Down {
            pos,
            button: PointerButton::Secondary,
            modifiers,
        },
        MouseEventKind::Drag(MouseButton::Left) => PointerEvent::Drag { pos },
        MouseEventKind::Up(MouseButton::Left) => PointerEvent::Up {
            pos: inside.then_some(pos),
            modifiers,
        },
        MouseEventKind::Moved if inside => PointerEvent::Move { pos },
        MouseEventKind::Moved => PointerEvent::Leave,
        _ => return,
    };
    app.pointer(event, now);
}

/// Keys while the legend has focus; false if the key is not a legend key
fn handle_legend_key(app: &mut App, code: KeyCode) -> bool {
    match code {
        KeyCode::Up | KeyCode::Char('k') => app.move_cursor(-1),
        KeyCode::Down | KeyCode::Char('j') => app.move_cursor(1),
        KeyCode::Char(' ') => app.toggle_row(app.legend_cursor()),
        KeyCode::Enter => app.isolate_row(app.legend_cursor()),
        KeyCode::Char('x') => app.extract_largest_other(),
        KeyCode::Char('X') => app.return_to_other(),
        KeyCode::Char('K') => app.move_row(-1),
        KeyCode::Char('J') => app.move_row(1),
        _ => return false,
    }
    true
}

fn handle_key(app: &mut App, key: KeyEvent, now: Instant) {
    if app.focus == Focus::Legend && handle_legend_key(app, key.code) {
        return;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.quit(),
        KeyCode::Tab => app.toggle_focus(),
        KeyCode::Char('s') => app.toggle_selection_mode(),

        // Pan with hjkl or arrow keys
        KeyCode::Left | KeyCode::Char('h') => app.pan(1.0, 0.0),
        KeyCode::Right | KeyCode::Char('l') => app.pan(-1.0, 0.0),
        KeyCode::Up | KeyCode::Char('k') => app.pan(0.0, 1.0),
        KeyCode::Down | KeyCode::Char('j') => app.pan(0.0, -1.0),

        // Zoom
        KeyCode::Char('+') | KeyCode::Char('=') => app.zoom(1.0),
        KeyCode::Char('-') | KeyCode::Char('_') => app.zoom(-1.0),
        KeyCode::Char('r') | KeyCode::Char('0') => app.reset_view(now),

        KeyCode::Char('f') => app.cycle_feature(),
        KeyCode::Char('p') => app.cycle_projection(),
        KeyCode::Char('i') => app.split(),
        KeyCode::Char('u') => app.undo_split(),
        KeyCode::Char('I') => app.reset_isolation(),
        KeyCode::Char('c') => app.clear_selection(),
        KeyCode::Char('o') => app.toggle_other(),
        KeyCode::Char('[') => app.adjust_max_visible(-1),
        KeyCode::Char(']') => app.adjust_max_visible(1),
        KeyCode::Char('g') => app.toggle_shapes(),
        _ => {}
    }
}

fn handle_event(app: &mut App, event: Event, now: Instant) {
    match event {
        // Only handle key press events (not release)
        Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(app, key, now),
        Event::Mouse(mouse) => handle_mouse(app, mouse, now),
        Event::Resize(width, height) => app.resize(width, height),
        _ => {}
    }
}

fn run(terminal: &mut DefaultTerminal, mut app: App) -> Result<()> {
    loop {
        app.tick(Instant::now());
        if app.needs_redraw() {
            app.render_frame();
            terminal.draw(|frame| ui::render(frame, &app))?;
        }

        // ~60fps; drain every pending event so a burst costs one frame
        if event::poll(Duration::from_millis(16))? {
            loop {
                handle_event(&mut app, event::read()?, Instant::now());
                if !event::poll(Duration::ZERO)? {
                    break;
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
