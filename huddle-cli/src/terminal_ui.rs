//! Terminal user interface for Huddle calls
//!
//! Renders the call page: a tile grid (the local preview plus one tile per
//! roster entry) and a control bar, redrawn from a state snapshot every
//! frame. Key presses map straight onto the service toggles.

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use huddle_core::{CallService, SinkId};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use std::{
    io::{self, Stdout},
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::broadcast::error::TryRecvError;

/// One rendered participant tile
#[derive(Debug, Clone)]
pub struct Tile {
    /// Name label shown on the tile
    pub label: String,
    /// Sink the engine renders this participant into
    pub sink: String,
    /// Whether the participant publishes audio
    pub has_audio: bool,
}

/// Snapshot of everything one frame needs
#[derive(Debug, Clone)]
struct UiSnapshot {
    connected: bool,
    local_label: String,
    audio_muted: bool,
    video_enabled: bool,
    screen_sharing: bool,
    local_volume: u32,
    elapsed: Duration,
    tiles: Vec<Tile>,
}

impl UiSnapshot {
    async fn collect(service: &CallService, start_time: Instant) -> Self {
        let tiles = service
            .roster()
            .await
            .iter()
            .map(|p| Tile {
                label: format!("{} ({})", service.participant_label(p.uid), p.uid),
                sink: SinkId::remote(p.uid).to_string(),
                has_audio: p.has_audio(),
            })
            .collect();

        Self {
            connected: service.is_connected(),
            local_label: service.local_label(),
            audio_muted: service.is_audio_muted().await,
            video_enabled: service.is_video_enabled().await,
            screen_sharing: service.is_screen_sharing(),
            local_volume: service.local_volume(),
            elapsed: start_time.elapsed(),
            tiles,
        }
    }
}

/// Terminal UI state
pub struct TerminalUI {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    start_time: Instant,
}

impl TerminalUI {
    /// Create a new terminal UI, entering the alternate screen
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            start_time: Instant::now(),
        })
    }

    /// Run the UI main loop until the user quits
    pub async fn run(&mut self, service: Arc<CallService>) -> Result<()> {
        let mut events = service.subscribe_events();

        loop {
            // Drain roster events; the frame below re-reads the full state,
            // so the events only matter for keeping the channel healthy.
            loop {
                match events.try_recv() {
                    Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }

            // Handle input
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Esc => break,
                        KeyCode::Char('m') => service.toggle_audio().await,
                        KeyCode::Char('v') => service.toggle_video().await,
                        KeyCode::Char('s') => service.toggle_screen_sharing().await,
                        KeyCode::Char('+') | KeyCode::Char('=') => {
                            let volume = service.local_volume() as i32 + 50;
                            service.set_local_volume(volume).await;
                        }
                        KeyCode::Char('-') => {
                            let volume = service.local_volume() as i32 - 50;
                            service.set_local_volume(volume).await;
                        }
                        _ => {}
                    }
                }
            }

            // Render UI
            let snapshot = UiSnapshot::collect(&service, self.start_time).await;
            self.terminal.draw(|f| draw_ui(f, &snapshot))?;

            // Small delay to prevent excessive CPU usage
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        Ok(())
    }
}

impl Drop for TerminalUI {
    fn drop(&mut self) {
        // Restore terminal state
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

fn draw_ui(f: &mut Frame, snapshot: &UiSnapshot) {
    let size = f.size();

    // Split the screen vertically
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),   // Tile grid
            Constraint::Length(3), // Call status
            Constraint::Length(3), // Controls
        ])
        .split(size);

    draw_tile_grid(f, chunks[0], snapshot);
    draw_status_area(f, chunks[1], snapshot);
    draw_controls_area(f, chunks[2], snapshot);
}

/// Draw the local preview tile plus one tile per remote participant
fn draw_tile_grid(f: &mut Frame, area: Rect, snapshot: &UiSnapshot) {
    let count = snapshot.tiles.len() + 1;
    let constraints: Vec<Constraint> = (0..count)
        .map(|_| Constraint::Ratio(1, count as u32))
        .collect();
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    let local_body = if snapshot.screen_sharing {
        "sharing screen"
    } else if snapshot.video_enabled {
        "camera on"
    } else {
        "camera off"
    };
    let local = Paragraph::new(vec![
        Line::from(Span::styled(
            SinkId::local().to_string(),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(local_body),
        Line::from(if snapshot.audio_muted {
            Span::styled("muted", Style::default().fg(Color::Red))
        } else {
            Span::raw("mic live")
        }),
    ])
    .block(
        Block::default()
            .title(format!(" {} ", snapshot.local_label))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    )
    .alignment(ratatui::layout::Alignment::Center);
    f.render_widget(local, cells[0]);

    for (tile, cell) in snapshot.tiles.iter().zip(cells.iter().skip(1)) {
        let body = vec![
            Line::from(Span::styled(
                tile.sink.clone(),
                Style::default().fg(Color::DarkGray),
            )),
            Line::from("video on"),
            Line::from(if tile.has_audio { "audio on" } else { "audio off" }),
        ];
        let widget = Paragraph::new(body)
            .block(
                Block::default()
                    .title(format!(" {} ", tile.label))
                    .borders(Borders::ALL),
            )
            .alignment(ratatui::layout::Alignment::Center);
        f.render_widget(widget, *cell);
    }
}

/// Draw the call status line
fn draw_status_area(f: &mut Frame, area: Rect, snapshot: &UiSnapshot) {
    let block = Block::default().title(" Call ").borders(Borders::ALL);

    let status = Line::from(format!(
        "{} | participants: {} | volume: {} | {}",
        if snapshot.connected {
            "connected"
        } else {
            "disconnected"
        },
        snapshot.tiles.len() + 1,
        volume_gauge(snapshot.local_volume),
        elapsed_label(snapshot.elapsed.as_secs()),
    ));

    let paragraph = Paragraph::new(vec![status]).block(block);
    f.render_widget(paragraph, area);
}

/// Draw the control bar
fn draw_controls_area(f: &mut Frame, area: Rect, snapshot: &UiSnapshot) {
    let block = Block::default().title(" Controls ").borders(Borders::ALL);

    let controls = vec![Line::from(vec![
        Span::styled(
            "(q/Esc)",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" Quit | "),
        Span::styled(
            "(m)",
            Style::default().fg(if snapshot.audio_muted {
                Color::Red
            } else {
                Color::Green
            }),
        ),
        Span::raw(" Mute | "),
        Span::styled(
            "(v)",
            Style::default().fg(if snapshot.video_enabled {
                Color::Green
            } else {
                Color::Yellow
            }),
        ),
        Span::raw(" Video | "),
        Span::styled(
            "(s)",
            Style::default().fg(if snapshot.screen_sharing {
                Color::Yellow
            } else {
                Color::Blue
            }),
        ),
        Span::raw(" Share | "),
        Span::styled("(+/-)", Style::default().fg(Color::Blue)),
        Span::raw(" Volume"),
    ])];

    let paragraph = Paragraph::new(controls).block(block);
    f.render_widget(paragraph, area);
}

/// Render a local gain as a ten-step bar, e.g. `[####------] 400`
pub fn volume_gauge(volume: u32) -> String {
    let filled = (volume.min(1000) / 100) as usize;
    format!("[{}{}] {}", "#".repeat(filled), "-".repeat(10 - filled), volume)
}

/// Render elapsed seconds as `mm:ss`
pub fn elapsed_label(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
