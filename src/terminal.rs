// SPDX-License-Identifier: GPL-3.0-only

//! Terminal scanner UI
//!
//! Shows the camera preview with the decode band highlighted, the camera
//! list, the latest result, the history and the selection diagnostics.
//! The preview uses Unicode half-block characters for improved vertical
//! resolution.

use crate::backends::camera::CameraPlatform;
use crate::backends::camera::types::CameraFrame;
use crate::config::Config;
use crate::decoder::load_default_decoder;
use crate::scanner::{CropConfig, CropRegion, ScanEvent, ScanSession, SessionSnapshot};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, List, ListItem, Paragraph, Widget, Wrap},
};
use std::io::{self, stdout};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{error, info};

/// Input poll timeout, also the redraw cadence
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run the terminal scanner
pub fn run(
    platform: Arc<dyn CameraPlatform>,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = runtime.block_on(run_app(&mut terminal, platform, config));

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// UI state that is not owned by the session
struct AppState {
    show_diagnostics: bool,
    status: String,
}

enum Action {
    Start,
    Switch(usize),
    Next,
    ToggleDiagnostics,
    Quit,
}

fn key_action(code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('s') => Some(Action::Start),
        KeyCode::Char('n') => Some(Action::Next),
        KeyCode::Char('d') => Some(Action::ToggleDiagnostics),
        KeyCode::Char(c @ '1'..='9') => c.to_digit(10).map(|d| Action::Switch(d as usize - 1)),
        _ => None,
    }
}

/// Action for a terminal event; only key presses count
fn press_action(event: Event) -> Option<Action> {
    let Event::Key(key) = event else {
        return None;
    };
    if key.kind != KeyEventKind::Press {
        return None;
    }
    key_action(key.code, key.modifiers)
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    platform: Arc<dyn CameraPlatform>,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let crop = config.sampler.crop;
    let mut session = ScanSession::new(platform, load_default_decoder(), config);
    let mut events = session.subscribe();
    let mut state = AppState {
        show_diagnostics: false,
        status: help_message(),
    };

    loop {
        // Drain events so the status line shows the newest result
        loop {
            match events.try_recv() {
                Ok(ScanEvent::Decoded(record)) => state.status = format!("Decoded {}", record),
                Ok(ScanEvent::ActiveDeviceChanged(_)) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    info!(skipped, "UI lagged behind scan events")
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        let snapshot = session.snapshot();
        let preview = FrameWidget {
            frame: session.current_frame(),
            crop,
        };
        terminal.draw(|f| draw(f, &snapshot, &preview, &state))?;

        // Handle input with timeout for frame updates
        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let Some(action) = press_action(event::read()?) else {
            continue;
        };

        match action {
            Action::Quit => break,
            Action::ToggleDiagnostics => state.show_diagnostics = !state.show_diagnostics,
            Action::Start => {
                state.status = "Selecting camera...".to_string();
                terminal.draw(|f| draw(f, &snapshot, &preview, &state))?;
                state.status = match session.start().await {
                    Ok(selection) => format!("Selected {}", selection.device_id),
                    Err(e) => {
                        error!(error = %e, "Failed to start scanning");
                        format!("Error: {}", e)
                    }
                };
            }
            Action::Switch(index) => {
                let target = session.cameras().get(index).map(|c| c.device_id.clone());
                state.status = switch_to(&mut session, target).await;
            }
            Action::Next => {
                let target = session.next_camera().map(|c| c.device_id.clone());
                state.status = switch_to(&mut session, target).await;
            }
        }
    }

    session.stop().await;
    if let Err(e) = session.config().save() {
        error!(error = %e, "Failed to save config");
    }
    Ok(())
}

async fn switch_to(session: &mut ScanSession, device_id: Option<String>) -> String {
    let Some(device_id) = device_id else {
        return "No such camera (press 's' to enumerate)".to_string();
    };
    match session.switch_device(&device_id).await {
        Ok(()) => format!("Switched to {}", device_id),
        Err(e) => {
            error!(device_id = %device_id, error = %e, "Failed to switch camera");
            format!("Error: {}", e)
        }
    }
}

fn help_message() -> String {
    "'s' start | '1'-'9' camera | 'n' next | 'd' diagnostics | 'q' quit".to_string()
}

fn draw(
    f: &mut ratatui::Frame,
    snapshot: &SessionSnapshot,
    preview: &FrameWidget,
    state: &AppState,
) {
    let area = f.area();

    // Reserve bottom line for status
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[0]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(snapshot.cameras.len().max(1) as u16 + 2),
            Constraint::Length(4),
            Constraint::Min(3),
        ])
        .split(columns[1]);

    let preview_block = Block::bordered().title(match &snapshot.active_device {
        Some(id) => format!(" {} ", id),
        None => " no camera ".to_string(),
    });
    let preview_area = preview_block.inner(columns[0]);
    f.render_widget(preview_block, columns[0]);
    f.render_widget(preview, preview_area);

    f.render_widget(camera_list(snapshot), side[0]);
    f.render_widget(latest_result(snapshot), side[1]);
    if state.show_diagnostics {
        f.render_widget(diagnostics(snapshot), side[2]);
    } else {
        f.render_widget(history(snapshot), side[2]);
    }

    let status = StatusBar {
        message: &state.status,
    };
    f.render_widget(status, rows[1]);
}

fn camera_list(snapshot: &SessionSnapshot) -> List<'static> {
    let items: Vec<ListItem> = snapshot
        .cameras
        .iter()
        .enumerate()
        .map(|(index, camera)| {
            let active = snapshot.active_device.as_deref() == Some(camera.device_id.as_str());
            let style = if active {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let marker = if active { '>' } else { ' ' };
            let text = format!("{} [{}] {}", marker, index + 1, camera.display_name());
            ListItem::new(text).style(style)
        })
        .collect();
    List::new(items).block(Block::bordered().title(" Cameras "))
}

fn latest_result(snapshot: &SessionSnapshot) -> Paragraph<'static> {
    let line = match &snapshot.latest {
        Some(record) => Line::from(vec![
            Span::styled(
                format!("{}: ", record.format),
                Style::default().fg(Color::Yellow),
            ),
            Span::raw(record.text.clone()),
        ]),
        None if !snapshot.decoder_loaded => Line::from("Loading decoder..."),
        None => Line::from("Point a barcode at the camera..."),
    };
    Paragraph::new(line)
        .wrap(Wrap { trim: true })
        .block(Block::bordered().title(" Decoded "))
}

fn history(snapshot: &SessionSnapshot) -> List<'static> {
    let items: Vec<ListItem> = snapshot
        .history
        .iter()
        .map(|record| {
            ListItem::new(format!(
                "{} {}",
                record.scanned_at.format("%H:%M:%S"),
                record
            ))
        })
        .collect();
    List::new(items).block(Block::bordered().title(" History "))
}

fn diagnostics(snapshot: &SessionSnapshot) -> Paragraph<'static> {
    let text = serde_json::to_string_pretty(&snapshot.diagnostics)
        .unwrap_or_else(|e| format!("Failed to render diagnostics: {}", e));
    Paragraph::new(text).block(Block::bordered().title(" Auto-selection diagnostics "))
}

/// Widget that renders a camera frame using half-block characters
///
/// Rows outside the decode band are dimmed.
struct FrameWidget {
    frame: Option<CameraFrame>,
    crop: CropConfig,
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.as_ref().filter(|f| f.width > 0 && f.height > 0) else {
            // No frame yet - show placeholder
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };
        if area.width == 0 || area.height == 0 {
            return;
        }

        // Calculate display dimensions maintaining aspect ratio
        // Each terminal cell displays 2 vertical pixels using half-block characters
        let frame_aspect = frame.width as f64 / frame.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            let h = term_height;
            let w = h * frame_aspect;
            ((w as u16).max(1), ((h / 2.0) as u16).max(1))
        } else {
            let w = term_width;
            let h = w / frame_aspect;
            ((w as u16).max(1), ((h / 2.0) as u16).max(1))
        };

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width as f64 / display_width as f64;
        let y_scale = frame.height as f64 / (display_height * 2) as f64;
        let band = self.crop.region(frame.width, frame.height);

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let top_color = sample_pixel(frame, &band, src_x, src_y_top);
                let bottom_color = sample_pixel(frame, &band, src_x, src_y_bottom);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

fn in_region(region: &CropRegion, x: u32, y: u32) -> bool {
    x >= region.x && x < region.x + region.width && y >= region.y && y < region.y + region.height
}

fn sample_pixel(frame: &CameraFrame, band: &CropRegion, x: u32, y: u32) -> Color {
    let x = x.min(frame.width - 1);
    let y = y.min(frame.height - 1);
    let idx = (y * frame.stride + x * 4) as usize;

    let (r, g, b) = match frame.data.get(idx..idx + 3) {
        Some(px) => (px[0], px[1], px[2]),
        None => (0, 0, 0),
    };

    if in_region(band, x, y) {
        Color::Rgb(r, g, b)
    } else {
        // Blend towards white like the overlay in the web scanner
        let fade = |c: u8| ((c as u16 + 2 * 250) / 3) as u8;
        Color::Rgb(fade(r), fade(g), fade(b))
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}
