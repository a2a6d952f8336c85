/// Token Feed TUI
///
/// Ranks tokens traded within the selected window by market cap, volume or
/// unique traders.
///
/// Keys: `w`/`W` window up/down, `+`/`-` rows, `s` sort metric, `q` quit
use std::{
    error::Error,
    io,
    time::{Duration, Instant},
};

use chrono::Utc;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use pump_flow::{
    shared::config::log_file_from_env, shared::logging::init_file_logging, spawn_flow,
    ConnectionStatus, FeedSnapshot, FlowConfig, TokenAggregate, ViewChange,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame, Terminal,
};
use rustls::crypto::ring::default_provider;

const C_BUY: Color = Color::Rgb(100, 220, 100);
const C_SELL: Color = Color::Rgb(220, 100, 100);
const C_DIM: Color = Color::Rgb(120, 120, 120);
const C_ACCENT: Color = Color::Rgb(100, 180, 220);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = default_provider().install_default();

    init_file_logging(&log_file_from_env())?;
    let config = FlowConfig::from_env();

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    let mut flow = spawn_flow(&config)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // redraw at least once a second so "last trade" ages
    let tick_rate = Duration::from_secs(1);
    let mut last_draw = Instant::now() - tick_rate;

    loop {
        let changed = flow.snapshots.has_changed().unwrap_or(false);
        if changed || last_draw.elapsed() >= tick_rate {
            let snapshot = flow.snapshots.borrow_and_update().clone();
            terminal.draw(|f| render_ui(f, &snapshot))?;
            last_draw = Instant::now();
        }

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                let view = flow.snapshots.borrow().view;
                let change = match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char('w') => Some(ViewChange::Window(view.window.next())),
                    KeyCode::Char('W') => Some(ViewChange::Window(view.window.prev())),
                    KeyCode::Char('+') | KeyCode::Char('=') => {
                        Some(ViewChange::Limit(view.limit.increment()))
                    }
                    KeyCode::Char('-') => Some(ViewChange::Limit(view.limit.decrement())),
                    KeyCode::Char('s') | KeyCode::Tab => {
                        Some(ViewChange::TokenMetric(view.token_metric.next()))
                    }
                    _ => None,
                };
                if let Some(change) = change {
                    flow.change_view(change).await;
                }
            }
        }
    }

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn render_ui(f: &mut Frame, snapshot: &FeedSnapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_header(f, snapshot, chunks[0]);
    render_feed(f, snapshot, chunks[1]);

    let help = Paragraph::new(Line::from(Span::styled(
        " w/W window  +/- rows  s sort  q quit",
        Style::default().fg(C_DIM),
    )));
    f.render_widget(help, chunks[2]);
}

fn render_header(f: &mut Frame, snapshot: &FeedSnapshot, area: Rect) {
    let status_color = match snapshot.connection {
        ConnectionStatus::Connected => C_BUY,
        _ => C_SELL,
    };
    let price = if snapshot.sol_price_usd > 0.0 {
        format!("${:.2}", snapshot.sol_price_usd)
    } else {
        "--".to_string()
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", snapshot.connection.label()),
            Style::default()
                .fg(status_color)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" SOL ", Style::default().fg(C_DIM)),
        Span::raw(price),
        Span::styled("  window ", Style::default().fg(C_DIM)),
        Span::raw(format!("{}m", snapshot.view.window.minutes())),
        Span::styled("  sort ", Style::default().fg(C_DIM)),
        Span::styled(
            snapshot.view.token_metric.label(),
            Style::default().fg(C_ACCENT),
        ),
        Span::styled("  rows ", Style::default().fg(C_DIM)),
        Span::raw(snapshot.view.limit.get().to_string()),
        Span::styled("  retained ", Style::default().fg(C_DIM)),
        Span::raw(snapshot.retained_trades.to_string()),
    ]);

    let block = Block::default()
        .title(" PUMP FLOW - TOKEN FEED ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_ACCENT));
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn render_feed(f: &mut Frame, snapshot: &FeedSnapshot, area: Rect) {
    let header_cells = [
        "NAME", "SYMBOL", "MCAP", "TOTAL VOL", "BUY VOL", "SELL VOL", "TRADERS", "LAST (s)",
    ]
    .iter()
    .map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells).height(1);

    let now = Utc::now();
    let rows = snapshot.tokens.iter().map(|token| {
        let cells = vec![
            Cell::from(token.token.name.clone()),
            Cell::from(token.token.symbol.clone()),
            Cell::from(format_usd(token.market_cap_usd)),
            Cell::from(format_usd(token.total_volume_usd)),
            Cell::from(format_usd(token.buy_volume_usd))
                .style(Style::default().fg(C_BUY)),
            Cell::from(format_usd(token.sell_volume_usd))
                .style(Style::default().fg(C_SELL)),
            Cell::from(token.unique_traders.to_string()),
            Cell::from(token.seconds_since_last_trade(now).to_string()),
        ];
        Row::new(cells)
            .height(1)
            .style(Style::default().fg(flow_color(token)))
    });

    let table = Table::new(
        rows,
        [
            Constraint::Min(16),
            Constraint::Length(10),
            Constraint::Length(14),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(
                " TOP {} BY {} ",
                snapshot.tokens.len(),
                snapshot.view.token_metric.label().to_uppercase()
            ))
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(table, area);
}

/// Green when buys dominate, red when sells do, scaled by dominance
fn flow_color(token: &TokenAggregate) -> Color {
    match token.buy_ratio() {
        None => Color::White,
        Some(buy) if buy > 0.5 => {
            let green = (255.0 * buy) as u8;
            Color::Rgb(255 - green, green, 255 - green)
        }
        Some(buy) => {
            let red = (255.0 * (1.0 - buy)) as u8;
            Color::Rgb(red, 255 - red, 255 - red)
        }
    }
}

fn format_usd(value: f64) -> String {
    let abs = value.abs();
    let sign = if value < 0.0 { "-" } else { "" };
    if abs >= 1_000_000.0 {
        format!("{sign}${:.2}M", abs / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{sign}${:.1}K", abs / 1_000.0)
    } else {
        format!("{sign}${:.2}", abs)
    }
}
