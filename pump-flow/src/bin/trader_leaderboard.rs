/// Trader Leaderboard TUI
///
/// Ranks every trader seen this session by trade count, FIFO realized profit
/// or net flow. Ledgers are session totals and ignore the display window.
///
/// Keys: `+`/`-` rows, `s` sort metric, `q` quit
use std::{
    error::Error,
    io,
    time::{Duration, Instant},
};

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use pump_flow::{
    shared::config::log_file_from_env, shared::logging::init_file_logging, spawn_flow,
    ConnectionStatus, FeedSnapshot, FlowConfig, TraderMetric, ViewChange,
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
const C_BRIGHT: Color = Color::Rgb(220, 220, 220);
const C_ACCENT: Color = Color::Rgb(100, 180, 220);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = default_provider().install_default();

    init_file_logging(&log_file_from_env())?;
    let config = FlowConfig::from_env();

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
                    KeyCode::Char('+') | KeyCode::Char('=') => {
                        Some(ViewChange::Limit(view.limit.increment()))
                    }
                    KeyCode::Char('-') => Some(ViewChange::Limit(view.limit.decrement())),
                    KeyCode::Char('s') | KeyCode::Tab => {
                        Some(ViewChange::TraderMetric(view.trader_metric.next()))
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
            Constraint::Length(1),
        ])
        .split(f.area());

    render_header(f, snapshot, chunks[0]);
    render_leaderboard(f, snapshot, chunks[1]);

    // full address of the leader, for pasting into an explorer
    let leader = snapshot
        .traders
        .first()
        .map(|t| format!(" #1 https://solscan.io/account/{}", t.trader_id))
        .unwrap_or_default();
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            leader,
            Style::default().fg(C_BRIGHT),
        ))),
        chunks[2],
    );
    f.render_widget(
        Paragraph::new(Line::from(Span::styled(
            " +/- rows  s sort  q quit",
            Style::default().fg(C_DIM),
        ))),
        chunks[3],
    );
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
        Span::styled("  sort ", Style::default().fg(C_DIM)),
        Span::styled(
            snapshot.view.trader_metric.label(),
            Style::default().fg(C_ACCENT),
        ),
        Span::styled("  rows ", Style::default().fg(C_DIM)),
        Span::raw(snapshot.view.limit.get().to_string()),
        Span::styled("  traders ", Style::default().fg(C_DIM)),
        Span::raw(snapshot.traders_seen.to_string()),
    ]);

    let block = Block::default()
        .title(" PUMP FLOW - TRADER LEADERBOARD ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_ACCENT));
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn render_leaderboard(f: &mut Frame, snapshot: &FeedSnapshot, area: Rect) {
    let sorted_by = snapshot.view.trader_metric;
    let header_cells = [
        ("TRADER", None),
        ("TRADES", Some(TraderMetric::TotalTrades)),
        ("BUY VOL", None),
        ("SELL VOL", None),
        ("NET FLOW", Some(TraderMetric::NetFlow)),
        ("REALIZED", Some(TraderMetric::RealizedProfit)),
        ("TOKENS", None),
        ("OPEN", None),
    ]
    .into_iter()
    .map(|(title, metric)| {
        let color = if metric == Some(sorted_by) {
            C_ACCENT
        } else {
            Color::Yellow
        };
        Cell::from(title).style(
            Style::default()
                .fg(color)
                .add_modifier(Modifier::BOLD),
        )
    });
    let header = Row::new(header_cells).height(1);

    let rows = snapshot.traders.iter().map(|trader| {
        let cells = vec![
            Cell::from(short_address(&trader.trader_id)),
            Cell::from(trader.total_trades.to_string()),
            Cell::from(format_usd(trader.buy_volume_usd)),
            Cell::from(format_usd(trader.sell_volume_usd)),
            Cell::from(format_usd(trader.net_flow_usd))
                .style(Style::default().fg(signed_color(trader.net_flow_usd))),
            Cell::from(format_usd(trader.realized_profit_usd))
                .style(Style::default().fg(signed_color(trader.realized_profit_usd))),
            Cell::from(trader.tokens_traded.to_string()),
            Cell::from(trader.open_positions.to_string()),
        ];
        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(13),
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(7),
            Constraint::Length(5),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(
                " TOP {} BY {} ",
                snapshot.traders.len(),
                sorted_by.label().to_uppercase()
            ))
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(table, area);
}

fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 12 {
        return address.to_string();
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 5..].iter().collect();
    format!("{head}..{tail}")
}

fn signed_color(value: f64) -> Color {
    if value > 0.0 {
        C_BUY
    } else if value < 0.0 {
        C_SELL
    } else {
        C_BRIGHT
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
