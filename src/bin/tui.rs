mod tui_app;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use tui_app::{
    format_decimal, format_money, format_time_ms, truncate, AppState, ConnectionStatus,
    EntryResponse,
};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(base_url);

    // Initial fetch before rendering
    app.refresh(&client).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut table_state = TableState::default();
    table_state.select(if app.leaderboard.sellers.is_empty() { None } else { Some(0) });

    let result = run_loop(&mut terminal, &mut app, &client, &mut table_state).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    table_state: &mut TableState,
) -> io::Result<()> {
    let refresh_interval = Duration::from_secs(5);
    let mut last_tick = std::time::Instant::now();

    loop {
        terminal.draw(|f| render(f, app, table_state))?;

        let timeout = refresh_interval
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            app.refresh(client).await;
                            last_tick = std::time::Instant::now();
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            let max = app.leaderboard.sellers.len().saturating_sub(1);
                            let next = table_state.selected().map_or(0, |i| (i + 1).min(max));
                            table_state.select(Some(next));
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            let prev = table_state
                                .selected()
                                .map_or(0, |i| i.saturating_sub(1));
                            table_state.select(Some(prev));
                        }
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= refresh_interval {
            app.refresh(client).await;
            last_tick = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, table_state: &mut TableState) {
    let area = f.area();

    // Outer vertical split: header | body | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_body(f, app, table_state, chunks[1]);
    render_footer(f, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => ("● connected".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };

    let sprint_str = app
        .leaderboard
        .active_sprint
        .as_ref()
        .map_or("no active sprint".to_string(), |s| format!("sprint: {}", truncate(&s.title, 24)));

    let snapshot_str = app
        .health
        .last_snapshot_at_ms
        .map_or("no snapshot yet".to_string(), |ms| format!("snapshot {}", format_time_ms(ms)));

    let title_spans = vec![
        Span::styled(
            " Sales Arena  ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(
            format!("{} sellers", app.leaderboard.sellers.len()),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(sprint_str, Style::default().fg(Color::Magenta)),
        Span::raw("  │  "),
        Span::styled(snapshot_str, Style::default().fg(Color::DarkGray)),
    ];

    let header_line = Line::from(title_spans);
    let paragraph = Paragraph::new(header_line)
        .block(Block::default().borders(Borders::ALL).border_style(
            Style::default().fg(Color::DarkGray),
        ));

    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, app: &AppState, table_state: &mut TableState, area: Rect) {
    // Horizontal split: leaderboard (65%) | selected seller (35%)
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    render_leaderboard_table(f, app, table_state, halves[0]);
    let selected = app.entry(table_state.selected());
    render_prize_breakdown(f, app, selected, halves[1]);
}

fn render_leaderboard_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let header_cells = ["#", "Seller", "Sales", "Ticket", "PA", "Points", "Prize"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        });
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .leaderboard
        .sellers
        .iter()
        .map(|e| {
            let rank_color = match e.rank {
                1 => Color::Yellow,
                2 => Color::White,
                3 => Color::LightRed,
                _ => Color::DarkGray,
            };
            let name = if app.is_top_scorer(&e.id) {
                format!("★ {}", truncate(&e.name, 18))
            } else {
                truncate(&e.name, 20)
            };
            let prize_color = if e.total_prize > 0.0 { Color::Green } else { Color::DarkGray };

            Row::new(vec![
                Cell::from(e.rank.to_string()).style(Style::default().fg(rank_color)),
                Cell::from(name),
                Cell::from(format_money(e.sales_value)),
                Cell::from(format_money(e.ticket_average)),
                Cell::from(format_decimal(e.pa)),
                Cell::from(format!("{:.0}", e.points + e.extra_points))
                    .style(Style::default().fg(Color::Cyan)),
                Cell::from(format_money(e.total_prize)).style(Style::default().fg(prize_color)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Min(10),
            Constraint::Length(12),
            Constraint::Length(9),
            Constraint::Length(5),
            Constraint::Length(7),
            Constraint::Length(11),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                " LEADERBOARD ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    )
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    f.render_stateful_widget(table, area, state);
}

fn render_prize_breakdown(
    f: &mut Frame,
    app: &AppState,
    entry: Option<&EntryResponse>,
    area: Rect,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " PRIZES ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let Some(e) = entry else {
        let hint = Paragraph::new(Line::from(Span::styled(
            "select a seller",
            Style::default().fg(Color::DarkGray),
        )))
        .block(block);
        f.render_widget(hint, area);
        return;
    };

    let label =
        |s: &'static str| Span::styled(format!("{s:<14}"), Style::default().fg(Color::Yellow));
    let amount = |v: f64| {
        let color = if v > 0.0 { Color::Green } else { Color::DarkGray };
        Span::styled(format_money(v), Style::default().fg(color))
    };

    let in_sprint = app
        .leaderboard
        .active_sprint
        .as_ref()
        .is_some_and(|s| s.participant_ids.iter().any(|p| p == &e.id));

    let lines = vec![
        Line::from(Span::styled(
            truncate(&e.name, 30),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("rank #{}", e.rank),
            Style::default().fg(Color::DarkGray),
        )),
        Line::raw(""),
        Line::from(vec![label("sales"), amount(e.prizes.sales_value)]),
        Line::from(vec![label("ticket"), amount(e.prizes.ticket_average)]),
        Line::from(vec![label("pa"), amount(e.prizes.pa)]),
        Line::from(vec![label("points"), amount(e.prizes.points)]),
        Line::from(vec![
            label("sprint"),
            amount(e.sprint_prize),
            Span::styled(
                if in_sprint { "" } else { "  (not enrolled)" },
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(vec![label("top scorer"), amount(e.top_scorer_bonus)]),
        Line::raw(""),
        Line::from(vec![
            Span::styled(
                format!("{:<14}", "total"),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format_money(e.total_prize),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
        ]),
    ];

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("refresh  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("select seller  "),
        Span::styled("auto-refresh: 5s", Style::default().fg(Color::DarkGray)),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
