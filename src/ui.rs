use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use finnet::{
    company_flows, dashboard_metrics, monthly_trend, revenue_by_type, sector_aggregates,
    top_companies, Company, CompanyFlows, DashboardMetrics, Dataset, ExpenseEstimator,
    MonthlyBucket, NetworkSummary, SectorAggregate, TypeRevenue,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Sectors,
    TransactionTypes,
    Trend,
    Companies,
}

impl Page {
    const ALL: [Page; 5] = [
        Page::Overview,
        Page::Sectors,
        Page::TransactionTypes,
        Page::Trend,
        Page::Companies,
    ];

    pub fn next(&self) -> Self {
        match self {
            Page::Overview => Page::Sectors,
            Page::Sectors => Page::TransactionTypes,
            Page::TransactionTypes => Page::Trend,
            Page::Trend => Page::Companies,
            Page::Companies => Page::Overview,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Overview => Page::Companies,
            Page::Sectors => Page::Overview,
            Page::TransactionTypes => Page::Sectors,
            Page::Trend => Page::TransactionTypes,
            Page::Companies => Page::Trend,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Overview => "Overview",
            Page::Sectors => "Sectors",
            Page::TransactionTypes => "Types",
            Page::Trend => "Trend",
            Page::Companies => "Companies",
        }
    }
}

pub struct App {
    pub dataset: Arc<Dataset>,
    estimator: Box<dyn ExpenseEstimator>,
    pub metrics: DashboardMetrics,
    pub network: NetworkSummary,
    pub sectors: Vec<SectorAggregate>,
    pub types: Vec<TypeRevenue>,
    pub trend: Vec<MonthlyBucket>,
    pub ranked: Vec<Company>,
    pub current_page: Page,
    pub sectors_state: TableState,
    pub companies_state: TableState,
    pub show_detail: bool,
}

impl App {
    pub fn new(dataset: Arc<Dataset>, mut estimator: Box<dyn ExpenseEstimator>) -> Self {
        let metrics = dashboard_metrics(&dataset.companies, estimator.as_mut());
        let network = NetworkSummary::from_dataset(&dataset);
        let sectors = sector_aggregates(&dataset.companies);
        let types = revenue_by_type(&dataset.transactions);
        let trend = monthly_trend(&dataset.transactions);
        let ranked = top_companies(&dataset.companies, dataset.companies.len());

        let mut sectors_state = TableState::default();
        if !sectors.is_empty() {
            sectors_state.select(Some(0));
        }

        let mut companies_state = TableState::default();
        if !ranked.is_empty() {
            companies_state.select(Some(0));
        }

        Self {
            dataset,
            estimator,
            metrics,
            network,
            sectors,
            types,
            trend,
            ranked,
            current_page: Page::Overview,
            sectors_state,
            companies_state,
            show_detail: false,
        }
    }

    /// Recompute dashboard metrics with a fresh draw of expense ratios
    pub fn refresh_metrics(&mut self) {
        self.metrics = dashboard_metrics(&self.dataset.companies, self.estimator.as_mut());
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn selected_company(&self) -> Option<&Company> {
        self.companies_state
            .selected()
            .and_then(|i| self.ranked.get(i))
    }

    pub fn selected_flows(&self) -> Option<CompanyFlows> {
        self.selected_company()
            .map(|c| company_flows(&self.dataset.transactions, &c.id))
    }

    fn active_table(&mut self) -> Option<(&mut TableState, usize)> {
        match self.current_page {
            Page::Sectors => Some((&mut self.sectors_state, self.sectors.len())),
            Page::Companies => Some((&mut self.companies_state, self.ranked.len())),
            _ => None,
        }
    }

    pub fn next(&mut self) {
        if let Some((state, len)) = self.active_table() {
            if len == 0 {
                return;
            }
            let i = match state.selected() {
                Some(i) if i >= len - 1 => 0,
                Some(i) => i + 1,
                None => 0,
            };
            state.select(Some(i));
        }
    }

    pub fn previous(&mut self) {
        if let Some((state, len)) = self.active_table() {
            if len == 0 {
                return;
            }
            let i = match state.selected() {
                Some(0) | None => len - 1,
                Some(i) => i - 1,
            };
            state.select(Some(i));
        }
    }

    pub fn page_down(&mut self) {
        if let Some((state, len)) = self.active_table() {
            if len == 0 {
                return;
            }
            let i = state.selected().map(|i| (i + 20).min(len - 1)).unwrap_or(0);
            state.select(Some(i));
        }
    }

    pub fn page_up(&mut self) {
        if let Some((state, _)) = self.active_table() {
            let i = state.selected().map(|i| i.saturating_sub(20)).unwrap_or(0);
            state.select(Some(i));
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter if app.current_page == Page::Companies => app.toggle_detail(),
                KeyCode::Tab => app.next_page(),
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('r') => app.refresh_metrics(),
                KeyCode::Char(c @ '1'..='5') => {
                    let idx = (c as usize) - ('1' as usize);
                    app.current_page = Page::ALL[idx];
                }
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(())
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Companies {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_companies(f, content_chunks[0], app);
        render_company_detail(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Overview => render_overview(f, chunks[1], app),
            Page::Sectors => render_sectors(f, chunks[1], app),
            Page::TransactionTypes => render_types(f, chunks[1], app),
            Page::Trend => render_trend(f, chunks[1], app),
            Page::Companies => render_companies(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn header_style() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

fn label(text: &str) -> Span<'_> {
    Span::styled(
        text,
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in Page::ALL.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(format!("{} {}", i + 1, page.title()), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Companies: {}", app.network.companies),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Transactions: {}", app.network.transactions),
        Style::default().fg(Color::White),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_overview(f: &mut Frame, area: Rect, app: &App) {
    let m = &app.metrics;
    let margin_color = if m.profit_margin >= 0.0 {
        Color::Green
    } else {
        Color::Red
    };

    let mut content = vec![
        Line::from(""),
        Line::from(vec![Span::styled(
            "  DASHBOARD METRICS",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
        Line::from(""),
        Line::from(vec![label("  Total revenue:  "), Span::raw(format!("{:.2}", m.total_revenue))]),
        Line::from(vec![
            label("  Total expenses: "),
            Span::styled(format!("{:.2}", m.total_expenses), Style::default().fg(Color::Red)),
        ]),
        Line::from(vec![
            label("  Total profit:   "),
            Span::styled(format!("{:.2}", m.total_profit), Style::default().fg(margin_color)),
        ]),
        Line::from(vec![
            label("  Profit margin:  "),
            Span::styled(format!("{:.1}%", m.profit_margin), Style::default().fg(margin_color)),
        ]),
        Line::from(vec![label("  Companies:      "), Span::raw(m.company_count.to_string())]),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "  FINANCIAL NETWORK",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
        Line::from(""),
        Line::from(vec![
            label("  Total value:         "),
            Span::raw(format!("{:.2}", app.network.total_value)),
        ]),
        Line::from(vec![
            label("  Active participants: "),
            Span::raw(app.network.active_participants.to_string()),
        ]),
    ];

    for (kind, count) in &app.network.transactions_by_kind {
        content.push(Line::from(vec![
            Span::raw("    "),
            Span::styled(format!("{:<10}", kind), Style::default().fg(Color::Green)),
            Span::raw(count.to_string()),
        ]));
    }

    content.push(Line::from(""));
    content.push(Line::from(vec![Span::styled(
        "  Press r to redraw expense ratios",
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    )]));

    let overview = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Overview "),
    );

    f.render_widget(overview, area);
}

fn render_sectors(f: &mut Frame, area: Rect, app: &mut App) {
    let header = Row::new(
        ["Sector", "Companies", "Revenue", "Balance"]
            .iter()
            .map(|h| Cell::from(*h).style(header_style())),
    )
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows = app.sectors.iter().map(|s| {
        let color = if s.balance >= 0.0 { Color::Green } else { Color::Red };
        Row::new(vec![
            Cell::from(truncate(&s.sector, 45)),
            Cell::from(s.companies.to_string()),
            Cell::from(format!("{:.2}", s.revenue)),
            Cell::from(format!("{:.2}", s.balance)).style(Style::default().fg(color)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(47),
            Constraint::Length(11),
            Constraint::Length(20),
            Constraint::Length(18),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Revenue by Sector "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.sectors_state);
}

fn render_types(f: &mut Frame, area: Rect, app: &App) {
    let header = Row::new(
        ["Type", "Value", "%", ""]
            .iter()
            .map(|h| Cell::from(*h).style(header_style())),
    )
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows = app.types.iter().map(|t| {
        let bar = "█".repeat((t.percentage.max(0.0) / 2.0) as usize);
        Row::new(vec![
            Cell::from(t.name.clone()),
            Cell::from(format!("{:.2}", t.value)),
            Cell::from(format!("{:.0}%", t.percentage)),
            Cell::from(bar).style(Style::default().fg(Color::Green)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(20),
            Constraint::Length(6),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Value by Transaction Type "),
    );

    f.render_widget(table, area);
}

fn render_trend(f: &mut Frame, area: Rect, app: &App) {
    let max_count = app.trend.iter().map(|b| b.transactions).max().unwrap_or(0);

    let header = Row::new(
        ["Month", "Count", "Amount", ""]
            .iter()
            .map(|h| Cell::from(*h).style(header_style())),
    )
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows = app.trend.iter().map(|b| {
        let width = if max_count == 0 {
            0
        } else {
            b.transactions * 40 / max_count
        };
        Row::new(vec![
            Cell::from(b.month.clone()),
            Cell::from(b.transactions.to_string()),
            Cell::from(format!("{:.2}", b.amount)),
            Cell::from("▇".repeat(width)).style(Style::default().fg(Color::Cyan)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(20),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Transactions per Month "),
    );

    f.render_widget(table, area);
}

fn render_companies(f: &mut Frame, area: Rect, app: &mut App) {
    let header = Row::new(
        ["ID", "Revenue", "Balance", "Sector"]
            .iter()
            .map(|h| Cell::from(*h).style(header_style())),
    )
    .style(Style::default().bg(Color::DarkGray))
    .height(1);

    let rows = app.ranked.iter().map(|c| {
        Row::new(vec![
            Cell::from(c.id.clone()),
            Cell::from(format!("{:.2}", c.revenue)),
            Cell::from(format!("{:.2}", c.balance)),
            Cell::from(truncate(&c.sector_code, 30)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(16),
            Constraint::Length(18),
            Constraint::Length(16),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Companies by Revenue "),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.companies_state);
}

fn render_company_detail(f: &mut Frame, area: Rect, app: &App) {
    let (company, flows) = match (app.selected_company(), app.selected_flows()) {
        (Some(c), Some(flows)) => (c, flows),
        _ => {
            let empty = Paragraph::new("No company selected")
                .block(Block::default().borders(Borders::ALL).title(" Company "));
            f.render_widget(empty, area);
            return;
        }
    };

    let net_color = if flows.net() >= 0.0 { Color::Green } else { Color::Red };

    let content = vec![
        Line::from(""),
        Line::from(vec![label("  ID: "), Span::raw(company.id.as_str())]),
        Line::from(vec![label("  Sector: "), Span::raw(company.sector_code.as_str())]),
        Line::from(vec![label("  Founded: "), Span::raw(company.founded_on.as_str())]),
        Line::from(vec![label("  Reference: "), Span::raw(company.reference_date.as_str())]),
        Line::from(""),
        Line::from("  ─────────────────────────────────────"),
        Line::from(""),
        Line::from(vec![Span::styled(
            "  FLOWS",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]),
        Line::from(""),
        Line::from(vec![
            label("  Sent: "),
            Span::raw(format!("{:.2} ({} tx)", flows.sent, flows.outgoing)),
        ]),
        Line::from(vec![
            label("  Received: "),
            Span::raw(format!("{:.2} ({} tx)", flows.received, flows.incoming)),
        ]),
        Line::from(vec![
            label("  Net: "),
            Span::styled(format!("{:.2}", flows.net()), Style::default().fg(net_color)),
        ]),
        Line::from(vec![
            label("  Counterparties: "),
            Span::raw(flows.counterparties.to_string()),
        ]),
        Line::from(""),
        Line::from(vec![Span::styled(
            "  Press Enter to close",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )]),
    ];

    let detail_panel = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Company Details "),
    );

    f.render_widget(detail_panel, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![Span::styled(
        format!(" {} ", app.current_page.title()),
        Style::default().fg(Color::Cyan),
    )];

    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("Tab", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("1-5", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Jump | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    if app.current_page == Page::Companies {
        status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Details | "));
    }
    status_spans.push(Span::styled("r", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Redraw | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finnet::FixedExpenseRatio;

    const COMPANIES: &str = "\
ID;VL_FATU;VL_SLDO;DT_ABRT;DS_CNAE;DT_REFE
C1;1000;10;2010-01-01;Comércio;2024-01-31
C2;3000;-5;2012-01-01;Indústria;2024-01-31
";

    const TRANSACTIONS: &str = "\
ID_PGTO;ID_RCBE;VL;DS_TRAN;DT_REFE
C1;C2;100;PIX;2024-01-05
C2;C1;300;TED;2024-02-10
";

    fn app() -> App {
        let dataset = Dataset::parse(COMPANIES.as_bytes(), TRANSACTIONS.as_bytes()).unwrap();
        App::new(Arc::new(dataset), Box::new(FixedExpenseRatio::new(0.8)))
    }

    #[test]
    fn test_page_cycle() {
        let mut page = Page::Overview;
        for _ in 0..Page::ALL.len() {
            page = page.next();
        }
        assert_eq!(page, Page::Overview);
        assert_eq!(Page::Overview.previous(), Page::Companies);
    }

    #[test]
    fn test_app_precomputes_reports() {
        let app = app();
        assert_eq!(app.metrics.company_count, 2);
        assert_eq!(app.sectors.len(), 2);
        assert_eq!(app.types.len(), 2);
        assert_eq!(app.trend.len(), 2);
        assert_eq!(app.ranked[0].id, "C2");
    }

    #[test]
    fn test_company_navigation_wraps() {
        let mut app = app();
        app.current_page = Page::Companies;

        assert_eq!(app.selected_company().map(|c| c.id.as_str()), Some("C2"));
        app.next();
        assert_eq!(app.selected_company().map(|c| c.id.as_str()), Some("C1"));
        app.next();
        assert_eq!(app.selected_company().map(|c| c.id.as_str()), Some("C2"));
        app.previous();
        assert_eq!(app.selected_company().map(|c| c.id.as_str()), Some("C1"));

        let flows = app.selected_flows().unwrap();
        assert_eq!(flows.sent, 100.0);
        assert_eq!(flows.received, 300.0);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("Comércio", 20), "Comércio");
        assert_eq!(truncate("Comércio varejista", 8), "Comér...");
    }
}
