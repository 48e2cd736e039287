// main.rs

mod api;
mod app;
mod calendar;
mod config;
mod filter;
mod logging;
mod models;
mod parser;
mod store;
mod ui;

use api::ApiClient;
use app::App;
use chrono::Local;
use config::Config;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use store::Store;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    logging::install_tracing(config.log_file.as_deref());

    let client = ApiClient::new(&config.api_url);
    info!(api_url = %client.base_url(), "starting");
    let mut store = Store::new(client);

    // A backend that is down is not fatal; the lists stay empty until `r`.
    store.refresh_all().await;

    let app = App::new(
        store,
        config.query.clone(),
        config.calendar_mode,
        calendar::today(&Local::now()),
    );

    // Setup terminal UI
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.hide_cursor()?;

    let res = ui::run_app(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("terminal error: {}", err);
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}
