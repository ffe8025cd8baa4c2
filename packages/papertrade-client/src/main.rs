//! Papertrade CLI - command line front end for the paper trading client.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use papertrade_client::state::Loadable;
use papertrade_client::{App, ClientConfig, Error};
use papertrade_core::validation::RegistrationForm;
use papertrade_core::{
    LeaderboardWindow, OrderDraft, OrderStage, OrderType, TimeInForce, TradeSide, UserUpdate,
    COMMISSION_FEE,
};

#[derive(Parser)]
#[command(name = "papertrade")]
#[command(about = "Paper trading client - trade with simulated money")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and remember the session
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Change username, email or password
    Profile {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Show quote, recent history and holding for a symbol
    Quote { symbol: String },
    /// Show cash and holdings
    Portfolio,
    /// Place an order (asks for confirmation)
    Trade {
        /// BUY or SELL
        side: TradeSide,
        symbol: String,
        quantity: f64,
        /// Limit price; places a LIMIT order when set
        #[arg(short, long)]
        limit: Option<f64>,
        /// Keep an unfilled limit order open until cancelled
        #[arg(long)]
        gtc: bool,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List transactions
    Transactions,
    /// Cancel a pending transaction
    Cancel { id: String },
    /// Show the leaderboard
    Leaderboard {
        /// 1d, 7d, 30d or 90d
        #[arg(default_value = "7d")]
        window: LeaderboardWindow,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::load()?;
    let app = App::from_config(&config)?;
    app.start().await;

    if let Err(err) = run(&app, cli.command).await {
        // Backend details are shown as the user would see them in the UI
        match err.downcast_ref::<Error>() {
            Some(client_err) => bail!("{}", client_err.user_message()),
            None => return Err(err),
        }
    }
    Ok(())
}

async fn run(app: &App, command: Commands) -> Result<()> {
    match command {
        Commands::Login { email, password } => {
            let user = app.session.login(&email, &password).await?;
            println!("Signed in as {}", user.username);
        }
        Commands::Register {
            email,
            username,
            password,
        } => {
            let form = RegistrationForm {
                email,
                username,
                confirm_password: password.clone(),
                password,
            };
            let user = app.session.register_and_login(&form).await?;
            println!("Registered and signed in as {}", user.username);
        }
        Commands::Logout => {
            app.session.logout();
            println!("Signed out");
        }
        Commands::Whoami => match app.session.user() {
            Some(user) => {
                let role = if user.is_admin() { " (admin)" } else { "" };
                println!("{} <{}>{}", user.username, user.email, role);
            }
            None => println!("Not signed in"),
        },
        Commands::Profile {
            email,
            username,
            password,
        } => {
            let user = app
                .session
                .update_user(UserUpdate {
                    email,
                    username,
                    password,
                })
                .await?;
            println!("Profile saved: {} <{}>", user.username, user.email);
        }
        Commands::Quote { symbol } => show_quote(app, &symbol).await,
        Commands::Portfolio => {
            let portfolio = app.trade.refresh_portfolio().await?;
            println!("Cash:        {:>12.2}", portfolio.cash_balance);
            println!("Total value: {:>12.2}", portfolio.total_value);
            for holding in &portfolio.holdings {
                println!(
                    "  {:<6} {:>6} @ {:>10.2}",
                    holding.symbol, holding.quantity, holding.average_price
                );
            }
        }
        Commands::Trade {
            side,
            symbol,
            quantity,
            limit,
            gtc,
            yes,
        } => {
            let draft = match limit {
                Some(price) => OrderDraft::limit(&symbol, side, quantity, price),
                None => OrderDraft::market(&symbol, side, quantity),
            };
            let draft = if gtc {
                draft.with_time_in_force(TimeInForce::Gtc)
            } else {
                draft
            };
            place_order(app, draft, yes).await?;
        }
        Commands::Transactions => {
            for tx in app.trade.load_transactions().await? {
                println!(
                    "{}  {}  {:<4} {:<6} {:>6}  {:?}",
                    tx.id,
                    tx.timestamp.format("%Y-%m-%d %H:%M"),
                    tx.side,
                    tx.symbol,
                    tx.quantity,
                    tx.status
                );
            }
        }
        Commands::Cancel { id } => {
            app.trade.load_transactions().await?;
            app.trade.cancel_transaction(&id).await?;
            println!("Cancelled {}", id);
        }
        Commands::Leaderboard { window } => {
            let board = app.trade.leaderboard(window).await?;
            println!("Leaderboard ({})", board.id);
            for entry in &board.entries {
                println!("{:>3}. {:<20} {:>8.2}%", entry.rank, entry.username, entry.ppg);
            }
        }
    }
    Ok(())
}

async fn show_quote(app: &App, symbol: &str) {
    app.trade.select_symbol(symbol).await;
    let market = app.trade.market();

    match &market.quote {
        Loadable::Ready(quote) => println!(
            "{}  {:.2}  {:+.2} ({:+.2}%)",
            quote.symbol, quote.price, quote.change, quote.percent_change
        ),
        Loadable::Failed(message) => println!("Quote unavailable: {}", message),
        _ => {}
    }
    if let Some(history) = market.history.value() {
        println!("{} candles", history.candles.len());
    }
    if let Some(holding) = market.holding.value() {
        println!("Holding: {} shares", holding.quantity);
    }
}

async fn place_order(app: &App, draft: OrderDraft, skip_prompt: bool) -> Result<()> {
    app.trade.select_symbol(&draft.symbol).await;
    let order = app.trade.validate_order(&draft)?;

    let request = order.request();
    let price = app
        .trade
        .market()
        .price()
        .map(|market| order.reference_price(market))
        .context("No price available for this symbol")?;

    println!(
        "{} {} {} @ {} ({:?})",
        request.side,
        request.quantity,
        request.symbol,
        match request.order_type {
            OrderType::Market => "MARKET".to_string(),
            OrderType::Limit => format!("{:.2}", price),
        },
        request.time_in_force
    );
    println!("Commission:      {:>10.2}", COMMISSION_FEE);
    println!("Estimated total: {:>10.2}", order.estimated_total(price));

    app.trade.request_confirmation(order)?;

    if !skip_prompt && !confirm("Place this order?")? {
        app.trade.cancel_confirmation()?;
        println!("Order cancelled");
        return Ok(());
    }

    let tx = app.trade.confirm_and_execute().await?;
    println!("Order {} {:?}", tx.id, tx.status);

    if let OrderStage::Executed(_) = app.trade.stage() {
        app.trade.refresh_portfolio().await?;
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
