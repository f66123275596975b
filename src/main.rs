//! storefront-console: order workflow console for the storefront backend

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use storefront_console::domain::workflow::next_step_hint;
use storefront_console::payment::{PaymentOutcome, PaymentWatch};
use storefront_console::{
    ApiClient, AuthContext, Config, Notice, NoticeLevel, Notices, Order, OrderAction, OrderBackend, OrderListWatch,
    OrderStatus, OrderWatch, PollControl, PollingSession, TrackingNumber, TransitionRequest,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "storefront-console")]
#[command(about = "Storefront order workflow console", long_about = None)]
struct Cli {
    /// Backend base URL (overrides STOREFRONT_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token (overrides STOREFRONT_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one order with its status history.
    Show { id: i64 },

    /// List orders, optionally filtered by status code or name.
    List {
        #[arg(long)]
        status: Option<OrderStatus>,
        /// Number of pages to load.
        #[arg(long, default_value_t = 1)]
        pages: u32,
        /// Orders per page; the backend default when omitted.
        #[arg(long)]
        size: Option<u32>,
        /// Keep refreshing the first page. Press Enter to refresh immediately.
        #[arg(long)]
        watch: bool,
    },

    /// Follow an order until it settles. Press Enter to refresh immediately.
    Watch { id: i64 },

    /// Apply the action currently offered for the order.
    Advance {
        id: i64,
        #[arg(long)]
        note: Option<String>,
        /// Required when shipping.
        #[arg(long)]
        tracking: Option<String>,
    },

    /// Cancel an order that has not shipped yet.
    Cancel {
        id: i64,
        #[arg(long)]
        note: Option<String>,
        #[arg(long)]
        detail: Option<String>,
    },

    /// Follow a payment gateway transaction until it leaves processing.
    Payment { app_trans_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(url) = cli.api_url { config.api_url = url; }
    if let Some(token) = cli.token { config.token = Some(token); }

    let auth = config.token.as_deref().map(AuthContext::with_token).unwrap_or_default();
    let client = ApiClient::new(&config, auth).context("building http client")?;
    let backend: Arc<dyn OrderBackend> = Arc::new(client.clone());
    let notices = Notices::default();
    tracing::info!(api_url = %config.api_url, "storefront-console starting");

    match cli.cmd {
        Commands::Show { id } => {
            let watch = OrderWatch::new(id, backend, notices);
            watch.refresh().await?;
            print_order(&loaded(&watch)?);
        }
        Commands::List { status, pages, size, watch: follow_changes } => {
            let watch = match size {
                Some(size) => OrderListWatch::paged(status, size, backend, notices.clone()),
                None => OrderListWatch::new(status, backend, notices.clone()),
            };
            watch.refresh().await?;
            for _ in 1..pages.max(1) {
                if watch.load_more().await? == 0 { break; }
            }
            print_list(&watch.orders(), watch.snapshot().is_end);
            if follow_changes {
                let session = PollingSession::new("orders");
                watch.attach(&session, config.list_poll);
                follow_list(&watch, &session, &notices).await;
            }
        }
        Commands::Watch { id } => {
            let watch = OrderWatch::new(id, backend, notices.clone());
            watch.refresh().await?;
            let order = loaded(&watch)?;
            print_order(&order);
            if order.is_final() {
                return Ok(());
            }
            let session = PollingSession::new(format!("order-{id}"));
            watch.attach(&session, config.order_poll);
            follow(&watch, &session, &notices, order).await?;
        }
        Commands::Advance { id, note, tracking } => {
            let watch = OrderWatch::new(id, backend, notices);
            watch.refresh().await?;
            let order = loaded(&watch)?;
            let action = order
                .next_action()
                .ok_or_else(|| anyhow!("order #{id} has no action to apply ({})", status_label(&order)))?;
            let note = note.unwrap_or_default();
            let request = if action == OrderAction::Ship {
                let raw = tracking.ok_or_else(|| anyhow!("--tracking is required to ship. {}", TrackingNumber::format_hint()))?;
                let tracking = TrackingNumber::new(&raw).with_context(|| format!("invalid tracking number {raw:?}"))?;
                if let Some(warning) = tracking.warning() { eprintln!("warning: {warning}"); }
                TransitionRequest::shipping(note, &tracking)
            } else {
                TransitionRequest::new(note)
            };
            watch.apply(action, request).await?;
            print_order(&loaded(&watch)?);
        }
        Commands::Cancel { id, note, detail } => {
            let watch = OrderWatch::new(id, backend, notices);
            watch.refresh().await?;
            let mut request = TransitionRequest::new(note.unwrap_or_default());
            if let Some(detail) = detail { request = request.with_detail(detail); }
            watch.cancel(request).await?;
            print_order(&loaded(&watch)?);
        }
        Commands::Payment { app_trans_id } => {
            let watch = PaymentWatch::new(app_trans_id, Arc::new(client), notices);
            let session = PollingSession::new("payment");
            if watch.refresh().await? == PollControl::Continue {
                println!("payment processing, checking every {}s", config.payment_poll.as_secs());
                watch.attach(&session, config.payment_poll);
                wait_idle(&session).await;
            }
            match watch.last() {
                Some(s) if s.outcome() == PaymentOutcome::Succeeded => println!("✅ payment succeeded"),
                Some(s) if s.outcome() == PaymentOutcome::Failed => bail!("payment failed: {}", s.return_message),
                _ => println!("payment still processing"),
            }
        }
    }
    Ok(())
}

fn loaded(watch: &OrderWatch) -> Result<Order> {
    watch.order().ok_or_else(|| anyhow!("order #{} was not loaded", watch.id()))
}

/// Prints status changes until the order settles or the user interrupts.
async fn follow(watch: &OrderWatch, session: &PollingSession, notices: &Notices, mut shown: Order) -> Result<()> {
    let mut rx = notices.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut check = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                session.stop();
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(_)) => { watch.focus(session); }
                _ => stdin_open = false,
            },
            notice = rx.recv() => {
                if let Ok(notice) = notice { print_notice(&notice); }
            }
            _ = check.tick() => {
                if let Some(order) = watch.order() {
                    if order.status != shown.status {
                        print_order(&order);
                        shown = order;
                    }
                }
                if !session.is_running() { break; }
            }
        }
    }
    Ok(())
}

/// Reprints the list whenever a refresh changes it, until the user interrupts.
async fn follow_list(watch: &OrderListWatch, session: &PollingSession, notices: &Notices) {
    let mut rx = notices.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut shown = watch.orders();
    let mut check = tokio::time::interval(Duration::from_millis(500));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                session.stop();
                return;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(_)) => { watch.focus(session); }
                _ => stdin_open = false,
            },
            notice = rx.recv() => {
                if let Ok(notice) = notice { print_notice(&notice); }
            }
            _ = check.tick() => {
                let orders = watch.orders();
                if orders != shown {
                    print_list(&orders, watch.snapshot().is_end);
                    shown = orders;
                }
            }
        }
    }
}

async fn wait_idle(session: &PollingSession) {
    let mut check = tokio::time::interval(Duration::from_millis(250));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => { session.stop(); return; }
            _ = check.tick() => {
                if !session.is_running() { return; }
            }
        }
    }
}

fn status_label(order: &Order) -> String {
    order.current_code().map(|c| c.to_string()).unwrap_or_else(|| "no status".into())
}

fn print_notice(notice: &Notice) {
    let tag = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Success => "ok",
        NoticeLevel::Warning => "warn",
        NoticeLevel::Error => "error",
    };
    eprintln!("[{tag}] {}", notice.message);
}

fn print_list(orders: &[Order], is_end: bool) {
    for order in orders { print_summary(order); }
    println!("{} order(s){}", orders.len(), if is_end { "" } else { ", more available" });
}

fn print_summary(order: &Order) {
    let when = order.current_status().map(|e| e.display_time()).unwrap_or_default();
    println!("#{:<8} {:<28} {:>14}  {}", order.id, status_label(order), order.total.to_string(), when);
}

fn print_order(order: &Order) {
    println!("Order #{}  {}  total {}", order.id, status_label(order), order.total);
    if let Some(method) = order.payment_method() { println!("  payment: {method}"); }
    for line in &order.order_lines {
        let options = line.options_label();
        let options = if options.is_empty() { String::new() } else { format!(" ({options})") };
        println!("  {} x{}{}  {}", line.product_name(), line.qty, options, line.total);
    }
    println!("  history:");
    for event in &order.status {
        let detail = event.detail.as_deref().map(|d| format!(" [{d}]")).unwrap_or_default();
        println!("    {:<20} {:<28} {}{}", event.display_time(), event.status.to_string(), event.note, detail);
    }
    if let Some(shipment) = order.shipment() {
        match shipment.tracking.as_ref().and_then(|t| t.tracking_url().map(|url| (t.carrier(), url))) {
            Some((carrier, url)) => println!("  tracking: {} via {carrier}: {url}", shipment.detail),
            None => println!("  tracking: {}", shipment.detail),
        }
    }
    match (order.current_code(), order.next_action()) {
        (Some(code), Some(action)) => println!("  next: {action} ({})", next_step_hint(code)),
        _ if order.is_final() => println!("  settled"),
        _ => {}
    }
    if order.can_cancel() { println!("  cancellable"); }
}
