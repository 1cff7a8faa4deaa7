mod app;
mod commands;
mod config;
mod db;
mod event;
mod logging;
mod offline;
mod orders;
mod query;
mod routes;
mod ui;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use orders::form::format_order_date;
use orders::stats::OrderStats;
use orders::tabs::{OrderTab, OrderTabs};
use orders::OrderStore;
use routes::Route;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "shop-order-tracker")]
#[command(about = "Track shop orders from the terminal, with an offline cache for the web app")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./shop-order-tracker.yaml or $XDG_CONFIG_HOME/shop-order-tracker/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Screen to open, e.g. /stats or /orders/edit/3
  #[arg(short, long, default_value = "/")]
  route: Route,

  #[command(subcommand)]
  command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
  /// Serve the web app through the offline cache
  Serve {
    /// Address to listen on
    #[arg(long)]
    listen: Option<String>,

    /// Origin the web app is served from
    #[arg(long)]
    origin: Option<String>,
  },
  /// Print the orders in one tab
  List {
    #[arg(short, long, default_value = "all")]
    tab: OrderTab,
  },
  /// Print order statistics
  Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  match args.command {
    None => {
      let _guard = logging::init_file(&db::data_dir()?.join("logs"))?;
      let db_path = config.database_path()?;
      let store = OrderStore::new(db::Database::open(&db_path)?);
      let label = db_path.display().to_string();

      let mut app = app::App::new(store, label, args.route);
      app.run().await?;
    }
    Some(Cmd::Serve { listen, origin }) => {
      logging::init_stderr()?;
      let cache_path = config.cache_path()?;
      let mut offline = config.offline;
      if let Some(listen) = listen {
        offline.listen = listen;
      }
      if let Some(origin) = origin {
        offline.origin = origin;
      }
      offline::proxy::serve(offline, cache_path, args.config).await?;
    }
    Some(Cmd::List { tab }) => {
      logging::init_stderr()?;
      let store = OrderStore::new(db::Database::open(&config.database_path()?)?);
      let tabs = OrderTabs::fetch(&store).map_err(|e| eyre!("Failed to load orders: {}", e))?;
      print_orders(&tabs, tab);
    }
    Some(Cmd::Stats) => {
      logging::init_stderr()?;
      let store = OrderStore::new(db::Database::open(&config.database_path()?)?);
      let stats =
        OrderStats::fetch(&store).map_err(|e| eyre!("Failed to load statistics: {}", e))?;
      println!("Total Orders:        {}", stats.total);
      println!("Pending:             {}", stats.pending);
      println!("Completed:           {}", stats.completed);
      println!("Average Order Value: ${:.2}", stats.average_order_value);
    }
  }

  Ok(())
}

fn print_orders(tabs: &OrderTabs, tab: OrderTab) {
  let orders = tabs.get(tab);
  if orders.is_empty() {
    println!("No orders found.");
    return;
  }
  for order in orders {
    println!(
      "#{:<5} {:<20} {:<10} {:<17} {} ({} / {})",
      order.id.unwrap_or_default(),
      order.buyer_name,
      order.status.label(),
      format_order_date(order.order_date),
      order.products,
      order.platform,
      order.courier,
    );
  }
}
