use std::io::{self, Write};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use rusty_money::iso::Currency;

use techstore::{
    cart::CartStore,
    config::{LoggingConfig, StoreConfig},
    coupons::CouponRegistry,
    fixtures::Catalog,
    orders::OrderBook,
    storage::FileStore,
};

mod cart;
mod checkout;
mod coupons;
mod orders;

#[derive(Debug, Parser)]
#[command(name = "techstore", about = "Techstore cart, coupon and order CLI", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    store: StoreConfig,

    #[command(flatten)]
    pub(crate) logging: LoggingConfig,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Inspect and edit the cart
    Cart(cart::CartCommand),

    /// Manage coupons
    Coupons(coupons::CouponsCommand),

    /// Pay for the cart and place an order
    Checkout(checkout::CheckoutArgs),

    /// Inspect and update orders
    Orders(orders::OrdersCommand),
}

impl Cli {
    pub(crate) async fn run(self) -> Result<()> {
        let ctx = Context::new(self.store)?;

        match self.command {
            Commands::Cart(command) => cart::run(&ctx, command),
            Commands::Coupons(command) => coupons::run(&ctx, command),
            Commands::Checkout(args) => checkout::run(&ctx, args).await,
            Commands::Orders(command) => orders::run(&ctx, command),
        }
    }
}

/// Resolved configuration shared by the subcommands.
struct Context {
    config: StoreConfig,
    currency: &'static Currency,
}

impl Context {
    fn new(config: StoreConfig) -> Result<Self> {
        let currency = config.currency()?;

        Ok(Self { config, currency })
    }

    fn file_store(&self) -> FileStore {
        FileStore::new(&self.config.data_dir)
    }

    fn cart(&self) -> CartStore<FileStore> {
        CartStore::init(self.file_store(), self.currency)
    }

    fn coupons(&self) -> CouponRegistry<FileStore> {
        CouponRegistry::init(self.file_store(), self.currency)
    }

    fn orders(&self) -> OrderBook<FileStore> {
        OrderBook::init(self.file_store())
    }

    fn catalog(&self) -> Result<Catalog> {
        Catalog::load(&self.config.catalog, self.currency).with_context(|| {
            format!(
                "failed to load catalog from {}",
                self.config.catalog.display()
            )
        })
    }
}

fn stdout() -> io::StdoutLock<'static> {
    io::stdout().lock()
}

fn print_line(out: &mut impl Write, line: impl std::fmt::Display) -> Result<()> {
    writeln!(out, "{line}")?;

    Ok(())
}
