use anyhow::{Result, anyhow, bail};
use clap::{Args, Subcommand};

use techstore::{products::ProductId, receipt::Receipt};

use super::{Context, print_line, stdout};

#[derive(Debug, Args)]
pub(crate) struct CartCommand {
    #[command(subcommand)]
    command: CartSubcommand,
}

#[derive(Debug, Subcommand)]
enum CartSubcommand {
    /// Print the cart, optionally previewing a coupon
    Show {
        /// Coupon code to preview
        #[arg(long)]
        coupon: Option<String>,
    },

    /// List the products that can be added
    Catalog,

    /// Add a product from the catalog
    Add {
        /// Catalog product id
        product: String,

        /// How many to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },

    /// Set the quantity of a line (0 removes it)
    Set {
        /// Catalog product id
        product: String,

        /// New quantity
        quantity: u32,
    },

    /// Remove a line
    Remove {
        /// Catalog product id
        product: String,
    },

    /// Empty the cart
    Clear,
}

pub(crate) fn run(ctx: &Context, command: CartCommand) -> Result<()> {
    let mut out = stdout();

    match command.command {
        CartSubcommand::Show { coupon } => {
            let mut cart = ctx.cart();

            if let Some(code) = coupon {
                let coupons = ctx.coupons();
                let coupon = coupons.validate(&code, cart.total_price())?;

                cart.apply_coupon(coupon.clone());
            }

            Receipt::for_cart(&cart).write_to(&mut out)?;
        }
        CartSubcommand::Catalog => {
            for product in ctx.catalog()?.products() {
                let stock = if product.in_stock { "" } else { " (out of stock)" };

                print_line(
                    &mut out,
                    format!("{:<20} {:>14}  {}{stock}", product.id, product.price, product.name),
                )?;
            }
        }
        CartSubcommand::Add { product, quantity } => {
            let catalog = ctx.catalog()?;
            let id = ProductId::new(product);

            let product = catalog
                .get(&id)
                .ok_or_else(|| anyhow!("product {id} is not in the catalog"))?;

            if !product.in_stock {
                bail!("product {id} is out of stock");
            }

            let mut cart = ctx.cart();
            cart.add_item(product.clone(), quantity)?;

            Receipt::for_cart(&cart).write_to(&mut out)?;
        }
        CartSubcommand::Set { product, quantity } => {
            let mut cart = ctx.cart();
            let id = ProductId::new(product);

            if !cart.contains(&id) {
                bail!("product {id} is not in the cart");
            }

            cart.set_quantity(&id, quantity);

            Receipt::for_cart(&cart).write_to(&mut out)?;
        }
        CartSubcommand::Remove { product } => {
            let mut cart = ctx.cart();
            cart.remove_item(&ProductId::new(product));

            Receipt::for_cart(&cart).write_to(&mut out)?;
        }
        CartSubcommand::Clear => {
            ctx.cart().clear();

            print_line(&mut out, "cart cleared")?;
        }
    }

    Ok(())
}
