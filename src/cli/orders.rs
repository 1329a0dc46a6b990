use anyhow::{Result, anyhow};
use clap::{Args, Subcommand};
use tabled::{builder::Builder, settings::Style};

use techstore::{
    orders::{Order, OrderStatus, OrderUuid, PaymentStatus},
    receipt::Receipt,
};

use super::{Context, print_line, stdout};

#[derive(Debug, Args)]
pub(crate) struct OrdersCommand {
    #[command(subcommand)]
    command: OrdersSubcommand,
}

#[derive(Debug, Subcommand)]
enum OrdersSubcommand {
    /// List orders, newest first
    List {
        /// Only orders placed with this email
        #[arg(long)]
        email: Option<String>,
    },

    /// Print one order
    Show {
        /// Order id
        uuid: OrderUuid,
    },

    /// Change the fulfilment status of an order
    Status {
        /// Order id
        uuid: OrderUuid,

        /// New status (pending, processing, shipped, delivered, cancelled)
        status: OrderStatus,
    },

    /// Change the payment status of an order
    Payment {
        /// Order id
        uuid: OrderUuid,

        /// New payment status (pending, approved, rejected)
        status: PaymentStatus,
    },
}

pub(crate) fn run(ctx: &Context, command: OrdersCommand) -> Result<()> {
    let mut out = stdout();
    let mut orders = ctx.orders();

    match command.command {
        OrdersSubcommand::List { email } => {
            let listed: Vec<&Order> = match &email {
                Some(email) => orders.for_customer(email).collect(),
                None => orders.list().iter().collect(),
            };

            if listed.is_empty() {
                return print_line(&mut out, "no orders found");
            }

            print_line(&mut out, order_table(&listed))?;
        }
        OrdersSubcommand::Show { uuid } => {
            let order = orders
                .get(uuid)
                .ok_or_else(|| anyhow!("order {uuid} not found"))?;

            Receipt::for_order(order).write_to(&mut out)?;
        }
        OrdersSubcommand::Status { uuid, status } => {
            let order = orders.update_status(uuid, status)?;

            print_line(&mut out, format!("order {} is now {}", order.uuid, order.status))?;
        }
        OrdersSubcommand::Payment { uuid, status } => {
            let order = orders.update_payment_status(uuid, status)?;

            print_line(
                &mut out,
                format!("order {} payment is now {}", order.uuid, order.payment_status),
            )?;
        }
    }

    Ok(())
}

fn order_table(orders: &[&Order]) -> String {
    let mut builder = Builder::default();

    builder.push_record(["Order", "Placed", "Customer", "Items", "Total", "Status", "Payment"]);

    for order in orders {
        builder.push_record([
            order.uuid.to_string(),
            order.created_at.strftime("%Y-%m-%d %H:%M").to_string(),
            order.customer.email.clone(),
            order.item_count().to_string(),
            format!("{}", order.total),
            order.status.to_string(),
            order.payment_status.to_string(),
        ]);
    }

    let mut table = builder.build();
    table.with(Style::modern_rounded());

    table.to_string()
}
