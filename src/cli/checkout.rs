use anyhow::Result;
use clap::Args;

use techstore::{
    checkout::{Checkout, CheckoutDetails, SimulatedGateway},
    orders::{Customer, PaymentMethod, ShippingAddress},
    receipt::Receipt,
};

use super::{Context, print_line, stdout};

#[derive(Debug, Args)]
pub(crate) struct CheckoutArgs {
    /// Coupon code to apply before paying
    #[arg(long)]
    coupon: Option<String>,

    /// Customer name
    #[arg(long)]
    name: String,

    /// Customer email
    #[arg(long)]
    email: String,

    /// Payment method (credit_card, pix, boleto)
    #[arg(long, default_value = "credit_card")]
    payment_method: PaymentMethod,

    /// Street
    #[arg(long)]
    street: String,

    /// Building number
    #[arg(long, default_value = "S/N")]
    number: String,

    /// Apartment, block, etc.
    #[arg(long)]
    complement: Option<String>,

    /// Neighbourhood
    #[arg(long, default_value = "Centro")]
    neighborhood: String,

    /// City
    #[arg(long)]
    city: String,

    /// State abbreviation
    #[arg(long)]
    state: String,

    /// Postal code
    #[arg(long)]
    zip_code: String,
}

pub(crate) async fn run(ctx: &Context, args: CheckoutArgs) -> Result<()> {
    let mut out = stdout();
    let mut cart = ctx.cart();
    let mut coupons = ctx.coupons();
    let mut orders = ctx.orders();

    if let Some(code) = &args.coupon {
        let coupon = coupons.validate(code, cart.total_price())?.clone();

        cart.apply_coupon(coupon);
    }

    let details = CheckoutDetails {
        customer: Customer::guest(args.name, args.email),
        shipping_address: ShippingAddress {
            street: args.street,
            number: args.number,
            complement: args.complement,
            neighborhood: args.neighborhood,
            city: args.city,
            state: args.state,
            zip_code: args.zip_code,
        },
        payment_method: args.payment_method,
    };

    print_line(&mut out, "processing payment...")?;

    let order = Checkout::new(SimulatedGateway::new(ctx.config.payment_delay()))
        .place_order(&mut cart, &mut coupons, &mut orders, details)
        .await?;

    Receipt::for_order(&order).write_to(&mut out)?;

    print_line(
        &mut out,
        format!(
            "order {} placed, payment {} ({})",
            order.uuid,
            order.payment_status,
            order.payment_method
        ),
    )
}
