use std::{fs, path::PathBuf};

use anyhow::{Context as _, Result, anyhow};
use clap::{Args, Subcommand};
use jiff::{SignedDuration, Timestamp};
use tabled::{builder::Builder, settings::Style};

use techstore::{
    coupons::{Coupon, CouponRegistry, CouponUuid, NewCoupon},
    fixtures::{coupons_from_yaml, parse_amount, parse_discount},
    prices::zero,
    storage::FileStore,
};

use super::{Context, print_line, stdout};

#[derive(Debug, Args)]
pub(crate) struct CouponsCommand {
    #[command(subcommand)]
    command: CouponsSubcommand,
}

#[derive(Debug, Subcommand)]
enum CouponsSubcommand {
    /// List every coupon
    List,

    /// Check whether a code applies to the current cart
    Validate {
        /// Coupon code
        code: String,

        /// Subtotal to check against instead of the cart's (e.g. "250.00 BRL")
        #[arg(long)]
        subtotal: Option<String>,
    },

    /// Create a coupon
    Add(AddCouponArgs),

    /// Create the coupons defined in a YAML fixture
    Import {
        /// Coupons fixture file
        file: PathBuf,
    },

    /// Re-enable a coupon
    Enable {
        /// Coupon code
        code: String,
    },

    /// Disable a coupon without deleting it
    Disable {
        /// Coupon code
        code: String,
    },

    /// Delete a coupon
    Delete {
        /// Coupon code
        code: String,
    },
}

#[derive(Debug, Args)]
struct AddCouponArgs {
    /// Code typed by customers
    #[arg(long)]
    code: String,

    /// Percentage ("10%") or amount ("30.00 BRL") off
    #[arg(long)]
    discount: String,

    /// Cap for percentage discounts (e.g. "50.00 BRL")
    #[arg(long)]
    max_discount: Option<String>,

    /// Minimum subtotal (e.g. "100.00 BRL")
    #[arg(long)]
    min_purchase: Option<String>,

    /// Days the coupon stays valid, starting now
    #[arg(long, default_value_t = 30)]
    valid_days: i64,

    /// How many times the coupon may be redeemed
    #[arg(long, default_value_t = 100)]
    usage_limit: u32,

    /// Admin-facing description
    #[arg(long, default_value = "")]
    description: String,
}

pub(crate) fn run(ctx: &Context, command: CouponsCommand) -> Result<()> {
    let mut out = stdout();
    let mut coupons = ctx.coupons();

    match command.command {
        CouponsSubcommand::List => {
            if coupons.list().is_empty() {
                return print_line(&mut out, "no coupons found");
            }

            print_line(&mut out, coupon_table(coupons.list(), Timestamp::now()))?;
        }
        CouponsSubcommand::Validate { code, subtotal } => {
            let subtotal = match subtotal {
                Some(amount) => parse_amount(&amount, ctx.currency)?,
                None => ctx.cart().total_price(),
            };

            match coupons.validate(&code, subtotal) {
                Ok(coupon) => print_line(
                    &mut out,
                    format!(
                        "{} is valid: {} off {subtotal}",
                        coupon.code,
                        coupon.discount_for(subtotal)
                    ),
                )?,
                Err(rejection) => print_line(
                    &mut out,
                    format!("{code} rejected ({}): {rejection}", rejection.reason_code()),
                )?,
            }
        }
        CouponsSubcommand::Add(args) => {
            let coupon = coupons.add_coupon(new_coupon(ctx, args)?)?;

            print_line(&mut out, format!("created coupon {} ({})", coupon.code, coupon.uuid))?;
        }
        CouponsSubcommand::Import { file } => {
            let yaml = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;

            for new in coupons_from_yaml(&yaml, ctx.currency, Timestamp::now())? {
                let coupon = coupons.add_coupon(new)?;

                print_line(&mut out, format!("created coupon {}", coupon.code))?;
            }
        }
        CouponsSubcommand::Enable { code } => {
            let uuid = uuid_for(&coupons, &code)?;
            coupons.set_active(uuid, true)?;

            print_line(&mut out, format!("enabled {code}"))?;
        }
        CouponsSubcommand::Disable { code } => {
            let uuid = uuid_for(&coupons, &code)?;
            coupons.set_active(uuid, false)?;

            print_line(&mut out, format!("disabled {code}"))?;
        }
        CouponsSubcommand::Delete { code } => {
            let uuid = uuid_for(&coupons, &code)?;
            let removed = coupons.delete_coupon(uuid)?;

            print_line(&mut out, format!("deleted {}", removed.code))?;
        }
    }

    Ok(())
}

fn uuid_for(coupons: &CouponRegistry<FileStore>, code: &str) -> Result<CouponUuid> {
    coupons
        .find_by_code(code)
        .map(|coupon| coupon.uuid)
        .ok_or_else(|| anyhow!("no coupon with code {code}"))
}

fn new_coupon(ctx: &Context, args: AddCouponArgs) -> Result<NewCoupon> {
    let max_discount = args
        .max_discount
        .as_deref()
        .map(|amount| parse_amount(amount, ctx.currency))
        .transpose()?;
    let min_purchase = args
        .min_purchase
        .as_deref()
        .map(|amount| parse_amount(amount, ctx.currency))
        .transpose()?
        .unwrap_or_else(|| zero(ctx.currency));

    let now = Timestamp::now();
    let ends_at = now
        .checked_add(SignedDuration::from_hours(args.valid_days.saturating_mul(24)))
        .unwrap_or(Timestamp::MAX);

    Ok(NewCoupon {
        code: args.code,
        description: args.description,
        discount: parse_discount(&args.discount, max_discount, ctx.currency)?,
        min_purchase,
        starts_at: now,
        ends_at,
        usage_limit: args.usage_limit,
        is_active: true,
    })
}

fn coupon_table(coupons: &[Coupon], now: Timestamp) -> String {
    let mut builder = Builder::default();

    builder.push_record(["Code", "Discount", "Minimum", "Uses", "Valid until", "Status"]);

    for coupon in coupons {
        let status = if !coupon.is_active {
            "inactive"
        } else if coupon.is_exhausted() {
            "exhausted"
        } else if now > coupon.ends_at {
            "expired"
        } else if now < coupon.starts_at {
            "scheduled"
        } else {
            "active"
        };

        builder.push_record([
            coupon.code.clone(),
            coupon.discount.to_string(),
            format!("{}", coupon.min_purchase),
            format!("{}/{}", coupon.usage_count, coupon.usage_limit),
            coupon.ends_at.strftime("%Y-%m-%d").to_string(),
            status.to_string(),
        ]);
    }

    let mut table = builder.build();
    table.with(Style::modern_rounded());

    table.to_string()
}
