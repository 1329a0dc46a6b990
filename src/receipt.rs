//! Receipt
//!
//! Terminal rendering of a cart or an order: one table row per line followed
//! by the subtotal, discount and total.

use std::io;

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    cart::{CartItem, CartStore},
    orders::Order,
    pricing::PriceSummary,
    storage::KeyValueStore,
};

/// Errors that can occur when writing a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// IO error
    #[error("IO error")]
    IO,
}

/// Lines and amounts ready to be printed.
#[derive(Debug, Clone)]
pub struct Receipt<'a> {
    items: &'a [CartItem],
    summary: PriceSummary,
}

impl<'a> Receipt<'a> {
    /// Receipt for the cart as it stands, including the applied coupon.
    pub fn for_cart<S: KeyValueStore>(cart: &'a CartStore<S>) -> Self {
        Self {
            items: cart.cart().items(),
            summary: cart.summary(),
        }
    }

    /// Receipt for a placed order.
    pub fn for_order(order: &'a Order) -> Self {
        Self {
            items: &order.items,
            summary: order.summary(),
        }
    }

    /// The amounts shown at the bottom of the receipt.
    pub fn summary(&self) -> &PriceSummary {
        &self.summary
    }

    /// Write the receipt table and summary to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiptError::IO`] if writing fails.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), ReceiptError> {
        if self.items.is_empty() {
            return writeln!(out, "\nThe cart is empty.\n").map_err(|_err| ReceiptError::IO);
        }

        let mut builder = Builder::default();

        builder.push_record(["", "Product", "Unit price", "Qty", "Line total"]);

        for (idx, item) in self.items.iter().enumerate() {
            builder.push_record([
                format!("#{:<3}", idx + 1),
                item.product.name.clone(),
                format!("{}", item.product.price),
                item.quantity.to_string(),
                format!("{}", item.line_total()),
            ]);
        }

        let mut table = builder.build();
        let mut theme = Theme::from(Style::modern_rounded());

        theme.remove_horizontal_lines();
        theme.insert_horizontal_line(
            1,
            HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤')),
        );

        table.with(theme);
        table.modify(Rows::first(), Color::BOLD);
        table.modify(Columns::new(2..5), Alignment::right());

        writeln!(out, "\n{table}").map_err(|_err| ReceiptError::IO)?;

        write_receipt_summary(&mut out, &self.summary)
    }
}

fn write_receipt_summary(
    out: &mut impl io::Write,
    summary: &PriceSummary,
) -> Result<(), ReceiptError> {
    let mut lines = vec![(" Subtotal:".to_string(), format!("{}  ", summary.subtotal))];

    if summary.has_discount() {
        let points = percent_points(summary.savings_percent());
        let label = match &summary.coupon_code {
            Some(code) => format!(" Discount ({code}):"),
            None => " Discount:".to_string(),
        };

        lines.push((label, format!("({points:.2}%) -{}  ", summary.discount)));
    }

    lines.push((
        " \x1b[1mTotal:\x1b[0m".to_string(),
        format!("\x1b[1m{}  \x1b[0m", summary.final_price),
    ));

    let label_width = lines
        .iter()
        .map(|(label, _)| visible_width(label))
        .max()
        .unwrap_or(0);

    let value_width = lines
        .iter()
        .map(|(_, value)| visible_width(value))
        .max()
        .unwrap_or(0);

    for (label, value) in &lines {
        write_summary_line(out, label, value, label_width, value_width)?;
    }

    writeln!(out).map_err(|_err| ReceiptError::IO)
}

/// Converts a fractional percentage to percent points for display.
fn percent_points(percentage: Percentage) -> Decimal {
    // `Percentage` is a fraction (e.g. 0.25), so multiply by 100 to print percent points.
    ((percentage * Decimal::ONE) * Decimal::ONE_HUNDRED).round_dp(2)
}

/// Returns the visible (non-ANSI) width of a string.
fn visible_width(s: &str) -> usize {
    let mut width = 0usize;
    let mut in_escape = false;

    for ch in s.chars() {
        if in_escape {
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if ch == '\x1b' {
            in_escape = true;
        } else {
            width += 1;
        }
    }

    width
}

/// Writes a summary line with a right-aligned label and a fixed-width value column.
fn write_summary_line(
    out: &mut impl io::Write,
    label: &str,
    value: &str,
    label_col_width: usize,
    value_col_width: usize,
) -> Result<(), ReceiptError> {
    let label_pad = label_col_width.saturating_sub(visible_width(label));
    let value_pad = value_col_width.saturating_sub(visible_width(value));

    writeln!(
        out,
        "{:>label_pad$}{label}  {value_pad}{value}",
        "",
        value_pad = " ".repeat(value_pad)
    )
    .map_err(|_err| ReceiptError::IO)
}
