// cardshop/src/checkout.rs

//! Checkout is a handoff: the cart is rendered into a message and opened in a
//! phone-addressed chat deep link. There is no payment step.

use crate::cart::CartLine;
use crate::errors::{AppError, Result};

const WHATSAPP_BASE: &str = "https://wa.me/";

/// Human-readable order summary, one line per cart line plus the total.
pub fn order_summary(lines: &[CartLine]) -> String {
  let mut out = String::from("Hello! I would like to order:\n");
  for line in lines {
    out.push_str(&format!(
      "- {}x {} ({:.2} each) = {:.2}\n",
      line.quantity,
      line.name,
      line.unit_price,
      line.subtotal()
    ));
  }
  let total: f64 = lines.iter().map(CartLine::subtotal).sum();
  out.push_str(&format!("Total: {:.2}", total));
  out
}

/// `https://wa.me/{digits}?text={summary}`. Formatting characters in `phone` are dropped.
pub fn whatsapp_link(phone: &str, summary: &str) -> Result<String> {
  let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
  if digits.is_empty() {
    return Err(AppError::Validation(format!("'{}' is not a phone number", phone)));
  }
  Ok(format!("{}{}?text={}", WHATSAPP_BASE, digits, urlencoding::encode(summary)))
}
