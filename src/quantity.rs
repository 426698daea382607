#[macro_use]
mod macros;

pub mod currency;
pub mod energy;
pub mod power;
pub mod price;
pub mod time;
mod zero;

pub use self::zero::Zero;
