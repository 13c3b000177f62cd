pub mod ws;

pub use ws::BinanceSource;
