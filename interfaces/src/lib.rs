pub mod defs;

pub use defs::{ChannelRef, Identity, InboundEvent, QuoteRecord, QuoteStore, TitleFetcher, Transport};
