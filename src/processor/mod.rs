pub mod anomaly;
pub mod cleaner;
pub mod date_parser;
pub mod enricher;
pub mod numeric;
pub mod reporter;
pub mod table_codec;

pub use anomaly::*;
pub use cleaner::*;
pub use date_parser::*;
pub use enricher::*;
