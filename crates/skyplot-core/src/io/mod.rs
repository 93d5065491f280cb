pub mod fits;
pub mod fits_writer;
pub mod header;

pub use fits::{FitsReader, HduInfo};
pub use fits_writer::write_planes;
pub use header::{Card, FitsHeader, HeaderValue};
