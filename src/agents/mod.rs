pub mod price_extractor;
pub mod report_writer;
pub mod url_resolver;

pub use price_extractor::PriceExtractor;
pub use report_writer::ReportWriter;
pub use url_resolver::UrlResolver;
