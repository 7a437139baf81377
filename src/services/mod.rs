pub mod alias;
pub mod extractor;
pub mod logger;
pub mod validation;
pub mod xml_format;
