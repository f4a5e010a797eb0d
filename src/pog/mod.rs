pub mod alert;
pub mod claims;
pub mod detector;
pub mod extractor;
pub mod fetch;
pub mod locator;
pub mod matcher;

pub use alert::{Alert, AlertPublisher, AlertSink};
pub use detector::{DropChannel, DropDetector, DropMessage, DropOutcome, Verifier};
pub use extractor::{CardLayout, FieldExtractor, OcrEngine};
pub use fetch::HttpImageFetcher;
pub use locator::{HistoryMessage, MentionedUser};
